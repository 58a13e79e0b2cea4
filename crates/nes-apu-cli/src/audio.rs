use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{error, info};
use nes_apu_core::audio_queue::AudioConsumer;
use nes_apu_core::{ApuConfig, CoreKind, Region};

use crate::error::CliError;
use crate::player::ScriptPlayer;
use crate::render::to_pcm16;
use crate::script::Script;

/// Output device settings chosen before the engine is built, since the
/// engine's sample rate is fixed at construction.
pub struct DeviceConfig {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
}

impl DeviceConfig {
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }
}

pub fn default_device() -> Result<DeviceConfig, CliError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| CliError::Playback("no output device".into()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| CliError::Playback(format!("no supported output config: {e}")))?;
    Ok(DeviceConfig {
        device,
        sample_format: supported.sample_format(),
        config: supported.into(),
    })
}

/// Start a stream that drains `consumer` into every device channel.
/// Underruns play silence.
pub fn start_stream(
    device: &DeviceConfig,
    consumer: AudioConsumer,
) -> Result<cpal::Stream, CliError> {
    let channels = device.config.channels as usize;
    let err_fn = |err| error!("cpal stream error: {err}");

    let stream = match device.sample_format {
        cpal::SampleFormat::I16 => device.device.build_output_stream(
            &device.config,
            move |data: &mut [i16], _| {
                for frame in data.chunks_mut(channels) {
                    frame.fill(to_pcm16(consumer.pop().unwrap_or(0.0)));
                }
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.device.build_output_stream(
            &device.config,
            move |data: &mut [u16], _| {
                for frame in data.chunks_mut(channels) {
                    let s = to_pcm16(consumer.pop().unwrap_or(0.0));
                    frame.fill((s as i32 + 32768) as u16);
                }
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::F32 => device.device.build_output_stream(
            &device.config,
            move |data: &mut [f32], _| {
                for frame in data.chunks_mut(channels) {
                    frame.fill(consumer.pop().unwrap_or(0.0));
                }
            },
            err_fn,
            None,
        ),
        other => {
            return Err(CliError::Playback(format!(
                "unsupported sample format {other:?}"
            )));
        }
    }
    .map_err(|e| CliError::Playback(e.to_string()))?;

    stream
        .play()
        .map_err(|e| CliError::Playback(e.to_string()))?;
    Ok(stream)
}

/// Play `script` in real time on the default output device.
pub fn play(script: &Script, kind: CoreKind, config: &ApuConfig) -> Result<(), CliError> {
    let device = default_device()?;
    let config = ApuConfig {
        sample_rate: device.sample_rate(),
        ..config.clone()
    };
    let mut player = ScriptPlayer::new(script, kind, &config);
    let consumer = player.engine().audio_consumer();
    let _stream = start_stream(&device, consumer.clone())?;

    let chunk = chunk_cycles(config.region);
    // Keep about a quarter of the queue filled ahead of the device.
    let high_water = consumer.capacity() / 4;
    info!("Playing with the {kind} core at {} Hz", config.sample_rate);
    while !player.finished() {
        while consumer.len() > high_water {
            thread::sleep(Duration::from_millis(2));
        }
        let target = player.now() + chunk;
        player.advance_to(target);
    }
    while !consumer.is_empty() {
        thread::sleep(Duration::from_millis(10));
    }
    Ok(())
}

/// CPU cycles in 5 ms.
fn chunk_cycles(region: Region) -> u64 {
    region.cpu_hz() as u64 / 200
}
