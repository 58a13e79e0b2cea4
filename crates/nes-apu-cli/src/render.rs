use std::fs;
use std::path::Path;

use log::info;
use nes_apu_core::{ApuConfig, CoreKind};

use crate::error::CliError;
use crate::player::ScriptPlayer;
use crate::script::Script;

/// CPU cycles emulated between queue drains, about 10 ms of audio.
const RENDER_CHUNK: u64 = 17_898;

/// Convert a mixer sample to 16-bit PCM, clipping out-of-range values.
pub fn to_pcm16(sample: f32) -> i16 {
    if !sample.is_finite() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Render `script` to a mono 16-bit WAV file. Returns the number of samples
/// written.
pub fn render_wav(
    script: &Script,
    kind: CoreKind,
    config: &ApuConfig,
    out_path: &Path,
) -> Result<usize, CliError> {
    let mut player = ScriptPlayer::new(script, kind, config);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: player.engine().sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    if let Some(parent) = out_path
        .parent()
        .and_then(|p| (!p.as_os_str().is_empty()).then_some(p))
    {
        fs::create_dir_all(parent)?;
    }
    let mut writer = hound::WavWriter::create(out_path, spec)?;
    let mut written = 0usize;

    while !player.finished() {
        let target = player.now() + RENDER_CHUNK;
        player.advance_to(target);
        while player.engine().queued_sample_count() > 0 {
            for sample in player.engine_mut().pull_audio_samples(None) {
                writer.write_sample(to_pcm16(sample))?;
                written += 1;
            }
        }
    }

    writer.finalize()?;
    info!(
        "Wrote {written} samples ({:.2}s) to {} using the {kind} core",
        written as f64 / spec.sample_rate as f64,
        out_path.display()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
        cycles = 178978
        [[write]]
        cycle = 0
        addr = 0x4015
        value = 0x1F
        [[write]]
        cycle = 0
        addr = 0x4000
        value = 0xBF
        [[write]]
        cycle = 0
        addr = 0x4002
        value = 0xFD
        [[write]]
        cycle = 0
        addr = 0x4003
        value = 0x08
        [[write]]
        cycle = 0
        addr = 0x4010
        value = 0x4F
        [[write]]
        cycle = 0
        addr = 0x4015
        value = 0x1F

        [[memory]]
        addr = 0xC000
        bytes = [0xFF, 0x00, 0xAA]
    "#;

    #[test]
    fn pcm_conversion_clips() {
        assert_eq!(to_pcm16(0.0), 0);
        assert_eq!(to_pcm16(1.5), i16::MAX);
        assert_eq!(to_pcm16(-2.0), -i16::MAX);
        assert_eq!(to_pcm16(f32::NAN), 0);
    }

    #[test]
    fn renders_one_tenth_of_a_second() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("tone.wav");
        let script = Script::from_toml(SCRIPT, Path::new("tone.toml")).unwrap();

        let written = render_wav(&script, CoreKind::Scheduled, &ApuConfig::default(), &out).unwrap();
        assert_eq!(written, 4_410);

        let reader = hound::WavReader::open(&out).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.bits_per_sample, 16);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), written);
        assert!(samples.iter().any(|&s| s.unsigned_abs() > 1_000));
    }

    #[test]
    fn both_cores_render_the_same_length() {
        let dir = tempfile::tempdir().unwrap();
        let script = Script::from_toml(SCRIPT, Path::new("tone.toml")).unwrap();
        let a = render_wav(
            &script,
            CoreKind::Scheduled,
            &ApuConfig::default(),
            &dir.path().join("a.wav"),
        )
        .unwrap();
        let b = render_wav(
            &script,
            CoreKind::CycleStepped,
            &ApuConfig::default(),
            &dir.path().join("b.wav"),
        )
        .unwrap();
        assert_eq!(a, b);
    }
}
