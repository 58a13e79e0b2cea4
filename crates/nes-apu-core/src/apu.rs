use std::marker::PhantomData;

use log::{debug, warn};

use crate::audio_queue::{AudioConsumer, AudioProducer, audio_queue, capacity_for};
use crate::bus::ApuBus;
use crate::channels::{
    ChannelId, DmcChannel, NoiseChannel, PulseChannel, PulseId, TriangleChannel,
};
use crate::config::ApuConfig;
use crate::engine::{
    AudioEngine, CoreParts, FRAME_COUNTER_REGISTER, PULL_SAFETY_CAP, STATUS_REGISTER,
};
use crate::frame_sequencer::{FrameEvent, FrameSequencer};
use crate::hardware::Region;
use crate::mixer::{ChannelOutputs, Mixer};
use crate::notes::{BoxedNoteSink, NoteOutput, Voices};
use crate::registry::CoreKind;
use crate::scheduler::{CycleStepped, Scheduled, Source, Stepper};
use crate::snapshot::{ApuSnapshot, SNAPSHOT_VERSION};

#[cfg(feature = "apu-trace")]
macro_rules! apu_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*);
    };
}
#[cfg(not(feature = "apu-trace"))]
macro_rules! apu_trace {
    ($($arg:tt)*) => {};
}

/// Everything both steppers share: channels, frame sequencer, mixer and the
/// output queue. Steppers only decide how far to jump between events.
pub struct ApuCore {
    config: ApuConfig,
    region: Region,
    cpu_hz: u32,
    sample_rate: u32,
    pulse1: PulseChannel,
    pulse2: PulseChannel,
    triangle: TriangleChannel,
    noise: NoiseChannel,
    dmc: DmcChannel,
    frame: FrameSequencer,
    mixer: Mixer,
    producer: AudioProducer,
    consumer: AudioConsumer,
    /// Resampler numerator: a sample is due once this reaches `cpu_hz`.
    sample_phase: u32,
    cycles: u64,
    /// Level last passed to `ApuBus::request_interrupt`.
    irq_line: bool,
    notes: NoteOutput,
}

impl ApuCore {
    fn new(kind: CoreKind, parts: CoreParts) -> Self {
        let config = parts.config.normalized();
        let region = config.region;
        let mixer = Mixer::new(
            config.mixer.unwrap_or(kind.default_mixer()),
            config.sample_rate,
            config.low_pass_cutoff_hz,
            config.dc_block_r,
            config.output_gain,
        );
        let consumer = parts.producer.consumer();
        let mut core = Self {
            region,
            cpu_hz: region.cpu_hz(),
            sample_rate: config.sample_rate,
            pulse1: PulseChannel::new(PulseId::One),
            pulse2: PulseChannel::new(PulseId::Two),
            triangle: TriangleChannel::new(),
            noise: NoiseChannel::new(region),
            dmc: DmcChannel::new(region),
            frame: FrameSequencer::new(),
            mixer,
            producer: parts.producer,
            consumer,
            sample_phase: 0,
            cycles: 0,
            irq_line: false,
            notes: parts.notes,
            config,
        };
        core.power_on();
        core
    }

    pub(crate) fn cycles(&self) -> u64 {
        self.cycles
    }

    /// CPU cycles until `source` next needs servicing.
    pub(crate) fn cycles_until(&self, source: Source) -> u32 {
        match source {
            Source::Pulse1 => self.pulse1.timer_cycles(),
            Source::Pulse2 => self.pulse2.timer_cycles(),
            Source::Triangle => self.triangle.timer_cycles(),
            Source::Noise => self.noise.timer_cycles(),
            Source::Dmc if self.dmc.fetch_pending() => 0,
            Source::Dmc => self.dmc.timer_cycles(),
            Source::Frame => self.frame.cycles_until_step(),
            Source::Sample => {
                let missing = self.cpu_hz.saturating_sub(self.sample_phase);
                missing.div_ceil(self.sample_rate)
            }
        }
    }

    /// Move every counter forward by `cycles`. Never crosses an event.
    pub(crate) fn elapse(&mut self, cycles: u32) {
        if cycles == 0 {
            return;
        }
        self.pulse1.elapse(cycles);
        self.pulse2.elapse(cycles);
        self.triangle.elapse(cycles);
        self.noise.elapse(cycles);
        self.dmc.elapse(cycles);
        self.frame.elapse(cycles);
        self.sample_phase += cycles * self.sample_rate;
        self.cycles += cycles as u64;
    }

    pub(crate) fn fire(&mut self, source: Source, bus: &mut dyn ApuBus) {
        match source {
            Source::Pulse1 => self.pulse1.clock_timer(),
            Source::Pulse2 => self.pulse2.clock_timer(),
            Source::Triangle => self.triangle.clock_timer(),
            Source::Noise => self.noise.clock_timer(),
            Source::Dmc => {
                if self.dmc.timer_cycles() == 0 {
                    self.dmc.clock_timer();
                }
                if self.dmc.fetch_pending() {
                    self.dmc.fetch(bus);
                }
            }
            Source::Frame => {
                let event = self.frame.clock();
                apu_trace!(
                    "frame step at cycle {}: {:?} (step {})",
                    self.cycles,
                    event,
                    self.frame.step()
                );
                self.apply_frame_event(event);
            }
            Source::Sample => {
                self.sample_phase -= self.cpu_hz;
                let sample = self.mixer.sample(self.outputs());
                self.producer.push(sample);
            }
        }
    }

    /// Report the combined interrupt level to the bus when it changes.
    pub(crate) fn sync_irq(&mut self, bus: &mut dyn ApuBus) {
        let level = self.irq_asserted();
        if level != self.irq_line {
            self.irq_line = level;
            apu_trace!("IRQ line {} at cycle {}", level, self.cycles);
            bus.request_interrupt(level);
        }
    }

    fn apply_frame_event(&mut self, event: FrameEvent) {
        if event.quarter {
            self.pulse1.clock_quarter();
            self.pulse2.clock_quarter();
            self.triangle.clock_quarter();
            self.noise.clock_quarter();
        }
        if event.half {
            self.pulse1.clock_half();
            self.pulse2.clock_half();
            self.triangle.clock_half();
            self.noise.clock_half();
        }
        if event.quarter && self.notes.is_active() {
            self.notes.observe(Voices {
                pulse1: &self.pulse1,
                pulse2: &self.pulse2,
                triangle: &self.triangle,
                noise: &self.noise,
                dmc: &self.dmc,
                cpu_hz: self.cpu_hz,
            });
        }
    }

    fn irq_asserted(&self) -> bool {
        self.frame.irq_pending() || self.dmc.irq_flag()
    }

    fn outputs(&self) -> ChannelOutputs {
        ChannelOutputs {
            pulse1: self.pulse1.output(),
            pulse2: self.pulse2.output(),
            triangle: self.triangle.output(),
            noise: self.noise.output(),
            dmc: self.dmc.output(),
        }
    }

    fn write_register(&mut self, addr: u16, val: u8) {
        apu_trace!("write ${:04X} = {:02X} at cycle {}", addr, val, self.cycles);
        match addr {
            0x4000..=0x4003 => self.pulse1.write(addr - 0x4000, val),
            0x4004..=0x4007 => self.pulse2.write(addr - 0x4004, val),
            0x4008..=0x400B => self.triangle.write(addr - 0x4008, val),
            0x400C..=0x400F => self.noise.write(addr - 0x400C, val),
            0x4010..=0x4013 => self.dmc.write(addr - 0x4010, val),
            STATUS_REGISTER => {
                self.pulse1.set_enabled(val & 0x01 != 0);
                self.pulse2.set_enabled(val & 0x02 != 0);
                self.triangle.set_enabled(val & 0x04 != 0);
                self.noise.set_enabled(val & 0x08 != 0);
                self.dmc.set_enabled(val & 0x10 != 0);
            }
            FRAME_COUNTER_REGISTER => {
                let event = self.frame.write(val);
                self.apply_frame_event(event);
            }
            _ => {}
        }
    }

    fn status(&self) -> u8 {
        let mut status = 0;
        if self.pulse1.length_counter() > 0 {
            status |= 0x01;
        }
        if self.pulse2.length_counter() > 0 {
            status |= 0x02;
        }
        if self.triangle.length_counter() > 0 {
            status |= 0x04;
        }
        if self.noise.length_counter() > 0 {
            status |= 0x08;
        }
        if self.dmc.bytes_remaining() > 0 {
            status |= 0x10;
        }
        if self.frame.irq_pending() {
            status |= 0x40;
        }
        if self.dmc.irq_flag() {
            status |= 0x80;
        }
        status
    }

    fn read_register(&mut self, addr: u16) -> u8 {
        if addr != STATUS_REGISTER {
            return 0;
        }
        let status = self.status();
        self.frame.clear_irq();
        status
    }

    fn clear_audio_buffers(&mut self) {
        self.producer.clear();
        self.sample_phase = 0;
        self.mixer.reset_filters();
    }

    fn reset(&mut self) {
        self.notes.silence();
        self.power_on();
    }

    /// Silence every channel through the register write path.
    fn power_on(&mut self) {
        self.write_register(STATUS_REGISTER, 0x00);
        for addr in 0x4000..=0x4013 {
            self.write_register(addr, 0x00);
        }
        self.write_register(FRAME_COUNTER_REGISTER, 0x00);
        self.frame.clear_irq();
        self.dmc.clear_irq();
        self.triangle.reset_sequence();
        self.clear_audio_buffers();
        debug!("APU reset ({} region)", self.region.name());
    }

    fn get_state(&self, kind: CoreKind) -> ApuSnapshot {
        ApuSnapshot {
            version: SNAPSHOT_VERSION,
            core: kind.name().to_string(),
            region: self.region,
            cycles: self.cycles,
            pulse1: self.pulse1.save(),
            pulse2: self.pulse2.save(),
            triangle: self.triangle.save(),
            noise: self.noise.save(),
            dmc: self.dmc.save(),
            frame: self.frame.save(),
            mixer: self.mixer.save(),
            sample_phase: self.sample_phase as f64 / self.cpu_hz as f64,
            irq_line: self.irq_line,
        }
    }

    fn set_state(&mut self, snap: &ApuSnapshot) {
        if snap.region != self.region {
            warn!(
                "Snapshot region {} differs from configured {}; keeping {}",
                snap.region.name(),
                self.region.name(),
                self.region.name()
            );
        }

        self.pulse1.load(&snap.pulse1);
        self.pulse2.load(&snap.pulse2);
        self.triangle.load(&snap.triangle);
        self.noise.load(&snap.noise);
        self.dmc.load(&snap.dmc);
        self.frame.load(&snap.frame);
        self.cycles = snap.cycles;
        self.irq_line = snap.irq_line;

        self.clear_audio_buffers();
        let phase = if snap.sample_phase.is_finite() {
            (snap.sample_phase * self.cpu_hz as f64).round()
        } else {
            0.0
        };
        self.sample_phase = phase.clamp(0.0, (self.cpu_hz - 1) as f64) as u32;

        debug!(
            "Loaded APU snapshot v{} from '{}' core at cycle {}",
            snap.version, snap.core, snap.cycles
        );
    }

    fn detach_parts(&mut self) -> CoreParts {
        let (spare, consumer) = audio_queue(2);
        let producer = std::mem::replace(&mut self.producer, spare);
        self.consumer = consumer;
        CoreParts {
            producer,
            notes: std::mem::take(&mut self.notes),
            config: self.config.clone(),
        }
    }
}

/// An APU core: shared channel state driven by the stepper `S`.
pub struct Apu<S: Stepper> {
    core: ApuCore,
    _stepper: PhantomData<S>,
}

/// Nearest-event scheduling with the table mixer by default.
pub type ScheduledApu = Apu<Scheduled>;

/// Per-cycle stepping with the closed-form mixer by default.
pub type CycleApu = Apu<CycleStepped>;

impl<S: Stepper> Apu<S> {
    pub fn new(config: ApuConfig) -> Self {
        let config = config.normalized();
        let (producer, _) = audio_queue(capacity_for(config.sample_rate, config.latency_ms));
        Self::from_parts(CoreParts {
            producer,
            notes: NoteOutput::default(),
            config,
        })
    }

    /// Build a core around an existing output queue and note sink.
    pub fn from_parts(parts: CoreParts) -> Self {
        Self {
            core: ApuCore::new(S::KIND, parts),
            _stepper: PhantomData,
        }
    }

    pub fn region(&self) -> Region {
        self.core.region
    }

    /// Total CPU cycles stepped.
    pub fn cycles(&self) -> u64 {
        self.core.cycles
    }

    pub fn pulse1(&self) -> &PulseChannel {
        &self.core.pulse1
    }

    pub fn pulse2(&self) -> &PulseChannel {
        &self.core.pulse2
    }

    pub fn triangle(&self) -> &TriangleChannel {
        &self.core.triangle
    }

    pub fn noise(&self) -> &NoiseChannel {
        &self.core.noise
    }

    pub fn dmc(&self) -> &DmcChannel {
        &self.core.dmc
    }

    pub fn frame_sequencer(&self) -> &FrameSequencer {
        &self.core.frame
    }

    pub fn mixer(&self) -> &Mixer {
        &self.core.mixer
    }
}

impl<S: Stepper> AudioEngine for Apu<S> {
    fn core_kind(&self) -> CoreKind {
        S::KIND
    }

    fn step(&mut self, cpu_cycles: u32, bus: &mut dyn ApuBus) {
        self.core.sync_irq(bus);
        S::run(&mut self.core, cpu_cycles, bus);
    }

    fn write_register(&mut self, address: u16, value: u8) {
        self.core.write_register(address, value);
    }

    fn read_register(&mut self, address: u16) -> u8 {
        self.core.read_register(address)
    }

    fn pull_audio_samples(&mut self, max: Option<usize>) -> Vec<f32> {
        self.core.consumer.pull(max.unwrap_or(PULL_SAFETY_CAP))
    }

    fn queued_sample_count(&self) -> usize {
        self.core.consumer.len()
    }

    fn sample_rate(&self) -> u32 {
        self.core.sample_rate
    }

    fn get_state(&self) -> ApuSnapshot {
        self.core.get_state(S::KIND)
    }

    fn set_state(&mut self, snapshot: &ApuSnapshot) {
        self.core.set_state(snapshot);
    }

    fn clear_audio_buffers(&mut self) {
        self.core.clear_audio_buffers();
    }

    fn reset(&mut self) {
        self.core.reset();
    }

    fn irq_asserted(&self) -> bool {
        self.core.irq_asserted()
    }

    fn take_dmc_stall_cycles(&mut self) -> u32 {
        self.core.dmc.take_stall_cycles()
    }

    fn channel_outputs(&self) -> ChannelOutputs {
        self.core.outputs()
    }

    fn set_channel_muted(&mut self, channel: ChannelId, muted: bool) {
        self.core.mixer.set_channel_muted(channel, muted);
    }

    fn set_note_sink(&mut self, sink: BoxedNoteSink) {
        self.core.notes.set_sink(Some(sink));
    }

    fn take_note_sink(&mut self) -> Option<BoxedNoteSink> {
        self.core.notes.take_sink()
    }

    fn audio_consumer(&self) -> AudioConsumer {
        self.core.producer.consumer()
    }

    fn detach_parts(&mut self) -> CoreParts {
        self.core.detach_parts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::OpenBus;

    fn apu() -> ScheduledApu {
        ScheduledApu::new(ApuConfig::default())
    }

    #[test]
    fn unmapped_registers_are_ignored() {
        let mut apu = apu();
        let before = apu.get_state();
        apu.write_register(0x4009, 0xFF);
        apu.write_register(0x400D, 0xFF);
        apu.write_register(0x4014, 0xFF);
        apu.write_register(0x4016, 0xFF);
        apu.write_register(0x4018, 0xFF);
        assert_eq!(apu.get_state(), before);
        assert_eq!(apu.read_register(0x4000), 0);
        assert_eq!(apu.read_register(0x4017), 0);
    }

    #[test]
    fn status_reports_active_channels() {
        let mut apu = apu();
        apu.write_register(0x4015, 0x0F);
        apu.write_register(0x4003, 0x08);
        apu.write_register(0x400F, 0x08);
        assert_eq!(apu.read_register(0x4015), 0x09);
        apu.write_register(0x4015, 0x01);
        assert_eq!(apu.read_register(0x4015), 0x01);
    }

    #[test]
    fn sample_phase_emits_at_host_rate() {
        let mut apu = apu();
        let cpu_hz = apu.region().cpu_hz();
        apu.step(cpu_hz / 10, &mut OpenBus);
        let expected = (44_100u64 * (cpu_hz / 10) as u64 / cpu_hz as u64) as usize;
        assert_eq!(apu.queued_sample_count(), expected);
    }

    #[test]
    fn sample_distance_rounds_up() {
        let apu = apu();
        let cpu_hz = apu.region().cpu_hz();
        assert_eq!(
            apu.core.cycles_until(Source::Sample),
            cpu_hz.div_ceil(44_100)
        );
    }

    #[test]
    fn detached_core_keeps_running() {
        let mut apu = apu();
        let consumer = apu.audio_consumer();
        let parts = apu.detach_parts();
        apu.step(10_000, &mut OpenBus);
        assert!(consumer.is_empty());
        parts.producer.push(0.5);
        assert_eq!(consumer.pop(), Some(0.5));
    }
}
