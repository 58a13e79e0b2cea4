use std::fmt;
use std::str::FromStr;

use log::debug;
use serde_json::Value;

use crate::apu::{CycleApu, ScheduledApu};
use crate::audio_queue::AudioConsumer;
use crate::bus::ApuBus;
use crate::channels::ChannelId;
use crate::config::ApuConfig;
use crate::engine::{AudioEngine, CoreParts};
use crate::mixer::{ChannelOutputs, MixerKind};
use crate::notes::BoxedNoteSink;
use crate::snapshot::{ApuSnapshot, SnapshotReport};

/// The interchangeable engine implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoreKind {
    #[default]
    Scheduled,
    CycleStepped,
}

impl CoreKind {
    pub const ALL: [CoreKind; 2] = [CoreKind::Scheduled, CoreKind::CycleStepped];

    pub fn name(self) -> &'static str {
        match self {
            CoreKind::Scheduled => "scheduled",
            CoreKind::CycleStepped => "cycle",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            CoreKind::Scheduled => "jumps between timer events; table mixer",
            CoreKind::CycleStepped => "steps every CPU cycle; closed-form mixer",
        }
    }

    pub fn default_mixer(self) -> MixerKind {
        match self {
            CoreKind::Scheduled => MixerKind::Lookup,
            CoreKind::CycleStepped => MixerKind::Formula,
        }
    }

    pub fn create(self, config: &ApuConfig) -> Box<dyn AudioEngine> {
        match self {
            CoreKind::Scheduled => Box::new(ScheduledApu::new(config.clone())),
            CoreKind::CycleStepped => Box::new(CycleApu::new(config.clone())),
        }
    }

    fn from_parts(self, parts: CoreParts) -> Box<dyn AudioEngine> {
        match self {
            CoreKind::Scheduled => Box::new(ScheduledApu::from_parts(parts)),
            CoreKind::CycleStepped => Box::new(CycleApu::from_parts(parts)),
        }
    }
}

impl fmt::Display for CoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scheduled" | "event" => Ok(CoreKind::Scheduled),
            "cycle" | "cycle-stepped" | "cyclestepped" => Ok(CoreKind::CycleStepped),
            other => Err(format!(
                "unknown core '{other}' (expected one of: scheduled, cycle)"
            )),
        }
    }
}

/// Owns the active core and forwards the engine contract to it.
pub struct CoreRegistry {
    active: Box<dyn AudioEngine>,
}

impl CoreRegistry {
    pub fn new(kind: CoreKind, config: &ApuConfig) -> Self {
        Self {
            active: kind.create(config),
        }
    }

    pub fn active_kind(&self) -> CoreKind {
        self.active.core_kind()
    }

    /// Move execution to another core without a gap in the sample stream.
    ///
    /// The outgoing core's state is transferred through a snapshot; its
    /// sample queue and note sink are handed to the new core, so consumer
    /// handles the host already holds stay valid.
    pub fn switch_core(&mut self, kind: CoreKind) {
        let from = self.active.core_kind();
        if from == kind {
            return;
        }

        let state = self.active.get_state();
        let parts = self.active.detach_parts();
        let queued = parts.producer.len();
        let mut next = kind.from_parts(parts);
        next.set_state(&state);
        self.active = next;
        debug!(
            "Switched APU core {from} -> {kind} at cycle {} ({queued} samples dropped)",
            state.cycles
        );
    }

    pub fn engine(&self) -> &dyn AudioEngine {
        self.active.as_ref()
    }

    pub fn engine_mut(&mut self) -> &mut dyn AudioEngine {
        self.active.as_mut()
    }
}

impl AudioEngine for CoreRegistry {
    fn core_kind(&self) -> CoreKind {
        self.active.core_kind()
    }

    fn step(&mut self, cpu_cycles: u32, bus: &mut dyn ApuBus) {
        self.active.step(cpu_cycles, bus)
    }

    fn write_register(&mut self, address: u16, value: u8) {
        self.active.write_register(address, value)
    }

    fn read_register(&mut self, address: u16) -> u8 {
        self.active.read_register(address)
    }

    fn pull_audio_samples(&mut self, max: Option<usize>) -> Vec<f32> {
        self.active.pull_audio_samples(max)
    }

    fn queued_sample_count(&self) -> usize {
        self.active.queued_sample_count()
    }

    fn sample_rate(&self) -> u32 {
        self.active.sample_rate()
    }

    fn get_state(&self) -> ApuSnapshot {
        self.active.get_state()
    }

    fn set_state(&mut self, snapshot: &ApuSnapshot) {
        self.active.set_state(snapshot)
    }

    fn set_external_state(&mut self, value: &Value) -> SnapshotReport {
        self.active.set_external_state(value)
    }

    fn clear_audio_buffers(&mut self) {
        self.active.clear_audio_buffers()
    }

    fn reset(&mut self) {
        self.active.reset()
    }

    fn irq_asserted(&self) -> bool {
        self.active.irq_asserted()
    }

    fn take_dmc_stall_cycles(&mut self) -> u32 {
        self.active.take_dmc_stall_cycles()
    }

    fn channel_outputs(&self) -> ChannelOutputs {
        self.active.channel_outputs()
    }

    fn set_channel_muted(&mut self, channel: ChannelId, muted: bool) {
        self.active.set_channel_muted(channel, muted)
    }

    fn set_note_sink(&mut self, sink: BoxedNoteSink) {
        self.active.set_note_sink(sink)
    }

    fn take_note_sink(&mut self) -> Option<BoxedNoteSink> {
        self.active.take_note_sink()
    }

    fn audio_consumer(&self) -> AudioConsumer {
        self.active.audio_consumer()
    }

    fn detach_parts(&mut self) -> CoreParts {
        self.active.detach_parts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_names_round_trip() {
        for kind in CoreKind::ALL {
            assert_eq!(kind.name().parse::<CoreKind>(), Ok(kind));
        }
        assert!("fast".parse::<CoreKind>().is_err());
    }

    #[test]
    fn default_mixers_differ() {
        assert_eq!(CoreKind::Scheduled.default_mixer(), MixerKind::Lookup);
        assert_eq!(CoreKind::CycleStepped.default_mixer(), MixerKind::Formula);
    }
}
