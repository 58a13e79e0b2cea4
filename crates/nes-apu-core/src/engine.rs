use serde_json::Value;

use crate::audio_queue::{AudioConsumer, AudioProducer};
use crate::bus::ApuBus;
use crate::channels::ChannelId;
use crate::config::ApuConfig;
use crate::mixer::ChannelOutputs;
use crate::notes::{BoxedNoteSink, NoteOutput};
use crate::registry::CoreKind;
use crate::snapshot::{ApuSnapshot, SnapshotReport};

/// Samples returned by an unbounded pull.
pub const PULL_SAFETY_CAP: usize = 4096;

/// Status register.
pub const STATUS_REGISTER: u16 = 0x4015;
/// Frame counter register.
pub const FRAME_COUNTER_REGISTER: u16 = 0x4017;

/// The contract every APU core implements.
///
/// The CPU side only ever talks to the APU through this trait, so cores can
/// be swapped at runtime through [`crate::registry::CoreRegistry`].
pub trait AudioEngine: Send {
    fn core_kind(&self) -> CoreKind;

    /// Advance emulation by `cpu_cycles` CPU cycles.
    fn step(&mut self, cpu_cycles: u32, bus: &mut dyn ApuBus);

    /// Writes outside $4000-$4013, $4015 and $4017 are ignored.
    fn write_register(&mut self, address: u16, value: u8);

    /// Only $4015 is readable; reading it acknowledges the frame interrupt.
    /// Every other address reads as 0.
    fn read_register(&mut self, address: u16) -> u8;

    /// Up to `max` of the oldest queued samples, or up to
    /// [`PULL_SAFETY_CAP`] when `max` is `None`.
    fn pull_audio_samples(&mut self, max: Option<usize>) -> Vec<f32>;

    fn queued_sample_count(&self) -> usize;

    fn sample_rate(&self) -> u32;

    fn get_state(&self) -> ApuSnapshot;

    /// Load a snapshot from any core. Audio buffers and filter history are
    /// flushed afterwards.
    fn set_state(&mut self, snapshot: &ApuSnapshot);

    /// Load loosely-typed state, applying whatever fields fit the schema.
    fn set_external_state(&mut self, value: &Value) -> SnapshotReport {
        let (snapshot, report) = ApuSnapshot::from_value(value);
        self.set_state(&snapshot);
        report
    }

    fn clear_audio_buffers(&mut self);

    /// Power-on state, applied through the normal register write path.
    fn reset(&mut self);

    /// Combined frame and DMC interrupt level. Unlike the bus line, this
    /// drops as soon as a register access acknowledges the interrupt.
    fn irq_asserted(&self) -> bool;

    /// CPU cycles stolen by DMC fetches since the last call.
    fn take_dmc_stall_cycles(&mut self) -> u32;

    fn channel_outputs(&self) -> ChannelOutputs;

    fn set_channel_muted(&mut self, channel: ChannelId, muted: bool);

    fn set_note_sink(&mut self, sink: BoxedNoteSink);

    fn take_note_sink(&mut self) -> Option<BoxedNoteSink>;

    /// A handle for pulling samples from another thread.
    fn audio_consumer(&self) -> AudioConsumer;

    /// Hand over the output side of this core. The core keeps running on
    /// a private queue afterwards and is normally dropped.
    fn detach_parts(&mut self) -> CoreParts;
}

/// State that outlives a core across a hot swap: the sample queue the host is
/// reading from, the note sink and the construction config.
pub struct CoreParts {
    pub producer: AudioProducer,
    pub notes: NoteOutput,
    pub config: ApuConfig,
}
