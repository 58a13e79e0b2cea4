//! Cycle-driven NES APU emulation core.
//!
//! This crate contains the platform-agnostic sound engine: the five channels,
//! the frame sequencer, the mixer and the sample queue. The CPU and memory map
//! live with the host, which drives the engine through [`engine::AudioEngine`]
//! and services DMC reads and IRQs through [`bus::ApuBus`].

/// APU cores: register decoding, status, reset and state transfer.
pub mod apu;

/// Lock-free audio ring buffer between the engine and the host callback.
pub mod audio_queue;

/// The CPU-side collaborator consulted for DMC fetches and IRQs.
pub mod bus;

/// Pulse, triangle, noise and DMC channel models.
pub mod channels;

/// Engine construction parameters.
pub mod config;

/// The engine contract shared by every core.
pub mod engine;

/// Quarter/half frame clocking and the frame interrupt.
pub mod frame_sequencer;

/// Regions and their clock and period tables.
pub mod hardware;

/// Nonlinear mixing and output filtering.
pub mod mixer;

/// Note events derived from channel activity.
pub mod notes;

/// Core selection and hot swapping.
pub mod registry;

/// Event-driven and per-cycle time advance.
pub mod scheduler;

/// Versioned, core-independent state snapshots.
pub mod snapshot;

pub use apu::{Apu, CycleApu, ScheduledApu};
pub use bus::{ApuBus, FlatBus, OpenBus};
pub use config::ApuConfig;
pub use engine::AudioEngine;
pub use hardware::Region;
pub use registry::{CoreKind, CoreRegistry};
pub use snapshot::{ApuSnapshot, SnapshotError, SnapshotReport};
