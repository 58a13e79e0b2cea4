//! The five sound channels and the units they share.

use std::fmt;
use std::str::FromStr;

mod envelope;
mod length_counter;

pub mod dmc;
pub mod noise;
pub mod pulse;
pub mod triangle;

pub use dmc::DmcChannel;
pub use length_counter::LENGTH_TABLE;
pub use noise::NoiseChannel;
pub use pulse::{PulseChannel, PulseId};
pub use triangle::TriangleChannel;

/// Identifies one of the five channels in mute masks and note events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Pulse1,
    Pulse2,
    Triangle,
    Noise,
    Dmc,
}

impl ChannelId {
    pub const ALL: [ChannelId; 5] = [
        ChannelId::Pulse1,
        ChannelId::Pulse2,
        ChannelId::Triangle,
        ChannelId::Noise,
        ChannelId::Dmc,
    ];

    /// Bit position in $4015 and in mute masks.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Pulse1 => "pulse1",
            ChannelId::Pulse2 => "pulse2",
            ChannelId::Triangle => "triangle",
            ChannelId::Noise => "noise",
            ChannelId::Dmc => "dmc",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChannelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelId::ALL
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown channel '{s}'"))
    }
}
