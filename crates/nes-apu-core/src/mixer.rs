use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::channels::ChannelId;
use crate::snapshot::MixerState;

/// Largest difference allowed between the two mixing strategies.
pub const MIXER_TOLERANCE: f32 = 1e-4;

/// Default DC blocker pole.
pub const DC_BLOCK_R: f32 = 0.995;

/// Default low-pass cutoff in Hz.
pub const LOW_PASS_CUTOFF_HZ: f32 = 14_000.0;

/// How channel levels are combined into one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixerKind {
    /// Evaluate the nonlinear curves directly.
    #[default]
    Formula,
    /// Read the curves from precomputed tables.
    Lookup,
}

impl MixerKind {
    pub fn name(self) -> &'static str {
        match self {
            MixerKind::Formula => "formula",
            MixerKind::Lookup => "lookup",
        }
    }
}

impl fmt::Display for MixerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MixerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "formula" => Ok(MixerKind::Formula),
            "lookup" | "table" => Ok(MixerKind::Lookup),
            other => Err(format!("unknown mixer '{other}'")),
        }
    }
}

/// Instantaneous channel levels: 0-15 for pulse, triangle and noise, 0-127
/// for the DMC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOutputs {
    pub pulse1: u8,
    pub pulse2: u8,
    pub triangle: u8,
    pub noise: u8,
    pub dmc: u8,
}

impl ChannelOutputs {
    pub fn get(&self, id: ChannelId) -> u8 {
        match id {
            ChannelId::Pulse1 => self.pulse1,
            ChannelId::Pulse2 => self.pulse2,
            ChannelId::Triangle => self.triangle,
            ChannelId::Noise => self.noise,
            ChannelId::Dmc => self.dmc,
        }
    }

    fn masked(mut self, muted: u8) -> Self {
        for id in ChannelId::ALL {
            if muted & (1 << id.index()) != 0 {
                match id {
                    ChannelId::Pulse1 => self.pulse1 = 0,
                    ChannelId::Pulse2 => self.pulse2 = 0,
                    ChannelId::Triangle => self.triangle = 0,
                    ChannelId::Noise => self.noise = 0,
                    ChannelId::Dmc => self.dmc = 0,
                }
            }
        }
        self
    }
}

pub fn pulse_formula(pulse1: u8, pulse2: u8) -> f32 {
    let sum = pulse1 as f32 + pulse2 as f32;
    if sum == 0.0 {
        return 0.0;
    }
    95.88 / (8128.0 / sum + 100.0)
}

pub fn tnd_formula(triangle: u8, noise: u8, dmc: u8) -> f32 {
    let sum = triangle as f32 / 8227.0 + noise as f32 / 12241.0 + dmc as f32 / 22638.0;
    if sum == 0.0 {
        return 0.0;
    }
    159.79 / (1.0 / sum + 100.0)
}

static PULSE_TABLE: Lazy<[f32; 31]> = Lazy::new(|| {
    let mut table = [0.0; 31];
    for (n, entry) in table.iter_mut().enumerate().skip(1) {
        *entry = (95.88 / (8128.0 / n as f64 + 100.0)) as f32;
    }
    table
});

// Indexed [triangle][noise][dmc].
static TND_TABLE: Lazy<Vec<f32>> = Lazy::new(|| {
    let mut table = vec![0.0; 16 * 16 * 128];
    for t in 0..16 {
        for n in 0..16 {
            for d in 0..128 {
                let sum = t as f64 / 8227.0 + n as f64 / 12241.0 + d as f64 / 22638.0;
                if sum > 0.0 {
                    table[tnd_index(t, n, d)] = (159.79 / (1.0 / sum + 100.0)) as f32;
                }
            }
        }
    }
    table
});

#[inline]
fn tnd_index(triangle: usize, noise: usize, dmc: usize) -> usize {
    (triangle << 11) | (noise << 7) | dmc
}

pub fn pulse_lookup(pulse1: u8, pulse2: u8) -> f32 {
    PULSE_TABLE[((pulse1 & 0x0F) + (pulse2 & 0x0F)) as usize]
}

pub fn tnd_lookup(triangle: u8, noise: u8, dmc: u8) -> f32 {
    TND_TABLE[tnd_index(
        (triangle & 0x0F) as usize,
        (noise & 0x0F) as usize,
        (dmc & 0x7F) as usize,
    )]
}

/// Build the lookup tables now instead of on the first sample.
pub fn warm_tables() {
    Lazy::force(&PULSE_TABLE);
    Lazy::force(&TND_TABLE);
}

/// Nonlinear channel mix followed by the output filters.
#[derive(Debug, Clone)]
pub struct Mixer {
    kind: MixerKind,
    muted: u8,
    low_pass_coeff: f32,
    low_pass: f32,
    dc_r: f32,
    dc_prev_in: f32,
    dc_prev_out: f32,
    gain: f32,
}

impl Mixer {
    pub fn new(kind: MixerKind, sample_rate: u32, cutoff_hz: f32, dc_r: f32, gain: f32) -> Self {
        if kind == MixerKind::Lookup {
            warm_tables();
        }
        Self {
            kind,
            muted: 0,
            low_pass_coeff: low_pass_coeff(cutoff_hz, sample_rate),
            low_pass: 0.0,
            dc_r,
            dc_prev_in: 0.0,
            dc_prev_out: 0.0,
            gain,
        }
    }

    pub fn kind(&self) -> MixerKind {
        self.kind
    }

    /// Unfiltered mix of the audible channels, 0.0 to about 1.0.
    pub fn raw(&self, outputs: ChannelOutputs) -> f32 {
        let o = outputs.masked(self.muted);
        match self.kind {
            MixerKind::Formula => {
                pulse_formula(o.pulse1, o.pulse2) + tnd_formula(o.triangle, o.noise, o.dmc)
            }
            MixerKind::Lookup => {
                pulse_lookup(o.pulse1, o.pulse2) + tnd_lookup(o.triangle, o.noise, o.dmc)
            }
        }
    }

    /// Mix, filter and scale one output sample.
    pub fn sample(&mut self, outputs: ChannelOutputs) -> f32 {
        let x = self.raw(outputs);
        self.low_pass += (x - self.low_pass) * self.low_pass_coeff;
        let y = self.dc_block(self.low_pass);
        y * self.gain
    }

    fn dc_block(&mut self, input: f32) -> f32 {
        let out = input - self.dc_prev_in + self.dc_r * self.dc_prev_out;
        self.dc_prev_in = input;
        self.dc_prev_out = out;
        out
    }

    pub fn set_channel_muted(&mut self, channel: ChannelId, muted: bool) {
        let bit = 1 << channel.index();
        if muted {
            self.muted |= bit;
        } else {
            self.muted &= !bit;
        }
    }

    pub fn is_channel_muted(&self, channel: ChannelId) -> bool {
        self.muted & (1 << channel.index()) != 0
    }

    pub fn reset_filters(&mut self) {
        self.low_pass = 0.0;
        self.dc_prev_in = 0.0;
        self.dc_prev_out = 0.0;
    }

    pub(crate) fn save(&self) -> MixerState {
        MixerState {
            low_pass: self.low_pass,
            dc_prev_in: self.dc_prev_in,
            dc_prev_out: self.dc_prev_out,
        }
    }
}

fn low_pass_coeff(cutoff_hz: f32, sample_rate: u32) -> f32 {
    let coeff = 1.0 - (-2.0 * PI * cutoff_hz / sample_rate as f32).exp();
    if coeff.is_finite() {
        coeff.clamp(f32::EPSILON, 1.0)
    } else {
        1.0
    }
}
