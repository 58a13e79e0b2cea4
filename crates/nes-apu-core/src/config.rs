use serde::{Deserialize, Serialize};

use crate::hardware::Region;
use crate::mixer::{DC_BLOCK_R, LOW_PASS_CUTOFF_HZ, MixerKind};

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;
/// Audio buffered between the engine and the host callback.
pub const DEFAULT_LATENCY_MS: u32 = 250;

/// Engine construction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApuConfig {
    pub region: Region,
    pub sample_rate: u32,
    pub latency_ms: u32,
    /// `None` lets each core pick its own mixer.
    pub mixer: Option<MixerKind>,
    pub low_pass_cutoff_hz: f32,
    pub dc_block_r: f32,
    pub output_gain: f32,
}

impl Default for ApuConfig {
    fn default() -> Self {
        Self {
            region: Region::Ntsc,
            sample_rate: DEFAULT_SAMPLE_RATE,
            latency_ms: DEFAULT_LATENCY_MS,
            mixer: None,
            low_pass_cutoff_hz: LOW_PASS_CUTOFF_HZ,
            dc_block_r: DC_BLOCK_R,
            output_gain: 1.0,
        }
    }
}

impl ApuConfig {
    /// Clamp every field into the range the engine supports.
    pub fn normalized(&self) -> Self {
        let defaults = Self::default();
        let finite_or = |v: f32, d: f32| if v.is_finite() { v } else { d };
        Self {
            region: self.region,
            sample_rate: self.sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE),
            latency_ms: self.latency_ms.clamp(10, 2_000),
            mixer: self.mixer,
            low_pass_cutoff_hz: finite_or(self.low_pass_cutoff_hz, defaults.low_pass_cutoff_hz)
                .max(1.0),
            dc_block_r: finite_or(self.dc_block_r, defaults.dc_block_r).clamp(0.0, 0.9999),
            output_gain: finite_or(self.output_gain, defaults.output_gain).max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let cfg: ApuConfig = serde_json::from_str(r#"{ "region": "pal" }"#).unwrap();
        assert_eq!(cfg.region, Region::Pal);
        assert_eq!(cfg.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(cfg.mixer, None);
    }

    #[test]
    fn normalized_clamps_ranges() {
        let cfg = ApuConfig {
            sample_rate: 1_000_000,
            dc_block_r: 2.0,
            output_gain: f32::NAN,
            ..ApuConfig::default()
        }
        .normalized();
        assert_eq!(cfg.sample_rate, MAX_SAMPLE_RATE);
        assert_eq!(cfg.dc_block_r, 0.9999);
        assert_eq!(cfg.output_gain, 1.0);
    }
}
