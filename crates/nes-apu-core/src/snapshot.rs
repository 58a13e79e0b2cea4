//! Versioned, implementation-independent APU state.
//!
//! Every field is expressed in architectural terms (register values, counters,
//! CPU cycles until the next timer underflow) so a snapshot written by one
//! core can be loaded by any other. Ring-buffer contents are never part of a
//! snapshot.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::hardware::Region;

/// Schema version written by this crate.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot root must be a JSON object, found {0}")]
    NotAnObject(&'static str),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeState {
    pub start: bool,
    pub loop_flag: bool,
    pub constant_volume: bool,
    pub volume: u8,
    pub divider: u8,
    pub decay: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepState {
    pub enabled: bool,
    pub negate: bool,
    pub shift: u8,
    pub period: u8,
    pub divider: u8,
    pub reload: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseState {
    /// Enable bit from $4015.
    pub enabled: bool,
    pub duty: u8,
    pub length_halt: bool,
    pub envelope: EnvelopeState,
    pub sweep: SweepState,
    pub timer_period: u16,
    /// CPU cycles until the next sequencer step.
    pub timer_cycles: u32,
    pub sequence: u8,
    pub length_counter: u8,
}

impl Default for PulseState {
    fn default() -> Self {
        Self {
            enabled: false,
            duty: 0,
            length_halt: false,
            envelope: EnvelopeState::default(),
            sweep: SweepState::default(),
            timer_period: 0,
            timer_cycles: 2,
            sequence: 0,
            length_counter: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriangleState {
    pub enabled: bool,
    /// Linear counter control, shared with the length counter halt.
    pub control: bool,
    pub linear_reload_value: u8,
    pub linear_reload: bool,
    pub linear_counter: u8,
    pub timer_period: u16,
    pub timer_cycles: u32,
    pub sequence: u8,
    pub length_counter: u8,
}

impl Default for TriangleState {
    fn default() -> Self {
        Self {
            enabled: false,
            control: false,
            linear_reload_value: 0,
            linear_reload: false,
            linear_counter: 0,
            timer_period: 0,
            timer_cycles: 1,
            sequence: 0,
            length_counter: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseState {
    pub enabled: bool,
    pub length_halt: bool,
    pub envelope: EnvelopeState,
    pub mode: bool,
    pub period_index: u8,
    pub timer_cycles: u32,
    pub shift_register: u16,
    pub length_counter: u8,
}

impl Default for NoiseState {
    fn default() -> Self {
        Self {
            enabled: false,
            length_halt: false,
            envelope: EnvelopeState::default(),
            mode: false,
            period_index: 0,
            timer_cycles: 4,
            shift_register: 1,
            length_counter: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmcState {
    pub irq_enabled: bool,
    pub loop_flag: bool,
    pub rate_index: u8,
    pub timer_cycles: u32,
    pub sample_address: u16,
    pub sample_length: u16,
    pub current_address: u16,
    pub bytes_remaining: u16,
    pub shift_register: u8,
    pub bits_remaining: u8,
    pub buffer: u8,
    pub buffer_filled: bool,
    pub silence: bool,
    pub delta_counter: u8,
    pub irq_flag: bool,
    /// CPU cycles stolen by sample fetches and not yet collected.
    pub stall_cycles: u32,
}

impl Default for DmcState {
    fn default() -> Self {
        Self {
            irq_enabled: false,
            loop_flag: false,
            rate_index: 0,
            timer_cycles: 428,
            sample_address: 0xC000,
            sample_length: 1,
            current_address: 0xC000,
            bytes_remaining: 0,
            shift_register: 0,
            bits_remaining: 8,
            buffer: 0,
            buffer_filled: false,
            silence: true,
            delta_counter: 0,
            irq_flag: false,
            stall_cycles: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameState {
    pub five_step: bool,
    pub irq_inhibit: bool,
    pub irq_pending: bool,
    /// CPU cycles since the sequence last restarted.
    pub cycle: u32,
    pub step: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerState {
    pub low_pass: f32,
    pub dc_prev_in: f32,
    pub dc_prev_out: f32,
}

/// Complete engine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApuSnapshot {
    pub version: u32,
    /// Name of the core that produced the snapshot. Informational only.
    pub core: String,
    pub region: Region,
    /// Total CPU cycles stepped since construction.
    pub cycles: u64,
    pub pulse1: PulseState,
    pub pulse2: PulseState,
    pub triangle: TriangleState,
    pub noise: NoiseState,
    pub dmc: DmcState,
    pub frame: FrameState,
    pub mixer: MixerState,
    /// Fractional position of the resampler between two output samples, [0, 1).
    pub sample_phase: f64,
    /// Interrupt level last reported to the bus.
    pub irq_line: bool,
}

impl Default for ApuSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            core: String::new(),
            region: Region::default(),
            cycles: 0,
            pulse1: PulseState::default(),
            pulse2: PulseState::default(),
            triangle: TriangleState::default(),
            noise: NoiseState::default(),
            dmc: DmcState::default(),
            frame: FrameState::default(),
            mixer: MixerState::default(),
            sample_phase: 0.0,
            irq_line: false,
        }
    }
}

/// Fields of an external snapshot that could not be applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    /// JSON pointers of the rejected or unknown fields.
    pub rejected: Vec<String>,
}

impl SnapshotReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

impl ApuSnapshot {
    /// Build a snapshot from loosely-typed data.
    ///
    /// Starts from [`ApuSnapshot::default`] and applies each field of `value`
    /// on its own; a field that is unknown or does not fit the schema keeps
    /// its default and is listed in the report.
    pub fn from_value(value: &Value) -> (Self, SnapshotReport) {
        let mut report = SnapshotReport::default();
        let mut root = match serde_json::to_value(Self::default()) {
            Ok(v) => v,
            Err(_) => return (Self::default(), report),
        };

        if value.is_object() {
            merge_fields(&mut root, "", value, &mut report.rejected);
        } else {
            report.rejected.push(String::new());
        }

        let snapshot: Self = serde_json::from_value(root).unwrap_or_default();
        for field in &report.rejected {
            warn!("Snapshot field '{field}' ignored; keeping default");
        }
        if snapshot.version > SNAPSHOT_VERSION {
            warn!(
                "Snapshot version {} is newer than supported version {SNAPSHOT_VERSION}; loading best effort",
                snapshot.version
            );
        }
        (snapshot, report)
    }

    /// Parse JSON text leniently. Only text that is not a JSON object fails.
    pub fn from_json(text: &str) -> Result<(Self, SnapshotReport), SnapshotError> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(SnapshotError::NotAnObject(json_kind(&value)));
        }
        Ok(Self::from_value(&value))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn escape_pointer_token(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn merge_fields(root: &mut Value, pointer: &str, input: &Value, rejected: &mut Vec<String>) {
    let Some(fields) = input.as_object() else {
        rejected.push(pointer.to_string());
        return;
    };

    for (key, incoming) in fields {
        let child = format!("{pointer}/{}", escape_pointer_token(key));
        let previous = match root.pointer(&child).cloned() {
            Some(current) if current.is_object() && incoming.is_object() => {
                merge_fields(root, &child, incoming, rejected);
                continue;
            }
            Some(current) => current,
            None => {
                rejected.push(child);
                continue;
            }
        };

        if let Some(slot) = root.pointer_mut(&child) {
            *slot = incoming.clone();
        }
        if serde_json::from_value::<ApuSnapshot>(root.clone()).is_err() {
            if let Some(slot) = root.pointer_mut(&child) {
                *slot = previous;
            }
            rejected.push(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let (snap, report) = ApuSnapshot::from_value(&json!({
            "pulse1": { "timer_period": 0x1FF },
        }));
        assert!(report.is_clean());
        assert_eq!(snap.pulse1.timer_period, 0x1FF);
        assert_eq!(snap.pulse1.timer_cycles, 2);
        assert_eq!(snap.noise.shift_register, 1);
        assert_eq!(snap.version, SNAPSHOT_VERSION);
    }

    #[test]
    fn wrong_types_are_rejected_per_field() {
        let (snap, report) = ApuSnapshot::from_value(&json!({
            "dmc": { "delta_counter": "loud", "rate_index": 7 },
            "triangle": { "linear_counter": 300 },
            "frame": 12,
        }));
        assert_eq!(snap.dmc.rate_index, 7);
        assert_eq!(snap.dmc.delta_counter, 0);
        assert_eq!(snap.triangle.linear_counter, 0);
        assert_eq!(
            report.rejected,
            vec![
                "/dmc/delta_counter".to_string(),
                "/frame".to_string(),
                "/triangle/linear_counter".to_string(),
            ]
        );
    }

    #[test]
    fn unknown_fields_are_reported() {
        let (_, report) = ApuSnapshot::from_value(&json!({ "vrc6": { "enabled": true } }));
        assert_eq!(report.rejected, vec!["/vrc6".to_string()]);
    }

    #[test]
    fn non_object_text_is_an_error() {
        assert!(matches!(
            ApuSnapshot::from_json("[1, 2]"),
            Err(SnapshotError::NotAnObject("an array"))
        ));
        assert!(matches!(
            ApuSnapshot::from_json("{"),
            Err(SnapshotError::Json(_))
        ));
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let mut snap = ApuSnapshot::default();
        snap.core = "scheduled".into();
        snap.pulse2.sweep.shift = 3;
        snap.dmc.current_address = 0xFFF0;
        snap.sample_phase = 0.25;
        let text = snap.to_json_pretty().unwrap();
        let (back, report) = ApuSnapshot::from_json(&text).unwrap();
        assert!(report.is_clean());
        assert_eq!(back, snap);
    }
}
