//! Note events for hosts that drive an external synthesizer.
//!
//! Channel state is sampled at every quarter frame and turned into MIDI-style
//! note on/off pairs. Nothing here runs unless a sink is installed.

use crate::channels::{ChannelId, DmcChannel, NoiseChannel, PulseChannel, TriangleChannel};

/// General MIDI program for the pulse channels (square lead).
pub const PROGRAM_SQUARE_LEAD: u8 = 80;
/// General MIDI program for the triangle (synth bass).
pub const PROGRAM_SYNTH_BASS: u8 = 38;
/// Percussion channels report program 0.
pub const PROGRAM_PERCUSSION: u8 = 0;

const DRUM_CLOSED_HAT: u8 = 42;
const DRUM_SNARE: u8 = 38;
const DRUM_KICK: u8 = 36;
const DRUM_DMC: u8 = 35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub channel: ChannelId,
    pub program: u8,
    pub note: u8,
    pub velocity: u8,
    /// `false` for note-off.
    pub on: bool,
}

/// Receiver of note events. Implemented for any `FnMut(NoteEvent)`.
pub trait NoteSink {
    fn note(&mut self, event: NoteEvent);
}

impl<F: FnMut(NoteEvent)> NoteSink for F {
    fn note(&mut self, event: NoteEvent) {
        self(event)
    }
}

pub type BoxedNoteSink = Box<dyn NoteSink + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Voice {
    program: u8,
    note: u8,
    velocity: u8,
}

/// MIDI note nearest to `freq`, clamped to 0-127.
pub fn midi_note(freq: f64) -> u8 {
    if !freq.is_finite() || freq <= 0.0 {
        return 0;
    }
    let note = 69.0 + 12.0 * (freq / 440.0).log2();
    note.round().clamp(0.0, 127.0) as u8
}

fn envelope_velocity(volume: u8) -> u8 {
    (volume as u16 * 8 + 7).min(127) as u8
}

fn pulse_voice(ch: &PulseChannel, cpu_hz: u32) -> Option<Voice> {
    if ch.length_counter() == 0 || ch.sweep_muted() || ch.volume() == 0 {
        return None;
    }
    let freq = cpu_hz as f64 / (16.0 * (ch.timer_period() as f64 + 1.0));
    Some(Voice {
        program: PROGRAM_SQUARE_LEAD,
        note: midi_note(freq),
        velocity: envelope_velocity(ch.volume()),
    })
}

fn triangle_voice(ch: &TriangleChannel, cpu_hz: u32) -> Option<Voice> {
    if ch.length_counter() == 0 || ch.linear_counter() == 0 || ch.timer_period() < 2 {
        return None;
    }
    let freq = cpu_hz as f64 / (32.0 * (ch.timer_period() as f64 + 1.0));
    Some(Voice {
        program: PROGRAM_SYNTH_BASS,
        note: midi_note(freq),
        velocity: 100,
    })
}

fn noise_voice(ch: &NoiseChannel) -> Option<Voice> {
    if ch.length_counter() == 0 || ch.volume() == 0 {
        return None;
    }
    let note = match ch.period_index() {
        0..=3 => DRUM_CLOSED_HAT,
        4..=7 => DRUM_SNARE,
        _ => DRUM_KICK,
    };
    Some(Voice {
        program: PROGRAM_PERCUSSION,
        note,
        velocity: envelope_velocity(ch.volume()),
    })
}

fn dmc_voice(ch: &DmcChannel) -> Option<Voice> {
    ch.playing().then_some(Voice {
        program: PROGRAM_PERCUSSION,
        note: DRUM_DMC,
        velocity: 100,
    })
}

/// Remembers the sounding note of each channel between observations.
#[derive(Debug, Default, Clone)]
pub struct NoteTracker {
    sounding: [Option<Voice>; 5],
}

impl NoteTracker {
    fn update(&mut self, channel: ChannelId, voice: Option<Voice>, sink: &mut dyn NoteSink) {
        let slot = &mut self.sounding[channel.index()];
        let held = slot.map(|v| (v.program, v.note));
        if held == voice.map(|v| (v.program, v.note)) {
            return;
        }
        if let Some(old) = slot.take() {
            sink.note(NoteEvent {
                channel,
                program: old.program,
                note: old.note,
                velocity: 0,
                on: false,
            });
        }
        if let Some(new) = voice {
            sink.note(NoteEvent {
                channel,
                program: new.program,
                note: new.note,
                velocity: new.velocity,
                on: true,
            });
            *slot = Some(new);
        }
    }

    fn release_all(&mut self, sink: &mut dyn NoteSink) {
        for channel in ChannelId::ALL {
            self.update(channel, None, sink);
        }
    }
}

/// Optional sink plus the tracking state needed to feed it. Moves between
/// cores as one unit so a hot swap does not repeat note-ons.
#[derive(Default)]
pub struct NoteOutput {
    sink: Option<BoxedNoteSink>,
    tracker: NoteTracker,
}

pub(crate) struct Voices<'a> {
    pub pulse1: &'a PulseChannel,
    pub pulse2: &'a PulseChannel,
    pub triangle: &'a TriangleChannel,
    pub noise: &'a NoiseChannel,
    pub dmc: &'a DmcChannel,
    pub cpu_hz: u32,
}

impl NoteOutput {
    pub fn is_active(&self) -> bool {
        self.sink.is_some()
    }

    /// Install a sink, returning the previous one. Notes held for the old
    /// sink are forgotten without note-offs.
    pub fn set_sink(&mut self, sink: Option<BoxedNoteSink>) -> Option<BoxedNoteSink> {
        self.tracker = NoteTracker::default();
        std::mem::replace(&mut self.sink, sink)
    }

    pub fn take_sink(&mut self) -> Option<BoxedNoteSink> {
        self.set_sink(None)
    }

    pub(crate) fn observe(&mut self, v: Voices<'_>) {
        let Some(sink) = self.sink.as_deref_mut() else {
            return;
        };
        let t = &mut self.tracker;
        t.update(ChannelId::Pulse1, pulse_voice(v.pulse1, v.cpu_hz), sink);
        t.update(ChannelId::Pulse2, pulse_voice(v.pulse2, v.cpu_hz), sink);
        t.update(ChannelId::Triangle, triangle_voice(v.triangle, v.cpu_hz), sink);
        t.update(ChannelId::Noise, noise_voice(v.noise), sink);
        t.update(ChannelId::Dmc, dmc_voice(v.dmc), sink);
    }

    /// Note-off for everything still sounding.
    pub(crate) fn silence(&mut self) {
        if let Some(sink) = self.sink.as_deref_mut() {
            self.tracker.release_all(sink);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midi_note_of_a440() {
        assert_eq!(midi_note(440.0), 69);
        assert_eq!(midi_note(880.0), 81);
        assert_eq!(midi_note(261.63), 60);
        assert_eq!(midi_note(0.0), 0);
        assert_eq!(midi_note(1.0e9), 127);
    }

    #[test]
    fn pitch_change_sends_off_before_on() {
        let mut events = Vec::new();
        let mut sink = |e: NoteEvent| events.push(e);
        let mut tracker = NoteTracker::default();
        let voice = |note| {
            Some(Voice {
                program: PROGRAM_SQUARE_LEAD,
                note,
                velocity: 127,
            })
        };
        tracker.update(ChannelId::Pulse1, voice(60), &mut sink);
        tracker.update(ChannelId::Pulse1, voice(60), &mut sink);
        tracker.update(ChannelId::Pulse1, voice(62), &mut sink);
        tracker.update(ChannelId::Pulse1, None, &mut sink);
        let summary: Vec<(u8, bool)> = events.iter().map(|e| (e.note, e.on)).collect();
        assert_eq!(
            summary,
            vec![(60, true), (60, false), (62, true), (62, false)]
        );
    }
}
