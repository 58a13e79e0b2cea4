use super::envelope::Envelope;
use super::length_counter::LengthCounter;
use crate::snapshot::{PulseState, SweepState};

// Indexed by duty then sequencer step. The sequencer counts down, so the
// waveforms read right to left in time.
const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0], // 12.5%
    [0, 1, 1, 0, 0, 0, 0, 0], // 25%
    [0, 1, 1, 1, 1, 0, 0, 0], // 50%
    [1, 0, 0, 1, 1, 1, 1, 1], // 25% negated
];

/// Which of the two pulse channels. Pulse 1 negates with one's complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseId {
    One,
    Two,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Sweep {
    enabled: bool,
    negate: bool,
    shift: u8,
    period: u8,
    divider: u8,
    reload: bool,
}

impl Sweep {
    fn write(&mut self, val: u8) {
        self.enabled = val & 0x80 != 0;
        self.period = (val >> 4) & 0x07;
        self.negate = val & 0x08 != 0;
        self.shift = val & 0x07;
        self.reload = true;
    }

    fn target(&self, id: PulseId, period: u16) -> i32 {
        let period = period as i32;
        let delta = period >> self.shift;
        if self.negate {
            match id {
                PulseId::One => period - delta - 1,
                PulseId::Two => period - delta,
            }
        } else {
            period + delta
        }
    }

    fn save(&self) -> SweepState {
        SweepState {
            enabled: self.enabled,
            negate: self.negate,
            shift: self.shift,
            period: self.period,
            divider: self.divider,
            reload: self.reload,
        }
    }

    fn load(&mut self, state: &SweepState) {
        self.enabled = state.enabled;
        self.negate = state.negate;
        self.shift = state.shift & 0x07;
        self.period = state.period & 0x07;
        self.divider = state.divider & 0x07;
        self.reload = state.reload;
    }
}

/// Square wave channel at $4000-$4003 or $4004-$4007.
#[derive(Debug, Clone)]
pub struct PulseChannel {
    id: PulseId,
    duty: u8,
    envelope: Envelope,
    sweep: Sweep,
    length: LengthCounter,
    timer_period: u16,
    /// CPU cycles until the sequencer steps.
    timer_cycles: u32,
    sequence: u8,
    /// Predicted sweep target is out of range or the period is too low.
    muted: bool,
}

impl PulseChannel {
    pub fn new(id: PulseId) -> Self {
        let mut ch = Self {
            id,
            duty: 0,
            envelope: Envelope::default(),
            sweep: Sweep::default(),
            length: LengthCounter::default(),
            timer_period: 0,
            timer_cycles: 2,
            sequence: 0,
            muted: false,
        };
        ch.update_mute();
        ch
    }

    pub fn id(&self) -> PulseId {
        self.id
    }

    /// `reg` is the sub-register index 0-3.
    pub(crate) fn write(&mut self, reg: u16, val: u8) {
        match reg & 0x03 {
            0 => {
                self.duty = val >> 6;
                self.length.halt = val & 0x20 != 0;
                self.envelope.write_control(val);
            }
            1 => self.sweep.write(val),
            2 => self.timer_period = (self.timer_period & 0x0700) | val as u16,
            _ => {
                self.timer_period = (self.timer_period & 0x00FF) | (((val & 0x07) as u16) << 8);
                self.length.load(val);
                self.sequence = 0;
                self.envelope.restart();
            }
        }
        self.update_mute();
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.length.set_enabled(enabled);
    }

    pub(crate) fn timer_cycles(&self) -> u32 {
        self.timer_cycles
    }

    pub(crate) fn elapse(&mut self, cycles: u32) {
        self.timer_cycles -= cycles;
    }

    /// Timer underflow: step the duty sequencer and re-arm.
    pub(crate) fn clock_timer(&mut self) {
        self.timer_cycles = 2 * (self.timer_period as u32 + 1);
        self.sequence = self.sequence.wrapping_sub(1) & 0x07;
    }

    pub(crate) fn clock_quarter(&mut self) {
        self.envelope.clock();
    }

    pub(crate) fn clock_half(&mut self) {
        self.length.clock();
        self.clock_sweep();
    }

    fn clock_sweep(&mut self) {
        if self.sweep.reload {
            self.sweep.divider = self.sweep.period;
            self.sweep.reload = false;
            return;
        }
        if self.sweep.divider > 0 {
            self.sweep.divider -= 1;
            return;
        }

        self.sweep.divider = self.sweep.period;
        if self.sweep.enabled && self.sweep.shift != 0 && !self.muted {
            let target = self.sweep.target(self.id, self.timer_period);
            if (8..=0x7FF).contains(&target) {
                self.timer_period = target as u16;
                self.update_mute();
            }
        }
    }

    fn update_mute(&mut self) {
        let target = self.sweep.target(self.id, self.timer_period);
        // Overflow mutes at any shift; the low bound only once shifting.
        self.muted = self.timer_period < 8
            || target > 0x7FF
            || (self.sweep.shift > 0 && target < 8);
    }

    pub fn output(&self) -> u8 {
        if !self.length.active() || self.muted {
            return 0;
        }
        DUTY_TABLE[self.duty as usize][self.sequence as usize] * self.envelope.output()
    }

    pub fn length_counter(&self) -> u8 {
        self.length.counter
    }

    pub fn timer_period(&self) -> u16 {
        self.timer_period
    }

    pub fn volume(&self) -> u8 {
        self.envelope.output()
    }

    pub fn sweep_muted(&self) -> bool {
        self.muted
    }

    pub(crate) fn save(&self) -> PulseState {
        PulseState {
            enabled: self.length.enabled,
            duty: self.duty,
            length_halt: self.length.halt,
            envelope: self.envelope.save(),
            sweep: self.sweep.save(),
            timer_period: self.timer_period,
            timer_cycles: self.timer_cycles,
            sequence: self.sequence,
            length_counter: self.length.counter,
        }
    }

    pub(crate) fn load(&mut self, state: &PulseState) {
        self.length.enabled = state.enabled;
        self.length.halt = state.length_halt;
        self.length.counter = if state.enabled { state.length_counter } else { 0 };
        self.duty = state.duty & 0x03;
        self.envelope.load(&state.envelope);
        self.sweep.load(&state.sweep);
        self.timer_period = state.timer_period & 0x07FF;
        // The counter may still be running off a longer, earlier period.
        self.timer_cycles = state.timer_cycles.clamp(1, 2 * 0x800);
        self.sequence = state.sequence & 0x07;
        self.update_mute();
    }
}
