use super::length_counter::LengthCounter;
use crate::snapshot::TriangleState;

const TRIANGLE_SEQUENCE: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11,
    12, 13, 14, 15,
];

/// Triangle channel at $4008-$400B.
#[derive(Debug, Clone)]
pub struct TriangleChannel {
    /// Linear counter control; doubles as the length counter halt.
    control: bool,
    linear_reload_value: u8,
    linear_reload: bool,
    linear_counter: u8,
    length: LengthCounter,
    timer_period: u16,
    timer_cycles: u32,
    sequence: u8,
}

impl Default for TriangleChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl TriangleChannel {
    pub fn new() -> Self {
        Self {
            control: false,
            linear_reload_value: 0,
            linear_reload: false,
            linear_counter: 0,
            length: LengthCounter::default(),
            timer_period: 0,
            timer_cycles: 1,
            sequence: 0,
        }
    }

    pub(crate) fn write(&mut self, reg: u16, val: u8) {
        match reg & 0x03 {
            0 => {
                self.control = val & 0x80 != 0;
                self.length.halt = self.control;
                self.linear_reload_value = val & 0x7F;
                self.linear_reload = true;
            }
            1 => {}
            2 => self.timer_period = (self.timer_period & 0x0700) | val as u16,
            _ => {
                self.timer_period = (self.timer_period & 0x00FF) | (((val & 0x07) as u16) << 8);
                self.length.load(val);
                self.linear_reload = true;
            }
        }
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

    pub(crate) fn clock_timer(&mut self) {
        self.timer_cycles = self.timer_period as u32 + 1;
        if self.length.active() && self.linear_counter > 0 {
            self.sequence = (self.sequence + 1) & 0x1F;
        }
    }

    /// Quarter-frame: linear counter.
    pub(crate) fn clock_quarter(&mut self) {
        if self.linear_reload {
            self.linear_counter = self.linear_reload_value;
        } else if self.linear_counter > 0 {
            self.linear_counter -= 1;
        }
        if !self.control {
            self.linear_reload = false;
        }
    }

    pub(crate) fn clock_half(&mut self) {
        self.length.clock();
    }

    pub fn output(&self) -> u8 {
        if !self.length.active() || self.linear_counter == 0 || self.timer_period < 2 {
            return 0;
        }
        TRIANGLE_SEQUENCE[self.sequence as usize]
    }

    pub fn length_counter(&self) -> u8 {
        self.length.counter
    }

    pub fn linear_counter(&self) -> u8 {
        self.linear_counter
    }

    pub fn timer_period(&self) -> u16 {
        self.timer_period
    }

    pub(crate) fn reset_sequence(&mut self) {
        self.sequence = 0;
    }

    pub(crate) fn save(&self) -> TriangleState {
        TriangleState {
            enabled: self.length.enabled,
            control: self.control,
            linear_reload_value: self.linear_reload_value,
            linear_reload: self.linear_reload,
            linear_counter: self.linear_counter,
            timer_period: self.timer_period,
            timer_cycles: self.timer_cycles,
            sequence: self.sequence,
            length_counter: self.length.counter,
        }
    }

    pub(crate) fn load(&mut self, state: &TriangleState) {
        self.length.enabled = state.enabled;
        self.control = state.control;
        self.length.halt = state.control;
        self.length.counter = if state.enabled { state.length_counter } else { 0 };
        self.linear_reload_value = state.linear_reload_value & 0x7F;
        self.linear_reload = state.linear_reload;
        self.linear_counter = state.linear_counter & 0x7F;
        self.timer_period = state.timer_period & 0x07FF;
        self.timer_cycles = state.timer_cycles.clamp(1, 0x800);
        self.sequence = state.sequence & 0x1F;
    }
}
