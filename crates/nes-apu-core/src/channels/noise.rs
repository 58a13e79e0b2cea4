use super::envelope::Envelope;
use super::length_counter::LengthCounter;
use crate::hardware::Region;
use crate::snapshot::NoiseState;

/// Noise channel at $400C-$400F.
#[derive(Debug, Clone)]
pub struct NoiseChannel {
    envelope: Envelope,
    length: LengthCounter,
    /// Short mode: feedback from bit 6 instead of bit 1.
    mode: bool,
    period_index: u8,
    timer_cycles: u32,
    shift_register: u16,
    periods: &'static [u16; 16],
}

impl NoiseChannel {
    pub fn new(region: Region) -> Self {
        let periods = region.noise_periods();
        Self {
            envelope: Envelope::default(),
            length: LengthCounter::default(),
            mode: false,
            period_index: 0,
            timer_cycles: periods[0] as u32,
            shift_register: 1,
            periods,
        }
    }

    pub(crate) fn write(&mut self, reg: u16, val: u8) {
        match reg & 0x03 {
            0 => {
                self.length.halt = val & 0x20 != 0;
                self.envelope.write_control(val);
            }
            1 => {}
            2 => {
                self.mode = val & 0x80 != 0;
                self.period_index = val & 0x0F;
            }
            _ => {
                self.length.load(val);
                self.envelope.restart();
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
        self.timer_cycles = self.periods[self.period_index as usize] as u32;
        self.clock_shift_register();
    }

    fn clock_shift_register(&mut self) {
        let tap = if self.mode { 6 } else { 1 };
        let feedback = (self.shift_register ^ (self.shift_register >> tap)) & 1;
        self.shift_register = (self.shift_register >> 1) | (feedback << 14);
        if self.shift_register == 0 {
            self.shift_register = 1;
        }
    }

    pub(crate) fn clock_quarter(&mut self) {
        self.envelope.clock();
    }

    pub(crate) fn clock_half(&mut self) {
        self.length.clock();
    }

    pub fn output(&self) -> u8 {
        if !self.length.active() || self.shift_register & 1 != 0 {
            return 0;
        }
        self.envelope.output()
    }

    pub fn length_counter(&self) -> u8 {
        self.length.counter
    }

    pub fn period_index(&self) -> u8 {
        self.period_index
    }

    pub fn volume(&self) -> u8 {
        self.envelope.output()
    }

    pub fn shift_register(&self) -> u16 {
        self.shift_register
    }

    pub(crate) fn save(&self) -> NoiseState {
        NoiseState {
            enabled: self.length.enabled,
            length_halt: self.length.halt,
            envelope: self.envelope.save(),
            mode: self.mode,
            period_index: self.period_index,
            timer_cycles: self.timer_cycles,
            shift_register: self.shift_register,
            length_counter: self.length.counter,
        }
    }

    pub(crate) fn load(&mut self, state: &NoiseState) {
        self.length.enabled = state.enabled;
        self.length.halt = state.length_halt;
        self.length.counter = if state.enabled { state.length_counter } else { 0 };
        self.envelope.load(&state.envelope);
        self.mode = state.mode;
        self.period_index = state.period_index & 0x0F;
        let longest = self.periods[15] as u32;
        self.timer_cycles = state.timer_cycles.clamp(1, longest);
        self.shift_register = match state.shift_register & 0x7FFF {
            0 => 1,
            v => v,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_mode_from_seed_one() {
        let mut ch = NoiseChannel::new(Region::Ntsc);
        let mut bits = Vec::new();
        for _ in 0..8 {
            ch.clock_shift_register();
            bits.push(ch.shift_register() & 1);
        }
        assert_eq!(bits, vec![0; 8]);
        assert_eq!(ch.shift_register(), 0x0080);
    }

    #[test]
    fn short_mode_taps_bit_six() {
        let mut ch = NoiseChannel::new(Region::Ntsc);
        ch.write(2, 0x80);
        ch.clock_shift_register();
        // bit0 ^ bit6 = 1, shifted into bit 14.
        assert_eq!(ch.shift_register(), 0x4000);
    }

    #[test]
    fn zero_register_is_repaired_on_load() {
        let mut ch = NoiseChannel::new(Region::Ntsc);
        let mut state = ch.save();
        state.shift_register = 0x8000;
        ch.load(&state);
        assert_eq!(ch.shift_register(), 1);
    }

    #[test]
    fn period_comes_from_region_table() {
        let mut ch = NoiseChannel::new(Region::Pal);
        ch.write(2, 0x0F);
        ch.clock_timer();
        assert_eq!(ch.timer_cycles(), 3778);
    }

    #[test]
    fn output_gated_by_bit_zero_and_length() {
        let mut ch = NoiseChannel::new(Region::Ntsc);
        ch.set_enabled(true);
        ch.write(0, 0x1C);
        assert_eq!(ch.output(), 0);
        ch.write(3, 0x08);
        // Seed 1 has bit0 set: silent until the first shift.
        assert_eq!(ch.output(), 0);
        ch.clock_shift_register();
        assert_eq!(ch.output(), 12);
    }
}
