// https://www.nesdev.org/wiki/APU_Length_Counter
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LengthCounter {
    /// Channel enable bit from $4015.
    pub(crate) enabled: bool,
    pub(crate) halt: bool,
    pub(crate) counter: u8,
}

impl LengthCounter {
    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.counter = 0;
        }
    }

    /// Load from the table using the top five bits of the channel's last register.
    pub(crate) fn load(&mut self, val: u8) {
        if self.enabled {
            self.counter = LENGTH_TABLE[(val >> 3) as usize];
        }
    }

    /// Half-frame clock.
    pub(crate) fn clock(&mut self) {
        if !self.halt && self.counter > 0 {
            self.counter -= 1;
        }
    }

    pub(crate) fn active(&self) -> bool {
        self.counter > 0
    }
}

/// Length counter load values, indexed by bits 7-3 of $4003/$4007/$400B/$400F.
pub const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_ignored_while_disabled() {
        let mut len = LengthCounter::default();
        len.load(0x08);
        assert_eq!(len.counter, 0);
        len.set_enabled(true);
        len.load(0x08);
        assert_eq!(len.counter, 254);
    }

    #[test]
    fn disable_forces_zero() {
        let mut len = LengthCounter::default();
        len.set_enabled(true);
        len.load(0xF8);
        assert_eq!(len.counter, 30);
        len.set_enabled(false);
        assert_eq!(len.counter, 0);
    }

    #[test]
    fn halt_freezes_counter() {
        let mut len = LengthCounter::default();
        len.set_enabled(true);
        len.load(0x18);
        len.halt = true;
        len.clock();
        assert_eq!(len.counter, 2);
        len.halt = false;
        len.clock();
        len.clock();
        len.clock();
        assert_eq!(len.counter, 0);
    }
}
