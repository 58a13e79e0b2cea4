use crate::snapshot::EnvelopeState;

// https://www.nesdev.org/wiki/APU_Envelope
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Envelope {
    pub(crate) start: bool,
    /// Shares its bit with the length counter halt flag.
    pub(crate) loop_flag: bool,
    pub(crate) constant_volume: bool,
    /// Constant volume, or the divider period minus one.
    pub(crate) volume: u8,
    divider: u8,
    decay: u8,
}

impl Envelope {
    /// Decode the `--LC VVVV` bits of the channel's first register.
    pub(crate) fn write_control(&mut self, val: u8) {
        self.loop_flag = val & 0x20 != 0;
        self.constant_volume = val & 0x10 != 0;
        self.volume = val & 0x0F;
    }

    pub(crate) fn restart(&mut self) {
        self.start = true;
    }

    /// Quarter-frame clock.
    pub(crate) fn clock(&mut self) {
        if self.start {
            self.start = false;
            self.decay = 15;
            self.divider = self.volume + 1;
            return;
        }

        self.divider = self.divider.saturating_sub(1);
        if self.divider == 0 {
            self.divider = self.volume + 1;
            if self.decay > 0 {
                self.decay -= 1;
            } else if self.loop_flag {
                self.decay = 15;
            }
        }
    }

    pub(crate) fn output(&self) -> u8 {
        if self.constant_volume {
            self.volume
        } else {
            self.decay
        }
    }

    pub(crate) fn save(&self) -> EnvelopeState {
        EnvelopeState {
            start: self.start,
            loop_flag: self.loop_flag,
            constant_volume: self.constant_volume,
            volume: self.volume,
            divider: self.divider,
            decay: self.decay,
        }
    }

    pub(crate) fn load(&mut self, state: &EnvelopeState) {
        self.start = state.start;
        self.loop_flag = state.loop_flag;
        self.constant_volume = state.constant_volume;
        self.volume = state.volume & 0x0F;
        self.divider = state.divider.min(16);
        self.decay = state.decay & 0x0F;
    }
}
