use log::trace;

use crate::bus::ApuBus;
use crate::hardware::Region;
use crate::snapshot::DmcState;

/// CPU cycles stolen by each sample fetch.
pub const DMC_FETCH_STALL: u32 = 4;

/// Delta modulation channel at $4010-$4013.
#[derive(Debug, Clone)]
pub struct DmcChannel {
    irq_enabled: bool,
    loop_flag: bool,
    rate_index: u8,
    timer_cycles: u32,
    sample_address: u16,
    sample_length: u16,
    current_address: u16,
    bytes_remaining: u16,
    shift_register: u8,
    bits_remaining: u8,
    buffer: u8,
    buffer_filled: bool,
    silence: bool,
    delta_counter: u8,
    irq_flag: bool,
    stall_cycles: u32,
    periods: &'static [u16; 16],
}

impl DmcChannel {
    pub fn new(region: Region) -> Self {
        let periods = region.dmc_periods();
        Self {
            irq_enabled: false,
            loop_flag: false,
            rate_index: 0,
            timer_cycles: periods[0] as u32,
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
            periods,
        }
    }

    pub(crate) fn write(&mut self, reg: u16, val: u8) {
        match reg & 0x03 {
            0 => {
                self.irq_enabled = val & 0x80 != 0;
                self.loop_flag = val & 0x40 != 0;
                self.rate_index = val & 0x0F;
                if !self.irq_enabled {
                    self.irq_flag = false;
                }
            }
            1 => self.delta_counter = val & 0x7F,
            2 => self.sample_address = 0xC000 | ((val as u16) << 6),
            _ => self.sample_length = ((val as u16) << 4) | 1,
        }
    }

    /// Bit 4 of $4015. Always acknowledges the DMC interrupt.
    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.irq_flag = false;
        if !enabled {
            self.bytes_remaining = 0;
        } else if self.bytes_remaining == 0 {
            self.restart();
        }
    }

    fn restart(&mut self) {
        self.current_address = self.sample_address;
        self.bytes_remaining = self.sample_length;
    }

    /// The sample buffer is empty and the reader has bytes left to fetch.
    pub(crate) fn fetch_pending(&self) -> bool {
        !self.buffer_filled && self.bytes_remaining > 0
    }

    pub(crate) fn timer_cycles(&self) -> u32 {
        self.timer_cycles
    }

    pub(crate) fn elapse(&mut self, cycles: u32) {
        self.timer_cycles -= cycles;
    }

    /// Output unit clock: apply one delta bit, then start the next byte when
    /// the shift register runs out.
    pub(crate) fn clock_timer(&mut self) {
        self.timer_cycles = self.periods[self.rate_index as usize] as u32;

        if !self.silence {
            if self.shift_register & 1 != 0 {
                if self.delta_counter <= 125 {
                    self.delta_counter += 2;
                }
            } else if self.delta_counter >= 2 {
                self.delta_counter -= 2;
            }
        }
        self.shift_register >>= 1;
        self.bits_remaining -= 1;

        if self.bits_remaining == 0 {
            self.bits_remaining = 8;
            if self.buffer_filled {
                self.silence = false;
                self.shift_register = self.buffer;
                self.buffer_filled = false;
            } else {
                self.silence = true;
            }
        }
    }

    /// Memory reader: refill the sample buffer from the bus.
    pub(crate) fn fetch(&mut self, bus: &mut dyn ApuBus) {
        let address = self.current_address;
        self.buffer = bus.read(address);
        self.buffer_filled = true;
        self.stall_cycles += DMC_FETCH_STALL;

        self.current_address = match address {
            0xFFFF => 0x8000,
            addr => addr + 1,
        };
        self.bytes_remaining = self.bytes_remaining.saturating_sub(1);
        trace!(
            "DMC fetch ${address:04X} -> {:02X}, {} bytes left",
            self.buffer, self.bytes_remaining
        );
        if self.bytes_remaining == 0 {
            if self.loop_flag {
                self.restart();
            } else if self.irq_enabled {
                self.irq_flag = true;
            }
        }
    }

    pub fn output(&self) -> u8 {
        self.delta_counter
    }

    pub fn irq_flag(&self) -> bool {
        self.irq_flag
    }

    pub fn bytes_remaining(&self) -> u16 {
        self.bytes_remaining
    }

    pub fn sample_length(&self) -> u16 {
        self.sample_length
    }

    pub fn sample_address(&self) -> u16 {
        self.sample_address
    }

    pub fn current_address(&self) -> u16 {
        self.current_address
    }

    /// Playback is producing bits from memory rather than idling.
    pub fn playing(&self) -> bool {
        !self.silence || self.bytes_remaining > 0
    }

    pub(crate) fn clear_irq(&mut self) {
        self.irq_flag = false;
    }

    pub(crate) fn take_stall_cycles(&mut self) -> u32 {
        std::mem::take(&mut self.stall_cycles)
    }

    pub(crate) fn save(&self) -> DmcState {
        DmcState {
            irq_enabled: self.irq_enabled,
            loop_flag: self.loop_flag,
            rate_index: self.rate_index,
            timer_cycles: self.timer_cycles,
            sample_address: self.sample_address,
            sample_length: self.sample_length,
            current_address: self.current_address,
            bytes_remaining: self.bytes_remaining,
            shift_register: self.shift_register,
            bits_remaining: self.bits_remaining,
            buffer: self.buffer,
            buffer_filled: self.buffer_filled,
            silence: self.silence,
            delta_counter: self.delta_counter,
            irq_flag: self.irq_flag,
            stall_cycles: self.stall_cycles,
        }
    }

    pub(crate) fn load(&mut self, state: &DmcState) {
        self.irq_enabled = state.irq_enabled;
        self.loop_flag = state.loop_flag;
        self.rate_index = state.rate_index & 0x0F;
        let longest = self.periods[0] as u32;
        self.timer_cycles = state.timer_cycles.clamp(1, longest);
        self.sample_address = 0xC000 | (state.sample_address & 0x3FC0);
        self.sample_length = (state.sample_length & 0x0FF0) | 1;
        self.current_address = state.current_address | 0x8000;
        self.bytes_remaining = state.bytes_remaining.min(0x0FF1);
        self.shift_register = state.shift_register;
        self.bits_remaining = state.bits_remaining.clamp(1, 8);
        self.buffer = state.buffer;
        self.buffer_filled = state.buffer_filled;
        self.silence = state.silence;
        self.delta_counter = state.delta_counter.min(127);
        self.irq_flag = state.irq_flag && state.irq_enabled;
        self.stall_cycles = state.stall_cycles;
    }
}
