use crate::snapshot::FrameState;

/// CPU cycles since the last reset at which each step fires. The fifth entry
/// is only reached in 5-step mode.
pub const STEP_CYCLES: [u32; 5] = [7457, 14913, 22371, 29829, 37281];

/// Actions produced by one frame sequencer step or a $4017 write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameEvent {
    /// Envelopes and the triangle linear counter.
    pub quarter: bool,
    /// Length counters and sweep units.
    pub half: bool,
    /// The frame interrupt was raised by this step.
    pub irq: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FrameSequencer {
    five_step: bool,
    irq_inhibit: bool,
    irq_pending: bool,
    cycle: u32,
    step: u8,
}

impl FrameSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    fn step_count(&self) -> u8 {
        if self.five_step { 5 } else { 4 }
    }

    /// $4017 write. Restarts the sequence and, in 5-step mode, clocks the
    /// quarter and half frame units immediately.
    pub(crate) fn write(&mut self, val: u8) -> FrameEvent {
        self.five_step = val & 0x80 != 0;
        self.irq_inhibit = val & 0x40 != 0;
        if self.irq_inhibit {
            self.irq_pending = false;
        }
        self.cycle = 0;
        self.step = 0;

        FrameEvent {
            quarter: self.five_step,
            half: self.five_step,
            irq: false,
        }
    }

    /// CPU cycles until the next step fires.
    pub(crate) fn cycles_until_step(&self) -> u32 {
        STEP_CYCLES[self.step as usize] - self.cycle
    }

    pub(crate) fn elapse(&mut self, cycles: u32) {
        self.cycle += cycles;
    }

    /// Fire the current step. Only valid when `cycles_until_step` is zero.
    pub(crate) fn clock(&mut self) -> FrameEvent {
        let step = self.step;
        let half = if self.five_step {
            step == 0 || step == 2
        } else {
            step == 1 || step == 3
        };
        let irq = !self.five_step && step == 3 && !self.irq_inhibit;
        if irq {
            self.irq_pending = true;
        }

        self.step += 1;
        if self.step >= self.step_count() {
            self.step = 0;
            self.cycle = 0;
        }

        FrameEvent {
            quarter: true,
            half,
            irq,
        }
    }

    pub fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    pub(crate) fn clear_irq(&mut self) {
        self.irq_pending = false;
    }

    pub fn five_step(&self) -> bool {
        self.five_step
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub(crate) fn save(&self) -> FrameState {
        FrameState {
            five_step: self.five_step,
            irq_inhibit: self.irq_inhibit,
            irq_pending: self.irq_pending,
            cycle: self.cycle,
            step: self.step,
        }
    }

    pub(crate) fn load(&mut self, state: &FrameState) {
        self.five_step = state.five_step;
        self.irq_inhibit = state.irq_inhibit;
        self.irq_pending = state.irq_pending && !state.irq_inhibit;
        self.step = state.step.min(self.step_count() - 1);
        self.cycle = state.cycle.min(STEP_CYCLES[self.step as usize] - 1);
    }
}
