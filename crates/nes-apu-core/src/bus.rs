/// The CPU/bus side of the APU.
///
/// The engine only ever needs two things from the rest of the console: a
/// memory read for DMC sample fetches and an IRQ line. Both calls are made
/// synchronously from inside `step` and must not block.
pub trait ApuBus {
    /// Read one byte of CPU address space for the DMC sample reader.
    fn read(&mut self, address: u16) -> u8;

    /// Called whenever the combined frame/DMC interrupt level changes.
    ///
    /// Register accesses never see the bus, so an acknowledgement through
    /// `$4015` or `$4010` is reported at the start of the next `step`. Hosts
    /// that need the level sooner can poll `AudioEngine::irq_asserted`.
    fn request_interrupt(&mut self, active: bool);
}

/// A bus with nothing attached: reads return 0 and IRQs are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenBus;

impl ApuBus for OpenBus {
    fn read(&mut self, _address: u16) -> u8 {
        0
    }

    fn request_interrupt(&mut self, _active: bool) {}
}

/// Flat 64 KiB address space that records IRQ line transitions.
///
/// Used by hosts that feed the DMC from a static image (NSF-style players,
/// the command line renderer) and by tests.
pub struct FlatBus {
    memory: Box<[u8; 0x10000]>,
    irq_line: bool,
    irq_transitions: Vec<bool>,
    reads: u64,
}

impl FlatBus {
    pub fn new() -> Self {
        Self {
            memory: Box::new([0; 0x10000]),
            irq_line: false,
            irq_transitions: Vec::new(),
            reads: 0,
        }
    }

    /// Copy `bytes` into memory starting at `address`, wrapping at $FFFF.
    pub fn load(&mut self, address: u16, bytes: &[u8]) {
        let mut addr = address;
        for &b in bytes {
            self.memory[addr as usize] = b;
            addr = addr.wrapping_add(1);
        }
    }

    pub fn poke(&mut self, address: u16, value: u8) {
        self.memory[address as usize] = value;
    }

    pub fn irq_line(&self) -> bool {
        self.irq_line
    }

    /// Every level passed to `request_interrupt`, oldest first.
    pub fn irq_transitions(&self) -> &[bool] {
        &self.irq_transitions
    }

    /// Number of DMC fetches served so far.
    pub fn reads(&self) -> u64 {
        self.reads
    }
}

impl Default for FlatBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ApuBus for FlatBus {
    fn read(&mut self, address: u16) -> u8 {
        self.reads += 1;
        self.memory[address as usize]
    }

    fn request_interrupt(&mut self, active: bool) {
        self.irq_line = active;
        self.irq_transitions.push(active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_wraps_at_top_of_memory() {
        let mut bus = FlatBus::new();
        bus.load(0xFFFF, &[0x11, 0x22]);
        assert_eq!(bus.read(0xFFFF), 0x11);
        assert_eq!(bus.read(0x0000), 0x22);
        assert_eq!(bus.reads(), 2);
    }

    #[test]
    fn records_irq_transitions() {
        let mut bus = FlatBus::new();
        bus.request_interrupt(true);
        bus.request_interrupt(false);
        assert_eq!(bus.irq_transitions(), &[true, false]);
        assert!(!bus.irq_line());
    }
}
