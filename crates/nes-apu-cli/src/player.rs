use log::debug;
use nes_apu_core::{ApuConfig, AudioEngine, CoreKind, CoreRegistry, FlatBus};

use crate::script::Script;

/// Runs a script against an engine, applying each write on its cycle.
pub struct ScriptPlayer<'a> {
    script: &'a Script,
    registry: CoreRegistry,
    bus: FlatBus,
    next_write: usize,
    now: u64,
    stall_cycles: u64,
}

impl<'a> ScriptPlayer<'a> {
    pub fn new(script: &'a Script, kind: CoreKind, config: &ApuConfig) -> Self {
        Self {
            script,
            registry: CoreRegistry::new(kind, config),
            bus: script.bus(),
            next_write: 0,
            now: 0,
            stall_cycles: 0,
        }
    }

    pub fn engine(&self) -> &dyn AudioEngine {
        self.registry.engine()
    }

    pub fn engine_mut(&mut self) -> &mut dyn AudioEngine {
        self.registry.engine_mut()
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn finished(&self) -> bool {
        self.now >= self.script.cycles
    }

    /// Run until `target` or the end of the script, whichever comes first.
    /// Writes scheduled on the stopping cycle are left for the next call.
    pub fn advance_to(&mut self, target: u64) {
        let target = target.min(self.script.cycles);
        while self.now < target {
            self.apply_due_writes();
            let limit = self
                .script
                .writes
                .get(self.next_write)
                .map_or(target, |w| w.cycle.min(target));
            let n = (limit - self.now).min(u32::MAX as u64) as u32;
            self.registry.step(n, &mut self.bus);
            self.now += n as u64;
            self.stall_cycles += self.registry.take_dmc_stall_cycles() as u64;
        }
        if self.finished() {
            self.apply_due_writes();
            debug!(
                "Script finished at cycle {} ({} DMC stall cycles, {} bus reads)",
                self.now,
                self.stall_cycles,
                self.bus.reads()
            );
        }
    }

    fn apply_due_writes(&mut self) {
        while let Some(w) = self.script.writes.get(self.next_write) {
            if w.cycle > self.now {
                break;
            }
            self.registry.write_register(w.addr, w.value);
            self.next_write += 1;
        }
    }
}
