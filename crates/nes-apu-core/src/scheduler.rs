//! Advancing the APU through time.
//!
//! Both steppers share the same event sources, firing order and elapse
//! arithmetic from [`ApuCore`]; they differ only in how far they jump between
//! checks. [`Scheduled`] jumps straight to the nearest event, [`CycleStepped`]
//! walks one CPU cycle at a time.

use log::trace;

use crate::apu::ApuCore;
use crate::bus::ApuBus;
use crate::registry::CoreKind;

/// Upper bound on firing passes per event check. Sources still due after the
/// last pass stay due and are handled before time moves again.
pub const MAX_EVENT_PASSES: usize = 4;

/// Everything that can wake the scheduler, in firing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Pulse1,
    Pulse2,
    Triangle,
    Noise,
    Dmc,
    Frame,
    Sample,
}

impl Source {
    pub const ORDER: [Source; 7] = [
        Source::Pulse1,
        Source::Pulse2,
        Source::Triangle,
        Source::Noise,
        Source::Dmc,
        Source::Frame,
        Source::Sample,
    ];
}

/// Time-advance strategy of an [`crate::apu::Apu`].
pub trait Stepper: Send + 'static {
    const KIND: CoreKind;

    fn run(core: &mut ApuCore, cycles: u32, bus: &mut dyn ApuBus);
}

/// Nearest-event batching.
#[derive(Debug, Default, Clone, Copy)]
pub struct Scheduled;

/// One iteration per CPU cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleStepped;

impl Stepper for Scheduled {
    const KIND: CoreKind = CoreKind::Scheduled;

    fn run(core: &mut ApuCore, cycles: u32, bus: &mut dyn ApuBus) {
        let mut remaining = cycles;
        while remaining > 0 {
            settle(core, bus);
            let next = next_event(core);
            let delta = next.min(remaining);
            core.elapse(delta);
            remaining -= delta;
            if delta == next {
                fire_due(core, bus);
            }
        }
    }
}

impl Stepper for CycleStepped {
    const KIND: CoreKind = CoreKind::CycleStepped;

    fn run(core: &mut ApuCore, cycles: u32, bus: &mut dyn ApuBus) {
        for _ in 0..cycles {
            settle(core, bus);
            core.elapse(1);
            if next_event(core) == 0 {
                fire_due(core, bus);
            }
        }
    }
}

/// CPU cycles until the nearest source fires. Zero when something is due.
pub(crate) fn next_event(core: &ApuCore) -> u32 {
    Source::ORDER
        .iter()
        .map(|&s| core.cycles_until(s))
        .min()
        .unwrap_or(0)
}

/// Fire everything due before time moves on.
fn settle(core: &mut ApuCore, bus: &mut dyn ApuBus) {
    while next_event(core) == 0 {
        fire_due(core, bus);
    }
}

/// Bounded firing passes over the due sources.
fn fire_due(core: &mut ApuCore, bus: &mut dyn ApuBus) {
    for pass in 0..MAX_EVENT_PASSES {
        let mut fired = false;
        for source in Source::ORDER {
            if core.cycles_until(source) == 0 {
                core.fire(source, bus);
                fired = true;
            }
        }
        core.sync_irq(bus);
        if !fired || next_event(core) > 0 {
            return;
        }
        if pass + 1 == MAX_EVENT_PASSES {
            trace!(
                "Event pass cap reached at cycle {}; carrying due sources",
                core.cycles()
            );
        }
    }
}
