#![allow(dead_code)]

use nes_apu_core::mixer::MixerKind;
use nes_apu_core::{ApuConfig, AudioEngine, FlatBus};

pub const SAMPLE_BASE: u16 = 0xC000;

/// A register access issued between steps.
#[derive(Debug, Clone, Copy)]
pub enum Op {
    Write(u16, u8),
    Read(u16),
}

/// Both cores on the same mixer so their samples can be compared exactly.
pub fn lookup_config() -> ApuConfig {
    ApuConfig {
        mixer: Some(MixerKind::Lookup),
        ..ApuConfig::default()
    }
}

/// A bus with a 17-byte DMC sample at $C000.
pub fn dmc_bus() -> FlatBus {
    let mut bus = FlatBus::new();
    let mut x: u32 = 0x1234_5678;
    let sample: Vec<u8> = (0..17)
        .map(|_| {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (x >> 16) as u8
        })
        .collect();
    bus.load(SAMPLE_BASE, &sample);
    bus
}

/// Every channel busy: a sweeping pulse, a steady pulse, triangle, short-mode
/// noise and a looping DMC sample. Switches frame modes mid-run and reads the
/// status register around the first frame IRQ.
pub fn busy_script() -> Vec<(u64, Op)> {
    use Op::*;
    vec![
        (0, Write(0x4015, 0x1F)),
        (0, Write(0x4000, 0x84)),
        (0, Write(0x4001, 0x9A)),
        (0, Write(0x4002, 0x80)),
        (0, Write(0x4003, 0x21)),
        (0, Write(0x4004, 0x5F)),
        (0, Write(0x4006, 0x40)),
        (0, Write(0x4007, 0x0A)),
        (0, Write(0x4008, 0x40)),
        (0, Write(0x400A, 0x30)),
        (0, Write(0x400B, 0x10)),
        (0, Write(0x400C, 0x2A)),
        (0, Write(0x400E, 0x85)),
        (0, Write(0x400F, 0x18)),
        (0, Write(0x4010, 0x4E)),
        (0, Write(0x4011, 0x20)),
        (0, Write(0x4012, 0x00)),
        (0, Write(0x4013, 0x01)),
        (0, Write(0x4015, 0x1F)),
        (12_345, Write(0x4002, 0x10)),
        (12_345, Write(0x4003, 0x42)),
        (29_000, Read(0x4015)),
        (31_000, Read(0x4015)),
        (31_000, Read(0x4015)),
        (40_001, Write(0x4017, 0x80)),
        (52_000, Write(0x400E, 0x03)),
        (61_111, Write(0x4017, 0x00)),
        (70_000, Write(0x4010, 0x8E)),
        (75_000, Write(0x4015, 0x0F)),
        (75_000, Write(0x4013, 0x00)),
        (75_000, Write(0x4015, 0x1F)),
        (92_000, Read(0x4015)),
    ]
}

/// What a run looked like from the outside.
#[derive(Debug, Clone, PartialEq)]
pub struct RunLog {
    pub samples: Vec<f32>,
    pub reads: Vec<u8>,
    pub irq_transitions: Vec<bool>,
    pub bus_reads: u64,
    pub stall_cycles: u32,
}

/// Run `script` for `total` cycles, stepping in chunks produced by `chunk`.
pub fn run_script(
    engine: &mut dyn AudioEngine,
    bus: &mut FlatBus,
    script: &[(u64, Op)],
    total: u64,
    mut chunk: impl FnMut() -> u32,
) -> RunLog {
    let mut samples = Vec::new();
    let mut reads = Vec::new();
    let mut stall_cycles = 0;
    let mut now = 0u64;
    let mut ops = script.iter().peekable();

    loop {
        while let Some((_, op)) = ops.next_if(|(at, _)| *at <= now) {
            match *op {
                Op::Write(addr, value) => engine.write_register(addr, value),
                Op::Read(addr) => reads.push(engine.read_register(addr)),
            }
        }
        if now >= total {
            break;
        }

        let limit = ops.peek().map_or(total, |(at, _)| (*at).min(total));
        let n = (chunk().max(1) as u64).min(limit - now) as u32;
        engine.step(n, bus);
        now += n as u64;
        stall_cycles += engine.take_dmc_stall_cycles();
        if engine.queued_sample_count() > 1024 {
            samples.extend(engine.pull_audio_samples(None));
        }
    }

    while engine.queued_sample_count() > 0 {
        samples.extend(engine.pull_audio_samples(None));
    }

    RunLog {
        samples,
        reads,
        irq_transitions: bus.irq_transitions().to_vec(),
        bus_reads: bus.reads(),
        stall_cycles,
    }
}

/// Deterministic chunk sizes between 1 and `max`.
pub fn lcg_chunks(seed: u32, max: u32) -> impl FnMut() -> u32 {
    let mut state = seed;
    move || {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        1 + (state >> 8) % max
    }
}
