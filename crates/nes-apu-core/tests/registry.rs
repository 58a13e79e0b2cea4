mod common;

use std::sync::{Arc, Mutex};

use common::{Op, busy_script, dmc_bus, lookup_config, run_script};
use nes_apu_core::notes::NoteEvent;
use nes_apu_core::{ApuSnapshot, AudioEngine, CoreKind, CoreRegistry, FlatBus, OpenBus};

const SEGMENT: u64 = 10_000;

fn comparable(mut snap: ApuSnapshot) -> ApuSnapshot {
    snap.core.clear();
    snap.mixer = Default::default();
    snap
}

/// Run `busy_script` for ten segments, calling `between` after each one.
fn run_segments(
    registry: &mut CoreRegistry,
    bus: &mut FlatBus,
    mut between: impl FnMut(&mut CoreRegistry, u64),
) -> Vec<u8> {
    let script = busy_script();
    let mut reads = Vec::new();
    for seg in 0..10 {
        let start = seg * SEGMENT;
        let part: Vec<(u64, Op)> = script
            .iter()
            .filter(|(at, _)| (start..start + SEGMENT).contains(at))
            .map(|&(at, op)| (at - start, op))
            .collect();
        let log = run_script(registry, bus, &part, SEGMENT, || 700);
        reads.extend(log.reads);
        between(registry, seg);
    }
    reads
}

#[test]
fn hot_swap_is_invisible_to_emulation() {
    let mut reference = CoreRegistry::new(CoreKind::Scheduled, &lookup_config());
    let mut reference_bus = dmc_bus();
    let expected_reads = run_segments(&mut reference, &mut reference_bus, |_, _| {});

    let mut swapped = CoreRegistry::new(CoreKind::Scheduled, &lookup_config());
    let mut swapped_bus = dmc_bus();
    let reads = run_segments(&mut swapped, &mut swapped_bus, |reg, seg| {
        let next = if seg % 2 == 0 {
            CoreKind::CycleStepped
        } else {
            CoreKind::Scheduled
        };
        reg.switch_core(next);
        assert_eq!(reg.active_kind(), next);
    });

    assert_eq!(reads, expected_reads);
    assert_eq!(swapped_bus.reads(), reference_bus.reads());
    assert_eq!(swapped_bus.irq_transitions(), reference_bus.irq_transitions());
    assert_eq!(
        comparable(swapped.get_state()),
        comparable(reference.get_state())
    );
}

#[test]
fn consumer_handle_survives_swap() {
    let mut registry = CoreRegistry::new(CoreKind::Scheduled, &lookup_config());
    let consumer = registry.audio_consumer();
    registry.write_register(0x4015, 0x01);
    registry.write_register(0x4000, 0xBF);
    registry.write_register(0x4003, 0x08);
    registry.step(20_000, &mut OpenBus);
    assert!(!consumer.is_empty());

    let before = registry.get_state();
    registry.switch_core(CoreKind::CycleStepped);
    assert_eq!(registry.core_kind(), CoreKind::CycleStepped);
    assert_eq!(registry.read_register(0x4015) & 0x01, 0x01);
    assert_eq!(registry.get_state().cycles, before.cycles);

    registry.step(20_000, &mut OpenBus);
    assert!(!consumer.is_empty());
    assert_eq!(consumer.len(), registry.queued_sample_count());
    let pulled = consumer.pull(usize::MAX);
    assert!(!pulled.is_empty());
    assert_eq!(registry.queued_sample_count(), 0);
}

#[test]
fn switching_to_the_active_core_is_a_no_op() {
    let mut registry = CoreRegistry::new(CoreKind::CycleStepped, &lookup_config());
    registry.write_register(0x4015, 0x01);
    registry.write_register(0x4003, 0x08);
    registry.step(5_000, &mut OpenBus);
    let queued = registry.queued_sample_count();
    assert!(queued > 0);

    registry.switch_core(CoreKind::CycleStepped);
    assert_eq!(registry.queued_sample_count(), queued);
}

#[test]
fn note_sink_moves_with_the_core() {
    let events: Arc<Mutex<Vec<NoteEvent>>> = Arc::default();
    let sink = Arc::clone(&events);
    let mut registry = CoreRegistry::new(CoreKind::Scheduled, &lookup_config());
    registry.set_note_sink(Box::new(move |e: NoteEvent| {
        if let Ok(mut v) = sink.lock() {
            v.push(e);
        }
    }));

    registry.write_register(0x4015, 0x01);
    registry.write_register(0x4000, 0xBF);
    registry.write_register(0x4002, 0xFD);
    registry.write_register(0x4003, 0x08);
    registry.step(7_457, &mut OpenBus);
    assert_eq!(events.lock().unwrap().len(), 1);

    registry.switch_core(CoreKind::CycleStepped);
    registry.step(20_000, &mut OpenBus);
    assert_eq!(events.lock().unwrap().len(), 1);

    registry.reset();
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].note, 69);
    assert_eq!(events[0].velocity, 127);
    assert!(events[0].on);
    assert_eq!(events[1].note, 69);
    assert!(!events[1].on);
}

#[test]
fn registry_forwards_the_engine_contract() {
    let mut registry = CoreRegistry::new(CoreKind::Scheduled, &lookup_config());
    assert_eq!(registry.sample_rate(), 44_100);
    assert_eq!(registry.engine().core_kind(), CoreKind::Scheduled);

    let mut bus = dmc_bus();
    registry.write_register(0x4010, 0x8F);
    registry.write_register(0x4015, 0x10);
    registry.engine_mut().step(1, &mut bus);
    assert!(registry.irq_asserted());
    assert_eq!(registry.take_dmc_stall_cycles(), 4);

    registry.clear_audio_buffers();
    assert_eq!(registry.queued_sample_count(), 0);
}
