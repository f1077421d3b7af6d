//! Tests for gwmind-core: payloads, memory objects, buffers, RawMemory, access locks

use gwmind_core::access::{try_acquire_all, try_acquire_pair};
use gwmind_core::*;
use serde_json::json;
use std::sync::Arc;

// ===========================================================================
// Payload
// ===========================================================================

#[test]
fn payload_json_compares_structurally() {
    let a = Payload::json(json!({"NAME": "walk", "speed": 1.0}));
    let b = Payload::json(json!({"speed": 1.0, "NAME": "walk"}));
    let c = Payload::json(json!({"NAME": "walk", "speed": 2.0}));
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn payload_opaque_compares_by_identity() {
    let a = Payload::opaque(vec![1, 2, 3]);
    let same = a.clone();
    let other = Payload::opaque(vec![1, 2, 3]);
    assert_eq!(a, same);
    assert_ne!(a, other);
    assert_eq!(a.downcast_ref::<Vec<i32>>(), Some(&vec![1, 2, 3]));
}

#[test]
fn payload_variants_never_cross_compare() {
    assert_ne!(Payload::text("1"), Payload::Number(1.0));
    assert_ne!(Payload::Empty, Payload::text(""));
    assert_eq!(Payload::Empty, Payload::default());
}

#[test]
fn behavior_key_from_json_and_text() {
    let doc = Payload::json(json!({"NAME": "walk"}));
    assert_eq!(doc.behavior_key().unwrap(), "walk");

    let text = Payload::text(r#"{"NAME":"turn","angle":90}"#);
    assert_eq!(text.behavior_key().unwrap(), "turn");
}

#[test]
fn behavior_key_missing_name_is_format_error() {
    let err = Payload::json(json!({"speed": 1.0})).behavior_key().unwrap_err();
    assert!(matches!(err, Error::PayloadFormat(_)));

    let err = Payload::text("not json").behavior_key().unwrap_err();
    assert!(matches!(err, Error::PayloadFormat(_)));

    let err = Payload::Number(3.0).behavior_key().unwrap_err();
    assert!(matches!(err, Error::PayloadFormat(_)));
}

#[test]
fn behavior_key_requires_a_string_name() {
    for doc in [json!({"NAME": 1}), json!({"NAME": true}), json!({"NAME": ["walk"]})] {
        let err = Payload::json(doc).behavior_key().unwrap_err();
        assert!(matches!(err, Error::PayloadFormat(_)));
    }
    let err = Payload::text(r#"{"NAME":1}"#).behavior_key().unwrap_err();
    assert!(matches!(err, Error::PayloadFormat(_)));
}

#[test]
fn payload_display() {
    assert_eq!(Payload::text("hi").to_string(), "hi");
    assert_eq!(Payload::json(json!({"a": 1})).to_string(), r#"{"a":1}"#);
    assert_eq!(Payload::Empty.to_string(), "");
}

// ===========================================================================
// clamp_unit / names_match
// ===========================================================================

#[test]
fn clamp_unit_in_range_is_ok() {
    let (v, r) = clamp_unit("activation", 0.42);
    assert_eq!(v, 0.42);
    assert!(r.is_ok());
    assert!(clamp_unit("activation", 0.0).1.is_ok());
    assert!(clamp_unit("activation", 1.0).1.is_ok());
}

#[test]
fn clamp_unit_out_of_range_clamps_and_errors() {
    let (v, r) = clamp_unit("threshold", 1.5);
    assert_eq!(v, 1.0);
    match r.unwrap_err() {
        Error::Bounds { field, value, clamped } => {
            assert_eq!(field, "threshold");
            assert_eq!(value, 1.5);
            assert_eq!(clamped, 1.0);
        }
        other => panic!("Expected Bounds, got {:?}", other),
    }

    let (v, r) = clamp_unit("threshold", -0.1);
    assert_eq!(v, 0.0);
    assert!(r.unwrap_err().is_bounds());
}

#[test]
fn clamp_unit_nan_clamps_to_zero() {
    let (v, r) = clamp_unit("evaluation", f64::NAN);
    assert_eq!(v, 0.0);
    assert!(r.is_err());
}

#[test]
fn names_match_ignores_case() {
    assert!(names_match("Vision", "VISION"));
    assert!(names_match("behavior_state", BEHAVIOR_STATE));
    assert!(!names_match("vision", "visions"));
}

// ===========================================================================
// MemoryObject
// ===========================================================================

#[test]
fn memory_object_basics() {
    let mo = MemoryObject::new("vision", 0.5);
    assert_eq!(mo.name(), "vision");
    assert_eq!(mo.type_name(), "vision");
    assert_eq!(mo.info(), Payload::Number(0.5));
    assert_eq!(mo.evaluation(), 0.0);
    assert!(mo.id().is_none());
    assert!(!mo.is_destroyed());
}

#[test]
fn memory_object_set_info_updates_timestamp() {
    let mo = MemoryObject::new("vision", Payload::Empty);
    let before = mo.timestamp();
    std::thread::sleep(std::time::Duration::from_millis(2));
    mo.set_info("seen");
    assert_eq!(mo.info(), Payload::text("seen"));
    assert!(mo.timestamp() > before);
}

#[test]
fn memory_object_single_slot_returns_no_index() {
    let mo = MemoryObject::new("vision", Payload::Empty);
    let as_memory: &dyn Memory = &mo;
    assert_eq!(as_memory.set_info(Payload::text("x")), None);
}

#[test]
fn memory_object_evaluation_is_clamped() {
    let mo = MemoryObject::new("vision", Payload::Empty);
    assert!(mo.set_evaluation(0.7).is_ok());
    assert_eq!(mo.evaluation(), 0.7);
    assert!(mo.set_evaluation(3.0).is_err());
    assert_eq!(mo.evaluation(), 1.0);
    assert!(mo.set_evaluation(-3.0).is_err());
    assert_eq!(mo.evaluation(), 0.0);
}

#[test]
fn memory_object_same_content() {
    let a = MemoryObject::new("instr", json!({"go": true}));
    let b = MemoryObject::new("INSTR", json!({"go": true}));
    let c = MemoryObject::new("instr", json!({"go": false}));
    assert!(a.same_content(&b));
    assert!(!a.same_content(&c));
}

// ===========================================================================
// MemoryBuffer
// ===========================================================================

#[test]
fn buffer_push_returns_index_and_evicts_oldest() {
    let buf = MemoryBuffer::new("history", 2);
    assert_eq!(buf.push(1.0), 0);
    assert_eq!(buf.push(2.0), 1);
    assert_eq!(buf.push(3.0), 1);
    assert_eq!(buf.len(), 2);
    assert_eq!(buf.peek_all(), vec![Payload::Number(2.0), Payload::Number(3.0)]);
}

#[test]
fn buffer_peek_pop_drain() {
    let buf = MemoryBuffer::new("history", 4);
    assert!(buf.peek().is_none());
    buf.push("a");
    buf.push("b");
    assert_eq!(buf.peek(), Some(Payload::text("b")));
    assert_eq!(buf.pop(), Some(Payload::text("a")));
    buf.push("c");
    assert_eq!(buf.drain(), vec![Payload::text("b"), Payload::text("c")]);
    assert!(buf.is_empty());
}

#[test]
fn buffer_as_memory_is_container_shaped() {
    let buf = MemoryBuffer::new("history", 3);
    let memory: &dyn Memory = &buf;
    assert_eq!(memory.set_info(Payload::text("x")), Some(0));
    assert_eq!(memory.set_info(Payload::text("y")), Some(1));
    assert_eq!(memory.info(), Payload::text("y"));
}

#[test]
fn buffer_zero_capacity_holds_one() {
    let buf = MemoryBuffer::new("history", 0);
    assert_eq!(buf.capacity(), 1);
    buf.push("a");
    buf.push("b");
    assert_eq!(buf.peek_all(), vec![Payload::text("b")]);
}

// ===========================================================================
// RawMemory
// ===========================================================================

#[test]
fn raw_memory_create_assigns_unique_ids() {
    let raw = RawMemory::new();
    let a = raw.create("vision", Payload::Empty);
    let b = raw.create("vision", Payload::Empty);
    let c = raw.create_buffer("history", 4);
    let ids = [a.id().unwrap(), b.id().unwrap(), Memory::id(&*c).unwrap()];
    assert_ne!(ids[0], ids[1]);
    assert_ne!(ids[1], ids[2]);
    assert_ne!(ids[0], ids[2]);
    assert_eq!(raw.len(), 3);
}

#[test]
fn raw_memory_all_of_type_in_registration_order() {
    let raw = RawMemory::new();
    let first = raw.create("Vision", "first");
    raw.create("touch", "x");
    let second = raw.create("VISION", "second");

    let found = raw.all_of_type("vision");
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].id(), first.id());
    assert_eq!(found[1].id(), second.id());
}

#[test]
fn raw_memory_register_external_object() {
    let raw = RawMemory::new();
    let mo = Arc::new(MemoryObject::new("external", Payload::Empty));
    let id = raw.register(mo.clone());
    assert_eq!(mo.id(), Some(id));
    // registering twice is idempotent
    assert_eq!(raw.register(mo.clone()), id);
    assert_eq!(raw.len(), 1);
}

#[test]
fn raw_memory_destroy_removes_exactly_one() {
    let raw = RawMemory::new();
    let a = raw.create("vision", "a");
    let b = raw.create("vision", "b");
    assert!(raw.destroy(&*a));
    assert_eq!(raw.len(), 1);
    assert!(a.is_destroyed());
    assert!(a.id().is_none());
    assert!(!raw.contains(&*a));
    assert!(raw.contains(&*b));

    // holders may still use the object
    a.set_info("still usable");
    assert_eq!(a.info(), Payload::text("still usable"));

    // second destroy is a no-op
    assert!(!raw.destroy(&*a));
    assert_eq!(raw.len(), 1);
}

#[test]
fn raw_memory_ids_are_not_reused() {
    let raw = RawMemory::new();
    let a = raw.create("x", Payload::Empty);
    let old = a.id().unwrap();
    raw.destroy(&*a);
    let b = raw.create("x", Payload::Empty);
    assert_ne!(b.id().unwrap(), old);
}

#[test]
fn raw_memory_destroy_all_of_type_and_shutdown() {
    let raw = RawMemory::new();
    raw.create("a", Payload::Empty);
    raw.create("A", Payload::Empty);
    let keep = raw.create("b", Payload::Empty);
    assert_eq!(raw.destroy_all_of_type("a"), 2);
    assert_eq!(raw.len(), 1);
    assert!(raw.get(keep.id().unwrap()).is_some());

    raw.shutdown();
    assert!(raw.is_empty());
    assert!(keep.is_destroyed());
}

#[test]
fn raw_memory_concurrent_creates_keep_ids_unique() {
    let raw = Arc::new(RawMemory::new());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let raw = raw.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    raw.create(format!("m{}", t), i as f64);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let mut ids: Vec<_> = raw.all().iter().map(|m| m.id().unwrap()).collect();
    assert_eq!(ids.len(), 400);
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 400);
}

// ===========================================================================
// Access locks
// ===========================================================================

struct Party(AccessLock);

impl Lockable for Party {
    fn access_lock(&self) -> &AccessLock {
        &self.0
    }
}

#[test]
fn pair_acquire_holds_both() {
    let a = Party(AccessLock::new());
    let b = Party(AccessLock::new());
    let guards = try_acquire_pair(&a, &b).unwrap();
    assert_eq!(guards.len(), 2);
    assert!(a.0.is_held_by_current_thread());
    assert!(b.0.is_held_by_current_thread());
    drop(guards);
    assert!(!a.0.is_locked());
    assert!(!b.0.is_locked());
}

#[test]
fn pair_acquire_fails_cleanly_when_counterpart_busy() {
    let a = Arc::new(Party(AccessLock::new()));
    let b = Arc::new(Party(AccessLock::new()));

    let (held_tx, held_rx) = std::sync::mpsc::channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let holder = {
        let b = b.clone();
        std::thread::spawn(move || {
            let _guard = b.0.acquire();
            held_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        })
    };
    held_rx.recv().unwrap();

    let err = try_acquire_pair(&*a, &*b).err().unwrap();
    assert!(matches!(err, Error::Contention(_)));
    // our own lock was released on failure
    assert!(!a.0.is_locked());

    release_tx.send(()).unwrap();
    holder.join().unwrap();
}

#[test]
fn acquire_all_dedups_and_orders() {
    let a = Party(AccessLock::new());
    let b = Party(AccessLock::new());
    let c = Party(AccessLock::new());
    let guards = try_acquire_all(&[&c, &a, &b, &a]).unwrap();
    assert_eq!(guards.len(), 3);
}

#[test]
fn buffer_participates_in_access() {
    let a = Party(AccessLock::new());
    let buf = MemoryBuffer::new("history", 2);
    let guards = try_acquire_pair(&a, &buf).unwrap();
    assert!(buf.access_lock().is_held_by_current_thread());
    drop(guards);
    assert!(!buf.access_lock().is_locked());
}
