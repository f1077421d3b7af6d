//! Tests for gwmind-behavior: BgBComLayer de-duplication and snapshots

use gwmind_behavior::{BgBComLayer, WriteOutcome};
use gwmind_core::{Error, MemoryObject, Payload, RawMemory, BEHAVIOR_STATE};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

fn layer() -> (Arc<RawMemory>, BgBComLayer) {
    let raw = Arc::new(RawMemory::new());
    let bgb = BgBComLayer::new(raw.clone());
    (raw, bgb)
}

// ===========================================================================
// Behavior states
// ===========================================================================

#[test]
fn same_state_twice_keeps_one_entry_and_destroys_second() {
    let (raw, bgb) = layer();
    let first = raw.create(BEHAVIOR_STATE, json!({"NAME": "walk", "speed": 1.0}));
    let second = raw.create(BEHAVIOR_STATE, json!({"NAME": "walk", "speed": 1.0}));

    assert_eq!(bgb.write_behavior_state(first.clone()).unwrap(), WriteOutcome::Appended);
    assert_eq!(bgb.write_behavior_state(second.clone()).unwrap(), WriteOutcome::Duplicate);

    let states = bgb.read_behavior_states();
    assert_eq!(states.len(), 1);
    assert!(Arc::ptr_eq(&states[0], &first));
    assert!(!raw.contains(&*second));
    assert!(raw.contains(&*first));
}

#[test]
fn same_name_new_body_overwrites_in_place() {
    let (raw, bgb) = layer();
    let first = raw.create(BEHAVIOR_STATE, json!({"NAME": "walk", "speed": 1.0}));
    let second = raw.create(BEHAVIOR_STATE, json!({"NAME": "walk", "speed": 2.0}));

    bgb.write_behavior_state(first.clone()).unwrap();
    assert_eq!(bgb.write_behavior_state(second.clone()).unwrap(), WriteOutcome::Updated);

    let states = bgb.read_behavior_states();
    assert_eq!(states.len(), 1);
    assert!(Arc::ptr_eq(&states[0], &first), "existing entry keeps its identity");
    assert_eq!(states[0].info(), Payload::json(json!({"NAME": "walk", "speed": 2.0})));
    assert!(second.is_destroyed());
}

#[test]
fn distinct_names_coexist_in_order() {
    let (raw, bgb) = layer();
    bgb.write_behavior_state(raw.create(BEHAVIOR_STATE, json!({"NAME": "walk", "speed": 1.0})))
        .unwrap();
    bgb.write_behavior_state(raw.create(BEHAVIOR_STATE, json!({"NAME": "turn", "angle": 90})))
        .unwrap();

    let names: Vec<String> = bgb
        .read_behavior_states()
        .iter()
        .map(|mo| mo.info().behavior_key().unwrap())
        .collect();
    assert_eq!(names, vec!["walk", "turn"]);
}

#[test]
fn text_payloads_are_parsed_as_json() {
    let (raw, bgb) = layer();
    bgb.write_behavior_state(raw.create(BEHAVIOR_STATE, r#"{"NAME":"walk","speed":1}"#))
        .unwrap();
    let outcome = bgb
        .write_behavior_state(raw.create(BEHAVIOR_STATE, json!({"NAME": "walk", "speed": 3})))
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Updated);
    assert_eq!(bgb.behaviors_len(), 1);
}

#[test]
fn missing_name_is_rejected_without_touching_queue() {
    let (raw, bgb) = layer();
    bgb.write_behavior_state(raw.create(BEHAVIOR_STATE, json!({"NAME": "walk"})))
        .unwrap();

    let bad = raw.create(BEHAVIOR_STATE, json!({"speed": 1.0}));
    let err = bgb.write_behavior_state(bad.clone()).unwrap_err();
    assert!(matches!(err, Error::PayloadFormat(_)));
    assert_eq!(bgb.behaviors_len(), 1);
    assert!(raw.contains(&*bad), "rejected message is left alone");

    let not_json = raw.create(BEHAVIOR_STATE, "walk fast");
    assert!(bgb.write_behavior_state(not_json).is_err());
    assert_eq!(bgb.behaviors_len(), 1);
}

#[test]
fn rewriting_the_queued_object_is_a_duplicate() {
    let (raw, bgb) = layer();
    let state = raw.create(BEHAVIOR_STATE, json!({"NAME": "walk"}));
    bgb.write_behavior_state(state.clone()).unwrap();
    assert_eq!(bgb.write_behavior_state(state.clone()).unwrap(), WriteOutcome::Duplicate);
    assert!(raw.contains(&*state), "the queued entry must survive");
}

#[test]
fn numeric_name_does_not_collide_with_string_name() {
    let (raw, bgb) = layer();
    let named = raw.create(BEHAVIOR_STATE, json!({"NAME": "1", "x": 1}));
    let numeric = raw.create(BEHAVIOR_STATE, json!({"NAME": 1, "x": 2}));

    assert_eq!(bgb.write_behavior_state(named.clone()).unwrap(), WriteOutcome::Appended);
    let err = bgb.write_behavior_state(numeric.clone()).unwrap_err();
    assert!(matches!(err, Error::PayloadFormat(_)));

    assert_eq!(bgb.behaviors_len(), 1);
    assert_eq!(named.info(), Payload::json(json!({"NAME": "1", "x": 1})));
    assert!(raw.contains(&*numeric), "rejected message is left alone");
}

#[test]
fn numeric_name_alone_is_rejected() {
    let (_raw, bgb) = layer();
    let state = Arc::new(MemoryObject::new(BEHAVIOR_STATE, json!({"NAME": 7})));
    assert!(matches!(bgb.write_behavior_state(state), Err(Error::PayloadFormat(_))));
    assert_eq!(bgb.behaviors_len(), 0);
}

#[test]
fn destroyed_state_is_rejected() {
    let (raw, bgb) = layer();
    let state = raw.create(BEHAVIOR_STATE, json!({"NAME": "walk"}));
    raw.destroy(&*state);

    let err = bgb.write_behavior_state(state).unwrap_err();
    assert!(matches!(err, Error::Destroyed(_)));
    assert_eq!(bgb.behaviors_len(), 0);
}

#[test]
fn read_behavior_states_filters_by_type() {
    let (raw, bgb) = layer();
    bgb.write_behavior_state(raw.create(BEHAVIOR_STATE, json!({"NAME": "walk"})))
        .unwrap();
    bgb.write_behavior_state(raw.create("MOTOR_STATE", json!({"NAME": "arm"})))
        .unwrap();
    assert_eq!(bgb.behaviors_len(), 2);
    assert_eq!(bgb.read_behavior_states().len(), 1);
}

#[test]
fn read_returns_a_snapshot() {
    let (raw, bgb) = layer();
    bgb.write_behavior_state(raw.create(BEHAVIOR_STATE, json!({"NAME": "walk"})))
        .unwrap();
    let snapshot = bgb.read_behavior_states();
    bgb.write_behavior_state(raw.create(BEHAVIOR_STATE, json!({"NAME": "turn"})))
        .unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(bgb.read_behavior_states().len(), 2);
}

#[test]
fn concurrent_writers_never_duplicate_names() {
    let (raw, bgb) = layer();
    let bgb = Arc::new(bgb);
    let handles: Vec<_> = (0..6)
        .map(|t| {
            let raw = raw.clone();
            let bgb = bgb.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    let name = ["walk", "turn", "stop"][(t + i) % 3];
                    let mo = raw.create(BEHAVIOR_STATE, json!({"NAME": name, "tick": i}));
                    bgb.write_behavior_state(mo).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let states = bgb.read_behavior_states();
    assert_eq!(states.len(), 3);
    let names: HashSet<String> = states
        .iter()
        .map(|mo| mo.info().behavior_key().unwrap())
        .collect();
    assert_eq!(names.len(), 3);
    // only the three queued states remain registered
    assert_eq!(raw.all_of_type(BEHAVIOR_STATE).len(), 3);
}

// ===========================================================================
// Instructions
// ===========================================================================

#[test]
fn instruction_duplicate_is_discarded() {
    let (raw, bgb) = layer();
    let first = raw.create("BG_SHOULD_ACTIVATE", "walk");
    let again = raw.create("BG_SHOULD_ACTIVATE", "walk");
    assert_eq!(bgb.write_bg_instruction(first.clone()), WriteOutcome::Appended);
    assert_eq!(bgb.write_bg_instruction(again.clone()), WriteOutcome::Duplicate);
    assert_eq!(bgb.instructions_len(), 1);
    assert!(again.is_destroyed());
    assert!(!first.is_destroyed());
}

#[test]
fn instruction_identity_is_type_and_payload() {
    let (raw, bgb) = layer();
    bgb.write_bg_instruction(raw.create("BG_SHOULD_ACTIVATE", "walk"));
    bgb.write_bg_instruction(raw.create("BG_SHOULD_ACTIVATE", "turn"));
    bgb.write_bg_instruction(raw.create("TEMP_THETA", "walk"));
    assert_eq!(bgb.read_bg_instructions().len(), 3);
}

#[test]
fn instruction_tags_filter_reads() {
    let (raw, bgb) = layer();
    let bgb = bgb.with_instruction_tags(["bg_should_activate"]);
    bgb.write_bg_instruction(raw.create("BG_SHOULD_ACTIVATE", "walk"));
    bgb.write_bg_instruction(raw.create("TEMP_THETA", 0.3));
    let read = bgb.read_bg_instructions();
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].name(), "BG_SHOULD_ACTIVATE");
    assert_eq!(bgb.instructions_len(), 2);

    bgb.set_instruction_tags(Vec::<String>::new());
    assert_eq!(bgb.read_bg_instructions().len(), 2);
}

#[test]
fn consume_instruction_removes_and_destroys() {
    let (raw, bgb) = layer();
    let instr = raw.create("BG_SHOULD_ACTIVATE", "walk");
    bgb.write_bg_instruction(instr.clone());
    assert!(bgb.consume_instruction(&instr));
    assert_eq!(bgb.instructions_len(), 0);
    assert!(instr.is_destroyed());
    assert!(!bgb.consume_instruction(&instr));
}

// ===========================================================================
// Diagnostics and housekeeping
// ===========================================================================

#[test]
fn show_content_lists_both_queues() {
    let (raw, bgb) = layer();
    bgb.set_debug(true);
    bgb.write_behavior_state(raw.create(BEHAVIOR_STATE, json!({"NAME": "walk"})))
        .unwrap();
    bgb.write_bg_instruction(raw.create("BG_SHOULD_ACTIVATE", "walk"));
    let dump = bgb.show_content();
    assert!(dump.contains("bgToBehaviors: [BG_SHOULD_ACTIVATE"));
    assert!(dump.contains("behaviorsToBg: [BEHAVIOR_STATE"));
    assert!(dump.contains("walk"));
}

#[test]
fn clear_empties_and_destroys() {
    let (raw, bgb) = layer();
    bgb.write_behavior_state(raw.create(BEHAVIOR_STATE, json!({"NAME": "walk"})))
        .unwrap();
    bgb.write_bg_instruction(raw.create("BG_SHOULD_ACTIVATE", "walk"));
    bgb.clear();
    assert_eq!(bgb.behaviors_len(), 0);
    assert_eq!(bgb.instructions_len(), 0);
    assert!(raw.is_empty());
}
