// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn get_set_round_trips() {
    let mut state = State::new();
    state.set("jobs.active", StateValue::UInt(3));
    assert_eq!(state.get("jobs.active"), Some(StateValue::UInt(3)));
}

#[test]
fn missing_key_is_none() {
    let state = State::new();
    assert_eq!(state.get("nope"), None);
}

#[test]
fn increment_creates_counter_at_delta() {
    let mut state = State::new();
    assert_eq!(state.increment("count", 5), 5);
    assert_eq!(state.get("count"), Some(StateValue::Int(5)));
}

#[test]
fn increment_and_decrement_compose() {
    let mut state = State::new();
    state.increment("count", 10);
    state.decrement("count", 4);
    assert_eq!(state.get("count"), Some(StateValue::Int(6)));
}

#[test]
fn increment_preserves_uint_kind() {
    let mut state = State::new();
    state.set("count", StateValue::UInt(2));
    state.increment("count", 3);
    assert_eq!(state.get("count"), Some(StateValue::UInt(5)));
}

#[test]
fn remove_clears_the_key() {
    let mut state = State::new();
    state.set("x", StateValue::Int(1));
    assert_eq!(state.remove("x"), Some(StateValue::Int(1)));
    assert!(!state.contains("x"));
}

#[test]
fn as_i64_and_as_u64_convert() {
    assert_eq!(StateValue::UInt(7).as_i64(), 7);
    assert_eq!(StateValue::Int(7).as_u64(), 7);
}
