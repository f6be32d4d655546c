// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared engine state: a plain key-value store of integer counters.
//!
//! `State` carries no internal locking of its own — it is mutable only
//! through the owning `Engine`, which serializes every access behind its
//! own state lock. Callers outside `modest-rt` only ever see `&State` or
//! `&mut State` borrowed for the duration of a single guard/mutator call.

use std::collections::HashMap;

/// A single stored value: either signed or unsigned, never both, chosen
/// per-key by whichever caller first sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateValue {
    Int(i64),
    UInt(u64),
}

impl StateValue {
    pub fn as_i64(&self) -> i64 {
        match *self {
            StateValue::Int(v) => v,
            StateValue::UInt(v) => v as i64,
        }
    }

    pub fn as_u64(&self) -> u64 {
        match *self {
            StateValue::Int(v) => v as u64,
            StateValue::UInt(v) => v,
        }
    }
}

/// A flat namespace of named integer counters, snapshotted to JSON for
/// diagnostics and restored the same way.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct State {
    values: HashMap<String, StateValue>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<StateValue> {
        self.values.get(key).copied()
    }

    pub fn set(&mut self, key: impl Into<String>, value: StateValue) {
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<StateValue> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Increment an integer counter by `delta`, creating it at `delta` if
    /// absent. Preserves the existing Int/UInt kind of the key.
    pub fn increment(&mut self, key: &str, delta: i64) -> i64 {
        let entry = self.values.entry(key.to_string()).or_insert(StateValue::Int(0));
        *entry = match *entry {
            StateValue::Int(v) => StateValue::Int(v + delta),
            StateValue::UInt(v) => StateValue::UInt((v as i64 + delta).max(0) as u64),
        };
        entry.as_i64()
    }

    pub fn decrement(&mut self, key: &str, delta: i64) -> i64 {
        self.increment(key, -delta)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
