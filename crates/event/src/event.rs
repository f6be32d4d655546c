// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An event is a small map with at least an event ID and a
//! monotonically assigned sequence ID, plus whatever other fields the
//! publisher attached; a filter matches an event when it is a subset of
//! it — every key the filter names is present in the event with an
//! equal value.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type EventId = u64;

/// A published event: an ID, a sequence number assigned at schedule
/// time, an optional `parallel` hint, and arbitrary extra fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub sequence_id: u64,
    #[serde(default)]
    pub parallel: bool,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Look up `key` treating `id` and `sequenceId` as if they were
    /// ordinary fields, so a filter can match on them too.
    pub fn field(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(Value::from(self.id)),
            "sequenceId" => Some(Value::from(self.sequence_id)),
            other => self.fields.get(other).cloned(),
        }
    }
}

/// A small map of expected field values; matches an event when it is a
/// subset of it. An empty filter matches every event.
#[derive(Debug, Clone, Default)]
pub struct Filter(BTreeMap<String, Value>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_subset_of(&self, event: &Event) -> bool {
        self.0.iter().all(|(key, value)| event.field(key).as_ref() == Some(value))
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Filter {}

impl Hash for Filter {
    /// `BTreeMap` always iterates in key order, so serializing to JSON
    /// gives a canonical string two equal filters always agree on.
    fn hash<H: Hasher>(&self, state: &mut H) {
        serde_json::to_string(&self.0).unwrap_or_default().hash(state);
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
