// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A per-connection prepared-statement cache, keyed case-insensitively on
//! SQL text: lookup resets the cached statement before handing it back;
//! a reset failure evicts the entry and falls through to a fresh
//! prepare. Replacing a cached entry (on eviction or key collision)
//! always disposes the statement it replaces.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use modest_core::{ErrorKind, ModestError, Result};

use crate::connection::Statement;

#[derive(Debug, Clone)]
struct CaseInsensitiveSql(String);

impl PartialEq for CaseInsensitiveSql {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for CaseInsensitiveSql {}

impl Hash for CaseInsensitiveSql {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_ascii_lowercase().hash(state);
    }
}

#[derive(Default)]
pub struct StatementCache {
    entries: HashMap<CaseInsensitiveSql, Box<dyn Statement>>,
}

impl StatementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `sql`, resetting the cached statement on a hit; on a
    /// miss, or a reset failure, dispose whatever was there and prepare
    /// a fresh statement via `create`.
    pub fn get_or_create<F>(&mut self, sql: &str, create: F) -> Result<&mut dyn Statement>
    where
        F: FnOnce(&str) -> Result<Box<dyn Statement>>,
    {
        let key = CaseInsensitiveSql(sql.to_string());

        let hit_is_valid = match self.entries.get_mut(&key) {
            Some(stmt) => stmt.reset().is_ok(),
            None => false,
        };

        if !hit_is_valid {
            if let Some(mut stale) = self.entries.remove(&key) {
                stale.dispose();
            }
            let fresh = create(sql)?;
            if let Some(mut evicted) = self.entries.insert(key.clone(), fresh) {
                evicted.dispose();
            }
        }

        self.entries
            .get_mut(&key)
            .map(|stmt| stmt.as_mut())
            .ok_or_else(|| ModestError::new(ErrorKind::Io, "statement cache entry vanished after insert"))
    }

    /// Dispose every cached statement, leaving the cache empty. Called by
    /// `Connection::close`.
    pub fn clear(&mut self) {
        for (_, mut stmt) in self.entries.drain() {
            stmt.dispose();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
