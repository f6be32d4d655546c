// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use crate::connection::{ExecResult, SqlValue};

struct FakeStatement {
    sql: String,
    reset_fails: bool,
    disposed: Arc<AtomicUsize>,
}

impl FakeStatement {
    fn new(sql: &str, reset_fails: bool, disposed: Arc<AtomicUsize>) -> Box<dyn Statement> {
        Box::new(Self { sql: sql.to_string(), reset_fails, disposed })
    }
}

impl Statement for FakeStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, _index: usize, _value: SqlValue) -> Result<()> {
        Ok(())
    }

    fn bind_named(&mut self, _name: &str, _value: SqlValue) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self) -> Result<ExecResult> {
        Ok(ExecResult::default())
    }

    fn reset(&mut self) -> Result<()> {
        if self.reset_fails {
            Err(ModestError::new(ErrorKind::Io, "reset failed"))
        } else {
            Ok(())
        }
    }

    fn dispose(&mut self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn a_miss_prepares_and_caches_a_new_statement() {
    let mut cache = StatementCache::new();
    let disposed = Arc::new(AtomicUsize::new(0));
    let d = disposed.clone();
    cache.get_or_create("SELECT 1", move |sql| Ok(FakeStatement::new(sql, false, d))).expect("prepare");
    assert_eq!(cache.len(), 1);
}

#[test]
fn a_hit_is_case_insensitive_and_resets_instead_of_reprepraring() {
    let mut cache = StatementCache::new();
    let disposed = Arc::new(AtomicUsize::new(0));
    let d = disposed.clone();
    cache.get_or_create("select 1", move |sql| Ok(FakeStatement::new(sql, false, d))).expect("prepare");

    let d2 = disposed.clone();
    cache.get_or_create("SELECT 1", move |sql| Ok(FakeStatement::new(sql, false, d2))).expect("hit");

    assert_eq!(cache.len(), 1);
    assert_eq!(disposed.load(Ordering::SeqCst), 0, "the cached statement must not be disposed on a hit");
}

#[test]
fn a_reset_failure_evicts_and_disposes_before_preparing_fresh() {
    let mut cache = StatementCache::new();
    let disposed = Arc::new(AtomicUsize::new(0));
    let d = disposed.clone();
    cache.get_or_create("SELECT 1", move |sql| Ok(FakeStatement::new(sql, true, d))).expect("prepare");

    let d2 = disposed.clone();
    cache.get_or_create("SELECT 1", move |sql| Ok(FakeStatement::new(sql, false, d2))).expect("reprepare after evict");

    assert_eq!(cache.len(), 1);
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}

#[test]
fn clear_disposes_every_cached_statement() {
    let mut cache = StatementCache::new();
    let disposed = Arc::new(AtomicUsize::new(0));
    for sql in ["SELECT 1", "SELECT 2", "SELECT 3"] {
        let d = disposed.clone();
        cache.get_or_create(sql, move |sql| Ok(FakeStatement::new(sql, false, d))).expect("prepare");
    }

    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(disposed.load(Ordering::SeqCst), 3);
}
