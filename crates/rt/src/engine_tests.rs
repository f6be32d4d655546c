// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::operation::{Guard, StateMutator};
use crate::pool::ThreadPool;
use modest_core::StateValue;

struct BelowLimit {
    key: &'static str,
    limit: i64,
}

impl Guard for BelowLimit {
    fn can_execute(&self, state: &State) -> bool {
        state.get(self.key).map(|v| v.as_i64()).unwrap_or(0) < self.limit
    }
}

struct AdjustCounter {
    key: &'static str,
}

impl StateMutator for AdjustCounter {
    fn mutate_pre_execution(&self, state: &mut State) {
        state.increment(self.key, 1);
    }
    fn mutate_post_execution(&self, state: &mut State) {
        state.increment(self.key, -1);
    }
}

struct NeverAllow;
impl Guard for NeverAllow {
    fn can_execute(&self, _state: &State) -> bool {
        false
    }
    fn must_cancel(&self, _state: &State) -> bool {
        true
    }
}

#[test]
fn engine_runs_a_guard_gated_operation_once_state_allows_it() {
    let engine = Engine::new(ThreadPool::new(Some(2)));
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = ran.clone();

    let op = Operation::new(move || {
        ran_clone.fetch_add(1, AtomicOrdering::SeqCst);
    });
    op.add_guard(Arc::new(BelowLimit { key: "running", limit: 1 }), true);
    op.add_state_mutator(Arc::new(AdjustCounter { key: "running" }), true);

    engine.submit(op.clone());
    assert!(op.wait_for(false, Some(Duration::from_millis(500))));
    assert_eq!(ran.load(AtomicOrdering::SeqCst), 1);
    assert!(op.finished());
    assert_eq!(engine.state_snapshot().get("running"), Some(StateValue::Int(0)));
}

#[test]
fn engine_cancels_an_operation_whose_guard_demands_it() {
    let engine = Engine::new(ThreadPool::new(Some(1)));
    let op = Operation::new(|| {});
    op.add_guard(Arc::new(NeverAllow), true);

    engine.submit(op.clone());
    assert!(op.wait_for(false, Some(Duration::from_millis(500))));
    assert!(op.canceled());
    assert!(!op.finished());
}

#[test]
fn engine_never_exceeds_a_guards_concurrency_limit() {
    // End-to-end scenario 1 from the source spec: state starts
    // {running: 0}; 100 operations each gated on running < 5, a 10ms
    // runnable, pre/post mutators adjusting the counter. All 100 must
    // finish and running must never exceed 5.
    let engine = Engine::new(ThreadPool::new(Some(16)));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut ops = Vec::new();

    for _ in 0..100 {
        let peak_clone = peak.clone();
        let engine_clone = engine.clone();
        let op = Operation::new(move || {
            let current = engine_clone.state_snapshot().get("running").map(|v| v.as_i64()).unwrap_or(0);
            peak_clone.fetch_max(current as usize, AtomicOrdering::SeqCst);
            std::thread::sleep(Duration::from_millis(10));
        });
        op.add_guard(Arc::new(BelowLimit { key: "running", limit: 5 }), true);
        op.add_state_mutator(Arc::new(AdjustCounter { key: "running" }), true);
        ops.push(op);
    }

    for op in &ops {
        engine.submit(op.clone());
    }

    for op in &ops {
        assert!(op.wait_for(false, Some(Duration::from_secs(5))));
        assert!(op.finished());
    }
    assert!(peak.load(AtomicOrdering::SeqCst) <= 5);
    assert_eq!(engine.state_snapshot().get("running"), Some(StateValue::Int(0)));
}

#[test]
fn completion_re_runs_admission_so_blocked_operations_proceed() {
    let engine = Engine::new(ThreadPool::new(Some(1)));

    let first = Operation::new(|| {
        std::thread::sleep(Duration::from_millis(30));
    });
    first.add_guard(Arc::new(BelowLimit { key: "running", limit: 1 }), true);
    first.add_state_mutator(Arc::new(AdjustCounter { key: "running" }), true);

    let second = Operation::new(|| {});
    second.add_guard(Arc::new(BelowLimit { key: "running", limit: 1 }), true);
    second.add_state_mutator(Arc::new(AdjustCounter { key: "running" }), true);

    engine.submit(first.clone());
    engine.submit(second.clone());
    assert_eq!(engine.queued_count(), 1);

    assert!(first.wait_for(false, Some(Duration::from_secs(1))));
    assert!(second.wait_for(false, Some(Duration::from_secs(1))));
    assert!(first.finished());
    assert!(second.finished());
}
