// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::thread;
use std::time::Duration;

use super::*;
use modest_core::StateValue;

struct AlwaysAllow;
impl Guard for AlwaysAllow {
    fn can_execute(&self, _state: &State) -> bool {
        true
    }
}

struct RequiresFlag(&'static str);
impl Guard for RequiresFlag {
    fn can_execute(&self, state: &State) -> bool {
        matches!(state.get(self.0), Some(StateValue::Int(1)))
    }
}

struct AlwaysCancel;
impl Guard for AlwaysCancel {
    fn can_execute(&self, _state: &State) -> bool {
        false
    }
    fn must_cancel(&self, _state: &State) -> bool {
        true
    }
}

struct Increment(&'static str);
impl StateMutator for Increment {
    fn mutate_pre_execution(&self, state: &mut State) {
        state.increment(self.0, 1);
    }
    fn mutate_post_execution(&self, state: &mut State) {
        state.increment(self.0, -1);
    }
}

#[test]
fn empty_guard_chain_always_executes() {
    let chain = GuardChain::default();
    let result = chain.evaluate(&State::new());
    assert!(result.can_execute);
    assert!(!result.must_cancel);
}

#[test]
fn guard_chain_ands_can_execute_across_leaves() {
    let mut chain = GuardChain::default();
    chain.add_back(Arc::new(AlwaysAllow));
    chain.add_back(Arc::new(RequiresFlag("ready")));

    let mut state = State::new();
    assert!(!chain.evaluate(&state).can_execute);

    state.set("ready", StateValue::Int(1));
    assert!(chain.evaluate(&state).can_execute);
}

#[test]
fn guard_chain_ors_must_cancel_across_leaves() {
    let mut chain = GuardChain::default();
    chain.add_back(Arc::new(AlwaysAllow));
    chain.add_back(Arc::new(AlwaysCancel));

    let result = chain.evaluate(&State::new());
    assert!(result.must_cancel);
}

#[test]
fn mutator_chain_applies_pre_and_post_in_order() {
    let mut chain = MutatorChain::default();
    chain.add_back(Arc::new(Increment("count")));
    chain.add_back(Arc::new(Increment("count")));

    let mut state = State::new();
    chain.apply_pre(&mut state);
    assert_eq!(state.get("count"), Some(StateValue::Int(2)));
    chain.apply_post(&mut state);
    assert_eq!(state.get("count"), Some(StateValue::Int(0)));
}

#[test]
fn operation_runs_and_reports_finished() {
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = ran.clone();
    let op = Operation::new(move || {
        ran_clone.fetch_add(1, AtomicOrdering::SeqCst);
    });

    assert_eq!(op.phase(), OperationPhase::Initial);
    op.execute();

    assert_eq!(ran.load(AtomicOrdering::SeqCst), 1);
    assert!(op.started());
    assert!(op.finished());
    assert!(!op.canceled());
    assert_eq!(op.phase(), OperationPhase::Finished);
}

#[test]
fn interrupted_operation_is_marked_canceled_after_running() {
    let op = Operation::new(|| {});
    op.interrupt();
    op.execute();
    assert!(op.is_interrupted());
    assert!(op.canceled());
    assert!(!op.finished());
}

#[test]
fn wait_for_blocks_until_execute_completes() {
    let op = Operation::new(|| {
        thread::sleep(Duration::from_millis(20));
    });
    let op_for_thread = op.clone();
    let handle = thread::spawn(move || op_for_thread.execute());

    assert!(op.wait_for(false, None));
    handle.join().unwrap();
    assert!(op.finished());
}

#[test]
fn wait_for_with_timeout_returns_false_result_if_not_stopped() {
    let op = Operation::new(|| {
        thread::sleep(Duration::from_millis(200));
    });
    let op_for_thread = op.clone();
    let handle = thread::spawn(move || op_for_thread.execute());

    let stopped = op.wait_for(false, Some(Duration::from_millis(10)));
    assert!(!stopped);

    assert!(op.wait_for(false, None));
    handle.join().unwrap();
}

#[test]
fn current_is_interrupted_reflects_the_running_operation() {
    let op = Operation::new(|| {
        assert!(Operation::current_is_interrupted());
    });
    op.interrupt();
    op.execute();
    assert!(!Operation::current_is_interrupted());
}

#[test]
fn is_current_thread_is_true_only_while_running() {
    let cell: Arc<Mutex<Option<Operation>>> = Arc::new(Mutex::new(None));
    let cell_clone = cell.clone();
    let seen_inside = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let seen_inside_clone = seen_inside.clone();

    let op = Operation::new(move || {
        if let Some(handle) = cell_clone.lock().as_ref() {
            seen_inside_clone.store(handle.is_current_thread(), AtomicOrdering::SeqCst);
        }
    });
    *cell.lock() = Some(op.clone());

    op.execute();
    assert!(seen_inside.load(AtomicOrdering::SeqCst));
    assert!(!op.is_current_thread());
}
