// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Engine`: owns the shared [`State`] and the FIFO queue of submitted
//! [`Operation`]s, running one admission pass every time the queue or the
//! state might have changed in a way that could unblock a waiting
//! operation.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use modest_core::State;

use crate::operation::Operation;
use crate::pool::ThreadPool;

struct EngineInner {
    state: Mutex<State>,
    queue: Mutex<VecDeque<Operation>>,
    pool: ThreadPool,
}

/// An `Engine` is a cheaply cloneable handle; every clone shares the same
/// queue, state, and thread pool.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new(pool: ThreadPool) -> Self {
        Self::with_state(pool, State::new())
    }

    pub fn with_state(pool: ThreadPool, state: State) -> Self {
        Self {
            inner: Arc::new(EngineInner { state: Mutex::new(state), queue: Mutex::new(VecDeque::new()), pool }),
        }
    }

    /// Queue `op` and immediately run one admission pass.
    pub fn submit(&self, op: Operation) {
        self.inner.queue.lock().push_back(op);
        self.run_admission_pass();
    }

    pub fn queued_count(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Snapshot a single value out of the shared state, without exposing
    /// the lock to callers outside this engine.
    pub fn state_snapshot(&self) -> State {
        self.inner.state.lock().clone()
    }

    /// Evaluate every queued operation's guards against the current
    /// state, in FIFO order: cancel any whose guard demands it, admit and
    /// dispatch any that can run (applying its pre-mutators atomically
    /// under the same state-lock hold), and leave the rest queued. An
    /// operation admitted later in this pass does not wait on one left
    /// queued earlier — there are no priorities, only arrival order among
    /// the operations that do get admitted in a given pass.
    ///
    /// Dispatch only ever reserves a pool permit non-blockingly
    /// (`try_reserve`). A blocking reserve here would hold `state` and
    /// `queue` across the wait, and a running operation's completion
    /// needs that same `state` lock to apply its post-mutators and
    /// release its permit — submitting more admittable operations than
    /// free permits would then deadlock admission against completion.
    /// An operation whose guard admits it but finds no free permit is
    /// simply left queued; the next operation to complete releases a
    /// permit and re-triggers admission.
    fn run_admission_pass(&self) {
        let mut state = self.inner.state.lock();
        let mut queue = self.inner.queue.lock();
        let pending = std::mem::take(&mut *queue);

        for op in pending {
            let result = op.evaluate_guards(&state);
            if result.must_cancel {
                op.mark_canceled();
                continue;
            }
            if result.can_execute && self.inner.pool.try_reserve() {
                op.apply_pre_mutators(&mut state);
                self.dispatch_reserved(op);
            } else {
                queue.push_back(op);
            }
        }
    }

    /// Dispatch `op` using a permit already reserved by the caller. The
    /// operation's own `execute` runs as the pool's job; completion
    /// (post-mutators, then a fresh admission pass) runs as the pool's
    /// `after_release` hook, so any admission retried from it sees this
    /// operation's permit already given back to the pool.
    fn dispatch_reserved(&self, op: Operation) {
        let engine = self.clone();
        let op_for_job = op.clone();
        let op_for_completion = op.clone();
        let job: Box<dyn FnOnce() + Send> = Box::new(move || op_for_job.execute());
        let after_release: Box<dyn FnOnce() + Send> =
            Box::new(move || engine.on_operation_complete(&op_for_completion));
        if let Err(e) = self.inner.pool.dispatch_reserved(job, Some(after_release)) {
            tracing::error!(error = %e, "failed to dispatch operation to pool");
            op.mark_canceled();
        }
    }

    fn on_operation_complete(&self, op: &Operation) {
        {
            let mut state = self.inner.state.lock();
            op.apply_post_mutators(&mut state);
        }
        self.run_admission_pass();
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
