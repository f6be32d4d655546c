// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Operation`: a unit of work an [`crate::engine::Engine`] admits and runs
//! only once its guards agree the current [`State`] allows it.
//!
//! `Operation` is a thin, freely cloneable handle around a shared
//! `Arc<OperationInner>` — the same handle is safe to hold from any
//! thread, including the one currently executing it, matching the
//! "safely copyable from any thread" requirement this design is built to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use modest_core::{current_operation, is_current_operation, set_current_operation, State};

use crate::thread::Monitor;

modest_core::define_id! {
    /// Identifies an [`Operation`] for diagnostics and equality across clones.
    pub struct OperationId("op-");
}

/// Decides whether an [`Operation`] may run against the engine's current
/// [`State`].
pub trait Guard: Send + Sync {
    /// True if the operation is permitted to execute right now.
    fn can_execute(&self, state: &State) -> bool;

    /// True if the operation can never execute and should be canceled
    /// outright rather than left queued. Defaults to never canceling.
    fn must_cancel(&self, _state: &State) -> bool {
        false
    }
}

/// Mutates the engine's [`State`] immediately before or after an
/// [`Operation`] runs, under the engine's own state lock.
pub trait StateMutator: Send + Sync {
    fn mutate_pre_execution(&self, _state: &mut State) {}
    fn mutate_post_execution(&self, _state: &mut State) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardResult {
    pub can_execute: bool,
    pub must_cancel: bool,
}

/// A linked chain of guards, built by O(1) prepend/append: adding a guard
/// never re-walks or clones the existing chain, it wraps it in one new
/// node.
#[derive(Clone, Default)]
pub struct GuardChain {
    root: Option<GuardNode>,
}

#[derive(Clone)]
enum GuardNode {
    Leaf(Arc<dyn Guard>),
    Chain(Vec<GuardNode>),
}

impl GuardChain {
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn add_front(&mut self, guard: Arc<dyn Guard>) {
        let leaf = GuardNode::Leaf(guard);
        self.root = Some(match self.root.take() {
            None => leaf,
            Some(existing) => GuardNode::Chain(vec![leaf, existing]),
        });
    }

    pub fn add_back(&mut self, guard: Arc<dyn Guard>) {
        let leaf = GuardNode::Leaf(guard);
        self.root = Some(match self.root.take() {
            None => leaf,
            Some(existing) => GuardNode::Chain(vec![existing, leaf]),
        });
    }

    /// AND together every guard's `can_execute` and OR together every
    /// guard's `must_cancel`, preserving insertion order. An empty chain
    /// always permits execution and never cancels.
    pub fn evaluate(&self, state: &State) -> GuardResult {
        match &self.root {
            None => GuardResult { can_execute: true, must_cancel: false },
            Some(node) => node.evaluate(state),
        }
    }
}

impl GuardNode {
    fn evaluate(&self, state: &State) -> GuardResult {
        match self {
            GuardNode::Leaf(g) => {
                GuardResult { can_execute: g.can_execute(state), must_cancel: g.must_cancel(state) }
            }
            GuardNode::Chain(children) => {
                let mut result = GuardResult { can_execute: true, must_cancel: false };
                for child in children {
                    let r = child.evaluate(state);
                    result.can_execute &= r.can_execute;
                    result.must_cancel |= r.must_cancel;
                }
                result
            }
        }
    }
}

/// A linked chain of state mutators, built the same O(1) way as
/// [`GuardChain`]. Pre-mutators run front-to-back before the operation
/// executes; post-mutators run front-to-back after.
#[derive(Clone, Default)]
pub struct MutatorChain {
    root: Option<MutatorNode>,
}

#[derive(Clone)]
enum MutatorNode {
    Leaf(Arc<dyn StateMutator>),
    Chain(Vec<MutatorNode>),
}

impl MutatorChain {
    pub fn add_front(&mut self, mutator: Arc<dyn StateMutator>) {
        let leaf = MutatorNode::Leaf(mutator);
        self.root = Some(match self.root.take() {
            None => leaf,
            Some(existing) => MutatorNode::Chain(vec![leaf, existing]),
        });
    }

    pub fn add_back(&mut self, mutator: Arc<dyn StateMutator>) {
        let leaf = MutatorNode::Leaf(mutator);
        self.root = Some(match self.root.take() {
            None => leaf,
            Some(existing) => MutatorNode::Chain(vec![existing, leaf]),
        });
    }

    pub fn apply_pre(&self, state: &mut State) {
        if let Some(node) = &self.root {
            node.apply_pre(state);
        }
    }

    pub fn apply_post(&self, state: &mut State) {
        if let Some(node) = &self.root {
            node.apply_post(state);
        }
    }
}

impl MutatorNode {
    fn apply_pre(&self, state: &mut State) {
        match self {
            MutatorNode::Leaf(m) => m.mutate_pre_execution(state),
            MutatorNode::Chain(children) => children.iter().for_each(|c| c.apply_pre(state)),
        }
    }

    fn apply_post(&self, state: &mut State) {
        match self {
            MutatorNode::Leaf(m) => m.mutate_post_execution(state),
            MutatorNode::Chain(children) => children.iter().for_each(|c| c.apply_post(state)),
        }
    }
}

/// The lifecycle state of an [`Operation`], mirroring
/// `initial -> queued -> admitted -> started -> running -> stopped{finished|canceled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    Initial,
    Queued,
    Admitted,
    Running,
    Finished,
    Canceled,
}

pub(crate) struct OperationInner {
    id: OperationId,
    runnable: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    guards: Mutex<GuardChain>,
    mutators: Mutex<MutatorChain>,
    thread: Mutex<Option<std::thread::ThreadId>>,
    /// The monitor this operation's thread is currently parked in, if
    /// it's inside [`crate::thread::Thread::sleep`] — `interrupt` wakes
    /// it the same way the source design's `Thread::interrupt` wakes a
    /// thread waiting in a `Monitor`.
    wait_monitor: Mutex<Option<Arc<Monitor>>>,
    started: AtomicBool,
    interrupted: AtomicBool,
    stopped: AtomicBool,
    finished: AtomicBool,
    canceled: AtomicBool,
    done: Condvar,
    done_lock: Mutex<()>,
}

impl OperationInner {
    pub(crate) fn id(&self) -> OperationId {
        self.id
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub(crate) fn take_interrupted(&self, clear: bool) -> bool {
        if clear {
            self.interrupted.swap(false, Ordering::SeqCst)
        } else {
            self.is_interrupted()
        }
    }

    pub(crate) fn set_wait_monitor(&self, monitor: Option<Arc<Monitor>>) {
        *self.wait_monitor.lock() = monitor;
    }

    /// Wake this operation's thread if it's currently parked in a
    /// [`Monitor`] (e.g. inside [`crate::thread::Thread::sleep`]).
    fn wake_wait_monitor(&self) {
        let monitor = self.wait_monitor.lock().clone();
        if let Some(monitor) = monitor {
            monitor.notify_all();
        }
    }
}

/// A handle to a unit of work submitted to an [`crate::engine::Engine`].
#[derive(Clone)]
pub struct Operation {
    inner: Arc<OperationInner>,
}

impl Operation {
    pub fn new(runnable: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Arc::new(OperationInner {
                id: OperationId::new(),
                runnable: Mutex::new(Some(Box::new(runnable))),
                guards: Mutex::new(GuardChain::default()),
                mutators: Mutex::new(MutatorChain::default()),
                thread: Mutex::new(None),
                wait_monitor: Mutex::new(None),
                started: AtomicBool::new(false),
                interrupted: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                finished: AtomicBool::new(false),
                canceled: AtomicBool::new(false),
                done: Condvar::new(),
                done_lock: Mutex::new(()),
            }),
        }
    }

    pub fn id(&self) -> OperationId {
        self.inner.id
    }

    /// Add a guard. Must be called before the operation is submitted to an
    /// engine; guards are not safe to add once evaluation may be underway.
    pub fn add_guard(&self, guard: Arc<dyn Guard>, front: bool) {
        let mut guards = self.inner.guards.lock();
        if front {
            guards.add_front(guard);
        } else {
            guards.add_back(guard);
        }
    }

    /// Add a state mutator. Same before-submission restriction as
    /// [`Operation::add_guard`].
    pub fn add_state_mutator(&self, mutator: Arc<dyn StateMutator>, front: bool) {
        let mut mutators = self.inner.mutators.lock();
        if front {
            mutators.add_front(mutator);
        } else {
            mutators.add_back(mutator);
        }
    }

    pub(crate) fn evaluate_guards(&self, state: &State) -> GuardResult {
        self.inner.guards.lock().evaluate(state)
    }

    pub(crate) fn apply_pre_mutators(&self, state: &mut State) {
        self.inner.mutators.lock().apply_pre(state);
    }

    pub(crate) fn apply_post_mutators(&self, state: &mut State) {
        self.inner.mutators.lock().apply_post(state);
    }

    /// Run this operation's runnable on the calling (pool worker) thread.
    /// Called exactly once, by an engine's dispatcher.
    pub(crate) fn execute(&self) {
        self.inner.thread.lock().replace(std::thread::current().id());
        self.inner.started.store(true, Ordering::SeqCst);
        set_current_operation(&self.inner);

        let job = self.inner.runnable.lock().take();
        if let Some(job) = job {
            job();
        }

        modest_core::clear_current_operation();
        if self.inner.interrupted.load(Ordering::SeqCst) {
            self.inner.canceled.store(true, Ordering::SeqCst);
        } else {
            self.inner.finished.store(true, Ordering::SeqCst);
        }
        self.inner.stopped.store(true, Ordering::SeqCst);
        let _guard = self.inner.done_lock.lock();
        self.inner.done.notify_all();
    }

    /// Mark this operation canceled without ever having run it, because a
    /// guard's `must_cancel` fired while it was still queued.
    pub(crate) fn mark_canceled(&self) {
        self.inner.canceled.store(true, Ordering::SeqCst);
        self.inner.stopped.store(true, Ordering::SeqCst);
        let _guard = self.inner.done_lock.lock();
        self.inner.done.notify_all();
    }

    /// Interrupt this operation. If still queued it will be canceled on
    /// the next admission pass; if already running,
    /// [`Operation::is_interrupted`] (and [`crate::thread::Thread::interrupted`])
    /// become true for the remainder of its run, and if it is currently
    /// blocked in [`crate::thread::Thread::sleep`] that wait is woken
    /// immediately rather than left to time out on its own.
    pub fn interrupt(&self) {
        self.inner.interrupted.store(true, Ordering::SeqCst);
        self.inner.wake_wait_monitor();
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> bool {
        self.inner.finished.load(Ordering::SeqCst)
    }

    pub fn canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::SeqCst)
    }

    /// The OS thread this operation is (or was last) running on, if it has
    /// started.
    pub fn thread_id(&self) -> Option<std::thread::ThreadId> {
        *self.inner.thread.lock()
    }

    pub fn phase(&self) -> OperationPhase {
        if self.canceled() {
            OperationPhase::Canceled
        } else if self.finished() {
            OperationPhase::Finished
        } else if self.started() {
            OperationPhase::Running
        } else {
            OperationPhase::Initial
        }
    }

    /// Block until this operation stops. If `interruptible` is true and
    /// the calling thread is itself the current thread of a running,
    /// interrupted `Operation`, returns `false` early without waiting for
    /// this operation to finish. Returns `true` if `self` actually
    /// stopped (whether or not a deadline was given).
    pub fn wait_for(&self, interruptible: bool, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut guard = self.inner.done_lock.lock();
        while !self.stopped() {
            if interruptible {
                if let Some(current) = current_operation::<OperationInner>() {
                    if Arc::ptr_eq(&current, &self.inner) {
                        // An operation cannot block on itself finishing.
                        return false;
                    }
                    if current.interrupted.load(Ordering::SeqCst) {
                        return false;
                    }
                }
            }
            match deadline {
                None => self.inner.done.wait(&mut guard),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return self.stopped();
                    }
                    self.inner.done.wait_for(&mut guard, deadline - now);
                }
            }
        }
        true
    }

    /// True if the calling thread is currently running `self`.
    pub fn is_current_thread(&self) -> bool {
        is_current_operation(&self.inner)
    }

    /// Static equivalent of the source design's `Operation::interrupted()`:
    /// true if the operation running on the calling thread has been
    /// interrupted.
    pub fn current_is_interrupted() -> bool {
        current_operation::<OperationInner>().is_some_and(|op| op.interrupted.load(Ordering::SeqCst))
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation").field("id", &self.inner.id).field("phase", &self.phase()).finish()
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
