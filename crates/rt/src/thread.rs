// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Thread` contract: per-thread primitives a running [`crate::operation::Operation`]
//! uses to sleep, yield, and observe its own interruption, mirroring the
//! source design's `Thread::sleep`, `Thread::yield`, `Thread::interrupted`,
//! and `Thread::currentThread`.
//!
//! Rust gives no safe way to preempt another OS thread, so interruption
//! here works the way the source design's own `Thread::interrupt` does:
//! set a flag, then wake whatever [`Monitor`] the target thread is
//! currently parked in. A thread not parked in a monitor (not inside
//! [`Thread::sleep`]) just sees the flag on its next check.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use modest_core::current_operation;

use crate::operation::{OperationId, OperationInner};

/// A monitor a thread can wait in, interruptibly: entering blocks until
/// notified, a deadline passes, or the calling thread's [`Monitor::notify_all`]
/// (driven by [`crate::operation::Operation::interrupt`]) fires. Equivalent
/// to the source design's `Monitor`, stripped down to exactly the
/// `wait`/`signalAll` pair [`Thread::sleep`] needs.
pub(crate) struct Monitor {
    lock: Mutex<()>,
    condvar: Condvar,
}

impl Monitor {
    fn new() -> Self {
        Self { lock: Mutex::new(()), condvar: Condvar::new() }
    }

    /// Wake every thread parked in this monitor. Takes the monitor's own
    /// lock first so a concurrent waiter is either not yet inside
    /// `condvar.wait_for` (and will observe the interrupted flag on its
    /// next check before it waits) or is safely woken out of it — there
    /// is no window in which a notify can land between the waiter's flag
    /// check and the wait call itself.
    pub(crate) fn notify_all(&self) {
        let _guard = self.lock.lock();
        self.condvar.notify_all();
    }
}

/// Per-thread primitives for the operation presently running on the
/// calling OS thread. Everything here is a no-op/best-effort when called
/// from a thread that isn't currently executing an `Operation` (there is
/// no free-standing `Thread` registry outside of one), since the only
/// "current thread" identity this runtime tracks is the operation bound
/// to it for the duration of its run.
pub struct Thread;

impl Thread {
    /// Block the calling thread for `duration`, waking early if the
    /// operation running on it is interrupted. Returns `false` if
    /// interrupted (before or during the sleep), `true` if the full
    /// duration elapsed undisturbed.
    ///
    /// Called from outside a running `Operation` (no current-operation
    /// registered), this degrades to an uninterruptible
    /// `std::thread::sleep`.
    pub fn sleep(duration: Duration) -> bool {
        let Some(op) = current_operation::<OperationInner>() else {
            std::thread::sleep(duration);
            return true;
        };

        if op.is_interrupted() {
            return false;
        }

        let monitor = Arc::new(Monitor::new());
        op.set_wait_monitor(Some(monitor.clone()));
        let mut guard = monitor.lock.lock();
        let deadline = Instant::now() + duration;
        let mut interrupted = false;
        loop {
            if op.is_interrupted() {
                interrupted = true;
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            monitor.condvar.wait_for(&mut guard, deadline - now);
        }
        drop(guard);
        op.set_wait_monitor(None);
        !interrupted
    }

    /// Yield the remainder of the calling thread's scheduling quantum.
    pub fn yield_now() {
        std::thread::yield_now();
    }

    /// True if the operation running on the calling thread has been
    /// interrupted. If `clear` is true and it has, the interrupted flag
    /// is cleared so a subsequent check (or the operation's own
    /// post-run bookkeeping) sees it as no longer interrupted.
    pub fn interrupted(clear: bool) -> bool {
        match current_operation::<OperationInner>() {
            Some(op) => op.take_interrupted(clear),
            None => false,
        }
    }

    /// The id of the operation running on the calling thread, if any.
    pub fn current_thread() -> Option<OperationId> {
        current_operation::<OperationInner>().map(|op| op.id())
    }

    /// The last error recorded on the calling thread, mirroring the
    /// source design's per-thread `exception` slot.
    pub fn exception() -> Option<modest_core::ModestError> {
        modest_core::last_error()
    }

    pub fn clear_exception() {
        modest_core::clear_last_error();
    }
}

#[cfg(test)]
#[path = "thread_tests.rs"]
mod tests;
