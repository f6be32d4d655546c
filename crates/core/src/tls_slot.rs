// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-OS-thread state: the last error raised on this thread, and a
//! type-erased weak handle to the `Operation` (from `modest-rt`) presently
//! running on it.
//!
//! `modest-core` sits below `modest-rt` in the dependency graph, so the
//! current-operation slot cannot name `Operation` directly. It stores a
//! `Weak<dyn Any + Send + Sync>` instead; `modest-rt` installs and reads it
//! through the typed helpers here, downcasting back to its own `Operation`.

use std::any::Any;
use std::cell::RefCell;
use std::sync::{Arc, Weak};

use crate::error::ModestError;

thread_local! {
    static LAST_ERROR: RefCell<Option<ModestError>> = const { RefCell::new(None) };
    static CURRENT_OPERATION: RefCell<Option<Weak<dyn Any + Send + Sync>>> = const { RefCell::new(None) };
}

/// Record `err` as the last error raised on the calling thread.
pub fn set_last_error(err: ModestError) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(err));
}

/// Read back (a clone of) the last error raised on the calling thread, if
/// any has been recorded since the thread started or last cleared it.
pub fn last_error() -> Option<ModestError> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

pub fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Install `op` as the operation presently executing on the calling
/// thread. Called by the scheduler immediately before running a job and
/// cleared immediately after, regardless of outcome.
pub fn set_current_operation<T: Any + Send + Sync>(op: &Arc<T>) {
    let weak: Weak<dyn Any + Send + Sync> = Arc::downgrade(op) as Weak<dyn Any + Send + Sync>;
    CURRENT_OPERATION.with(|slot| *slot.borrow_mut() = Some(weak));
}

pub fn clear_current_operation() {
    CURRENT_OPERATION.with(|slot| *slot.borrow_mut() = None);
}

/// Fetch the operation currently executing on this thread, downcast to
/// `T`. Returns `None` if no operation is running, its handle has already
/// been dropped, or it is not a `T`.
pub fn current_operation<T: Any + Send + Sync>() -> Option<Arc<T>> {
    CURRENT_OPERATION.with(|slot| {
        slot.borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .and_then(|arc| arc.downcast::<T>().ok())
    })
}

/// True if `candidate` is the same allocation as the operation currently
/// executing on this thread — used by `Observable` to detect an
/// unregister call issued by the very operation delivering the event,
/// which must be satisfied without deadlocking.
pub fn is_current_operation<T: Any + Send + Sync>(candidate: &Arc<T>) -> bool {
    CURRENT_OPERATION.with(|slot| match slot.borrow().as_ref() {
        Some(weak) => match weak.upgrade() {
            Some(current) => {
                let candidate: Arc<dyn Any + Send + Sync> = candidate.clone();
                Arc::ptr_eq(&current, &candidate)
            }
            None => false,
        },
        None => false,
    })
}

#[cfg(test)]
#[path = "tls_slot_tests.rs"]
mod tests;
