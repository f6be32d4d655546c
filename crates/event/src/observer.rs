// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Observer` trait and a pointer-identity handle used to find,
//! deduplicate, and unregister a specific observer.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::event::Event;

/// Something an [`crate::observable::Observable`] can deliver events to.
pub trait Observer: Send + Sync {
    fn handle_event(&self, event: &Event);
}

/// A cloneable handle identified by the address of the observer it
/// wraps, so the same observer registered under several event IDs or
/// filters can be found and removed as one identity.
#[derive(Clone)]
pub struct ObserverHandle(pub(crate) Arc<dyn Observer>);

impl ObserverHandle {
    pub fn new(observer: Arc<dyn Observer>) -> Self {
        Self(observer)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn deliver(&self, event: &Event) {
        self.0.handle_event(event);
    }
}

impl PartialEq for ObserverHandle {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for ObserverHandle {}

impl Hash for ObserverHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl std::fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObserverHandle({:#x})", self.addr())
    }
}
