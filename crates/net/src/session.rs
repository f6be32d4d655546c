// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reference-counted session handles.
//!
//! The original BIO-pair design exposes `getSession`/`setSession` as
//! plain handle copies onto the underlying library session object. rustls
//! has no equivalent single-session handle: resumption is negotiated
//! through whichever `ClientSessionStore` a `ClientConfig` was built with,
//! keyed internally by server name. `SslSession` wraps that store handle
//! instead — capturing it from one engine and installing it on another
//! (before that engine's first `perform_handshake`) reuses whatever
//! tickets the store has already cached for the target server name,
//! which is the same "attempt an abbreviated handshake" behavior the
//! source design describes, just keyed by store rather than by one
//! specific session.

use std::sync::Arc;

use rustls::client::ClientSessionStore;

/// A cheaply cloneable handle to a client session cache, capturable from
/// one [`crate::tls_engine::TlsEngine`] and installable on another.
#[derive(Clone)]
pub struct SslSession {
    pub(crate) store: Arc<dyn ClientSessionStore>,
}

impl SslSession {
    pub(crate) fn new(store: Arc<dyn ClientSessionStore>) -> Self {
        Self { store }
    }
}

impl std::fmt::Debug for SslSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SslSession").finish_non_exhaustive()
    }
}
