// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! modest-net: a non-blocking TLS engine pumped against explicit memory
//! buffers rather than a socket directly, built on `rustls`. The peer's
//! leaf certificate common name is checked against an additive allow-list
//! independent of the base chain-of-trust verifier, and negotiated
//! sessions are exposed as reference-counted handles that can be
//! transplanted onto another engine before its handshake to attempt
//! resumption.

pub mod session;
pub mod tls_engine;
mod verify;

pub use session::SslSession;
pub use tls_engine::{ReceiveOutcome, TlsEngine};
