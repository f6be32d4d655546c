// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The error taxonomy shared by every crate in the workspace.
//!
//! Every failure that crosses a public API boundary is a [`ModestError`]:
//! a dotted [`ErrorKind`] plus a message, an optional details map, and an
//! optional causal chain. `Rollback` preserves the original failure as the
//! cause of its own error, per the propagation policy in the source spec.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The dotted taxonomy of error kinds the core produces, exactly as
/// enumerated in the source spec's error handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ErrorKind {
    #[error("Socket.Closed")]
    SocketClosed,
    #[error("Socket.SslHandshakeError")]
    SocketSslHandshakeError,
    #[error("Socket.WriteError")]
    SocketWriteError,
    #[error("Socket.ReadError")]
    SocketReadError,
    #[error("Thread.InsufficientResources")]
    ThreadInsufficientResources,
    #[error("Thread.InvalidParameters")]
    ThreadInvalidParameters,
    #[error("Thread.AccessDenied")]
    ThreadAccessDenied,
    #[error("Thread.InsufficientMemory")]
    ThreadInsufficientMemory,
    #[error("Thread.Error")]
    ThreadError,
    #[error("Interrupted")]
    Interrupted,
    #[error("Connection.InvalidUrl")]
    ConnectionInvalidUrl,
    #[error("Connection.TransactionBeginError")]
    ConnectionTransactionBeginError,
    #[error("Connection.TransactionCommitError")]
    ConnectionTransactionCommitError,
    #[error("Connection.TransactionRollbackError")]
    ConnectionTransactionRollbackError,
    #[error("MalformedUrl")]
    MalformedUrl,
    #[error("Io")]
    Io,
}

/// A reference-counted error record, cheap to clone and to stash on the
/// per-thread last-error slot.
#[derive(Clone)]
pub struct ModestError {
    inner: Arc<Inner>,
}

struct Inner {
    kind: ErrorKind,
    message: String,
    details: HashMap<String, String>,
    cause: Option<ModestError>,
}

impl ModestError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { inner: Arc::new(Inner { kind, message: message.into(), details: HashMap::new(), cause: None }) }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).details.insert(key.into(), value.into());
        self
    }

    /// Attach `self` as the new error's cause. Used by rollback to preserve
    /// the original failure that triggered it.
    pub fn caused_by(kind: ErrorKind, message: impl Into<String>, cause: ModestError) -> Self {
        Self { inner: Arc::new(Inner { kind, message: message.into(), details: HashMap::new(), cause: Some(cause) }) }
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn message(&self) -> &str {
        &self.inner.message
    }

    pub fn details(&self) -> &HashMap<String, String> {
        &self.inner.details
    }

    pub fn cause(&self) -> Option<&ModestError> {
        self.inner.cause.as_ref()
    }
}

impl Inner {
    // Arc::make_mut needs Clone on the pointee.
}

impl Clone for Inner {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            details: self.details.clone(),
            cause: self.cause.clone(),
        }
    }
}

impl fmt::Debug for ModestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModestError")
            .field("kind", &self.inner.kind)
            .field("message", &self.inner.message)
            .field("details", &self.inner.details)
            .field("cause", &self.inner.cause)
            .finish()
    }
}

impl fmt::Display for ModestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.inner.kind, self.inner.message)?;
        if let Some(cause) = &self.inner.cause {
            write!(f, " (caused by: {cause})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ModestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.cause.as_ref().map(|c| c as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for ModestError {
    fn from(e: std::io::Error) -> Self {
        ModestError::new(ErrorKind::Io, e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ModestError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
