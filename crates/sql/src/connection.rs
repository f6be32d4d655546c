// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Connection`/`Statement` traits every driver implements, plus the
//! value and row types that cross the boundary between them.
//!
//! `begin`/`commit`/`rollback` are provided as default methods that
//! `prepare`-and-`execute` the corresponding literal SQL text, exactly as
//! the source design's transaction convenience does — a driver only has
//! to implement `prepare` and `close` to get all three for free.

use modest_core::{ErrorKind, ModestError, Result};

/// A value bound to, or fetched from, a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// One row of a result set, with both by-index and by-name column access.
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    pub fn by_name(&self, name: &str) -> Option<&SqlValue> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)).and_then(|i| self.values.get(i))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// The outcome of executing a prepared statement: rows affected for a
/// mutating statement, plus any rows a query produced.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub rows: Vec<Row>,
}

/// A single prepared statement, cached by its driver's connection keyed
/// on the SQL text it was prepared from.
pub trait Statement: Send {
    /// The SQL text this statement was prepared from.
    fn sql(&self) -> &str;

    /// Bind a value to the parameter at 1-based position `index`.
    fn bind(&mut self, index: usize, value: SqlValue) -> Result<()>;

    /// Bind a value to a named parameter (`:name`, `@name`, or `$name`
    /// depending on the driver's placeholder syntax).
    fn bind_named(&mut self, name: &str, value: SqlValue) -> Result<()>;

    /// Run the statement with whatever parameters are currently bound.
    fn execute(&mut self) -> Result<ExecResult>;

    /// Clear bound parameters and any cursor state so the statement is
    /// ready for its next use. Called by the cache on every lookup hit;
    /// a failure here evicts the statement instead of reusing it.
    fn reset(&mut self) -> Result<()>;

    /// Release whatever native resources this statement holds. Called by
    /// the cache when the statement is evicted or the connection closes.
    fn dispose(&mut self) {}
}

/// A connection to a SQL database: prepares and caches statements, and
/// offers `begin`/`commit`/`rollback` transaction convenience.
pub trait Connection: Send {
    /// Look up `sql` in this connection's statement cache (case
    /// insensitively), or prepare and cache a new statement for it.
    fn prepare(&mut self, sql: &str) -> Result<&mut dyn Statement>;

    /// Dispose every cached statement and release the underlying
    /// connection handle.
    fn close(&mut self);

    fn begin(&mut self) -> Result<()> {
        self.prepare("BEGIN")
            .and_then(Statement::execute)
            .map(|_| ())
            .map_err(|cause| ModestError::caused_by(ErrorKind::ConnectionTransactionBeginError, "BEGIN failed", cause))
    }

    fn commit(&mut self) -> Result<()> {
        self.prepare("COMMIT")
            .and_then(Statement::execute)
            .map(|_| ())
            .map_err(|cause| ModestError::caused_by(ErrorKind::ConnectionTransactionCommitError, "COMMIT failed", cause))
    }

    fn rollback(&mut self) -> Result<()> {
        self.prepare("ROLLBACK")
            .and_then(Statement::execute)
            .map(|_| ())
            .map_err(|cause| ModestError::caused_by(ErrorKind::ConnectionTransactionRollbackError, "ROLLBACK failed", cause))
    }

    /// Roll back after `cause` made that necessary, preserving `cause` as
    /// the returned error's cause even when the `ROLLBACK` statement
    /// itself succeeds — the failure that triggered the rollback must
    /// still surface to the caller.
    fn rollback_after(&mut self, cause: ModestError) -> Result<()> {
        match self.rollback() {
            Ok(()) => Err(ModestError::caused_by(ErrorKind::ConnectionTransactionRollbackError, "transaction rolled back", cause)),
            Err(rollback_err) => Err(ModestError::caused_by(
                ErrorKind::ConnectionTransactionRollbackError,
                format!("ROLLBACK itself failed: {rollback_err}"),
                cause,
            )),
        }
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
