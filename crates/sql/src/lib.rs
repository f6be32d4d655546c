// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! modest-sql: connection URL parsing, prepared-statement caching, and
//! transaction helpers common to every SQL driver, plus a `sqlite`
//! reference driver and a MySQL-flavored upsert string builder.

pub mod cache;
pub mod connection;
pub mod mysql_helper;
pub mod sqlite;
pub mod url;

pub use cache::StatementCache;
pub use connection::{Connection, ExecResult, Row, SqlValue, Statement};
pub use mysql_helper::insert_on_duplicate_key_update;
pub use sqlite::SqliteConnection;
pub use url::ConnectionUrl;
