// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The one concrete driver shipped with this crate: a `sqlite`
//! connection backed by `rusqlite`, serving both as a usable driver and
//! as the reference implementation other drivers are modeled on.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rusqlite::types::Value as RusqliteValue;

use modest_core::{ErrorKind, ModestError, Result};

use crate::cache::StatementCache;
use crate::connection::{Connection, ExecResult, Row, SqlValue, Statement};
use crate::url::{ConnectionUrl, SqlitePath};

pub struct SqliteConnection {
    conn: Rc<RefCell<rusqlite::Connection>>,
    cache: StatementCache,
}

impl SqliteConnection {
    pub fn open(path: &SqlitePath) -> Result<Self> {
        let conn = match path {
            SqlitePath::Memory => rusqlite::Connection::open_in_memory(),
            SqlitePath::File(file) => rusqlite::Connection::open(file),
        }
        .map_err(convert_err)?;
        Ok(Self { conn: Rc::new(RefCell::new(conn)), cache: StatementCache::new() })
    }

    #[tracing::instrument(skip(url))]
    pub fn connect(url: &ConnectionUrl) -> Result<Self> {
        match url {
            ConnectionUrl::Sqlite(path) => Self::open(path),
            ConnectionUrl::Network(net) => {
                Err(ModestError::new(ErrorKind::ConnectionInvalidUrl, format!("the sqlite driver cannot open a '{}' url", net.driver)))
            }
        }
    }
}

impl Connection for SqliteConnection {
    fn prepare(&mut self, sql: &str) -> Result<&mut dyn Statement> {
        let conn = self.conn.clone();
        self.cache.get_or_create(sql, move |sql| Ok(Box::new(SqliteStatement::new(conn, sql)) as Box<dyn Statement>))
    }

    fn close(&mut self) {
        self.cache.clear();
    }
}

pub struct SqliteStatement {
    conn: Rc<RefCell<rusqlite::Connection>>,
    sql: String,
    positional: Vec<Option<SqlValue>>,
    named: HashMap<String, SqlValue>,
}

impl SqliteStatement {
    fn new(conn: Rc<RefCell<rusqlite::Connection>>, sql: &str) -> Self {
        Self { conn, sql: sql.to_string(), positional: Vec::new(), named: HashMap::new() }
    }
}

impl Statement for SqliteStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, index: usize, value: SqlValue) -> Result<()> {
        if index == 0 {
            return Err(ModestError::new(ErrorKind::Io, "bind index is 1-based; 0 is not a valid parameter position"));
        }
        if self.positional.len() < index {
            self.positional.resize(index, None);
        }
        self.positional[index - 1] = Some(value);
        Ok(())
    }

    fn bind_named(&mut self, name: &str, value: SqlValue) -> Result<()> {
        self.named.insert(name.to_string(), value);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.positional.clear();
        self.named.clear();
        Ok(())
    }

    fn execute(&mut self) -> Result<ExecResult> {
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare_cached(&self.sql).map_err(convert_err)?;

        for (zero_based, value) in self.positional.iter().enumerate() {
            let value = value.clone().unwrap_or(SqlValue::Null);
            stmt.raw_bind_parameter(zero_based + 1, to_rusqlite_value(&value)).map_err(convert_err)?;
        }
        for (name, value) in &self.named {
            if let Some(index) = resolve_named_index(&stmt, name).map_err(convert_err)? {
                stmt.raw_bind_parameter(index, to_rusqlite_value(value)).map_err(convert_err)?;
            }
        }

        let column_count = stmt.column_count();
        if column_count == 0 {
            let rows_affected = stmt.raw_execute().map_err(convert_err)? as u64;
            return Ok(ExecResult { rows_affected, rows: Vec::new() });
        }

        let columns: Vec<String> = (0..column_count).map(|i| stmt.column_name(i).map(str::to_string).unwrap_or_default()).collect();
        let mut rows = Vec::new();
        let mut query_rows = stmt.raw_query();
        while let Some(row) = query_rows.next().map_err(convert_err)? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value: RusqliteValue = row.get(i).map_err(convert_err)?;
                values.push(from_rusqlite_value(value));
            }
            rows.push(Row::new(columns.clone(), values));
        }
        Ok(ExecResult { rows_affected: 0, rows })
    }
}

/// Statements in this driver accept `:name`, `@name`, `$name`, or a bare
/// name for named parameters, tried in that order.
fn resolve_named_index(stmt: &rusqlite::Statement<'_>, name: &str) -> rusqlite::Result<Option<usize>> {
    for candidate in [format!(":{name}"), format!("@{name}"), format!("${name}"), name.to_string()] {
        if let Some(index) = stmt.parameter_index(&candidate)? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn to_rusqlite_value(value: &SqlValue) -> RusqliteValue {
    match value {
        SqlValue::Null => RusqliteValue::Null,
        SqlValue::Integer(i) => RusqliteValue::Integer(*i),
        SqlValue::Real(r) => RusqliteValue::Real(*r),
        SqlValue::Text(s) => RusqliteValue::Text(s.clone()),
        SqlValue::Blob(b) => RusqliteValue::Blob(b.clone()),
    }
}

fn from_rusqlite_value(value: RusqliteValue) -> SqlValue {
    match value {
        RusqliteValue::Null => SqlValue::Null,
        RusqliteValue::Integer(i) => SqlValue::Integer(i),
        RusqliteValue::Real(r) => SqlValue::Real(r),
        RusqliteValue::Text(s) => SqlValue::Text(s),
        RusqliteValue::Blob(b) => SqlValue::Blob(b),
    }
}

fn convert_err(e: rusqlite::Error) -> ModestError {
    ModestError::new(ErrorKind::Io, e.to_string())
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
