// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A MySQL-flavored `INSERT ... ON DUPLICATE KEY UPDATE` string builder.
//!
//! This is not a MySQL driver — no MySQL wire client is in scope here —
//! just the SQL text and parameter-list construction, usable with any
//! `Statement` whose driver speaks MySQL's upsert dialect. The source
//! design builds the `VALUES` clause, appends the `ON DUPLICATE KEY
//! UPDATE ... SET` clause against the same column list, then clones the
//! parameter set so the `SET` clause gets its own bindings identical to
//! the `VALUES` clause's.

use crate::connection::SqlValue;

/// Build `INSERT INTO <table> (...) VALUES (...) ON DUPLICATE KEY UPDATE
/// ...` for `columns`, returning the SQL text and the parameter list to
/// bind against it in order — the `VALUES` bindings followed by an
/// identical set for the `SET` clause.
pub fn insert_on_duplicate_key_update(table: &str, columns: &[(&str, SqlValue)]) -> (String, Vec<SqlValue>) {
    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();

    let mut sql = String::from("INSERT INTO ");
    sql.push_str(table);
    sql.push_str(" (");
    sql.push_str(&names.join(", "));
    sql.push_str(") VALUES (");
    sql.push_str(&vec!["?"; columns.len()].join(", "));
    sql.push_str(") ON DUPLICATE KEY UPDATE ");
    sql.push_str(&names.iter().map(|name| format!("{name} = ?")).collect::<Vec<_>>().join(", "));

    let insert_params: Vec<SqlValue> = columns.iter().map(|(_, value)| value.clone()).collect();
    let mut params = insert_params.clone();
    params.extend(insert_params);

    (sql, params)
}

#[cfg(test)]
#[path = "mysql_helper_tests.rs"]
mod tests;
