// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection URL parsing: `<driver>://[user[:password]@]host[:port][/database]`,
//! plus sqlite's two special forms that don't carry a host at all.

use modest_core::{ErrorKind, ModestError, Result};

/// A parsed SQL connection URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionUrl {
    Sqlite(SqlitePath),
    Network(NetworkUrl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlitePath {
    File(String),
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkUrl {
    pub driver: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
}

impl ConnectionUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        if let Some(rest) = raw.strip_prefix("sqlite://") {
            return Self::parse_sqlite_file(rest, raw);
        }
        if raw == "sqlite::memory:" {
            return Ok(ConnectionUrl::Sqlite(SqlitePath::Memory));
        }

        let (driver, rest) = raw.split_once("://").ok_or_else(|| malformed(raw, "missing '://' scheme separator"))?;
        if driver.is_empty() {
            return Err(malformed(raw, "missing driver name"));
        }

        let (authority, database) = match rest.split_once('/') {
            Some((authority, database)) if !database.is_empty() => (authority, Some(database.to_string())),
            Some((authority, _)) => (authority, None),
            None => (rest, None),
        };
        if authority.is_empty() {
            return Err(malformed(raw, "missing host"));
        }

        let (credentials, host_port) = match authority.split_once('@') {
            Some((credentials, host_port)) => (Some(credentials), host_port),
            None => (None, authority),
        };
        let (user, password) = match credentials {
            Some(c) => match c.split_once(':') {
                Some((u, p)) => (Some(u.to_string()), Some(p.to_string())),
                None => (Some(c.to_string()), None),
            },
            None => (None, None),
        };

        let (host, port) = match host_port.split_once(':') {
            Some((h, p)) => {
                let port: u16 = p.parse().map_err(|_| malformed(raw, "invalid port"))?;
                (h.to_string(), port)
            }
            None => {
                let port = default_port(driver)
                    .ok_or_else(|| malformed(raw, "no default port for this driver; a port must be given explicitly"))?;
                (host_port.to_string(), port)
            }
        };
        if host.is_empty() {
            return Err(malformed(raw, "missing host"));
        }

        Ok(ConnectionUrl::Network(NetworkUrl {
            driver: driver.to_ascii_lowercase(),
            user,
            password,
            host,
            port,
            database,
        }))
    }

    fn parse_sqlite_file(rest: &str, raw: &str) -> Result<Self> {
        if !rest.starts_with('/') || rest.len() <= 1 {
            return Err(malformed(raw, "sqlite urls must be 'sqlite:///path/to/file.db' or 'sqlite::memory:'"));
        }
        Ok(ConnectionUrl::Sqlite(SqlitePath::File(rest.to_string())))
    }
}

fn default_port(driver: &str) -> Option<u16> {
    match driver.to_ascii_lowercase().as_str() {
        "http" => Some(80),
        "https" => Some(443),
        "ftp" => Some(21),
        "ssh" | "sftp" => Some(22),
        "smtp" => Some(25),
        "mysql" => Some(3306),
        _ => None,
    }
}

fn malformed(raw: &str, reason: &str) -> ModestError {
    ModestError::new(ErrorKind::ConnectionInvalidUrl, format!("invalid connection url {raw:?}: {reason}"))
}

#[cfg(test)]
#[path = "url_tests.rs"]
mod tests;
