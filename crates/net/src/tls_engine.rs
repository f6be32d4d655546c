// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `TlsEngine`: runs a TLS state machine against two decoupled memory
//! endpoints — `rustls`'s own `read_tls`/`write_tls`/`process_new_packets`
//! vocabulary already has this shape, so the "BIO pair" here is simply
//! rustls's connection object plus whatever transport the caller wires to
//! it; the connection itself never touches the transport except through
//! the pump loop below, matching the source design's note that the
//! literal OpenSSL BIO pair "need not be literal" as long as the engine
//! is driven by explicit memory transfers decoupled from the transport.
//!
//! The connection itself is constructed lazily, on the first
//! `perform_handshake`/`send`/`receive` call, so that `add_verify_common_name`,
//! `set_session`, and `set_virtual_host` — all of which the source design
//! calls out as configured on the engine before the handshake begins —
//! have somewhere to land before `rustls::ClientConfig`'s otherwise
//! immutable verifier and resumption store are baked in.

use std::io::{self, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use rustls::client::{ClientSessionMemoryCache, Resumption, WebPkiServerVerifier};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, ClientConnection, Connection, RootCertStore, ServerConfig, ServerConnection};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use modest_core::{ErrorKind, ModestError};

use crate::session::SslSession;
use crate::verify::CommonNameVerifier;

const TRANSPORT_CHUNK: usize = 1024;

enum PendingConfig {
    Client { server_name: String, roots: Arc<RootCertStore> },
    Server { certs: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpOutcome {
    Progressed,
    Eof,
}

/// The outcome of a completed [`TlsEngine::receive`]/[`TlsEngine::receive_async`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// `n` bytes of decrypted application data were copied into the
    /// caller's buffer.
    Data(usize),
    /// The peer sent a clean TLS close_notify, or the transport reached
    /// EOF before the handshake completed.
    Eof,
}

/// A non-blocking TLS engine wrapping a `rustls` connection, generic over
/// its transport (a blocking `Read + Write`, or an async `AsyncRead +
/// AsyncWrite` via the `*_async` methods).
pub struct TlsEngine<T> {
    conn: Option<Connection>,
    pending: Option<PendingConfig>,
    transport: T,
    verify_names: Arc<Mutex<Vec<String>>>,
    session_store: Arc<dyn rustls::client::ClientSessionStore>,
    virtual_host: Option<String>,
}

impl<T> TlsEngine<T> {
    /// Build a client-role engine. `server_name` is both the SNI hostname
    /// sent during the handshake and the name checked against the base
    /// `rustls` verifier's hostname check; use
    /// [`TlsEngine::set_virtual_host`] before the first handshake call to
    /// override just the SNI value.
    pub fn new_client(transport: T, server_name: impl Into<String>, roots: Arc<RootCertStore>) -> Self {
        Self {
            conn: None,
            pending: Some(PendingConfig::Client { server_name: server_name.into(), roots }),
            transport,
            verify_names: Arc::new(Mutex::new(Vec::new())),
            session_store: Arc::new(ClientSessionMemoryCache::new(32)),
            virtual_host: None,
        }
    }

    pub fn new_server(transport: T, certs: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Self {
        Self {
            conn: None,
            pending: Some(PendingConfig::Server { certs, key }),
            transport,
            verify_names: Arc::new(Mutex::new(Vec::new())),
            session_store: Arc::new(ClientSessionMemoryCache::new(32)),
            virtual_host: None,
        }
    }

    /// Add a common name that the peer's leaf certificate must present,
    /// additive to (and independent of) the base verifier's
    /// chain-of-trust checking. Must be called before the first
    /// handshake call to take effect.
    pub fn add_verify_common_name(&self, name: impl Into<String>) {
        self.verify_names.lock().push(name.into());
    }

    /// Override the SNI hostname sent during the client handshake. Must
    /// be called before the first handshake call.
    pub fn set_virtual_host(&mut self, name: impl Into<String>) {
        self.virtual_host = Some(name.into());
    }

    /// Capture this engine's session cache as a reference-counted handle,
    /// installable on another not-yet-handshaken engine via
    /// [`TlsEngine::set_session`] to attempt ticket-based resumption.
    pub fn get_session(&self) -> SslSession {
        SslSession::new(self.session_store.clone())
    }

    /// Install a session cache captured from another engine. Must be
    /// called before the first handshake call.
    pub fn set_session(&mut self, session: SslSession) {
        self.session_store = session.store;
    }

    pub fn is_handshaking(&self) -> bool {
        self.conn.as_ref().is_none_or(Connection::is_handshaking)
    }

    fn ensure_connection(&mut self) -> Result<(), ModestError> {
        if self.conn.is_some() {
            return Ok(());
        }
        let pending = self
            .pending
            .take()
            .ok_or_else(|| ModestError::new(ErrorKind::SocketClosed, "TLS engine already closed"))?;

        let conn = match pending {
            PendingConfig::Client { server_name, roots } => {
                let host = self.virtual_host.clone().unwrap_or(server_name);
                let base = WebPkiServerVerifier::builder(roots)
                    .build()
                    .map_err(|e| ModestError::new(ErrorKind::SocketSslHandshakeError, e.to_string()))?;
                let verifier = Arc::new(CommonNameVerifier::new(base, self.verify_names.clone()));
                let mut config = ClientConfig::builder()
                    .dangerous()
                    .with_custom_certificate_verifier(verifier)
                    .with_no_client_auth();
                config.resumption = Resumption::store(self.session_store.clone());

                let name = ServerName::try_from(host.clone())
                    .map_err(|e| ModestError::new(ErrorKind::SocketSslHandshakeError, e.to_string()))?
                    .to_owned();
                let client = ClientConnection::new(Arc::new(config), name)
                    .map_err(|e| ModestError::new(ErrorKind::SocketSslHandshakeError, e.to_string()))?;
                Connection::from(client)
            }
            PendingConfig::Server { certs, key } => {
                let config = ServerConfig::builder()
                    .with_no_client_auth()
                    .with_single_cert(certs, key)
                    .map_err(|e| ModestError::new(ErrorKind::SocketSslHandshakeError, e.to_string()))?;
                let server = ServerConnection::new(Arc::new(config))
                    .map_err(|e| ModestError::new(ErrorKind::SocketSslHandshakeError, e.to_string()))?;
                Connection::from(server)
            }
        };
        self.conn = Some(conn);
        Ok(())
    }

    /// Every call site here runs after [`Self::ensure_connection`], so a
    /// missing connection only means the engine was already closed out
    /// from under the caller — report it instead of panicking.
    fn conn_mut(&mut self) -> Result<&mut Connection, ModestError> {
        self.conn.as_mut().ok_or_else(|| ModestError::new(ErrorKind::SocketClosed, "TLS engine has no active connection"))
    }

    fn conn_ref(&self) -> Result<&Connection, ModestError> {
        self.conn.as_ref().ok_or_else(|| ModestError::new(ErrorKind::SocketClosed, "TLS engine has no active connection"))
    }
}

impl<T: Read + Write> TlsEngine<T> {
    /// Drive the handshake primitive with the want-read/want-write pump
    /// until negotiation completes, per the source design's §4.4
    /// operational loop.
    #[tracing::instrument(skip(self))]
    pub fn perform_handshake(&mut self) -> Result<(), ModestError> {
        self.ensure_connection()?;
        while self.conn.as_ref().is_some_and(Connection::is_handshaking) {
            if self.pump_once()? == PumpOutcome::Eof {
                return Err(ModestError::new(ErrorKind::SocketSslHandshakeError, "transport closed mid-handshake"));
            }
        }
        Ok(())
    }

    /// Write `bytes` as application data, pumping the handshake/record
    /// plumbing as needed. Returns the number of bytes accepted (always
    /// `bytes.len()` once rustls has buffered them — record fragmentation
    /// happens transparently on the next pump).
    pub fn send(&mut self, bytes: &[u8]) -> Result<usize, ModestError> {
        self.ensure_connection()?;
        loop {
            let conn = self.conn_mut()?;
            match conn.writer().write(bytes) {
                Ok(n) => {
                    self.flush_pending_tls()?;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(ModestError::new(ErrorKind::SocketWriteError, e.to_string())),
            }
            if self.pump_once()? == PumpOutcome::Eof {
                return Err(ModestError::new(ErrorKind::SocketWriteError, "transport closed"));
            }
        }
    }

    /// Read decrypted application data into `buf`. Returns
    /// [`ReceiveOutcome::Eof`] on a clean TLS shutdown or transport EOF,
    /// per the source design's "`receive` returns 0 (EOF) when the peer
    /// cleanly closes" boundary behavior.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<ReceiveOutcome, ModestError> {
        self.ensure_connection()?;
        loop {
            let conn = self.conn_mut()?;
            match conn.reader().read(buf) {
                Ok(0) => return Ok(ReceiveOutcome::Eof),
                Ok(n) => return Ok(ReceiveOutcome::Data(n)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(ModestError::new(ErrorKind::SocketReadError, e.to_string())),
            }
            if self.pump_once()? == PumpOutcome::Eof {
                return Ok(ReceiveOutcome::Eof);
            }
        }
    }

    pub fn close(&mut self) -> Result<(), ModestError> {
        if let Some(conn) = self.conn.as_mut() {
            conn.send_close_notify();
            self.flush_pending_tls()?;
        }
        Ok(())
    }

    fn flush_pending_tls(&mut self) -> Result<(), ModestError> {
        let conn = self.conn_mut()?;
        while conn.wants_write() {
            conn.write_tls(&mut self.transport).map_err(|e| ModestError::new(ErrorKind::SocketWriteError, e.to_string()))?;
        }
        Ok(())
    }

    /// One iteration of the pump: drain pending outgoing TLS records if
    /// any are queued, otherwise pull up to `TRANSPORT_CHUNK` bytes from
    /// the transport and feed them in.
    fn pump_once(&mut self) -> Result<PumpOutcome, ModestError> {
        let conn = self.conn_mut()?;
        if conn.wants_write() {
            conn.write_tls(&mut self.transport)
                .map_err(|e| ModestError::new(ErrorKind::SocketWriteError, e.to_string()))?;
            return Ok(PumpOutcome::Progressed);
        }
        if conn.wants_read() {
            let mut chunk = [0u8; TRANSPORT_CHUNK];
            let n = self
                .transport
                .read(&mut chunk)
                .map_err(|e| ModestError::new(ErrorKind::SocketReadError, e.to_string()))?;
            if n == 0 {
                return Ok(PumpOutcome::Eof);
            }
            let mut cursor = &chunk[..n];
            conn.read_tls(&mut cursor).map_err(|e| ModestError::new(ErrorKind::SocketReadError, e.to_string()))?;
            conn.process_new_packets()
                .map_err(|e| ModestError::new(ErrorKind::SocketSslHandshakeError, e.to_string()))?;
            return Ok(PumpOutcome::Progressed);
        }
        Ok(PumpOutcome::Progressed)
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> TlsEngine<T> {
    /// Async counterpart of [`TlsEngine::perform_handshake`], for
    /// transports wired to an async socket (e.g. `tokio::net::TcpStream`)
    /// rather than a blocking one.
    pub async fn perform_handshake_async(&mut self) -> Result<(), ModestError> {
        self.ensure_connection()?;
        while self.conn.as_ref().is_some_and(Connection::is_handshaking) {
            if self.pump_once_async().await? == PumpOutcome::Eof {
                return Err(ModestError::new(ErrorKind::SocketSslHandshakeError, "transport closed mid-handshake"));
            }
        }
        Ok(())
    }

    pub async fn send_async(&mut self, bytes: &[u8]) -> Result<usize, ModestError> {
        self.ensure_connection()?;
        loop {
            let conn = self.conn_mut()?;
            match conn.writer().write(bytes) {
                Ok(n) => {
                    self.flush_pending_tls_async().await?;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(ModestError::new(ErrorKind::SocketWriteError, e.to_string())),
            }
            if self.pump_once_async().await? == PumpOutcome::Eof {
                return Err(ModestError::new(ErrorKind::SocketWriteError, "transport closed"));
            }
        }
    }

    pub async fn receive_async(&mut self, buf: &mut [u8]) -> Result<ReceiveOutcome, ModestError> {
        self.ensure_connection()?;
        loop {
            let conn = self.conn_mut()?;
            match conn.reader().read(buf) {
                Ok(0) => return Ok(ReceiveOutcome::Eof),
                Ok(n) => return Ok(ReceiveOutcome::Data(n)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(ModestError::new(ErrorKind::SocketReadError, e.to_string())),
            }
            if self.pump_once_async().await? == PumpOutcome::Eof {
                return Ok(ReceiveOutcome::Eof);
            }
        }
    }

    async fn flush_pending_tls_async(&mut self) -> Result<(), ModestError> {
        loop {
            let mut out = Vec::new();
            {
                let conn = self.conn_mut()?;
                if !conn.wants_write() {
                    break;
                }
                conn.write_tls(&mut out).map_err(|e| ModestError::new(ErrorKind::SocketWriteError, e.to_string()))?;
            }
            self.transport
                .write_all(&out)
                .await
                .map_err(|e| ModestError::new(ErrorKind::SocketWriteError, e.to_string()))?;
        }
        Ok(())
    }

    async fn pump_once_async(&mut self) -> Result<PumpOutcome, ModestError> {
        let wants_write = self.conn_ref()?.wants_write();
        if wants_write {
            self.flush_pending_tls_async().await?;
            return Ok(PumpOutcome::Progressed);
        }
        let wants_read = self.conn_ref()?.wants_read();
        if wants_read {
            let mut chunk = [0u8; TRANSPORT_CHUNK];
            let n = self
                .transport
                .read(&mut chunk)
                .await
                .map_err(|e| ModestError::new(ErrorKind::SocketReadError, e.to_string()))?;
            if n == 0 {
                return Ok(PumpOutcome::Eof);
            }
            let conn = self.conn_mut()?;
            let mut cursor = &chunk[..n];
            conn.read_tls(&mut cursor).map_err(|e| ModestError::new(ErrorKind::SocketReadError, e.to_string()))?;
            conn.process_new_packets()
                .map_err(|e| ModestError::new(ErrorKind::SocketSslHandshakeError, e.to_string()))?;
            return Ok(PumpOutcome::Progressed);
        }
        Ok(PumpOutcome::Progressed)
    }
}

#[cfg(test)]
#[path = "tls_engine_tests.rs"]
mod tests;
