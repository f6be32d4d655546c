// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Common-name verification, additive to whichever chain-of-trust
//! verifier the engine was built with.
//!
//! The source design installs its CN-check callback unconditionally but
//! only *acts* once `addVerifyCommonName` has been called at least once —
//! "Verification hook is installed only after the first
//! `addVerifyCommonName`; peer verification mode itself is orthogonal."
//! `rustls::ClientConfig` fixes its verifier at construction time, so the
//! hook here is always installed structurally and degenerates to a pure
//! delegate to `inner` while the allow-list is empty, which is
//! behaviorally identical.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, Error as TlsError, SignatureScheme};

pub(crate) struct CommonNameVerifier {
    inner: Arc<WebPkiServerVerifier>,
    allowed_names: Arc<Mutex<Vec<String>>>,
}

impl CommonNameVerifier {
    pub(crate) fn new(inner: Arc<WebPkiServerVerifier>, allowed_names: Arc<Mutex<Vec<String>>>) -> Self {
        Self { inner, allowed_names }
    }
}

impl fmt::Debug for CommonNameVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommonNameVerifier").finish_non_exhaustive()
    }
}

impl ServerCertVerifier for CommonNameVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        self.inner.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)?;

        let allowed = self.allowed_names.lock();
        if allowed.is_empty() {
            return Ok(ServerCertVerified::assertion());
        }

        let found = extract_common_names(end_entity)
            .map_err(|e| TlsError::General(format!("could not parse peer leaf certificate: {e}")))?;
        if found.iter().any(|cn| allowed.contains(cn)) {
            Ok(ServerCertVerified::assertion())
        } else {
            tracing::warn!(found = ?found, allowed = ?*allowed, "peer common name not in allow-list");
            Err(TlsError::General(format!(
                "peer certificate common name(s) {found:?} not in configured allow-list {allowed:?}"
            )))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Every `CN` attribute in the certificate subject, depth 0 (the leaf)
/// only — the source design never checks CNs above the leaf.
fn extract_common_names(der: &CertificateDer<'_>) -> Result<Vec<String>, String> {
    let (_, cert) = x509_parser::parse_x509_certificate(der.as_ref()).map_err(|e| e.to_string())?;
    Ok(cert.subject().iter_common_name().filter_map(|cn| cn.as_str().ok().map(str::to_owned)).collect())
}
