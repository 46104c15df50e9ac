// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! TLS credentials for the HTTPS listener.
//!
//! Under Gramine the RA-TLS certificate and key are written to files by the
//! attestation tooling before the runtime starts; their paths are passed in
//! `TLS_CERT_PATH` / `TLS_KEY_PATH`.

use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::pki_types::{
    CertificateDer, PrivateKeyDer, PrivatePkcs1KeyDer, PrivatePkcs8KeyDer, PrivateSec1KeyDer,
};

use crate::config::TlsPaths;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid PEM in {path}: {source}")]
    Pem { path: String, source: pem::PemError },
    #[error("no certificate found in {0}")]
    NoCertificate(String),
    #[error("no private key found in {0}")]
    NoPrivateKey(String),
    #[error("rejected by rustls: {0}")]
    Rustls(#[from] rustls::Error),
}

fn read_pem(path: &Path) -> Result<Vec<pem::Pem>, TlsError> {
    let display = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|source| TlsError::Read {
        path: display.clone(),
        source,
    })?;
    pem::parse_many(bytes).map_err(|source| TlsError::Pem {
        path: display,
        source,
    })
}

/// Load the certificate chain and private key.
pub fn load_credentials(
    paths: &TlsPaths,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), TlsError> {
    let certs: Vec<CertificateDer<'static>> = read_pem(&paths.cert)?
        .into_iter()
        .filter(|p| p.tag() == "CERTIFICATE")
        .map(|p| CertificateDer::from(p.into_contents()))
        .collect();
    if certs.is_empty() {
        return Err(TlsError::NoCertificate(paths.cert.display().to_string()));
    }

    let key = read_pem(&paths.key)?
        .into_iter()
        .find_map(|p| match p.tag() {
            "PRIVATE KEY" => Some(PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
                p.into_contents(),
            ))),
            "EC PRIVATE KEY" => Some(PrivateKeyDer::Sec1(PrivateSec1KeyDer::from(
                p.into_contents(),
            ))),
            "RSA PRIVATE KEY" => Some(PrivateKeyDer::Pkcs1(PrivatePkcs1KeyDer::from(
                p.into_contents(),
            ))),
            _ => None,
        })
        .ok_or_else(|| TlsError::NoPrivateKey(paths.key.display().to_string()))?;

    Ok((certs, key))
}

/// Build the axum-server TLS configuration.
///
/// The rustls crypto provider must be installed first.
pub fn server_config(paths: &TlsPaths) -> Result<RustlsConfig, TlsError> {
    let (certs, key) = load_credentials(paths)?;
    tracing::info!(
        certificates = certs.len(),
        cert_path = %paths.cert.display(),
        "Loaded TLS credentials"
    );
    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(RustlsConfig::from_config(Arc::new(config)))
}
