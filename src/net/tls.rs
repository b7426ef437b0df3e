//! TLS configuration and certificate loading.
//!
//! Builds one immutable [`TlsContext`] per connector. The context holds a
//! pre-built rustls `ServerConfig` for every possible ALPN outcome, so the
//! per-connection path only picks an `Arc` after reading the ClientHello.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use thiserror::Error;

use crate::config::TlsConfig;
use crate::net::alpn::{ProtocolId, Selection};
use crate::net::cipher::{suite_name, CipherPreference};

/// Errors raised while loading certificate material or building the TLS context.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("certificate file not found: {0:?}")]
    CertificateNotFound(PathBuf),

    #[error("private key file not found: {0:?}")]
    PrivateKeyNotFound(PathBuf),

    #[error("failed to read PEM data: {0}")]
    Pem(#[from] std::io::Error),

    #[error("no certificate found in PEM data")]
    NoCertificates,

    #[error("no private key found in PEM data")]
    NoPrivateKey,

    #[error("unknown cipher suite: {0}")]
    UnknownCipherSuite(String),

    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Certificate chain plus matching private key.
#[derive(Debug)]
pub struct Identity {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl Identity {
    pub fn new(chain: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Self {
        Self { chain, key }
    }

    /// Load certificate chain and key from PEM files.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, TlsError> {
        if !cert_path.exists() {
            return Err(TlsError::CertificateNotFound(cert_path.to_path_buf()));
        }
        if !key_path.exists() {
            return Err(TlsError::PrivateKeyNotFound(key_path.to_path_buf()));
        }

        let cert_pem = fs::read(cert_path)?;
        let key_pem = fs::read(key_path)?;
        Self::from_pem(&cert_pem, &key_pem)
    }

    /// Parse certificate chain and key from PEM text. The key may be PKCS#8, PKCS#1 or SEC1.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, TlsError> {
        let chain = rustls_pemfile::certs(&mut &cert_pem[..]).collect::<Result<Vec<_>, _>>()?;
        if chain.is_empty() {
            return Err(TlsError::NoCertificates);
        }

        let key = rustls_pemfile::private_key(&mut &key_pem[..])?.ok_or(TlsError::NoPrivateKey)?;

        Ok(Self { chain, key })
    }

    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }
}

/// Immutable TLS state shared by every handshake of one connector.
#[derive(Debug)]
pub struct TlsContext {
    /// ALPN answers exactly one protocol.
    negotiated: HashMap<ProtocolId, Arc<ServerConfig>>,
    /// No ALPN extension in the ServerHello.
    silent: Arc<ServerConfig>,
    /// Full protocol list; rustls aborts with `no_application_protocol` on mismatch.
    strict: Arc<ServerConfig>,
    cipher_suites: Vec<String>,
}

impl TlsContext {
    /// Build the context from an identity, cipher preferences and the supported protocols.
    pub fn build(identity: Identity, tls: &TlsConfig, protocols: &[ProtocolId]) -> Result<Self, TlsError> {
        let mut provider = rustls::crypto::ring::default_provider();
        let preference = CipherPreference::from_names(&tls.cipher_suites, &provider.cipher_suites)?;
        preference.sort(&mut provider.cipher_suites);
        let cipher_suites: Vec<String> = provider.cipher_suites.iter().map(suite_name).collect();

        let mut base = ServerConfig::builder_with_provider(Arc::new(provider))
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(identity.chain, identity.key)?;
        base.ignore_client_order = tls.server_preference;

        let with_alpn = |alpn: Vec<Vec<u8>>| {
            let mut config = base.clone();
            config.alpn_protocols = alpn;
            Arc::new(config)
        };

        let negotiated = protocols
            .iter()
            .map(|p| (p.clone(), with_alpn(vec![p.as_bytes().to_vec()])))
            .collect();
        let silent = with_alpn(Vec::new());
        let strict = with_alpn(protocols.iter().map(|p| p.as_bytes().to_vec()).collect());

        tracing::debug!(
            protocols = ?protocols,
            cipher_suites = ?cipher_suites,
            server_preference = tls.server_preference,
            "TLS context built"
        );

        Ok(Self {
            negotiated,
            silent,
            strict,
            cipher_suites,
        })
    }

    /// Load the identity named by `tls` and build the context.
    pub fn from_config(tls: &TlsConfig, protocols: &[ProtocolId]) -> Result<Self, TlsError> {
        let identity = Identity::from_pem_files(&tls.cert_path, &tls.key_path)?;
        Self::build(identity, tls, protocols)
    }

    /// Server config that completes the handshake with the given selection.
    pub fn server_config(&self, selection: &Selection) -> Arc<ServerConfig> {
        match selection {
            Selection::Negotiated(protocol) => self
                .negotiated
                .get(protocol)
                .cloned()
                .unwrap_or_else(|| Arc::clone(&self.strict)),
            Selection::NotOffered(_) | Selection::Fallback(_) => Arc::clone(&self.silent),
        }
    }

    /// Server config that refuses a client whose ALPN offer does not overlap.
    pub fn rejecting_config(&self) -> Arc<ServerConfig> {
        Arc::clone(&self.strict)
    }

    /// Effective cipher suite order, most preferred first.
    pub fn cipher_suites(&self) -> &[String] {
        &self.cipher_suites
    }
}
