//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the connector.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::alpn::{MismatchPolicy, ProtocolId};

/// Root configuration for the negotiating connector.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Certificate material and cipher preferences.
    pub tls: TlsConfig,

    /// Application protocols offered over ALPN.
    pub alpn: AlpnConfig,

    /// Settings shared by the HTTP/1.1 and HTTP/2 handlers.
    pub http: HttpConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8443").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8443".to_string(),
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate chain file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,

    /// Cipher suite names in server preference order, e.g.
    /// `"TLS13_AES_256_GCM_SHA384"`. Suites not listed keep their
    /// HTTP/2-friendly default order after the listed ones.
    pub cipher_suites: Vec<String>,

    /// Pick the cipher suite by server preference instead of client order.
    pub server_preference: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("certs/server.crt"),
            key_path: PathBuf::from("certs/server.key"),
            cipher_suites: Vec::new(),
            server_preference: true,
        }
    }
}

/// ALPN configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlpnConfig {
    /// Supported protocol identifiers, advertised in this order.
    pub protocols: Vec<ProtocolId>,

    /// Protocol used when the client sends no ALPN extension.
    pub default_protocol: ProtocolId,

    /// What to do when the client's offer shares nothing with `protocols`.
    pub on_mismatch: MismatchPolicy,
}

impl Default for AlpnConfig {
    fn default() -> Self {
        Self {
            protocols: vec![ProtocolId::h2(), ProtocolId::http_1_1()],
            default_protocol: ProtocolId::http_1_1(),
            on_mismatch: MismatchPolicy::default(),
        }
    }
}

/// HTTP configuration shared by both protocol handlers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Scheme advertised to the application for URL reconstruction.
    pub secure_scheme: String,

    /// Port advertised to the application. Defaults to the bound port.
    pub secure_port: Option<u16>,

    /// Add a `Server` header to responses.
    pub send_server_version: bool,

    /// Add an `X-Powered-By` header to responses.
    pub send_x_powered_by: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            secure_scheme: "https".to_string(),
            secure_port: None,
            send_server_version: true,
            send_x_powered_by: true,
        }
    }
}

/// Timeout configuration for the connector.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound for TLS handshake plus ALPN negotiation, in seconds.
    pub handshake_secs: u64,

    /// How long `stop()` lets in-flight handshakes finish, in milliseconds.
    pub shutdown_grace_ms: u64,
}

impl TimeoutConfig {
    pub fn handshake(&self) -> Duration {
        Duration::from_secs(self.handshake_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            handshake_secs: 10,
            shutdown_grace_ms: 5_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Full,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
