//! Connector and per-connection error types.

use std::time::Duration;

use thiserror::Error;

use crate::config::ValidationError;
use crate::net::alpn::ProtocolId;
use crate::net::tls::TlsError;

/// Errors surfaced synchronously to the host.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Configuration or handler registry failed validation.
    #[error("invalid configuration: {}", join(.0))]
    Configuration(Vec<ValidationError>),

    /// Certificate material or cipher preferences could not be turned into a TLS context.
    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),

    /// `start` was called on a connector that was already started.
    #[error("connector already started")]
    AlreadyStarted,

    /// The listener handed to `start` is unusable.
    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectorError {
    /// Whether this error belongs to the configuration class (bad setup, not misuse).
    pub fn is_configuration(&self) -> bool {
        matches!(self, ConnectorError::Configuration(_) | ConnectorError::Tls(_))
    }
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why a single connection never reached a protocol handler.
#[derive(Debug, Error)]
pub enum SessionError {
    /// TLS-level failure: bad certificate, version or cipher mismatch, malformed records.
    #[error("TLS handshake failed: {0}")]
    Handshake(std::io::Error),

    /// Socket-level failure during the handshake.
    #[error("I/O error during handshake: {0}")]
    Io(std::io::Error),

    /// The client offered ALPN but shares no protocol with the server.
    #[error("no common application protocol, client offered {offered:?}")]
    NegotiationMismatch { offered: Vec<ProtocolId> },

    /// The handshake did not finish within the configured timeout.
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),

    /// The connector stopped and the grace period ran out.
    #[error("handshake aborted by shutdown")]
    Aborted,
}

impl SessionError {
    /// Classify an error returned by the TLS stream. rustls reports protocol
    /// failures as `InvalidData`; everything else is the socket's.
    pub fn from_io(error: std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::InvalidData {
            SessionError::Handshake(error)
        } else {
            SessionError::Io(error)
        }
    }

    /// Short label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            SessionError::Handshake(_) => "handshake",
            SessionError::Io(_) => "io",
            SessionError::NegotiationMismatch { .. } => "negotiation_mismatch",
            SessionError::Timeout(_) => "timeout",
            SessionError::Aborted => "aborted",
        }
    }

    /// Whether the TLS exchange itself went wrong, as opposed to the connection being cut short.
    pub fn is_handshake_failure(&self) -> bool {
        matches!(
            self,
            SessionError::Handshake(_) | SessionError::Io(_) | SessionError::NegotiationMismatch { .. }
        )
    }
}
