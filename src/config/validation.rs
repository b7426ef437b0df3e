//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every advertised protocol is a legal ALPN identifier
//! - Validate value ranges (timeouts > 0, limits > 0, addresses parse)
//! - Check that the handler registry covers the advertised protocols
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ConnectorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::ConnectorConfig;
use crate::net::alpn::ProtocolId;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `alpn.protocols` is empty.
    NoProtocols,
    /// A protocol identifier is empty or longer than 255 bytes.
    InvalidProtocolId(String),
    /// A protocol identifier appears more than once.
    DuplicateProtocol(ProtocolId),
    /// The default protocol has no registered handler.
    MissingDefaultHandler(ProtocolId),
    /// An advertised protocol has no registered handler.
    MissingHandler(ProtocolId),
    /// The bind address is not a socket address.
    InvalidBindAddress(String),
    /// `listener.max_connections` is zero.
    ZeroMaxConnections,
    /// `timeouts.handshake_secs` is zero.
    ZeroHandshakeTimeout,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::NoProtocols => write!(f, "alpn.protocols must not be empty"),
            ValidationError::InvalidProtocolId(id) => {
                write!(f, "protocol id {:?} must be 1 to 255 bytes", id)
            }
            ValidationError::DuplicateProtocol(id) => {
                write!(f, "protocol {} is listed more than once", id)
            }
            ValidationError::MissingDefaultHandler(id) => {
                write!(f, "default protocol {} has no handler", id)
            }
            ValidationError::MissingHandler(id) => write!(f, "protocol {} has no handler", id),
            ValidationError::InvalidBindAddress(addr) => {
                write!(f, "bind address {:?} is not a socket address", addr)
            }
            ValidationError::ZeroMaxConnections => {
                write!(f, "listener.max_connections must be greater than zero")
            }
            ValidationError::ZeroHandshakeTimeout => {
                write!(f, "timeouts.handshake_secs must be greater than zero")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate the configuration on its own.
pub fn validate_config(config: &ConnectorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.alpn.protocols.is_empty() {
        errors.push(ValidationError::NoProtocols);
    }

    let mut seen = HashSet::new();
    for protocol in config.alpn.protocols.iter().chain(Some(&config.alpn.default_protocol)) {
        if !protocol.is_valid() {
            errors.push(ValidationError::InvalidProtocolId(protocol.to_string()));
        }
    }
    for protocol in &config.alpn.protocols {
        if !seen.insert(protocol) {
            errors.push(ValidationError::DuplicateProtocol(protocol.clone()));
        }
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    if config.timeouts.handshake_secs == 0 {
        errors.push(ValidationError::ZeroHandshakeTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate `listener.bind_address` for hosts that bind through [`Listener::bind`].
///
/// The connector itself accepts on whatever listener it is handed, so this is not
/// part of [`validate_config`].
///
/// [`Listener::bind`]: crate::net::listener::Listener::bind
pub fn validate_bind_address(config: &ConnectorConfig) -> Result<(), ValidationError> {
    config
        .listener
        .bind_address
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidBindAddress(config.listener.bind_address.clone()))
}

/// Validate that `registered` covers the default and every advertised protocol.
pub fn validate_handlers<'a>(
    config: &ConnectorConfig,
    registered: impl IntoIterator<Item = &'a ProtocolId>,
) -> Result<(), Vec<ValidationError>> {
    let registered: HashSet<&ProtocolId> = registered.into_iter().collect();
    let mut errors = Vec::new();

    if !registered.contains(&config.alpn.default_protocol) {
        errors.push(ValidationError::MissingDefaultHandler(
            config.alpn.default_protocol.clone(),
        ));
    }
    for protocol in &config.alpn.protocols {
        if !registered.contains(protocol) {
            errors.push(ValidationError::MissingHandler(protocol.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
