//! Request handling and transformation.
//!
//! # Responsibilities
//! - Attach connection-level TLS facts to every request (`SecureRequest`)
//! - Rebuild absolute URLs with the secure scheme and port
//!
//! # Design Decisions
//! - Facts are computed once per connection and cloned into each request
//! - The advertised port comes from config when set, otherwise from the socket

use std::net::SocketAddr;

use axum::http::{header, Request};
use serde::Serialize;

use crate::config::HttpConfig;
use crate::connector::TlsSession;
use crate::net::alpn::ProtocolId;

/// Port assumed when neither config nor socket can tell.
const DEFAULT_SECURE_PORT: u16 = 443;

/// Per-connection TLS facts, available to handlers as a request extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecureRequest {
    pub scheme: String,
    pub port: u16,
    pub protocol: ProtocolId,
    pub cipher_suite: Option<String>,
    pub peer_addr: SocketAddr,
    pub connection_id: u64,
}

impl SecureRequest {
    pub fn from_session(session: &TlsSession, http: &HttpConfig) -> Self {
        let port = http
            .secure_port
            .or_else(|| session.local_addr().ok().map(|addr| addr.port()))
            .unwrap_or(DEFAULT_SECURE_PORT);

        Self {
            scheme: http.secure_scheme.clone(),
            port,
            protocol: session.protocol().clone(),
            cipher_suite: session.cipher_suite(),
            peer_addr: session.peer_addr(),
            connection_id: session.id().as_u64(),
        }
    }

    /// `scheme://host[:port]`, omitting the port when it is the scheme default.
    /// Any port already present in `host` is replaced.
    pub fn origin(&self, host: &str) -> String {
        let host = strip_port(host);
        let default_port = match self.scheme.as_str() {
            "https" => 443,
            "http" => 80,
            _ => 0,
        };
        if self.port == default_port {
            format!("{}://{}", self.scheme, host)
        } else {
            format!("{}://{}:{}", self.scheme, host, self.port)
        }
    }

    /// Absolute URL for a request received on this connection.
    pub fn absolute_url<B>(&self, request: &Request<B>) -> Option<String> {
        let host = request_host(request)?;
        let path = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        Some(format!("{}{}", self.origin(host), path))
    }
}

/// Host from the URI authority (HTTP/2) or the `Host` header (HTTP/1.1).
pub fn request_host<B>(request: &Request<B>) -> Option<&str> {
    request
        .uri()
        .authority()
        .map(|authority| authority.as_str())
        .or_else(|| {
            request
                .headers()
                .get(header::HOST)
                .and_then(|value| value.to_str().ok())
        })
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal: keep up to the closing bracket.
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    // A bare IPv6 address has several colons and no port.
    match host.split_once(':') {
        Some((name, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
