//! ALPN protocol selection.
//!
//! # Responsibilities
//! - Name application protocols (`h2`, `http/1.1`, or anything else a host registers)
//! - Pick the protocol for one connection from the client's ClientHello offer
//! - Apply the no-overlap policy
//!
//! # Design Decisions
//! - The client's preference order wins; the server list only filters
//! - No ALPN extension at all always selects the default protocol
//! - Selection is a pure function so it can be tested without sockets

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// ALPN identifier for HTTP/2 over TLS.
pub const H2: &str = "h2";

/// ALPN identifier for HTTP/1.1.
pub const HTTP_1_1: &str = "http/1.1";

/// Application protocol identifier as carried in the ALPN extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ProtocolId(String);

impl ProtocolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn h2() -> Self {
        Self::new(H2)
    }

    pub fn http_1_1() -> Self {
        Self::new(HTTP_1_1)
    }

    /// Decode an identifier received on the wire.
    pub fn from_wire(bytes: &[u8]) -> Self {
        Self(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// ALPN identifiers are 1 to 255 bytes long.
    pub fn is_valid(&self) -> bool {
        (1..=255).contains(&self.0.len())
    }
}

impl From<&str> for ProtocolId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl Borrow<str> for ProtocolId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What to do when the client offers ALPN but nothing it offers is supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Abort the handshake with a `no_application_protocol` alert.
    #[default]
    Reject,
    /// Complete the handshake without ALPN and use the default protocol.
    Fallback,
}

/// Outcome of ALPN selection for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Both sides support `protocol`; the server echoes it in the ServerHello.
    Negotiated(ProtocolId),
    /// The client sent no ALPN extension; the default protocol is used silently.
    NotOffered(ProtocolId),
    /// No overlap under [`MismatchPolicy::Fallback`]; the default protocol is used silently.
    Fallback(ProtocolId),
}

impl Selection {
    /// The protocol whose handler receives the connection.
    pub fn protocol(&self) -> &ProtocolId {
        match self {
            Selection::Negotiated(p) | Selection::NotOffered(p) | Selection::Fallback(p) => p,
        }
    }

    /// Whether the server answers with an ALPN extension.
    pub fn is_advertised(&self) -> bool {
        matches!(self, Selection::Negotiated(_))
    }
}

/// Client offer that shares no protocol with the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub offered: Vec<ProtocolId>,
}

/// Server-side ALPN policy: supported protocols, default and mismatch handling.
#[derive(Debug, Clone)]
pub struct AlpnPolicy {
    supported: Vec<ProtocolId>,
    default: ProtocolId,
    on_mismatch: MismatchPolicy,
}

impl AlpnPolicy {
    pub fn new(supported: Vec<ProtocolId>, default: ProtocolId, on_mismatch: MismatchPolicy) -> Self {
        Self {
            supported,
            default,
            on_mismatch,
        }
    }

    pub fn supported(&self) -> &[ProtocolId] {
        &self.supported
    }

    pub fn default_protocol(&self) -> &ProtocolId {
        &self.default
    }

    pub fn on_mismatch(&self) -> MismatchPolicy {
        self.on_mismatch
    }

    /// Select a protocol for a client offer.
    ///
    /// `offered` is `None` when the ClientHello carries no ALPN extension.
    pub fn select<'a, I>(&self, offered: Option<I>) -> Result<Selection, Mismatch>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let Some(offered) = offered else {
            return Ok(Selection::NotOffered(self.default.clone()));
        };

        let mut seen = Vec::new();
        for candidate in offered {
            if let Some(found) = self.supported.iter().find(|p| p.as_bytes() == candidate) {
                return Ok(Selection::Negotiated(found.clone()));
            }
            seen.push(ProtocolId::from_wire(candidate));
        }

        match self.on_mismatch {
            MismatchPolicy::Fallback => Ok(Selection::Fallback(self.default.clone())),
            MismatchPolicy::Reject => Err(Mismatch { offered: seen }),
        }
    }
}
