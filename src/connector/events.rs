//! Notifications published to the host for every accepted connection.

use std::net::SocketAddr;

use crate::connector::error::SessionError;
use crate::net::alpn::ProtocolId;
use crate::net::connection::ConnectionId;

/// Exactly one event is published per accepted connection.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// The handshake completed and the session went to the handler for `protocol`.
    Dispatched {
        id: ConnectionId,
        peer_addr: SocketAddr,
        protocol: ProtocolId,
    },
    /// The connection was closed before reaching any handler.
    Rejected {
        id: ConnectionId,
        peer_addr: SocketAddr,
        error: SessionError,
    },
}

impl ConnectionEvent {
    pub fn id(&self) -> ConnectionId {
        match self {
            ConnectionEvent::Dispatched { id, .. } | ConnectionEvent::Rejected { id, .. } => *id,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        match self {
            ConnectionEvent::Dispatched { peer_addr, .. } | ConnectionEvent::Rejected { peer_addr, .. } => {
                *peer_addr
            }
        }
    }
}
