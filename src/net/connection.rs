//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Track connection state (Accepted → TlsHandshaking → AlpnNegotiating → Dispatched)
//! - Generate unique connection IDs for tracing
//! - Count open connections so shutdown can wait for them
//! - Publish the open-connection gauge

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::net::alpn::ProtocolId;
use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// TCP connection accepted, nothing read yet.
    Accepted,
    /// Waiting for the ClientHello or the rest of the handshake.
    TlsHandshaking,
    /// ClientHello carried an ALPN extension; picking a protocol.
    AlpnNegotiating,
    /// Handed to the handler for this protocol.
    Dispatched(ProtocolId),
    /// Handshake failed; the socket is being closed.
    HandshakeFailed,
    /// Connection is closed.
    Closed,
}

impl ConnectionState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: &ConnectionState) -> bool {
        use ConnectionState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Accepted, TlsHandshaking) => true,
            (TlsHandshaking, AlpnNegotiating | Dispatched(_) | HandshakeFailed) => true,
            (AlpnNegotiating, Dispatched(_) | HandshakeFailed) => true,
            _ => false,
        }
    }
}

/// Per-connection state holder that logs every transition.
#[derive(Debug)]
pub struct ConnectionLifecycle {
    id: ConnectionId,
    state: ConnectionState,
}

impl ConnectionLifecycle {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            state: ConnectionState::Accepted,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Move to `next`. Illegal transitions are ignored and logged.
    pub fn advance(&mut self, next: ConnectionState) -> bool {
        if !self.state.can_transition_to(&next) {
            tracing::warn!(
                connection_id = %self.id,
                from = ?self.state,
                to = ?next,
                "Ignoring illegal connection state transition"
            );
            return false;
        }
        tracing::trace!(connection_id = %self.id, from = ?self.state, to = ?next, "Connection state changed");
        self.state = next;
        true
    }
}

/// Tracks open connections for graceful shutdown.
///
/// Counts from accept until the socket is dropped, whether the connection ends
/// during the handshake or inside a handler.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    /// Current count of open connections.
    active_count: Arc<AtomicU64>,
    /// Woken whenever a connection closes.
    closed: Arc<Notify>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self {
            active_count: Arc::new(AtomicU64::new(0)),
            closed: Arc::new(Notify::new()),
        }
    }

    /// Record a new open connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        metrics::connection_opened();
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            closed: Arc::clone(&self.closed),
            id: ConnectionId::new(),
        }
    }

    /// Get current open connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection is closed or `timeout` elapses.
    ///
    /// Returns `true` when the count reached zero.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let drained = async {
            loop {
                let notified = self.closed.notified();
                if self.active_count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    closed: Arc<Notify>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        metrics::connection_closed();
        self.closed.notify_waiters();
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
