//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → tls.rs (ClientHello, then handshake with the chosen ServerConfig)
//!     → alpn.rs (protocol selection from the client's offer)
//!     → cipher.rs (server-preferred cipher order, fixed at build time)
//!     → connection.rs (lifecycle tracking, state machine)
//!     → Hand off to the protocol handler
//!
//! Connection States:
//!     Accepted → TlsHandshaking → [AlpnNegotiating] → Dispatched
//!                               ↘ HandshakeFailed → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - TLS material is read once and shared read-only by every handshake

pub mod alpn;
pub mod cipher;
pub mod connection;
pub mod listener;
pub mod tls;

pub use alpn::{AlpnPolicy, MismatchPolicy, ProtocolId, Selection};
pub use connection::{ConnectionId, ConnectionState, ConnectionTracker};
pub use listener::{Listener, ListenerError};
pub use tls::{Identity, TlsContext, TlsError};
