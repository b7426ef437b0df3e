//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Handlers → Configure connector → Bind → Start
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Grace period → Abort remaining handshakes
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then connector, then listener
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has a deadline: handshakes past the grace period are aborted

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
