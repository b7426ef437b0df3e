//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! net + connector produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Connection ID flows through every per-connection event
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
