//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define connector metrics (accepts, handshakes, dispatches, rejections)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `connector_connections_accepted_total` (counter)
//! - `connector_active_connections` (gauge): currently open connections
//! - `connector_handshakes_total` (counter): by outcome
//! - `connector_handshake_duration_seconds` (histogram)
//! - `connector_dispatched_total` (counter): by protocol
//! - `connector_rejected_total` (counter): by reason
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op, so tests need no setup
//! - Labels are low-cardinality: protocol ids and fixed reason names

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| e.to_string())?;

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn connection_opened() {
    metrics::counter!("connector_connections_accepted_total").increment(1);
    metrics::gauge!("connector_active_connections").increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!("connector_active_connections").decrement(1.0);
}

pub fn record_handshake(outcome: &'static str, start: Instant) {
    metrics::counter!("connector_handshakes_total", "outcome" => outcome).increment(1);
    metrics::histogram!("connector_handshake_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_dispatch(protocol: &str) {
    metrics::counter!("connector_dispatched_total", "protocol" => protocol.to_string()).increment(1);
}

pub fn record_rejection(reason: &'static str) {
    metrics::counter!("connector_rejected_total", "reason" => reason).increment(1);
}
