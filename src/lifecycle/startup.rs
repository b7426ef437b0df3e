//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize metrics when enabled
//! - Build the HTTP handlers and configure the connector
//! - Bind the listener and begin accepting traffic
//! - Wait for a termination signal, stop, and drain dispatched connections
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;

use thiserror::Error;

use crate::app;
use crate::config::ConnectorConfig;
use crate::connector::{ConnectionEvent, ConnectorError, HandlerRegistry, NegotiatingConnector};
use crate::http::{Http1Handler, Http2Handler, HttpApp};
use crate::lifecycle::signals;
use crate::net::alpn::ProtocolId;
use crate::net::listener::{Listener, ListenerError};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("connector: {0}")]
    Connector(#[from] ConnectorError),

    #[error("listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("metrics: {0}")]
    Metrics(String),
}

/// Handlers for both HTTP protocols, sharing one router and HTTP configuration.
pub fn http_handlers(config: &ConnectorConfig) -> HandlerRegistry {
    let app = HttpApp::new(app::router(), config.http.clone());

    HandlerRegistry::new()
        .register(ProtocolId::h2(), Http2Handler::new(app.clone()))
        .register(ProtocolId::http_1_1(), Http1Handler::new(app))
}

/// Run the connector until SIGINT or SIGTERM.
pub async fn run(config: ConnectorConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|e| StartupError::Metrics(format!("{}: {}", config.observability.metrics_address, e)))?;
        metrics::init_metrics(addr).map_err(StartupError::Metrics)?;
    }

    let handlers = http_handlers(&config);
    let grace = config.timeouts.shutdown_grace();
    let listener = Listener::bind(&config.listener).await?;

    let mut connector = NegotiatingConnector::configure(config, handlers)?;
    tracing::info!(cipher_suites = ?connector.cipher_suites(), "TLS context ready");

    if let Some(mut events) = connector.take_events() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                log_event(&event);
            }
        });
    }

    let addr = connector.start(listener)?;
    tracing::info!(address = %addr, "Listening for connections");

    signals::shutdown_signal().await;
    connector.stop().await;

    let open = connector.connections().active_count();
    if open > 0 {
        tracing::info!(open, grace = ?grace, "Draining dispatched connections");
        if !connector.connections().wait_idle(grace).await {
            tracing::warn!(
                open = connector.connections().active_count(),
                "Connections still open after grace period"
            );
        }
    }

    Ok(())
}

fn log_event(event: &ConnectionEvent) {
    match event {
        ConnectionEvent::Dispatched { id, peer_addr, protocol } => {
            tracing::info!(connection_id = %id, peer_addr = %peer_addr, protocol = %protocol, "Dispatched");
        }
        ConnectionEvent::Rejected { id, peer_addr, error } => {
            tracing::info!(connection_id = %id, peer_addr = %peer_addr, error = %error, "Rejected");
        }
    }
}
