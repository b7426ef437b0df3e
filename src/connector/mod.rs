//! Negotiating TLS connector.
//!
//! # Data Flow
//! ```text
//! configure(config, handlers)
//!     → validate config + handler coverage
//!     → build TlsContext (identity, cipher order, per-selection ServerConfigs)
//!
//! start(listener)
//!     → accept loop task
//!         → one handshake task per connection
//!             → read ClientHello → AlpnPolicy::select → finish handshake
//!             → Dispatched: spawn handler.serve(session)
//!             → Rejected: close socket, publish event
//!
//! stop()
//!     → stop accepting, close listener
//!     → wait grace period for handshakes, then abort the rest
//! ```
//!
//! # Design Decisions
//! - No global state: every connector owns its config, TLS context and registry
//! - Shared state is immutable after `configure`; handshakes read it without locks
//! - Dispatched handlers live on their own tasks and survive `stop()`
//! - Dropping a running connector stops accepting the same way `stop()` does,
//!   without waiting

pub mod error;
pub mod events;
pub mod handler;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_rustls::server::TlsStream;
use tokio_rustls::LazyConfigAcceptor;

use crate::config::validation::{validate_config, validate_handlers};
use crate::config::ConnectorConfig;
use crate::lifecycle::shutdown::{Shutdown, ShutdownSignal};
use crate::net::alpn::{AlpnPolicy, Selection};
use crate::net::connection::{ConnectionGuard, ConnectionLifecycle, ConnectionState, ConnectionTracker};
use crate::net::listener::{ConnectionPermit, Listener};
use crate::net::tls::{Identity, TlsContext};
use crate::observability::metrics;

pub use error::{ConnectorError, SessionError};
pub use events::ConnectionEvent;
pub use handler::{HandlerError, HandlerFuture, HandlerRegistry, ProtocolHandler};
pub use session::TlsSession;

/// Pause after a failed `accept` (e.g. file descriptor exhaustion).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// How long aborted handshakes get to observe the abort before their tasks are cancelled.
const ABORT_DEADLINE: Duration = Duration::from_secs(1);

/// State shared read-only by the accept loop and every handshake task.
struct Shared {
    config: ConnectorConfig,
    alpn: AlpnPolicy,
    tls: TlsContext,
    handlers: HandlerRegistry,
    tracker: ConnectionTracker,
    /// Present only when the host subscribed before `start`.
    events: Option<mpsc::UnboundedSender<ConnectionEvent>>,
}

impl Shared {
    fn publish(&self, event: ConnectionEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

enum RunState {
    Configured,
    Running(Running),
    Stopped,
}

struct Running {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    accept_loop: JoinHandle<()>,
}

/// TLS connector that negotiates HTTP/1.1 or HTTP/2 over ALPN on one port.
pub struct NegotiatingConnector {
    shared: Arc<Shared>,
    state: RunState,
}

impl NegotiatingConnector {
    /// Validate `config` against `handlers` and load the certificate material it names.
    pub fn configure(config: ConnectorConfig, handlers: HandlerRegistry) -> Result<Self, ConnectorError> {
        Self::validate(&config, &handlers)?;
        let tls = TlsContext::from_config(&config.tls, &config.alpn.protocols)?;
        Ok(Self::assemble(config, tls, handlers))
    }

    /// Like [`configure`](Self::configure), with certificate material supplied by the host.
    /// `config.tls.cert_path` and `key_path` are ignored.
    pub fn configure_with_identity(
        config: ConnectorConfig,
        identity: Identity,
        handlers: HandlerRegistry,
    ) -> Result<Self, ConnectorError> {
        Self::validate(&config, &handlers)?;
        let tls = TlsContext::build(identity, &config.tls, &config.alpn.protocols)?;
        Ok(Self::assemble(config, tls, handlers))
    }

    fn validate(config: &ConnectorConfig, handlers: &HandlerRegistry) -> Result<(), ConnectorError> {
        let mut errors = validate_config(config).err().unwrap_or_default();
        if let Err(missing) = validate_handlers(config, handlers.protocols()) {
            errors.extend(missing);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConnectorError::Configuration(errors))
        }
    }

    fn assemble(config: ConnectorConfig, tls: TlsContext, handlers: HandlerRegistry) -> Self {
        let alpn = AlpnPolicy::new(
            config.alpn.protocols.clone(),
            config.alpn.default_protocol.clone(),
            config.alpn.on_mismatch,
        );
        Self {
            shared: Arc::new(Shared {
                config,
                alpn,
                tls,
                handlers,
                tracker: ConnectionTracker::new(),
                events: None,
            }),
            state: RunState::Configured,
        }
    }

    /// Subscribe to connection notifications.
    ///
    /// Must be called before [`start`](Self::start); returns `None` afterwards and on
    /// every call after the first. Without a subscriber no events are kept.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ConnectionEvent>> {
        if !matches!(self.state, RunState::Configured) {
            return None;
        }
        let shared = Arc::get_mut(&mut self.shared)?;
        if shared.events.is_some() {
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        shared.events = Some(tx);
        Some(rx)
    }

    /// Open connections, from accept until the handler drops the session.
    pub fn connections(&self) -> &ConnectionTracker {
        &self.shared.tracker
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.shared.config
    }

    /// Effective cipher suite order, most preferred first.
    pub fn cipher_suites(&self) -> &[String] {
        self.shared.tls.cipher_suites()
    }

    /// Address being accepted on, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.state {
            RunState::Running(running) => Some(running.local_addr),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, RunState::Running(_))
    }

    /// Start accepting on `listener`. Returns once the accept loop is spawned.
    ///
    /// Fails with [`ConnectorError::AlreadyStarted`] on any call after the first;
    /// the surplus listener is dropped without accepting.
    pub fn start(&mut self, listener: Listener) -> Result<SocketAddr, ConnectorError> {
        if !matches!(self.state, RunState::Configured) {
            tracing::warn!("start() called on a connector that was already started");
            return Err(ConnectorError::AlreadyStarted);
        }

        let local_addr = listener.local_addr()?;
        let max_connections = listener.max_connections();
        let shutdown = Shutdown::new();
        let accept_loop = tokio::spawn(accept_loop(
            Arc::clone(&self.shared),
            listener,
            shutdown.subscribe(),
        ));

        tracing::info!(
            address = %local_addr,
            max_connections,
            protocols = ?self.shared.alpn.supported(),
            default_protocol = %self.shared.alpn.default_protocol(),
            on_mismatch = ?self.shared.alpn.on_mismatch(),
            "Connector started"
        );

        self.state = RunState::Running(Running {
            local_addr,
            shutdown,
            accept_loop,
        });
        Ok(local_addr)
    }

    /// Stop accepting and wind down in-flight handshakes.
    ///
    /// Handshakes get `timeouts.shutdown_grace_ms` to finish; the rest are aborted and
    /// reported as [`SessionError::Aborted`]. Every socket the connector still owns is
    /// closed when this returns. Sessions already dispatched are left to their handlers.
    pub async fn stop(&mut self) {
        let running = match std::mem::replace(&mut self.state, RunState::Stopped) {
            RunState::Running(running) => running,
            other => {
                self.state = other;
                return;
            }
        };

        tracing::info!(address = %running.local_addr, "Connector stopping");
        running.shutdown.trigger();
        if let Err(e) = running.accept_loop.await {
            tracing::error!(error = %e, "Accept loop terminated abnormally");
        }
        tracing::info!(address = %running.local_addr, "Connector stopped");
    }
}

impl std::fmt::Debug for NegotiatingConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiatingConnector")
            .field("local_addr", &self.local_addr())
            .field("protocols", &self.shared.alpn.supported())
            .field("handlers", &self.shared.handlers)
            .finish_non_exhaustive()
    }
}

async fn accept_loop(shared: Arc<Shared>, listener: Listener, mut shutdown: ShutdownSignal) {
    let abort = Shutdown::new();
    let mut handshakes = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => break,

            Some(joined) = handshakes.join_next(), if !handshakes.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Handshake task failed");
                }
            }

            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr, permit)) => {
                    let guard = shared.tracker.track();
                    handshakes.spawn(negotiate(
                        Arc::clone(&shared),
                        stream,
                        peer_addr,
                        permit,
                        guard,
                        abort.subscribe(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
        }
    }

    drop(listener);
    tracing::info!(in_flight = handshakes.len(), "Stopped accepting connections");

    let grace = shared.config.timeouts.shutdown_grace();
    if tokio::time::timeout(grace, drain(&mut handshakes)).await.is_err() {
        tracing::warn!(
            in_flight = handshakes.len(),
            grace = ?grace,
            "Grace period elapsed, aborting in-flight handshakes"
        );
        abort.trigger();
        if tokio::time::timeout(ABORT_DEADLINE, drain(&mut handshakes)).await.is_err() {
            handshakes.shutdown().await;
        }
    }
}

async fn drain(handshakes: &mut JoinSet<()>) {
    while handshakes.join_next().await.is_some() {}
}

/// Drive one connection from accept to dispatch or rejection.
async fn negotiate(
    shared: Arc<Shared>,
    stream: TcpStream,
    peer_addr: SocketAddr,
    permit: ConnectionPermit,
    guard: ConnectionGuard,
    mut abort: ShutdownSignal,
) {
    let id = guard.id();
    let started = Instant::now();
    let timeout = shared.config.timeouts.handshake();
    let mut lifecycle = ConnectionLifecycle::new(id);
    lifecycle.advance(ConnectionState::TlsHandshaking);

    let outcome = tokio::select! {
        result = tokio::time::timeout(timeout, handshake(&shared, stream, &mut lifecycle)) => {
            result.unwrap_or(Err(SessionError::Timeout(timeout)))
        }
        _ = abort.recv() => Err(SessionError::Aborted),
    };

    let (stream, selection) = match outcome {
        Ok(done) => done,
        Err(error) => {
            if error.is_handshake_failure() {
                lifecycle.advance(ConnectionState::HandshakeFailed);
            }
            lifecycle.advance(ConnectionState::Closed);
            metrics::record_handshake("failure", started);
            metrics::record_rejection(error.reason());
            tracing::info!(
                connection_id = %id,
                peer_addr = %peer_addr,
                reason = error.reason(),
                error = %error,
                "Connection rejected"
            );
            drop(guard);
            drop(permit);
            shared.publish(ConnectionEvent::Rejected { id, peer_addr, error });
            return;
        }
    };

    let protocol = selection.protocol().clone();
    // Validation guarantees a handler for the default and every supported protocol.
    let Some(handler) = shared.handlers.get(&protocol) else {
        tracing::error!(connection_id = %id, protocol = %protocol, "No handler registered for protocol");
        lifecycle.advance(ConnectionState::HandshakeFailed);
        lifecycle.advance(ConnectionState::Closed);
        metrics::record_rejection("no_handler");
        drop((stream, guard, permit));
        let error = SessionError::NegotiationMismatch { offered: vec![protocol] };
        shared.publish(ConnectionEvent::Rejected { id, peer_addr, error });
        return;
    };

    lifecycle.advance(ConnectionState::Dispatched(protocol.clone()));
    metrics::record_handshake("success", started);
    metrics::record_dispatch(protocol.as_str());
    tracing::debug!(
        connection_id = %id,
        peer_addr = %peer_addr,
        protocol = %protocol,
        alpn = selection.is_advertised(),
        elapsed = ?started.elapsed(),
        "Connection dispatched"
    );

    let session = TlsSession::new(peer_addr, protocol.clone(), stream, guard, permit);
    shared.publish(ConnectionEvent::Dispatched { id, peer_addr, protocol });

    tokio::spawn(async move {
        if let Err(e) = handler.serve(session).await {
            tracing::debug!(connection_id = %id, error = %e, "Handler finished with error");
        }
    });
}

/// Read the ClientHello, pick the protocol, and finish the handshake with the matching config.
async fn handshake(
    shared: &Shared,
    stream: TcpStream,
    lifecycle: &mut ConnectionLifecycle,
) -> Result<(TlsStream<TcpStream>, Selection), SessionError> {
    let start = LazyConfigAcceptor::new(rustls::server::Acceptor::default(), stream)
        .await
        .map_err(SessionError::from_io)?;

    let selection = {
        let hello = start.client_hello();
        let offered = hello.alpn();
        if offered.is_some() {
            lifecycle.advance(ConnectionState::AlpnNegotiating);
        }
        shared.alpn.select(offered)
    };

    match selection {
        Ok(selection) => {
            let config = shared.tls.server_config(&selection);
            let stream = start.into_stream(config).await.map_err(SessionError::from_io)?;
            Ok((stream, selection))
        }
        Err(mismatch) => {
            // Let rustls send the no_application_protocol alert before closing.
            let _ = start.into_stream(shared.tls.rejecting_config()).await;
            Err(SessionError::NegotiationMismatch {
                offered: mismatch.offered,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationError;
    use crate::net::alpn::ProtocolId;

    struct Noop;

    impl ProtocolHandler for Noop {
        fn serve(&self, _session: TlsSession) -> HandlerFuture {
            Box::pin(async { Ok::<(), HandlerError>(()) })
        }
    }

    fn identity() -> Identity {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let cert = params.self_signed(&key_pair).unwrap();
        Identity::from_pem(cert.pem().as_bytes(), key_pair.serialize_pem().as_bytes()).unwrap()
    }

    fn both_handlers() -> HandlerRegistry {
        HandlerRegistry::new()
            .register(ProtocolId::h2(), Noop)
            .register(ProtocolId::http_1_1(), Noop)
    }

    #[test]
    fn configure_requires_default_handler() {
        let registry = HandlerRegistry::new().register(ProtocolId::h2(), Noop);
        let err = NegotiatingConnector::configure_with_identity(ConnectorConfig::default(), identity(), registry)
            .unwrap_err();

        match err {
            ConnectorError::Configuration(errors) => {
                assert!(errors.contains(&ValidationError::MissingDefaultHandler(ProtocolId::http_1_1())));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn configure_requires_protocols() {
        let mut config = ConnectorConfig::default();
        config.alpn.protocols.clear();
        let err = NegotiatingConnector::configure_with_identity(config, identity(), both_handlers()).unwrap_err();
        assert!(matches!(err, ConnectorError::Configuration(ref e) if e.contains(&ValidationError::NoProtocols)));
    }

    #[test]
    fn configure_reports_missing_certificate_files() {
        let mut config = ConnectorConfig::default();
        config.tls.cert_path = "/nonexistent/server.crt".into();
        let err = NegotiatingConnector::configure(config, both_handlers()).unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, ConnectorError::Tls(_)));
    }

    #[test]
    fn configure_ignores_bind_address() {
        let mut config = ConnectorConfig::default();
        config.listener.bind_address = "localhost:8443".into();
        assert!(NegotiatingConnector::configure_with_identity(config, identity(), both_handlers()).is_ok());
    }

    #[tokio::test]
    async fn events_are_not_kept_without_a_subscriber() {
        let mut connector =
            NegotiatingConnector::configure_with_identity(ConnectorConfig::default(), identity(), both_handlers())
                .unwrap();
        let tcp = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = connector.start(Listener::from_tcp(tcp, 16)).unwrap();
        assert!(connector.shared.events.is_none());

        for _ in 0..5 {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            tokio::io::AsyncWriteExt::write_all(&mut stream, b"not tls").await.unwrap();
        }
        connector.stop().await;

        assert!(connector.shared.events.is_none());
        assert!(connector.take_events().is_none());
    }

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let mut connector =
            NegotiatingConnector::configure_with_identity(ConnectorConfig::default(), identity(), both_handlers())
                .unwrap();
        connector.stop().await;
        assert!(!connector.is_running());
        assert!(connector.take_events().is_some());
        assert!(connector.take_events().is_none());
    }
}
