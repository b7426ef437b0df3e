//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use negotiating_connector::config::ConnectorConfig;
use negotiating_connector::connector::{
    ConnectionEvent, HandlerError, HandlerFuture, HandlerRegistry, NegotiatingConnector, ProtocolHandler,
    TlsSession,
};
use negotiating_connector::net::listener::Listener;
use negotiating_connector::net::tls::Identity;
use negotiating_connector::ProtocolId;

/// How long a test waits for something the connector should do promptly.
pub const STEP: Duration = Duration::from_secs(5);

/// Throwaway self-signed certificate for `localhost`.
pub struct TestCert {
    pub cert_pem: String,
    pub key_pem: String,
    pub der: CertificateDer<'static>,
}

impl TestCert {
    pub fn generate() -> Self {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let cert = params.self_signed(&key_pair).unwrap();

        Self {
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
            der: cert.der().clone(),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::from_pem(self.cert_pem.as_bytes(), self.key_pem.as_bytes()).unwrap()
    }
}

/// Default config bound to loopback with test-friendly timeouts.
pub fn test_config() -> ConnectorConfig {
    let mut config = ConnectorConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.timeouts.handshake_secs = 5;
    config.timeouts.shutdown_grace_ms = 200;
    config
}

/// Writes the negotiated protocol id to the client, reports it, then closes.
pub struct RecordingHandler {
    seen: mpsc::UnboundedSender<ProtocolId>,
}

impl ProtocolHandler for RecordingHandler {
    fn serve(&self, mut session: TlsSession) -> HandlerFuture {
        let seen = self.seen.clone();
        Box::pin(async move {
            let protocol = session.protocol().clone();
            let _ = seen.send(protocol.clone());
            session.write_all(protocol.as_bytes()).await?;
            session.shutdown().await?;
            Ok::<(), HandlerError>(())
        })
    }
}

/// Echoes everything it reads until the client closes.
pub struct EchoHandler;

impl ProtocolHandler for EchoHandler {
    fn serve(&self, mut session: TlsSession) -> HandlerFuture {
        Box::pin(async move {
            let mut buf = [0u8; 1024];
            loop {
                let n = session.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                session.write_all(&buf[..n]).await?;
                session.flush().await?;
            }
            Ok::<(), HandlerError>(())
        })
    }
}

/// Writes `protocol|alpn|cipher` as the server session sees them, then closes.
pub struct SessionInfoHandler;

impl ProtocolHandler for SessionInfoHandler {
    fn serve(&self, mut session: TlsSession) -> HandlerFuture {
        Box::pin(async move {
            let alpn = session
                .alpn_protocol()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .unwrap_or_else(|| "-".to_string());
            let cipher = session.cipher_suite().unwrap_or_else(|| "-".to_string());
            let info = format!("{}|{}|{}", session.protocol(), alpn, cipher);

            session.write_all(info.as_bytes()).await?;
            session.shutdown().await?;
            Ok::<(), HandlerError>(())
        })
    }
}

pub fn session_info_handlers() -> HandlerRegistry {
    HandlerRegistry::new()
        .register(ProtocolId::h2(), SessionInfoHandler)
        .register(ProtocolId::http_1_1(), SessionInfoHandler)
}

/// Registry with a `RecordingHandler` for h2 and http/1.1, plus the receiver it reports to.
pub fn recording_handlers() -> (HandlerRegistry, mpsc::UnboundedReceiver<ProtocolId>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let registry = HandlerRegistry::new()
        .register(ProtocolId::h2(), RecordingHandler { seen: tx.clone() })
        .register(ProtocolId::http_1_1(), RecordingHandler { seen: tx });
    (registry, rx)
}

pub fn echo_handlers() -> HandlerRegistry {
    HandlerRegistry::new()
        .register(ProtocolId::h2(), EchoHandler)
        .register(ProtocolId::http_1_1(), EchoHandler)
}

/// A started connector on an ephemeral loopback port.
pub struct Harness {
    pub connector: NegotiatingConnector,
    pub addr: SocketAddr,
    pub events: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl Harness {
    pub async fn start(config: ConnectorConfig, cert: &TestCert, handlers: HandlerRegistry) -> Self {
        let max_connections = config.listener.max_connections;
        let mut connector =
            NegotiatingConnector::configure_with_identity(config, cert.identity(), handlers).unwrap();
        let events = connector.take_events().unwrap();

        let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = connector
            .start(Listener::from_tcp(tcp, max_connections))
            .unwrap();

        Self { connector, addr, events }
    }

    pub async fn next_event(&mut self) -> ConnectionEvent {
        tokio::time::timeout(STEP, self.events.recv())
            .await
            .expect("timed out waiting for a connection event")
            .expect("event channel closed")
    }

    /// Assert nothing else is published for a short while.
    pub async fn assert_no_event(&mut self) {
        let extra = tokio::time::timeout(Duration::from_millis(200), self.events.recv()).await;
        assert!(extra.is_err(), "unexpected extra event: {:?}", extra);
    }
}

/// TLS client trusting `root`, offering `alpn` in that order (nothing when empty).
pub fn tls_client(root: &CertificateDer<'static>, alpn: &[&str]) -> TlsConnector {
    let mut roots = RootCertStore::empty();
    roots.add(root.clone()).unwrap();

    let mut config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = alpn.iter().map(|p| p.as_bytes().to_vec()).collect();

    TlsConnector::from(Arc::new(config))
}

/// Cipher suite the client ended up with, by rustls name.
pub fn client_cipher(stream: &TlsStream<TcpStream>) -> Option<String> {
    stream
        .get_ref()
        .1
        .negotiated_cipher_suite()
        .map(|suite| format!("{:?}", suite.suite()))
}

pub async fn connect_tls(addr: SocketAddr, client: &TlsConnector) -> std::io::Result<TlsStream<TcpStream>> {
    let tcp = TcpStream::connect(addr).await?;
    let name = ServerName::try_from("localhost").unwrap();
    tokio::time::timeout(STEP, client.connect(name, tcp))
        .await
        .expect("client handshake timed out")
}

/// Read until the server closes, returning what it sent.
pub async fn read_all(stream: &mut TlsStream<TcpStream>) -> String {
    let mut buf = Vec::new();
    tokio::time::timeout(STEP, stream.read_to_end(&mut buf))
        .await
        .expect("read timed out")
        .unwrap();
    String::from_utf8(buf).unwrap()
}

/// Poll until `condition` holds or `STEP` elapses.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + STEP;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
