//! ALPN negotiation and rejection behaviour against a live connector.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use negotiating_connector::connector::{ConnectionEvent, SessionError};
use negotiating_connector::{MismatchPolicy, ProtocolId};

mod common;

use common::{
    client_cipher, connect_tls, read_all, recording_handlers, session_info_handlers, test_config, tls_client, Harness,
    TestCert,
};

async fn negotiate(alpn: &[&str]) -> (Option<Vec<u8>>, String, ConnectionEvent, ProtocolId) {
    let cert = TestCert::generate();
    let (handlers, mut seen) = recording_handlers();
    let mut harness = Harness::start(test_config(), &cert, handlers).await;

    let mut stream = connect_tls(harness.addr, &tls_client(&cert.der, alpn)).await.unwrap();
    let alpn = stream.get_ref().1.alpn_protocol().map(<[u8]>::to_vec);
    let body = read_all(&mut stream).await;

    let event = harness.next_event().await;
    let handled = seen.recv().await.unwrap();
    harness.assert_no_event().await;
    harness.connector.stop().await;

    (alpn, body, event, handled)
}

#[tokio::test]
async fn client_preference_picks_h2_first() {
    let (alpn, body, event, handled) = negotiate(&["h2", "http/1.1"]).await;

    assert_eq!(alpn.as_deref(), Some(&b"h2"[..]));
    assert_eq!(body, "h2");
    assert_eq!(handled, ProtocolId::h2());
    assert!(matches!(event, ConnectionEvent::Dispatched { ref protocol, .. } if *protocol == ProtocolId::h2()));
}

#[tokio::test]
async fn client_preference_picks_http1_first() {
    let (alpn, body, event, handled) = negotiate(&["http/1.1", "h2"]).await;

    assert_eq!(alpn.as_deref(), Some(&b"http/1.1"[..]));
    assert_eq!(body, "http/1.1");
    assert_eq!(handled, ProtocolId::http_1_1());
    assert!(matches!(event, ConnectionEvent::Dispatched { ref protocol, .. } if *protocol == ProtocolId::http_1_1()));
}

#[tokio::test]
async fn unknown_protocols_in_offer_are_skipped() {
    let (alpn, body, _, handled) = negotiate(&["spdy/3", "h2"]).await;

    assert_eq!(alpn.as_deref(), Some(&b"h2"[..]));
    assert_eq!(body, "h2");
    assert_eq!(handled, ProtocolId::h2());
}

#[tokio::test]
async fn no_alpn_uses_default_protocol_silently() {
    let (alpn, body, event, handled) = negotiate(&[]).await;

    assert_eq!(alpn, None);
    assert_eq!(body, "http/1.1");
    assert_eq!(handled, ProtocolId::http_1_1());
    assert!(matches!(event, ConnectionEvent::Dispatched { ref protocol, .. } if *protocol == ProtocolId::http_1_1()));
}

#[tokio::test]
async fn mismatch_is_rejected_by_default() {
    let cert = TestCert::generate();
    let (handlers, mut seen) = recording_handlers();
    let mut harness = Harness::start(test_config(), &cert, handlers).await;

    let result = connect_tls(harness.addr, &tls_client(&cert.der, &["spdy/3"])).await;
    assert!(result.is_err(), "client handshake should fail on no_application_protocol");

    match harness.next_event().await {
        ConnectionEvent::Rejected {
            error: SessionError::NegotiationMismatch { offered },
            ..
        } => assert_eq!(offered, vec![ProtocolId::from("spdy/3")]),
        other => panic!("unexpected event: {other:?}"),
    }
    harness.assert_no_event().await;
    assert!(seen.try_recv().is_err());
    assert!(common::eventually(|| harness.connector.connections().active_count() == 0).await);

    harness.connector.stop().await;
}

#[tokio::test]
async fn mismatch_falls_back_when_configured() {
    let cert = TestCert::generate();
    let (handlers, mut seen) = recording_handlers();
    let mut config = test_config();
    config.alpn.on_mismatch = MismatchPolicy::Fallback;
    let mut harness = Harness::start(config, &cert, handlers).await;

    let mut stream = connect_tls(harness.addr, &tls_client(&cert.der, &["spdy/3"])).await.unwrap();
    assert_eq!(stream.get_ref().1.alpn_protocol(), None);
    assert_eq!(read_all(&mut stream).await, "http/1.1");

    assert!(matches!(
        harness.next_event().await,
        ConnectionEvent::Dispatched { ref protocol, .. } if *protocol == ProtocolId::http_1_1()
    ));
    assert_eq!(seen.recv().await.unwrap(), ProtocolId::http_1_1());

    harness.connector.stop().await;
}

#[tokio::test]
async fn untrusted_client_is_rejected_once() {
    let cert = TestCert::generate();
    let other = TestCert::generate();
    let (handlers, mut seen) = recording_handlers();
    let mut harness = Harness::start(test_config(), &cert, handlers).await;

    let result = connect_tls(harness.addr, &tls_client(&other.der, &["h2"])).await;
    assert!(result.is_err());

    match harness.next_event().await {
        ConnectionEvent::Rejected { error, .. } => assert!(error.is_handshake_failure(), "{error}"),
        other => panic!("unexpected event: {other:?}"),
    }
    harness.assert_no_event().await;
    assert!(seen.try_recv().is_err());

    harness.connector.stop().await;
}

#[tokio::test]
async fn plaintext_client_is_rejected_once() {
    let cert = TestCert::generate();
    let (handlers, mut seen) = recording_handlers();
    let mut harness = Harness::start(test_config(), &cert, handlers).await;

    let mut tcp = TcpStream::connect(harness.addr).await.unwrap();
    tcp.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();

    match harness.next_event().await {
        ConnectionEvent::Rejected { error, .. } => {
            assert!(!matches!(error, SessionError::Timeout(_) | SessionError::Aborted), "{error}");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    harness.assert_no_event().await;
    assert!(seen.try_recv().is_err());

    harness.connector.stop().await;
}

#[tokio::test]
async fn silent_client_times_out() {
    let cert = TestCert::generate();
    let (handlers, _seen) = recording_handlers();
    let mut config = test_config();
    config.timeouts.handshake_secs = 1;
    let mut harness = Harness::start(config, &cert, handlers).await;

    let _tcp = TcpStream::connect(harness.addr).await.unwrap();

    match harness.next_event().await {
        ConnectionEvent::Rejected { error, .. } => {
            assert!(matches!(error, SessionError::Timeout(d) if d == Duration::from_secs(1)));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    harness.connector.stop().await;
}

#[tokio::test]
async fn every_connection_gets_exactly_one_event() {
    let cert = TestCert::generate();
    let (handlers, _seen) = recording_handlers();
    let mut harness = Harness::start(test_config(), &cert, handlers).await;

    let good = tls_client(&cert.der, &["h2", "http/1.1"]);
    let bad = tls_client(&cert.der, &["spdy/3"]);
    for _ in 0..3 {
        let mut stream = connect_tls(harness.addr, &good).await.unwrap();
        read_all(&mut stream).await;
        let _ = connect_tls(harness.addr, &bad).await;
    }

    let mut dispatched = 0;
    let mut rejected = 0;
    let mut ids = std::collections::HashSet::new();
    for _ in 0..6 {
        let event = harness.next_event().await;
        assert!(ids.insert(event.id()), "duplicate event for {}", event.id());
        match event {
            ConnectionEvent::Dispatched { .. } => dispatched += 1,
            ConnectionEvent::Rejected { .. } => rejected += 1,
        }
    }
    harness.assert_no_event().await;
    assert_eq!((dispatched, rejected), (3, 3));

    harness.connector.stop().await;
}

const CHACHA20: &str = "TLS13_CHACHA20_POLY1305_SHA256";

/// First suite a default-order rustls client offers.
fn client_first_choice() -> String {
    format!("{:?}", rustls::crypto::ring::default_provider().cipher_suites[0].suite())
}

/// Connect with a default-order client; returns the client's cipher and the server's `protocol|alpn|cipher`.
async fn cipher_handshake(cipher_suites: &[&str], server_preference: bool, alpn: &[&str]) -> (Option<String>, String) {
    let cert = TestCert::generate();
    let mut config = test_config();
    config.tls.cipher_suites = cipher_suites.iter().map(|s| s.to_string()).collect();
    config.tls.server_preference = server_preference;
    let mut harness = Harness::start(config, &cert, session_info_handlers()).await;

    let mut stream = connect_tls(harness.addr, &tls_client(&cert.der, alpn)).await.unwrap();
    let cipher = client_cipher(&stream);
    let info = read_all(&mut stream).await;
    harness.connector.stop().await;

    (cipher, info)
}

#[tokio::test]
async fn server_preference_picks_configured_cipher() {
    assert_ne!(client_first_choice(), CHACHA20);

    let (cipher, info) = cipher_handshake(&[CHACHA20], true, &["h2", "http/1.1"]).await;

    assert_eq!(cipher.as_deref(), Some(CHACHA20));
    assert_eq!(info, format!("h2|h2|{CHACHA20}"));
}

#[tokio::test]
async fn client_order_wins_without_server_preference() {
    let first = client_first_choice();

    let (cipher, info) = cipher_handshake(&[CHACHA20], false, &[]).await;

    assert_eq!(cipher.as_deref(), Some(first.as_str()));
    assert_eq!(info, format!("http/1.1|-|{first}"));
}
