//! Decrypted per-connection stream handed to a protocol handler.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

use crate::net::alpn::ProtocolId;
use crate::net::cipher::suite_name;
use crate::net::connection::{ConnectionGuard, ConnectionId};
use crate::net::listener::ConnectionPermit;

/// A TLS connection whose protocol has been fixed.
///
/// Reads and writes go through the decrypted stream. The connection slot and
/// the tracker entry are released when the session is dropped.
#[derive(Debug)]
pub struct TlsSession {
    id: ConnectionId,
    peer_addr: SocketAddr,
    protocol: ProtocolId,
    stream: TlsStream<TcpStream>,
    _guard: ConnectionGuard,
    _permit: ConnectionPermit,
}

impl TlsSession {
    pub(crate) fn new(
        peer_addr: SocketAddr,
        protocol: ProtocolId,
        stream: TlsStream<TcpStream>,
        guard: ConnectionGuard,
        permit: ConnectionPermit,
    ) -> Self {
        Self {
            id: guard.id(),
            peer_addr,
            protocol,
            stream,
            _guard: guard,
            _permit: permit,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.get_ref().0.local_addr()
    }

    /// The protocol chosen for this connection; fixed for its lifetime.
    pub fn protocol(&self) -> &ProtocolId {
        &self.protocol
    }

    /// Protocol echoed in the ServerHello, if ALPN was negotiated at all.
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.stream.get_ref().1.alpn_protocol()
    }

    pub fn cipher_suite(&self) -> Option<String> {
        self.stream
            .get_ref()
            .1
            .negotiated_cipher_suite()
            .map(|suite| suite_name(&suite))
    }
}

impl AsyncRead for TlsSession {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TlsSession {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.stream.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}
