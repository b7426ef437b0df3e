//! HTTP protocol handlers.
//!
//! # Responsibilities
//! - Serve an Axum Router over a negotiated TLS session
//! - HTTP/1.1 via hyper's http1 connection (with upgrades)
//! - HTTP/2 via hyper's http2 connection on the Tokio executor
//! - Share one HTTP configuration between both protocols
//! - Attach `SecureRequest` to every request

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::{http1, http2};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tower::util::Oneshot;
use tower::ServiceExt;

use crate::config::HttpConfig;
use crate::connector::{HandlerError, HandlerFuture, ProtocolHandler, TlsSession};
use crate::http::request::SecureRequest;
use crate::http::response::with_server_headers;

/// Router plus the HTTP configuration both handlers share.
#[derive(Clone)]
pub struct HttpApp {
    router: Router,
    http: Arc<HttpConfig>,
}

impl HttpApp {
    pub fn new(router: Router, http: HttpConfig) -> Self {
        Self {
            router: with_server_headers(router, &http),
            http: Arc::new(http),
        }
    }

    pub fn http_config(&self) -> &HttpConfig {
        &self.http
    }

    fn secure_request(&self, session: &TlsSession) -> SecureRequest {
        SecureRequest::from_session(session, &self.http)
    }

    fn call(&self, request: Request<Incoming>, secure: SecureRequest) -> Oneshot<Router, Request<Body>> {
        let mut request = request.map(Body::new);
        request.extensions_mut().insert(secure);
        self.router.clone().oneshot(request)
    }
}

/// Serves sessions negotiated as `http/1.1`, or sessions that fell back to it.
#[derive(Clone)]
pub struct Http1Handler {
    app: HttpApp,
}

impl Http1Handler {
    pub fn new(app: HttpApp) -> Self {
        Self { app }
    }
}

impl ProtocolHandler for Http1Handler {
    fn serve(&self, session: TlsSession) -> HandlerFuture {
        let app = self.app.clone();
        Box::pin(async move {
            let secure = app.secure_request(&session);
            let id = session.id();
            let service = service_fn(move |request: Request<Incoming>| app.call(request, secure.clone()));

            http1::Builder::new()
                .serve_connection(TokioIo::new(session), service)
                .with_upgrades()
                .await?;

            tracing::trace!(connection_id = %id, "HTTP/1.1 connection closed");
            Ok::<(), HandlerError>(())
        })
    }
}

/// Serves sessions negotiated as `h2`.
#[derive(Clone)]
pub struct Http2Handler {
    app: HttpApp,
}

impl Http2Handler {
    pub fn new(app: HttpApp) -> Self {
        Self { app }
    }
}

impl ProtocolHandler for Http2Handler {
    fn serve(&self, session: TlsSession) -> HandlerFuture {
        let app = self.app.clone();
        Box::pin(async move {
            let secure = app.secure_request(&session);
            let id = session.id();
            let service = service_fn(move |request: Request<Incoming>| app.call(request, secure.clone()));

            http2::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(session), service)
                .await?;

            tracing::trace!(connection_id = %id, "HTTP/2 connection closed");
            Ok::<(), HandlerError>(())
        })
    }
}
