//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Negotiated TLS session
//!     → server.rs (Http1Handler or Http2Handler, hyper connection)
//!     → request.rs (attach SecureRequest: scheme, port, protocol, cipher)
//!     → Axum Router (application routes)
//!     → response.rs (Server / X-Powered-By headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::SecureRequest;
pub use server::{Http1Handler, Http2Handler, HttpApp};
