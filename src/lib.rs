//! TLS connector that serves HTTP/1.1 and HTTP/2 on one port, choosing the
//! protocol per connection through ALPN.

pub mod app;
pub mod config;
pub mod connector;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::ConnectorConfig;
pub use connector::{ConnectionEvent, ConnectorError, HandlerRegistry, NegotiatingConnector, ProtocolHandler, TlsSession};
pub use lifecycle::Shutdown;
pub use net::alpn::{MismatchPolicy, ProtocolId};
