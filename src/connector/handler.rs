//! Protocol handler capability and the registry the connector selects from.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::connector::session::TlsSession;
use crate::net::alpn::ProtocolId;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'static>>;

/// Consumes a decrypted session for one negotiated protocol.
///
/// The connector calls `serve` at most once per session and spawns the returned
/// future; it is never cancelled by the connector.
pub trait ProtocolHandler: Send + Sync + 'static {
    fn serve(&self, session: TlsSession) -> HandlerFuture;
}

/// Handlers keyed by the protocol they speak. Immutable once the connector is configured.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ProtocolId, Arc<dyn ProtocolHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration. A later registration for the same protocol replaces the earlier one.
    pub fn register(mut self, protocol: impl Into<ProtocolId>, handler: impl ProtocolHandler) -> Self {
        self.insert(protocol.into(), Arc::new(handler));
        self
    }

    pub fn insert(&mut self, protocol: ProtocolId, handler: Arc<dyn ProtocolHandler>) {
        self.handlers.insert(protocol, handler);
    }

    pub fn get(&self, protocol: &ProtocolId) -> Option<Arc<dyn ProtocolHandler>> {
        self.handlers.get(protocol).cloned()
    }

    pub fn protocols(&self) -> impl Iterator<Item = &ProtocolId> {
        self.handlers.keys()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
