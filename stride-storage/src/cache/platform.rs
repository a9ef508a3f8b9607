//! Platform capabilities handed to the cache manager.
//!
//! The manager never probes its environment. The embedder states what is
//! available: an interactive platform with some subset of session storage,
//! durable storage and cross-tab broadcast, or a headless one (server-side
//! rendering, CLI tooling) where every cache operation is a no-op.

use std::sync::Arc;

use super::broadcast::BroadcastPort;
use super::durable::DurableStore;
use super::session::SessionStore;

/// Storage and messaging adapters available on an interactive platform.
///
/// Any adapter may be absent; the manager then runs without that tier or
/// without cross-tab sync.
#[derive(Clone, Default)]
pub struct PlatformAdapters {
    pub session: Option<Arc<dyn SessionStore>>,
    pub durable: Option<Arc<dyn DurableStore>>,
    pub broadcast: Option<Arc<dyn BroadcastPort>>,
}

impl PlatformAdapters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session = Some(store);
        self
    }

    pub fn with_durable(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.durable = Some(store);
        self
    }

    pub fn with_broadcast(mut self, port: Arc<dyn BroadcastPort>) -> Self {
        self.broadcast = Some(port);
        self
    }
}

/// Where the cache manager is running.
#[derive(Clone)]
pub enum Platform {
    /// Browser-like context with the given adapters.
    Interactive(PlatformAdapters),
    /// No storage or messaging; all operations are no-ops.
    Headless,
}

impl Platform {
    pub fn is_headless(&self) -> bool {
        matches!(self, Platform::Headless)
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Interactive(adapters) => f
                .debug_struct("Interactive")
                .field("session", &adapters.session.is_some())
                .field("durable", &adapters.durable.is_some())
                .field("broadcast", &adapters.broadcast.is_some())
                .finish(),
            Platform::Headless => f.write_str("Headless"),
        }
    }
}
