//! Multi-tier menu cache manager.
//!
//! Reads go memory → session → durable and promote hits upward. Writes and
//! clears fan out to every tier with per-tier error capture, then notify
//! other tabs over the broadcast port. No operation returns an error: tier
//! failures become misses or skipped writes and are logged at `warn`.

use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use stride_core::{CacheMessage, CachedDocument, ClientCacheConfig, Clock, TierKind};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::broadcast::{BroadcastPort, BroadcastSubscription};
use super::durable::DurableTier;
use super::freshness::CacheLookup;
use super::memory::MemoryTier;
use super::platform::Platform;
use super::session::SessionTier;
use super::tier::{CacheTier, TierReport};

/// Client-side cache for the menu configuration document.
///
/// Construct one per execution context (tab). Several managers may share
/// the same session/durable stores and broadcast hub to simulate several
/// tabs of one origin.
///
/// # Example
///
/// ```ignore
/// let hub = LocalBroadcastHub::default();
/// let platform = Platform::Interactive(
///     PlatformAdapters::new()
///         .with_session(Arc::new(InMemorySessionStore::new()))
///         .with_durable(Arc::new(LmdbDurableStore::new(dir, 64)))
///         .with_broadcast(Arc::new(hub.tab("stride-menu-sync"))),
/// );
/// let manager = Arc::new(MenuCacheManager::new(ClientCacheConfig::default(), platform, Arc::new(SystemClock)));
/// manager.spawn_sync_listener();
///
/// manager.set(payload, "v1", "user-1").await;
/// let doc = manager.get().await;
/// ```
pub struct MenuCacheManager {
    config: ClientCacheConfig,
    clock: Arc<dyn Clock>,
    /// Tier 1, also kept concretely for synchronous broadcast handling.
    memory: Arc<MemoryTier>,
    /// All tiers, fastest first. Empty on a headless platform.
    tiers: Vec<Arc<dyn CacheTier>>,
    broadcast: Option<Arc<dyn BroadcastPort>>,
    subscription: Mutex<Option<Box<dyn BroadcastSubscription>>>,
    enabled: bool,
}

impl MenuCacheManager {
    /// Create a manager for `platform`.
    ///
    /// The durable store is not opened here; it is opened on the first
    /// tier-3 access. The broadcast subscription is taken immediately so no
    /// message published after construction is missed.
    pub fn new(config: ClientCacheConfig, platform: Platform, clock: Arc<dyn Clock>) -> Self {
        let memory = Arc::new(MemoryTier::new());

        let Platform::Interactive(adapters) = platform else {
            debug!("Menu cache running headless; all operations are no-ops");
            return Self {
                config,
                clock,
                memory,
                tiers: Vec::new(),
                broadcast: None,
                subscription: Mutex::new(None),
                enabled: false,
            };
        };

        let mut tiers: Vec<Arc<dyn CacheTier>> = vec![memory.clone()];
        if let Some(session) = adapters.session {
            tiers.push(Arc::new(SessionTier::new(session)));
        }
        if let Some(durable) = adapters.durable {
            tiers.push(Arc::new(DurableTier::new(
                durable,
                config.durable_store.clone(),
                config.durable_collection.clone(),
            )));
        }

        if let Some(port) = adapters.broadcast.as_ref() {
            if port.channel() != config.channel_name {
                warn!(
                    port_channel = %port.channel(),
                    configured = %config.channel_name,
                    "Broadcast port channel differs from configured channel name"
                );
            }
        }

        let subscription = match adapters.broadcast.as_ref().map(|port| port.subscribe()) {
            Some(Ok(sub)) => Some(sub),
            Some(Err(e)) => {
                warn!(error = %e, "Cross-tab sync unavailable");
                None
            }
            None => None,
        };

        Self {
            config,
            clock,
            memory,
            tiers,
            broadcast: adapters.broadcast,
            subscription: Mutex::new(subscription),
            enabled: true,
        }
    }

    pub fn config(&self) -> &ClientCacheConfig {
        &self.config
    }

    /// Whether the manager has any storage at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Tier kinds in lookup order.
    pub fn tier_kinds(&self) -> Vec<TierKind> {
        self.tiers.iter().map(|t| t.kind()).collect()
    }

    fn key(&self) -> &str {
        &self.config.cache_key
    }

    /// Read the cached document, falling through tiers and promoting hits.
    ///
    /// A tier that errors is treated as a miss for that tier only. A
    /// document written under a different schema version is discarded from
    /// the tier that held it and never returned.
    pub async fn get(&self) -> Option<CachedDocument> {
        if !self.enabled {
            return None;
        }

        for (idx, tier) in self.tiers.iter().enumerate() {
            match tier.read(self.key()).await {
                Ok(Some(doc)) => {
                    if !doc.has_schema(&self.config.schema_version) {
                        warn!(
                            tier = %tier.kind(),
                            found = %doc.schema_version,
                            expected = %self.config.schema_version,
                            "Discarding cached menu document with foreign schema"
                        );
                        if let Err(e) = tier.clear(self.key()).await {
                            warn!(tier = %tier.kind(), error = %e, "Failed to discard cached document");
                        }
                        continue;
                    }
                    trace!(tier = %tier.kind(), "Menu cache hit");
                    if idx > 0 {
                        self.promote(&doc, idx).await;
                    }
                    return Some(doc);
                }
                Ok(None) => {
                    trace!(tier = %tier.kind(), "Menu cache miss");
                }
                Err(e) => {
                    warn!(tier = %tier.kind(), error = %e, "Menu cache tier read failed; treating as miss");
                }
            }
        }
        None
    }

    /// Copy `doc` into every tier faster than `found_at`.
    async fn promote(&self, doc: &CachedDocument, found_at: usize) {
        for tier in &self.tiers[..found_at] {
            if let Err(e) = tier.write(self.key(), doc).await {
                warn!(tier = %tier.kind(), error = %e, "Failed to promote cached menu document");
            }
        }
    }

    /// [`get`](Self::get), but only documents owned by `owner_id` are returned.
    ///
    /// Another principal's document is treated as a miss and left in place.
    pub async fn get_for_owner(&self, owner_id: &str) -> Option<CachedDocument> {
        let doc = self.get().await?;
        if doc.belongs_to(owner_id) {
            Some(doc)
        } else {
            debug!(cached_owner = %doc.owner_id, owner = %owner_id, "Cached menu belongs to another principal");
            None
        }
    }

    /// Read and classify the cached document against the staleness policy.
    pub async fn lookup(&self) -> CacheLookup {
        let doc = self.get().await;
        CacheLookup::classify(doc, &self.config.staleness, self.clock.now_ms())
    }

    /// [`lookup`](Self::lookup) restricted to documents owned by `owner_id`.
    pub async fn lookup_for_owner(&self, owner_id: &str) -> CacheLookup {
        let doc = self.get_for_owner(owner_id).await;
        CacheLookup::classify(doc, &self.config.staleness, self.clock.now_ms())
    }

    /// Store a new document in every tier and tell other tabs about it.
    pub async fn set(
        &self,
        payload: Value,
        server_version: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> TierReport {
        let mut report = TierReport::new();
        if !self.enabled {
            return report;
        }

        let mut doc = CachedDocument::new(payload, server_version, owner_id, self.clock.now_ms());
        doc.schema_version = self.config.schema_version.clone();

        for tier in &self.tiers {
            let result = tier.write(self.key(), &doc).await;
            if let Err(e) = &result {
                warn!(tier = %tier.kind(), error = %e, "Menu cache tier write failed; skipping tier");
            }
            report.record(tier.kind(), result);
        }

        self.publish(CacheMessage::CacheUpdated { document: doc });
        report
    }

    /// True only if a document is cached and carries `server_version`.
    ///
    /// Independent of time-based staleness.
    pub async fn check_version(&self, server_version: &str) -> bool {
        match self.get().await {
            Some(doc) => doc.server_version == server_version,
            None => false,
        }
    }

    /// Clear every tier and tell other tabs to drop their tier-1 copy.
    ///
    /// Idempotent: clearing an empty cache succeeds.
    pub async fn invalidate(&self) -> TierReport {
        let mut report = TierReport::new();
        if !self.enabled {
            return report;
        }

        for tier in &self.tiers {
            let result = tier.clear(self.key()).await;
            if let Err(e) = &result {
                warn!(tier = %tier.kind(), error = %e, "Menu cache tier clear failed");
            }
            report.record(tier.kind(), result);
        }

        self.publish(CacheMessage::CacheInvalidated);
        report
    }

    pub fn is_stale(&self, doc: Option<&CachedDocument>) -> bool {
        self.config.staleness.is_stale(doc, self.clock.now_ms())
    }

    pub fn is_expired(&self, doc: Option<&CachedDocument>) -> bool {
        self.config.staleness.is_expired(doc, self.clock.now_ms())
    }

    fn publish(&self, message: CacheMessage) {
        let Some(port) = &self.broadcast else {
            return;
        };
        if let Err(e) = port.publish(&message) {
            warn!(channel = %port.channel(), error = %e, "Failed to broadcast menu cache message");
        }
    }

    /// Apply a message received from another tab to tier 1.
    pub fn apply_message(&self, message: CacheMessage) {
        if !self.enabled {
            return;
        }
        let result = match message {
            CacheMessage::CacheUpdated { document } => {
                if !document.has_schema(&self.config.schema_version) {
                    debug!(found = %document.schema_version, "Ignoring broadcast document with foreign schema");
                    return;
                }
                self.memory.store(self.key(), document)
            }
            CacheMessage::CacheInvalidated => self.memory.remove(self.key()),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to apply cross-tab cache message");
        }
    }

    /// Apply every message already queued for this tab. Returns how many
    /// were applied.
    pub fn drain_broadcasts(&self) -> usize {
        let mut pending = Vec::new();
        {
            let mut guard = match self.subscription.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(sub) = guard.as_mut() {
                while let Some(message) = sub.try_next() {
                    pending.push(message);
                }
            }
        }
        let count = pending.len();
        for message in pending {
            self.apply_message(message);
        }
        count
    }

    /// Move the subscription into a background task that applies messages
    /// as they arrive.
    ///
    /// Returns `None` when there is no subscription (headless, no broadcast
    /// adapter, or a listener is already running). The task ends when the
    /// channel closes or the manager is dropped.
    pub fn spawn_sync_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut subscription = {
            let mut guard = match self.subscription.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.take()?
        };
        let manager: Weak<Self> = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            while let Some(message) = subscription.next().await {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                trace!(message_type = message.message_type(), "Applying cross-tab cache message");
                manager.apply_message(message);
            }
            debug!("Menu cache sync listener stopped");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::broadcast::LocalBroadcastHub;
    use crate::cache::platform::PlatformAdapters;
    use crate::cache::session::{InMemorySessionStore, SessionStore};
    use serde_json::json;
    use stride_core::{ManualClock, TierError, ANONYMOUS_OWNER};

    fn interactive(session: Arc<InMemorySessionStore>, hub: &LocalBroadcastHub) -> Platform {
        Platform::Interactive(
            PlatformAdapters::new()
                .with_session(session)
                .with_broadcast(Arc::new(hub.tab("stride-menu-sync"))),
        )
    }

    fn manager_with(platform: Platform, clock: Arc<ManualClock>) -> MenuCacheManager {
        MenuCacheManager::new(ClientCacheConfig::default(), platform, clock)
    }

    #[tokio::test]
    async fn test_set_then_get_from_memory() {
        let hub = LocalBroadcastHub::default();
        let clock = Arc::new(ManualClock::new(1_000));
        let manager = manager_with(interactive(Arc::new(InMemorySessionStore::new()), &hub), clock);

        let report = manager.set(json!({"menus": ["home"]}), "v1", "user-1").await;
        assert!(report.is_complete());
        assert_eq!(report.succeeded, vec![TierKind::Memory, TierKind::Session]);

        let doc = manager.get().await.expect("document should be cached");
        assert_eq!(doc.payload, json!({"menus": ["home"]}));
        assert_eq!(doc.written_at, 1_000);
        assert_eq!(doc.owner_id, "user-1");
    }

    #[tokio::test]
    async fn test_session_hit_promotes_into_memory() {
        let hub = LocalBroadcastHub::default();
        let session = Arc::new(InMemorySessionStore::new());
        let clock = Arc::new(ManualClock::new(0));

        let writer = manager_with(interactive(session.clone(), &hub), clock.clone());
        writer.set(json!({"menus": []}), "v1", ANONYMOUS_OWNER).await;

        // a fresh context sharing the session store starts with an empty tier 1
        let reader = manager_with(interactive(session.clone(), &hub), clock);
        assert!(reader.memory.load(reader.key()).unwrap().is_none());
        assert!(reader.get().await.is_some());
        assert!(reader.memory.load(reader.key()).unwrap().is_some());

        session.remove_item(reader.key()).unwrap();
        assert!(reader.get().await.is_some());
    }

    #[tokio::test]
    async fn test_corrupt_session_entry_is_a_miss() {
        let hub = LocalBroadcastHub::default();
        let session = Arc::new(InMemorySessionStore::new());
        session.set_item("stride-menu-cache", "{{{").unwrap();
        let manager = manager_with(interactive(session, &hub), Arc::new(ManualClock::new(0)));

        assert!(manager.get().await.is_none());
    }

    #[tokio::test]
    async fn test_foreign_schema_is_discarded() {
        let hub = LocalBroadcastHub::default();
        let session = Arc::new(InMemorySessionStore::new());
        let mut old = CachedDocument::new(json!({}), "v1", ANONYMOUS_OWNER, 0);
        old.schema_version = "menu-cache/v1".to_string();
        session
            .set_item("stride-menu-cache", &serde_json::to_string(&old).unwrap())
            .unwrap();

        let manager = manager_with(interactive(session.clone(), &hub), Arc::new(ManualClock::new(0)));
        assert!(manager.get().await.is_none());
        assert!(session.get_item("stride-menu-cache").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_quota_failure_does_not_fail_set() {
        let hub = LocalBroadcastHub::default();
        let session = Arc::new(InMemorySessionStore::with_quota(8));
        let manager = manager_with(interactive(session, &hub), Arc::new(ManualClock::new(0)));

        let report = manager.set(json!({"menus": ["a", "b"]}), "v1", ANONYMOUS_OWNER).await;
        assert_eq!(report.succeeded, vec![TierKind::Memory]);
        assert!(matches!(
            report.failed.as_slice(),
            [(TierKind::Session, TierError::QuotaExceeded { .. })]
        ));
        assert!(manager.get().await.is_some());
    }

    #[tokio::test]
    async fn test_check_version() {
        let hub = LocalBroadcastHub::default();
        let manager = manager_with(
            interactive(Arc::new(InMemorySessionStore::new()), &hub),
            Arc::new(ManualClock::new(0)),
        );

        assert!(!manager.check_version("v2").await);
        manager.set(json!({}), "v1", ANONYMOUS_OWNER).await;
        assert!(!manager.check_version("v2").await);
        manager.set(json!({}), "v2", ANONYMOUS_OWNER).await;
        assert!(manager.check_version("v2").await);
    }

    #[tokio::test]
    async fn test_owner_scoping() {
        let hub = LocalBroadcastHub::default();
        let manager = manager_with(
            interactive(Arc::new(InMemorySessionStore::new()), &hub),
            Arc::new(ManualClock::new(0)),
        );
        manager.set(json!({"admin": true}), "v1", "user-1").await;

        assert!(manager.get_for_owner("user-1").await.is_some());
        assert!(manager.get_for_owner("user-2").await.is_none());
        assert_eq!(manager.lookup_for_owner("user-2").await, CacheLookup::Missing);
        // the other principal's view is left in place
        assert!(manager.get().await.is_some());
    }

    #[tokio::test]
    async fn test_lookup_follows_clock() {
        let hub = LocalBroadcastHub::default();
        let clock = Arc::new(ManualClock::new(0));
        let manager = manager_with(
            interactive(Arc::new(InMemorySessionStore::new()), &hub),
            clock.clone(),
        );
        manager.set(json!({}), "v1", ANONYMOUS_OWNER).await;

        clock.set(30_000);
        assert!(matches!(manager.lookup().await, CacheLookup::Fresh(_)));
        clock.set(90_000);
        assert!(matches!(manager.lookup().await, CacheLookup::Stale(_)));
        clock.set(310_000);
        assert!(matches!(manager.lookup().await, CacheLookup::Expired(_)));

        let doc = manager.get().await;
        assert!(manager.is_stale(doc.as_ref()));
        assert!(manager.is_expired(doc.as_ref()));
        assert!(manager.is_stale(None));
        assert!(manager.is_expired(None));
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let hub = LocalBroadcastHub::default();
        let manager = manager_with(
            interactive(Arc::new(InMemorySessionStore::new()), &hub),
            Arc::new(ManualClock::new(0)),
        );

        assert!(manager.invalidate().await.is_complete());
        manager.set(json!({}), "v1", ANONYMOUS_OWNER).await;
        assert!(manager.invalidate().await.is_complete());
        assert!(manager.invalidate().await.is_complete());
        assert!(manager.get().await.is_none());
    }

    #[tokio::test]
    async fn test_cross_tab_update_and_invalidate() {
        let hub = LocalBroadcastHub::default();
        let session = Arc::new(InMemorySessionStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let tab_a = manager_with(interactive(session.clone(), &hub), clock.clone());
        let tab_b = manager_with(interactive(session, &hub), clock);

        tab_a.set(json!({"menus": ["x"]}), "v1", ANONYMOUS_OWNER).await;
        assert_eq!(tab_b.drain_broadcasts(), 1);
        let copy = tab_b.memory.load(tab_b.key()).unwrap().expect("tier 1 updated");
        assert_eq!(copy.server_version, "v1");

        tab_a.invalidate().await;
        assert_eq!(tab_b.drain_broadcasts(), 1);
        assert!(tab_b.memory.load(tab_b.key()).unwrap().is_none());
        assert!(tab_b.get().await.is_none());

        // a tab never hears its own messages
        assert_eq!(tab_a.drain_broadcasts(), 0);
    }

    #[tokio::test]
    async fn test_sync_listener_applies_messages() {
        let hub = LocalBroadcastHub::default();
        let clock = Arc::new(ManualClock::new(0));
        let tab_a = manager_with(interactive(Arc::new(InMemorySessionStore::new()), &hub), clock.clone());
        let tab_b = Arc::new(manager_with(
            interactive(Arc::new(InMemorySessionStore::new()), &hub),
            clock,
        ));
        tab_b.memory.store(tab_b.key(), CachedDocument::new(json!({}), "v0", ANONYMOUS_OWNER, 0)).unwrap();

        let handle = tab_b.spawn_sync_listener().expect("listener should start");
        assert!(tab_b.spawn_sync_listener().is_none());

        tab_a.invalidate().await;
        for _ in 0..100 {
            if tab_b.memory.load(tab_b.key()).unwrap().is_none() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(tab_b.memory.load(tab_b.key()).unwrap().is_none());
        handle.abort();
    }

    #[tokio::test]
    async fn test_headless_is_noop() {
        let manager = manager_with(Platform::Headless, Arc::new(ManualClock::new(0)));

        assert!(!manager.is_enabled());
        assert!(manager.tier_kinds().is_empty());
        let report = manager.set(json!({}), "v1", ANONYMOUS_OWNER).await;
        assert!(report.succeeded.is_empty() && report.failed.is_empty());
        assert!(manager.get().await.is_none());
        assert!(!manager.check_version("v1").await);
        assert!(manager.invalidate().await.succeeded.is_empty());
        assert_eq!(manager.drain_broadcasts(), 0);
    }

    #[tokio::test]
    async fn test_memory_only_platform() {
        let manager = manager_with(
            Platform::Interactive(PlatformAdapters::new()),
            Arc::new(ManualClock::new(0)),
        );
        assert_eq!(manager.tier_kinds(), vec![TierKind::Memory]);
        manager.set(json!({"a": 1}), "v1", ANONYMOUS_OWNER).await;
        assert!(manager.check_version("v1").await);
    }
}
