//! Stride Test Utilities
//!
//! Centralized test infrastructure for the Stride workspace:
//! - Fake storage adapters that fail on demand
//! - Scripted menu sources and upstream fetchers
//! - Proptest generators for cache documents
//! - Test fixtures for simulated tabs
//! - Custom assertions for cache state

// Re-export core types for convenience
pub use stride_core::{
    compute_server_version, CacheMessage, CachedDocument, ClientCacheConfig, Clock, FetchError,
    ManualClock, MenuSnapshot, StalenessPolicy, StrideError, StrideResult, TierError, TierKind,
    TimestampMs, ANONYMOUS_OWNER, DOCUMENT_SCHEMA_VERSION,
};
pub use stride_storage::{
    CacheLookup, DurableStore, InMemorySessionStore, LocalBroadcastHub, MenuCacheManager,
    MenuSource, Platform, PlatformAdapters, SessionStore, TierReport,
};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// FAKE STORAGE ADAPTERS
// ============================================================================

/// In-memory durable store that can be switched off between calls.
///
/// While unavailable every operation, `open` included, fails with
/// [`TierError::Unavailable`].
#[derive(Debug, Default)]
pub struct FlakyDurableStore {
    collections: Mutex<HashMap<String, HashMap<String, Value>>>,
    unavailable: AtomicBool,
    opens: AtomicU32,
}

impl FlakyDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that fails from the start, like a platform without durable storage.
    pub fn unavailable() -> Self {
        let store = Self::default();
        store.set_available(false);
        store
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of `open` calls seen.
    pub fn open_count(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Put a raw value directly, bypassing availability.
    pub fn seed(&self, collection: &str, key: &str, value: Value) {
        let mut collections = self.collections.lock().unwrap_or_else(|p| p.into_inner());
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Read a raw value directly, bypassing availability.
    pub fn peek(&self, collection: &str, key: &str) -> Option<Value> {
        let collections = self.collections.lock().unwrap_or_else(|p| p.into_inner());
        collections.get(collection).and_then(|c| c.get(key)).cloned()
    }

    fn check(&self) -> Result<(), TierError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TierError::Unavailable {
                tier: TierKind::Durable,
                reason: "durable store switched off".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for FlakyDurableStore {
    async fn open(&self, _store: &str, collection: &str) -> Result<(), TierError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut collections = self.collections.lock().unwrap_or_else(|p| p.into_inner());
        collections.entry(collection.to_string()).or_default();
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, TierError> {
        self.check()?;
        Ok(self.peek(collection, key))
    }

    async fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), TierError> {
        self.check()?;
        self.seed(collection, key, value);
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), TierError> {
        self.check()?;
        let mut collections = self.collections.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(c) = collections.get_mut(collection) {
            c.remove(key);
        }
        Ok(())
    }
}

/// Session store whose every operation fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSessionStore;

impl SessionStore for FailingSessionStore {
    fn get_item(&self, _key: &str) -> Result<Option<String>, TierError> {
        Err(TierError::Unavailable {
            tier: TierKind::Session,
            reason: "session storage disabled".to_string(),
        })
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), TierError> {
        Err(TierError::QuotaExceeded {
            tier: TierKind::Session,
            needed: key.len() + value.len(),
            available: 0,
        })
    }

    fn remove_item(&self, _key: &str) -> Result<(), TierError> {
        Err(TierError::Unavailable {
            tier: TierKind::Session,
            reason: "session storage disabled".to_string(),
        })
    }
}

// ============================================================================
// SCRIPTED UPSTREAMS
// ============================================================================

/// Menu source returning a settable payload, or failing on demand.
#[derive(Debug)]
pub struct ScriptedMenuSource {
    payload: Mutex<Value>,
    failing: AtomicBool,
    menu_calls: AtomicU32,
}

impl ScriptedMenuSource {
    pub fn new(payload: Value) -> Self {
        Self {
            payload: Mutex::new(payload),
            failing: AtomicBool::new(false),
            menu_calls: AtomicU32::new(0),
        }
    }

    pub fn set_payload(&self, payload: Value) {
        *self.payload.lock().unwrap_or_else(|p| p.into_inner()) = payload;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `fetch_menus` calls seen.
    pub fn menu_calls(&self) -> u32 {
        self.menu_calls.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> StrideResult<MenuSnapshot> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Upstream {
                tag: "menus".to_string(),
                message: "scripted failure".to_string(),
            }
            .into());
        }
        let payload = self.payload.lock().unwrap_or_else(|p| p.into_inner()).clone();
        Ok(MenuSnapshot::from_payload(payload))
    }
}

#[async_trait]
impl MenuSource for ScriptedMenuSource {
    async fn fetch_menus(&self) -> StrideResult<MenuSnapshot> {
        self.menu_calls.fetch_add(1, Ordering::SeqCst);
        self.snapshot()
    }

    async fn fetch_version(&self) -> StrideResult<String> {
        self.snapshot().map(|s| s.server_version)
    }
}

/// One scripted upstream outcome.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Succeed(T),
    Fail(String),
    /// Never resolves.
    Hang,
}

/// Upstream fetcher that plays back a script of outcomes.
///
/// Once the script is exhausted the last outcome repeats.
#[derive(Debug)]
pub struct ScriptedFetch<T> {
    tag: String,
    script: Mutex<VecDeque<Outcome<T>>>,
    last: Mutex<Option<Outcome<T>>>,
    calls: AtomicU32,
}

impl<T> ScriptedFetch<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(tag: impl Into<String>, script: impl IntoIterator<Item = Outcome<T>>) -> Arc<Self> {
        Arc::new(Self {
            tag: tag.into(),
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicU32::new(0),
        })
    }

    /// Always fail with `message`.
    pub fn failing(tag: impl Into<String>, message: impl Into<String>) -> Arc<Self> {
        Self::new(tag, [Outcome::Fail(message.into())])
    }

    /// Number of times the fetcher was invoked.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Append an outcome to the script.
    pub fn push(&self, outcome: Outcome<T>) {
        self.script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(outcome);
    }

    fn next_outcome(&self) -> Option<Outcome<T>> {
        let next = self.script.lock().unwrap_or_else(|p| p.into_inner()).pop_front();
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(outcome) = next {
            *last = Some(outcome);
        }
        last.clone()
    }

    /// Zero-argument async function suitable for a cached fetcher.
    pub fn fetcher(
        self: &Arc<Self>,
    ) -> impl Fn() -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync + 'static {
        let this = self.clone();
        move || -> BoxFuture<'static, Result<T, FetchError>> {
            this.calls.fetch_add(1, Ordering::SeqCst);
            let tag = this.tag.clone();
            let outcome = this.next_outcome();
            Box::pin(async move {
                match outcome {
                    Some(Outcome::Succeed(value)) => Ok(value),
                    Some(Outcome::Fail(message)) => Err(FetchError::Upstream { tag, message }),
                    Some(Outcome::Hang) | None => std::future::pending().await,
                }
            })
        }
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cache documents.

    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    /// Generate a small menu payload.
    pub fn arb_menu_payload() -> impl Strategy<Value = Value> {
        prop::collection::vec("[a-z]{1,12}", 0..8)
            .prop_map(|items| json!({ "menus": items }))
    }

    /// Generate an owner id.
    pub fn arb_owner() -> impl Strategy<Value = String> {
        prop_oneof![Just(ANONYMOUS_OWNER.to_string()), "user-[0-9]{1,4}"]
    }

    /// Generate a document written somewhere in the first day of the epoch.
    pub fn arb_document() -> impl Strategy<Value = CachedDocument> {
        (arb_menu_payload(), arb_owner(), 0i64..86_400_000).prop_map(|(payload, owner, at)| {
            let version = compute_server_version(&payload);
            CachedDocument::new(payload, version, owner, at)
        })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use serde_json::json;

    /// Menu payload with a couple of entries.
    pub fn menu_payload() -> Value {
        json!({
            "menus": [
                { "id": "home", "label": "Home", "href": "/" },
                { "id": "leagues", "label": "Leagues", "href": "/leagues" }
            ]
        })
    }

    /// Document for [`menu_payload`] written at `written_at`.
    pub fn menu_document(written_at: TimestampMs) -> CachedDocument {
        let payload = menu_payload();
        let version = compute_server_version(&payload);
        CachedDocument::new(payload, version, ANONYMOUS_OWNER, written_at)
    }

    /// Storage shared by simulated tabs of one origin.
    pub struct Origin {
        pub hub: LocalBroadcastHub,
        pub session: Arc<InMemorySessionStore>,
        pub durable: Arc<FlakyDurableStore>,
        pub clock: Arc<ManualClock>,
        pub config: ClientCacheConfig,
    }

    impl Default for Origin {
        fn default() -> Self {
            Self::new(ClientCacheConfig::default())
        }
    }

    impl Origin {
        pub fn new(config: ClientCacheConfig) -> Self {
            Self {
                hub: LocalBroadcastHub::default(),
                session: Arc::new(InMemorySessionStore::new()),
                durable: Arc::new(FlakyDurableStore::new()),
                clock: Arc::new(ManualClock::new(0)),
                config,
            }
        }

        /// Adapters for a new tab. Session storage is per tab, so each tab
        /// gets a fresh one unless `shared_session` is set.
        pub fn adapters(&self, shared_session: bool) -> PlatformAdapters {
            let session: Arc<dyn SessionStore> = if shared_session {
                self.session.clone()
            } else {
                Arc::new(InMemorySessionStore::new())
            };
            PlatformAdapters::new()
                .with_session(session)
                .with_durable(self.durable.clone())
                .with_broadcast(Arc::new(self.hub.tab(self.config.channel_name.clone())))
        }

        /// Open a new tab with its own session storage.
        pub fn open_tab(&self) -> Arc<MenuCacheManager> {
            Arc::new(MenuCacheManager::new(
                self.config.clone(),
                Platform::Interactive(self.adapters(false)),
                self.clock.clone(),
            ))
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for cache state.

    use super::*;

    /// Assert that every tier accepted the operation.
    #[track_caller]
    pub fn assert_complete(report: &TierReport) {
        assert!(
            report.is_complete(),
            "Expected every tier to succeed, failed: {:?}",
            report.failed
        );
    }

    /// Assert that exactly `tiers` failed.
    #[track_caller]
    pub fn assert_failed_tiers(report: &TierReport, tiers: &[TierKind]) {
        assert_eq!(report.failed_tiers(), tiers, "Unexpected failed tiers");
    }

    /// Assert that a lookup classified the document as `expected`.
    #[track_caller]
    pub fn assert_lookup_kind(lookup: &CacheLookup, expected: &str) {
        let actual = match lookup {
            CacheLookup::Fresh(_) => "fresh",
            CacheLookup::Stale(_) => "stale",
            CacheLookup::Expired(_) => "expired",
            CacheLookup::Missing => "missing",
        };
        assert_eq!(actual, expected, "Unexpected lookup classification");
    }
}
