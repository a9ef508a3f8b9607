//! Page-load orchestration on top of [`MenuCacheManager`].
//!
//! Fresh documents are served directly. Stale documents are served while a
//! single background refresh runs. Expired or missing documents block on a
//! fetch from the [`MenuSource`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use stride_core::{MenuSnapshot, StrideResult};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::freshness::CacheLookup;
use super::manager::MenuCacheManager;

/// Where fresh menu documents come from (normally `GET /api/menus`).
#[async_trait]
pub trait MenuSource: Send + Sync {
    /// Fetch the full menu snapshot.
    async fn fetch_menus(&self) -> StrideResult<MenuSnapshot>;

    /// Fetch only the current server version.
    async fn fetch_version(&self) -> StrideResult<String>;
}

/// Loads the menu document for a page, keeping the client cache current.
#[derive(Clone)]
pub struct MenuLoader {
    manager: Arc<MenuCacheManager>,
    source: Arc<dyn MenuSource>,
    refreshing: Arc<AtomicBool>,
}

/// Clears the in-flight flag when a background refresh ends, panics included.
struct RefreshGuard(Arc<AtomicBool>);

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl MenuLoader {
    pub fn new(manager: Arc<MenuCacheManager>, source: Arc<dyn MenuSource>) -> Self {
        Self {
            manager,
            source,
            refreshing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn manager(&self) -> &Arc<MenuCacheManager> {
        &self.manager
    }

    /// Menu payload to render for `owner_id`, or `None` if nothing usable
    /// is cached and the source could not be reached.
    pub async fn load(&self, owner_id: &str) -> Option<Value> {
        match self.manager.lookup_for_owner(owner_id).await {
            CacheLookup::Fresh(doc) => Some(doc.payload),
            CacheLookup::Stale(doc) => {
                self.spawn_refresh(owner_id);
                Some(doc.payload)
            }
            lookup @ (CacheLookup::Expired(_) | CacheLookup::Missing) => {
                debug!(owner = %owner_id, expired = matches!(lookup, CacheLookup::Expired(_)), "Fetching menus before render");
                match self.refresh(owner_id).await {
                    Ok(snapshot) => Some(snapshot.payload),
                    Err(e) => {
                        warn!(owner = %owner_id, error = %e, "Menu fetch failed with nothing usable cached");
                        None
                    }
                }
            }
        }
    }

    /// Fetch from the source and store the result in every tier.
    pub async fn refresh(&self, owner_id: &str) -> StrideResult<MenuSnapshot> {
        let snapshot = self.source.fetch_menus().await?;
        let report = self
            .manager
            .set(snapshot.payload.clone(), snapshot.server_version.clone(), owner_id)
            .await;
        if !report.is_complete() {
            debug!(failed = ?report.failed_tiers(), "Menu refresh stored with tier failures");
        }
        Ok(snapshot)
    }

    /// Start a background refresh unless one is already running.
    ///
    /// Returns the task handle when a refresh was started.
    pub fn spawn_refresh(&self, owner_id: &str) -> Option<JoinHandle<()>> {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(owner = %owner_id, "Menu refresh already in flight");
            return None;
        }

        let loader = self.clone();
        let owner_id = owner_id.to_string();
        Some(tokio::spawn(async move {
            let _guard = RefreshGuard(loader.refreshing.clone());
            if let Err(e) = loader.refresh(&owner_id).await {
                warn!(owner = %owner_id, error = %e, "Background menu refresh failed");
            }
        }))
    }

    /// Compare the cached version with `server_version` and refetch on
    /// mismatch. Returns whether a refetch happened.
    pub async fn reconcile(&self, server_version: &str, owner_id: &str) -> StrideResult<bool> {
        if self.manager.check_version(server_version).await {
            return Ok(false);
        }
        info!(server_version = %server_version, "Cached menus out of date; refetching");
        self.refresh(owner_id).await?;
        Ok(true)
    }

    /// Ask the source for its current version, then [`reconcile`](Self::reconcile).
    pub async fn handshake(&self, owner_id: &str) -> StrideResult<bool> {
        let server_version = self.source.fetch_version().await?;
        self.reconcile(&server_version, owner_id).await
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::platform::{Platform, PlatformAdapters};
    use serde_json::json;
    use std::sync::atomic::AtomicU32;
    use stride_core::{ClientCacheConfig, FetchError, ManualClock, ANONYMOUS_OWNER};

    struct CountingSource {
        payload: Value,
        calls: AtomicU32,
        fail: AtomicBool,
    }

    impl CountingSource {
        fn new(payload: Value) -> Self {
            Self {
                payload,
                calls: AtomicU32::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl MenuSource for CountingSource {
        async fn fetch_menus(&self) -> StrideResult<MenuSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(FetchError::Upstream {
                    tag: "menus".to_string(),
                    message: "offline".to_string(),
                }
                .into());
            }
            Ok(MenuSnapshot::from_payload(self.payload.clone()))
        }

        async fn fetch_version(&self) -> StrideResult<String> {
            Ok(MenuSnapshot::from_payload(self.payload.clone()).server_version)
        }
    }

    fn setup(payload: Value) -> (MenuLoader, Arc<CountingSource>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let manager = Arc::new(MenuCacheManager::new(
            ClientCacheConfig::default(),
            Platform::Interactive(PlatformAdapters::new()),
            clock.clone(),
        ));
        let source = Arc::new(CountingSource::new(payload));
        (MenuLoader::new(manager, source.clone()), source, clock)
    }

    #[tokio::test]
    async fn test_missing_fetches_and_caches() {
        let (loader, source, _clock) = setup(json!({"menus": ["home"]}));

        assert_eq!(loader.load(ANONYMOUS_OWNER).await, Some(json!({"menus": ["home"]})));
        assert_eq!(loader.load(ANONYMOUS_OWNER).await, Some(json!({"menus": ["home"]})));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_serves_and_refreshes_once() {
        let (loader, source, clock) = setup(json!({"menus": []}));
        loader.load(ANONYMOUS_OWNER).await;

        clock.set(90_000);
        let handle = loader.spawn_refresh(ANONYMOUS_OWNER).expect("refresh should start");
        assert!(loader.spawn_refresh(ANONYMOUS_OWNER).is_none());
        handle.await.unwrap();
        assert!(!loader.is_refreshing());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        // refreshed document is fresh again at the new clock
        assert!(matches!(loader.manager().lookup().await, CacheLookup::Fresh(_)));
    }

    #[tokio::test]
    async fn test_expired_with_failing_source_returns_none() {
        let (loader, source, clock) = setup(json!({"menus": []}));
        loader.load(ANONYMOUS_OWNER).await;

        source.fail.store(true, Ordering::SeqCst);
        clock.set(300_000);
        assert_eq!(loader.load(ANONYMOUS_OWNER).await, None);
    }

    #[tokio::test]
    async fn test_reconcile_refetches_on_mismatch() {
        let (loader, source, _clock) = setup(json!({"menus": ["a"]}));
        loader.manager().set(json!({"menus": []}), "old", ANONYMOUS_OWNER).await;

        assert!(loader.handshake(ANONYMOUS_OWNER).await.unwrap());
        assert!(!loader.handshake(ANONYMOUS_OWNER).await.unwrap());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
