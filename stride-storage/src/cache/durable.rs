//! Tier 3: durable per-origin structured storage.
//!
//! The store is opened lazily. The first tier-3 access awaits the open
//! exactly once; later accesses reuse the outcome. When the open fails the
//! tier reports `Unavailable` for the rest of its life and the manager
//! carries on with the remaining tiers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use stride_core::{CachedDocument, TierError, TierKind};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::tier::CacheTier;

/// Durable key/value store holding structured (JSON) values.
///
/// Mirrors an origin-scoped database: `open` creates the named store and
/// collection if missing, then get/put/delete address keys within a
/// collection.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Open (or create) `store` with a `collection` inside it.
    async fn open(&self, store: &str, collection: &str) -> Result<(), TierError>;

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, TierError>;

    async fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), TierError>;

    async fn delete(&self, collection: &str, key: &str) -> Result<(), TierError>;
}

/// Cache tier over a [`DurableStore`] with lazy, once-only initialisation.
pub struct DurableTier {
    store: Arc<dyn DurableStore>,
    store_name: String,
    collection: String,
    ready: OnceCell<bool>,
}

impl DurableTier {
    pub fn new(
        store: Arc<dyn DurableStore>,
        store_name: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            store_name: store_name.into(),
            collection: collection.into(),
            ready: OnceCell::new(),
        }
    }

    /// Whether initialisation has already been attempted.
    pub fn is_initialized(&self) -> bool {
        self.ready.initialized()
    }

    async fn ensure_open(&self) -> Result<(), TierError> {
        let opened = *self
            .ready
            .get_or_init(|| async {
                match self.store.open(&self.store_name, &self.collection).await {
                    Ok(()) => {
                        debug!(store = %self.store_name, collection = %self.collection, "Durable cache store opened");
                        true
                    }
                    Err(e) => {
                        warn!(store = %self.store_name, error = %e, "Durable cache store unavailable; continuing without it");
                        false
                    }
                }
            })
            .await;

        if opened {
            Ok(())
        } else {
            Err(TierError::Unavailable {
                tier: TierKind::Durable,
                reason: format!("store {} failed to open", self.store_name),
            })
        }
    }
}

#[async_trait]
impl CacheTier for DurableTier {
    fn kind(&self) -> TierKind {
        TierKind::Durable
    }

    async fn read(&self, key: &str) -> Result<Option<CachedDocument>, TierError> {
        self.ensure_open().await?;
        let Some(value) = self.store.get(&self.collection, key).await? else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| TierError::Corrupt {
                tier: TierKind::Durable,
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn write(&self, key: &str, doc: &CachedDocument) -> Result<(), TierError> {
        self.ensure_open().await?;
        let value = serde_json::to_value(doc).map_err(|e| TierError::Backend {
            tier: TierKind::Durable,
            reason: e.to_string(),
        })?;
        self.store.put(&self.collection, key, value).await
    }

    async fn clear(&self, key: &str) -> Result<(), TierError> {
        self.ensure_open().await?;
        self.store.delete(&self.collection, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use stride_core::ANONYMOUS_OWNER;

    #[derive(Default)]
    struct CountingStore {
        opens: AtomicUsize,
        fail_open: bool,
        values: Mutex<HashMap<String, Value>>,
    }

    #[async_trait]
    impl DurableStore for CountingStore {
        async fn open(&self, _store: &str, _collection: &str) -> Result<(), TierError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail_open {
                Err(TierError::Unavailable {
                    tier: TierKind::Durable,
                    reason: "disabled".to_string(),
                })
            } else {
                Ok(())
            }
        }

        async fn get(&self, _c: &str, key: &str) -> Result<Option<Value>, TierError> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn put(&self, _c: &str, key: &str, value: Value) -> Result<(), TierError> {
            self.values.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        async fn delete(&self, _c: &str, key: &str) -> Result<(), TierError> {
            self.values.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_open_happens_once_and_lazily() {
        let store = Arc::new(CountingStore::default());
        let tier = DurableTier::new(store.clone(), "db", "menus");
        assert!(!tier.is_initialized());
        assert_eq!(store.opens.load(Ordering::SeqCst), 0);

        let doc = CachedDocument::new(json!({"a": 1}), "v1", ANONYMOUS_OWNER, 1);
        tier.write("k", &doc).await.unwrap();
        assert_eq!(tier.read("k").await.unwrap(), Some(doc));
        tier.clear("k").await.unwrap();
        assert!(tier.read("k").await.unwrap().is_none());

        assert!(tier.is_initialized());
        assert_eq!(store.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_open_marks_tier_unavailable() {
        let store = Arc::new(CountingStore {
            fail_open: true,
            ..Default::default()
        });
        let tier = DurableTier::new(store.clone(), "db", "menus");

        let err = tier.read("k").await.unwrap_err();
        assert!(matches!(err, TierError::Unavailable { .. }));
        assert!(tier.clear("k").await.is_err());
        assert_eq!(store.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_corrupt_value_is_reported() {
        let store = Arc::new(CountingStore::default());
        store
            .values
            .lock()
            .unwrap()
            .insert("k".to_string(), json!({"unexpected": true}));
        let tier = DurableTier::new(store, "db", "menus");

        let err = tier.read("k").await.unwrap_err();
        assert!(matches!(err, TierError::Corrupt { tier: TierKind::Durable, .. }));
    }
}
