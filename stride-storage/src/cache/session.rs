//! Tier 2: tab/session-scoped string storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use stride_core::{CachedDocument, TierError, TierKind};

use super::tier::CacheTier;

/// Default session quota, matching the usual 5 MiB browser allowance.
pub const DEFAULT_SESSION_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Tab-scoped key/value store holding strings.
///
/// Writes are quota-bounded and may fail; callers must treat failure as
/// non-fatal.
pub trait SessionStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, TierError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), TierError>;
    fn remove_item(&self, key: &str) -> Result<(), TierError>;
}

/// Process-local session store with a byte quota over keys and values.
#[derive(Debug)]
pub struct InMemorySessionStore {
    items: RwLock<HashMap<String, String>>,
    quota_bytes: usize,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::with_quota(DEFAULT_SESSION_QUOTA_BYTES)
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            quota_bytes,
        }
    }

    /// Bytes currently used by keys and values.
    pub fn used_bytes(&self) -> usize {
        self.items
            .read()
            .map(|items| items.iter().map(|(k, v)| k.len() + v.len()).sum())
            .unwrap_or(0)
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, TierError> {
        let items = self.items.read().map_err(|_| TierError::LockPoisoned {
            tier: TierKind::Session,
        })?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), TierError> {
        let mut items = self.items.write().map_err(|_| TierError::LockPoisoned {
            tier: TierKind::Session,
        })?;

        let replaced = items.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
        let used: usize = items.iter().map(|(k, v)| k.len() + v.len()).sum();
        let available = self.quota_bytes.saturating_sub(used - replaced);
        let needed = key.len() + value.len();
        if needed > available {
            return Err(TierError::QuotaExceeded {
                tier: TierKind::Session,
                needed,
                available,
            });
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), TierError> {
        let mut items = self.items.write().map_err(|_| TierError::LockPoisoned {
            tier: TierKind::Session,
        })?;
        items.remove(key);
        Ok(())
    }
}

/// Cache tier storing documents as JSON strings in a [`SessionStore`].
pub struct SessionTier {
    store: Arc<dyn SessionStore>,
}

impl SessionTier {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CacheTier for SessionTier {
    fn kind(&self) -> TierKind {
        TierKind::Session
    }

    async fn read(&self, key: &str) -> Result<Option<CachedDocument>, TierError> {
        let Some(raw) = self.store.get_item(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| TierError::Corrupt {
                tier: TierKind::Session,
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn write(&self, key: &str, doc: &CachedDocument) -> Result<(), TierError> {
        let raw = serde_json::to_string(doc).map_err(|e| TierError::Backend {
            tier: TierKind::Session,
            reason: e.to_string(),
        })?;
        self.store.set_item(key, &raw)
    }

    async fn clear(&self, key: &str) -> Result<(), TierError> {
        self.store.remove_item(key)
    }
}
