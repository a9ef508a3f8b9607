//! Tier 1: in-memory document slot.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use stride_core::{CachedDocument, TierError, TierKind};

use super::tier::CacheTier;

/// In-memory tier scoped to the current execution context.
///
/// Writes are immediately visible to subsequent reads from the same
/// context. The synchronous helpers are used by the broadcast listener,
/// which must not await while holding the subscription.
#[derive(Debug, Default)]
pub struct MemoryTier {
    slots: RwLock<HashMap<String, CachedDocument>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, key: &str) -> Result<Option<CachedDocument>, TierError> {
        let slots = self.slots.read().map_err(|_| TierError::LockPoisoned {
            tier: TierKind::Memory,
        })?;
        Ok(slots.get(key).cloned())
    }

    pub fn store(&self, key: &str, doc: CachedDocument) -> Result<(), TierError> {
        let mut slots = self.slots.write().map_err(|_| TierError::LockPoisoned {
            tier: TierKind::Memory,
        })?;
        slots.insert(key.to_string(), doc);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), TierError> {
        let mut slots = self.slots.write().map_err(|_| TierError::LockPoisoned {
            tier: TierKind::Memory,
        })?;
        slots.remove(key);
        Ok(())
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn kind(&self) -> TierKind {
        TierKind::Memory
    }

    async fn read(&self, key: &str) -> Result<Option<CachedDocument>, TierError> {
        self.load(key)
    }

    async fn write(&self, key: &str, doc: &CachedDocument) -> Result<(), TierError> {
        self.store(key, doc.clone())
    }

    async fn clear(&self, key: &str) -> Result<(), TierError> {
        self.remove(key)
    }
}
