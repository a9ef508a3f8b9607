//! LMDB-backed durable store.
//!
//! Uses the heed crate (Rust bindings for LMDB) as the durable tier of the
//! client cache. One LMDB environment plays the role of an origin-scoped
//! database; each collection is a named LMDB database inside it. Values are
//! stored as JSON bytes.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The store uses:
//! - Read transactions for `get`
//! - Write transactions for `open`, `put` and `delete`

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use serde_json::Value;
use stride_core::{TierError, TierKind};

use super::durable::DurableStore;

/// Maximum number of named collections per environment.
const MAX_COLLECTIONS: u32 = 16;

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open a collection within the environment.
    #[error("Failed to open collection {collection}: {reason}")]
    DbOpen { collection: String, reason: String },

    /// Collection used before `open`.
    #[error("Collection {0} is not open")]
    NotOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert LmdbStoreError to TierError.
impl From<LmdbStoreError> for TierError {
    fn from(e: LmdbStoreError) -> Self {
        match e {
            LmdbStoreError::EnvOpen(_)
            | LmdbStoreError::DbOpen { .. }
            | LmdbStoreError::NotOpen(_)
            | LmdbStoreError::Io(_) => TierError::Unavailable {
                tier: TierKind::Durable,
                reason: e.to_string(),
            },
            LmdbStoreError::Transaction(_) | LmdbStoreError::Serialization(_) => {
                TierError::Backend {
                    tier: TierKind::Durable,
                    reason: e.to_string(),
                }
            }
        }
    }
}

struct LmdbState {
    env: Env,
    collections: HashMap<String, Database<Bytes, Bytes>>,
}

/// LMDB-backed [`DurableStore`].
///
/// # Example
///
/// ```ignore
/// use stride_storage::cache::{DurableTier, LmdbDurableStore};
///
/// let store = Arc::new(LmdbDurableStore::new("/var/lib/stride/origin-cache", 64));
/// let tier = DurableTier::new(store, "stride-cache", "menus");
/// ```
///
/// The environment is created for the first store name passed to `open`;
/// later calls only add collections to it.
pub struct LmdbDurableStore {
    root: PathBuf,
    max_size_mb: usize,
    state: RwLock<Option<LmdbState>>,
}

impl LmdbDurableStore {
    /// Create a store rooted at `path`. Nothing is opened until [`DurableStore::open`].
    ///
    /// # Arguments
    ///
    /// * `path` - Directory under which one LMDB environment per store name is kept
    /// * `max_size_mb` - Maximum size of each environment in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Self {
        Self {
            root: path.as_ref().to_path_buf(),
            max_size_mb,
            state: RwLock::new(None),
        }
    }

    fn open_env(&self, store: &str) -> Result<Env, LmdbStoreError> {
        let dir = self.root.join(store);
        std::fs::create_dir_all(&dir)?;

        // SAFETY: each store directory is opened once per process by this
        // type and never truncated while mapped.
        unsafe {
            EnvOpenOptions::new()
                .map_size(self.max_size_mb * 1024 * 1024)
                .max_dbs(MAX_COLLECTIONS)
                .open(&dir)
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))
    }

    fn open_collection(&self, store: &str, collection: &str) -> Result<(), LmdbStoreError> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| LmdbStoreError::Transaction("state lock poisoned".to_string()))?;

        if guard.is_none() {
            let env = self.open_env(store)?;
            *guard = Some(LmdbState {
                env,
                collections: HashMap::new(),
            });
        }
        let Some(state) = guard.as_mut() else {
            return Err(LmdbStoreError::EnvOpen(store.to_string()));
        };

        if state.collections.contains_key(collection) {
            return Ok(());
        }

        let mut wtxn = state
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let db: Database<Bytes, Bytes> = state
            .env
            .create_database(&mut wtxn, Some(collection))
            .map_err(|e| LmdbStoreError::DbOpen {
                collection: collection.to_string(),
                reason: e.to_string(),
            })?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        state.collections.insert(collection.to_string(), db);
        Ok(())
    }

    fn with_collection<R>(
        &self,
        collection: &str,
        f: impl FnOnce(&Env, Database<Bytes, Bytes>) -> Result<R, LmdbStoreError>,
    ) -> Result<R, LmdbStoreError> {
        let guard = self
            .state
            .read()
            .map_err(|_| LmdbStoreError::Transaction("state lock poisoned".to_string()))?;
        let state = guard
            .as_ref()
            .ok_or_else(|| LmdbStoreError::NotOpen(collection.to_string()))?;
        let db = state
            .collections
            .get(collection)
            .copied()
            .ok_or_else(|| LmdbStoreError::NotOpen(collection.to_string()))?;
        f(&state.env, db)
    }
}

#[async_trait]
impl DurableStore for LmdbDurableStore {
    async fn open(&self, store: &str, collection: &str) -> Result<(), TierError> {
        self.open_collection(store, collection).map_err(TierError::from)
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, TierError> {
        self.with_collection(collection, |env, db| {
            let rtxn = env
                .read_txn()
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            match db.get(&rtxn, key.as_bytes()) {
                Ok(Some(bytes)) => serde_json::from_slice(bytes)
                    .map(Some)
                    .map_err(|e| LmdbStoreError::Serialization(e.to_string())),
                Ok(None) => Ok(None),
                Err(e) => Err(LmdbStoreError::Transaction(e.to_string())),
            }
        })
        .map_err(TierError::from)
    }

    async fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), TierError> {
        let bytes = serde_json::to_vec(&value)
            .map_err(|e| TierError::from(LmdbStoreError::Serialization(e.to_string())))?;
        self.with_collection(collection, |env, db| {
            let mut wtxn = env
                .write_txn()
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            db.put(&mut wtxn, key.as_bytes(), bytes.as_slice())
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            wtxn.commit()
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))
        })
        .map_err(TierError::from)
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), TierError> {
        self.with_collection(collection, |env, db| {
            let mut wtxn = env
                .write_txn()
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            db.delete(&mut wtxn, key.as_bytes())
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            wtxn.commit()
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))
        })
        .map_err(TierError::from)
    }
}
