//! Client-side multi-tier cache for the menu configuration document.
//!
//! Three tiers sit behind the [`CacheTier`] port, fastest first:
//!
//! 1. [`MemoryTier`] - process-local, lost on reload
//! 2. [`SessionTier`] - tab-scoped string store with a byte quota
//! 3. [`DurableTier`] - per-origin store, opened lazily on first use
//!
//! [`MenuCacheManager`] reads through the tiers and promotes hits, writes to
//! all of them, and keeps other tabs' tier 1 consistent over a
//! [`BroadcastPort`]. None of its operations fail: a broken tier is logged
//! and skipped.
//!
//! # Example
//!
//! ```ignore
//! let loader = MenuLoader::new(manager.clone(), Arc::new(HttpMenuSource::new(base_url)?));
//! if let Some(menus) = loader.load(&user_id).await {
//!     render(menus);
//! }
//! ```

pub mod broadcast;
pub mod durable;
pub mod freshness;
pub mod http_source;
pub mod lmdb_backend;
pub mod loader;
pub mod manager;
pub mod memory;
pub mod platform;
pub mod session;
pub mod tier;

pub use broadcast::{
    BroadcastPort, BroadcastSubscription, Envelope, LocalBroadcastHub, TabChannel,
    DEFAULT_HUB_CAPACITY,
};
pub use durable::{DurableStore, DurableTier};
pub use freshness::CacheLookup;
pub use http_source::{HttpMenuSource, DEFAULT_REQUEST_TIMEOUT};
pub use lmdb_backend::{LmdbDurableStore, LmdbStoreError};
pub use loader::{MenuLoader, MenuSource};
pub use manager::MenuCacheManager;
pub use memory::MemoryTier;
pub use platform::{Platform, PlatformAdapters};
pub use session::{InMemorySessionStore, SessionStore, SessionTier, DEFAULT_SESSION_QUOTA_BYTES};
pub use tier::{CacheTier, TierReport};
