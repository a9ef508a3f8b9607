//! Stride Storage - client-side menu cache
//!
//! Tier adapters, cross-tab broadcast and the cache manager that keeps a
//! single menu document current across memory, session and durable storage.
//! Shared types (documents, errors, clock, staleness policy) live in
//! stride-core.

pub mod cache;

pub use cache::{
    BroadcastPort, BroadcastSubscription, CacheLookup, CacheTier, DurableStore, DurableTier,
    HttpMenuSource, InMemorySessionStore, LmdbDurableStore, LmdbStoreError, LocalBroadcastHub, MemoryTier,
    MenuCacheManager, MenuLoader, MenuSource, Platform, PlatformAdapters, SessionStore,
    SessionTier, TabChannel, TierReport,
};
