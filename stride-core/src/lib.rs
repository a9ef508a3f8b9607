//! Stride Core - Shared Cache Types
//!
//! Data types, errors, configuration and the injected clock used by both the
//! client cache manager (`stride-storage`) and the server cache wrapper
//! (`stride-api`). This crate performs no I/O.

pub mod clock;
pub mod config;
pub mod document;
pub mod error;
pub mod health;
pub mod identity;

pub use clock::{duration_ms, Clock, ManualClock, SystemClock};
pub use config::{ClientCacheConfig, StalenessPolicy, DEFAULT_EXPIRE_AFTER, DEFAULT_STALE_AFTER};
pub use document::{
    compute_server_version, CacheMessage, CachedDocument, MenuSnapshot, MenuVersionResponse,
    ANONYMOUS_OWNER, DOCUMENT_SCHEMA_VERSION,
};
pub use error::{
    BroadcastError, ConfigError, FetchError, StrideError, StrideResult, TierError, TierKind,
};
pub use health::{overall_status, HealthCheck, HealthStatus};
pub use identity::{new_tab_id, TabId, TimestampMs};
