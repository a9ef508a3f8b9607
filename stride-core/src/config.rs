//! Configuration types for the client cache

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::clock::duration_ms;
use crate::document::{CachedDocument, DOCUMENT_SCHEMA_VERSION};
use crate::error::ConfigError;
use crate::TimestampMs;

/// Default age after which a cached document is served but refreshed.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60);

/// Default age after which a cached document must not be served.
pub const DEFAULT_EXPIRE_AFTER: Duration = Duration::from_secs(300);

/// Staleness and expiry windows for cached documents.
///
/// A missing document is always both stale and expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessPolicy {
    pub stale_after: Duration,
    pub expire_after: Duration,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            stale_after: DEFAULT_STALE_AFTER,
            expire_after: DEFAULT_EXPIRE_AFTER,
        }
    }
}

impl StalenessPolicy {
    /// Create a policy, rejecting windows where expiry does not come after staleness.
    pub fn new(stale_after: Duration, expire_after: Duration) -> Result<Self, ConfigError> {
        if expire_after <= stale_after {
            return Err(ConfigError::InvalidValue {
                field: "expire_after".to_string(),
                value: format!("{:?}", expire_after),
                reason: format!("must be greater than stale_after ({:?})", stale_after),
            });
        }
        Ok(Self {
            stale_after,
            expire_after,
        })
    }

    pub fn is_stale(&self, doc: Option<&CachedDocument>, now: TimestampMs) -> bool {
        match doc {
            Some(doc) => doc.age_ms(now) >= duration_ms(self.stale_after),
            None => true,
        }
    }

    pub fn is_expired(&self, doc: Option<&CachedDocument>, now: TimestampMs) -> bool {
        match doc {
            Some(doc) => doc.age_ms(now) >= duration_ms(self.expire_after),
            None => true,
        }
    }
}

/// Client cache manager configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientCacheConfig {
    /// Logical cache key shared by every tier.
    pub cache_key: String,
    /// Name of the cross-tab broadcast channel.
    pub channel_name: String,
    /// Schema version documents must carry to be served.
    pub schema_version: String,
    /// Durable store (database) name.
    pub durable_store: String,
    /// Collection inside the durable store.
    pub durable_collection: String,
    pub staleness: StalenessPolicy,
}

impl Default for ClientCacheConfig {
    fn default() -> Self {
        Self {
            cache_key: "stride-menu-cache".to_string(),
            channel_name: "stride-menu-sync".to_string(),
            schema_version: DOCUMENT_SCHEMA_VERSION.to_string(),
            durable_store: "stride-cache".to_string(),
            durable_collection: "menus".to_string(),
            staleness: StalenessPolicy::default(),
        }
    }
}

impl ClientCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = key.into();
        self
    }

    pub fn with_channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = name.into();
        self
    }

    pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = version.into();
        self
    }

    pub fn with_staleness(mut self, staleness: StalenessPolicy) -> Self {
        self.staleness = staleness;
        self
    }
}
