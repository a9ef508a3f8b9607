//! Per-tag cache statistics.
//!
//! Hit counting is approximate: a call served from the tag slot counts as a
//! hit (stale serves included) and a call that runs the fetcher in the
//! foreground counts as a miss. Background refreshes are not counted.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use stride_core::TimestampMs;

/// Counters for one tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub timeouts: u64,
    /// Fetcher calls that returned an error.
    pub errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_invalidated: Option<TimestampMs>,
}

/// Concurrent map from tag to [`CacheStats`].
#[derive(Debug, Default)]
pub struct StatsRegistry {
    tags: DashMap<String, CacheStats>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `tag` show up in snapshots before anything is recorded for it.
    pub fn register(&self, tag: &str) {
        self.tags.entry(tag.to_string()).or_default();
    }

    fn update(&self, tag: &str, f: impl FnOnce(&mut CacheStats)) {
        let mut entry = self.tags.entry(tag.to_string()).or_default();
        f(entry.value_mut());
    }

    pub fn record_hit(&self, tag: &str) {
        self.update(tag, |s| s.hits += 1);
    }

    pub fn record_miss(&self, tag: &str) {
        self.update(tag, |s| s.misses += 1);
    }

    pub fn record_timeout(&self, tag: &str) {
        self.update(tag, |s| s.timeouts += 1);
    }

    pub fn record_error(&self, tag: &str) {
        self.update(tag, |s| s.errors += 1);
    }

    pub fn record_invalidated(&self, tag: &str, at: TimestampMs) {
        self.update(tag, |s| s.last_invalidated = Some(at));
    }

    pub fn get(&self, tag: &str) -> Option<CacheStats> {
        self.tags.get(tag).map(|entry| entry.value().clone())
    }

    /// Copy of every tag's counters.
    pub fn snapshot(&self) -> HashMap<String, CacheStats> {
        self.tags
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
