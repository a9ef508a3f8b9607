//! Server-side cache wrapper.
//!
//! Wraps slow or failing upstream fetchers with:
//! - a revalidating per-tag cache (stale-while-revalidate, invalidation by tag)
//! - a hard timeout that serves a fallback instead of hanging
//! - a per-fetcher circuit breaker
//!
//! No upstream failure reaches the caller. Trouble is visible only through
//! [`ServerCache::get_cache_health`] and the [`ErrorReporter`] side channel.
//!
//! # Example
//!
//! ```ignore
//! let cache = ServerCache::new(ServerCacheConfig::from_env(), Arc::new(TracingReporter), Arc::new(SystemClock));
//! let menus = cache.create_cached_fetcher(
//!     FetcherOptions::new("menus", MenuSnapshot::from_payload(json!({"menus": []}))),
//!     move || source.clone().load(),
//! );
//!
//! let snapshot = menus.get().await; // cached, fresh, or fallback
//! cache.invalidate_cache("menus");
//! ```

pub mod circuit;
pub mod fetcher;
pub mod reporter;
pub mod stats;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::{join_all, BoxFuture};
use serde::Serialize;
use stride_core::{Clock, SystemClock};
use tracing::{info, warn};

pub use circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use fetcher::{CachedFetcher, FetchResult, FetcherOptions};
pub use reporter::{report_quietly, ErrorReport, ErrorReporter, Severity, TracingReporter};
pub use stats::{CacheStats, StatsRegistry};

use crate::config::ServerCacheConfig;

/// State shared by a [`ServerCache`] and every fetcher it created.
pub(crate) struct Shared {
    pub(crate) stats: StatsRegistry,
    /// Bumped by each invalidation; slots from an older generation are ignored.
    generations: DashMap<String, u64>,
    pub(crate) reporter: Arc<dyn ErrorReporter>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl Shared {
    pub(crate) fn generation(&self, tag: &str) -> u64 {
        self.generations.get(tag).map(|g| *g.value()).unwrap_or(0)
    }
}

/// Registry of cached fetchers with shared stats and tag invalidation.
///
/// Construct one per process (or per test) and hand it to route state.
#[derive(Clone)]
pub struct ServerCache {
    shared: Arc<Shared>,
    circuits: Arc<DashMap<String, Arc<CircuitBreaker>>>,
    config: ServerCacheConfig,
}

impl ServerCache {
    pub fn new(
        config: ServerCacheConfig,
        reporter: Arc<dyn ErrorReporter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                stats: StatsRegistry::new(),
                generations: DashMap::new(),
                reporter,
                clock,
            }),
            circuits: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Default configuration, tracing reporter and system clock.
    pub fn with_defaults() -> Self {
        Self::new(
            ServerCacheConfig::default(),
            Arc::new(TracingReporter),
            Arc::new(SystemClock),
        )
    }

    pub fn config(&self) -> &ServerCacheConfig {
        &self.config
    }

    /// Wrap `fetcher` for `options.tag`.
    ///
    /// Each fetcher gets its own circuit breaker. The tag shows up in
    /// [`get_cache_health`](Self::get_cache_health) immediately.
    pub fn create_cached_fetcher<T, F, Fut>(
        &self,
        options: FetcherOptions<T>,
        fetcher: F,
    ) -> CachedFetcher<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let breaker = Arc::new(CircuitBreaker::new(
            self.config.circuit_config(),
            self.shared.clock.clone(),
        ));
        self.shared.stats.register(&options.tag);
        self.circuits.insert(options.tag.clone(), breaker.clone());
        CachedFetcher::new(options, fetcher, &self.config, breaker, self.shared.clone())
    }

    /// Mark `tag` dirty so the next call recomputes instead of serving the
    /// cached value.
    pub fn invalidate_cache(&self, tag: &str) {
        let generation = {
            let mut entry = self.shared.generations.entry(tag.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        self.shared
            .stats
            .record_invalidated(tag, self.shared.clock.now_ms());
        info!(tag, generation, "Server cache invalidated");
    }

    /// Snapshot of every tag's counters.
    pub fn get_cache_health(&self) -> HashMap<String, CacheStats> {
        self.shared.stats.snapshot()
    }

    pub fn tag_health(&self, tag: &str) -> Option<CacheStats> {
        self.shared.stats.get(tag)
    }

    /// Breaker state of the most recently created fetcher for each tag.
    pub fn circuit_states(&self) -> HashMap<String, CircuitState> {
        self.circuits
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }
}

/// Outcome of [`warm_caches`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmSummary {
    pub attempted: usize,
    /// Warmers that panicked or were aborted.
    pub failed: usize,
}

/// Run every warmer concurrently and wait for all of them to settle.
///
/// Individual failures are logged and counted, never propagated.
pub async fn warm_caches<I>(warmers: I) -> WarmSummary
where
    I: IntoIterator<Item = BoxFuture<'static, ()>>,
{
    let handles: Vec<_> = warmers.into_iter().map(tokio::spawn).collect();
    let attempted = handles.len();

    let failed = join_all(handles)
        .await
        .into_iter()
        .filter_map(Result::err)
        .inspect(|e| warn!(error = %e, "Cache warmer failed"))
        .count();

    info!(attempted, failed, "Cache warming complete");
    WarmSummary { attempted, failed }
}
