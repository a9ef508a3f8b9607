//! Cached fetcher: a revalidating slot around a guarded upstream call.
//!
//! The guard (circuit breaker, then timeout race) sits inside the cached
//! computation, so a fallback produced by a timeout or an open circuit is
//! cached like any other value and served until the next revalidation or
//! invalidation.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::json;
use stride_core::{duration_ms, FetchError, TimestampMs};
use tracing::{debug, trace, warn};

use super::circuit::{CircuitBreaker, CircuitState};
use super::reporter::{report_quietly, ErrorReport};
use super::Shared;
use crate::config::ServerCacheConfig;

/// Result type produced by upstream fetchers.
pub type FetchResult<T> = Result<T, FetchError>;

type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, FetchResult<T>> + Send + Sync>;

/// Per-fetcher construction options.
#[derive(Debug, Clone)]
pub struct FetcherOptions<T> {
    /// Cache key and invalidation unit.
    pub tag: String,
    /// Served when the fetcher fails, times out, or the circuit is open.
    pub fallback: T,
    /// Overrides [`ServerCacheConfig::timeout`].
    pub timeout: Option<Duration>,
    /// Overrides [`ServerCacheConfig::revalidate`].
    pub revalidate: Option<Duration>,
}

impl<T> FetcherOptions<T> {
    pub fn new(tag: impl Into<String>, fallback: T) -> Self {
        Self {
            tag: tag.into(),
            fallback,
            timeout: None,
            revalidate: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_revalidate(mut self, revalidate: Duration) -> Self {
        self.revalidate = Some(revalidate);
        self
    }
}

struct Slot<T> {
    value: T,
    computed_at: TimestampMs,
    generation: u64,
}

struct FetcherInner<T> {
    tag: String,
    fetch: FetchFn<T>,
    fallback: T,
    timeout: Duration,
    revalidate: Duration,
    breaker: Arc<CircuitBreaker>,
    slot: RwLock<Option<Slot<T>>>,
    refreshing: AtomicBool,
    shared: Arc<Shared>,
}

/// A fetcher wrapped with caching, a timeout and a circuit breaker.
///
/// Cheap to clone; clones share the slot and the breaker.
pub struct CachedFetcher<T> {
    inner: Arc<FetcherInner<T>>,
}

impl<T> Clone for CachedFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> std::fmt::Debug for CachedFetcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedFetcher")
            .field("tag", &self.inner.tag)
            .field("timeout", &self.inner.timeout)
            .field("revalidate", &self.inner.revalidate)
            .field("breaker", &self.inner.breaker)
            .finish()
    }
}

impl<T> CachedFetcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new<F, Fut>(
        options: FetcherOptions<T>,
        fetcher: F,
        config: &ServerCacheConfig,
        breaker: Arc<CircuitBreaker>,
        shared: Arc<Shared>,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let fetch: FetchFn<T> =
            Arc::new(move || -> BoxFuture<'static, FetchResult<T>> { Box::pin(fetcher()) });
        Self {
            inner: Arc::new(FetcherInner {
                tag: options.tag,
                fetch,
                fallback: options.fallback,
                timeout: options.timeout.unwrap_or(config.timeout),
                revalidate: options.revalidate.unwrap_or(config.revalidate),
                breaker,
                slot: RwLock::new(None),
                refreshing: AtomicBool::new(false),
                shared,
            }),
        }
    }

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.inner.breaker.state()
    }

    /// Current value for the tag. Never fails.
    ///
    /// Serves the cached value when one exists for the current tag
    /// generation, scheduling a background refresh once it is older than the
    /// revalidation window. Otherwise runs the guarded fetch in the
    /// foreground and caches its result, fallback included.
    pub async fn get(&self) -> T {
        let inner = &self.inner;
        let generation = inner.shared.generation(&inner.tag);

        if let Some((value, computed_at)) = inner.cached(generation) {
            inner.shared.stats.record_hit(&inner.tag);
            let age_ms = inner.shared.clock.now_ms().saturating_sub(computed_at);
            if age_ms >= duration_ms(inner.revalidate) {
                self.spawn_revalidation(generation);
            }
            trace!(tag = %inner.tag, age_ms, "Server cache hit");
            return value;
        }

        inner.shared.stats.record_miss(&inner.tag);
        debug!(tag = %inner.tag, "Server cache miss; fetching");
        let value = inner.guarded_fetch().await;
        inner.store(value.clone(), generation);
        value
    }

    /// Boxed `get` for [`warm_caches`](super::warm_caches).
    pub fn warm(&self) -> BoxFuture<'static, ()> {
        let fetcher = self.clone();
        Box::pin(async move {
            fetcher.get().await;
        })
    }

    fn spawn_revalidation(&self, generation: u64) {
        let inner = self.inner.clone();
        if inner
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        debug!(tag = %inner.tag, "Revalidating server cache in background");
        tokio::spawn(async move {
            let value = inner.guarded_fetch().await;
            inner.store(value, generation);
            inner.refreshing.store(false, Ordering::Release);
        });
    }
}

impl<T> FetcherInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn cached(&self, generation: u64) -> Option<(T, TimestampMs)> {
        let guard = match self.slot.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .as_ref()
            .filter(|slot| slot.generation == generation)
            .map(|slot| (slot.value.clone(), slot.computed_at))
    }

    /// Put `value` in the slot unless the slot already holds a newer
    /// generation.
    fn store(&self, value: T, generation: u64) {
        let mut guard = match self.slot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.as_ref().is_some_and(|slot| slot.generation > generation) {
            debug!(tag = %self.tag, generation, "Discarding refresh from an invalidated generation");
            return;
        }
        *guard = Some(Slot {
            value,
            computed_at: self.shared.clock.now_ms(),
            generation,
        });
    }

    /// Circuit check, then the fetcher raced against the timeout.
    ///
    /// The fetch runs as its own task. When the timer wins, the task is
    /// left to finish on its own and its result is discarded.
    async fn guarded_fetch(&self) -> T {
        if !self.breaker.is_allowed() {
            let open = FetchError::CircuitOpen {
                tag: self.tag.clone(),
                failures: self.breaker.failure_count(),
            };
            warn!(tag = %self.tag, error = %open, "Serving fallback");
            return self.fallback.clone();
        }

        let task = tokio::spawn((self.fetch)());
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(value))) => value,
            Ok(Ok(Err(e))) => self.on_error(e.to_string()),
            Ok(Err(join_error)) => self.on_error(format!("fetcher task failed: {join_error}")),
            Err(_) => self.on_timeout(),
        }
    }

    fn on_timeout(&self) -> T {
        let timeout_ms = duration_ms(self.timeout);
        self.shared.stats.record_timeout(&self.tag);
        let failures = self.breaker.record_failure();
        let timed_out = FetchError::Timeout {
            tag: self.tag.clone(),
            timeout: self.timeout,
        };
        report_quietly(
            self.shared.reporter.as_ref(),
            ErrorReport::warning(
                "CACHE_TIMEOUT",
                timed_out.to_string(),
                json!({ "tag": self.tag, "timeoutMs": timeout_ms, "failures": failures }),
            ),
        );
        self.fallback.clone()
    }

    fn on_error(&self, message: String) -> T {
        self.shared.stats.record_error(&self.tag);
        let failures = self.breaker.record_failure();
        report_quietly(
            self.shared.reporter.as_ref(),
            ErrorReport::error(
                "CACHE_FETCH_ERROR",
                format!("Fetch for {} failed: {}", self.tag, message),
                json!({ "tag": self.tag, "error": message, "failures": failures }),
            ),
        );
        self.fallback.clone()
    }
}
