//! Stride API - server cache wrapper and HTTP surface
//!
//! Serves the navigation menu document through a cached fetcher that never
//! fails: slow or broken upstreams degrade to a fallback document, guarded by
//! a timeout and a per-fetcher circuit breaker. Admin routes invalidate by
//! tag; a developer-only route exposes the per-tag counters.

#[macro_use]
mod macros;

pub mod config;
pub mod constants;
pub mod error;
pub mod menus;
pub mod routes;
pub mod server_cache;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ApiConfig, Environment, ServerCacheConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use menus::{
    default_menu_payload, menu_fetcher, FileMenuRepository, MenuRepository, StaticMenuRepository,
};
pub use routes::create_api_router;
pub use server_cache::{
    warm_caches, CacheStats, CachedFetcher, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    ErrorReport, ErrorReporter, FetchResult, FetcherOptions, ServerCache, Severity,
    TracingReporter, WarmSummary,
};
pub use state::AppState;
