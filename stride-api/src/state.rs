//! Shared application state for Axum routers.

use std::sync::Arc;

use stride_core::MenuSnapshot;

use crate::config::ApiConfig;
use crate::server_cache::{CachedFetcher, ServerCache};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Server cache registry; owns stats and tag invalidation.
    pub cache: ServerCache,
    /// Cached, fallback-guarded menu document.
    pub menus: CachedFetcher<MenuSnapshot>,
    pub config: Arc<ApiConfig>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(cache: ServerCache, menus: CachedFetcher<MenuSnapshot>, config: ApiConfig) -> Self {
        Self {
            cache,
            menus,
            config: Arc::new(config),
            start_time: std::time::Instant::now(),
        }
    }
}

// Use macro to reduce boilerplate for FromRef implementations
crate::impl_from_ref!(ServerCache, cache);
crate::impl_from_ref!(CachedFetcher<MenuSnapshot>, menus);
crate::impl_from_ref!(Arc<ApiConfig>, config);
crate::impl_from_ref!(std::time::Instant, start_time);
