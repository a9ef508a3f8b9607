//! REST API Routes Module
//!
//! Includes:
//! - Menu endpoints backed by the server cache
//! - Admin cache invalidation
//! - Developer cache diagnostics (non-production only)
//! - Health check

pub mod admin;
pub mod debug;
pub mod health;
pub mod menus;

use axum::{http::Uri, Router};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::state::AppState;

async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {}", uri.path()))
}

/// Build the complete API router.
///
/// The debug endpoints are only mounted when `config` is not production.
pub fn create_api_router(state: AppState, config: &ApiConfig) -> Router {
    let mut router = Router::new()
        .merge(menus::create_router())
        .merge(admin::create_router())
        .merge(health::create_router());

    if config.is_production() {
        tracing::debug!("Production environment; debug endpoints disabled");
    } else {
        router = router.merge(debug::create_router());
    }

    router
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::menus::{menu_fetcher, StaticMenuRepository};
    use crate::server_cache::ServerCache;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(environment: Environment) -> Router {
        let cache = ServerCache::with_defaults();
        let menus = menu_fetcher(
            &cache,
            Arc::new(StaticMenuRepository::new(json!({"menus": ["home"]}))),
        );
        let config = ApiConfig {
            environment,
            ..ApiConfig::default()
        };
        let router_config = config.clone();
        create_api_router(AppState::new(cache, menus, config), &router_config)
    }

    async fn status_of(app: Router, method: &str, uri: &str) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_menus_has_version_header() {
        let request = Request::builder().uri("/api/menus").body(Body::empty()).unwrap();
        let response = app(Environment::Development).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-menu-version"));
    }

    #[tokio::test]
    async fn test_debug_endpoint_hidden_in_production() {
        assert_eq!(
            status_of(app(Environment::Development), "GET", "/api/debug/cache-health").await,
            StatusCode::OK
        );
        assert_eq!(
            status_of(app(Environment::Production), "GET", "/api/debug/cache-health").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_invalidate_unknown_tag_is_404() {
        assert_eq!(
            status_of(app(Environment::Development), "POST", "/api/admin/cache/branding/invalidate").await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(app(Environment::Development), "POST", "/api/admin/menus/invalidate").await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_health_is_ok() {
        assert_eq!(status_of(app(Environment::Production), "GET", "/health").await, StatusCode::OK);
    }
}
