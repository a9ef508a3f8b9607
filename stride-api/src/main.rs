//! Stride API Server Entry Point
//!
//! Bootstraps configuration, wires the menu repository into the server
//! cache, warms it, and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use stride_api::telemetry::{init_tracing, TelemetryConfig};
use stride_api::{
    create_api_router, default_menu_payload, menu_fetcher, warm_caches, ApiConfig, ApiError,
    ApiResult, AppState, FileMenuRepository, MenuRepository, ServerCache, StaticMenuRepository,
    TracingReporter,
};
use stride_core::SystemClock;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env();
    let cache = ServerCache::new(
        api_config.cache.clone(),
        Arc::new(TracingReporter),
        Arc::new(SystemClock),
    );

    let repository: Arc<dyn MenuRepository> = match &api_config.menu_source {
        Some(path) => {
            tracing::info!(path = %path.display(), "Serving menus from file");
            Arc::new(FileMenuRepository::new(path.clone()))
        }
        None => {
            tracing::warn!("STRIDE_MENU_SOURCE not set; serving built-in menus");
            Arc::new(StaticMenuRepository::new(default_menu_payload()))
        }
    };
    let menus = menu_fetcher(&cache, repository);

    let summary = warm_caches([menus.warm()]).await;
    tracing::info!(attempted = summary.attempted, failed = summary.failed, "Caches warmed");

    let addr = resolve_bind_addr(&api_config)?;
    let app = create_api_router(AppState::new(cache, menus, api_config.clone()), &api_config);

    tracing::info!(%addr, environment = api_config.environment.as_str(), "Starting Stride API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn resolve_bind_addr(config: &ApiConfig) -> ApiResult<SocketAddr> {
    let addr = format!("{}:{}", config.bind_host, config.port);
    addr.parse::<SocketAddr>().map_err(|e| {
        ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
    })
}
