//! HTTP tests for the menu, admin and debug routes.

mod support;

use std::io::Write;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use stride_api::{
    create_api_router, menu_fetcher, ApiConfig, AppState, Environment, FileMenuRepository,
};
use stride_test_utils::compute_server_version;
use support::test_cache;
use tower::ServiceExt;

fn write_menus(file: &mut tempfile::NamedTempFile, payload: &Value) {
    let handle = file.as_file_mut();
    handle.set_len(0).unwrap();
    std::io::Seek::rewind(handle).unwrap();
    write!(handle, "{}", payload).unwrap();
    handle.flush().unwrap();
}

fn app_for(file: &tempfile::NamedTempFile, environment: Environment) -> Router {
    let (cache, _reporter, _clock) = test_cache();
    let menus = menu_fetcher(&cache, Arc::new(FileMenuRepository::new(file.path())));
    let config = ApiConfig {
        environment,
        ..ApiConfig::default()
    };
    let router_config = config.clone();
    create_api_router(AppState::new(cache, menus, config), &router_config)
}

async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn admin_invalidation_exposes_new_menus() {
    let first = json!({"menus": [{"id": "home"}]});
    let second = json!({"menus": [{"id": "home"}, {"id": "leagues"}]});
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write_menus(&mut file, &first);
    let app = app_for(&file, Environment::Development);

    let (status, body) = call(&app, "GET", "/api/menus").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payload"], first);

    // Cached until invalidated.
    write_menus(&mut file, &second);
    let (_, body) = call(&app, "GET", "/api/menus/version").await;
    assert_eq!(body["serverVersion"], json!(compute_server_version(&first)));

    let (status, body) = call(&app, "POST", "/api/admin/menus/invalidate").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tag"], "menus");
    assert!(body["stats"]["lastInvalidated"].is_i64());

    let (_, body) = call(&app, "GET", "/api/menus").await;
    assert_eq!(body["payload"], second);
    assert_eq!(body["serverVersion"], json!(compute_server_version(&second)));
}

#[tokio::test]
async fn unreadable_source_serves_fallback() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write_menus(&mut file, &json!({"menus": []}));
    let path = file.path().to_path_buf();
    drop(file);
    assert!(!path.exists());

    let (cache, reporter, _clock) = test_cache();
    let menus = menu_fetcher(&cache, Arc::new(FileMenuRepository::new(path)));
    let config = ApiConfig::default();
    let app = create_api_router(AppState::new(cache, menus, config.clone()), &config);

    let (status, body) = call(&app, "GET", "/api/menus").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payload"], stride_api::default_menu_payload());
    assert_eq!(reporter.codes(), vec!["CACHE_FETCH_ERROR"]);

    let (_, health) = call(&app, "GET", "/api/debug/cache-health").await;
    assert_eq!(health["tags"]["menus"]["errors"], 1);
    assert_eq!(health["circuits"]["menus"], "closed");
}

#[tokio::test]
async fn debug_health_counts_hits_and_misses() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write_menus(&mut file, &json!({"menus": ["home"]}));
    let app = app_for(&file, Environment::Staging);

    call(&app, "GET", "/api/menus").await;
    call(&app, "GET", "/api/menus").await;

    let (status, body) = call(&app, "GET", "/api/debug/cache-health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"]["menus"]["misses"], 1);
    assert_eq!(body["tags"]["menus"]["hits"], 1);
}

#[tokio::test]
async fn production_hides_debug_routes() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write_menus(&mut file, &json!({"menus": []}));
    let app = app_for(&file, Environment::Production);

    let (status, body) = call(&app, "GET", "/api/debug/cache-health").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_object());

    let (status, body) = call(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
