//! Menu Endpoints
//!
//! - GET /api/menus - cached (or fallback) menu snapshot
//! - GET /api/menus/version - server version only, for the client handshake
//!
//! Neither endpoint fails because of upstream trouble: the cached fetcher
//! degrades to the built-in fallback document.

use axum::{
    extract::State,
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use stride_core::{MenuSnapshot, MenuVersionResponse};

use crate::constants::MENU_VERSION_HEADER;
use crate::server_cache::CachedFetcher;
use crate::state::AppState;

/// GET /api/menus
pub async fn get_menus(State(menus): State<CachedFetcher<MenuSnapshot>>) -> Response {
    let snapshot = menus.get().await;
    let version = HeaderValue::from_str(&snapshot.server_version);
    let mut response = Json(snapshot).into_response();
    if let Ok(version) = version {
        response.headers_mut().insert(MENU_VERSION_HEADER, version);
    }
    response
}

/// GET /api/menus/version
pub async fn get_menu_version(
    State(menus): State<CachedFetcher<MenuSnapshot>>,
) -> Json<MenuVersionResponse> {
    let snapshot = menus.get().await;
    Json(MenuVersionResponse {
        server_version: snapshot.server_version,
    })
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/menus", get(get_menus))
        .route("/api/menus/version", get(get_menu_version))
}
