//! Developer-only cache diagnostics.
//!
//! Only mounted outside production; in production the path falls through
//! to the JSON 404 handler.

use std::collections::HashMap;

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::server_cache::{CacheStats, CircuitState, ServerCache};
use crate::state::AppState;

/// Body of `GET /api/debug/cache-health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheHealthResponse {
    pub tags: HashMap<String, CacheStats>,
    pub circuits: HashMap<String, CircuitState>,
}

/// GET /api/debug/cache-health
pub async fn cache_health(State(cache): State<ServerCache>) -> Json<CacheHealthResponse> {
    Json(CacheHealthResponse {
        tags: cache.get_cache_health(),
        circuits: cache.circuit_states(),
    })
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/api/debug/cache-health", get(cache_health))
}
