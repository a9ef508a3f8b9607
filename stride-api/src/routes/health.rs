//! Health Check Endpoint
//!
//! GET /health reports liveness plus one check per cached fetcher. An open
//! circuit makes the service degraded (it is serving fallbacks) but never
//! unhealthy, so the response is always 200.

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use stride_core::{overall_status, HealthCheck, HealthStatus};

use crate::server_cache::{CircuitState, ServerCache};
use crate::state::AppState;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub checks: Vec<HealthCheck>,
}

fn circuit_check(tag: String, state: CircuitState) -> HealthCheck {
    let check = match state {
        CircuitState::Open => HealthCheck::degraded(tag, "circuit open; serving fallback"),
        CircuitState::Closed | CircuitState::HalfOpen => HealthCheck::healthy(tag),
    };
    check.with_metadata("circuit", serde_json::json!(state.as_str()))
}

/// GET /health
pub async fn health(
    State(cache): State<ServerCache>,
    State(start_time): State<std::time::Instant>,
) -> Json<HealthResponse> {
    let mut checks: Vec<HealthCheck> = cache
        .circuit_states()
        .into_iter()
        .map(|(tag, state)| circuit_check(tag, state))
        .collect();
    checks.sort_by(|a, b| a.component.cmp(&b.component));

    Json(HealthResponse {
        status: overall_status(&checks),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        checks,
    })
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
