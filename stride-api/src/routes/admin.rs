//! Admin Cache Endpoints
//!
//! - POST /api/admin/menus/invalidate - drop the cached menu document
//! - POST /api/admin/cache/:tag/invalidate - drop any registered tag
//!
//! Admin mutations call these after writing new configuration so the next
//! read recomputes instead of serving the old value.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::MENUS_TAG;
use crate::error::{ApiError, ApiResult};
use crate::server_cache::{CacheStats, ServerCache};
use crate::state::AppState;

/// Post-invalidation stats for the tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    pub tag: String,
    pub stats: CacheStats,
}

fn invalidate(cache: &ServerCache, tag: &str) -> ApiResult<InvalidateResponse> {
    // unknown tags are a 404
    if cache.tag_health(tag).is_none() {
        return Err(ApiError::cache_tag_not_found(tag));
    }
    cache.invalidate_cache(tag);
    info!(tag, "Cache invalidated by admin request");
    let stats = cache
        .tag_health(tag)
        .ok_or_else(|| ApiError::cache_tag_not_found(tag))?;
    Ok(InvalidateResponse {
        tag: tag.to_string(),
        stats,
    })
}

/// POST /api/admin/menus/invalidate
pub async fn invalidate_menus(
    State(cache): State<ServerCache>,
) -> ApiResult<Json<InvalidateResponse>> {
    invalidate(&cache, MENUS_TAG).map(Json)
}

/// POST /api/admin/cache/:tag/invalidate
pub async fn invalidate_tag(
    State(cache): State<ServerCache>,
    Path(tag): Path<String>,
) -> ApiResult<Json<InvalidateResponse>> {
    invalidate(&cache, &tag).map(Json)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/menus/invalidate", post(invalidate_menus))
        .route("/api/admin/cache/:tag/invalidate", post(invalidate_tag))
}
