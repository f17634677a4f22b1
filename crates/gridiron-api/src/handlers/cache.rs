//! Cache administration handlers.

use axum::{Json, extract::State};
use gridiron_cache::CacheStatus;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::state::AppState;

#[derive(Serialize)]
pub struct ClearResponse {
    pub status: String,
    pub cleared: usize,
}

pub async fn cache_status(State(state): State<Arc<AppState>>) -> Json<CacheStatus> {
    Json(state.cache.status())
}

pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<ClearResponse> {
    let cleared = state.cache.len();
    state.cache.clear();
    info!(cleared, "Cache cleared via API");
    Json(ClearResponse {
        status: "cleared".to_string(),
        cleared,
    })
}
