//! API route definitions.

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{cache, datasets, health};
use crate::middleware::{cors_layer, request_id};
use crate::state::AppState;

/// Create the main API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .nest("/cache", cache_routes())
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .layer(axum::middleware::from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest("/datasets", dataset_routes())
}

fn dataset_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(datasets::list_datasets))
        .route("/{dataset}", get(datasets::get_dataset))
}

fn cache_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(cache::cache_status))
        .route("/clear", post(cache::clear_cache))
}
