//! HTTP API server for Gridiron Data Hub.
//!
//! Serves dataset reads through the response cache and exposes cache
//! administration and health endpoints.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod state;

pub use routes::create_router;
pub use service::DatasetService;
pub use state::AppState;
