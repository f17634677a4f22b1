//! Application state shared across handlers.

use crate::service::DatasetService;
use gridiron_cache::ResponseCache;
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ResponseCache>,
    pub datasets: DatasetService,
}

impl AppState {
    pub fn new(cache: Arc<ResponseCache>, datasets: DatasetService) -> Self {
        Self { cache, datasets }
    }
}
