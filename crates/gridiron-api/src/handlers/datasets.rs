//! Dataset handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use gridiron_cache::CacheKey;
use gridiron_core::{Dataset, Error, NgsStatType, Seasons};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::error_response;
use crate::state::AppState;

const MAX_LIMIT: usize = 100_000;

#[derive(Debug, Deserialize)]
pub struct DatasetParams {
    /// Comma-separated seasons, e.g. `2023,2024`. Absent means all seasons.
    pub seasons: Option<String>,
    #[serde(default)]
    pub include_ngs: bool,
    pub ngs_stat_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    1000
}

impl DatasetParams {
    fn cache_key(&self, dataset: Dataset) -> Result<CacheKey, Error> {
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(Error::InvalidRequest(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        let seasons = match &self.seasons {
            Some(raw) => Seasons::parse_list(raw)?,
            None => Seasons::all(),
        };
        let ngs_stat_type = match &self.ngs_stat_type {
            Some(raw) => raw.parse::<NgsStatType>()?,
            None => NgsStatType::default(),
        };
        Ok(CacheKey::new(dataset, seasons, self.include_ngs, ngs_stat_type))
    }
}

#[derive(Serialize)]
pub struct DatasetResponse {
    pub dataset: Dataset,
    pub seasons: Seasons,
    pub count: usize,
    pub total_rows: usize,
    pub cached: bool,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Serialize)]
pub struct DatasetListResponse {
    pub datasets: Vec<Dataset>,
}

pub async fn list_datasets() -> Json<DatasetListResponse> {
    Json(DatasetListResponse {
        datasets: Dataset::ALL.to_vec(),
    })
}

pub async fn get_dataset(
    State(state): State<Arc<AppState>>,
    Path(dataset): Path<String>,
    Query(params): Query<DatasetParams>,
) -> Result<Json<DatasetResponse>, (StatusCode, String)> {
    let start = Instant::now();
    let dataset: Dataset = dataset.parse().map_err(error_response)?;
    let key = params.cache_key(dataset).map_err(error_response)?;

    let (table, cached) = state
        .cache
        .get_or_load(&key, || state.datasets.fetch(&key))
        .await
        .map_err(error_response)?;

    let total_rows = table.len();
    let rows = table.slice(params.offset, Some(params.limit)).to_records();
    info!(
        key = %key,
        cached,
        total_rows,
        returned = rows.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Served dataset"
    );

    Ok(Json(DatasetResponse {
        dataset,
        seasons: key.seasons,
        count: rows.len(),
        total_rows,
        cached,
        rows,
    }))
}
