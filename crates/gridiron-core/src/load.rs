//! Incremental load requests and outcomes.

use crate::dataset::{Dataset, Seasons};
use serde::{Deserialize, Serialize};

/// One loader invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub dataset: Dataset,
    #[serde(default)]
    pub seasons: Seasons,
    /// Column scoping delete-then-append when the target has no usable key.
    #[serde(default = "default_incremental_key")]
    pub incremental_key: String,
}

fn default_incremental_key() -> String {
    "season".to_string()
}

impl LoadRequest {
    pub fn new(dataset: Dataset, seasons: Seasons) -> Self {
        Self {
            dataset,
            seasons,
            incremental_key: default_incremental_key(),
        }
    }

    pub fn with_incremental_key(mut self, key: impl Into<String>) -> Self {
        self.incremental_key = key.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Success,
    Skipped,
}

/// Which branch of the loader wrote the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStrategy {
    /// Target did not exist and was created from the fetched rows.
    Created,
    /// Rows merged on the target's primary key.
    Upserted,
    /// Rows for the fetched incremental-key values deleted, then appended.
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOutcome {
    pub dataset: Dataset,
    pub status: LoadStatus,
    pub strategy: Option<LoadStrategy>,
    pub rows_loaded: u64,
    pub rows_updated: i64,
    pub reason: Option<String>,
    pub attempts: u32,
}

impl LoadOutcome {
    pub fn skipped(dataset: Dataset, reason: impl Into<String>) -> Self {
        Self {
            dataset,
            status: LoadStatus::Skipped,
            strategy: None,
            rows_loaded: 0,
            rows_updated: 0,
            reason: Some(reason.into()),
            attempts: 1,
        }
    }

    pub fn success(dataset: Dataset, strategy: LoadStrategy, rows_loaded: u64, rows_updated: i64) -> Self {
        Self {
            dataset,
            status: LoadStatus::Success,
            strategy: Some(strategy),
            rows_loaded,
            rows_updated,
            reason: None,
            attempts: 1,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.status == LoadStatus::Skipped
    }
}
