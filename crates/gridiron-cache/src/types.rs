//! Cache configuration and status reports.

use gridiron_core::{Dataset, Error, NgsStatType, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache sizing and freshness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry lifetime in seconds.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Maximum number of entries.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_ttl_seconds() -> u64 {
    300
}

fn default_capacity() -> usize {
    20
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            capacity: default_capacity(),
        }
    }
}

impl CacheConfig {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl_seconds: ttl.as_secs(),
            capacity,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::Configuration("cache capacity must be at least 1".into()));
        }
        if self.ttl_seconds == 0 {
            return Err(Error::Configuration("cache ttl_seconds must be at least 1".into()));
        }
        Ok(())
    }
}

/// One live entry as reported by [`crate::ResponseCache::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntryStatus {
    pub dataset: Dataset,
    pub seasons: Vec<i32>,
    pub include_ngs: bool,
    pub ngs_stat_type: NgsStatType,
    pub rows: usize,
    pub age_seconds: u64,
    pub expires_in_seconds: u64,
}

/// Snapshot of the cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub cache_size: usize,
    pub max_size: usize,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: Vec<CacheEntryStatus>,
}
