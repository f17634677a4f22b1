//! Cache key construction.

use gridiron_core::{Dataset, NgsStatType, Seasons};
use serde::Serialize;
use std::fmt;

/// Identity of a dataset request.
///
/// Seasons are normalized (sorted, de-duplicated) so `[2024, 2023]` and
/// `[2023, 2024, 2024]` address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey {
    pub dataset: Dataset,
    pub seasons: Seasons,
    pub include_ngs: bool,
    pub ngs_stat_type: NgsStatType,
}

impl CacheKey {
    pub fn new(
        dataset: Dataset,
        seasons: impl Into<Seasons>,
        include_ngs: bool,
        ngs_stat_type: NgsStatType,
    ) -> Self {
        Self {
            dataset,
            seasons: seasons.into(),
            include_ngs,
            ngs_stat_type,
        }
    }

    /// Key for a plain dataset request without NextGen enrichment.
    pub fn plain(dataset: Dataset, seasons: impl Into<Seasons>) -> Self {
        Self::new(dataset, seasons, false, NgsStatType::default())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] ngs={}:{}",
            self.dataset, self.seasons, self.include_ngs, self.ngs_stat_type
        )
    }
}
