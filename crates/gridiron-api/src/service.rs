//! Dataset reads for the API, including optional NextGen enrichment.

use gridiron_cache::CacheKey;
use gridiron_core::ports::SourceReader;
use gridiron_core::{Dataset, NgsStatType, Result, Seasons, Table};
use gridiron_source::{Enrichment, merge_nextgen};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fetches the table behind a cache key from the source.
#[derive(Clone)]
pub struct DatasetService {
    source: Arc<dyn SourceReader>,
}

impl DatasetService {
    pub fn new(source: Arc<dyn SourceReader>) -> Self {
        Self { source }
    }

    /// Load the table a cache key describes.
    ///
    /// Player stats requested with `include_ngs` for explicit seasons are
    /// enriched with NextGen columns; enrichment problems never fail the read.
    pub async fn fetch(&self, key: &CacheKey) -> Result<Table> {
        let base = match key.dataset {
            Dataset::NextgenStats => self.source.nextgen_stats(key.ngs_stat_type, &key.seasons).await?,
            dataset => self.source.load(dataset, &key.seasons).await?,
        };
        debug!(key = %key, rows = base.len(), "Fetched dataset from source");

        if !(key.include_ngs && key.dataset == Dataset::PlayerStats && !key.seasons.is_all()) {
            return Ok(base);
        }

        let enrichment = self.enrich(&base, key.ngs_stat_type, &key.seasons).await;
        match &enrichment {
            Enrichment::Applied(_) => info!(key = %key, "NextGen enrichment applied"),
            Enrichment::Skipped(reason) => info!(key = %key, reason = %reason, "NextGen enrichment skipped"),
        }
        Ok(enrichment.into_table(base))
    }

    async fn enrich(&self, base: &Table, stat_type: NgsStatType, seasons: &Seasons) -> Enrichment {
        let ngs = self.nextgen_or_empty(stat_type, seasons).await;
        if !ngs.is_empty() {
            return merge_nextgen(base, &ngs, true);
        }

        let Some(previous) = fallback_season(seasons) else {
            return Enrichment::Skipped("no nextgen rows for requested seasons".to_string());
        };
        info!(season = previous, "No NextGen rows for requested seasons, using previous season");
        let ngs = self.nextgen_or_empty(stat_type, &Seasons::new([previous])).await;
        merge_nextgen(base, &ngs, false)
    }

    async fn nextgen_or_empty(&self, stat_type: NgsStatType, seasons: &Seasons) -> Table {
        match self.source.nextgen_stats(stat_type, seasons).await {
            Ok(table) => table,
            Err(e) => {
                warn!(stat_type = %stat_type, seasons = %seasons, error = %e, "NextGen load failed");
                Table::default()
            }
        }
    }
}

/// Season before the latest requested one, unless it was requested too.
///
/// NextGen releases lag the weekly stats at the start of a season, so the
/// previous season stands in when the latest has no rows yet.
fn fallback_season(seasons: &Seasons) -> Option<i32> {
    let latest = *seasons.as_slice().last()?;
    let previous = latest - 1;
    (!seasons.as_slice().contains(&previous)).then_some(previous)
}
