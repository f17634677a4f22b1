//! HTTP reader for the nflverse release assets.

use crate::breaker::{CircuitBreaker, CircuitState};
use crate::config::SourceConfig;
use crate::parse::parse_csv;
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use futures::future::try_join_all;
use gridiron_core::ports::SourceReader;
use gridiron_core::{Error, NgsStatType, Result, Seasons, Table, Value};
use reqwest::{Client, StatusCode};
use tracing::{debug, info};

/// Reads release CSVs over HTTP, one request per season file.
pub struct HttpSourceReader {
    client: Client,
    config: SourceConfig,
    breaker: CircuitBreaker,
}

impl HttpSourceReader {
    pub fn new(config: SourceConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("gridiron/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;
        let breaker = CircuitBreaker::new(
            "nflverse-releases",
            config.failure_threshold,
            config.recovery_timeout(),
        );
        Ok(Self {
            client,
            config,
            breaker,
        })
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    async fn fetch(&self, path: &str) -> Result<Table> {
        let url = self.config.url_for(path);
        self.breaker.call(|| self.fetch_uncounted(url)).await
    }

    async fn fetch_uncounted(&self, url: String) -> Result<Table> {
        debug!(url = %url, "Fetching release asset");
        let res = self.client.get(&url).send().await.map_err(map_request_error)?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::InvalidRequest(format!("no release published at {}", url)));
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::SourceUnavailable(format!("{} returned {}", url, status)));
        }
        if !status.is_success() {
            return Err(Error::Source(format!("{} returned {}", url, status)));
        }

        let body = res.bytes().await.map_err(map_request_error)?;
        let table = parse_csv(&body)?;
        info!(url = %url, rows = table.len(), "Fetched release asset");
        Ok(table)
    }

    /// Fetch one file per season and stack them.
    async fn fetch_partitioned(&self, template: &str, seasons: &Seasons) -> Result<Table> {
        let years = resolve_seasons(seasons);
        let paths: Vec<String> = years
            .iter()
            .map(|year| template.replace("{season}", &year.to_string()))
            .collect();
        let parts = try_join_all(paths.iter().map(|p| self.fetch(p))).await?;
        Ok(Table::concat(parts))
    }

    /// Fetch a single all-seasons file and keep the requested seasons.
    async fn fetch_single(&self, path: &str, seasons: &Seasons) -> Result<Table> {
        let table = self.fetch(path).await?;
        Ok(filter_seasons(table, seasons))
    }
}

#[async_trait]
impl SourceReader for HttpSourceReader {
    async fn player_stats(&self, seasons: &Seasons) -> Result<Table> {
        self.fetch_partitioned(&self.config.paths.player_stats, seasons).await
    }

    async fn schedules(&self, seasons: &Seasons) -> Result<Table> {
        self.fetch_single(&self.config.paths.schedules, seasons).await
    }

    async fn rosters(&self, seasons: &Seasons) -> Result<Table> {
        self.fetch_partitioned(&self.config.paths.rosters, seasons).await
    }

    async fn team_stats(&self, seasons: &Seasons) -> Result<Table> {
        self.fetch_partitioned(&self.config.paths.team_stats, seasons).await
    }

    async fn nextgen_stats(&self, stat_type: NgsStatType, seasons: &Seasons) -> Result<Table> {
        let path = self
            .config
            .paths
            .nextgen_stats
            .replace("{stat_type}", stat_type.as_str());
        self.fetch_single(&path, seasons).await
    }

    async fn snap_counts(&self, seasons: &Seasons) -> Result<Table> {
        self.fetch_partitioned(&self.config.paths.snap_counts, seasons).await
    }

    async fn injuries(&self, seasons: &Seasons) -> Result<Table> {
        self.fetch_partitioned(&self.config.paths.injuries, seasons).await
    }
}

fn map_request_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout(err.to_string())
    } else if err.is_connect() || err.is_request() || err.is_body() {
        Error::SourceUnavailable(err.to_string())
    } else {
        Error::Source(err.to_string())
    }
}

/// Seasons to request for a partitioned release.
///
/// "All seasons" on a per-season release means the most recent season: a
/// season is current from September onwards.
fn resolve_seasons(seasons: &Seasons) -> Vec<i32> {
    if seasons.is_all() {
        let today = Utc::now().date_naive();
        vec![latest_season(today.year(), today.month())]
    } else {
        seasons.as_slice().to_vec()
    }
}

fn latest_season(year: i32, month: u32) -> i32 {
    if month >= 9 { year } else { year - 1 }
}

fn filter_seasons(table: Table, seasons: &Seasons) -> Table {
    if seasons.is_all() {
        return table;
    }
    let Some(idx) = table.column_index("season") else {
        return table;
    };
    table.filter_rows(|row| row[idx].as_i64().is_some_and(|s| seasons.contains(s as i32)))
}
