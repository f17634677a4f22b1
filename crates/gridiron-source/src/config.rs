//! Configuration for the release reader.

use gridiron_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Where and how to fetch release assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL the asset paths are joined to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Consecutive failures before the circuit opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds an open circuit waits before letting a probe through.
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout_secs: u64,
    #[serde(default)]
    pub paths: AssetPaths,
}

fn default_base_url() -> String {
    "https://github.com/nflverse/nflverse-data/releases/download".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout() -> u64 {
    60
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout(),
            paths: AssetPaths::default(),
        }
    }
}

impl SourceConfig {
    /// Create a config pointing at a different host (mirrors, tests).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout_secs = timeout.as_secs();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }

    /// Reject base URLs that are not absolute http(s) URLs.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| Error::Configuration(format!("invalid source base_url '{}': {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Configuration(format!(
                "source base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        Ok(())
    }

    /// Absolute URL of an asset path.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Asset path templates. `{season}` and `{stat_type}` are substituted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    pub player_stats: String,
    pub schedules: String,
    pub rosters: String,
    pub team_stats: String,
    pub nextgen_stats: String,
    pub snap_counts: String,
    pub injuries: String,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            player_stats: "stats_player/stats_player_week_{season}.csv".to_string(),
            schedules: "schedules/games.csv".to_string(),
            rosters: "rosters/roster_{season}.csv".to_string(),
            team_stats: "stats_team/stats_team_week_{season}.csv".to_string(),
            nextgen_stats: "nextgen_stats/ngs_{stat_type}.csv".to_string(),
            snap_counts: "snap_counts/snap_counts_{season}.csv".to_string(),
            injuries: "injuries/injuries_{season}.csv".to_string(),
        }
    }
}
