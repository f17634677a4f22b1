//! Loader and scheduler configuration.

use crate::retry::RetryPolicy;
use cron::Schedule;
use gridiron_core::{Error, LoadRequest, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Warehouse schema receiving raw tables.
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Cap on a single backoff sleep.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Largest accepted `max_attempts`.
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;

fn default_schema() -> String {
    "raw_nfl".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl LoaderConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
            self.backoff_factor,
        )
        .with_max_delay(Duration::from_millis(self.max_delay_ms))
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&self.max_attempts) {
            return Err(Error::Configuration(format!(
                "loader.max_attempts must be between 1 and {}, got {}",
                MAX_ATTEMPTS_LIMIT, self.max_attempts
            )));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(Error::Configuration(format!(
                "loader.backoff_factor must be a finite number >= 1, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }
}

/// A shell command run after the loads, e.g. `dbt run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownstreamConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Cron expression with a seconds field.
    #[serde(default = "default_cron")]
    pub cron: String,
    #[serde(default = "default_jobs")]
    pub jobs: Vec<LoadRequest>,
    #[serde(default = "default_true")]
    pub quality_checks: bool,
    #[serde(default = "default_downstream")]
    pub downstream: Vec<DownstreamConfig>,
}

fn default_cron() -> String {
    "0 0 6 * * *".to_string()
}

fn default_true() -> bool {
    true
}

fn default_jobs() -> Vec<LoadRequest> {
    use gridiron_core::{Dataset, Seasons};
    vec![
        LoadRequest::new(Dataset::PlayerStats, Seasons::new([2023, 2024, 2025])),
        LoadRequest::new(Dataset::Schedules, Seasons::new([2023, 2024, 2025])),
    ]
}

fn default_downstream() -> Vec<DownstreamConfig> {
    let dbt = |verb: &str| DownstreamConfig {
        name: format!("dbt_{}", verb),
        command: format!("dbt {} --select stg_player_stats stg_schedules", verb),
        workdir: Some("/opt/airflow/dbt/nfl_datamans".to_string()),
        timeout_secs: Some(3600),
    };
    vec![dbt("run"), dbt("test")]
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            jobs: default_jobs(),
            quality_checks: default_true(),
            downstream: default_downstream(),
        }
    }
}

impl ScheduleConfig {
    /// Parse the cron expression.
    pub fn parsed_cron(&self) -> Result<Schedule> {
        Schedule::from_str(&self.cron)
            .map_err(|e| Error::Configuration(format!("invalid cron '{}': {}", self.cron, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_daily_pipeline() {
        let schedule = ScheduleConfig::default();
        assert_eq!(schedule.cron, "0 0 6 * * *");
        assert_eq!(schedule.jobs.len(), 2);
        assert_eq!(schedule.downstream[0].name, "dbt_run");
        assert_eq!(schedule.downstream[1].name, "dbt_test");

        let policy = LoaderConfig::default().retry_policy();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_schedule_deserializes() {
        let schedule: ScheduleConfig =
            serde_json::from_str(r#"{"cron":"0 */5 * * * *","downstream":[]}"#).unwrap();
        assert!(schedule.downstream.is_empty());
        assert!(schedule.quality_checks);
        assert_eq!(schedule.jobs.len(), 2);
    }

    #[test]
    fn test_loader_limits() {
        assert!(LoaderConfig::default().validate().is_ok());
        let too_many = LoaderConfig {
            max_attempts: 100,
            ..Default::default()
        };
        assert!(matches!(too_many.validate(), Err(Error::Configuration(_))));
        let shrinking = LoaderConfig {
            backoff_factor: 0.5,
            ..Default::default()
        };
        assert!(shrinking.validate().is_err());
    }

    #[test]
    fn test_cron_parsing() {
        assert!(ScheduleConfig::default().parsed_cron().is_ok());
        let bad = ScheduleConfig {
            cron: "daily".into(),
            ..Default::default()
        };
        assert!(matches!(bad.parsed_cron(), Err(Error::Configuration(_))));
    }
}
