//! Gridiron Loader
//!
//! Incremental loading of nflverse datasets into the warehouse, plus the
//! scheduled pipeline that chains loads, quality checks and downstream jobs.

pub mod config;
pub mod downstream;
pub mod loader;
pub mod quality;
pub mod retry;
pub mod schedule;

#[cfg(test)]
mod testing;

pub use config::{DownstreamConfig, LoaderConfig, ScheduleConfig};
pub use downstream::CommandJob;
pub use loader::{EMPTY_DATAFRAME, IncrementalLoader};
pub use quality::{QualityReport, run_quality_checks};
pub use retry::RetryPolicy;
pub use schedule::{LoadScheduler, PipelineReport};
