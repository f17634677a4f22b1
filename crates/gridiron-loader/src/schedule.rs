//! Cron-driven pipeline: loads, then quality checks, then downstream jobs.

use crate::config::ScheduleConfig;
use crate::downstream::CommandJob;
use crate::loader::IncrementalLoader;
use crate::quality::{QualityReport, run_quality_checks};
use chrono::{DateTime, Utc};
use cron::Schedule;
use gridiron_core::ports::DownstreamJob;
use gridiron_core::{Error, LoadOutcome, LoadRequest, Result, TableRef};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Everything one pipeline pass did.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub loads: Vec<LoadOutcome>,
    pub quality: Vec<QualityReport>,
    /// Downstream jobs that completed, in order.
    pub downstream: Vec<String>,
}

/// Runs the load pipeline on a cron schedule.
///
/// Only one pass runs at a time; a tick that arrives while a pass is still
/// running is skipped. Loads into the same table are serialized even across
/// callers of [`LoadScheduler::run_once`].
pub struct LoadScheduler {
    loader: Arc<IncrementalLoader>,
    schedule: Schedule,
    jobs: Vec<LoadRequest>,
    quality_checks: bool,
    downstream: Vec<Arc<dyn DownstreamJob>>,
    active: Mutex<()>,
    table_locks: std::sync::Mutex<HashMap<TableRef, Arc<Mutex<()>>>>,
}

impl LoadScheduler {
    pub fn new(loader: Arc<IncrementalLoader>, config: &ScheduleConfig) -> Result<Self> {
        let schedule = config.parsed_cron()?;
        let downstream = config
            .downstream
            .iter()
            .map(|d| Arc::new(CommandJob::from(d)) as Arc<dyn DownstreamJob>)
            .collect();

        Ok(Self {
            loader,
            schedule,
            jobs: config.jobs.clone(),
            quality_checks: config.quality_checks,
            downstream,
            active: Mutex::new(()),
            table_locks: std::sync::Mutex::new(HashMap::new()),
        })
    }

    /// Replace the downstream jobs.
    pub fn with_downstream(mut self, jobs: Vec<Arc<dyn DownstreamJob>>) -> Self {
        self.downstream = jobs;
        self
    }

    /// First scheduled run strictly after `after`.
    pub fn next_run_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Run one pipeline pass now.
    ///
    /// Stops at the first failing stage and returns its error.
    pub async fn run_once(&self) -> Result<PipelineReport> {
        let Ok(_active) = self.active.try_lock() else {
            warn!("Previous pipeline run still active, skipping");
            return Err(Error::Internal("pipeline run already active".to_string()));
        };

        let started_at = Utc::now();
        info!(jobs = self.jobs.len(), "Pipeline run started");

        let mut loads = Vec::with_capacity(self.jobs.len());
        for request in &self.jobs {
            loads.push(self.load(request).await?);
        }

        let mut quality = Vec::new();
        if self.quality_checks {
            for request in &self.jobs {
                let table = self.loader.target(request)?;
                if !self.loader.warehouse().table_exists(&table).await? {
                    continue;
                }
                let report = run_quality_checks(self.loader.warehouse().as_ref(), request.dataset, &table)
                    .await?
                    .into_result()?;
                quality.push(report);
            }
        }

        let mut downstream = Vec::with_capacity(self.downstream.len());
        for job in &self.downstream {
            job.run().await?;
            downstream.push(job.name().to_string());
        }

        let finished_at = Utc::now();
        info!(
            duration_ms = (finished_at - started_at).num_milliseconds(),
            loads = loads.len(),
            downstream = downstream.len(),
            "Pipeline run completed"
        );
        Ok(PipelineReport {
            started_at,
            finished_at,
            loads,
            quality,
            downstream,
        })
    }

    async fn load(&self, request: &LoadRequest) -> Result<LoadOutcome> {
        let table = self.loader.target(request)?;
        let lock = {
            let mut locks = self
                .table_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(table).or_default())
        };
        let _guard = lock.lock().await;
        self.loader.run(request).await
    }

    /// Run passes on the cron schedule until `shutdown` resolves.
    ///
    /// A failing pass is reported and the scheduler waits for the next tick.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let now = Utc::now();
            let Some(next) = self.next_run_after(now) else {
                warn!("Cron schedule has no upcoming runs, stopping");
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next_run = %next, "Waiting for next scheduled run");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => {
                    info!("Scheduler shutting down");
                    return;
                }
            }

            if let Err(e) = self.run_once().await {
                error!(alert = true, error = %e, "Pipeline run failed");
            }
        }
    }
}
