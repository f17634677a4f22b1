//! Downstream transformation jobs run after the raw loads.

use crate::config::DownstreamConfig;
use async_trait::async_trait;
use gridiron_core::ports::DownstreamJob;
use gridiron_core::{Error, Result};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Lines of output kept in the error of a failed command.
const OUTPUT_TAIL_LINES: usize = 20;

/// Runs a shell command, e.g. `dbt run --select ...`.
pub struct CommandJob {
    name: String,
    command: String,
    workdir: Option<String>,
    timeout: Option<Duration>,
}

impl CommandJob {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            workdir: None,
            timeout: None,
        }
    }

    pub fn with_workdir(mut self, workdir: impl Into<String>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn failed(&self, message: impl Into<String>) -> Error {
        Error::DownstreamFailed {
            job: self.name.clone(),
            message: message.into(),
        }
    }
}

impl From<&DownstreamConfig> for CommandJob {
    fn from(config: &DownstreamConfig) -> Self {
        let mut job = CommandJob::new(&config.name, &config.command);
        if let Some(dir) = &config.workdir {
            job = job.with_workdir(dir);
        }
        if let Some(secs) = config.timeout_secs {
            job = job.with_timeout(Duration::from_secs(secs));
        }
        job
    }
}

#[async_trait]
impl DownstreamJob for CommandJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<()> {
        let start = Instant::now();
        info!(job = %self.name, command = %self.command, "Running downstream job");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .map_err(|e| self.failed(format!("failed to spawn: {}", e)))?;

        let output = match self.timeout {
            Some(limit) => match timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(job = %self.name, timeout_secs = limit.as_secs(), "Downstream job timed out");
                    return Err(self.failed(format!("timed out after {}s", limit.as_secs())));
                }
            },
            None => child.wait_with_output().await,
        }
        .map_err(|e| self.failed(format!("failed to wait: {}", e)))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let text = if stderr.trim().is_empty() { stdout } else { stderr };
            let lines: Vec<&str> = text.lines().collect();
            let tail = lines[lines.len().saturating_sub(OUTPUT_TAIL_LINES)..].join("\n");
            return Err(self.failed(format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                tail
            )));
        }

        debug!(job = %self.name, duration_ms, "Downstream job output: {}", String::from_utf8_lossy(&output.stdout).trim());
        info!(job = %self.name, duration_ms, "Downstream job completed");
        Ok(())
    }
}
