//! Circuit breaker guarding the release host.

use gridiron_core::{Error, Result};
use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Successful probes needed to close a half-open circuit.
const HALF_OPEN_SUCCESSES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
}

/// Consecutive-failure circuit breaker.
///
/// After `failure_threshold` consecutive failures the circuit opens and calls
/// fail fast with [`Error::CircuitOpen`]. Once `recovery_timeout` has passed a
/// probe is let through; two successful probes close the circuit again and any
/// failure while half-open reopens it.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            service: service.into(),
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                opened_at: None,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Run `op` through the breaker.
    ///
    /// Data errors are passed through without counting as failures: a
    /// malformed file says nothing about the health of the host.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.acquire_at(Instant::now())?;
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) if e.is_data_error() => Err(e),
            Err(e) => {
                self.record_failure_at(Instant::now());
                Err(e)
            }
        }
    }

    fn acquire_at(&self, now: Instant) -> Result<()> {
        let mut inner = self.lock();
        if inner.state == CircuitState::Open {
            let elapsed = inner
                .opened_at
                .map(|at| now.saturating_duration_since(at))
                .unwrap_or_default();
            if elapsed < self.recovery_timeout {
                return Err(Error::CircuitOpen {
                    service: self.service.clone(),
                });
            }
            info!(service = %self.service, "Circuit half-open, probing");
            inner.state = CircuitState::HalfOpen;
            inner.successes = 0;
        }
        Ok(())
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= HALF_OPEN_SUCCESSES {
                    info!(service = %self.service, "Circuit closed");
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.successes = 0;
                    inner.opened_at = None;
                }
            }
            _ => inner.failures = 0,
        }
    }

    fn record_failure_at(&self, now: Instant) {
        let mut inner = self.lock();
        inner.failures += 1;
        let trip = inner.state == CircuitState::HalfOpen || inner.failures >= self.failure_threshold;
        if trip && inner.state != CircuitState::Open {
            warn!(
                service = %self.service,
                failures = inner.failures,
                "Circuit opened"
            );
            inner.state = CircuitState::Open;
            inner.opened_at = Some(now);
            inner.successes = 0;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
