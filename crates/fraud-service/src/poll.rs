//! Status polling with exponential backoff and a deadline

use crate::error::ServiceError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Polling failure
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Timed out waiting for {what} after {elapsed:?} (last status: {last_status})")]
    DeadlineExceeded {
        what: String,
        elapsed: Duration,
        last_status: String,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Result of one status check
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep<T> {
    /// Still waiting; carries the status for logging
    Pending(String),
    Done(T),
}

/// Backoff policy for one kind of wait
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay before the second check
    pub initial_interval_secs: u64,
    /// Upper bound on the delay between checks
    pub max_interval_secs: u64,
    /// Growth factor applied after every pending check
    pub multiplier: f64,
    /// Random spread applied to each delay, as a fraction (0.1 = ±10%)
    pub jitter: f64,
    /// Give up once this much time has passed since the first check
    pub deadline_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::query()
    }
}

impl PollConfig {
    /// Model training and activation: minutes to hours
    pub fn model() -> Self {
        Self {
            initial_interval_secs: 60,
            max_interval_secs: 300,
            multiplier: 1.5,
            jitter: 0.1,
            deadline_secs: 4 * 3600,
        }
    }

    /// Queries and feature store readiness
    pub fn query() -> Self {
        Self {
            initial_interval_secs: 30,
            max_interval_secs: 300,
            multiplier: 1.5,
            jitter: 0.1,
            deadline_secs: 3600,
        }
    }

    /// Reject growth and spread factors the backoff cannot use
    pub fn validate(&self) -> Result<(), String> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!(
                "multiplier must be a finite number >= 1, got {}",
                self.multiplier
            ));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(format!("jitter must be in [0, 1), got {}", self.jitter));
        }
        Ok(())
    }
}

/// Repeats a status check until it completes, fails, or the deadline passes
pub struct Poller {
    config: PollConfig,
}

impl Poller {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    fn jittered(&self, interval: Duration) -> Duration {
        let jitter = self.config.jitter;
        // NaN is outside the range too
        if jitter == 0.0 || !(0.0..1.0).contains(&jitter) {
            return interval;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-jitter..=jitter);
        Duration::try_from_secs_f64(interval.as_secs_f64() * factor).unwrap_or(interval)
    }

    fn next_interval(&self, interval: Duration) -> Duration {
        let max = Duration::from_secs(self.config.max_interval_secs);
        let multiplier = self.config.multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            return interval.min(max);
        }
        Duration::try_from_secs_f64(interval.as_secs_f64() * multiplier)
            .unwrap_or(max)
            .min(max)
    }

    /// Poll `check` until it reports `Done`
    ///
    /// Retryable service errors count as a pending check; any other error
    /// ends the wait immediately.
    pub async fn until<T, F, Fut>(&self, what: &str, mut check: F) -> Result<T, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollStep<T>, ServiceError>>,
    {
        let start = Instant::now();
        // Too far out to represent means no deadline
        let deadline = start.checked_add(Duration::from_secs(self.config.deadline_secs));
        let mut interval = Duration::from_secs(self.config.initial_interval_secs);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            metrics::counter!("pipeline_poll_attempts_total", "what" => what.to_string()).increment(1);

            let status = match check().await {
                Ok(PollStep::Done(value)) => {
                    info!(
                        "{} finished after {} checks, elapsed {:.1}s",
                        what,
                        attempt,
                        start.elapsed().as_secs_f64()
                    );
                    return Ok(value);
                }
                Ok(PollStep::Pending(status)) => status,
                Err(err) if err.is_retryable() => {
                    warn!("{}: retryable error on check {}: {}", what, attempt, err);
                    format!("retrying after error: {}", err)
                }
                Err(err) => return Err(err.into()),
            };

            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                return Err(PollError::DeadlineExceeded {
                    what: what.to_string(),
                    elapsed: now - start,
                    last_status: status,
                });
            }

            info!(
                "{}: {} - current progress: {:.2} minutes",
                what,
                status,
                (now - start).as_secs_f64() / 60.0
            );

            let mut delay = self.jittered(interval);
            if let Some(deadline) = deadline {
                delay = delay.min(deadline - now);
            }
            debug!("{}: next check in {:?}", what, delay);
            tokio::time::sleep(delay).await;
            interval = self.next_interval(interval);
        }
    }
}
