// Retry logic: eligibility and exponential backoff with jitter
use crate::config::QueueConfig;
use crate::domain::JobRecord;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the job after the backoff delay
    Retry(Duration),
    /// Attempt budget exhausted
    Exhausted,
}

/// Retry policy
///
/// Attempt counters on jobs are 1-based (incremented before the handler runs),
/// while the backoff exponent is 0-based: the retry following attempt `n`
/// waits `retry_delay(n - 1)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_attempts: u32,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `base_delay` - Backoff base (default: 500ms)
    /// * `max_attempts` - Default attempt ceiling (default: 5)
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.retry_base_delay, config.max_attempts)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Eligible while `attempts_so_far < max_attempts`
    pub fn should_retry(&self, attempts_so_far: u32, max_attempts: Option<u32>) -> bool {
        attempts_so_far < max_attempts.unwrap_or(self.max_attempts)
    }

    /// Deterministic part of the delay: `base * 2^attempt_number` (saturating)
    pub fn base_component(&self, attempt_number: u32) -> Duration {
        let base_ms = self.base_ms();
        let factor = 1u64.checked_shl(attempt_number).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(factor))
    }

    /// `base * 2^attempt_number + jitter`, jitter uniform in `[0, base)`
    ///
    /// Non-deterministic on purpose: jobs failing together (downstream outage)
    /// spread their retries instead of stampeding.
    pub fn retry_delay(&self, attempt_number: u32) -> Duration {
        let base_ms = self.base_ms();
        let jitter_ms = if base_ms > 0 {
            rand::thread_rng().gen_range(0..base_ms)
        } else {
            0
        };
        self.base_component(attempt_number)
            .saturating_add(Duration::from_millis(jitter_ms))
    }

    /// Decide what happens after a failed attempt of `job`
    pub fn decide(&self, job: &JobRecord) -> RetryDecision {
        if !self.should_retry(job.attempts, Some(job.max_attempts)) {
            warn!(
                job_id = %job.id,
                attempts = job.attempts,
                max_attempts = job.max_attempts,
                "Max retry attempts reached"
            );
            return RetryDecision::Exhausted;
        }

        let delay = self.retry_delay(job.attempts.saturating_sub(1));

        info!(
            job_id = %job.id,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling retry"
        );

        RetryDecision::Retry(delay)
    }

    fn base_ms(&self) -> u64 {
        u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}
