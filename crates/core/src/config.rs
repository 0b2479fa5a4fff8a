// Engine configuration, read once at startup from the environment

use crate::port::FlagOverrides;
use std::time::Duration;

/// Concurrency ceiling (QUEUE_CONCURRENCY)
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Attempt ceiling (QUEUE_MAX_RETRIES)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Backoff base (QUEUE_RETRY_BASE_MS)
pub const DEFAULT_RETRY_BASE_MS: u64 = 500;

/// Idempotency record lifetime (IDEMPOTENCY_TTL_HOURS)
pub const DEFAULT_IDEMPOTENCY_TTL_HOURS: u64 = 24;

/// Sweep cadence (IDEMPOTENCY_SWEEP_INTERVAL_SECS)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_DB_PATH: &str = "~/.statusdesk/statusdesk.db";
pub const DEFAULT_LOG_FORMAT: &str = "pretty";

/// Job queue knobs
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// When false, jobs are recorded but never drained
    pub enabled: bool,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    /// When false, dead letters are dropped
    pub dead_letter_enabled: bool,
    /// Per-attempt deadline; `None` lets handlers run unbounded
    pub job_timeout: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_MS),
            dead_letter_enabled: true,
            job_timeout: None,
        }
    }
}

/// Idempotency layer knobs
#[derive(Debug, Clone, PartialEq)]
pub struct IdempotencyConfig {
    /// When false, every request is treated as unique
    pub enabled: bool,
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(DEFAULT_IDEMPOTENCY_TTL_HOURS * 3600),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

/// Everything the composition root needs
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub queue: QueueConfig,
    pub idempotency: IdempotencyConfig,
    pub flag_overrides: FlagOverrides,
    /// Environment name placed in flag contexts (APP_ENV)
    pub environment: String,
    pub db_path: String,
    pub log_format: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            idempotency: IdempotencyConfig::default(),
            flag_overrides: FlagOverrides::default(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            db_path: DEFAULT_DB_PATH.to_string(),
            log_format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl EngineConfig {
    /// Read the process environment
    pub fn from_env() -> Self {
        let mut config = Self::from_lookup(|name| std::env::var(name).ok());
        config.flag_overrides = FlagOverrides::from_env();
        config
    }

    /// Read variables through `lookup`; `FLAG_*` overrides are not scanned here
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let queue = QueueConfig {
            enabled: toggle(&lookup, "QUEUE_ENABLED"),
            concurrency: positive(&lookup, "QUEUE_CONCURRENCY")
                .map_or(DEFAULT_CONCURRENCY, |n| n as usize),
            max_attempts: positive(&lookup, "QUEUE_MAX_RETRIES")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            retry_base_delay: Duration::from_millis(
                positive(&lookup, "QUEUE_RETRY_BASE_MS").unwrap_or(DEFAULT_RETRY_BASE_MS),
            ),
            dead_letter_enabled: toggle(&lookup, "QUEUE_DLQ_ENABLED"),
            job_timeout: positive(&lookup, "QUEUE_JOB_TIMEOUT_MS").map(Duration::from_millis),
        };

        let idempotency = IdempotencyConfig {
            enabled: toggle(&lookup, "IDEMPOTENCY_ENABLED"),
            ttl: Duration::from_secs(
                positive(&lookup, "IDEMPOTENCY_TTL_HOURS").unwrap_or(DEFAULT_IDEMPOTENCY_TTL_HOURS)
                    * 3600,
            ),
            sweep_interval: Duration::from_secs(
                positive(&lookup, "IDEMPOTENCY_SWEEP_INTERVAL_SECS")
                    .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
            ),
        };

        Self {
            queue,
            idempotency,
            flag_overrides: FlagOverrides::default(),
            environment: lookup("APP_ENV")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            db_path: lookup("STATUSDESK_DB_PATH")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            log_format: lookup("STATUSDESK_LOG_FORMAT")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_FORMAT.to_string()),
        }
    }
}

/// Enabled unless the variable is literally `false`
fn toggle<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str) -> bool {
    lookup(name).as_deref() != Some("false")
}

/// Positive integer, `None` when unset, unparsable or zero
fn positive<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str) -> Option<u64> {
    lookup(name)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
}
