// Queue constants (no magic values)
use std::time::Duration;

/// Poll interval of `wait_idle` (10ms)
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shortest re-arm of a backoff timer that fired before its job was due (10ms)
pub const BACKOFF_REARM_FLOOR: Duration = Duration::from_millis(10);

/// Longest re-arm, so a wall clock stepping forward again is noticed (1s)
pub const BACKOFF_REARM_CEILING: Duration = Duration::from_secs(1);

/// Error recorded on a job whose type has no registered handler
pub fn missing_handler_error(job_type: &str) -> String {
    format!("No handler registered for job type \"{}\"", job_type)
}
