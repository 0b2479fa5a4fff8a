// Panic isolation: a panicking handler must not take the queue down
use std::any::Any;
use tokio::task::JoinError;
use tracing::error;

/// Human-readable message of a captured panic payload
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Turn a failed join of the handler task into an attempt error
pub fn join_error_message(job_id: &str, err: JoinError) -> String {
    if err.is_panic() {
        let msg = panic_message(err.into_panic());
        error!(job_id = %job_id, panic_msg = %msg, "Job handler panicked");
        format!("Handler panicked: {}", msg)
    } else {
        format!("Handler task cancelled: {}", err)
    }
}
