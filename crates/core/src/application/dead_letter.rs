// Dead-letter routing for jobs that exhausted their retries
use crate::port::{DeadLetterEntry, DeadLetterSink};
use std::sync::Arc;
use tracing::debug;

/// Forwards dead letters to the configured sink, or drops them when disabled
#[derive(Clone)]
pub struct DeadLetterQueue {
    enabled: bool,
    sink: Arc<dyn DeadLetterSink>,
}

impl DeadLetterQueue {
    pub fn new(enabled: bool, sink: Arc<dyn DeadLetterSink>) -> Self {
        Self { enabled, sink }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Never fails: the sink owns its error handling
    pub async fn send(&self, entry: DeadLetterEntry) {
        if !self.enabled {
            debug!(job_id = %entry.job_id, "Dead-letter queue disabled, dropping entry");
            return;
        }
        self.sink.send(entry).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::dead_letter_sink::MockDeadLetterSink;

    fn entry() -> DeadLetterEntry {
        DeadLetterEntry {
            job_id: "job-1".into(),
            job_type: "send-notification".into(),
            organization_id: "org-1".into(),
            actor_id: "user-1".into(),
            error: "boom".into(),
            attempts: 5,
            failed_at: 0,
        }
    }

    #[tokio::test]
    async fn test_enabled_forwards_to_sink() {
        let mut sink = MockDeadLetterSink::new();
        sink.expect_send()
            .withf(|e| e.job_id == "job-1" && e.attempts == 5)
            .times(1)
            .return_const(());

        DeadLetterQueue::new(true, Arc::new(sink)).send(entry()).await;
    }

    #[tokio::test]
    async fn test_disabled_is_noop() {
        let mut sink = MockDeadLetterSink::new();
        sink.expect_send().times(0);

        DeadLetterQueue::new(false, Arc::new(sink)).send(entry()).await;
    }
}
