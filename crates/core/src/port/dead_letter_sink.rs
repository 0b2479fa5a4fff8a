// Dead-Letter Sink Port
// Write-only terminal path for jobs that exhausted their retries

use crate::domain::{JobId, JobRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Full failure context of a dead job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterEntry {
    pub job_id: JobId,
    #[serde(rename = "type")]
    pub job_type: String,
    pub organization_id: String,
    pub actor_id: String,
    pub error: String,
    pub attempts: u32,
    /// Epoch ms
    pub failed_at: i64,
}

impl DeadLetterEntry {
    pub fn from_job(job: &JobRecord, error: impl Into<String>, failed_at: i64) -> Self {
        Self {
            job_id: job.id.clone(),
            job_type: job.job_type.to_string(),
            organization_id: job.payload.organization_id.clone(),
            actor_id: job.payload.actor_id.clone(),
            error: error.into(),
            attempts: job.attempts,
            failed_at,
        }
    }
}

/// Dead-letter sink
///
/// `send` has no error channel: implementations log and swallow their own
/// failures so the queue's error path can never crash.
///
/// Implementations:
/// - LogDeadLetterSink (this module)
/// - SqliteDeadLetterSink (statusdesk-infra-sqlite)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn send(&self, entry: DeadLetterEntry);
}

/// Emits one structured `error` event per dead letter for log-based alerting
pub struct LogDeadLetterSink;

#[async_trait]
impl DeadLetterSink for LogDeadLetterSink {
    async fn send(&self, entry: DeadLetterEntry) {
        let failed_at = chrono::DateTime::from_timestamp_millis(entry.failed_at)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();

        error!(
            target: "statusdesk::dlq",
            job_id = %entry.job_id,
            job_type = %entry.job_type,
            organization_id = %entry.organization_id,
            actor_id = %entry.actor_id,
            error = %entry.error,
            attempts = entry.attempts,
            failed_at = %failed_at,
            "Dead letter"
        );
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every entry in memory
    #[derive(Default)]
    pub struct RecordingDeadLetterSink {
        entries: Mutex<Vec<DeadLetterEntry>>,
    }

    impl RecordingDeadLetterSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn entries(&self) -> Vec<DeadLetterEntry> {
            self.entries.lock().unwrap().clone()
        }

        pub fn count_for(&self, job_id: &str) -> usize {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.job_id == job_id)
                .count()
        }
    }

    #[async_trait]
    impl DeadLetterSink for RecordingDeadLetterSink {
        async fn send(&self, entry: DeadLetterEntry) {
            self.entries.lock().unwrap().push(entry);
        }
    }
}
