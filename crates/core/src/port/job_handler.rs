// Job Handler Port
// Execution logic for one job type, looked up by the queue's registry

use crate::domain::{JobPayload, JobType};
use crate::error::Result;
use async_trait::async_trait;

/// Job handler trait
///
/// Implementations:
/// - GenerateBillingPacketHandler, SendNotificationHandler, ResetDemoSnapshotHandler
///   (statusdesk-handlers)
///
/// Delivery is at-least-once: a handler may run again for the same job after a
/// failure, so its side effects must tolerate repetition.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Registry key
    fn job_type(&self) -> JobType;

    /// Execute the job
    ///
    /// # Errors
    /// Any error is captured by the queue and counted as a failed attempt.
    async fn handle(&self, payload: &JobPayload, job_id: &str) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock handler behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Always fail with message
        Fail(String),
        /// Fail the first N calls, then succeed
        FailTimes(u32),
        /// Panic with message (for panic isolation testing)
        Panic(String),
        /// Sleep before succeeding
        Sleep(Duration),
    }

    /// Mock Job Handler for testing
    pub struct MockJobHandler {
        job_type: JobType,
        behavior: MockBehavior,
        call_count: Arc<AtomicU32>,
        seen_jobs: Arc<Mutex<Vec<String>>>,
    }

    impl MockJobHandler {
        pub fn new(job_type: impl Into<String>, behavior: MockBehavior) -> Self {
            Self {
                job_type: JobType::new(job_type),
                behavior,
                call_count: Arc::new(AtomicU32::new(0)),
                seen_jobs: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_success(job_type: impl Into<String>) -> Self {
            Self::new(job_type, MockBehavior::Success)
        }

        pub fn new_fail(job_type: impl Into<String>, message: impl Into<String>) -> Self {
            Self::new(job_type, MockBehavior::Fail(message.into()))
        }

        pub fn new_flaky(job_type: impl Into<String>, failures: u32) -> Self {
            Self::new(job_type, MockBehavior::FailTimes(failures))
        }

        pub fn call_count(&self) -> u32 {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Shared counter, readable after the handler moved into the registry
        pub fn counter(&self) -> Arc<AtomicU32> {
            Arc::clone(&self.call_count)
        }

        pub fn seen_jobs(&self) -> Vec<String> {
            self.seen_jobs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobHandler for MockJobHandler {
        fn job_type(&self) -> JobType {
            self.job_type.clone()
        }

        async fn handle(&self, _payload: &JobPayload, job_id: &str) -> Result<()> {
            let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen_jobs.lock().unwrap().push(job_id.to_string());

            match &self.behavior {
                MockBehavior::Success => Ok(()),
                MockBehavior::Fail(msg) => Err(AppError::Handler(msg.clone())),
                MockBehavior::FailTimes(n) if call <= *n => {
                    Err(AppError::Handler(format!("transient failure #{}", call)))
                }
                MockBehavior::FailTimes(_) => Ok(()),
                MockBehavior::Panic(msg) => panic!("{}", msg),
                MockBehavior::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(())
                }
            }
        }
    }
}
