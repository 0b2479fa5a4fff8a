// Job Queue - in-process scheduler with bounded concurrency, retry and dead-lettering

pub mod constants;
mod panic_guard;
mod registry;

pub use registry::HandlerRegistry;

use crate::application::dead_letter::DeadLetterQueue;
use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::config::QueueConfig;
use crate::domain::{JobId, JobPayload, JobRecord, JobStatus, JobStatusView, JobType};
use crate::error::{AppError, Result};
use crate::port::{DeadLetterEntry, DeadLetterSink, IdProvider, JobHandler, TimeProvider};
use constants::{
    missing_handler_error, BACKOFF_REARM_CEILING, BACKOFF_REARM_FLOOR, IDLE_POLL_INTERVAL,
};
use panic_guard::join_error_message;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Mutable scheduler state; only touched under the mutex, never across an await
#[derive(Default)]
struct QueueState {
    jobs: HashMap<JobId, JobRecord>,
    /// Non-terminal job ids in enqueue order
    active: Vec<JobId>,
    running: usize,
}

impl QueueState {
    fn retire(&mut self, job_id: &str) {
        self.active.retain(|id| id != job_id);
        self.running = self.running.saturating_sub(1);
    }
}

struct Inner {
    state: Mutex<QueueState>,
    registry: HandlerRegistry,
    retry_policy: RetryPolicy,
    dead_letters: DeadLetterQueue,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    config: QueueConfig,
}

/// How one handler invocation ended
enum AttemptOutcome {
    Succeeded,
    Failed(String),
}

/// Async job queue
///
/// Cheap to clone; every clone drives the same state. Jobs live in memory for
/// the lifetime of the process.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

impl JobQueue {
    pub fn new(
        config: QueueConfig,
        dead_letter_sink: Arc<dyn DeadLetterSink>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                registry: HandlerRegistry::new(),
                retry_policy: RetryPolicy::from_config(&config),
                dead_letters: DeadLetterQueue::new(config.dead_letter_enabled, dead_letter_sink),
                time_provider,
                id_provider,
                config,
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    pub fn register_handler(&self, handler: Arc<dyn JobHandler>) {
        self.inner.registry.register(handler);
    }

    pub fn register_handlers<I>(&self, handlers: I)
    where
        I: IntoIterator<Item = Arc<dyn JobHandler>>,
    {
        for handler in handlers {
            self.register_handler(handler);
        }
    }

    pub fn registered_job_types(&self) -> Vec<JobType> {
        self.inner.registry.job_types()
    }

    /// Record a pending job and kick a drain
    ///
    /// Returns as soon as the job is recorded; execution happens in the
    /// background and its outcome is only visible through status lookups.
    ///
    /// # Errors
    /// `AppError::Validation` when the payload lacks its tenant or actor.
    pub async fn enqueue(
        &self,
        job_type: impl Into<JobType>,
        payload: JobPayload,
        idempotency_key: Option<String>,
    ) -> Result<JobRecord> {
        payload
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let now = self.inner.time_provider.now_millis();
        let mut job = JobRecord::new(
            self.inner.id_provider.generate_id(),
            now,
            job_type.into(),
            payload,
            self.inner.retry_policy.max_attempts(),
        );
        job.idempotency_key = idempotency_key;

        {
            let mut state = self.state();
            state.active.push(job.id.clone());
            state.jobs.insert(job.id.clone(), job.clone());
        }

        info!(
            job_id = %job.id,
            job_type = %job.job_type,
            organization_id = %job.organization_id(),
            "Job enqueued"
        );

        self.drain();
        Ok(job)
    }

    /// # Errors
    /// `AppError::NotFound` for an unknown id
    pub fn get_job_status(&self, job_id: &str) -> Result<JobStatusView> {
        self.state()
            .jobs
            .get(job_id)
            .map(JobStatusView::from)
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))
    }

    /// Like `get_job_status`, but jobs of other organizations read as not found
    pub fn get_job_status_for_org(
        &self,
        job_id: &str,
        organization_id: &str,
    ) -> Result<JobStatusView> {
        self.state()
            .jobs
            .get(job_id)
            .filter(|job| job.organization_id() == organization_id)
            .map(JobStatusView::from)
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))
    }

    pub fn count_by_status(&self, status: JobStatus) -> usize {
        self.state()
            .jobs
            .values()
            .filter(|job| job.status == status)
            .count()
    }

    /// Resolve once nothing is running and no pending job is due
    ///
    /// Jobs waiting out a backoff delay do not keep the queue busy. With the
    /// queue disabled only running jobs are considered.
    pub async fn wait_idle(&self) {
        while !self.is_idle() {
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    fn is_idle(&self) -> bool {
        let now = self.inner.time_provider.now_millis();
        let state = self.state();
        if state.running > 0 {
            return false;
        }
        !self.inner.config.enabled
            || !state
                .active
                .iter()
                .filter_map(|id| state.jobs.get(id))
                .any(|job| job.is_due(now))
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Promote due pending jobs to running, up to the concurrency ceiling
    fn drain(&self) {
        if !self.inner.config.enabled {
            debug!("Queue processing disabled, skipping drain");
            return;
        }

        let now = self.inner.time_provider.now_millis();
        let mut picked = Vec::new();
        {
            let mut guard = self.state();
            let state = &mut *guard;
            while state.running < self.inner.config.concurrency {
                let next = state
                    .active
                    .iter()
                    .find(|id| state.jobs.get(*id).is_some_and(|job| job.is_due(now)))
                    .cloned();
                let Some(job_id) = next else {
                    break;
                };
                let Some(job) = state.jobs.get_mut(&job_id) else {
                    break;
                };
                if let Err(e) = job.start(now) {
                    warn!(job_id = %job_id, error = %e, "Could not start job");
                    break;
                }
                state.running += 1;
                picked.push(job_id);
            }
        }

        for job_id in picked {
            let queue = self.clone();
            tokio::spawn(async move { queue.execute(job_id).await });
        }
    }

    async fn execute(self, job_id: JobId) {
        let Some((job_type, payload)) = self
            .state()
            .jobs
            .get(&job_id)
            .map(|job| (job.job_type.clone(), job.payload.clone()))
        else {
            return;
        };

        let Some(handler) = self.inner.registry.get(&job_type) else {
            let message = missing_handler_error(job_type.as_str());
            {
                let mut state = self.state();
                if let Some(job) = state.jobs.get_mut(&job_id) {
                    if let Err(e) = job.fail(message.clone()) {
                        warn!(job_id = %job_id, error = %e, "Could not mark job failed");
                    }
                }
                state.retire(&job_id);
            }
            error!(job_id = %job_id, job_type = %job_type, error = %message, "Job failed");
            self.drain();
            return;
        };

        let attempt = {
            let mut state = self.state();
            state.jobs.get_mut(&job_id).map(JobRecord::begin_attempt)
        };
        let attempt = match attempt {
            Some(Ok(n)) => n,
            Some(Err(e)) => {
                self.finish(&job_id, AttemptOutcome::Failed(e.to_string()))
                    .await;
                return;
            }
            None => return,
        };

        info!(
            job_id = %job_id,
            job_type = %job_type,
            attempt,
            "Processing job"
        );

        let outcome = self.run_handler(handler, payload, &job_id).await;
        self.finish(&job_id, outcome).await;
    }

    /// Run the handler on its own task so a panic surfaces as a join error
    async fn run_handler(
        &self,
        handler: Arc<dyn JobHandler>,
        payload: JobPayload,
        job_id: &str,
    ) -> AttemptOutcome {
        let task_job_id = job_id.to_string();
        let mut task =
            tokio::spawn(async move { handler.handle(&payload, &task_job_id).await });

        let joined = match self.inner.config.job_timeout {
            None => (&mut task).await,
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    let ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                    return AttemptOutcome::Failed(AppError::Timeout(ms).to_string());
                }
            },
        };

        match joined {
            Ok(Ok(())) => AttemptOutcome::Succeeded,
            Ok(Err(e)) => AttemptOutcome::Failed(e.to_string()),
            Err(join_err) => AttemptOutcome::Failed(join_error_message(job_id, join_err)),
        }
    }

    /// Apply the outcome of an attempt, then drain again
    async fn finish(&self, job_id: &str, outcome: AttemptOutcome) {
        let now = self.inner.time_provider.now_millis();
        let mut dead_letter = None;
        let mut retry_after = None;

        {
            let mut guard = self.state();
            let state = &mut *guard;
            let Some(job) = state.jobs.get_mut(job_id) else {
                state.retire(job_id);
                return;
            };

            match outcome {
                AttemptOutcome::Succeeded => {
                    if let Err(e) = job.complete(now) {
                        warn!(job_id = %job_id, error = %e, "Could not mark job completed");
                    }
                    info!(
                        job_id = %job_id,
                        job_type = %job.job_type,
                        attempts = job.attempts,
                        "Job completed"
                    );
                    state.retire(job_id);
                }
                AttemptOutcome::Failed(message) => match self.inner.retry_policy.decide(job) {
                    RetryDecision::Retry(delay) => {
                        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
                        if let Err(e) =
                            job.schedule_retry(message.clone(), now.saturating_add(delay_ms))
                        {
                            warn!(job_id = %job_id, error = %e, "Could not schedule retry");
                        }
                        warn!(
                            job_id = %job_id,
                            job_type = %job.job_type,
                            attempt = job.attempts,
                            delay_ms,
                            error = %message,
                            "Job failed, retry scheduled"
                        );
                        state.running = state.running.saturating_sub(1);
                        retry_after = Some(delay);
                    }
                    RetryDecision::Exhausted => {
                        if let Err(e) = job.bury(message.clone()) {
                            warn!(job_id = %job_id, error = %e, "Could not mark job dead");
                        }
                        error!(
                            job_id = %job_id,
                            job_type = %job.job_type,
                            organization_id = %job.organization_id(),
                            attempts = job.attempts,
                            error = %message,
                            "Job moved to dead-letter queue"
                        );
                        dead_letter = Some(DeadLetterEntry::from_job(job, message, now));
                        // Slot is released once the sink has the entry
                        state.active.retain(|id| id != job_id);
                    }
                },
            }
        }

        if let Some(entry) = dead_letter {
            self.inner.dead_letters.send(entry).await;
            let mut state = self.state();
            state.running = state.running.saturating_sub(1);
        }
        if let Some(delay) = retry_after {
            self.schedule_drain(job_id, delay);
        }
        self.drain();
    }

    /// Backoff timer: only a drain trigger, any earlier drain may pick the job up
    ///
    /// The timer sleeps on the monotonic clock while due-ness is judged by the
    /// time provider; if the job is still not due after a drain, sleep again.
    fn schedule_drain(&self, job_id: &str, delay: Duration) {
        let queue = self.clone();
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            let mut delay = delay;
            loop {
                tokio::time::sleep(delay).await;
                queue.drain();
                match queue.remaining_backoff(&job_id) {
                    Some(remaining) => {
                        debug!(
                            job_id = %job_id,
                            remaining_ms = remaining.as_millis() as u64,
                            "Retry not due yet, re-arming timer"
                        );
                        delay = remaining;
                    }
                    None => break,
                }
            }
        });
    }

    /// Next re-arm delay for a pending job; `None` once due or no longer pending
    fn remaining_backoff(&self, job_id: &str) -> Option<Duration> {
        let now = self.inner.time_provider.now_millis();
        let state = self.state();
        let job = state.jobs.get(job_id)?;
        if job.status != JobStatus::Pending || job.is_due(now) {
            return None;
        }
        let remaining_ms = u64::try_from(job.scheduled_at.saturating_sub(now)).unwrap_or(0);
        Some(Duration::from_millis(remaining_ms).clamp(BACKOFF_REARM_FLOOR, BACKOFF_REARM_CEILING))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::dead_letter_sink::mocks::RecordingDeadLetterSink;
    use crate::port::dead_letter_sink::MockDeadLetterSink;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::job_handler::mocks::{MockBehavior, MockJobHandler};
    use crate::port::time_provider::mocks::MockTimeProvider;
    use crate::port::time_provider::SystemTimeProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TEST_TYPE: &str = "test-job";

    fn fast_config() -> QueueConfig {
        QueueConfig {
            retry_base_delay: Duration::from_millis(1),
            ..QueueConfig::default()
        }
    }

    fn queue_with(config: QueueConfig, sink: Arc<dyn DeadLetterSink>) -> JobQueue {
        JobQueue::new(
            config,
            sink,
            Arc::new(SystemTimeProvider),
            Arc::new(SequentialIdProvider::new("job")),
        )
    }

    fn payload() -> JobPayload {
        JobPayload::new("org-1", "user-1").with("projectId", "p-1")
    }

    async fn wait_terminal(queue: &JobQueue, job_id: &str) -> JobStatusView {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let view = queue.get_job_status(job_id).unwrap();
                if view.status.is_terminal() {
                    return view;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job did not reach a terminal state")
    }

    #[tokio::test]
    async fn test_enqueue_returns_pending_job() {
        let config = QueueConfig {
            enabled: false,
            ..fast_config()
        };
        let queue = queue_with(config, Arc::new(RecordingDeadLetterSink::new()));

        let job = queue
            .enqueue(TEST_TYPE, payload(), Some("idem-1".into()))
            .await
            .unwrap();

        assert_eq!(job.id, "job-1");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.max_attempts, 5);
        assert_eq!(job.idempotency_key.as_deref(), Some("idem-1"));
    }

    #[tokio::test]
    async fn test_enqueue_rejects_missing_identity() {
        let queue = queue_with(fast_config(), Arc::new(RecordingDeadLetterSink::new()));
        let err = queue
            .enqueue(TEST_TYPE, JobPayload::new("", "user-1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_successful_job_completes() {
        let queue = queue_with(fast_config(), Arc::new(RecordingDeadLetterSink::new()));
        let handler = MockJobHandler::new_success(TEST_TYPE);
        let calls = handler.counter();
        queue.register_handler(Arc::new(handler));

        let job = queue.enqueue(TEST_TYPE, payload(), None).await.unwrap();
        let view = wait_terminal(&queue, &job.id).await;

        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!(view.attempts, 1);
        assert!(view.completed_at.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_flaky_job_succeeds_after_retries() {
        let sink = Arc::new(RecordingDeadLetterSink::new());
        let queue = queue_with(fast_config(), sink.clone());
        queue.register_handler(Arc::new(MockJobHandler::new_flaky(TEST_TYPE, 2)));

        let job = queue.enqueue(TEST_TYPE, payload(), None).await.unwrap();
        let view = wait_terminal(&queue, &job.id).await;

        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!(view.attempts, 3);
        assert!(sink.entries().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_job_is_dead_lettered_once() {
        let mut sink = MockDeadLetterSink::new();
        sink.expect_send()
            .withf(|entry| {
                entry.job_id == "job-1"
                    && entry.attempts == 3
                    && entry.organization_id == "org-1"
                    && entry.error.contains("always broken")
            })
            .times(1)
            .return_const(());

        let config = QueueConfig {
            max_attempts: 3,
            ..fast_config()
        };
        let queue = queue_with(config, Arc::new(sink));
        let handler = MockJobHandler::new_fail(TEST_TYPE, "always broken");
        let calls = handler.counter();
        queue.register_handler(Arc::new(handler));

        let job = queue.enqueue(TEST_TYPE, payload(), None).await.unwrap();
        let view = wait_terminal(&queue, &job.id).await;
        queue.wait_idle().await;

        assert_eq!(view.status, JobStatus::Dead);
        assert_eq!(view.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(view.last_error.unwrap().contains("always broken"));
    }

    #[tokio::test]
    async fn test_dead_letter_disabled_drops_entry() {
        let mut sink = MockDeadLetterSink::new();
        sink.expect_send().times(0);

        let config = QueueConfig {
            max_attempts: 1,
            dead_letter_enabled: false,
            ..fast_config()
        };
        let queue = queue_with(config, Arc::new(sink));
        queue.register_handler(Arc::new(MockJobHandler::new_fail(TEST_TYPE, "nope")));

        let job = queue.enqueue(TEST_TYPE, payload(), None).await.unwrap();
        assert_eq!(wait_terminal(&queue, &job.id).await.status, JobStatus::Dead);
    }

    #[tokio::test]
    async fn test_missing_handler_fails_without_retry() {
        let sink = Arc::new(RecordingDeadLetterSink::new());
        let queue = queue_with(fast_config(), sink.clone());

        let job = queue
            .enqueue("unregistered-type", payload(), None)
            .await
            .unwrap();
        let view = wait_terminal(&queue, &job.id).await;

        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.attempts, 0);
        assert_eq!(
            view.last_error.as_deref(),
            Some("No handler registered for job type \"unregistered-type\"")
        );
        assert!(sink.entries().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_handler_counts_as_failure() {
        let sink = Arc::new(RecordingDeadLetterSink::new());
        let config = QueueConfig {
            max_attempts: 2,
            ..fast_config()
        };
        let queue = queue_with(config, sink.clone());
        queue.register_handler(Arc::new(MockJobHandler::new(
            TEST_TYPE,
            MockBehavior::Panic("handler exploded".into()),
        )));

        let job = queue.enqueue(TEST_TYPE, payload(), None).await.unwrap();
        let view = wait_terminal(&queue, &job.id).await;
        queue.wait_idle().await;

        assert_eq!(view.status, JobStatus::Dead);
        assert_eq!(view.attempts, 2);
        assert!(view.last_error.unwrap().contains("handler exploded"));
        assert_eq!(sink.count_for(&job.id), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let sink = Arc::new(RecordingDeadLetterSink::new());
        let config = QueueConfig {
            max_attempts: 1,
            job_timeout: Some(Duration::from_millis(20)),
            ..fast_config()
        };
        let queue = queue_with(config, sink.clone());
        queue.register_handler(Arc::new(MockJobHandler::new(
            TEST_TYPE,
            MockBehavior::Sleep(Duration::from_secs(5)),
        )));

        let job = queue.enqueue(TEST_TYPE, payload(), None).await.unwrap();
        let view = wait_terminal(&queue, &job.id).await;

        assert_eq!(view.status, JobStatus::Dead);
        assert_eq!(view.last_error.as_deref(), Some("Timed out after 20ms"));
    }

    /// Tracks the highest number of simultaneous invocations
    struct GaugeHandler {
        current: AtomicUsize,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl JobHandler for GaugeHandler {
        fn job_type(&self) -> JobType {
            JobType::new(TEST_TYPE)
        }

        async fn handle(&self, _payload: &JobPayload, _job_id: &str) -> Result<()> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_respected() {
        let config = QueueConfig {
            concurrency: 2,
            ..fast_config()
        };
        let queue = queue_with(config, Arc::new(RecordingDeadLetterSink::new()));
        let peak = Arc::new(AtomicUsize::new(0));
        queue.register_handler(Arc::new(GaugeHandler {
            current: AtomicUsize::new(0),
            peak: peak.clone(),
        }));

        let ids: Vec<JobId> =
            futures::future::join_all((0..6).map(|_| queue.enqueue(TEST_TYPE, payload(), None)))
                .await
                .into_iter()
                .map(|job| job.unwrap().id)
                .collect();
        assert!(queue.count_by_status(JobStatus::Running) <= 2);

        for id in &ids {
            assert_eq!(wait_terminal(&queue, id).await.status, JobStatus::Completed);
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(queue.count_by_status(JobStatus::Completed), 6);
    }

    #[tokio::test]
    async fn test_disabled_queue_keeps_jobs_pending() {
        let config = QueueConfig {
            enabled: false,
            ..fast_config()
        };
        let queue = queue_with(config, Arc::new(RecordingDeadLetterSink::new()));
        let handler = MockJobHandler::new_success(TEST_TYPE);
        let calls = handler.counter();
        queue.register_handler(Arc::new(handler));

        let job = queue.enqueue(TEST_TYPE, payload(), None).await.unwrap();
        queue.wait_idle().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(queue.get_job_status(&job.id).unwrap().status, JobStatus::Pending);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backoff_delays_retry_until_due() {
        // Frozen clock: a retried job never becomes due
        let clock = Arc::new(MockTimeProvider::new(1_000));
        let queue = JobQueue::new(
            fast_config(),
            Arc::new(RecordingDeadLetterSink::new()),
            clock.clone(),
            Arc::new(SequentialIdProvider::new("job")),
        );
        let handler = MockJobHandler::new_flaky(TEST_TYPE, 1);
        let calls = handler.counter();
        queue.register_handler(Arc::new(handler));

        let job = queue.enqueue(TEST_TYPE, payload(), None).await.unwrap();
        queue.wait_idle().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let view = queue.get_job_status(&job.id).unwrap();
        assert_eq!(view.status, JobStatus::Pending);
        assert_eq!(view.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Time passes; the re-armed backoff timer picks it up on its own
        clock.advance(60_000);
        assert_eq!(wait_terminal(&queue, &job.id).await.status, JobStatus::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_backoff_timer_survives_clock_stepping_back() {
        let clock = Arc::new(MockTimeProvider::new(100_000));
        let queue = JobQueue::new(
            fast_config(),
            Arc::new(RecordingDeadLetterSink::new()),
            clock.clone(),
            Arc::new(SequentialIdProvider::new("job")),
        );
        queue.register_handler(Arc::new(MockJobHandler::new_flaky(TEST_TYPE, 1)));

        let job = queue.enqueue(TEST_TYPE, payload(), None).await.unwrap();
        queue.wait_idle().await;
        // Wall clock jumps back a minute while the retry waits
        clock.set(40_000);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(queue.get_job_status(&job.id).unwrap().status, JobStatus::Pending);

        clock.set(100_100);
        let view = wait_terminal(&queue, &job.id).await;
        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!(view.attempts, 2);
    }

    #[tokio::test]
    async fn test_status_lookup_scoping() {
        let config = QueueConfig {
            enabled: false,
            ..fast_config()
        };
        let queue = queue_with(config, Arc::new(RecordingDeadLetterSink::new()));
        let job = queue.enqueue(TEST_TYPE, payload(), None).await.unwrap();

        assert!(matches!(
            queue.get_job_status("unknown"),
            Err(AppError::NotFound(_))
        ));
        assert!(queue.get_job_status_for_org(&job.id, "org-1").is_ok());
        assert!(matches!(
            queue.get_job_status_for_org(&job.id, "org-2"),
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_register_handlers_batch() {
        let queue = queue_with(fast_config(), Arc::new(RecordingDeadLetterSink::new()));
        queue.register_handlers([
            Arc::new(MockJobHandler::new_success("b")) as Arc<dyn JobHandler>,
            Arc::new(MockJobHandler::new_success("a")) as Arc<dyn JobHandler>,
        ]);
        assert_eq!(
            queue.registered_job_types(),
            vec![JobType::new("a"), JobType::new("b")]
        );
    }
}
