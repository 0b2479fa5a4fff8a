//! Billing Packet Scenario
//!
//! Submission -> idempotency -> queue -> handler -> SQLite datastore, end to end

use serde_json::json;
use statusdesk_core::application::{
    Actor, BillingPacketRequest, DemoResetRequest, FlagEvaluator, IdempotencyService, JobQueue,
    SubmissionService,
};
use statusdesk_core::config::{IdempotencyConfig, QueueConfig};
use statusdesk_core::domain::{JobStatus, JobStatusView};
use statusdesk_core::error::AppError;
use statusdesk_core::port::id_provider::UuidProvider;
use statusdesk_core::port::time_provider::SystemTimeProvider;
use statusdesk_core::port::{Datastore, FlagOverrides, RecordFilter};
use statusdesk_handlers::{collections, register_default_handlers};
use statusdesk_infra_sqlite::{
    create_pool, run_migrations, SqliteDatastore, SqliteDeadLetterSink, SqliteIdempotencyStore,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    queue: JobQueue,
    datastore: Arc<SqliteDatastore>,
    submissions: SubmissionService,
}

async fn harness(overrides: FlagOverrides) -> Harness {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();

    let time_provider = Arc::new(SystemTimeProvider);
    let datastore = Arc::new(SqliteDatastore::new(
        pool.clone(),
        Arc::new(UuidProvider),
        time_provider.clone(),
    ));

    let queue = JobQueue::new(
        QueueConfig {
            retry_base_delay: Duration::from_millis(5),
            max_attempts: 2,
            ..QueueConfig::default()
        },
        Arc::new(SqliteDeadLetterSink::new(pool.clone())),
        time_provider.clone(),
        Arc::new(UuidProvider),
    );
    register_default_handlers(&queue, datastore.clone());

    let idempotency_config = IdempotencyConfig::default();
    let idempotency = Arc::new(IdempotencyService::new(
        &idempotency_config,
        Arc::new(SqliteIdempotencyStore::new(
            pool,
            idempotency_config.ttl,
            time_provider.clone(),
        )),
        time_provider,
    ));

    let submissions = SubmissionService::new(
        queue.clone(),
        idempotency,
        Arc::new(FlagEvaluator::new(overrides)),
        "test",
    );

    Harness {
        queue,
        datastore,
        submissions,
    }
}

fn actor() -> Actor {
    Actor::new("org-1", "user-1", "ADMIN")
}

fn march_packet(project_id: &str) -> BillingPacketRequest {
    BillingPacketRequest {
        project_id: project_id.to_string(),
        title: "March retainer".to_string(),
        period_start: "2024-03-01T00:00:00Z".to_string(),
        period_end: "2099-12-31T23:59:59Z".to_string(),
        total_hours: Some(40.0),
        total_amount: Some(6000.0),
        line_items: None,
    }
}

/// Poll until the job is terminal, then until its slot is released
async fn wait_terminal(queue: &JobQueue, job_id: &str) -> JobStatusView {
    let poll = async {
        loop {
            let view = queue.get_job_status(job_id).unwrap();
            if view.status.is_terminal() {
                queue.wait_idle().await;
                return view;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(10), poll)
        .await
        .expect("job did not reach a terminal state")
}

/// Retried request with the same key: one job, one packet
#[tokio::test]
async fn test_billing_packet_written_exactly_once() {
    let h = harness(FlagOverrides::new()).await;
    let project = h
        .datastore
        .create("org-1", collections::PROJECTS, json!({"name": "Acme"}))
        .await
        .unwrap();
    h.datastore
        .create(
            "org-1",
            collections::EVIDENCE_ARTIFACTS,
            json!({"projectId": project.id}),
        )
        .await
        .unwrap();

    let request = march_packet(&project.id);
    let first = h
        .submissions
        .request_billing_packet(&actor(), &request, Some("bill-march"))
        .await
        .unwrap();
    let retry = h
        .submissions
        .request_billing_packet(&actor(), &request, Some("bill-march"))
        .await
        .unwrap();

    assert_eq!(first.status_code, 202);
    assert_eq!(first, retry);

    let job_id = first.body["jobId"].as_str().unwrap();
    wait_terminal(&h.queue, job_id).await;
    let status = h.queue.get_job_status_for_org(job_id, "org-1").unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.attempts, 1);
    assert_eq!(h.queue.count_by_status(JobStatus::Completed), 1);

    let packets = h
        .datastore
        .find_many(
            "org-1",
            collections::BILLING_PACKETS,
            &RecordFilter::all().eq("projectId", project.id.as_str()),
        )
        .await
        .unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].data["status"], "GENERATED");
    assert_eq!(packets[0].data["generatedBy"], "user-1");
    assert_eq!(packets[0].data["evidenceIds"].as_array().unwrap().len(), 1);
}

/// Unknown project: retried then dead, no packet
#[tokio::test]
async fn test_missing_project_dead_letters() {
    let h = harness(FlagOverrides::new()).await;

    let response = h
        .submissions
        .request_billing_packet(&actor(), &march_packet("ghost"), None)
        .await
        .unwrap();

    let job_id = response.body["jobId"].as_str().unwrap();
    let status = wait_terminal(&h.queue, job_id).await;
    assert_eq!(status.status, JobStatus::Dead);
    assert_eq!(status.attempts, 2);
    assert!(status.last_error.unwrap().contains("Project ghost not found"));

    // Other tenants cannot see the job
    assert!(matches!(
        h.queue.get_job_status_for_org(job_id, "org-2"),
        Err(AppError::NotFound(_))
    ));
}

/// Gates: billing off and demo off by default
#[tokio::test]
async fn test_flag_gates() {
    let h = harness(FlagOverrides::new().with("billing_packet_enabled", "false")).await;

    let err = h
        .submissions
        .request_billing_packet(&actor(), &march_packet("p"), Some("k"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    let err = h
        .submissions
        .reset_demo(&actor(), &DemoResetRequest::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(h.queue.count_by_status(JobStatus::Pending), 0);
}

/// Demo reset end to end once the flag is on
#[tokio::test]
async fn test_demo_reset_clears_demo_collections() {
    let h = harness(FlagOverrides::new().with("demo_mode_enabled", "true")).await;
    for _ in 0..3 {
        h.datastore
            .create("org-1", collections::DEMO_EVENTS, json!({"kind": "view"}))
            .await
            .unwrap();
    }
    h.datastore
        .create("org-2", collections::DEMO_EVENTS, json!({"kind": "view"}))
        .await
        .unwrap();

    let response = h
        .submissions
        .reset_demo(&actor(), &DemoResetRequest::default(), None)
        .await
        .unwrap();
    let job_id = response.body["jobId"].as_str().unwrap();
    assert_eq!(wait_terminal(&h.queue, job_id).await.status, JobStatus::Completed);

    let remaining = |org: &'static str| {
        let store = h.datastore.clone();
        async move {
            store
                .find_many(org, collections::DEMO_EVENTS, &RecordFilter::all())
                .await
                .unwrap()
                .len()
        }
    };
    assert_eq!(remaining("org-1").await, 0);
    assert_eq!(remaining("org-2").await, 1);
}
