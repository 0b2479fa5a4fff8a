// Submission Service - job-triggering use cases
// flag gate -> idempotency -> enqueue, answering 202 {jobId, status}

use crate::application::flags::FlagEvaluator;
use crate::application::idempotency::IdempotencyService;
use crate::application::queue::JobQueue;
use crate::domain::{FlagContext, FlagKey, JobId, JobPayload, JobStatus, JobType, MutationResponse};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Longest accepted billing packet title
pub const MAX_TITLE_LEN: usize = 500;

/// Acting identity of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub organization_id: String,
    pub user_id: String,
    pub role: String,
}

impl Actor {
    pub fn new(
        organization_id: impl Into<String>,
        user_id: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            user_id: user_id.into(),
            role: role.into(),
        }
    }

    pub fn flag_context(&self, environment: &str) -> FlagContext {
        FlagContext::for_actor(
            self.organization_id.as_str(),
            self.user_id.as_str(),
            self.role.as_str(),
            environment,
        )
    }

    fn payload(&self) -> JobPayload {
        JobPayload::new(self.organization_id.as_str(), self.user_id.as_str())
    }
}

/// `{jobId, status}` answer of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReceipt {
    pub job_id: JobId,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
    pub amount: f64,
}

/// Billing packet generation request (also the job's data fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingPacketRequest {
    pub project_id: String,
    pub title: String,
    /// RFC 3339
    pub period_start: String,
    /// RFC 3339
    pub period_end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_items: Option<Vec<LineItem>>,
}

impl BillingPacketRequest {
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(AppError::Validation("projectId is required".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("title is required".to_string()));
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::Validation(format!(
                "title is longer than {} characters",
                MAX_TITLE_LEN
            )));
        }
        for (name, value) in [("totalHours", self.total_hours), ("totalAmount", self.total_amount)] {
            if value.is_some_and(|v| v.is_nan() || v <= 0.0) {
                return Err(AppError::Validation(format!("{} must be positive", name)));
            }
        }
        let (start, end) = self.period_millis()?;
        if start > end {
            return Err(AppError::Validation(
                "periodStart must not be after periodEnd".to_string(),
            ));
        }
        Ok(())
    }

    /// Billing period as inclusive epoch-millisecond bounds
    pub fn period_millis(&self) -> Result<(i64, i64)> {
        Ok((
            parse_instant("periodStart", &self.period_start)?,
            parse_instant("periodEnd", &self.period_end)?,
        ))
    }
}

fn parse_instant(field: &str, value: &str) -> Result<i64> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| AppError::Validation(format!("{} is not an RFC 3339 datetime: {}", field, e)))
}

/// In-app notification delivery request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl NotificationRequest {
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(AppError::Validation("userId is required".to_string()));
        }
        if self.notification_type.trim().is_empty() {
            return Err(AppError::Validation("type is required".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("title is required".to_string()));
        }
        Ok(())
    }
}

/// Demo tenant reset request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoResetRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,
}

/// Submission Service
pub struct SubmissionService {
    queue: JobQueue,
    idempotency: Arc<IdempotencyService>,
    flags: Arc<FlagEvaluator>,
    environment: String,
}

impl SubmissionService {
    pub fn new(
        queue: JobQueue,
        idempotency: Arc<IdempotencyService>,
        flags: Arc<FlagEvaluator>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            idempotency,
            flags,
            environment: environment.into(),
        }
    }

    /// Enqueue and answer with the receipt
    pub async fn enqueue_job(
        &self,
        job_type: impl Into<JobType>,
        payload: JobPayload,
        idempotency_key: Option<&str>,
    ) -> Result<JobReceipt> {
        let record = self
            .queue
            .enqueue(job_type, payload, idempotency_key.map(str::to_string))
            .await?;
        Ok(JobReceipt {
            job_id: record.id,
            status: record.status,
        })
    }

    /// Gated by `billing_packet_enabled`
    pub async fn request_billing_packet(
        &self,
        actor: &Actor,
        request: &BillingPacketRequest,
        idempotency_key: Option<&str>,
    ) -> Result<MutationResponse> {
        self.flags
            .require_flag(
                FlagKey::BillingPacketEnabled,
                &actor.flag_context(&self.environment),
            )
            .await?;
        request.validate()?;

        let payload = actor.payload().with_fields(request)?;
        self.submit(
            actor,
            JobType::GENERATE_BILLING_PACKET,
            payload,
            idempotency_key,
        )
        .await
    }

    pub async fn send_notification(
        &self,
        actor: &Actor,
        request: &NotificationRequest,
        idempotency_key: Option<&str>,
    ) -> Result<MutationResponse> {
        request.validate()?;

        let payload = actor.payload().with_fields(request)?;
        self.submit(actor, JobType::SEND_NOTIFICATION, payload, idempotency_key)
            .await
    }

    /// Gated by `demo_mode_enabled`
    pub async fn reset_demo(
        &self,
        actor: &Actor,
        request: &DemoResetRequest,
        idempotency_key: Option<&str>,
    ) -> Result<MutationResponse> {
        self.flags
            .require_flag(
                FlagKey::DemoModeEnabled,
                &actor.flag_context(&self.environment),
            )
            .await?;

        let payload = actor.payload().with_fields(request)?;
        self.submit(actor, JobType::RESET_DEMO_SNAPSHOT, payload, idempotency_key)
            .await
    }

    /// Idempotency-wrapped enqueue; the fingerprinted body is the job's data
    async fn submit(
        &self,
        actor: &Actor,
        job_type: &str,
        payload: JobPayload,
        idempotency_key: Option<&str>,
    ) -> Result<MutationResponse> {
        let body = serde_json::Value::Object(payload.data.clone());
        self.idempotency
            .execute(
                idempotency_key,
                Some(&body),
                &actor.organization_id,
                || async move {
                    let receipt = self.enqueue_job(job_type, payload, idempotency_key).await?;
                    info!(
                        job_id = %receipt.job_id,
                        job_type,
                        organization_id = %actor.organization_id,
                        "Submission accepted"
                    );
                    Ok::<_, AppError>(MutationResponse::new(
                        202,
                        serde_json::to_value(&receipt)?,
                    ))
                },
            )
            .await
    }
}
