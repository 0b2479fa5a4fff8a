// Job Domain Model

use crate::domain::error::{DomainError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Job ID (UUID v4)
pub type JobId = String;

/// Tenant identifier
pub type OrganizationId = String;

/// Job lifecycle status
///
/// `pending -> running -> {completed | pending (retry) | failed | dead}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    /// No handler registered for the job type
    Failed,
    /// Retry budget exhausted, handed to the dead-letter sink
    Dead,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Dead)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Dead => write!(f, "dead"),
        }
    }
}

/// Job type tag, the key of the handler registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobType(String);

impl JobType {
    pub const GENERATE_BILLING_PACKET: &'static str = "generate-billing-packet";
    pub const SEND_NOTIFICATION: &'static str = "send-notification";
    pub const RESET_DEMO_SNAPSHOT: &'static str = "reset-demo-snapshot";

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Job payload: the owning tenant, the acting identity, and free-form data.
///
/// Serializes flat: `{"organizationId": .., "actorId": .., ...data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub organization_id: OrganizationId,
    pub actor_id: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl JobPayload {
    pub fn new(organization_id: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            actor_id: actor_id.into(),
            data: Map::new(),
        }
    }

    /// Attach a data field (builder style)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Merge every field of a serializable struct into `data`.
    /// Non-object values are rejected.
    pub fn with_fields<T: Serialize>(mut self, fields: &T) -> Result<Self> {
        match serde_json::to_value(fields) {
            Ok(Value::Object(map)) => {
                self.data.extend(map);
                Ok(self)
            }
            Ok(other) => Err(DomainError::ValidationError(format!(
                "job payload fields must be an object, got {}",
                other
            ))),
            Err(e) => Err(DomainError::ValidationError(e.to_string())),
        }
    }

    /// Tenant and actor must be present
    pub fn validate(&self) -> Result<()> {
        if self.organization_id.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "job payload is missing organizationId".to_string(),
            ));
        }
        if self.actor_id.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "job payload is missing actorId".to_string(),
            ));
        }
        Ok(())
    }

    /// Decode the whole payload (identity fields included) into a handler-specific type
    pub fn parse<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(serde_json::to_value(self)?)
    }
}

/// A unit of deferred work. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub job_type: JobType,
    pub payload: JobPayload,
    pub status: JobStatus,

    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub idempotency_key: Option<String>,

    /// Earliest time a drain may pick the job up (moved forward on retry)
    pub scheduled_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub created_at: i64,
}

impl JobRecord {
    /// Create a new pending job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `now_millis` - Creation timestamp (injected, not system time)
    /// * `job_type` - Handler registry key
    /// * `payload` - Tenant-scoped payload
    /// * `max_attempts` - Attempt ceiling
    pub fn new(
        id: impl Into<String>,
        now_millis: i64,
        job_type: JobType,
        payload: JobPayload,
        max_attempts: u32,
    ) -> Self {
        Self {
            id: id.into(),
            job_type,
            payload,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts,
            last_error: None,
            idempotency_key: None,
            scheduled_at: now_millis,
            started_at: None,
            completed_at: None,
            created_at: now_millis,
        }
    }

    pub fn organization_id(&self) -> &str {
        &self.payload.organization_id
    }

    /// Pending and due at `now_millis`
    pub fn is_due(&self, now_millis: i64) -> bool {
        self.status == JobStatus::Pending && self.scheduled_at <= now_millis
    }

    fn expect_status(&self, expected: JobStatus, to: JobStatus) -> Result<()> {
        if self.status != expected {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    /// pending -> running
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        self.expect_status(JobStatus::Pending, JobStatus::Running)?;
        self.status = JobStatus::Running;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Count one handler invocation; keeps `attempts <= max_attempts`
    pub fn begin_attempt(&mut self) -> Result<u32> {
        self.expect_status(JobStatus::Running, JobStatus::Running)?;
        if self.attempts >= self.max_attempts {
            return Err(DomainError::ValidationError(format!(
                "job {} exhausted its {} attempts",
                self.id, self.max_attempts
            )));
        }
        self.attempts += 1;
        Ok(self.attempts)
    }

    /// running -> completed
    pub fn complete(&mut self, now_millis: i64) -> Result<()> {
        self.expect_status(JobStatus::Running, JobStatus::Completed)?;
        self.status = JobStatus::Completed;
        self.completed_at = Some(now_millis);
        Ok(())
    }

    /// running -> pending, not due before `retry_at_millis`
    pub fn schedule_retry(&mut self, error: impl Into<String>, retry_at_millis: i64) -> Result<()> {
        self.expect_status(JobStatus::Running, JobStatus::Pending)?;
        self.status = JobStatus::Pending;
        self.last_error = Some(error.into());
        self.scheduled_at = retry_at_millis;
        Ok(())
    }

    /// running -> failed (configuration error, never retried)
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.expect_status(JobStatus::Running, JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.last_error = Some(error.into());
        Ok(())
    }

    /// running -> dead (retries exhausted)
    pub fn bury(&mut self, error: impl Into<String>) -> Result<()> {
        self.expect_status(JobStatus::Running, JobStatus::Dead)?;
        self.status = JobStatus::Dead;
        self.last_error = Some(error.into());
        Ok(())
    }

    pub fn view(&self) -> JobStatusView {
        JobStatusView::from(self)
    }
}

/// Read-only projection handed to status-lookup callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

fn rfc3339(millis: i64) -> Option<String> {
    chrono::DateTime::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339())
}

impl From<&JobRecord> for JobStatusView {
    fn from(job: &JobRecord) -> Self {
        Self {
            id: job.id.clone(),
            job_type: job.job_type.to_string(),
            status: job.status,
            attempts: job.attempts,
            created_at: rfc3339(job.created_at),
            started_at: job.started_at.and_then(rfc3339),
            completed_at: job.completed_at.and_then(rfc3339),
            last_error: job.last_error.clone(),
        }
    }
}
