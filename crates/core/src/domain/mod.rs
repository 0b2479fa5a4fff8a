// Domain Layer - Pure business logic and entities

pub mod error;
pub mod fingerprint;
pub mod flag;
pub mod idempotency;
pub mod job;

// Re-exports
pub use error::DomainError;
pub use fingerprint::Fingerprint;
pub use flag::{FlagContext, FlagDefinition, FlagKey};
pub use idempotency::{IdempotencyRecord, MutationResponse};
pub use job::{JobId, JobPayload, JobRecord, JobStatus, JobStatusView, JobType, OrganizationId};
