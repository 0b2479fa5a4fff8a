// Idempotency Domain Model

use crate::domain::fingerprint::Fingerprint;
use crate::domain::OrganizationId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Response of a mutating operation: status code and JSON body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    pub status_code: u16,
    pub body: Value,
}

impl MutationResponse {
    pub fn new(status_code: u16, body: Value) -> Self {
        Self { status_code, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// 409 answer for a key reused with a different body
    pub fn idempotency_conflict() -> Self {
        Self::new(
            409,
            json!({
                "code": "IDEMPOTENCY_CONFLICT",
                "message": "Idempotency key reused with different request body",
            }),
        )
    }
}

/// Cached response keyed by `(organization_id, key)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub organization_id: OrganizationId,
    pub key: String,
    pub fingerprint: Fingerprint,
    pub response: MutationResponse,
    /// Epoch ms
    pub created_at: i64,
}

impl IdempotencyRecord {
    /// Expired once strictly older than the TTL
    pub fn is_expired(&self, now_millis: i64, ttl_millis: i64) -> bool {
        now_millis - self.created_at > ttl_millis
    }
}
