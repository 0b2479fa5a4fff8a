// Idempotency Service
// Makes a mutating operation safe to retry: replay cached responses, reject key reuse

use crate::config::IdempotencyConfig;
use crate::domain::{Fingerprint, IdempotencyRecord, MutationResponse};
use crate::error::Result;
use crate::port::{IdempotencyStore, TimeProvider};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of the pre-mutation lookup
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyCheck {
    /// No key supplied or layer disabled: treat as unique
    Bypass,
    /// Key unseen (or expired): run the mutation, then store under this key
    Miss { key: String, fingerprint: Fingerprint },
    /// Same key, same body: answer with the cached response
    Replay(MutationResponse),
    /// Same key, different body
    Conflict,
}

impl IdempotencyCheck {
    /// Response to short-circuit with, if any
    pub fn cached_response(&self) -> Option<MutationResponse> {
        match self {
            IdempotencyCheck::Replay(response) => Some(response.clone()),
            IdempotencyCheck::Conflict => Some(MutationResponse::idempotency_conflict()),
            IdempotencyCheck::Bypass | IdempotencyCheck::Miss { .. } => None,
        }
    }
}

/// Idempotency layer over an `IdempotencyStore`
pub struct IdempotencyService {
    enabled: bool,
    store: Arc<dyn IdempotencyStore>,
    time_provider: Arc<dyn TimeProvider>,
}

impl IdempotencyService {
    pub fn new(
        config: &IdempotencyConfig,
        store: Arc<dyn IdempotencyStore>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            enabled: config.enabled,
            store,
            time_provider,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up `(organization_id, key)` and compare body fingerprints
    pub async fn check(
        &self,
        key: Option<&str>,
        body: Option<&Value>,
        organization_id: &str,
    ) -> Result<IdempotencyCheck> {
        if !self.enabled {
            return Ok(IdempotencyCheck::Bypass);
        }
        let Some(key) = key.filter(|k| !k.is_empty()) else {
            return Ok(IdempotencyCheck::Bypass);
        };

        let fingerprint = Fingerprint::of(body);
        let Some(existing) = self.store.get(organization_id, key).await? else {
            debug!(organization_id, key, "Idempotency miss");
            return Ok(IdempotencyCheck::Miss {
                key: key.to_string(),
                fingerprint,
            });
        };

        if existing.fingerprint != fingerprint {
            warn!(
                organization_id,
                key,
                "Idempotency key reused with different request body"
            );
            return Ok(IdempotencyCheck::Conflict);
        }

        info!(
            organization_id,
            key,
            status_code = existing.response.status_code,
            "Replaying cached response"
        );
        Ok(IdempotencyCheck::Replay(existing.response))
    }

    /// Cache a response for later replays
    pub async fn store_response(
        &self,
        key: &str,
        organization_id: &str,
        fingerprint: Fingerprint,
        response: MutationResponse,
    ) -> Result<()> {
        if !self.enabled || key.is_empty() {
            return Ok(());
        }
        self.store
            .put(IdempotencyRecord {
                organization_id: organization_id.to_string(),
                key: key.to_string(),
                fingerprint,
                response,
                created_at: self.time_provider.now_millis(),
            })
            .await
    }

    /// Run `mutation` under the full protocol
    ///
    /// The mutation runs at most once per live `(organization_id, key)` with a
    /// matching body. Only 2xx responses are cached, so a failed attempt can be
    /// retried with the same key.
    pub async fn execute<F, Fut>(
        &self,
        key: Option<&str>,
        body: Option<&Value>,
        organization_id: &str,
        mutation: F,
    ) -> Result<MutationResponse>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<MutationResponse>>,
    {
        let check = self.check(key, body, organization_id).await?;
        if let Some(cached) = check.cached_response() {
            return Ok(cached);
        }

        let response = mutation().await?;

        if let IdempotencyCheck::Miss { key, fingerprint } = check {
            if response.is_success() {
                // The mutation already ran; a lost cache entry must not turn into an error
                if let Err(e) = self
                    .store_response(&key, organization_id, fingerprint, response.clone())
                    .await
                {
                    warn!(organization_id, key = %key, error = %e, "Failed to store idempotent response");
                }
            }
        }

        Ok(response)
    }

    /// Drop expired records
    pub async fn sweep(&self) -> Result<u64> {
        self.store.evict_expired().await
    }
}
