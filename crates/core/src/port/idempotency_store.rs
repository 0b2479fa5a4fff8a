// Idempotency Store Port
//
// Records are scoped by (organization_id, key). Expiry is checked on every read;
// `evict_expired` is only a memory/disk optimization and uses the same TTL rule.

use crate::domain::IdempotencyRecord;
use crate::error::Result;
use crate::port::TimeProvider;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

/// Storage for cached mutation responses
///
/// Implementations:
/// - InMemoryIdempotencyStore (this module)
/// - SqliteIdempotencyStore (statusdesk-infra-sqlite)
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Live record for `(organization_id, key)`; expired records read as absent
    async fn get(&self, organization_id: &str, key: &str) -> Result<Option<IdempotencyRecord>>;

    /// Insert or replace the record (last writer wins)
    async fn put(&self, record: IdempotencyRecord) -> Result<()>;

    /// Remove every expired record
    ///
    /// # Returns
    /// Number of records evicted
    async fn evict_expired(&self) -> Result<u64>;

    /// Number of stored records, expired ones included until evicted
    async fn count(&self) -> Result<u64>;
}

type RecordKey = (String, String);

/// Map-backed store, the default for a single process
pub struct InMemoryIdempotencyStore {
    records: RwLock<HashMap<RecordKey, IdempotencyRecord>>,
    ttl: Duration,
    time_provider: Arc<dyn TimeProvider>,
}

impl InMemoryIdempotencyStore {
    pub fn new(ttl: Duration, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl,
            time_provider,
        }
    }

    fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn get(&self, organization_id: &str, key: &str) -> Result<Option<IdempotencyRecord>> {
        let now = self.time_provider.now_millis();
        let ttl = self.ttl_millis();
        let record_key = (organization_id.to_string(), key.to_string());

        {
            let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
            match records.get(&record_key) {
                None => return Ok(None),
                Some(record) if !record.is_expired(now, ttl) => return Ok(Some(record.clone())),
                Some(_) => {}
            }
        }

        // Lazy eviction; re-check under the write lock in case of a concurrent put
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records
            .get(&record_key)
            .is_some_and(|r| r.is_expired(now, ttl))
        {
            records.remove(&record_key);
            debug!(organization_id, key, "Evicted expired idempotency record on read");
        }
        Ok(None)
    }

    async fn put(&self, record: IdempotencyRecord) -> Result<()> {
        let record_key = (record.organization_id.clone(), record.key.clone());
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record_key, record);
        Ok(())
    }

    async fn evict_expired(&self) -> Result<u64> {
        let now = self.time_provider.now_millis();
        let ttl = self.ttl_millis();
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now, ttl));
        Ok((before - records.len()) as u64)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Fingerprint, MutationResponse};
    use crate::port::time_provider::mocks::MockTimeProvider;
    use serde_json::json;

    const HOUR_MS: i64 = 60 * 60 * 1000;

    fn record(org: &str, key: &str, created_at: i64) -> IdempotencyRecord {
        IdempotencyRecord {
            organization_id: org.to_string(),
            key: key.to_string(),
            fingerprint: Fingerprint::from_stored("fp-1"),
            response: MutationResponse::new(201, json!({"data": "test"})),
            created_at,
        }
    }

    fn store(clock: Arc<MockTimeProvider>) -> InMemoryIdempotencyStore {
        InMemoryIdempotencyStore::new(Duration::from_secs(24 * 3600), clock)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let clock = Arc::new(MockTimeProvider::new(0));
        let store = store(clock);
        store.put(record("org-1", "key-1", 0)).await.unwrap();

        let found = store.get("org-1", "key-1").await.unwrap().unwrap();
        assert_eq!(found.response.status_code, 201);
        assert_eq!(found.fingerprint.as_str(), "fp-1");
        assert_eq!(found.response.body, json!({"data": "test"}));

        assert!(store.get("org-1", "nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scoped_by_organization() {
        let clock = Arc::new(MockTimeProvider::new(0));
        let store = store(clock);
        store.put(record("org-A", "key-2", 0)).await.unwrap();

        assert!(store.get("org-A", "key-2").await.unwrap().is_some());
        assert!(store.get("org-B", "key-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_record_reads_as_absent_and_is_dropped() {
        let clock = Arc::new(MockTimeProvider::new(0));
        let store = store(clock.clone());
        store.put(record("org", "k", 0)).await.unwrap();

        clock.set(24 * HOUR_MS);
        assert!(store.get("org", "k").await.unwrap().is_some());

        clock.set(24 * HOUR_MS + 1);
        assert!(store.get("org", "k").await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_agrees_with_read_expiry() {
        let clock = Arc::new(MockTimeProvider::new(0));
        let store = store(clock.clone());
        store.put(record("org", "old", 0)).await.unwrap();
        store.put(record("org", "fresh", 10 * HOUR_MS)).await.unwrap();

        clock.set(25 * HOUR_MS);
        assert_eq!(store.evict_expired().await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get("org", "fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_put_overwrites_same_key() {
        let clock = Arc::new(MockTimeProvider::new(0));
        let store = store(clock);
        store.put(record("org", "k", 0)).await.unwrap();

        let mut replacement = record("org", "k", 5);
        replacement.response = MutationResponse::new(200, json!({"v": 2}));
        store.put(replacement).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let found = store.get("org", "k").await.unwrap().unwrap();
        assert_eq!(found.response.body, json!({"v": 2}));
    }
}
