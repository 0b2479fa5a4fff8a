// SQLite IdempotencyStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use sqlx::SqlitePool;
use statusdesk_core::domain::{Fingerprint, IdempotencyRecord, MutationResponse};
use statusdesk_core::error::Result;
use statusdesk_core::port::{IdempotencyStore, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct SqliteIdempotencyStore {
    pool: SqlitePool,
    ttl: Duration,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteIdempotencyStore {
    pub fn new(pool: SqlitePool, ttl: Duration, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            ttl,
            time_provider,
        }
    }

    fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Records created before this instant are expired
    fn cutoff(&self) -> i64 {
        self.time_provider
            .now_millis()
            .saturating_sub(self.ttl_millis())
    }
}

#[async_trait]
impl IdempotencyStore for SqliteIdempotencyStore {
    async fn get(&self, organization_id: &str, key: &str) -> Result<Option<IdempotencyRecord>> {
        let row = sqlx::query_as::<_, IdempotencyRow>(
            "SELECT * FROM idempotency_records WHERE organization_id = ? AND key = ?",
        )
        .bind(organization_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        if row.created_at < self.cutoff() {
            // Lazy eviction; the created_at guard keeps a concurrent re-put alive
            sqlx::query(
                "DELETE FROM idempotency_records WHERE organization_id = ? AND key = ? AND created_at = ?",
            )
            .bind(organization_id)
            .bind(key)
            .bind(row.created_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
            debug!(organization_id, key, "Evicted expired idempotency record on read");
            return Ok(None);
        }

        row.into_record().map(Some)
    }

    async fn put(&self, record: IdempotencyRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO idempotency_records (
                organization_id, key, fingerprint, status_code, body, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.organization_id)
        .bind(&record.key)
        .bind(record.fingerprint.as_str())
        .bind(i64::from(record.response.status_code))
        .bind(record.response.body.to_string())
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn evict_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM idempotency_records WHERE created_at < ?")
            .bind(self.cutoff())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM idempotency_records")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct IdempotencyRow {
    organization_id: String,
    key: String,
    fingerprint: String,
    status_code: i64,
    body: String,
    created_at: i64,
}

impl IdempotencyRow {
    fn into_record(self) -> Result<IdempotencyRecord> {
        let body = serde_json::from_str(&self.body)?;
        let status_code = u16::try_from(self.status_code).map_err(|_| {
            statusdesk_core::AppError::Database(format!(
                "Invalid stored status code: {}",
                self.status_code
            ))
        })?;

        Ok(IdempotencyRecord {
            organization_id: self.organization_id,
            key: self.key,
            fingerprint: Fingerprint::from_stored(self.fingerprint),
            response: MutationResponse::new(status_code, body),
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use serde_json::json;
    use statusdesk_core::port::time_provider::mocks::MockTimeProvider;

    const HOUR_MS: i64 = 60 * 60 * 1000;

    async fn setup(clock: Arc<MockTimeProvider>) -> SqliteIdempotencyStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteIdempotencyStore::new(pool, Duration::from_secs(24 * 3600), clock)
    }

    fn record(org: &str, key: &str, created_at: i64) -> IdempotencyRecord {
        IdempotencyRecord {
            organization_id: org.to_string(),
            key: key.to_string(),
            fingerprint: Fingerprint::of(Some(&json!({"title": "x"}))),
            response: MutationResponse::new(202, json!({"jobId": "job-1", "status": "pending"})),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_put_and_get_roundtrip() {
        let clock = Arc::new(MockTimeProvider::new(0));
        let store = setup(clock).await;
        let original = record("org-1", "key-1", 0);
        store.put(original.clone()).await.unwrap();

        let found = store.get("org-1", "key-1").await.unwrap().unwrap();
        assert_eq!(found, original);
        assert!(store.get("org-1", "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let clock = Arc::new(MockTimeProvider::new(0));
        let store = setup(clock).await;
        store.put(record("org-A", "shared", 0)).await.unwrap();

        assert!(store.get("org-A", "shared").await.unwrap().is_some());
        assert!(store.get("org-B", "shared").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let clock = Arc::new(MockTimeProvider::new(0));
        let store = setup(clock).await;
        store.put(record("org", "k", 0)).await.unwrap();

        let mut newer = record("org", "k", 10);
        newer.response = MutationResponse::new(201, json!({"v": 2}));
        store.put(newer).await.unwrap();

        let found = store.get("org", "k").await.unwrap().unwrap();
        assert_eq!(found.response.body, json!({"v": 2}));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expiry_on_read_and_sweep_agree() {
        let clock = Arc::new(MockTimeProvider::new(0));
        let store = setup(clock.clone()).await;
        store.put(record("org", "a", 0)).await.unwrap();
        store.put(record("org", "b", 0)).await.unwrap();
        store.put(record("org", "c", HOUR_MS)).await.unwrap();

        // Exactly at the TTL boundary: still live
        clock.set(24 * HOUR_MS);
        assert!(store.get("org", "a").await.unwrap().is_some());
        assert_eq!(store.evict_expired().await.unwrap(), 0);

        clock.set(24 * HOUR_MS + 1);
        assert!(store.get("org", "a").await.unwrap().is_none());
        assert_eq!(store.evict_expired().await.unwrap(), 1); // "b"
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get("org", "c").await.unwrap().is_some());
    }
}
