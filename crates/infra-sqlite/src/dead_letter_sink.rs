// SQLite DeadLetterSink Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use sqlx::SqlitePool;
use statusdesk_core::port::{DeadLetterEntry, DeadLetterSink, LogDeadLetterSink};
use tracing::error;

/// Persists dead letters in `dead_letters` and emits the structured log event
pub struct SqliteDeadLetterSink {
    pool: SqlitePool,
}

impl SqliteDeadLetterSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadLetterSink for SqliteDeadLetterSink {
    async fn send(&self, entry: DeadLetterEntry) {
        let result = sqlx::query(
            r#"
            INSERT INTO dead_letters (
                job_id, job_type, organization_id, actor_id, error, attempts, failed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.job_id)
        .bind(&entry.job_type)
        .bind(&entry.organization_id)
        .bind(&entry.actor_id)
        .bind(&entry.error)
        .bind(i64::from(entry.attempts))
        .bind(entry.failed_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error);

        if let Err(e) = result {
            // Losing the row is acceptable; the log event below still carries the entry
            error!(job_id = %entry.job_id, error = %e, "Failed to persist dead letter");
        }

        LogDeadLetterSink.send(entry).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    fn entry(job_id: &str) -> DeadLetterEntry {
        DeadLetterEntry {
            job_id: job_id.to_string(),
            job_type: "generate-billing-packet".into(),
            organization_id: "org-1".into(),
            actor_id: "user-1".into(),
            error: "Project p-1 not found in org org-1".into(),
            attempts: 5,
            failed_at: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn test_send_persists_entry() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let sink = SqliteDeadLetterSink::new(pool.clone());

        sink.send(entry("job-1")).await;

        let (job_id, attempts, error): (String, i64, String) = sqlx::query_as(
            "SELECT job_id, attempts, error FROM dead_letters WHERE organization_id = ?",
        )
        .bind("org-1")
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(job_id, "job-1");
        assert_eq!(attempts, 5);
        assert!(error.contains("not found"));
    }

    #[tokio::test]
    async fn test_send_swallows_storage_errors() {
        // No migrations: the table is missing
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let sink = SqliteDeadLetterSink::new(pool);

        sink.send(entry("job-1")).await;
    }
}
