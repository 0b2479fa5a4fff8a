// SQLite Datastore Implementation
// Documents are JSON blobs; field filters are applied after the scoped query

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use statusdesk_core::error::Result;
use statusdesk_core::port::{Datastore, IdProvider, Record, RecordFilter, TimeProvider};
use std::sync::Arc;

pub struct SqliteDatastore {
    pool: SqlitePool,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteDatastore {
    pub fn new(
        pool: SqlitePool,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            pool,
            id_provider,
            time_provider,
        }
    }

    /// Rows of one organization/collection inside the filter's time window
    async fn scoped(
        &self,
        organization_id: &str,
        collection: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>> {
        let (from, to) = filter.created_between.unwrap_or((i64::MIN, i64::MAX));
        let rows: Vec<RecordRow> = sqlx::query_as(
            r#"
            SELECT * FROM records
            WHERE organization_id = ? AND collection = ?
              AND created_at >= ? AND created_at <= ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(organization_id)
        .bind(collection)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record = row.into_record()?;
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl Datastore for SqliteDatastore {
    async fn create(&self, organization_id: &str, collection: &str, data: Value) -> Result<Record> {
        let record = Record {
            id: self.id_provider.generate_id(),
            organization_id: organization_id.to_string(),
            collection: collection.to_string(),
            data,
            created_at: self.time_provider.now_millis(),
        };

        sqlx::query(
            "INSERT INTO records (id, organization_id, collection, data, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.organization_id)
        .bind(&record.collection)
        .bind(record.data.to_string())
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(record)
    }

    async fn find(&self, organization_id: &str, collection: &str, id: &str) -> Result<Option<Record>> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT * FROM records WHERE organization_id = ? AND collection = ? AND id = ?",
        )
        .bind(organization_id)
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(RecordRow::into_record).transpose()
    }

    async fn find_many(
        &self,
        organization_id: &str,
        collection: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>> {
        self.scoped(organization_id, collection, filter).await
    }

    async fn delete_many(
        &self,
        organization_id: &str,
        collection: &str,
        filter: &RecordFilter,
    ) -> Result<u64> {
        let doomed = self.scoped(organization_id, collection, filter).await?;

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut deleted = 0;
        for record in &doomed {
            deleted += sqlx::query("DELETE FROM records WHERE organization_id = ? AND id = ?")
                .bind(organization_id)
                .bind(&record.id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?
                .rows_affected();
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(deleted)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: String,
    organization_id: String,
    collection: String,
    data: String,
    created_at: i64,
}

impl RecordRow {
    fn into_record(self) -> Result<Record> {
        Ok(Record {
            data: serde_json::from_str(&self.data)?,
            id: self.id,
            organization_id: self.organization_id,
            collection: self.collection,
            created_at: self.created_at,
        })
    }
}
