// Datastore Port
// Tenant-scoped document CRUD used by job handlers (never by the queue itself)

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub organization_id: String,
    pub collection: String,
    pub data: Value,
    /// Epoch ms
    pub created_at: i64,
}

impl Record {
    /// Top-level field of `data`
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// Selection over one collection: top-level field equalities and an
/// inclusive created-at window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub equals: Vec<(String, Value)>,
    pub created_between: Option<(i64, i64)>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    pub fn created_between(mut self, from_millis: i64, to_millis: i64) -> Self {
        self.created_between = Some((from_millis, to_millis));
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        let fields_match = self
            .equals
            .iter()
            .all(|(field, expected)| record.data.get(field) == Some(expected));
        let window_match = self
            .created_between
            .map_or(true, |(from, to)| {
                record.created_at >= from && record.created_at <= to
            });
        fields_match && window_match
    }
}

/// Async document store keyed by organization
///
/// Implementations:
/// - SqliteDatastore (statusdesk-infra-sqlite)
/// - mocks::InMemoryDatastore
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Insert a document, returning it with its generated id
    async fn create(&self, organization_id: &str, collection: &str, data: Value)
        -> Result<Record>;

    /// Find by id inside the organization
    async fn find(&self, organization_id: &str, collection: &str, id: &str)
        -> Result<Option<Record>>;

    /// Every matching document inside the organization, oldest first
    async fn find_many(
        &self,
        organization_id: &str,
        collection: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>>;

    /// Delete matching documents inside the organization
    ///
    /// # Returns
    /// Number of documents deleted
    async fn delete_many(
        &self,
        organization_id: &str,
        collection: &str,
        filter: &RecordFilter,
    ) -> Result<u64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::port::{IdProvider, TimeProvider};
    use std::sync::{Arc, Mutex};

    /// Vec-backed datastore
    pub struct InMemoryDatastore {
        records: Mutex<Vec<Record>>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    }

    impl InMemoryDatastore {
        pub fn new(id_provider: Arc<dyn IdProvider>, time_provider: Arc<dyn TimeProvider>) -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                id_provider,
                time_provider,
            }
        }

        /// Seed a document with an explicit id and timestamp
        pub fn insert(&self, record: Record) {
            self.records.lock().unwrap().push(record);
        }

        pub fn count(&self, organization_id: &str, collection: &str) -> usize {
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.organization_id == organization_id && r.collection == collection)
                .count()
        }
    }

    #[async_trait]
    impl Datastore for InMemoryDatastore {
        async fn create(
            &self,
            organization_id: &str,
            collection: &str,
            data: Value,
        ) -> Result<Record> {
            let record = Record {
                id: self.id_provider.generate_id(),
                organization_id: organization_id.to_string(),
                collection: collection.to_string(),
                data,
                created_at: self.time_provider.now_millis(),
            };
            self.records.lock().unwrap().push(record.clone());
            Ok(record)
        }

        async fn find(
            &self,
            organization_id: &str,
            collection: &str,
            id: &str,
        ) -> Result<Option<Record>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| {
                    r.organization_id == organization_id
                        && r.collection == collection
                        && r.id == id
                })
                .cloned())
        }

        async fn find_many(
            &self,
            organization_id: &str,
            collection: &str,
            filter: &RecordFilter,
        ) -> Result<Vec<Record>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| {
                    r.organization_id == organization_id
                        && r.collection == collection
                        && filter.matches(r)
                })
                .cloned()
                .collect())
        }

        async fn delete_many(
            &self,
            organization_id: &str,
            collection: &str,
            filter: &RecordFilter,
        ) -> Result<u64> {
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| {
                !(r.organization_id == organization_id
                    && r.collection == collection
                    && filter.matches(r))
            });
            Ok((before - records.len()) as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(data: Value, created_at: i64) -> Record {
        Record {
            id: "r1".into(),
            organization_id: "org".into(),
            collection: "evidence_artifacts".into(),
            data,
            created_at,
        }
    }

    #[test]
    fn test_filter_fields_and_window() {
        let filter = RecordFilter::all()
            .eq("projectId", "p-1")
            .created_between(100, 200);

        assert!(filter.matches(&record(json!({"projectId": "p-1"}), 100)));
        assert!(filter.matches(&record(json!({"projectId": "p-1"}), 200)));
        assert!(!filter.matches(&record(json!({"projectId": "p-1"}), 201)));
        assert!(!filter.matches(&record(json!({"projectId": "p-2"}), 150)));
        assert!(!filter.matches(&record(json!({}), 150)));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(RecordFilter::all().matches(&record(json!(null), 0)));
    }
}
