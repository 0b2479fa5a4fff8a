// StatusDesk Infrastructure - SQLite Adapters
// Implements: IdempotencyStore, DeadLetterSink, Datastore

mod connection;
mod datastore;
mod dead_letter_sink;
mod error;
mod idempotency_store;
mod migration;

pub use connection::{create_pool, database_url};
pub use datastore::SqliteDatastore;
pub use dead_letter_sink::SqliteDeadLetterSink;
pub use idempotency_store::SqliteIdempotencyStore;
pub use migration::run_migrations;
