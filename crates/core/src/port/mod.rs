// Port Layer - Interfaces for external dependencies

pub mod datastore;
pub mod dead_letter_sink;
pub mod flag_provider;
pub mod id_provider; // For deterministic testing
pub mod idempotency_store;
pub mod job_handler;
pub mod time_provider;

// Re-exports
pub use datastore::{Datastore, Record, RecordFilter};
pub use dead_letter_sink::{DeadLetterEntry, DeadLetterSink, LogDeadLetterSink};
pub use flag_provider::{FlagOverrides, FlagProvider, LocalFlagProvider};
pub use id_provider::IdProvider;
pub use idempotency_store::{IdempotencyStore, InMemoryIdempotencyStore};
pub use job_handler::JobHandler;
pub use time_provider::TimeProvider;
