// Application Layer - Use Cases and Business Logic

pub mod dead_letter;
pub mod flags;
pub mod idempotency;
pub mod maintenance;
pub mod queue;
pub mod retry;
pub mod shutdown;
pub mod submission;

// Re-exports
pub use dead_letter::DeadLetterQueue;
pub use flags::FlagEvaluator;
pub use idempotency::{IdempotencyCheck, IdempotencyService};
pub use maintenance::IdempotencySweeper;
pub use queue::JobQueue;
pub use retry::{RetryDecision, RetryPolicy};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
pub use submission::{
    Actor, BillingPacketRequest, DemoResetRequest, JobReceipt, LineItem, NotificationRequest,
    SubmissionService,
};
