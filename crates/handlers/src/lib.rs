// StatusDesk Job Handlers
// Side effects of the well-known job types, all routed through the Datastore port

mod billing_packet;
mod demo_reset;
mod notification;

pub use billing_packet::GenerateBillingPacketHandler;
pub use demo_reset::ResetDemoSnapshotHandler;
pub use notification::SendNotificationHandler;

use statusdesk_core::application::JobQueue;
use statusdesk_core::port::{Datastore, JobHandler};
use std::sync::Arc;

/// Collections written or read by the handlers
pub mod collections {
    pub const PROJECTS: &str = "projects";
    pub const EVIDENCE_ARTIFACTS: &str = "evidence_artifacts";
    pub const BILLING_PACKETS: &str = "billing_packets";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const DEMO_EVENTS: &str = "demo_events";
    pub const DEMO_RUNS: &str = "demo_runs";
}

/// One handler per well-known job type
pub fn default_handlers(datastore: Arc<dyn Datastore>) -> Vec<Arc<dyn JobHandler>> {
    vec![
        Arc::new(GenerateBillingPacketHandler::new(Arc::clone(&datastore))),
        Arc::new(SendNotificationHandler::new(Arc::clone(&datastore))),
        Arc::new(ResetDemoSnapshotHandler::new(datastore)),
    ]
}

/// Register every production handler on `queue`
pub fn register_default_handlers(queue: &JobQueue, datastore: Arc<dyn Datastore>) {
    queue.register_handlers(default_handlers(datastore));
}
