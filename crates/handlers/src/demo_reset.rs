// reset-demo-snapshot
// Wipes the organization's demo activity; rerunning is harmless

use crate::collections::{DEMO_EVENTS, DEMO_RUNS};
use async_trait::async_trait;
use statusdesk_core::application::DemoResetRequest;
use statusdesk_core::domain::{JobPayload, JobType};
use statusdesk_core::error::Result;
use statusdesk_core::port::{Datastore, JobHandler, RecordFilter};
use std::sync::Arc;
use tracing::info;

pub struct ResetDemoSnapshotHandler {
    datastore: Arc<dyn Datastore>,
}

impl ResetDemoSnapshotHandler {
    pub fn new(datastore: Arc<dyn Datastore>) -> Self {
        Self { datastore }
    }
}

#[async_trait]
impl JobHandler for ResetDemoSnapshotHandler {
    fn job_type(&self) -> JobType {
        JobType::new(JobType::RESET_DEMO_SNAPSHOT)
    }

    async fn handle(&self, payload: &JobPayload, job_id: &str) -> Result<()> {
        let request: DemoResetRequest = payload.parse()?;
        let org = payload.organization_id.as_str();

        let events = self
            .datastore
            .delete_many(org, DEMO_EVENTS, &RecordFilter::all())
            .await?;
        let runs = self
            .datastore
            .delete_many(org, DEMO_RUNS, &RecordFilter::all())
            .await?;

        info!(
            job_id,
            organization_id = org,
            scenario_id = request.scenario_id.as_deref().unwrap_or("default"),
            deleted_events = events,
            deleted_runs = runs,
            "Demo snapshot reset"
        );
        Ok(())
    }
}
