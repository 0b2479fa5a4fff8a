// generate-billing-packet
// Snapshot a project's evidence for a billing period into one billing packet

use crate::collections::{BILLING_PACKETS, EVIDENCE_ARTIFACTS, PROJECTS};
use async_trait::async_trait;
use serde_json::{json, Value};
use statusdesk_core::application::BillingPacketRequest;
use statusdesk_core::domain::{JobPayload, JobType};
use statusdesk_core::error::{AppError, Result};
use statusdesk_core::port::{Datastore, JobHandler, RecordFilter};
use std::sync::Arc;
use tracing::{debug, info};

pub const PACKET_STATUS_GENERATED: &str = "GENERATED";

pub struct GenerateBillingPacketHandler {
    datastore: Arc<dyn Datastore>,
}

impl GenerateBillingPacketHandler {
    pub fn new(datastore: Arc<dyn Datastore>) -> Self {
        Self { datastore }
    }

    /// Packet already written by an earlier attempt of the same job
    async fn existing_packet(&self, organization_id: &str, job_id: &str) -> Result<Option<String>> {
        let found = self
            .datastore
            .find_many(
                organization_id,
                BILLING_PACKETS,
                &RecordFilter::all().eq("jobId", job_id),
            )
            .await?;
        Ok(found.into_iter().next().map(|r| r.id))
    }
}

#[async_trait]
impl JobHandler for GenerateBillingPacketHandler {
    fn job_type(&self) -> JobType {
        JobType::new(JobType::GENERATE_BILLING_PACKET)
    }

    async fn handle(&self, payload: &JobPayload, job_id: &str) -> Result<()> {
        let request: BillingPacketRequest = payload.parse()?;
        let org = payload.organization_id.as_str();

        if let Some(packet_id) = self.existing_packet(org, job_id).await? {
            debug!(job_id, packet_id = %packet_id, "Billing packet already generated");
            return Ok(());
        }

        if self
            .datastore
            .find(org, PROJECTS, &request.project_id)
            .await?
            .is_none()
        {
            return Err(AppError::Handler(format!(
                "Project {} not found in org {}",
                request.project_id, org
            )));
        }

        let (period_start, period_end) = request.period_millis()?;
        let evidence_ids: Vec<Value> = self
            .datastore
            .find_many(
                org,
                EVIDENCE_ARTIFACTS,
                &RecordFilter::all()
                    .eq("projectId", request.project_id.as_str())
                    .created_between(period_start, period_end),
            )
            .await?
            .into_iter()
            .map(|r| Value::String(r.id))
            .collect();

        let evidence_count = evidence_ids.len();
        let packet = self
            .datastore
            .create(
                org,
                BILLING_PACKETS,
                json!({
                    "jobId": job_id,
                    "projectId": request.project_id,
                    "title": request.title,
                    "periodStart": request.period_start,
                    "periodEnd": request.period_end,
                    "totalHours": request.total_hours,
                    "totalAmount": request.total_amount,
                    "lineItems": request.line_items.unwrap_or_default(),
                    "evidenceIds": evidence_ids,
                    "generatedBy": payload.actor_id,
                    "status": PACKET_STATUS_GENERATED,
                }),
            )
            .await?;

        info!(
            job_id,
            packet_id = %packet.id,
            organization_id = org,
            evidence_count,
            "Billing packet generated"
        );
        Ok(())
    }
}
