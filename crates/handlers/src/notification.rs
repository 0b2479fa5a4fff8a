// send-notification
// In-app delivery: one notifications record per job

use crate::collections::NOTIFICATIONS;
use async_trait::async_trait;
use serde_json::json;
use statusdesk_core::application::NotificationRequest;
use statusdesk_core::domain::{JobPayload, JobType};
use statusdesk_core::error::Result;
use statusdesk_core::port::{Datastore, JobHandler};
use std::sync::Arc;
use tracing::info;

pub struct SendNotificationHandler {
    datastore: Arc<dyn Datastore>,
}

impl SendNotificationHandler {
    pub fn new(datastore: Arc<dyn Datastore>) -> Self {
        Self { datastore }
    }
}

#[async_trait]
impl JobHandler for SendNotificationHandler {
    fn job_type(&self) -> JobType {
        JobType::new(JobType::SEND_NOTIFICATION)
    }

    async fn handle(&self, payload: &JobPayload, job_id: &str) -> Result<()> {
        let request: NotificationRequest = payload.parse()?;

        let record = self
            .datastore
            .create(
                &payload.organization_id,
                NOTIFICATIONS,
                json!({
                    "userId": request.user_id,
                    "type": request.notification_type,
                    "title": request.title,
                    "body": request.body,
                    "href": request.href,
                    "read": false,
                }),
            )
            .await?;

        info!(
            job_id,
            notification_id = %record.id,
            organization_id = %payload.organization_id,
            "Notification delivered"
        );
        Ok(())
    }
}
