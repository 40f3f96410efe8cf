//! Binding between the queue boundary and the domain services.

use async_trait::async_trait;
use stream_queue::{JobProcessor, QueueError};
use tracing::info;

use crate::bulk::BulkService;
use crate::delivery::DeliveryService;
use crate::streams::MailJob;

/// Job entry points: `process_email` and `process_bulk`.
pub struct MailJobProcessor {
    delivery: DeliveryService,
    bulk: BulkService,
}

impl MailJobProcessor {
    pub fn new(delivery: DeliveryService, bulk: BulkService) -> Self {
        Self { delivery, bulk }
    }
}

#[async_trait]
impl JobProcessor<MailJob> for MailJobProcessor {
    async fn process(&self, job: &MailJob) -> Result<(), QueueError> {
        match job {
            MailJob::ProcessEmail { email_id } => self
                .delivery
                .process_email(*email_id)
                .await
                .map_err(|e| QueueError::Processing(e.to_string())),
            MailJob::ProcessBulk { bulk_id, request } => {
                let queued = self
                    .bulk
                    .process_bulk(*bulk_id, request.clone())
                    .await
                    .map_err(|e| QueueError::Processing(e.to_string()))?;
                info!(bulk_id = %bulk_id, queued, "Processed bulk job");
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "MailJobProcessor"
    }
}
