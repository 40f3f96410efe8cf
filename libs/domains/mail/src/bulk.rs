//! Bulk fan-out: one tracking record, many idempotent sends.

use serde_json::{Map, Value};
use std::sync::Arc;
use stream_queue::Schedule;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::entity::BulkJob;
use crate::enums::BulkStatus;
use crate::error::{MailError, MailResult};
use crate::models::{BulkSendRequest, NewBulkJob, Recipient, SendRequest};
use crate::repository::MailRepository;
use crate::service::MailService;
use crate::streams::{JobScheduler, MailJob};

#[derive(Clone)]
pub struct BulkService {
    repo: Arc<dyn MailRepository>,
    scheduler: Arc<dyn JobScheduler>,
    mail: MailService,
}

impl BulkService {
    pub fn new(
        repo: Arc<dyn MailRepository>,
        scheduler: Arc<dyn JobScheduler>,
        mail: MailService,
    ) -> Self {
        Self {
            repo,
            scheduler,
            mail,
        }
    }

    /// Accept a bulk request: persist the tracking record and hand the
    /// fan-out to the queue.
    pub async fn enqueue_bulk(&self, request: BulkSendRequest) -> MailResult<BulkJob> {
        request
            .validate()
            .map_err(|e| MailError::Validation(e.to_string()))?;

        let job = self
            .repo
            .insert_bulk_job(NewBulkJob {
                tenant_id: request.tenant_id.clone(),
                template_id: request.template_id.clone(),
                total_count: request.recipients.len() as i32,
            })
            .await?;

        self.scheduler
            .schedule(
                MailJob::ProcessBulk {
                    bulk_id: job.id,
                    request,
                },
                Schedule::Now,
            )
            .await?;

        info!(bulk_id = %job.id, total = job.total_count, "Accepted bulk request");
        Ok(job)
    }

    /// Fan a bulk request out through intake, one idempotent send per
    /// recipient. Redelivery-safe: already-created sends resolve as reused
    /// and are not counted or re-scheduled.
    pub async fn process_bulk(
        &self,
        bulk_id: Uuid,
        request: BulkSendRequest,
    ) -> MailResult<i32> {
        self.repo
            .find_bulk_job(bulk_id)
            .await?
            .ok_or_else(|| MailError::NotFound(format!("bulk job {bulk_id}")))?;

        self.repo
            .update_bulk_job(bulk_id, BulkStatus::Processing, 0)
            .await?;

        let mut queued = 0;
        for recipient in &request.recipients {
            let send_request = SendRequest {
                tenant_id: request.tenant_id.clone(),
                recipient: Recipient {
                    email: recipient.email.clone(),
                    name: recipient.name.clone(),
                },
                template_id: request.template_id.clone(),
                variables: merge_variables(
                    &request.shared_variables,
                    request.per_recipient_variables.get(&recipient.email),
                ),
                metadata: request.metadata.clone(),
                provider_hint: request.provider_hint.clone(),
                send_at: request.send_at,
                idempotency_key: format!("{}:{}", request.idempotency_key, recipient.email),
            };

            let outcome = self.mail.enqueue_send(send_request).await?;
            if !outcome.reused {
                queued += 1;
            }
        }

        self.repo
            .update_bulk_job(bulk_id, BulkStatus::Complete, queued)
            .await?;

        info!(bulk_id = %bulk_id, queued, "Bulk fan-out complete");
        Ok(queued)
    }

    pub async fn get_bulk_job(&self, bulk_id: Uuid) -> MailResult<BulkJob> {
        self.repo
            .find_bulk_job(bulk_id)
            .await?
            .ok_or_else(|| MailError::NotFound(format!("bulk job {bulk_id}")))
    }
}

/// Per-recipient variables override shared ones key by key.
fn merge_variables(shared: &Value, per_recipient: Option<&Value>) -> Value {
    let mut merged: Map<String, Value> = shared
        .as_object()
        .cloned()
        .unwrap_or_default();

    if let Some(Value::Object(overrides)) = per_recipient {
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }
    }

    Value::Object(merged)
}
