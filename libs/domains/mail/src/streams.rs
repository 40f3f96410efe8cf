//! Stream definition, job payloads, and the scheduling boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stream_queue::{QueueJob, Schedule, StreamDef, StreamProducer};
use uuid::Uuid;

use crate::error::MailResult;
use crate::models::BulkSendRequest;

/// The delivery job stream.
pub struct MailStream;

impl StreamDef for MailStream {
    const STREAM_NAME: &'static str = "mail:jobs";
    const CONSUMER_GROUP: &'static str = "mail_workers";
    const SCHEDULED_SET: &'static str = "mail:jobs:scheduled";
}

/// Job payloads the worker understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MailJob {
    /// Drive the delivery state machine for one email.
    ProcessEmail { email_id: Uuid },
    /// Fan a bulk request out into individual idempotent sends.
    ProcessBulk {
        bulk_id: Uuid,
        request: BulkSendRequest,
    },
}

impl QueueJob for MailJob {
    fn job_id(&self) -> String {
        match self {
            MailJob::ProcessEmail { email_id } => format!("email:{email_id}"),
            MailJob::ProcessBulk { bulk_id, .. } => format!("bulk:{bulk_id}"),
        }
    }
}

/// Scheduling boundary the services talk to; the queue itself stays
/// swappable (and mockable in tests).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobScheduler: Send + Sync {
    async fn schedule(&self, job: MailJob, schedule: Schedule) -> MailResult<()>;
}

/// Scheduler backed by the Redis stream producer.
pub struct StreamJobScheduler {
    producer: StreamProducer,
}

impl StreamJobScheduler {
    pub fn new(producer: StreamProducer) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl JobScheduler for StreamJobScheduler {
    async fn schedule(&self, job: MailJob, schedule: Schedule) -> MailResult<()> {
        self.producer.send_scheduled(&job, schedule).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_serialization_round_trip() {
        let job = MailJob::ProcessEmail {
            email_id: Uuid::nil(),
        };
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"kind\":\"process_email\""));
        assert_eq!(serde_json::from_str::<MailJob>(&json).unwrap(), job);
    }

    #[test]
    fn test_job_ids() {
        let email_id = Uuid::nil();
        let job = MailJob::ProcessEmail { email_id };
        assert_eq!(job.job_id(), format!("email:{email_id}"));
    }
}
