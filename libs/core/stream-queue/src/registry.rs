use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::QueueError;

/// Stream definition trait.
///
/// Each domain implements this once to pin its stream, consumer group and
/// scheduled-set names, keeping producer and worker configuration in sync.
pub trait StreamDef: Send + Sync {
    /// The Redis stream name (e.g. "mail:jobs").
    const STREAM_NAME: &'static str;

    /// The consumer group name for this stream.
    const CONSUMER_GROUP: &'static str;

    /// Sorted set holding future-dated jobs until they are due.
    const SCHEDULED_SET: &'static str;

    /// Maximum stream length before approximate auto-trim (MAXLEN ~).
    const MAX_LENGTH: i64 = 100_000;
}

/// Trait for job payloads carried on a stream.
pub trait QueueJob: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Stable identifier for logging and tracking.
    fn job_id(&self) -> String;
}

/// Trait for job processors.
///
/// Implementations must be idempotent: the queue is at-least-once and the
/// worker will redeliver any entry whose processing did not complete.
#[async_trait]
pub trait JobProcessor<J: QueueJob>: Send + Sync {
    /// Process a single job. `Err` leaves the entry unacknowledged so it is
    /// redelivered after the claim-idle threshold.
    async fn process(&self, job: &J) -> Result<(), QueueError>;

    /// Processor name for logging.
    fn name(&self) -> &'static str;

    /// Health check for readiness probes.
    async fn health_check(&self) -> Result<bool, QueueError> {
        Ok(true)
    }
}
