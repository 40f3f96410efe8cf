use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::QueueError;
use crate::registry::StreamDef;

/// When an enqueued job should become eligible for delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Deliver as soon as a worker reads the stream.
    Now,
    /// Deliver at a wall-clock time.
    At(DateTime<Utc>),
    /// Deliver after a delay from now.
    After(Duration),
}

impl Schedule {
    /// Resolve to an absolute run-at time, or `None` for immediate dispatch.
    /// A run-at in the past collapses to immediate dispatch.
    pub fn run_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Now => None,
            Schedule::At(at) => (*at > now).then_some(*at),
            Schedule::After(delay) => {
                let at = now + chrono::Duration::from_std(*delay).unwrap_or_default();
                (at > now).then_some(at)
            }
        }
    }
}

/// Producer for enqueuing jobs onto a stream.
///
/// Immediate jobs go straight onto the stream with `XADD`. Future-dated jobs
/// park in a sorted set scored by their run-at epoch; the worker promotes
/// them onto the stream once due.
pub struct StreamProducer {
    redis: ConnectionManager,
    stream_name: String,
    scheduled_set: String,
    max_length: i64,
}

impl StreamProducer {
    /// Create a producer from a `StreamDef` implementation.
    pub fn from_stream_def<S: StreamDef>(redis: ConnectionManager) -> Self {
        Self {
            redis,
            stream_name: S::STREAM_NAME.to_string(),
            scheduled_set: S::SCHEDULED_SET.to_string(),
            max_length: S::MAX_LENGTH,
        }
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Enqueue a job for immediate delivery. Returns the stream entry id.
    pub async fn send<J: Serialize>(&self, job: &J) -> Result<String, QueueError> {
        let mut conn = self.redis.clone();
        let job_json = serde_json::to_string(job)?;

        let stream_id: String = redis::cmd("XADD")
            .arg(&self.stream_name)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_length)
            .arg("*")
            .arg("job")
            .arg(&job_json)
            .query_async(&mut conn)
            .await?;

        debug!(stream = %self.stream_name, stream_id = %stream_id, "Enqueued job");
        Ok(stream_id)
    }

    /// Enqueue a job honoring a schedule.
    ///
    /// Sorted-set members are prefixed with a fresh uuid so two jobs with
    /// identical payloads (e.g. successive retries of the same email) never
    /// collapse into one entry.
    pub async fn send_scheduled<J: Serialize>(
        &self,
        job: &J,
        schedule: Schedule,
    ) -> Result<(), QueueError> {
        match schedule.run_at(Utc::now()) {
            None => {
                self.send(job).await?;
            }
            Some(run_at) => {
                let mut conn = self.redis.clone();
                let job_json = serde_json::to_string(job)?;
                let member = format!("{}:{}", Uuid::new_v4(), job_json);

                let _: i64 = redis::cmd("ZADD")
                    .arg(&self.scheduled_set)
                    .arg(run_at.timestamp())
                    .arg(&member)
                    .query_async(&mut conn)
                    .await?;

                debug!(
                    set = %self.scheduled_set,
                    run_at = %run_at,
                    "Parked scheduled job"
                );
            }
        }
        Ok(())
    }
}

impl Clone for StreamProducer {
    fn clone(&self) -> Self {
        Self {
            redis: self.redis.clone(),
            stream_name: self.stream_name.clone(),
            scheduled_set: self.scheduled_set.clone(),
            max_length: self.max_length,
        }
    }
}
