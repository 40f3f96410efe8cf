use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::RedisResult;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::QueueError;
use crate::registry::StreamDef;
use crate::worker::WorkerConfig;

/// Consumer-group operations against one stream.
pub struct StreamConsumer {
    redis: ConnectionManager,
    config: WorkerConfig,
}

impl StreamConsumer {
    pub fn new(redis: ConnectionManager, config: WorkerConfig) -> Self {
        Self { redis, config }
    }

    pub fn redis(&self) -> ConnectionManager {
        self.redis.clone()
    }

    /// Create the consumer group if it does not exist yet.
    pub async fn ensure_consumer_group(&self) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();

        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => {
                info!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Created consumer group"
                );
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(QueueError::Redis(e)),
        }
    }

    /// Move due entries from the scheduled sorted set onto the stream.
    pub async fn promote_due_jobs(&self) -> Result<usize, QueueError> {
        let mut conn = self.redis.clone();
        let now = Utc::now().timestamp();

        let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(&self.config.scheduled_set)
            .arg("-inf")
            .arg(now)
            .arg("LIMIT")
            .arg(0)
            .arg(self.config.batch_size)
            .query_async(&mut conn)
            .await?;

        let mut promoted = 0;
        for member in due {
            // Only promote members we manage to remove; another worker racing
            // on the same entry gets rows_removed == 0 and skips it.
            let removed: i64 = redis::cmd("ZREM")
                .arg(&self.config.scheduled_set)
                .arg(&member)
                .query_async(&mut conn)
                .await?;
            if removed == 0 {
                continue;
            }

            // Member layout: "{uuid}:{job json}".
            let payload = member.splitn(2, ':').nth(1).unwrap_or(&member);
            let _: String = redis::cmd("XADD")
                .arg(&self.config.stream_name)
                .arg("*")
                .arg("job")
                .arg(payload)
                .query_async(&mut conn)
                .await?;
            promoted += 1;
        }

        if promoted > 0 {
            debug!(count = promoted, "Promoted scheduled jobs");
        }
        Ok(promoted)
    }

    /// Read new messages for this consumer, blocking up to the configured
    /// timeout when the stream is idle.
    pub async fn read_new<J: DeserializeOwned>(
        &self,
    ) -> Result<Vec<(String, J)>, QueueError> {
        let mut conn = self.redis.clone();

        let result: RedisResult<Option<Vec<(String, Vec<(String, Vec<(String, String)>)>)>>> =
            redis::cmd("XREADGROUP")
                .arg("GROUP")
                .arg(&self.config.consumer_group)
                .arg(&self.config.consumer_id)
                .arg("BLOCK")
                .arg(self.config.block_timeout_ms)
                .arg("COUNT")
                .arg(self.config.batch_size)
                .arg("STREAMS")
                .arg(&self.config.stream_name)
                .arg(">")
                .query_async(&mut conn)
                .await;

        match result {
            Ok(Some(streams)) => self.parse_streams(streams).await,
            Ok(None) => Ok(vec![]),
            Err(e) if e.to_string().contains("NOGROUP") => Ok(vec![]),
            Err(e) => Err(QueueError::Redis(e)),
        }
    }

    /// Claim entries another consumer read but never acknowledged.
    ///
    /// This is the redelivery path for workers that died mid-processing.
    pub async fn claim_abandoned<J: DeserializeOwned>(
        &self,
    ) -> Result<Vec<(String, J)>, QueueError> {
        let mut conn = self.redis.clone();

        let pending: RedisResult<Vec<(String, String, i64, i64)>> = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("-")
            .arg("+")
            .arg(self.config.batch_size)
            .query_async(&mut conn)
            .await;

        let pending = match pending {
            Ok(p) => p,
            Err(e) if e.to_string().contains("NOGROUP") => return Ok(vec![]),
            Err(e) => return Err(QueueError::Redis(e)),
        };

        let claim_ids: Vec<String> = pending
            .iter()
            .filter(|(_, _, idle_ms, _)| *idle_ms > self.config.claim_idle_ms as i64)
            .map(|(id, _, _, _)| id.clone())
            .collect();

        if claim_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id)
            .arg(self.config.claim_idle_ms);
        for id in &claim_ids {
            cmd.arg(id);
        }

        let entries: Vec<(String, Vec<(String, String)>)> = cmd.query_async(&mut conn).await?;
        let jobs = self.parse_entries(entries).await?;
        if !jobs.is_empty() {
            warn!(count = jobs.len(), "Claimed abandoned messages");
        }
        Ok(jobs)
    }

    /// Acknowledge a processed message.
    pub async fn ack(&self, stream_id: &str) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();

        let _: i64 = redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(stream_id)
            .query_async(&mut conn)
            .await?;

        debug!(stream_id = %stream_id, "Acknowledged message");
        Ok(())
    }

    async fn parse_streams<J: DeserializeOwned>(
        &self,
        streams: Vec<(String, Vec<(String, Vec<(String, String)>)>)>,
    ) -> Result<Vec<(String, J)>, QueueError> {
        let mut jobs = Vec::new();
        for (_stream, entries) in streams {
            jobs.extend(self.parse_entries(entries).await?);
        }
        Ok(jobs)
    }

    /// Parse stream entries; unparsable entries are acknowledged and dropped
    /// so a poison payload cannot be redelivered forever.
    async fn parse_entries<J: DeserializeOwned>(
        &self,
        entries: Vec<(String, Vec<(String, String)>)>,
    ) -> Result<Vec<(String, J)>, QueueError> {
        let mut jobs = Vec::new();

        for (stream_id, fields) in entries {
            let payload = fields
                .iter()
                .find(|(k, _)| k == "job")
                .map(|(_, v)| v.as_str());

            match payload.map(serde_json::from_str::<J>) {
                Some(Ok(job)) => jobs.push((stream_id, job)),
                Some(Err(e)) => {
                    warn!(stream_id = %stream_id, error = %e, "Discarding unparsable job");
                    self.ack(&stream_id).await?;
                }
                None => {
                    warn!(stream_id = %stream_id, "Discarding message without 'job' field");
                    self.ack(&stream_id).await?;
                }
            }
        }

        Ok(jobs)
    }
}

impl StreamConsumer {
    /// Convenience constructor matching a `StreamDef`.
    pub fn from_stream_def<S: StreamDef>(redis: ConnectionManager, consumer_id: String) -> Self {
        Self::new(redis, WorkerConfig::from_stream_def::<S>(consumer_id))
    }
}
