use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use redis::aio::ConnectionManager;

use crate::consumer::StreamConsumer;
use crate::error::QueueError;
use crate::registry::{JobProcessor, QueueJob, StreamDef};

/// Worker configuration for one stream.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub stream_name: String,
    pub consumer_group: String,
    pub consumer_id: String,
    pub scheduled_set: String,
    pub batch_size: usize,
    /// XREADGROUP BLOCK timeout. The block does the waiting, so the loop
    /// needs no extra poll sleep.
    pub block_timeout_ms: u64,
    /// Idle threshold after which another consumer's delivery is reclaimed.
    pub claim_idle_ms: u64,
    /// How often to scan for abandoned deliveries.
    pub claim_interval: Duration,
}

impl WorkerConfig {
    pub fn from_stream_def<S: StreamDef>(consumer_id: String) -> Self {
        Self {
            stream_name: S::STREAM_NAME.to_string(),
            consumer_group: S::CONSUMER_GROUP.to_string(),
            consumer_id,
            scheduled_set: S::SCHEDULED_SET.to_string(),
            batch_size: 32,
            block_timeout_ms: 2_000,
            claim_idle_ms: 60_000,
            claim_interval: Duration::from_secs(30),
        }
    }
}

/// Generic stream worker: promotes due scheduled jobs, reads new entries,
/// reclaims abandoned ones, and feeds everything to a processor.
///
/// Acknowledgement discipline: an entry is acked only after the processor
/// returns `Ok`. A worker that crashes mid-job leaves the entry pending, and
/// another worker reclaims it after `claim_idle_ms` — at-least-once delivery,
/// which is why every processor must tolerate redelivery.
pub struct StreamWorker<J, P>
where
    J: QueueJob,
    P: JobProcessor<J>,
{
    consumer: StreamConsumer,
    processor: Arc<P>,
    config: WorkerConfig,
    _phantom: PhantomData<J>,
}

impl<J, P> StreamWorker<J, P>
where
    J: QueueJob + 'static,
    P: JobProcessor<J> + 'static,
{
    pub fn new(redis: ConnectionManager, processor: Arc<P>, config: WorkerConfig) -> Self {
        let consumer = StreamConsumer::new(redis, config.clone());
        Self {
            consumer,
            processor,
            config,
            _phantom: PhantomData,
        }
    }

    pub fn consumer(&self) -> &StreamConsumer {
        &self.consumer
    }

    /// Run the worker loop until the shutdown signal flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), QueueError> {
        info!(
            stream = %self.config.stream_name,
            group = %self.config.consumer_group,
            consumer_id = %self.config.consumer_id,
            processor = %self.processor.name(),
            "Starting stream worker"
        );

        self.consumer.ensure_consumer_group().await?;

        let mut last_claim = std::time::Instant::now();
        let mut consecutive_errors: u32 = 0;
        const MAX_BACKOFF_SECS: u64 = 30;

        loop {
            if *shutdown.borrow() {
                info!("Received shutdown signal, stopping worker");
                break;
            }

            match self.tick(&mut last_claim).await {
                Ok(()) => {
                    if consecutive_errors > 0 {
                        info!(consecutive_errors, "Queue connection recovered");
                        consecutive_errors = 0;
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    let backoff_secs =
                        std::cmp::min(2u64.pow(consecutive_errors.min(5)), MAX_BACKOFF_SECS);
                    if e.is_connection_error() {
                        warn!(error = %e, backoff_secs, "Redis connection error, backing off");
                    } else {
                        error!(error = %e, backoff_secs, "Error in worker loop");
                    }

                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(Duration::from_secs(backoff_secs)) => {}
                    }
                }
            }
        }

        info!("Stream worker stopped");
        Ok(())
    }

    async fn tick(&self, last_claim: &mut std::time::Instant) -> Result<(), QueueError> {
        self.consumer.promote_due_jobs().await?;

        let mut batch: Vec<(String, J)> = Vec::new();
        if last_claim.elapsed() >= self.config.claim_interval {
            batch.extend(self.consumer.claim_abandoned::<J>().await?);
            *last_claim = std::time::Instant::now();
        }
        batch.extend(self.consumer.read_new::<J>().await?);

        for (stream_id, job) in batch {
            match self.processor.process(&job).await {
                Ok(()) => {
                    self.consumer.ack(&stream_id).await?;
                }
                Err(e) => {
                    // Leave unacked: the entry is redelivered via the claim
                    // scan once it has sat idle long enough.
                    warn!(
                        stream_id = %stream_id,
                        job_id = %job.job_id(),
                        error = %e,
                        "Job processing failed, leaving for redelivery"
                    );
                }
            }
        }

        Ok(())
    }
}
