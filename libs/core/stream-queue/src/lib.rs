//! Redis Streams job boundary.
//!
//! The engine's durable queue contract is small: jobs are enqueued for
//! immediate, at-time, or delay-from-now dispatch, and workers receive them
//! at least once. This crate implements that contract on Redis Streams:
//!
//! - [`StreamProducer`] appends jobs with `XADD`; future-dated jobs park in a
//!   sorted set scored by their run-at time.
//! - [`StreamWorker`] runs a consumer-group loop: promotes due jobs from the
//!   sorted set, reads new entries, reclaims deliveries abandoned by crashed
//!   workers, and acknowledges only after processing succeeds. Redelivery of
//!   unacknowledged entries is what makes the queue at-least-once, so job
//!   handlers must be idempotent.

mod consumer;
mod error;
mod producer;
mod registry;
mod worker;

pub use consumer::StreamConsumer;
pub use error::QueueError;
pub use producer::{Schedule, StreamProducer};
pub use registry::{JobProcessor, QueueJob, StreamDef};
pub use worker::{StreamWorker, WorkerConfig};
