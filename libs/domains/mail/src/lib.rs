//! Transactional-email delivery core.
//!
//! Tenants submit send requests that must reach their recipients
//! exactly-once-effectively on top of an at-least-once job queue and
//! unreliable providers. The pieces:
//!
//! - intake ([`service::MailService`]) dedups by (tenant, idempotency key)
//!   against the store's unique constraint and schedules one processing job
//!   per created email,
//! - the delivery state machine ([`delivery::DeliveryService`]) claims an
//!   email, renders it, dispatches to a provider and drives status forward
//!   with retry scheduling and dead-lettering,
//! - webhook ingestion ([`webhook::WebhookService`]) verifies, dedups and
//!   applies inbound provider events under a monotonic transition table,
//! - [`rate_limit::RateLimiter`] enforces fixed-window quotas per tenant and
//!   per (tenant, provider).

pub mod analytics;
pub mod bulk;
pub mod delivery;
pub mod entity;
pub mod enums;
pub mod error;
pub mod models;
pub mod postgres;
pub mod processor;
pub mod providers;
pub mod rate_limit;
pub mod repository;
pub mod retry;
pub mod service;
pub mod signature;
pub mod streams;
pub mod templates;
pub mod webhook;

pub use entity::{BulkJob, DeadLetter, Email, EmailEvent, Template, Tenant};
pub use enums::{BulkStatus, EmailStatus, EventType, TenantStatus};
pub use error::{MailError, MailResult};
pub use models::{
    BulkRecipient, BulkSendRequest, InboundEvent, InboundTransition, InsertOutcome, NewBulkJob,
    NewEmail, Recipient, SendOutcome, SendRequest,
};
pub use postgres::PgMailRepository;
pub use repository::MailRepository;
pub use streams::{JobScheduler, MailJob, MailStream, StreamJobScheduler};
