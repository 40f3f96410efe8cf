//! SeaORM entities for the persisted entity set.
//!
//! The unique indexes on `emails (tenant_id, idempotency_key)` and
//! `provider_webhook_events (provider, provider_event_id)` are load-bearing:
//! intake dedup and webhook replay protection rely on them, not on locks.

pub mod bulk_job;
pub mod dead_letter;
pub mod email;
pub mod email_event;
pub mod template;
pub mod tenant;
pub mod webhook_event;

pub use bulk_job::Model as BulkJob;
pub use dead_letter::Model as DeadLetter;
pub use email::Model as Email;
pub use email_event::Model as EmailEvent;
pub use template::Model as Template;
pub use tenant::Model as Tenant;
pub use webhook_event::Model as ProviderWebhookEvent;
