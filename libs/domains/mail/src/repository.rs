use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::entity::{BulkJob, Email, EmailEvent, Template, Tenant};
use crate::enums::{BulkStatus, EmailStatus};
use crate::error::MailResult;
use crate::models::{InboundTransition, InsertOutcome, NewBulkJob, NewEmail};

/// One bucket of the analytics event series.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EventBucket {
    pub bucket: DateTime<Utc>,
    pub event_type: String,
    pub count: i64,
}

/// Time granularity for the analytics event series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBucket {
    Hour,
    Day,
}

impl TimeBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeBucket::Hour => "hour",
            TimeBucket::Day => "day",
        }
    }
}

/// Persistence boundary for the delivery core.
///
/// Every multi-row state transition (status change + event append + optional
/// dead letter) commits atomically inside the implementation; callers never
/// observe a partially applied transition. Methods returning `bool` are
/// conditional updates: `false` means the guard did not match and nothing
/// was written.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailRepository: Send + Sync {
    async fn find_active_tenant(&self, tenant_id: &str) -> MailResult<Option<Tenant>>;

    /// Template that is active and owned by the tenant.
    async fn find_active_template(
        &self,
        tenant_id: &str,
        template_id: &str,
    ) -> MailResult<Option<Template>>;

    async fn find_template(&self, template_id: &str) -> MailResult<Option<Template>>;

    async fn find_email(&self, email_id: Uuid) -> MailResult<Option<Email>>;

    async fn find_email_by_provider_message_id(
        &self,
        provider_message_id: &str,
    ) -> MailResult<Option<Email>>;

    /// Insert a new email and its `queued` audit event in one transaction.
    /// A unique-constraint conflict on (tenant, idempotency key) resolves to
    /// `InsertOutcome::Reused` with the pre-existing row; no lock is taken.
    async fn insert_email(&self, email: NewEmail) -> MailResult<InsertOutcome>;

    /// Conditional claim: set status to `processing` iff the current status
    /// is claimable. `false` means another worker advanced the email past
    /// this window.
    async fn claim_for_processing(&self, email_id: Uuid) -> MailResult<bool>;

    /// Terminal success transition: status `sent`, `sent_at` stamped,
    /// provider message id stored, failure reason cleared, `sent` event
    /// appended. Guarded on status `processing`.
    async fn mark_sent(
        &self,
        email_id: Uuid,
        attempt_count: i32,
        provider_message_id: &str,
        event_payload: Value,
    ) -> MailResult<bool>;

    /// Retry transition: status back to `queued`, `next_retry_at` stamped
    /// `delay_seconds` ahead, `retry_scheduled` event appended. Guarded on
    /// status `processing`.
    async fn schedule_retry(
        &self,
        email_id: Uuid,
        attempt_count: i32,
        delay_seconds: u64,
        failure_reason: Option<String>,
        event_payload: Value,
    ) -> MailResult<bool>;

    /// Terminal failure transition: status `failed`, `failed_at` stamped,
    /// `failed` event, dead-letter row, and `dead_lettered` event — all in
    /// one transaction. Guarded on status `processing`, which is what makes
    /// the dead letter exactly-once under redelivery.
    async fn mark_failed(
        &self,
        email_id: Uuid,
        attempt_count: i32,
        reason: &str,
        event_payload: Value,
    ) -> MailResult<bool>;

    /// Record an inbound event in the dedup ledger. `false` means the
    /// (provider, event id) pair was already seen — a replay.
    async fn record_webhook_event(
        &self,
        provider: &str,
        provider_event_id: &str,
        tenant_id: Option<String>,
        payload_hash: &str,
    ) -> MailResult<bool>;

    /// Apply a permitted inbound transition plus its audit event atomically.
    /// The update is re-guarded on the transition's permitted statuses so a
    /// race with the outbound path cannot lose writes.
    async fn apply_inbound_transition(
        &self,
        email_id: Uuid,
        transition: InboundTransition,
        provider: &str,
        provider_event_id: &str,
        event_payload: Value,
    ) -> MailResult<bool>;

    async fn insert_bulk_job(&self, job: NewBulkJob) -> MailResult<BulkJob>;

    async fn find_bulk_job(&self, bulk_id: Uuid) -> MailResult<Option<BulkJob>>;

    async fn update_bulk_job(
        &self,
        bulk_id: Uuid,
        status: BulkStatus,
        queued_count: i32,
    ) -> MailResult<bool>;

    /// Audit trail for one email, in commit order.
    async fn list_events(&self, email_id: Uuid) -> MailResult<Vec<EmailEvent>>;

    /// Email counts per status for a tenant and window.
    async fn status_totals(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        template_id: Option<String>,
    ) -> MailResult<Vec<(EmailStatus, i64)>>;

    /// Event counts bucketed by hour or day for a tenant and window.
    async fn event_series(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        bucket: TimeBucket,
    ) -> MailResult<Vec<EventBucket>>;
}
