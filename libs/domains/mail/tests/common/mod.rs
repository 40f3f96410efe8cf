//! In-memory test doubles mirroring the PostgreSQL repository semantics:
//! uniqueness on (tenant, idempotency key) and (provider, event id),
//! conditional claims, and status-guarded transitions.

// Each test binary uses its own subset of these helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::sync::Mutex;
use uuid::Uuid;

use domain_mail::entity::{BulkJob, DeadLetter, Email, EmailEvent, Template, Tenant};
use domain_mail::enums::{BulkStatus, EmailStatus, EventType, TenantStatus};
use domain_mail::error::MailResult;
use domain_mail::models::{InboundTransition, InsertOutcome, NewBulkJob, NewEmail};
use domain_mail::repository::{EventBucket, MailRepository, TimeBucket};
use domain_mail::streams::{JobScheduler, MailJob};
use domain_mail::providers::{EmailMessage, EmailProvider, ProviderResponse};
use stream_queue::Schedule;

#[derive(Default)]
struct State {
    tenants: Vec<Tenant>,
    templates: Vec<Template>,
    emails: Vec<Email>,
    events: Vec<EmailEvent>,
    webhook_events: Vec<(String, String)>,
    dead_letters: Vec<DeadLetter>,
    bulk_jobs: Vec<BulkJob>,
    next_event_id: i32,
}

#[derive(Default)]
pub struct InMemoryMailRepository {
    state: Mutex<State>,
}

impl InMemoryMailRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_tenant(&self, id: &str, status: TenantStatus) {
        self.state.lock().unwrap().tenants.push(Tenant {
            id: id.to_string(),
            name: format!("tenant {id}"),
            status,
            created_at: Utc::now().into(),
        });
    }

    pub fn seed_template(&self, id: &str, tenant_id: &str, subject: &str, html: &str) {
        self.state.lock().unwrap().templates.push(Template {
            id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            name: id.to_string(),
            version: 1,
            subject_template: subject.to_string(),
            html_template: html.to_string(),
            text_template: None,
            is_active: true,
            created_at: Utc::now().into(),
        });
    }

    pub fn email(&self, email_id: Uuid) -> Email {
        self.state
            .lock()
            .unwrap()
            .emails
            .iter()
            .find(|e| e.id == email_id)
            .cloned()
            .expect("email exists")
    }

    pub fn event_types(&self, email_id: Uuid) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.email_id == email_id)
            .map(|e| e.event_type.clone())
            .collect()
    }

    pub fn dead_letter_count(&self, email_id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .dead_letters
            .iter()
            .filter(|d| d.email_id == email_id)
            .count()
    }

    pub fn webhook_event_count(&self) -> usize {
        self.state.lock().unwrap().webhook_events.len()
    }

    pub fn find_bulk_job_sync(&self, bulk_id: Uuid) -> BulkJob {
        self.state
            .lock()
            .unwrap()
            .bulk_jobs
            .iter()
            .find(|j| j.id == bulk_id)
            .cloned()
            .expect("bulk job exists")
    }

    fn push_event(
        state: &mut State,
        email: &Email,
        event_type: EventType,
        provider_event_id: Option<String>,
        payload: Value,
    ) {
        state.next_event_id += 1;
        let now = Utc::now();
        state.events.push(EmailEvent {
            id: state.next_event_id,
            email_id: email.id,
            tenant_id: email.tenant_id.clone(),
            event_type: event_type.to_string(),
            event_time: now.into(),
            provider: Some(email.provider_name.clone()),
            provider_event_id,
            payload,
            created_at: now.into(),
        });
    }
}

#[async_trait]
impl MailRepository for InMemoryMailRepository {
    async fn find_active_tenant(&self, tenant_id: &str) -> MailResult<Option<Tenant>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tenants
            .iter()
            .find(|t| t.id == tenant_id && t.status == TenantStatus::Active)
            .cloned())
    }

    async fn find_active_template(
        &self,
        tenant_id: &str,
        template_id: &str,
    ) -> MailResult<Option<Template>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .templates
            .iter()
            .find(|t| t.id == template_id && t.tenant_id == tenant_id && t.is_active)
            .cloned())
    }

    async fn find_template(&self, template_id: &str) -> MailResult<Option<Template>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .templates
            .iter()
            .find(|t| t.id == template_id)
            .cloned())
    }

    async fn find_email(&self, email_id: Uuid) -> MailResult<Option<Email>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .emails
            .iter()
            .find(|e| e.id == email_id)
            .cloned())
    }

    async fn find_email_by_provider_message_id(
        &self,
        provider_message_id: &str,
    ) -> MailResult<Option<Email>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .emails
            .iter()
            .find(|e| e.provider_message_id.as_deref() == Some(provider_message_id))
            .cloned())
    }

    async fn insert_email(&self, new_email: NewEmail) -> MailResult<InsertOutcome> {
        let mut state = self.state.lock().unwrap();

        if let Some(existing) = state
            .emails
            .iter()
            .find(|e| {
                e.tenant_id == new_email.tenant_id
                    && e.idempotency_key == new_email.idempotency_key
            })
            .cloned()
        {
            return Ok(InsertOutcome::Reused(existing));
        }

        let now = Utc::now();
        let scheduled = new_email.scheduled_at.is_some();
        let email = Email {
            id: Uuid::now_v7(),
            tenant_id: new_email.tenant_id,
            idempotency_key: new_email.idempotency_key,
            recipient_email: new_email.recipient_email,
            recipient_name: new_email.recipient_name,
            template_id: new_email.template_id,
            variables: new_email.variables,
            metadata: new_email.metadata,
            provider_name: new_email.provider_name,
            provider_message_id: None,
            status: new_email.status,
            scheduled_at: new_email.scheduled_at.map(Into::into),
            sent_at: None,
            delivered_at: None,
            opened_at: None,
            failed_at: None,
            failure_reason: None,
            attempt_count: 0,
            next_retry_at: None,
            created_at: now.into(),
            updated_at: now.into(),
        };
        state.emails.push(email.clone());
        Self::push_event(
            &mut state,
            &email,
            EventType::Queued,
            None,
            json!({ "scheduled": scheduled }),
        );
        Ok(InsertOutcome::Created(email))
    }

    async fn claim_for_processing(&self, email_id: Uuid) -> MailResult<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(email) = state.emails.iter_mut().find(|e| e.id == email_id) else {
            return Ok(false);
        };
        if !EmailStatus::CLAIMABLE.contains(&email.status) {
            return Ok(false);
        }
        email.status = EmailStatus::Processing;
        email.updated_at = Utc::now().into();
        Ok(true)
    }

    async fn mark_sent(
        &self,
        email_id: Uuid,
        attempt_count: i32,
        provider_message_id: &str,
        event_payload: Value,
    ) -> MailResult<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(index) = state
            .emails
            .iter()
            .position(|e| e.id == email_id && e.status == EmailStatus::Processing)
        else {
            return Ok(false);
        };

        let now = Utc::now();
        {
            let email = &mut state.emails[index];
            email.status = EmailStatus::Sent;
            email.sent_at = Some(now.into());
            email.provider_message_id = Some(provider_message_id.to_string());
            email.failure_reason = None;
            email.attempt_count = attempt_count;
            email.updated_at = now.into();
        }
        let email = state.emails[index].clone();
        Self::push_event(&mut state, &email, EventType::Sent, None, event_payload);
        Ok(true)
    }

    async fn schedule_retry(
        &self,
        email_id: Uuid,
        attempt_count: i32,
        delay_seconds: u64,
        failure_reason: Option<String>,
        event_payload: Value,
    ) -> MailResult<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(index) = state
            .emails
            .iter()
            .position(|e| e.id == email_id && e.status == EmailStatus::Processing)
        else {
            return Ok(false);
        };

        let now = Utc::now();
        {
            let email = &mut state.emails[index];
            email.status = EmailStatus::Queued;
            email.failure_reason = failure_reason;
            email.next_retry_at =
                Some((now + chrono::Duration::seconds(delay_seconds as i64)).into());
            email.attempt_count = attempt_count;
            email.updated_at = now.into();
        }
        let email = state.emails[index].clone();
        Self::push_event(
            &mut state,
            &email,
            EventType::RetryScheduled,
            None,
            event_payload,
        );
        Ok(true)
    }

    async fn mark_failed(
        &self,
        email_id: Uuid,
        attempt_count: i32,
        reason: &str,
        event_payload: Value,
    ) -> MailResult<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(index) = state
            .emails
            .iter()
            .position(|e| e.id == email_id && e.status == EmailStatus::Processing)
        else {
            return Ok(false);
        };

        let now = Utc::now();
        {
            let email = &mut state.emails[index];
            email.status = EmailStatus::Failed;
            email.failed_at = Some(now.into());
            email.failure_reason = Some(reason.to_string());
            email.attempt_count = attempt_count;
            email.updated_at = now.into();
        }
        let email = state.emails[index].clone();
        Self::push_event(&mut state, &email, EventType::Failed, None, event_payload);

        let dead_letter_id = state.dead_letters.len() as i32 + 1;
        state.dead_letters.push(DeadLetter {
            id: dead_letter_id,
            email_id: email.id,
            tenant_id: email.tenant_id.clone(),
            last_error: reason.to_string(),
            attempt_count,
            moved_at: now.into(),
            payload: json!({ "provider": email.provider_name }),
        });
        Self::push_event(
            &mut state,
            &email,
            EventType::DeadLettered,
            None,
            json!({ "reason": reason }),
        );
        Ok(true)
    }

    async fn record_webhook_event(
        &self,
        provider: &str,
        provider_event_id: &str,
        _tenant_id: Option<String>,
        _payload_hash: &str,
    ) -> MailResult<bool> {
        let mut state = self.state.lock().unwrap();
        let key = (provider.to_string(), provider_event_id.to_string());
        if state.webhook_events.contains(&key) {
            return Ok(false);
        }
        state.webhook_events.push(key);
        Ok(true)
    }

    async fn apply_inbound_transition(
        &self,
        email_id: Uuid,
        transition: InboundTransition,
        _provider: &str,
        provider_event_id: &str,
        event_payload: Value,
    ) -> MailResult<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(index) = state.emails.iter().position(|e| {
            e.id == email_id && transition.permitted_from().contains(&e.status)
        }) else {
            return Ok(false);
        };

        let now = Utc::now();
        {
            let email = &mut state.emails[index];
            email.status = transition.new_status();
            email.updated_at = now.into();
            match &transition {
                InboundTransition::Delivered => email.delivered_at = Some(now.into()),
                InboundTransition::Opened => email.opened_at = Some(now.into()),
                InboundTransition::Failed { reason } => {
                    email.failed_at = Some(now.into());
                    email.failure_reason = Some(reason.clone());
                }
            }
        }
        let email = state.emails[index].clone();
        Self::push_event(
            &mut state,
            &email,
            transition.event_type(),
            Some(provider_event_id.to_string()),
            event_payload,
        );
        Ok(true)
    }

    async fn insert_bulk_job(&self, job: NewBulkJob) -> MailResult<BulkJob> {
        let mut state = self.state.lock().unwrap();
        let created = BulkJob {
            id: Uuid::now_v7(),
            tenant_id: job.tenant_id,
            template_id: job.template_id,
            total_count: job.total_count,
            queued_count: 0,
            status: BulkStatus::Queued,
            created_at: Utc::now().into(),
        };
        state.bulk_jobs.push(created.clone());
        Ok(created)
    }

    async fn find_bulk_job(&self, bulk_id: Uuid) -> MailResult<Option<BulkJob>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .bulk_jobs
            .iter()
            .find(|j| j.id == bulk_id)
            .cloned())
    }

    async fn update_bulk_job(
        &self,
        bulk_id: Uuid,
        status: BulkStatus,
        queued_count: i32,
    ) -> MailResult<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(job) = state.bulk_jobs.iter_mut().find(|j| j.id == bulk_id) else {
            return Ok(false);
        };
        job.status = status;
        job.queued_count = queued_count;
        Ok(true)
    }

    async fn list_events(&self, email_id: Uuid) -> MailResult<Vec<EmailEvent>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.email_id == email_id)
            .cloned()
            .collect())
    }

    async fn status_totals(
        &self,
        tenant_id: &str,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
        template_id: Option<String>,
    ) -> MailResult<Vec<(EmailStatus, i64)>> {
        let state = self.state.lock().unwrap();
        let mut totals: std::collections::HashMap<EmailStatus, i64> = Default::default();
        for email in state.emails.iter().filter(|e| {
            e.tenant_id == tenant_id
                && template_id
                    .as_deref()
                    .is_none_or(|t| e.template_id == t)
        }) {
            *totals.entry(email.status).or_default() += 1;
        }
        Ok(totals.into_iter().collect())
    }

    async fn event_series(
        &self,
        _tenant_id: &str,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
        _bucket: TimeBucket,
    ) -> MailResult<Vec<EventBucket>> {
        Ok(vec![])
    }
}

/// Scheduler double that records every request.
#[derive(Default)]
pub struct RecordingScheduler {
    jobs: Mutex<Vec<(MailJob, Schedule)>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<(MailJob, Schedule)> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

#[async_trait]
impl JobScheduler for RecordingScheduler {
    async fn schedule(&self, job: MailJob, schedule: Schedule) -> MailResult<()> {
        self.jobs.lock().unwrap().push((job, schedule));
        Ok(())
    }
}

/// Provider double that always rejects transiently, for retry-path tests.
pub struct AlwaysTransientProvider;

#[async_trait]
impl EmailProvider for AlwaysTransientProvider {
    async fn send(&self, _message: &EmailMessage) -> ProviderResponse {
        ProviderResponse::rejected("smtp_451", true, "451", "temporary local problem")
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

impl std::fmt::Debug for InMemoryMailRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InMemoryMailRepository")
    }
}
