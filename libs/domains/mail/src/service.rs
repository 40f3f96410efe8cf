//! Idempotent intake and email lookup.

use core_config::mail::MailConfig;
use std::sync::Arc;
use stream_queue::Schedule;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::entity::{Email, EmailEvent};
use crate::enums::EmailStatus;
use crate::error::{MailError, MailResult};
use crate::models::{InsertOutcome, NewEmail, SendOutcome, SendRequest};
use crate::repository::MailRepository;
use crate::streams::{JobScheduler, MailJob};

/// Intake service: turns a validated send request into exactly one stored
/// email and exactly one scheduled processing job, no matter how many times
/// the request is retransmitted.
#[derive(Clone)]
pub struct MailService {
    repo: Arc<dyn MailRepository>,
    scheduler: Arc<dyn JobScheduler>,
    config: MailConfig,
}

impl MailService {
    pub fn new(
        repo: Arc<dyn MailRepository>,
        scheduler: Arc<dyn JobScheduler>,
        config: MailConfig,
    ) -> Self {
        Self {
            repo,
            scheduler,
            config,
        }
    }

    /// Create a new email for the request, or return the pre-existing one
    /// for this (tenant, idempotency key) pair.
    ///
    /// Tenant and template are re-validated here so nothing is persisted for
    /// disabled tenants or inactive/foreign templates. Only a freshly
    /// created email schedules a processing job; a reused row schedules
    /// nothing.
    pub async fn enqueue_send(&self, request: SendRequest) -> MailResult<SendOutcome> {
        request
            .validate()
            .map_err(|e| MailError::Validation(e.to_string()))?;

        self.repo
            .find_active_tenant(&request.tenant_id)
            .await?
            .ok_or_else(|| MailError::Validation("tenant not found or disabled".to_string()))?;

        self.repo
            .find_active_template(&request.tenant_id, &request.template_id)
            .await?
            .ok_or_else(|| MailError::Validation("template not found".to_string()))?;

        let provider_name = request
            .provider_hint
            .clone()
            .unwrap_or_else(|| self.config.default_provider.clone());

        let status = if request.send_at.is_some() {
            EmailStatus::Scheduled
        } else {
            EmailStatus::Queued
        };

        let new_email = NewEmail {
            tenant_id: request.tenant_id.clone(),
            idempotency_key: request.idempotency_key.clone(),
            recipient_email: request.recipient.email.clone(),
            recipient_name: request.recipient.name.clone(),
            template_id: request.template_id.clone(),
            variables: request.variables.clone(),
            metadata: request.metadata.clone(),
            provider_name,
            status,
            scheduled_at: request.send_at,
        };

        match self.repo.insert_email(new_email).await? {
            InsertOutcome::Created(email) => {
                let schedule = match email.scheduled_at {
                    Some(at) => Schedule::At(at.to_utc()),
                    None => Schedule::Now,
                };
                self.scheduler
                    .schedule(MailJob::ProcessEmail { email_id: email.id }, schedule)
                    .await?;

                info!(
                    email_id = %email.id,
                    tenant_id = %email.tenant_id,
                    provider = %email.provider_name,
                    scheduled = email.scheduled_at.is_some(),
                    "Accepted send request"
                );
                Ok(SendOutcome {
                    email,
                    reused: false,
                })
            }
            InsertOutcome::Reused(email) => Ok(SendOutcome {
                email,
                reused: true,
            }),
        }
    }

    pub async fn get_email(&self, email_id: Uuid) -> MailResult<Email> {
        self.repo
            .find_email(email_id)
            .await?
            .ok_or_else(|| MailError::NotFound(format!("email {email_id}")))
    }

    pub async fn get_email_events(&self, email_id: Uuid) -> MailResult<Vec<EmailEvent>> {
        // 404 for unknown emails rather than an empty audit trail.
        self.get_email(email_id).await?;
        self.repo.list_events(email_id).await
    }

    pub fn config(&self) -> &MailConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Recipient;
    use crate::repository::MockMailRepository;
    use crate::streams::MockJobScheduler;
    use chrono::Utc;
    use mockall::predicate::{always, eq};
    use serde_json::json;

    fn request() -> SendRequest {
        SendRequest {
            tenant_id: "t1".to_string(),
            recipient: Recipient {
                email: "a@x.com".to_string(),
                name: None,
            },
            template_id: "tpl1".to_string(),
            variables: json!({"name": "Ada"}),
            metadata: json!({}),
            provider_hint: None,
            send_at: None,
            idempotency_key: "k1".to_string(),
        }
    }

    fn tenant() -> crate::entity::Tenant {
        crate::entity::Tenant {
            id: "t1".to_string(),
            name: "Tenant One".to_string(),
            status: crate::enums::TenantStatus::Active,
            created_at: Utc::now().into(),
        }
    }

    fn template() -> crate::entity::Template {
        crate::entity::Template {
            id: "tpl1".to_string(),
            tenant_id: "t1".to_string(),
            name: "welcome".to_string(),
            version: 1,
            subject_template: "Hello {{name}}".to_string(),
            html_template: "<p>{{name}}</p>".to_string(),
            text_template: None,
            is_active: true,
            created_at: Utc::now().into(),
        }
    }

    fn stored_email(status: EmailStatus) -> Email {
        Email {
            id: Uuid::now_v7(),
            tenant_id: "t1".to_string(),
            idempotency_key: "k1".to_string(),
            recipient_email: "a@x.com".to_string(),
            recipient_name: None,
            template_id: "tpl1".to_string(),
            variables: json!({"name": "Ada"}),
            metadata: json!({}),
            provider_name: "mock".to_string(),
            provider_message_id: None,
            status,
            scheduled_at: None,
            sent_at: None,
            delivered_at: None,
            opened_at: None,
            failed_at: None,
            failure_reason: None,
            attempt_count: 0,
            next_retry_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_unknown_tenant_rejected_before_persistence() {
        let mut repo = MockMailRepository::new();
        repo.expect_find_active_tenant()
            .with(eq("t1"))
            .returning(|_| Ok(None));
        repo.expect_insert_email().never();
        let scheduler = MockJobScheduler::new();

        let service = MailService::new(
            Arc::new(repo),
            Arc::new(scheduler),
            MailConfig::for_tests(),
        );
        let err = service.enqueue_send(request()).await.unwrap_err();
        assert!(matches!(err, MailError::Validation(_)));
        assert!(err.to_string().contains("tenant"));
    }

    #[tokio::test]
    async fn test_inactive_template_rejected_before_persistence() {
        let mut repo = MockMailRepository::new();
        repo.expect_find_active_tenant().returning(|_| Ok(Some(tenant())));
        repo.expect_find_active_template()
            .with(eq("t1"), eq("tpl1"))
            .returning(|_, _| Ok(None));
        repo.expect_insert_email().never();

        let service = MailService::new(
            Arc::new(repo),
            Arc::new(MockJobScheduler::new()),
            MailConfig::for_tests(),
        );
        let err = service.enqueue_send(request()).await.unwrap_err();
        assert!(err.to_string().contains("template"));
    }

    #[tokio::test]
    async fn test_created_email_schedules_exactly_one_job() {
        let email = stored_email(EmailStatus::Queued);
        let email_id = email.id;

        let mut repo = MockMailRepository::new();
        repo.expect_find_active_tenant().returning(|_| Ok(Some(tenant())));
        repo.expect_find_active_template()
            .returning(|_, _| Ok(Some(template())));
        repo.expect_insert_email()
            .times(1)
            .return_once(move |_| Ok(InsertOutcome::Created(email)));

        let mut scheduler = MockJobScheduler::new();
        scheduler
            .expect_schedule()
            .with(eq(MailJob::ProcessEmail { email_id }), eq(Schedule::Now))
            .times(1)
            .returning(|_, _| Ok(()));

        let service = MailService::new(
            Arc::new(repo),
            Arc::new(scheduler),
            MailConfig::for_tests(),
        );
        let outcome = service.enqueue_send(request()).await.unwrap();
        assert!(!outcome.reused);
        assert_eq!(outcome.email.id, email_id);
    }

    #[tokio::test]
    async fn test_reused_email_schedules_nothing() {
        let email = stored_email(EmailStatus::Queued);
        let email_id = email.id;

        let mut repo = MockMailRepository::new();
        repo.expect_find_active_tenant().returning(|_| Ok(Some(tenant())));
        repo.expect_find_active_template()
            .returning(|_, _| Ok(Some(template())));
        repo.expect_insert_email()
            .return_once(move |_| Ok(InsertOutcome::Reused(email)));

        let mut scheduler = MockJobScheduler::new();
        scheduler.expect_schedule().never();

        let service = MailService::new(
            Arc::new(repo),
            Arc::new(scheduler),
            MailConfig::for_tests(),
        );
        let outcome = service.enqueue_send(request()).await.unwrap();
        assert!(outcome.reused);
        assert_eq!(outcome.email.id, email_id);
    }

    #[tokio::test]
    async fn test_future_send_is_scheduled_at_its_time() {
        let send_at = Utc::now() + chrono::Duration::hours(2);
        let mut email = stored_email(EmailStatus::Scheduled);
        email.scheduled_at = Some(send_at.into());

        let mut repo = MockMailRepository::new();
        repo.expect_find_active_tenant().returning(|_| Ok(Some(tenant())));
        repo.expect_find_active_template()
            .returning(|_, _| Ok(Some(template())));
        repo.expect_insert_email()
            .withf(|new_email| new_email.status == EmailStatus::Scheduled)
            .return_once(move |_| Ok(InsertOutcome::Created(email)));

        let mut scheduler = MockJobScheduler::new();
        scheduler
            .expect_schedule()
            .with(always(), eq(Schedule::At(send_at)))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut request = request();
        request.send_at = Some(send_at);

        let service = MailService::new(
            Arc::new(repo),
            Arc::new(scheduler),
            MailConfig::for_tests(),
        );
        let outcome = service.enqueue_send(request).await.unwrap();
        assert!(!outcome.reused);
    }
}
