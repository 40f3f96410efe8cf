//! Inbound delivery-event ingestion.
//!
//! Pipeline per event: verify authenticity, write the dedup ledger row,
//! locate the email, apply the rule-table transition, and append the audit
//! event together with the status change. Every step is designed so a
//! replayed or duplicated callback has no second observable effect.

use core_config::mail::MailConfig;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::entity::Email;
use crate::error::{MailError, MailResult};
use crate::models::{InboundEvent, InboundTransition};
use crate::repository::MailRepository;
use crate::signature::verify_webhook_signature;

#[derive(Clone)]
pub struct WebhookService {
    repo: Arc<dyn MailRepository>,
    config: MailConfig,
}

impl WebhookService {
    pub fn new(repo: Arc<dyn MailRepository>, config: MailConfig) -> Self {
        Self { repo, config }
    }

    /// Ingest one provider callback.
    ///
    /// Returns `Ok(())` both for applied events and for safely ignored ones
    /// (replays, unknown emails, impermissible transitions); the caller can
    /// acknowledge unconditionally once the event is durably deduped.
    /// Signature failures are the exception: nothing is persisted and the
    /// error propagates.
    pub async fn process_event(
        &self,
        provider: &str,
        body: &[u8],
        parsed: Value,
        signature: &str,
        timestamp: &str,
        event_id: &str,
    ) -> MailResult<()> {
        let secret = self.config.webhook_secret(provider).ok_or_else(|| {
            MailError::SignatureVerification(format!(
                "no webhook secret configured for provider {provider}"
            ))
        })?;

        verify_webhook_signature(
            body,
            signature,
            timestamp,
            secret,
            self.config.webhook_replay_window_seconds,
        )?;

        let event: InboundEvent = serde_json::from_value(parsed.clone())
            .map_err(|e| MailError::Validation(format!("malformed event payload: {e}")))?;

        // Ledger first: once this row exists, any replay of the same
        // (provider, event id) is a no-op regardless of what follows.
        let payload_hash = hex::encode(Sha256::digest(body));
        let newly_recorded = self
            .repo
            .record_webhook_event(provider, event_id, event.tenant_id.clone(), &payload_hash)
            .await?;
        if !newly_recorded {
            debug!(provider, event_id, "Replayed webhook event, ignoring");
            return Ok(());
        }

        let Some(email) = self.locate_email(&event).await? else {
            debug!(provider, event_id, "No matching email for webhook event");
            return Ok(());
        };

        let Some(transition) = InboundTransition::resolve(&event, email.status) else {
            debug!(
                provider,
                event_id,
                email_id = %email.id,
                status = %email.status,
                event_type = %event.event_type,
                "Transition not permitted from current status, ignoring"
            );
            return Ok(());
        };

        let applied = self
            .repo
            .apply_inbound_transition(email.id, transition.clone(), provider, event_id, parsed)
            .await?;

        if applied {
            info!(
                provider,
                event_id,
                email_id = %email.id,
                new_status = %transition.new_status(),
                "Applied inbound event"
            );
        } else {
            // The CAS guard lost a race after our status read; the other
            // writer's transition stands.
            warn!(
                provider,
                event_id,
                email_id = %email.id,
                "Inbound transition guard miss"
            );
        }

        Ok(())
    }

    async fn locate_email(&self, event: &InboundEvent) -> MailResult<Option<Email>> {
        if let Some(email_id) = event.email_id {
            if let Some(email) = self.repo.find_email(email_id).await? {
                return Ok(Some(email));
            }
        }
        if let Some(provider_message_id) = &event.provider_message_id {
            return self
                .repo
                .find_email_by_provider_message_id(provider_message_id)
                .await;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::EmailStatus;
    use crate::repository::MockMailRepository;
    use crate::signature::compute_webhook_signature;
    use chrono::Utc;
    use mockall::predicate::{always, eq};
    use serde_json::json;
    use uuid::Uuid;

    const PROVIDER: &str = "mock";

    fn config() -> MailConfig {
        MailConfig::for_tests()
    }

    fn email(status: EmailStatus) -> Email {
        Email {
            id: Uuid::now_v7(),
            tenant_id: "t1".to_string(),
            idempotency_key: "k1".to_string(),
            recipient_email: "a@x.com".to_string(),
            recipient_name: None,
            template_id: "tpl1".to_string(),
            variables: json!({}),
            metadata: json!({}),
            provider_name: PROVIDER.to_string(),
            provider_message_id: Some("pm-1".to_string()),
            status,
            scheduled_at: None,
            sent_at: None,
            delivered_at: None,
            opened_at: None,
            failed_at: None,
            failure_reason: None,
            attempt_count: 1,
            next_retry_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn signed(body: &[u8]) -> (String, String) {
        let timestamp = Utc::now().timestamp().to_string();
        let secret = config().webhook_secret(PROVIDER).unwrap().to_string();
        (
            compute_webhook_signature(&secret, &timestamp, body),
            timestamp,
        )
    }

    fn event_body(email_id: Uuid, event_type: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "email_id": email_id,
            "event_type": event_type,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_delivered_event_applies() {
        let stored = email(EmailStatus::Sent);
        let email_id = stored.id;
        let body = event_body(email_id, "delivered");

        let mut repo = MockMailRepository::new();
        repo.expect_record_webhook_event()
            .with(eq(PROVIDER), eq("evt-1"), always(), always())
            .times(1)
            .returning(|_, _, _, _| Ok(true));
        repo.expect_find_email()
            .with(eq(email_id))
            .return_once(move |_| Ok(Some(stored)));
        repo.expect_apply_inbound_transition()
            .withf(move |id, transition, provider, event_id, _| {
                *id == email_id
                    && *transition == InboundTransition::Delivered
                    && provider == PROVIDER
                    && event_id == "evt-1"
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok(true));

        let service = WebhookService::new(Arc::new(repo), config());
        let (signature, timestamp) = signed(&body);
        service
            .process_event(
                PROVIDER,
                &body,
                serde_json::from_slice(&body).unwrap(),
                &signature,
                &timestamp,
                "evt-1",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_replay_is_silent_and_touches_nothing() {
        let body = event_body(Uuid::now_v7(), "delivered");

        let mut repo = MockMailRepository::new();
        repo.expect_record_webhook_event().returning(|_, _, _, _| Ok(false));
        repo.expect_find_email().never();
        repo.expect_apply_inbound_transition().never();

        let service = WebhookService::new(Arc::new(repo), config());
        let (signature, timestamp) = signed(&body);
        service
            .process_event(
                PROVIDER,
                &body,
                serde_json::from_slice(&body).unwrap(),
                &signature,
                &timestamp,
                "evt-1",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_signature_persists_nothing() {
        let body = event_body(Uuid::now_v7(), "delivered");

        let mut repo = MockMailRepository::new();
        repo.expect_record_webhook_event().never();

        let service = WebhookService::new(Arc::new(repo), config());
        let timestamp = Utc::now().timestamp().to_string();
        let err = service
            .process_event(
                PROVIDER,
                &body,
                serde_json::from_slice(&body).unwrap(),
                "0000000000000000000000000000000000000000000000000000000000000000",
                &timestamp,
                "evt-1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::SignatureVerification(_)));
    }

    #[tokio::test]
    async fn test_unknown_provider_secret_is_rejected() {
        let body = event_body(Uuid::now_v7(), "delivered");
        let repo = MockMailRepository::new();

        let service = WebhookService::new(Arc::new(repo), config());
        let err = service
            .process_event(
                "sendgrid",
                &body,
                serde_json::from_slice(&body).unwrap(),
                "sig",
                "0",
                "evt-1",
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no webhook secret"));
    }

    #[tokio::test]
    async fn test_opened_email_ignores_failed_event() {
        let stored = email(EmailStatus::Opened);
        let email_id = stored.id;
        let body = event_body(email_id, "failed");

        let mut repo = MockMailRepository::new();
        repo.expect_record_webhook_event().returning(|_, _, _, _| Ok(true));
        repo.expect_find_email()
            .return_once(move |_| Ok(Some(stored)));
        repo.expect_apply_inbound_transition().never();

        let service = WebhookService::new(Arc::new(repo), config());
        let (signature, timestamp) = signed(&body);
        service
            .process_event(
                PROVIDER,
                &body,
                serde_json::from_slice(&body).unwrap(),
                &signature,
                &timestamp,
                "evt-1",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_email_still_returns_success() {
        let body = event_body(Uuid::now_v7(), "delivered");

        let mut repo = MockMailRepository::new();
        repo.expect_record_webhook_event().returning(|_, _, _, _| Ok(true));
        repo.expect_find_email().returning(|_| Ok(None));
        repo.expect_find_email_by_provider_message_id().never();
        repo.expect_apply_inbound_transition().never();

        let service = WebhookService::new(Arc::new(repo), config());
        let (signature, timestamp) = signed(&body);
        service
            .process_event(
                PROVIDER,
                &body,
                serde_json::from_slice(&body).unwrap(),
                &signature,
                &timestamp,
                "evt-1",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_falls_back_to_provider_message_id() {
        let stored = email(EmailStatus::Sent);
        let body = serde_json::to_vec(&json!({
            "provider_message_id": "pm-1",
            "event_type": "opened",
        }))
        .unwrap();

        let mut repo = MockMailRepository::new();
        repo.expect_record_webhook_event().returning(|_, _, _, _| Ok(true));
        repo.expect_find_email_by_provider_message_id()
            .with(eq("pm-1"))
            .return_once(move |_| Ok(Some(stored)));
        repo.expect_apply_inbound_transition()
            .withf(|_, transition, _, _, _| *transition == InboundTransition::Opened)
            .times(1)
            .returning(|_, _, _, _, _| Ok(true));

        let service = WebhookService::new(Arc::new(repo), config());
        let (signature, timestamp) = signed(&body);
        service
            .process_event(
                PROVIDER,
                &body,
                serde_json::from_slice(&body).unwrap(),
                &signature,
                &timestamp,
                "evt-2",
            )
            .await
            .unwrap();
    }
}
