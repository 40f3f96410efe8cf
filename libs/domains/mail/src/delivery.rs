//! The delivery state machine.
//!
//! `queued`/`scheduled` → `processing` → `sent` | `failed`, with transient
//! provider rejections looping back through `queued` via a delayed job. The
//! machine is driven by at-least-once job redelivery, so every step is
//! guarded: terminal-after-success short-circuit, conditional claim, and
//! compare-and-set transitions.

use core_config::mail::MailConfig;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use stream_queue::Schedule;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{MailError, MailResult};
use crate::providers::{EmailMessage, ProviderRegistry};
use crate::repository::MailRepository;
use crate::retry::compute_retry_delay;
use crate::streams::{JobScheduler, MailJob};
use crate::templates::render_template;

pub struct DeliveryService {
    repo: Arc<dyn MailRepository>,
    registry: Arc<ProviderRegistry>,
    scheduler: Arc<dyn JobScheduler>,
    config: MailConfig,
}

impl DeliveryService {
    pub fn new(
        repo: Arc<dyn MailRepository>,
        registry: Arc<ProviderRegistry>,
        scheduler: Arc<dyn JobScheduler>,
        config: MailConfig,
    ) -> Self {
        Self {
            repo,
            registry,
            scheduler,
            config,
        }
    }

    /// Process one email end to end. Idempotent against job redelivery:
    /// stale jobs and already-delivered emails are no-ops.
    pub async fn process_email(&self, email_id: Uuid) -> MailResult<()> {
        let Some(email) = self.repo.find_email(email_id).await? else {
            warn!(email_id = %email_id, "Email not found, dropping stale job");
            return Ok(());
        };

        if email.status.is_terminal_outbound() {
            debug!(email_id = %email_id, status = %email.status, "Already dispatched, skipping");
            return Ok(());
        }

        if !self.repo.claim_for_processing(email_id).await? {
            debug!(email_id = %email_id, "Claim lost, another worker advanced this email");
            return Ok(());
        }

        // Reload after the claim so we dispatch from the row we own.
        let Some(email) = self.repo.find_email(email_id).await? else {
            return Ok(());
        };
        let template = self
            .repo
            .find_template(&email.template_id)
            .await?
            .ok_or_else(|| MailError::NotFound(format!("template {}", email.template_id)))?;

        let rendered = match render_template(
            &template.subject_template,
            &template.html_template,
            template.text_template.as_deref(),
            &email.variables,
        ) {
            Ok(rendered) => rendered,
            Err(e) => {
                // Render failures cannot heal on retry; straight to the
                // failure path without consuming a dispatch attempt.
                warn!(email_id = %email_id, error = %e, "Render failed, dead-lettering");
                let reason = e.to_string();
                self.repo
                    .mark_failed(
                        email_id,
                        email.attempt_count,
                        &reason,
                        json!({ "error": reason, "error_code": "render_failed", "transient": false }),
                    )
                    .await?;
                return Ok(());
            }
        };

        let provider = match self.registry.get(&email.provider_name) {
            Ok(provider) => provider,
            Err(e) => {
                warn!(email_id = %email_id, provider = %email.provider_name, "Unknown provider");
                let reason = e.to_string();
                self.repo
                    .mark_failed(
                        email_id,
                        email.attempt_count,
                        &reason,
                        json!({ "error": reason, "error_code": "unknown_provider", "transient": false }),
                    )
                    .await?;
                return Ok(());
            }
        };

        let message = EmailMessage {
            email_id: email.id,
            tenant_id: email.tenant_id.clone(),
            to_email: email.recipient_email.clone(),
            to_name: email.recipient_name.clone(),
            subject: rendered.subject,
            html_body: rendered.html,
            text_body: rendered.text,
            metadata: email.metadata.clone(),
        };

        let response = provider.send(&message).await;

        // One dispatch attempt happened; the count moves regardless of outcome.
        let attempt_count = email.attempt_count + 1;

        if response.accepted {
            self.repo
                .mark_sent(
                    email_id,
                    attempt_count,
                    &response.provider_message_id,
                    json!({ "provider_status": response.raw_status }),
                )
                .await?;
            info!(
                email_id = %email_id,
                provider = %email.provider_name,
                provider_message_id = %response.provider_message_id,
                attempt_count,
                "Email sent"
            );
            return Ok(());
        }

        if response.transient && (attempt_count as u32) < self.config.max_retries {
            let delay_seconds = compute_retry_delay(
                attempt_count as u32,
                self.config.retry_base_seconds,
                self.config.retry_max_seconds,
            );
            let applied = self
                .repo
                .schedule_retry(
                    email_id,
                    attempt_count,
                    delay_seconds,
                    response.error_message.clone(),
                    json!({
                        "delay_seconds": delay_seconds,
                        "error": response.error_message,
                        "error_code": response.error_code,
                    }),
                )
                .await?;
            if applied {
                self.scheduler
                    .schedule(
                        MailJob::ProcessEmail { email_id },
                        Schedule::After(Duration::from_secs(delay_seconds)),
                    )
                    .await?;
                info!(
                    email_id = %email_id,
                    attempt_count,
                    delay_seconds,
                    "Transient provider rejection, retry scheduled"
                );
            }
            return Ok(());
        }

        let reason = response
            .error_message
            .clone()
            .unwrap_or_else(|| response.raw_status.clone());
        self.repo
            .mark_failed(
                email_id,
                attempt_count,
                &reason,
                json!({
                    "error": response.error_message,
                    "error_code": response.error_code,
                    "transient": response.transient,
                }),
            )
            .await?;
        warn!(
            email_id = %email_id,
            attempt_count,
            transient = response.transient,
            "Email failed permanently"
        );
        Ok(())
    }
}
