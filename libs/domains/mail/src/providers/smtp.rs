//! SMTP transport provider built on lettre.
//!
//! Outcome classification: 4xx-class SMTP rejections, timeouts and
//! connection-level failures are transient; other protocol rejections are
//! permanent. The send runs under an explicit timeout so a wedged upstream
//! resolves to a retryable outcome instead of blocking the worker.

use async_trait::async_trait;
use core_config::smtp::SmtpConfig;
use lettre::message::{Mailbox, MultiPart, SinglePart, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{EmailMessage, EmailProvider, ProviderResponse};
use crate::error::{MailError, MailResult};

pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpProvider {
    pub fn new(config: SmtpConfig) -> MailResult<Self> {
        let transport = Self::build_transport(&config)?;
        Ok(Self { transport, config })
    }

    fn build_transport(config: &SmtpConfig) -> MailResult<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| MailError::ProviderNotFound(format!("smtp relay setup failed: {e}")))?
                .port(config.port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host).port(config.port)
        };

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }

    fn build_message(&self, email: &EmailMessage) -> Result<Message, String> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| format!("invalid from address: {e}"))?;

        let to: Mailbox = match &email.to_name {
            Some(name) => format!("{} <{}>", name, email.to_email).parse(),
            None => email.to_email.parse(),
        }
        .map_err(|e| format!("invalid recipient address: {e}"))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| format!("message build failed: {e}"))
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &EmailMessage) -> ProviderResponse {
        debug!(
            email_id = %email.email_id,
            to = %email.to_email,
            host = %self.config.host,
            port = %self.config.port,
            "Dispatching via SMTP"
        );

        let message = match self.build_message(email) {
            Ok(message) => message,
            // A message we cannot even construct will never send; no retry.
            Err(reason) => {
                return ProviderResponse::rejected("invalid_message", false, "invalid_message", reason);
            }
        };

        let timeout = Duration::from_secs(self.config.send_timeout_seconds);
        match tokio::time::timeout(timeout, self.transport.send(message)).await {
            Ok(Ok(response)) => {
                let provider_message_id = response
                    .message()
                    .next()
                    .map(str::to_string)
                    .unwrap_or_else(|| Uuid::new_v4().to_string());

                info!(
                    email_id = %email.email_id,
                    to = %email.to_email,
                    provider_message_id = %provider_message_id,
                    "SMTP accepted message"
                );

                ProviderResponse::accepted(provider_message_id, format!("smtp_{}", response.code()))
            }
            Ok(Err(e)) => {
                // 4xx-class SMTP rejections and connection-level failures are
                // retryable; 5xx-class protocol rejections are not.
                let transient = e.is_transient() || !e.is_permanent();
                let raw_status = if e.is_response() {
                    if transient { "smtp_transient" } else { "smtp_permanent" }
                } else {
                    "transport_error"
                };
                error!(
                    email_id = %email.email_id,
                    to = %email.to_email,
                    error = %e,
                    transient,
                    "SMTP send failed"
                );

                ProviderResponse::rejected(raw_status, transient, raw_status, e.to_string())
            }
            Err(_) => {
                error!(
                    email_id = %email.email_id,
                    to = %email.to_email,
                    timeout_seconds = self.config.send_timeout_seconds,
                    "SMTP send timed out"
                );

                ProviderResponse::rejected(
                    "transport_timeout",
                    true,
                    "transport_timeout",
                    format!(
                        "smtp conversation exceeded {}s",
                        self.config.send_timeout_seconds
                    ),
                )
            }
        }
    }

    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn health_check(&self) -> bool {
        self.transport.test_connection().await.unwrap_or(false)
    }
}
