//! Provider dispatch capability and the process-wide provider table.

pub mod mock;
pub mod smtp;

pub use mock::MockProvider;
pub use smtp::SmtpProvider;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{MailError, MailResult};

/// Fully-rendered message handed to a provider.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub email_id: Uuid,
    pub tenant_id: String,
    pub to_email: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub metadata: Value,
}

/// Outcome of one dispatch attempt.
///
/// Rejections are data, not errors: `transient` decides whether the state
/// machine retries or dead-letters.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub provider_message_id: String,
    pub accepted: bool,
    pub raw_status: String,
    pub transient: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl ProviderResponse {
    pub fn accepted(provider_message_id: impl Into<String>, raw_status: impl Into<String>) -> Self {
        Self {
            provider_message_id: provider_message_id.into(),
            accepted: true,
            raw_status: raw_status.into(),
            transient: false,
            error_code: None,
            error_message: None,
        }
    }

    pub fn rejected(
        raw_status: impl Into<String>,
        transient: bool,
        error_code: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            provider_message_id: String::new(),
            accepted: false,
            raw_status: raw_status.into(),
            transient,
            error_code: Some(error_code.into()),
            error_message: Some(error_message.into()),
        }
    }
}

/// Polymorphic send capability.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Dispatch a message. Transport failures are folded into the response.
    async fn send(&self, message: &EmailMessage) -> ProviderResponse;

    /// Provider name as referenced by email rows.
    fn name(&self) -> &'static str;

    /// Health probe for readiness checks.
    async fn health_check(&self) -> bool {
        true
    }
}

/// Immutable provider table, built once at process start and passed by
/// reference into the delivery state machine. Unknown names fail closed.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn EmailProvider>>,
}

impl ProviderRegistry {
    /// Standard registry: the SMTP transport plus the deterministic mock.
    pub fn from_config(smtp: &core_config::smtp::SmtpConfig) -> MailResult<Self> {
        let smtp_provider = SmtpProvider::new(smtp.clone())?;
        Ok(Self::with_providers(vec![
            Arc::new(smtp_provider),
            Arc::new(MockProvider::new()),
        ]))
    }

    /// Build a registry from explicit capability instances (used by tests).
    pub fn with_providers(providers: Vec<Arc<dyn EmailProvider>>) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();
        Self { providers }
    }

    pub fn get(&self, name: &str) -> MailResult<Arc<dyn EmailProvider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| MailError::ProviderNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_fails_closed() {
        let registry = ProviderRegistry::with_providers(vec![Arc::new(MockProvider::new())]);
        assert!(registry.get("mock").is_ok());
        let err = registry.get("sendgrid").err().unwrap();
        assert!(matches!(err, MailError::ProviderNotFound(_)));
    }
}
