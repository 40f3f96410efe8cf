//! Deterministic provider double.
//!
//! Accepts everything except recipients under the `@fail.example` domain,
//! which it rejects non-transiently. Message ids are derived from the email
//! id and recipient, so repeated dispatch of the same email is observable.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{EmailMessage, EmailProvider, ProviderResponse};

/// Recipient domain that always fails, for exercising the failure path.
const FAILURE_DOMAIN: &str = "@fail.example";

#[derive(Debug, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailProvider for MockProvider {
    async fn send(&self, message: &EmailMessage) -> ProviderResponse {
        if message.to_email.ends_with(FAILURE_DOMAIN) {
            return ProviderResponse::rejected(
                "mock_failed",
                false,
                "mock_failure",
                "forced failure domain",
            );
        }

        let digest = Sha256::digest(format!("{}:{}", message.email_id, message.to_email));
        let provider_message_id = hex::encode(digest)[..24].to_string();

        debug!(
            email_id = %message.email_id,
            to = %message.to_email,
            provider_message_id = %provider_message_id,
            "Mock send accepted"
        );

        ProviderResponse::accepted(provider_message_id, "mock_sent")
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
