use std::collections::HashMap;

use crate::{ConfigError, FromEnv, env_or_default, env_parse_or};

/// Delivery-engine configuration.
///
/// Loaded once at process start and threaded explicitly into the services;
/// tests build their own instance instead of touching process environment.
#[derive(Clone, Debug)]
pub struct MailConfig {
    /// Provider used when a send request carries no provider hint.
    pub default_provider: String,

    /// Dispatch attempts before an email is dead-lettered.
    pub max_retries: u32,
    pub retry_base_seconds: u64,
    pub retry_max_seconds: u64,

    pub rate_limit_window_seconds: u64,
    pub rate_limit_tenant_per_window: u64,
    pub rate_limit_provider_per_window: u64,

    /// Maximum age of an inbound event timestamp before it is rejected.
    pub webhook_replay_window_seconds: i64,
    /// Per-provider webhook signing secrets. A provider without an entry
    /// (or with an empty secret) cannot ingest events.
    pub webhook_secrets: HashMap<String, String>,
}

impl MailConfig {
    /// Secret for a provider, if one is configured and non-empty.
    pub fn webhook_secret(&self, provider: &str) -> Option<&str> {
        self.webhook_secrets
            .get(provider)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// A config suitable for unit tests: small limits, fixed secrets.
    pub fn for_tests() -> Self {
        Self {
            default_provider: "mock".to_string(),
            max_retries: 3,
            retry_base_seconds: 10,
            retry_max_seconds: 900,
            rate_limit_window_seconds: 60,
            rate_limit_tenant_per_window: 5,
            rate_limit_provider_per_window: 3,
            webhook_replay_window_seconds: 300,
            webhook_secrets: HashMap::from([
                ("smtp".to_string(), "smtp-test-secret".to_string()),
                ("mock".to_string(), "mock-test-secret".to_string()),
            ]),
        }
    }
}

impl FromEnv for MailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let webhook_secrets = HashMap::from([
            (
                "smtp".to_string(),
                env_or_default("WEBHOOK_SECRET_SMTP", ""),
            ),
            (
                "mock".to_string(),
                env_or_default("WEBHOOK_SECRET_MOCK", ""),
            ),
        ]);

        Ok(Self {
            default_provider: env_or_default("DEFAULT_PROVIDER", "smtp"),
            max_retries: env_parse_or("MAX_RETRIES", 5)?,
            retry_base_seconds: env_parse_or("RETRY_BASE_SECONDS", 10)?,
            retry_max_seconds: env_parse_or("RETRY_MAX_SECONDS", 900)?,
            rate_limit_window_seconds: env_parse_or("RATE_LIMIT_WINDOW_SECONDS", 60)?,
            rate_limit_tenant_per_window: env_parse_or("RATE_LIMIT_TENANT_PER_WINDOW", 300)?,
            rate_limit_provider_per_window: env_parse_or("RATE_LIMIT_PROVIDER_PER_WINDOW", 120)?,
            webhook_replay_window_seconds: env_parse_or("WEBHOOK_REPLAY_WINDOW_SECONDS", 300)?,
            webhook_secrets,
        })
    }
}
