use crate::{ConfigError, FromEnv, env_or_default, env_parse_or};

/// SMTP transport configuration.
///
/// Defaults target a local development relay (MailHog/Mailpit); set
/// SMTP_USE_TLS and credentials for a real upstream.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from_email: String,
    pub from_name: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
    /// Hard cap on a single SMTP conversation, in seconds.
    pub send_timeout_seconds: u64,
}

impl FromEnv for SmtpConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or_default("SMTP_HOST", "localhost"),
            port: env_parse_or("SMTP_PORT", 1025)?,
            from_email: env_or_default("SMTP_FROM_EMAIL", "no-reply@example.com"),
            from_name: env_or_default("SMTP_FROM_NAME", "Mail Delivery"),
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            use_tls: env_or_default("SMTP_USE_TLS", "false") == "true",
            send_timeout_seconds: env_parse_or("SMTP_SEND_TIMEOUT_SECONDS", 15)?,
        })
    }
}
