pub mod database;
pub mod mail;
pub mod redis;
pub mod smtp;
pub mod tracing;

use std::env;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Application environment
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        if app_env.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// Helper to load an environment variable with a default value
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Helper to load an environment variable or return an error
pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Helper to load and parse an environment variable, falling back to a default
/// when unset. Set-but-unparsable values are a hard error.
pub fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_defaults_to_development() {
        temp_env::with_var_unset("APP_ENV", || {
            let env = Environment::from_env();
            assert_eq!(env, Environment::Development);
            assert!(env.is_development());
            assert!(!env.is_production());
        });
    }

    #[test]
    fn test_environment_production_case_insensitive() {
        temp_env::with_var("APP_ENV", Some("PRODUCTION"), || {
            assert_eq!(Environment::from_env(), Environment::Production);
        });
    }

    #[test]
    fn test_env_or_default() {
        temp_env::with_var("TEST_VAR_A", Some("set"), || {
            assert_eq!(env_or_default("TEST_VAR_A", "default"), "set");
        });
        temp_env::with_var_unset("TEST_VAR_A", || {
            assert_eq!(env_or_default("TEST_VAR_A", "default"), "default");
        });
    }

    #[test]
    fn test_env_required_missing() {
        temp_env::with_var_unset("TEST_VAR_B", || {
            let err = env_required("TEST_VAR_B").unwrap_err();
            assert!(err.to_string().contains("TEST_VAR_B"));
            assert!(err.to_string().contains("required"));
        });
    }

    #[test]
    fn test_env_parse_or() {
        temp_env::with_var("TEST_VAR_C", Some("42"), || {
            assert_eq!(env_parse_or("TEST_VAR_C", 7u32).unwrap(), 42);
        });
        temp_env::with_var_unset("TEST_VAR_C", || {
            assert_eq!(env_parse_or("TEST_VAR_C", 7u32).unwrap(), 7);
        });
        temp_env::with_var("TEST_VAR_C", Some("not-a-number"), || {
            assert!(env_parse_or("TEST_VAR_C", 7u32).is_err());
        });
    }
}
