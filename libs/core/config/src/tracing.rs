use crate::Environment;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Initialize tracing with environment-aware output.
///
/// - Production (`APP_ENV=production`): JSON lines for log aggregation.
/// - Development: human-readable output with module targets.
///
/// `RUST_LOG` overrides the default filter. Safe to call more than once
/// (later calls are no-ops), which keeps tests simple.
pub fn init_tracing(environment: &Environment) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if environment.is_production() {
            EnvFilter::new("info,sea_orm=warn")
        } else {
            EnvFilter::new("debug")
        }
    });

    let result = if environment.is_production() {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .with(filter)
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing already initialized, skipping");
    }
}
