//! Thin HTTP layer over the delivery core: routing, parsing, rate-limit
//! checks, and translation of domain errors into responses. All delivery
//! semantics live in `domain_mail`.

mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use core_config::database::DatabaseConfig;
use core_config::mail::MailConfig;
use core_config::redis::RedisConfig;
use core_config::{Environment, FromEnv, env_or_default};
use domain_mail::PgMailRepository;
use domain_mail::analytics::AnalyticsService;
use domain_mail::bulk::BulkService;
use domain_mail::rate_limit::{RateLimiter, RedisCounterStore};
use domain_mail::repository::MailRepository;
use domain_mail::service::MailService;
use domain_mail::streams::{JobScheduler, MailStream, StreamJobScheduler};
use domain_mail::webhook::WebhookService;
use sea_orm::DatabaseConnection;
use stream_queue::StreamProducer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub mail: MailService,
    pub bulk: BulkService,
    pub webhooks: WebhookService,
    pub analytics: AnalyticsService,
    pub limiter: RateLimiter,
    pub config: MailConfig,
    pub db: DatabaseConnection,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/send", post(routes::send::send_email))
        .route("/bulk", post(routes::bulk::enqueue_bulk))
        .route("/bulk/{bulk_id}", get(routes::bulk::get_bulk_job))
        .route("/emails/{email_id}", get(routes::emails::get_email))
        .route(
            "/emails/{email_id}/events",
            get(routes::emails::get_email_events),
        )
        .route(
            "/webhooks/{provider}",
            post(routes::webhooks::provider_webhook),
        )
        .route("/analytics/summary", get(routes::analytics::summary))
        .route("/healthz", get(routes::health::healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run() -> eyre::Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let database_config = DatabaseConfig::from_env()?;
    let redis_config = RedisConfig::from_env()?;
    let mail_config = MailConfig::from_env()?;

    let db = database::postgres::connect_from_config(&database_config).await?;
    let redis = database::redis::connect_from_config(&redis_config).await?;

    let repo: Arc<dyn MailRepository> = Arc::new(PgMailRepository::new(db.clone()));
    let producer = StreamProducer::from_stream_def::<MailStream>(redis.clone());
    let scheduler: Arc<dyn JobScheduler> = Arc::new(StreamJobScheduler::new(producer));
    let limiter = RateLimiter::new(
        Arc::new(RedisCounterStore::new(redis)),
        mail_config.rate_limit_window_seconds,
    );

    let mail = MailService::new(repo.clone(), scheduler.clone(), mail_config.clone());
    let state = AppState {
        bulk: BulkService::new(repo.clone(), scheduler, mail.clone()),
        webhooks: WebhookService::new(repo.clone(), mail_config.clone()),
        analytics: AnalyticsService::new(repo),
        mail,
        limiter,
        config: mail_config,
        db,
    };

    let addr = env_or_default("BIND_ADDR", "0.0.0.0:8080");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Mail API listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
