//! Mail worker: wires config, stores, providers and the job stream into a
//! running delivery loop, plus liveness/readiness endpoints.

mod health;

use std::sync::Arc;

use core_config::database::DatabaseConfig;
use core_config::mail::MailConfig;
use core_config::redis::RedisConfig;
use core_config::smtp::SmtpConfig;
use core_config::{Environment, FromEnv, env_or_default};
use domain_mail::bulk::BulkService;
use domain_mail::delivery::DeliveryService;
use domain_mail::processor::MailJobProcessor;
use domain_mail::providers::ProviderRegistry;
use domain_mail::repository::MailRepository;
use domain_mail::service::MailService;
use domain_mail::streams::{JobScheduler, MailStream, StreamJobScheduler};
use domain_mail::PgMailRepository;
use stream_queue::{StreamProducer, StreamWorker, WorkerConfig};
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

pub async fn run() -> eyre::Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let database_config = DatabaseConfig::from_env()?;
    let redis_config = RedisConfig::from_env()?;
    let smtp_config = SmtpConfig::from_env()?;
    let mail_config = MailConfig::from_env()?;

    let db = database::postgres::connect_from_config(&database_config).await?;
    database::postgres::run_migrations::<migration::Migrator>(&db).await?;
    let redis = database::redis::connect_from_config(&redis_config).await?;

    let repo: Arc<dyn MailRepository> = Arc::new(PgMailRepository::new(db.clone()));
    let registry = Arc::new(ProviderRegistry::from_config(&smtp_config)?);
    let producer = StreamProducer::from_stream_def::<MailStream>(redis.clone());
    let scheduler: Arc<dyn JobScheduler> = Arc::new(StreamJobScheduler::new(producer));

    let mail = MailService::new(repo.clone(), scheduler.clone(), mail_config.clone());
    let delivery = DeliveryService::new(
        repo.clone(),
        registry,
        scheduler.clone(),
        mail_config.clone(),
    );
    let bulk = BulkService::new(repo.clone(), scheduler, mail);
    let processor = Arc::new(MailJobProcessor::new(delivery, bulk));

    let consumer_id = format!("mail-worker-{}", Uuid::new_v4());
    let worker_config = WorkerConfig::from_stream_def::<MailStream>(consumer_id);
    let worker = StreamWorker::new(redis.clone(), processor, worker_config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let health_addr = env_or_default("HEALTH_ADDR", "0.0.0.0:8081");
    let health_router = health::router(db, redis);
    let listener = tokio::net::TcpListener::bind(&health_addr).await?;
    info!(addr = %health_addr, "Health endpoints listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, health_router).await {
            tracing::error!(error = %e, "Health server exited");
        }
    });

    worker.run(shutdown_rx).await?;
    Ok(())
}
