use core_config::database::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

use crate::common::DatabaseResult;

/// Connect to PostgreSQL and verify the connection with a ping.
pub async fn connect(url: &str) -> DatabaseResult<DatabaseConnection> {
    let mut options = ConnectOptions::new(url.to_string());
    options
        .max_connections(20)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    db.ping().await?;

    info!("Connected to PostgreSQL");
    Ok(db)
}

/// Connect using a `DatabaseConfig`.
pub async fn connect_from_config(config: &DatabaseConfig) -> DatabaseResult<DatabaseConnection> {
    connect(&config.url).await
}

/// Apply any pending migrations.
pub async fn run_migrations<M: MigratorTrait>(db: &DatabaseConnection) -> DatabaseResult<()> {
    let pending = M::get_pending_migrations(db).await?.len();
    if pending > 0 {
        info!(pending, "Applying database migrations");
    }
    M::up(db, None).await?;
    Ok(())
}

/// Liveness probe against the relational store.
pub async fn health_check(db: &DatabaseConnection) -> bool {
    db.ping().await.is_ok()
}
