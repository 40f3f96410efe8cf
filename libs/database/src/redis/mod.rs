use core_config::redis::RedisConfig;
use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use crate::common::DatabaseResult;

/// Connect to Redis and return a `ConnectionManager`.
///
/// The manager reconnects automatically on connection loss; the initial PING
/// verifies the URL actually points at a live server.
pub async fn connect(url: &str) -> DatabaseResult<ConnectionManager> {
    let client = Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;

    let mut conn = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;

    info!("Connected to Redis");
    Ok(manager)
}

/// Connect using a `RedisConfig`.
pub async fn connect_from_config(config: &RedisConfig) -> DatabaseResult<ConnectionManager> {
    connect(&config.url).await
}

/// Liveness probe against the counter/queue store.
pub async fn health_check(manager: &ConnectionManager) -> bool {
    let mut conn = manager.clone();
    redis::cmd("PING")
        .query_async::<String>(&mut conn)
        .await
        .is_ok()
}
