//! Liveness and readiness endpoints for the worker.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use redis::aio::ConnectionManager;
use sea_orm::DatabaseConnection;
use serde_json::json;

#[derive(Clone)]
struct HealthState {
    db: DatabaseConnection,
    redis: ConnectionManager,
}

pub fn router(db: DatabaseConnection, redis: ConnectionManager) -> Router {
    Router::new()
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .with_state(HealthState { db, redis })
}

async fn liveness() -> &'static str {
    "ok"
}

async fn readiness(State(state): State<HealthState>) -> (StatusCode, Json<serde_json::Value>) {
    let database = database::postgres::health_check(&state.db).await;
    let redis = database::redis::health_check(&state.redis).await;

    let status = if database && redis {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(json!({ "database": database, "redis": redis })))
}
