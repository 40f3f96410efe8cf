use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::json;

use crate::AppState;

pub async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let database = database::postgres::health_check(&state.db).await;
    let counter_store = state.limiter.store().ping().await;

    let status = if database && counter_store {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({ "database": database, "counter_store": counter_store })),
    )
}
