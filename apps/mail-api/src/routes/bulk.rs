use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain_mail::entity::BulkJob;
use domain_mail::error::MailError;
use domain_mail::models::BulkSendRequest;
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct BulkSendResponse {
    pub bulk_id: Uuid,
    pub total_count: i32,
}

pub async fn enqueue_bulk(
    State(state): State<AppState>,
    Json(payload): Json<BulkSendRequest>,
) -> Result<(StatusCode, Json<BulkSendResponse>), MailError> {
    state
        .limiter
        .check_tenant(&payload.tenant_id, state.config.rate_limit_tenant_per_window)
        .await?;

    let job = state.bulk.enqueue_bulk(payload).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(BulkSendResponse {
            bulk_id: job.id,
            total_count: job.total_count,
        }),
    ))
}

pub async fn get_bulk_job(
    State(state): State<AppState>,
    Path(bulk_id): Path<Uuid>,
) -> Result<Json<BulkJob>, MailError> {
    let job = state.bulk.get_bulk_job(bulk_id).await?;
    Ok(Json(job))
}
