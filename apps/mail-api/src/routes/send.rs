use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain_mail::enums::EmailStatus;
use domain_mail::error::MailError;
use domain_mail::models::SendRequest;
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub email_id: Uuid,
    pub status: EmailStatus,
    pub idempotency_reused: bool,
}

/// Accept a send request. Rate limits apply before any persistence, and a
/// retransmitted idempotency key returns the original email with 202.
pub async fn send_email(
    State(state): State<AppState>,
    Json(payload): Json<SendRequest>,
) -> Result<(StatusCode, Json<SendResponse>), MailError> {
    let provider = payload
        .provider_hint
        .clone()
        .unwrap_or_else(|| state.config.default_provider.clone());

    state
        .limiter
        .check_tenant(&payload.tenant_id, state.config.rate_limit_tenant_per_window)
        .await?;
    state
        .limiter
        .check_provider(
            &payload.tenant_id,
            &provider,
            state.config.rate_limit_provider_per_window,
        )
        .await?;

    let outcome = state.mail.enqueue_send(payload).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SendResponse {
            email_id: outcome.email.id,
            status: outcome.email.status,
            idempotency_reused: outcome.reused,
        }),
    ))
}
