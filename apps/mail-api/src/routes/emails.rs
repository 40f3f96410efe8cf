use axum::Json;
use axum::extract::{Path, State};
use domain_mail::entity::{Email, EmailEvent};
use domain_mail::error::MailError;
use uuid::Uuid;

use crate::AppState;

pub async fn get_email(
    State(state): State<AppState>,
    Path(email_id): Path<Uuid>,
) -> Result<Json<Email>, MailError> {
    let email = state.mail.get_email(email_id).await?;
    Ok(Json(email))
}

pub async fn get_email_events(
    State(state): State<AppState>,
    Path(email_id): Path<Uuid>,
) -> Result<Json<Vec<EmailEvent>>, MailError> {
    let events = state.mail.get_email_events(email_id).await?;
    Ok(Json(events))
}
