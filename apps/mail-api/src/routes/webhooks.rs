use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use domain_mail::error::MailError;
use serde_json::{Value, json};

use crate::AppState;

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, MailError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| MailError::Validation(format!("missing header {name}")))
}

/// Inbound provider callback. Returns success once the event is durably
/// deduped, whether or not an email matched.
pub async fn provider_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, MailError> {
    let signature = required_header(&headers, "x-signature")?;
    let timestamp = required_header(&headers, "x-timestamp")?;
    let event_id = required_header(&headers, "x-event-id")?;

    let parsed: Value = serde_json::from_slice(&body)
        .map_err(|_| MailError::Validation("invalid json body".to_string()))?;

    state
        .webhooks
        .process_event(&provider, &body, parsed, signature, timestamp, event_id)
        .await?;

    Ok(Json(json!({ "ok": true })))
}
