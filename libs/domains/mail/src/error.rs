use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("signature verification failed: {0}")]
    SignatureVerification(String),

    #[error("unknown provider: {0}")]
    ProviderNotFound(String),

    #[error("template rendering failed: {0}")]
    TemplateRender(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("queue error: {0}")]
    Queue(String),
}

pub type MailResult<T> = Result<T, MailError>;

impl From<sea_orm::DbErr> for MailError {
    fn from(err: sea_orm::DbErr) -> Self {
        MailError::Database(err.to_string())
    }
}

impl From<stream_queue::QueueError> for MailError {
    fn from(err: stream_queue::QueueError) -> Self {
        MailError::Queue(err.to_string())
    }
}

impl MailError {
    fn status_code(&self) -> StatusCode {
        match self {
            MailError::Validation(_) => StatusCode::BAD_REQUEST,
            MailError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            MailError::SignatureVerification(_) => StatusCode::BAD_REQUEST,
            MailError::ProviderNotFound(_) => StatusCode::BAD_REQUEST,
            MailError::TemplateRender(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MailError::NotFound(_) => StatusCode::NOT_FOUND,
            MailError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MailError::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for MailError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            MailError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            MailError::RateLimited("x".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            MailError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            MailError::Queue("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
