use thiserror::Error;

/// Queue boundary errors
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err.to_string())
    }
}

impl QueueError {
    /// Connection-level failures are worth backing off on before the next poll.
    pub fn is_connection_error(&self) -> bool {
        match self {
            QueueError::Redis(e) => e.is_connection_refusal() || e.is_io_error(),
            _ => false,
        }
    }
}
