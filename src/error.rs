use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Queue error type surfaced by stores, the facade and the admin handlers.
///
/// A missing row is not an error here: mutations report it through
/// [`Outcome::NotFound`](crate::queue::Outcome), and an empty queue is `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    // Payload errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown job type: {0}")]
    UnknownJobType(String),

    #[error("Job type mismatch: expected {expected}, found {found}")]
    JobTypeMismatch { expected: String, found: String },

    #[error("Invalid delay: {0}")]
    InvalidDelay(String),

    // Resolution errors
    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueueError {
    /// Short variant name, used as the error kind in failure records
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) => "Database",
            Self::Migration(_) => "Migration",
            Self::Serialization(_) => "Serialization",
            Self::UnknownJobType(_) => "UnknownJobType",
            Self::JobTypeMismatch { .. } => "JobTypeMismatch",
            Self::InvalidDelay(_) => "InvalidDelay",
            Self::UnknownConnection(_) => "UnknownConnection",
            Self::Config(_) => "Config",
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for QueueError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            // 404 Not Found
            QueueError::UnknownConnection(name) => (
                StatusCode::NOT_FOUND,
                "Unknown connection",
                Some(name.clone()),
            ),

            // 422 Unprocessable Entity
            QueueError::UnknownJobType(_)
            | QueueError::JobTypeMismatch { .. }
            | QueueError::InvalidDelay(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Invalid job payload",
                Some(self.to_string()),
            ),

            // 500 Internal Server Error
            QueueError::Database(msg) | QueueError::Migration(msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error", None)
            }
            QueueError::Serialization(msg) => {
                tracing::error!("Serialization error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Serialization error",
                    None,
                )
            }
            QueueError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

// Convenient conversions from common error types

impl From<sea_orm::DbErr> for QueueError {
    fn from(err: sea_orm::DbErr) -> Self {
        QueueError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for QueueError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        QueueError::Migration(err.to_string())
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err.to_string())
    }
}

/// Result type alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
