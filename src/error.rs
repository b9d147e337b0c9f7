//! Error types for Task Dispatch.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::tasks::model::TaskStatus;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Task registry errors.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Task {id} not found")]
    NotFound { id: u64 },

    #[error("Task {id} is {from}, cannot transition to {to}")]
    InvalidTransition {
        id: u64,
        from: TaskStatus,
        to: TaskStatus,
    },
}

impl TaskError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidTransition { .. } => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for TaskError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(serde_json::json!({"error": self.to_string()})),
        )
            .into_response()
    }
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_errors_map_to_http_statuses() {
        assert_eq!(
            TaskError::MalformedInput("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TaskError::NotFound { id: 7 }.status_code(),
            StatusCode::NOT_FOUND
        );
        let err = TaskError::InvalidTransition {
            id: 3,
            from: TaskStatus::Pending,
            to: TaskStatus::Completed,
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            err.to_string(),
            "Task 3 is pending, cannot transition to completed"
        );
    }
}
