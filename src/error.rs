use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("An evaluation batch is already in progress")]
    EvalInProgress,

    #[error("Live evaluation mode is not implemented")]
    LiveModeUnavailable,

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::TaskNotFound(_) | ServerError::RunNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::EvalInProgress => StatusCode::CONFLICT,
            ServerError::LiveModeUnavailable => StatusCode::NOT_IMPLEMENTED,
            ServerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
