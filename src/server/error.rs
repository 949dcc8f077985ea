//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::PipelineError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Transport failure talking to a downstream service
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ServerError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred".to_string())
            }
            ServerError::Upstream(msg) => {
                tracing::error!(detail = %msg, "Upstream call failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            ServerError::Pipeline(err) => match err {
                PipelineError::ConfigError(_)
                | PipelineError::ColumnNotFound(_)
                | PipelineError::UnsupportedModel(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                PipelineError::ArtifactNotFound { .. } => {
                    (StatusCode::NOT_FOUND, "Model not found. Train a model first.".to_string())
                }
                PipelineError::TrainingError(_) => {
                    tracing::error!(detail = %err, "Training error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Training failed. Check server logs for details.".to_string(),
                    )
                }
                PipelineError::UnseenCategory { .. }
                | PipelineError::SchemaMismatch(_)
                | PipelineError::DataError(_) => {
                    tracing::error!(detail = %err, "Pipeline error");
                    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                }
                _ => {
                    tracing::error!(detail = %err, "Pipeline error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Request failed. Check server logs for details.".to_string(),
                    )
                }
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
