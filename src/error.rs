//! Error types for the tabserve pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for parsing, preprocessing, training and persistence
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Unseen category in column '{column}': '{value}'")]
    UnseenCategory { column: String, value: String },

    #[error("Model not supported: {0}")]
    UnsupportedModel(String),

    #[error("Model artifact not found at {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PipelineError {
    /// Wrap an estimator failure so callers see it as a training failure.
    pub fn training(cause: impl std::fmt::Display) -> Self {
        PipelineError::TrainingError(cause.to_string())
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::DataError(format!("invalid shape: {}", err))
    }
}
