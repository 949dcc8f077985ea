//! tabserve - train and serve tabular models
//!
//! This crate provides a small train/predict pipeline for CSV data:
//! - Parsing of textual model and column configuration
//! - Preprocessing with imputation and label encoding
//! - Random forest, decision tree and linear estimators
//! - Atomic persistence of the trained artifact
//! - Trainer, predictor and gateway HTTP services and a CLI
//!
//! # Modules
//!
//! ## Core
//! - [`params`] - Hyperparameter and column list parsing
//! - [`preprocessing`] - Column dropping, imputation, categorical encoding
//! - [`training`] - Estimators, model registry and the training pipeline
//! - [`storage`] - Artifact persistence
//!
//! ## Services
//! - [`server`] - Trainer, predictor and gateway HTTP services
//! - [`cli`] - Command-line interface
//!
//! ## Utilities
//! - [`utils`] - CSV loading and built-in datasets

// Core error handling
pub mod error;

// Core modules
pub mod params;
pub mod preprocessing;
pub mod training;
pub mod storage;

// Services
pub mod server;
pub mod cli;

// Utilities
pub mod utils;

pub use error::{PipelineError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{PipelineError, Result};
    pub use crate::params::{parse_columns_to_drop, parse_model_params, Hyperparameters};
    pub use crate::preprocessing::{drop_columns, CategoricalEncoder, EncoderSet, Preprocessor};
    pub use crate::storage::{ArtifactStore, FsArtifactStore, TrainedArtifact};
    pub use crate::training::{
        Estimator, EvaluationMetric, ModelConfiguration, ModelRegistry, PipelineState, TaskType,
        TrainOutcome, TrainedModel, TrainingPipeline,
    };
    pub use crate::utils::{DataLoader, DatasetManager};
}
