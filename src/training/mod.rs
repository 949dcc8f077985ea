//! Model training module
//!
//! Provides the estimators behind each model kind and the pipeline that
//! preprocesses a table, fits a model, scores it and persists the artifact:
//! - Decision trees and Random Forests
//! - Linear and logistic regression

mod config;
mod engine;
mod models;
pub mod decision_tree;
pub mod linear_models;
pub mod random_forest;
pub mod registry;

pub use config::{ModelConfiguration, TaskType, DEFAULT_MODEL_KIND};
pub use engine::{PipelineState, TrainOutcome, TrainingPipeline};
pub use models::{accuracy, r2_score, Estimator, EvaluationMetric};
pub use decision_tree::{Criterion, DecisionTree, MaxFeatures, TreeNode};
pub use linear_models::{LinearRegression, LogisticRegression};
pub use random_forest::RandomForest;
pub use registry::{ModelBuilder, ModelRegistry, TrainedModel};
