//! Training configuration

use crate::params::Hyperparameters;
use serde::{Deserialize, Serialize};

/// Kind of supervised task a model solves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    /// Discrete labels, scored with accuracy
    Classification,
    /// Continuous target, scored with r2
    Regression,
}

/// Model kind used when none is given
pub const DEFAULT_MODEL_KIND: &str = "RandomForestClassifier";

/// Configuration for one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfiguration {
    /// Registered model kind name
    pub model_kind: String,

    /// Estimator hyperparameters
    pub hyperparameters: Hyperparameters,

    /// Label column (None = last column)
    pub target_column: Option<String>,

    /// Columns excluded before preprocessing
    pub columns_to_drop: Option<Vec<String>>,
}

impl Default for ModelConfiguration {
    fn default() -> Self {
        Self {
            model_kind: DEFAULT_MODEL_KIND.to_string(),
            hyperparameters: Hyperparameters::new(),
            target_column: None,
            columns_to_drop: None,
        }
    }
}

impl ModelConfiguration {
    /// Create a configuration for the given model kind
    pub fn new(model_kind: impl Into<String>) -> Self {
        Self {
            model_kind: model_kind.into(),
            ..Self::default()
        }
    }

    /// Builder: set hyperparameters
    pub fn with_hyperparameters(mut self, params: Hyperparameters) -> Self {
        self.hyperparameters = params;
        self
    }

    /// Builder: set target column
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_column = Some(target.into());
        self
    }

    /// Builder: set columns to drop
    pub fn with_columns_to_drop(mut self, columns: Vec<String>) -> Self {
        self.columns_to_drop = Some(columns);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelConfiguration::default();
        assert_eq!(config.model_kind, "RandomForestClassifier");
        assert!(config.hyperparameters.is_empty());
        assert!(config.target_column.is_none());
        assert!(config.columns_to_drop.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ModelConfiguration::new("LogisticRegression")
            .with_target("label")
            .with_columns_to_drop(vec!["id".to_string()])
            .with_hyperparameters(Hyperparameters::new().with("C", 0.1));

        assert_eq!(config.model_kind, "LogisticRegression");
        assert_eq!(config.target_column.as_deref(), Some("label"));
        assert_eq!(config.columns_to_drop, Some(vec!["id".to_string()]));
        assert_eq!(config.hyperparameters.f64("C").unwrap(), Some(0.1));
    }
}
