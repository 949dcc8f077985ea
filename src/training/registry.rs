//! Model kinds and their constructors
//!
//! A [`ModelRegistry`] maps a kind name such as `RandomForestClassifier` to
//! its task and a constructor that validates hyperparameters and returns an
//! unfitted [`TrainedModel`].

use crate::error::{PipelineError, Result};
use crate::params::Hyperparameters;
use super::decision_tree::{Criterion, DecisionTree, MaxFeatures};
use super::linear_models::{LinearRegression, LogisticRegression};
use super::random_forest::RandomForest;
use super::{Estimator, TaskType};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serializable model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    RandomForestClassifier(RandomForest),
    RandomForestRegressor(RandomForest),
    DecisionTreeClassifier(DecisionTree),
    DecisionTreeRegressor(DecisionTree),
    LogisticRegression(LogisticRegression),
    LinearRegression(LinearRegression),
}

impl TrainedModel {
    /// Registered kind name of this variant
    pub fn kind(&self) -> &'static str {
        match self {
            TrainedModel::RandomForestClassifier(_) => "RandomForestClassifier",
            TrainedModel::RandomForestRegressor(_) => "RandomForestRegressor",
            TrainedModel::DecisionTreeClassifier(_) => "DecisionTreeClassifier",
            TrainedModel::DecisionTreeRegressor(_) => "DecisionTreeRegressor",
            TrainedModel::LogisticRegression(_) => "LogisticRegression",
            TrainedModel::LinearRegression(_) => "LinearRegression",
        }
    }
}

impl Estimator for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            TrainedModel::RandomForestClassifier(m) | TrainedModel::RandomForestRegressor(m) => {
                m.fit(x, y)?;
            }
            TrainedModel::DecisionTreeClassifier(m) | TrainedModel::DecisionTreeRegressor(m) => {
                m.fit(x, y)?;
            }
            TrainedModel::LogisticRegression(m) => {
                m.fit(x, y)?;
            }
            TrainedModel::LinearRegression(m) => {
                m.fit(x, y)?;
            }
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::RandomForestClassifier(m) | TrainedModel::RandomForestRegressor(m) => m.predict(x),
            TrainedModel::DecisionTreeClassifier(m) | TrainedModel::DecisionTreeRegressor(m) => m.predict(x),
            TrainedModel::LogisticRegression(m) => m.predict(x),
            TrainedModel::LinearRegression(m) => m.predict(x),
        }
    }

    fn task(&self) -> TaskType {
        match self {
            TrainedModel::RandomForestClassifier(_)
            | TrainedModel::DecisionTreeClassifier(_)
            | TrainedModel::LogisticRegression(_) => TaskType::Classification,
            TrainedModel::RandomForestRegressor(_)
            | TrainedModel::DecisionTreeRegressor(_)
            | TrainedModel::LinearRegression(_) => TaskType::Regression,
        }
    }
}

/// Builds an unfitted model from hyperparameters
pub type ModelBuilder = fn(&Hyperparameters) -> Result<TrainedModel>;

#[derive(Debug, Clone, Copy)]
struct ModelSpec {
    task: TaskType,
    build: ModelBuilder,
}

/// Kind name -> constructor table
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    specs: BTreeMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("RandomForestClassifier", TaskType::Classification, build_forest_classifier);
        registry.register("RandomForestRegressor", TaskType::Regression, build_forest_regressor);
        registry.register("DecisionTreeClassifier", TaskType::Classification, build_tree_classifier);
        registry.register("DecisionTreeRegressor", TaskType::Regression, build_tree_regressor);
        registry.register("LogisticRegression", TaskType::Classification, build_logistic_regression);
        registry.register("LinearRegression", TaskType::Regression, build_linear_regression);
        registry
    }
}

impl ModelRegistry {
    /// Registry with no kinds
    pub fn empty() -> Self {
        Self { specs: BTreeMap::new() }
    }

    /// Add or replace a kind
    pub fn register(&mut self, kind: &str, task: TaskType, build: ModelBuilder) {
        self.specs.insert(kind.to_string(), ModelSpec { task, build });
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.specs.contains_key(kind)
    }

    /// Registered kind names in sorted order
    pub fn kinds(&self) -> Vec<&str> {
        self.specs.keys().map(String::as_str).collect()
    }

    /// Task of a kind, or `UnsupportedModel`
    pub fn task(&self, kind: &str) -> Result<TaskType> {
        self.spec(kind).map(|spec| spec.task)
    }

    /// Construct an unfitted model, validating its hyperparameters
    pub fn create(&self, kind: &str, params: &Hyperparameters) -> Result<TrainedModel> {
        let spec = self.spec(kind)?;
        (spec.build)(params)
    }

    fn spec(&self, kind: &str) -> Result<&ModelSpec> {
        self.specs
            .get(kind)
            .ok_or_else(|| PipelineError::UnsupportedModel(kind.to_string()))
    }
}

const FOREST_PARAMS: &[&str] = &[
    "n_estimators",
    "max_depth",
    "min_samples_split",
    "min_samples_leaf",
    "max_features",
    "bootstrap",
    "random_state",
    "criterion",
    "n_jobs",
];

const TREE_PARAMS: &[&str] = &[
    "max_depth",
    "min_samples_split",
    "min_samples_leaf",
    "max_features",
    "random_state",
    "criterion",
];

fn build_forest(params: &Hyperparameters, kind: &str, classification: bool) -> Result<RandomForest> {
    params.reject_unknown(kind, FOREST_PARAMS)?;

    let n_estimators = params.usize("n_estimators")?.unwrap_or(100);
    let mut forest = if classification {
        RandomForest::new_classifier(n_estimators)
    } else {
        RandomForest::new_regressor(n_estimators)
    };

    if let Some(depth) = params.nullable_usize("max_depth")? {
        forest = forest.with_max_depth(depth);
    }
    if let Some(n) = params.usize("min_samples_split")? {
        forest = forest.with_min_samples_split(n);
    }
    if let Some(n) = params.usize("min_samples_leaf")? {
        forest = forest.with_min_samples_leaf(n);
    }
    if let Some(value) = params.get("max_features") {
        forest = forest.with_max_features(MaxFeatures::from_value(value)?);
    }
    if let Some(bootstrap) = params.bool("bootstrap")? {
        forest = forest.with_bootstrap(bootstrap);
    }
    if let Some(Some(seed)) = params.nullable_usize("random_state")? {
        forest = forest.with_random_state(seed as u64);
    }
    if let Some(name) = params.str("criterion")? {
        forest = forest.with_criterion(Criterion::parse(name, classification)?);
    }
    // n_jobs is accepted for compatibility; rayon sizes the pool
    if let Some(value) = params.get("n_jobs") {
        if !(value.is_null() || value.is_i64() || value.is_u64()) {
            return Err(PipelineError::TrainingError(format!(
                "parameter 'n_jobs' must be an integer or null, got {}",
                value
            )));
        }
    }

    Ok(forest)
}

fn build_forest_classifier(params: &Hyperparameters) -> Result<TrainedModel> {
    build_forest(params, "RandomForestClassifier", true).map(TrainedModel::RandomForestClassifier)
}

fn build_forest_regressor(params: &Hyperparameters) -> Result<TrainedModel> {
    build_forest(params, "RandomForestRegressor", false).map(TrainedModel::RandomForestRegressor)
}

fn build_tree(params: &Hyperparameters, kind: &str, classification: bool) -> Result<DecisionTree> {
    params.reject_unknown(kind, TREE_PARAMS)?;

    let mut tree = if classification {
        DecisionTree::new_classifier()
    } else {
        DecisionTree::new_regressor()
    };

    if let Some(depth) = params.nullable_usize("max_depth")? {
        tree = tree.with_max_depth(depth);
    }
    if let Some(n) = params.usize("min_samples_split")? {
        tree = tree.with_min_samples_split(n);
    }
    if let Some(n) = params.usize("min_samples_leaf")? {
        tree = tree.with_min_samples_leaf(n);
    }
    if let Some(value) = params.get("max_features") {
        tree = tree.with_max_features(MaxFeatures::from_value(value)?);
    }
    if let Some(Some(seed)) = params.nullable_usize("random_state")? {
        tree = tree.with_random_state(seed as u64);
    }
    if let Some(name) = params.str("criterion")? {
        tree = tree.with_criterion(Criterion::parse(name, classification)?);
    }

    Ok(tree)
}

fn build_tree_classifier(params: &Hyperparameters) -> Result<TrainedModel> {
    build_tree(params, "DecisionTreeClassifier", true).map(TrainedModel::DecisionTreeClassifier)
}

fn build_tree_regressor(params: &Hyperparameters) -> Result<TrainedModel> {
    build_tree(params, "DecisionTreeRegressor", false).map(TrainedModel::DecisionTreeRegressor)
}

fn build_logistic_regression(params: &Hyperparameters) -> Result<TrainedModel> {
    params.reject_unknown(
        "LogisticRegression",
        &["C", "max_iter", "tol", "fit_intercept", "learning_rate", "random_state"],
    )?;

    let mut model = LogisticRegression::new();
    if let Some(c) = params.f64("C")? {
        model = model.with_c(c);
    }
    if let Some(n) = params.usize("max_iter")? {
        model = model.with_max_iter(n);
    }
    if let Some(tol) = params.f64("tol")? {
        model = model.with_tol(tol);
    }
    if let Some(fit) = params.bool("fit_intercept")? {
        model = model.with_fit_intercept(fit);
    }
    if let Some(lr) = params.f64("learning_rate")? {
        model = model.with_learning_rate(lr);
    }
    // The solver is deterministic; the seed is only type-checked
    params.nullable_usize("random_state")?;

    Ok(TrainedModel::LogisticRegression(model))
}

fn build_linear_regression(params: &Hyperparameters) -> Result<TrainedModel> {
    params.reject_unknown("LinearRegression", &["fit_intercept"])?;

    let mut model = LinearRegression::new();
    if let Some(fit) = params.bool("fit_intercept")? {
        model = model.with_fit_intercept(fit);
    }
    Ok(TrainedModel::LinearRegression(model))
}
