//! Training pipeline
//!
//! `TrainingPipeline` is a small state machine:
//!
//! ```text
//! Untrained --train--> Trained --train--> Trained
//!     |                   |
//!     +------load-------> Loaded --train--> Trained
//! ```
//!
//! `predict` on an untrained pipeline loads the stored artifact first.

use crate::error::{PipelineError, Result};
use crate::preprocessing::{drop_columns, Preprocessor};
use crate::storage::{ArtifactStore, TrainedArtifact, ARTIFACT_FORMAT_VERSION};
use super::{Estimator, EvaluationMetric, ModelConfiguration, ModelRegistry};
use chrono::Utc;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Fraction of rows held out for scoring
pub const HOLDOUT_FRACTION: f64 = 0.2;

/// Seed for the train/holdout shuffle
pub const SPLIT_SEED: u64 = 42;

/// Lifecycle state of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Untrained,
    /// Trained in this process
    Trained,
    /// Restored from the artifact store
    Loaded,
}

impl PipelineState {
    /// Whether `predict` can run without loading
    pub fn is_ready(&self) -> bool {
        matches!(self, PipelineState::Trained | PipelineState::Loaded)
    }
}

/// Result of a successful training run
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub metric: EvaluationMetric,
    pub artifact_location: PathBuf,
}

/// Preprocess, fit, score and persist
pub struct TrainingPipeline {
    store: Arc<dyn ArtifactStore>,
    registry: ModelRegistry,
    state: PipelineState,
    preprocessor: Preprocessor,
    artifact: Option<TrainedArtifact>,
}

impl TrainingPipeline {
    /// Pipeline with the default model kinds
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self::with_registry(store, ModelRegistry::default())
    }

    pub fn with_registry(store: Arc<dyn ArtifactStore>, registry: ModelRegistry) -> Self {
        Self {
            store,
            registry,
            state: PipelineState::Untrained,
            preprocessor: Preprocessor::new(),
            artifact: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Artifact of the last train or load
    pub fn artifact(&self) -> Option<&TrainedArtifact> {
        self.artifact.as_ref()
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Fit a model on `df` and persist it.
    ///
    /// On failure nothing is persisted and the pipeline keeps its previous state.
    pub fn train(&mut self, df: &DataFrame, config: &ModelConfiguration) -> Result<TrainOutcome> {
        let start = Instant::now();
        let task = self.registry.task(&config.model_kind)?;
        if df.height() == 0 || df.width() < 2 {
            return Err(PipelineError::DataError(format!(
                "training table needs at least 1 row and 2 columns, got {}x{}",
                df.height(),
                df.width()
            )));
        }

        let mut preprocessor = Preprocessor::new();
        let processed = preprocessor.fit_transform(df, config.columns_to_drop.as_deref())?;

        let target = resolve_target(&processed, config.target_column.as_deref())?;
        let feature_names: Vec<String> = processed
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != target)
            .map(|name| name.to_string())
            .collect();
        if feature_names.is_empty() {
            return Err(PipelineError::DataError(format!(
                "no feature columns left besides target '{}'",
                target
            )));
        }

        let x = columns_to_array2(&processed, &feature_names)?;
        let y = column_to_array1(&processed, &target)?;

        let (train_idx, test_idx) = split_indices(x.nrows())?;
        let x_train = x.select(Axis(0), &train_idx);
        let y_train = y.select(Axis(0), &train_idx);
        let x_test = x.select(Axis(0), &test_idx);
        let y_test = y.select(Axis(0), &test_idx);
        debug!(train = train_idx.len(), holdout = test_idx.len(), "Split rows");

        let mut model = self.registry.create(&config.model_kind, &config.hyperparameters)?;
        model.fit(&x_train, &y_train).map_err(into_training_error)?;
        let y_pred = model.predict(&x_test).map_err(into_training_error)?;
        let metric = EvaluationMetric::for_task(task, &y_test, &y_pred);

        let artifact = TrainedArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            model_kind: config.model_kind.clone(),
            model,
            encoders: preprocessor.encoders().clone(),
            target_column: target,
            feature_names,
            metric: metric.clone(),
            trained_at: Utc::now(),
        };
        self.store.save(&artifact)?;

        info!(
            model_kind = %artifact.model_kind,
            rows = x.nrows(),
            features = artifact.feature_names.len(),
            metric = %metric.name,
            value = metric.value,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model trained"
        );

        self.preprocessor = preprocessor;
        self.artifact = Some(artifact);
        self.state = PipelineState::Trained;

        Ok(TrainOutcome {
            metric,
            artifact_location: self.store.location().to_path_buf(),
        })
    }

    /// Restore model and encoders from the artifact store
    pub fn load(&mut self) -> Result<()> {
        let artifact = self.store.load()?;
        info!(
            model_kind = %artifact.model_kind,
            trained_at = %artifact.trained_at,
            "Model loaded"
        );

        self.preprocessor = Preprocessor::from_encoders(artifact.encoders.clone());
        self.artifact = Some(artifact);
        self.state = PipelineState::Loaded;
        Ok(())
    }

    /// Predict one value per row of `df`.
    ///
    /// Feature columns are matched by name. Extra numeric columns are ignored;
    /// an extra text column has no encoder and is a `SchemaMismatch`.
    pub fn predict(&mut self, df: &DataFrame, columns_to_drop: Option<&[String]>) -> Result<Vec<f64>> {
        if !self.state.is_ready() {
            self.load()?;
        }
        let artifact = self
            .artifact
            .as_ref()
            .ok_or_else(|| PipelineError::ArtifactNotFound { path: self.store.location().to_path_buf() })?;

        if df.height() == 0 {
            return Ok(Vec::new());
        }

        let remaining = match columns_to_drop {
            Some(names) => drop_columns(df, names),
            None => df.clone(),
        };
        if let Some(missing) = artifact
            .feature_names
            .iter()
            .find(|name| remaining.get_column_index(name).is_none())
        {
            return Err(PipelineError::ColumnNotFound(missing.clone()));
        }

        // Text columns without an encoder fail here; extra numeric columns pass through
        let processed = self.preprocessor.transform(&remaining, None)?;
        let x = columns_to_array2(&processed, &artifact.feature_names)?;

        let predictions = artifact.model.predict(&x)?;
        debug!(rows = predictions.len(), "Predictions computed");
        Ok(predictions.to_vec())
    }
}

fn into_training_error(err: PipelineError) -> PipelineError {
    match err {
        PipelineError::TrainingError(_) => err,
        other => PipelineError::training(other),
    }
}

/// Explicit target must exist; otherwise the last column is the target.
fn resolve_target(df: &DataFrame, target: Option<&str>) -> Result<String> {
    match target {
        Some(name) => {
            if df.get_column_index(name).is_none() {
                return Err(PipelineError::ColumnNotFound(name.to_string()));
            }
            Ok(name.to_string())
        }
        None => {
            let last = df
                .get_column_names()
                .last()
                .map(|name| name.to_string())
                .ok_or_else(|| PipelineError::DataError("table has no columns".to_string()))?;
            info!(target_column = %last, "No target column given, using the last column");
            Ok(last)
        }
    }
}

/// Shuffled (train, holdout) row indices; holdout is ceil(20%) of rows.
fn split_indices(n_rows: usize) -> Result<(Vec<usize>, Vec<usize>)> {
    if n_rows < 2 {
        return Err(PipelineError::DataError(format!(
            "need at least 2 rows to split into train and holdout, got {}",
            n_rows
        )));
    }

    let n_test = ((n_rows as f64) * HOLDOUT_FRACTION).ceil() as usize;
    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(SPLIT_SEED);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok((train, indices))
}

fn column_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::ColumnNotFound(name.to_string()))?;
    let as_f64 = column.cast(&DataType::Float64)?;
    as_f64
        .f64()?
        .into_iter()
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| PipelineError::DataError(format!("column '{}' still has missing values", name)))
}

fn column_to_array1(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    Ok(Array1::from_vec(column_values(df, name)?))
}

/// Extract named columns into a row-major matrix
fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let col_data = col_names
        .iter()
        .map(|name| column_values(df, name))
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((df.height(), col_names.len()), |(r, c)| col_data[c][r]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Hyperparameters;
    use crate::storage::FsArtifactStore;

    fn pipeline(dir: &tempfile::TempDir) -> TrainingPipeline {
        TrainingPipeline::new(Arc::new(FsArtifactStore::new(dir.path())))
    }

    fn regression_data() -> DataFrame {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v + 1.0).collect();
        df!("x" => x, "y" => y).unwrap()
    }

    #[test]
    fn test_split_sizes() {
        let (train, test) = split_indices(10).unwrap();
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);

        let (train, test) = split_indices(4).unwrap();
        assert_eq!((train.len(), test.len()), (3, 1));

        let mut all: Vec<usize> = train.into_iter().chain(test).collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3]);

        assert!(split_indices(1).is_err());
    }

    #[test]
    fn test_split_is_deterministic() {
        assert_eq!(split_indices(50).unwrap(), split_indices(50).unwrap());
    }

    #[test]
    fn test_train_then_predict() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(&dir);
        assert_eq!(pipeline.state(), PipelineState::Untrained);

        let config = ModelConfiguration::new("LinearRegression");
        let outcome = pipeline.train(&regression_data(), &config).unwrap();
        assert_eq!(outcome.metric.name, "r2_score");
        assert!(outcome.metric.value > 0.99);
        assert_eq!(pipeline.state(), PipelineState::Trained);
        assert!(outcome.artifact_location.exists());

        let input = df!("x" => [100.0]).unwrap();
        let predictions = pipeline.predict(&input, None).unwrap();
        assert!((predictions[0] - 301.0).abs() < 1e-6);
    }

    #[test]
    fn test_predict_lazily_loads() {
        let dir = tempfile::tempdir().unwrap();
        pipeline(&dir)
            .train(&regression_data(), &ModelConfiguration::new("LinearRegression"))
            .unwrap();

        let mut fresh = pipeline(&dir);
        let input = df!("extra" => [5.0], "x" => [2.0]).unwrap();
        let predictions = fresh.predict(&input, None).unwrap();
        assert_eq!(fresh.state(), PipelineState::Loaded);
        assert!((predictions[0] - 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_predict_rejects_text_column_without_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(&dir);
        pipeline
            .train(&regression_data(), &ModelConfiguration::new("LinearRegression"))
            .unwrap();

        let input = df!("x" => [1.0], "color" => ["red"]).unwrap();
        assert!(matches!(
            pipeline.predict(&input, None),
            Err(PipelineError::SchemaMismatch(_))
        ));

        // Dropping the column first makes the request valid
        let predictions = pipeline.predict(&input, Some(&["color".to_string()])).unwrap();
        assert!((predictions[0] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_encoded_column_inferred_as_integer_keeps_its_codes() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(&dir);
        let df = df!(
            "code" => ["1", "2", "x", "1", "2", "x", "1", "2", "x", "1"],
            "y" => [10.0, 20.0, 30.0, 10.0, 20.0, 30.0, 10.0, 20.0, 30.0, 10.0]
        )
        .unwrap();
        pipeline.train(&df, &ModelConfiguration::new("DecisionTreeRegressor")).unwrap();

        let as_text = df!("code" => ["1", "2"]).unwrap();
        let as_int = df!("code" => [1i64, 2]).unwrap();
        let expected = pipeline.predict(&as_text, None).unwrap();
        assert_eq!(expected, vec![10.0, 20.0]);
        assert_eq!(pipeline.predict(&as_int, None).unwrap(), expected);
    }

    #[test]
    fn test_predict_without_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(&dir);
        let input = df!("x" => [1.0]).unwrap();
        assert!(matches!(
            pipeline.predict(&input, None),
            Err(PipelineError::ArtifactNotFound { .. })
        ));
        assert_eq!(pipeline.state(), PipelineState::Untrained);
    }

    #[test]
    fn test_predict_missing_feature() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(&dir);
        pipeline
            .train(&regression_data(), &ModelConfiguration::new("LinearRegression"))
            .unwrap();

        let input = df!("z" => [1.0]).unwrap();
        assert!(matches!(
            pipeline.predict(&input, None),
            Err(PipelineError::ColumnNotFound(name)) if name == "x"
        ));
    }

    #[test]
    fn test_predict_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(&dir);
        pipeline
            .train(&regression_data(), &ModelConfiguration::new("LinearRegression"))
            .unwrap();

        let empty = regression_data().head(Some(0));
        assert!(pipeline.predict(&empty, None).unwrap().is_empty());
    }

    #[test]
    fn test_explicit_target_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfiguration::new("LinearRegression").with_target("nope");
        assert!(matches!(
            pipeline(&dir).train(&regression_data(), &config),
            Err(PipelineError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_unsupported_model_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(&dir);
        let config = ModelConfiguration::new("SVC");
        assert!(matches!(
            pipeline.train(&regression_data(), &config),
            Err(PipelineError::UnsupportedModel(_))
        ));
        assert!(!pipeline.store().exists());
        assert_eq!(pipeline.state(), PipelineState::Untrained);
    }

    #[test]
    fn test_only_target_column() {
        let dir = tempfile::tempdir().unwrap();
        let df = df!("y" => [1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(
            pipeline(&dir).train(&df, &ModelConfiguration::new("LinearRegression")),
            Err(PipelineError::DataError(_))
        ));
    }

    #[test]
    fn test_bad_hyperparameter_is_training_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfiguration::new("RandomForestRegressor")
            .with_hyperparameters(Hyperparameters::new().with("n_estimators", "ten"));
        assert!(matches!(
            pipeline(&dir).train(&regression_data(), &config),
            Err(PipelineError::TrainingError(_))
        ));
    }

    #[test]
    fn test_categorical_columns_roundtrip_through_encoders() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(&dir);
        let df = df!(
            "color" => ["red", "blue", "red", "blue", "red", "blue", "red", "blue", "red", "blue"],
            "label" => ["yes", "no", "yes", "no", "yes", "no", "yes", "no", "yes", "no"]
        )
        .unwrap();

        let config = ModelConfiguration::new("DecisionTreeClassifier");
        let outcome = pipeline.train(&df, &config).unwrap();
        assert_eq!(outcome.metric.name, "accuracy");
        assert_eq!(outcome.metric.value, 1.0);

        // blue -> 0, red -> 1; no -> 0, yes -> 1
        let input = df!("color" => ["red", "blue"]).unwrap();
        assert_eq!(pipeline.predict(&input, None).unwrap(), vec![1.0, 0.0]);

        let unseen = df!("color" => ["green"]).unwrap();
        assert!(matches!(
            pipeline.predict(&unseen, None),
            Err(PipelineError::UnseenCategory { .. })
        ));
    }

    #[test]
    fn test_columns_to_drop_applied_on_both_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = pipeline(&dir);
        let mut df = regression_data();
        df.with_column(Series::new("id".into(), (0..20).map(|i| format!("row{}", i)).collect::<Vec<_>>()))
            .unwrap();
        let df = df.select(["id", "x", "y"]).unwrap();

        let config = ModelConfiguration::new("LinearRegression").with_columns_to_drop(vec!["id".to_string()]);
        pipeline.train(&df, &config).unwrap();
        assert_eq!(pipeline.artifact().unwrap().feature_names, vec!["x".to_string()]);

        let input = df!("id" => ["new"], "x" => [1.0]).unwrap();
        let predictions = pipeline.predict(&input, Some(&["id".to_string()])).unwrap();
        assert!((predictions[0] - 4.0).abs() < 1e-6);
    }
}
