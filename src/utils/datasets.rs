//! Built-in datasets used when no file is uploaded

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Name of the dataset used by default
pub const DEFAULT_DATASET: &str = "iris";

const DATASET_SEED: u64 = 42;

/// Resolves the default training dataset by name
#[derive(Debug, Clone)]
pub struct DatasetManager {
    default_name: String,
}

impl Default for DatasetManager {
    fn default() -> Self {
        Self::new(DEFAULT_DATASET)
    }
}

impl DatasetManager {
    pub fn new(default_name: impl Into<String>) -> Self {
        Self { default_name: default_name.into() }
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Load the configured default dataset
    pub fn load_default(&self) -> Result<DataFrame> {
        let df = self.load(&self.default_name)?;
        info!(dataset = %self.default_name, rows = df.height(), "Loaded default dataset");
        Ok(df)
    }

    /// Load a built-in dataset by name
    pub fn load(&self, name: &str) -> Result<DataFrame> {
        match name {
            "iris" => iris(),
            other => Err(PipelineError::DataError(format!("unknown dataset '{}'", other))),
        }
    }
}

/// Three well separated classes of 50 flowers each, last column `target`
fn iris() -> Result<DataFrame> {
    let mut rng = ChaCha8Rng::seed_from_u64(DATASET_SEED);
    let n = 150;

    // (base, spread) per class for each measurement
    let mut measure = |bases: [f64; 3], spread: f64| -> Vec<f64> {
        (0..n)
            .map(|i| {
                let value = bases[i / 50] + rng.gen::<f64>() * spread;
                (value * 10.0).round() / 10.0
            })
            .collect()
    };

    let sepal_length = measure([5.0, 5.9, 6.6], 0.8);
    let sepal_width = measure([3.4, 2.8, 3.0], 0.5);
    let petal_length = measure([1.4, 4.3, 5.5], 0.5);
    let petal_width = measure([0.2, 1.3, 2.0], 0.3);
    let target: Vec<i64> = (0..n).map(|i| (i / 50) as i64).collect();

    Ok(df!(
        "sepal_length" => sepal_length,
        "sepal_width" => sepal_width,
        "petal_length" => petal_length,
        "petal_width" => petal_width,
        "target" => target
    )?)
}
