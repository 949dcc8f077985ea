//! Estimator trait and evaluation metrics

use crate::error::Result;
use super::TaskType;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Trait for fit/predict models
pub trait Estimator: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// One prediction per row of `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Task the estimator solves
    fn task(&self) -> TaskType;
}

/// Score of a fitted model on the holdout partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetric {
    /// `accuracy` or `r2_score`
    pub name: String,
    pub value: f64,
}

impl EvaluationMetric {
    /// Score predictions with the metric matching `task`.
    pub fn for_task(task: TaskType, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        match task {
            TaskType::Classification => Self {
                name: "accuracy".to_string(),
                value: accuracy(y_true, y_pred),
            },
            TaskType::Regression => Self {
                name: "r2_score".to_string(),
                value: r2_score(y_true, y_pred),
            },
        }
    }
}

/// Fraction of exact label matches
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Coefficient of determination.
///
/// A constant target scores 1.0 when predicted exactly, 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let n = y_true.len() as f64;
    let y_mean = y_true.sum() / n;

    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    }
}
