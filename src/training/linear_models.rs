//! Linear model implementations

use crate::error::{PipelineError, Result};
use super::decision_tree::check_discrete_labels;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve symmetric positive-definite system Ax = b using Cholesky decomposition.
/// Adds a small ridge once if the matrix is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    cholesky_factor(a)
        .or_else(|| {
            let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
            let mut a_reg = a.clone();
            for k in 0..n {
                a_reg[[k, k]] += ridge.max(1e-12);
            }
            cholesky_factor(&a_reg)
        })
        .map(|l| {
            // Forward substitution: L * y = b
            let mut y = Array1::zeros(n);
            for i in 0..n {
                let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
                y[i] = (b[i] - sum) / l[[i, i]];
            }

            // Backward substitution: L^T * x = y
            let mut x = Array1::zeros(n);
            for i in (0..n).rev() {
                let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
                x[i] = (y[i] - sum) / l[[i, i]];
            }
            x
        })
}

/// Lower-triangular L with A = L * L^T, or None if A is not positive definite.
fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    Some(l)
}

/// Matrix inversion by Gauss-Jordan elimination (fallback for singular-ish systems)
fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    // Augmented matrix [M | I]
    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let max_row = (col..n)
            .max_by(|&a, &b| {
                aug[[a, col]]
                    .abs()
                    .partial_cmp(&aug[[b, col]].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);

        if max_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [max_row, j]);
            }
        }

        if aug[[col, col]].abs() < 1e-10 {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }

        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..2 * n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    Some(Array2::from_shape_fn((n, n), |(i, j)| aug[[i, n + j]]))
}

/// Solve least squares via normal equations: (X^T X) w = X^T y
fn solve_least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Option<Array1<f64>> {
    let xtx = x.t().dot(x);
    let xty = x.t().dot(y);

    cholesky_solve(&xtx, &xty).or_else(|| matrix_inverse(&xtx).map(|inv| inv.dot(&xty)))
}

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::TrainingError(format!(
            "feature rows ({}) and labels ({}) differ in length",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(PipelineError::TrainingError("cannot fit on zero samples".to_string()));
    }
    Ok(())
}

/// Ordinary least squares regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients (weights)
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept (bias)
    pub intercept: f64,
    /// Whether to fit intercept
    pub fit_intercept: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
        }
    }

    /// Enable/disable fitting intercept
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Fit the model to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;

        // Center data if fitting intercept
        let (x_work, y_work, offsets) = if self.fit_intercept {
            let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
            let y_mean = y.mean().unwrap_or(0.0);
            let x_centered = x - &x_mean.view().insert_axis(Axis(0));
            let y_centered = y - y_mean;
            (x_centered, y_centered, Some((x_mean, y_mean)))
        } else {
            (x.clone(), y.clone(), None)
        };

        let coefficients = solve_least_squares(&x_work, &y_work).ok_or_else(|| {
            PipelineError::TrainingError("matrix is singular, cannot solve least squares".to_string())
        })?;

        self.intercept = match offsets {
            Some((x_mean, y_mean)) => y_mean - coefficients.dot(&x_mean),
            None => 0.0,
        };
        self.coefficients = Some(coefficients);

        Ok(self)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| PipelineError::TrainingError("linear regression is not fitted".to_string()))?;

        if x.ncols() != coefficients.len() {
            return Err(PipelineError::SchemaMismatch(format!(
                "model expects {} features, got {}",
                coefficients.len(),
                x.ncols()
            )));
        }

        Ok(x.dot(coefficients) + self.intercept)
    }
}

/// Gradient epochs run per unit of `max_iter`
const EPOCHS_PER_ITER: usize = 10;

/// Multinomial logistic regression with L2 penalty, fit by batch gradient descent
/// on standardized features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    /// Learning rate
    pub learning_rate: f64,
    /// Sorted class labels seen at fit time
    classes: Vec<f64>,
    /// Per-feature mean and scale used for standardization
    means: Option<Array1<f64>>,
    scales: Option<Array1<f64>>,
    /// n_features x n_classes
    weights: Option<Array2<f64>>,
    intercepts: Option<Array1<f64>>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-4,
            fit_intercept: true,
            learning_rate: 0.5,
            classes: Vec::new(),
            means: None,
            scales: None,
            weights: None,
            intercepts: None,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Fit the model using gradient descent on the softmax cross-entropy
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;
        check_discrete_labels(y)?;

        if !(self.c > 0.0) {
            return Err(PipelineError::TrainingError("C must be positive".to_string()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(PipelineError::TrainingError("learning_rate must be positive".to_string()));
        }

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        classes.dedup();
        if classes.len() < 2 {
            return Err(PipelineError::TrainingError(format!(
                "logistic regression needs samples of at least 2 classes, got {}",
                classes.len()
            )));
        }

        let n_samples = x.nrows() as f64;
        let n_classes = classes.len();

        let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let scales = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 1e-12 { s } else { 1.0 });
        let xs = (x - &means.view().insert_axis(Axis(0))) / &scales.view().insert_axis(Axis(0));

        let mut targets = Array2::<f64>::zeros((x.nrows(), n_classes));
        for (i, label) in y.iter().enumerate() {
            if let Some(k) = classes.iter().position(|c| c == label) {
                targets[[i, k]] = 1.0;
            }
        }

        let mut weights = Array2::<f64>::zeros((x.ncols(), n_classes));
        let mut intercepts = Array1::<f64>::zeros(n_classes);
        let penalty = 1.0 / (self.c * n_samples);

        for _ in 0..self.max_iter.saturating_mul(EPOCHS_PER_ITER) {
            let probs = softmax(xs.dot(&weights) + &intercepts);
            let errors = probs - &targets;

            let grad_w = xs.t().dot(&errors) / n_samples + &(&weights * penalty);
            let grad_b = errors.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_classes));

            let mut grad_norm = grad_w.mapv(|v| v * v).sum();
            if self.fit_intercept {
                grad_norm += grad_b.mapv(|v| v * v).sum();
            }
            if grad_norm.sqrt() < self.tol {
                break;
            }

            weights.scaled_add(-self.learning_rate, &grad_w);
            if self.fit_intercept {
                intercepts.scaled_add(-self.learning_rate, &grad_b);
            }
        }

        self.classes = classes;
        self.means = Some(means);
        self.scales = Some(scales);
        self.weights = Some(weights);
        self.intercepts = Some(intercepts);

        Ok(self)
    }

    /// Class probabilities, one column per entry of [`classes`](Self::classes)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (means, scales, weights, intercepts) = match (&self.means, &self.scales, &self.weights, &self.intercepts) {
            (Some(m), Some(s), Some(w), Some(b)) => (m, s, w, b),
            _ => {
                return Err(PipelineError::TrainingError(
                    "logistic regression is not fitted".to_string(),
                ))
            }
        };

        if x.ncols() != means.len() {
            return Err(PipelineError::SchemaMismatch(format!(
                "model expects {} features, got {}",
                means.len(),
                x.ncols()
            )));
        }

        let xs = (x - &means.view().insert_axis(Axis(0))) / &scales.view().insert_axis(Axis(0));
        Ok(softmax(xs.dot(weights) + intercepts))
    }

    /// Predict class labels; ties go to the smaller label
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .fold((0usize, f64::NEG_INFINITY), |acc, (k, &p)| if p > acc.1 { (k, p) } else { acc })
                    .0;
                self.classes[best]
            })
            .collect())
    }
}

/// Row-wise softmax with max subtraction for stability
fn softmax(mut logits: Array2<f64>) -> Array2<f64> {
    for mut row in logits.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let total = row.sum();
        if total > 0.0 {
            row /= total;
        }
    }
    logits
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_regression_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![3.0, 5.0, 7.0, 9.0, 11.0]; // y = 2x + 1

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-6);
        assert!((model.intercept - 1.0).abs() < 1e-6);

        let pred = model.predict(&array![[6.0]]).unwrap();
        assert!((pred[0] - 13.0).abs() < 1e-6);
    }

    #[test]
    fn test_linear_regression_without_intercept() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![2.0, 4.0, 6.0];

        let mut model = LinearRegression::new().with_fit_intercept(false);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.intercept, 0.0);
        assert!((model.coefficients.as_ref().unwrap()[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_matrix_inverse() {
        let m = array![[4.0, 7.0], [2.0, 6.0]];
        let inv = matrix_inverse(&m).unwrap();
        let identity = m.dot(&inv);
        assert!((identity[[0, 0]] - 1.0).abs() < 1e-9);
        assert!(identity[[0, 1]].abs() < 1e-9);
        assert!(matrix_inverse(&array![[1.0, 2.0], [2.0, 4.0]]).is_none());
    }

    #[test]
    fn test_logistic_regression_binary() {
        let x = array![[0.0], [0.5], [1.0], [3.0], [3.5], [4.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_logistic_regression_multiclass() {
        let x = array![
            [0.0, 0.0], [0.2, 0.1], [0.1, 0.3],
            [5.0, 0.0], [5.2, 0.1], [4.9, 0.3],
            [0.0, 5.0], [0.2, 5.1], [0.1, 4.8],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0];

        let mut model = LogisticRegression::new().with_c(10.0);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.classes(), &[0.0, 1.0, 2.0]);
        assert_eq!(model.predict(&x).unwrap(), y);

        let proba = model.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_logistic_regression_needs_two_classes() {
        let mut model = LogisticRegression::new();
        let err = model.fit(&array![[1.0], [2.0]], &array![1.0, 1.0]).unwrap_err();
        assert!(matches!(err, PipelineError::TrainingError(_)));
    }
}
