//! Decision tree implementation

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

impl Criterion {
    /// Parse a criterion name as accepted in hyperparameters.
    pub fn parse(name: &str, is_classification: bool) -> Result<Self> {
        match (name, is_classification) {
            ("gini", true) => Ok(Criterion::Gini),
            ("entropy" | "log_loss", true) => Ok(Criterion::Entropy),
            ("squared_error" | "mse", false) => Ok(Criterion::MSE),
            _ => Err(PipelineError::TrainingError(format!(
                "criterion '{}' is not valid for {}",
                name,
                if is_classification { "classification" } else { "regression" }
            ))),
        }
    }
}

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    /// Parse the `max_features` hyperparameter value.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        use serde_json::Value;
        match value {
            Value::Null => Ok(MaxFeatures::All),
            Value::String(s) => match s.as_str() {
                "sqrt" | "auto" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                other => Err(PipelineError::TrainingError(format!(
                    "max_features '{}' is not one of sqrt, log2",
                    other
                ))),
            },
            Value::Number(n) => {
                if let Some(k) = n.as_u64() {
                    if k == 0 {
                        return Err(PipelineError::TrainingError(
                            "max_features must be at least 1".to_string(),
                        ));
                    }
                    return Ok(MaxFeatures::Fixed(k as usize));
                }
                match n.as_f64() {
                    Some(f) if f > 0.0 && f <= 1.0 => Ok(MaxFeatures::Fraction(f)),
                    _ => Err(PipelineError::TrainingError(format!(
                        "max_features {} must be a positive integer or a fraction in (0, 1]",
                        n
                    ))),
                }
            }
            other => Err(PipelineError::TrainingError(format!(
                "max_features must be a string, number or null, got {}",
                other
            ))),
        }
    }

    /// Number of features drawn per split.
    pub fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).floor() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

/// Per-class sample counts keyed by integer label
type ClassCounts = BTreeMap<i64, usize>;

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn per split
    pub max_features: MaxFeatures,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for the per-split feature draw
    pub random_state: u64,
    /// Number of features
    n_features: usize,
    /// Is classification task
    is_classification: bool,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            criterion: Criterion::Gini,
            random_state: 0,
            n_features: 0,
            is_classification: true,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set the number of candidate features drawn at each split
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn is_classification(&self) -> bool {
        self.is_classification
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();

        if n_samples != y.len() {
            return Err(PipelineError::TrainingError(format!(
                "feature rows ({}) and labels ({}) differ in length",
                n_samples,
                y.len()
            )));
        }
        if n_samples == 0 {
            return Err(PipelineError::TrainingError("cannot fit a tree on zero samples".to_string()));
        }
        if self.min_samples_split < 2 {
            return Err(PipelineError::TrainingError(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.min_samples_leaf < 1 {
            return Err(PipelineError::TrainingError(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if self.is_classification {
            check_discrete_labels(y)?;
        }

        self.n_features = x.ncols();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut rng));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let y_subset: Vec<f64> = indices.iter().map(|&i| y[i]).collect();

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure(&y_subset);

        if should_stop {
            return self.leaf(&y_subset);
        }

        let candidates = self.draw_features(rng);
        match self.find_best_split(x, y, indices, &candidates) {
            Some((feature, threshold)) => {
                let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| x[[i, feature]] <= threshold);

                if left_indices.is_empty() || right_indices.is_empty() {
                    return self.leaf(&y_subset);
                }

                let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, rng));
                let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, rng));

                TreeNode::Split {
                    feature_idx: feature,
                    threshold,
                    left,
                    right,
                    n_samples,
                }
            }
            None => self.leaf(&y_subset),
        }
    }

    fn leaf(&self, y: &[f64]) -> TreeNode {
        TreeNode::Leaf {
            value: self.compute_leaf_value(y),
            n_samples: y.len(),
        }
    }

    /// Candidate features for one split, sorted so the scan order is stable.
    fn draw_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let k = self.max_features.resolve(self.n_features);
        if k >= self.n_features {
            return (0..self.n_features).collect();
        }
        let mut drawn = index::sample(rng, self.n_features, k).into_vec();
        drawn.sort_unstable();
        drawn
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        candidates: &[usize],
    ) -> Option<(usize, f64)> {
        let n = indices.len() as f64;
        let parent_impurity = self.impurity_of(indices.iter().map(|&i| y[i]));

        // Each candidate feature finds its own best threshold
        let feature_results: Vec<Option<(usize, f64, f64)>> = candidates
            .par_iter()
            .map(|&feature_idx| {
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| {
                    x[[a, feature_idx]]
                        .partial_cmp(&x[[b, feature_idx]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut left = SplitStats::default();
                let mut right = SplitStats::from_labels(order.iter().map(|&i| y[i]));
                let mut best: Option<(f64, f64)> = None;

                for pos in 0..order.len() - 1 {
                    let yi = y[order[pos]];
                    left.push(yi);
                    right.remove(yi);

                    let current = x[[order[pos], feature_idx]];
                    let next = x[[order[pos + 1], feature_idx]];
                    if current == next {
                        continue;
                    }
                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (left.count as f64 * left.impurity(self.criterion)
                        + right.count as f64 * right.impurity(self.criterion))
                        / n;
                    let gain = parent_impurity - weighted;
                    if gain > 1e-12 && best.map_or(true, |(g, _)| gain > g) {
                        best = Some((gain, (current + next) / 2.0));
                    }
                }

                best.map(|(gain, threshold)| (feature_idx, threshold, gain))
            })
            .collect();

        // Strictly greater keeps the lowest feature index on ties
        feature_results
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<(usize, f64, f64)>, cand| match acc {
                Some(best) if best.2 >= cand.2 => Some(best),
                _ => Some(cand),
            })
            .map(|(feature, threshold, _)| (feature, threshold))
    }

    fn impurity_of(&self, labels: impl Iterator<Item = f64>) -> f64 {
        SplitStats::from_labels(labels).impurity(self.criterion)
    }

    fn compute_leaf_value(&self, y: &[f64]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }

        if self.is_classification {
            majority_label(y.iter().map(|&v| v as i64)) as f64
        } else {
            y.iter().sum::<f64>() / y.len() as f64
        }
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| PipelineError::TrainingError("decision tree is not fitted".to_string()))?;

        if x.ncols() != self.n_features {
            return Err(PipelineError::SchemaMismatch(format!(
                "model expects {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut node = root;
                loop {
                    match node {
                        TreeNode::Leaf { value, .. } => break *value,
                        TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                            node = if row[*feature_idx] <= *threshold { &**left } else { &**right };
                        }
                    }
                }
            })
            .collect())
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }
}

/// Running label statistics for one side of a candidate split
#[derive(Debug, Default, Clone)]
struct SplitStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
    classes: ClassCounts,
}

impl SplitStats {
    fn from_labels(labels: impl Iterator<Item = f64>) -> Self {
        let mut stats = Self::default();
        for y in labels {
            stats.push(y);
        }
        stats
    }

    fn push(&mut self, y: f64) {
        self.count += 1;
        self.sum += y;
        self.sq_sum += y * y;
        *self.classes.entry(y as i64).or_insert(0) += 1;
    }

    fn remove(&mut self, y: f64) {
        self.count -= 1;
        self.sum -= y;
        self.sq_sum -= y * y;
        if let Some(c) = self.classes.get_mut(&(y as i64)) {
            *c -= 1;
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        match criterion {
            Criterion::Gini => {
                1.0 - self
                    .classes
                    .values()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -self
                .classes
                .values()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
            // Var = E[X^2] - E[X]^2
            Criterion::MSE => (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0),
        }
    }
}

fn is_pure(y: &[f64]) -> bool {
    match y.first() {
        None => true,
        Some(&first) => y.iter().all(|&v| (v - first).abs() < 1e-10),
    }
}

/// Most frequent label; ties go to the smallest label.
pub(crate) fn majority_label(labels: impl Iterator<Item = i64>) -> i64 {
    let mut counts = ClassCounts::new();
    for label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    // BTreeMap iterates ascending; keep the first maximum
    counts
        .into_iter()
        .fold((0i64, 0usize), |best, (label, count)| {
            if count > best.1 { (label, count) } else { best }
        })
        .0
}

/// Classification targets must hold whole-number labels.
pub(crate) fn check_discrete_labels(y: &Array1<f64>) -> Result<()> {
    match y.iter().find(|v| !v.is_finite() || v.fract() != 0.0) {
        Some(v) => Err(PipelineError::TrainingError(format!(
            "classification target must hold discrete labels, found continuous value {}",
            v
        ))),
        None => Ok(()),
    }
}
