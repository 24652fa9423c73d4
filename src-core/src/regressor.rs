//! Base Regressor.
//!
//! The core only requires a `{fit, predict(mean, var)}` capability with
//! deterministic predictions given training data and non-negative variance.
//! `BootstrapForest` is the bundled default: a small bagged ensemble of
//! axis-aligned regression trees, built as a hand-rolled numerical core
//! rather than a wrapper around an external solver. Any other
//! implementation of `Regressor` is equally valid to the rest of the core.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::CoreError;

/// Polymorphic capability required of every per-fidelity model.
pub trait Regressor: Send + Sync {
    /// Refit in place on `(X, y)`. `X` is `n_samples x n_features`.
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), CoreError>;

    /// Predict `(mean, variance)` for each row of `X`. Variance must be
    /// non-negative; the core makes no assumption of calibration.
    fn predict(&self, x: ArrayView2<f64>) -> Result<(Array1<f64>, Array1<f64>), CoreError>;

    /// Whether `fit` has been called with at least one sample yet.
    fn is_trained(&self) -> bool;
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { value: f64 },
    Split { feature: usize, threshold: f64, left: Box<Node>, right: Box<Node> },
}

impl Node {
    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        match self {
            Node::Leaf { value } => *value,
            Node::Split { feature, threshold, left, right } => {
                if row[*feature] <= *threshold {
                    left.predict_row(row)
                } else {
                    right.predict_row(row)
                }
            }
        }
    }
}

fn variance(y: &[f64]) -> f64 {
    let n = y.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = y.iter().sum::<f64>() / n;
    y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

fn build_tree(
    x: &Array2<f64>,
    y: &[f64],
    rows: &[usize],
    max_depth: usize,
    min_leaf: usize,
    max_features: usize,
    rng: &mut StdRng,
) -> Node {
    let leaf_value = |rows: &[usize]| -> f64 {
        rows.iter().map(|&r| y[r]).sum::<f64>() / rows.len().max(1) as f64
    };

    if max_depth == 0 || rows.len() < 2 * min_leaf {
        return Node::Leaf { value: leaf_value(rows) };
    }

    let n_features = x.ncols();
    let mut feature_order: Vec<usize> = (0..n_features).collect();
    feature_order.shuffle(rng);
    let candidate_features = &feature_order[..max_features.min(n_features)];

    let row_y: Vec<f64> = rows.iter().map(|&r| y[r]).collect();
    let parent_var = variance(&row_y);
    if parent_var <= 1e-12 {
        return Node::Leaf { value: leaf_value(rows) };
    }

    let mut best: Option<(usize, f64, f64)> = None; // (feature, threshold, score)
    for &feature in candidate_features {
        let mut vals: Vec<f64> = rows.iter().map(|&r| x[[r, feature]]).collect();
        vals.sort_by(|a, b| a.partial_cmp(b).unwrap());
        vals.dedup();
        if vals.len() < 2 {
            continue;
        }
        // Try a handful of candidate thresholds (midpoints) rather than every
        // split point, to keep tree construction cheap.
        let n_thresholds = vals.len().saturating_sub(1).min(16);
        for i in 0..n_thresholds {
            let idx = (i * (vals.len() - 1)) / n_thresholds.max(1);
            let threshold = (vals[idx] + vals[idx + 1]) / 2.0;
            let (left_y, right_y): (Vec<f64>, Vec<f64>) = rows
                .iter()
                .map(|&r| (x[[r, feature]], y[r]))
                .fold((Vec::new(), Vec::new()), |(mut l, mut r), (xv, yv)| {
                    if xv <= threshold {
                        l.push(yv);
                    } else {
                        r.push(yv);
                    }
                    (l, r)
                });
            if left_y.len() < min_leaf || right_y.len() < min_leaf {
                continue;
            }
            let weighted = (left_y.len() as f64 * variance(&left_y)
                + right_y.len() as f64 * variance(&right_y))
                / rows.len() as f64;
            let score = parent_var - weighted;
            if best.map(|(_, _, best_score)| score > best_score).unwrap_or(true) {
                best = Some((feature, threshold, score));
            }
        }
    }

    match best {
        Some((feature, threshold, score)) if score > 1e-12 => {
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .partition(|&&r| x[[r, feature]] <= threshold);
            let left = build_tree(x, y, &left_rows, max_depth - 1, min_leaf, max_features, rng);
            let right = build_tree(x, y, &right_rows, max_depth - 1, min_leaf, max_features, rng);
            Node::Split { feature, threshold, left: Box::new(left), right: Box::new(right) }
        }
        _ => Node::Leaf { value: leaf_value(rows) },
    }
}

/// A bagged ensemble of axis-aligned regression trees. `predict` returns the
/// across-tree mean and the across-tree sample variance, so uncertainty
/// reflects tree disagreement rather than a calibrated posterior.
#[derive(Debug, Clone)]
pub struct BootstrapForest {
    n_trees: usize,
    max_depth: usize,
    min_leaf: usize,
    max_features_frac: f64,
    seed: u64,
    trees: Vec<Node>,
}

impl BootstrapForest {
    pub fn new(n_trees: usize, max_depth: usize, min_leaf: usize, seed: u64) -> Self {
        Self { n_trees, max_depth, min_leaf, max_features_frac: 0.7, seed, trees: Vec::new() }
    }
}

impl Default for BootstrapForest {
    fn default() -> Self {
        Self::new(20, 8, 2, 0)
    }
}

impl Regressor for BootstrapForest {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), CoreError> {
        if x.nrows() != y.len() {
            return Err(CoreError::Surrogate(format!(
                "X has {} rows but y has {} entries",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 {
            self.trees.clear();
            return Ok(());
        }
        let x_owned = x.to_owned();
        let y_vec: Vec<f64> = y.to_vec();
        let n = x_owned.nrows();
        let max_features = ((x_owned.ncols() as f64) * self.max_features_frac).ceil().max(1.0) as usize;

        self.trees = (0..self.n_trees)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(tree_idx as u64 * 7919 + 1));
                let rows: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                build_tree(&x_owned, &y_vec, &rows, self.max_depth, self.min_leaf, max_features, &mut rng)
            })
            .collect();
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<(Array1<f64>, Array1<f64>), CoreError> {
        let n = x.nrows();
        if self.trees.is_empty() {
            // Untrained model returns the neutral (0, 1) prior assigned to
            // a rung with no data yet.
            return Ok((Array1::zeros(n), Array1::ones(n)));
        }
        let mut means = Array1::zeros(n);
        let mut vars = Array1::zeros(n);
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            let preds: Vec<f64> = self.trees.iter().map(|t| t.predict_row(row)).collect();
            let mean = preds.iter().sum::<f64>() / preds.len() as f64;
            let var = preds.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / preds.len() as f64;
            means[i] = mean;
            vars[i] = var.max(0.0);
        }
        Ok((means, vars))
    }

    fn is_trained(&self) -> bool {
        !self.trees.is_empty()
    }
}

/// Standardizes `y` to zero mean, unit variance; pass-through if `sigma == 0`
///.
pub fn std_normalize(y: &[f64]) -> Vec<f64> {
    let n = y.len() as f64;
    if y.is_empty() {
        return Vec::new();
    }
    let mean = y.iter().sum::<f64>() / n;
    let var = y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let sigma = var.sqrt();
    if sigma <= 1e-12 {
        y.to_vec()
    } else {
        y.iter().map(|v| (v - mean) / sigma).collect()
    }
}
