//! Weighted Surrogate Ensemble.
//!
//! One regressor per fidelity level plus a weight vector; `predict` fuses
//! the per-model predictions into a single `(mean, variance)` under one of
//! two fusion rules. Models for rungs with no data yet act as the neutral
//! `(0, 1)` prior.

use ndarray::{Array1, ArrayView2};

use crate::error::CoreError;
use crate::regressor::{std_normalize, Regressor};

const EPS: f64 = 1e-9;

/// Fusion rule selectable at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionMethod {
    /// Independent-prediction fusion: weighted mean, weighted-squared-weight
    /// variance under an independence assumption.
    Idp,
    /// Generalized product of experts: precision-weighted fusion.
    Gpoe,
}

/// Holds `{models[r], weights[r]}` over the budget ladder and fuses
/// predictions. Generic over the regressor implementation so any type
/// satisfying `Regressor` can back each fidelity level.
pub struct WeightedSurrogateEnsemble {
    /// Budget ladder in ascending order, e.g. `[1, 3, 9]`.
    ladder: Vec<u64>,
    models: Vec<Box<dyn Regressor>>,
    weights: Vec<f64>,
    fusion: FusionMethod,
}

impl WeightedSurrogateEnsemble {
    /// `factory` builds a fresh regressor for each ladder entry (so each
    /// fidelity level gets its own independently-seeded model instance).
    pub fn new(
        ladder: Vec<u64>,
        init_weight: Vec<f64>,
        fusion: FusionMethod,
        factory: impl Fn(usize) -> Box<dyn Regressor>,
    ) -> Self {
        assert_eq!(ladder.len(), init_weight.len(), "weight vector must match ladder length");
        let models = (0..ladder.len()).map(factory).collect();
        Self { ladder, models, weights: init_weight, fusion }
    }

    pub fn ladder(&self) -> &[u64] {
        &self.ladder
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn index_of(&self, r: u64) -> Option<usize> {
        self.ladder.iter().position(|&x| x == r)
    }

    /// Refit `models[r]` on `(X, y)`; `y` is standardized to zero mean, unit
    /// variance before fitting (pass-through if sigma is 0).
    pub fn train(&mut self, r: u64, x: ArrayView2<f64>, y: &[f64]) -> Result<(), CoreError> {
        let idx = self
            .index_of(r)
            .ok_or_else(|| CoreError::Surrogate(format!("budget {r} is not on the ladder")))?;
        let y_std = std_normalize(y);
        let y_arr = Array1::from(y_std);
        self.models[idx].fit(x, y_arr.view())
    }

    /// Fused predictive distribution over `X`.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<(Array1<f64>, Array1<f64>), CoreError> {
        let n = x.nrows();
        let mut per_model = Vec::with_capacity(self.models.len());
        for model in &self.models {
            per_model.push(model.predict(x)?);
        }

        let mut mean = Array1::zeros(n);
        let mut var = Array1::zeros(n);

        match self.fusion {
            FusionMethod::Idp => {
                for (w, (m, v)) in self.weights.iter().zip(per_model.iter()) {
                    for i in 0..n {
                        mean[i] += w * m[i];
                        var[i] += w * w * v[i];
                    }
                }
            }
            FusionMethod::Gpoe => {
                let mut precision = Array1::<f64>::zeros(n);
                let mut weighted_mean_over_var = Array1::<f64>::zeros(n);
                for (w, (m, v)) in self.weights.iter().zip(per_model.iter()) {
                    for i in 0..n {
                        let vi = v[i].max(EPS);
                        precision[i] += w / vi;
                        weighted_mean_over_var[i] += w * m[i] / vi;
                    }
                }
                for i in 0..n {
                    let prec = precision[i].max(EPS);
                    var[i] = 1.0 / prec;
                    mean[i] = var[i] * weighted_mean_over_var[i];
                }
            }
        }
        Ok((mean, var))
    }

    /// Predict using a single model (bypassing fusion). Used by the weight
    /// learner's per-budget rank-loss computation.
    pub fn predict_model(&self, ladder_idx: usize, x: ArrayView2<f64>) -> Result<(Array1<f64>, Array1<f64>), CoreError> {
        self.models[ladder_idx].predict(x)
    }

    pub fn model_is_trained(&self, ladder_idx: usize) -> bool {
        self.models[ladder_idx].is_trained()
    }

    /// Replace the weight vector. Panics (a programmer error, not a runtime
    /// condition) if the weights aren't non-negative, finite, and summing
    /// to 1; callers are expected to normalize beforehand (the weight
    /// learner always does).
    pub fn set_weights(&mut self, new_weights: Vec<f64>) {
        assert_eq!(new_weights.len(), self.ladder.len(), "weight vector length mismatch");
        let sum: f64 = new_weights.iter().sum();
        assert!(
            new_weights.iter().all(|w| w.is_finite() && *w >= 0.0) && (sum - 1.0).abs() <= 1e-6,
            "weights must be non-negative, finite, and sum to 1 (got sum={sum})"
        );
        self.weights = new_weights;
    }
}
