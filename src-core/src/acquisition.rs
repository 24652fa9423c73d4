//! Acquisition function and optimizer.
//!
//! Expected Improvement over the fused surrogate, maximized by an
//! interleaved local + random search. The acquisition function itself
//! holds only scalar state (`eta_hat`, `num_data`); to avoid a reference
//! cycle with the ensemble it scores, it is handed an ephemeral,
//! non-owning view of the ensemble at each call rather than storing one.

use ndarray::Array2;
use rand::Rng;

use crate::config_space::{ConfigurationSpace, Configuration, VarType};
use crate::ensemble::WeightedSurrogateEnsemble;
use crate::error::CoreError;

fn std_normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

fn std_normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Abramowitz & Stegun 7.1.26 rational approximation, accurate to ~1.5e-7.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;
    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}

/// Expected Improvement relative to the current best standardized
/// top-fidelity loss.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpectedImprovement {
    eta_hat: f64,
    num_data: usize,
}

impl ExpectedImprovement {
    /// Refresh with the latest incumbent and observation count.
    pub fn update(&mut self, eta_hat: f64, num_data: usize) {
        self.eta_hat = eta_hat;
        self.num_data = num_data;
    }

    pub fn num_data(&self) -> usize {
        self.num_data
    }

    /// `EI = (eta_hat - mu) * Phi(z) + sigma * phi(z)`, `z = (eta_hat - mu) / sigma`,
    /// clipped at 0 when `sigma == 0`.
    pub fn score(&self, mean: f64, var: f64) -> f64 {
        let sigma = var.max(0.0).sqrt();
        if sigma <= 1e-12 {
            return 0.0;
        }
        let z = (self.eta_hat - mean) / sigma;
        let ei = (self.eta_hat - mean) * std_normal_cdf(z) + sigma * std_normal_pdf(z);
        ei.max(0.0)
    }
}

/// Knobs for the interleaved local + random search optimizer.
#[derive(Debug, Clone)]
pub struct OptimizerParams {
    pub n_random: usize,
    pub top_k_seeds: usize,
    pub n_sls_iterations: usize,
    pub n_steps_plateau_walk: usize,
    pub max_steps: usize,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self { n_random: 200, top_k_seeds: 5, n_sls_iterations: 5, n_steps_plateau_walk: 10, max_steps: 50 }
    }
}

fn score_batch(
    ensemble: &WeightedSurrogateEnsemble,
    acq: &ExpectedImprovement,
    space: &ConfigurationSpace,
    configs: &[Configuration],
) -> Result<Vec<f64>, CoreError> {
    if configs.is_empty() {
        return Ok(Vec::new());
    }
    let encoded: Vec<f64> = configs.iter().flat_map(|c| space.encode(c).to_vec()).collect();
    let x = Array2::from_shape_vec((configs.len(), space.dim()), encoded)
        .map_err(|e| CoreError::Surrogate(e.to_string()))?;
    let (mean, var) = ensemble.predict(x.view())?;
    Ok((0..configs.len()).map(|i| acq.score(mean[i], var[i])).collect())
}

/// One coordinate-wise neighbor of `base`, perturbed along dimension `dim`
/// by `frac` of that dimension's span, clipped to bounds.
fn perturb<R: Rng + ?Sized>(
    base: &Configuration,
    space: &ConfigurationSpace,
    dim: usize,
    frac: f64,
    rng: &mut R,
) -> Configuration {
    let mut values = base.values().to_vec();
    let d = &space.dims()[dim];
    let span = d.high - d.low;
    match d.kind {
        VarType::Float => {
            let delta = span * frac * if rng.random_bool(0.5) { 1.0 } else { -1.0 };
            let v = (base.get_f64(dim) + delta).clamp(d.low, d.high);
            values[dim] = crate::config_space::Value::Float(v);
        }
        VarType::Int => {
            let step = ((span * frac).round() as i64).max(1);
            let delta = if rng.random_bool(0.5) { step } else { -step };
            let v = (base.get_f64(dim) as i64 + delta).clamp(d.low as i64, d.high as i64);
            values[dim] = crate::config_space::Value::Int(v);
        }
        VarType::Categorical(n) => {
            let v = rng.random_range(0..n as u32);
            values[dim] = crate::config_space::Value::Categorical(v);
        }
    }
    Configuration { values }
}

fn local_search<R: Rng + ?Sized>(
    seed: Configuration,
    seed_score: f64,
    space: &ConfigurationSpace,
    ensemble: &WeightedSurrogateEnsemble,
    acq: &ExpectedImprovement,
    params: &OptimizerParams,
    rng: &mut R,
) -> Result<(Configuration, f64), CoreError> {
    let mut current = seed;
    let mut current_score = seed_score;
    let mut plateau_walks = 0usize;

    for _ in 0..params.max_steps {
        let mut neighbors = Vec::with_capacity(space.dim());
        for dim in 0..space.dim() {
            neighbors.push(perturb(&current, space, dim, 0.1, rng));
        }
        let scores = score_batch(ensemble, acq, space, &neighbors)?;
        let Some((best_idx, &best_score)) = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        else {
            break;
        };

        if best_score > current_score + 1e-12 {
            current = neighbors.into_iter().nth(best_idx).unwrap();
            current_score = best_score;
            plateau_walks = 0;
        } else if (best_score - current_score).abs() <= 1e-12 && plateau_walks < params.n_steps_plateau_walk {
            current = neighbors.into_iter().nth(best_idx).unwrap();
            plateau_walks += 1;
        } else {
            break;
        }
    }
    Ok((current, current_score))
}

/// `maximize(space, ensemble, acq, rng, num_points) -> ranked candidates`,
/// descending by EI. Deterministic given the same RNG state and surrogate
/// state.
pub fn maximize<R: Rng + ?Sized>(
    space: &ConfigurationSpace,
    ensemble: &WeightedSurrogateEnsemble,
    acq: &ExpectedImprovement,
    params: &OptimizerParams,
    rng: &mut R,
    num_points: usize,
) -> Result<Vec<(Configuration, f64)>, CoreError> {
    let n_random = num_points.max(params.n_random);

    let pool_a: Vec<Configuration> = (0..n_random).map(|_| space.sample_unchecked(rng)).collect();
    let scores_a = score_batch(ensemble, acq, space, &pool_a)?;
    let mut ranked: Vec<(Configuration, f64)> = pool_a.into_iter().zip(scores_a).collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let seeds: Vec<(Configuration, f64)> = ranked
        .iter()
        .take(params.top_k_seeds.min(ranked.len()))
        .cloned()
        .collect();

    let mut local_results = Vec::new();
    for _ in 0..params.n_sls_iterations {
        for (seed_cfg, seed_score) in &seeds {
            let (cfg, score) =
                local_search(seed_cfg.clone(), *seed_score, space, ensemble, acq, params, rng)?;
            local_results.push((cfg, score));
        }
    }

    let pool_b: Vec<Configuration> = (0..n_random).map(|_| space.sample_unchecked(rng)).collect();
    let scores_b = score_batch(ensemble, acq, space, &pool_b)?;

    let mut all = ranked;
    all.extend(local_results);
    all.extend(pool_b.into_iter().zip(scores_b));
    all.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_space::Dimension;
    use crate::ensemble::FusionMethod;
    use crate::regressor::BootstrapForest;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn ei_is_zero_at_zero_sigma() {
        let mut acq = ExpectedImprovement::default();
        acq.update(0.0, 10);
        assert_eq!(acq.score(1.0, 0.0), 0.0);
    }

    #[test]
    fn ei_rewards_lower_mean_and_higher_variance() {
        let mut acq = ExpectedImprovement::default();
        acq.update(0.0, 10);
        let lower_mean = acq.score(-1.0, 1.0);
        let higher_mean = acq.score(1.0, 1.0);
        assert!(lower_mean > higher_mean);

        let low_var = acq.score(0.5, 0.01);
        let high_var = acq.score(0.5, 4.0);
        assert!(high_var > low_var);
    }

    #[test]
    fn maximize_is_deterministic_given_same_seed() {
        let space = ConfigurationSpace::new(vec![Dimension::float("x", -5.0, 5.0)]);
        let ensemble = WeightedSurrogateEnsemble::new(
            vec![1, 3, 9],
            vec![0.0, 0.5, 0.5],
            FusionMethod::Idp,
            |_| Box::new(BootstrapForest::default()),
        );
        let mut acq = ExpectedImprovement::default();
        acq.update(0.0, 5);
        let params = OptimizerParams { n_random: 20, top_k_seeds: 2, n_sls_iterations: 1, ..Default::default() };

        let mut rng1 = StdRng::seed_from_u64(123);
        let mut rng2 = StdRng::seed_from_u64(123);
        let out1 = maximize(&space, &ensemble, &acq, &params, &mut rng1, 20).unwrap();
        let out2 = maximize(&space, &ensemble, &acq, &params, &mut rng2, 20).unwrap();

        assert_eq!(out1.len(), out2.len());
        for ((c1, s1), (c2, s2)) in out1.iter().zip(out2.iter()) {
            assert_eq!(c1, c2);
            assert_eq!(s1, s2);
        }
    }

    #[test]
    fn maximize_returns_ranked_descending() {
        let space = ConfigurationSpace::new(vec![Dimension::float("x", -5.0, 5.0)]);
        let ensemble = WeightedSurrogateEnsemble::new(
            vec![1, 3, 9],
            vec![0.0, 0.5, 0.5],
            FusionMethod::Idp,
            |_| Box::new(BootstrapForest::default()),
        );
        let mut acq = ExpectedImprovement::default();
        acq.update(0.0, 5);
        let params = OptimizerParams { n_random: 20, top_k_seeds: 2, n_sls_iterations: 1, ..Default::default() };
        let mut rng = StdRng::seed_from_u64(1);
        let out = maximize(&space, &ensemble, &acq, &params, &mut rng, 20).unwrap();
        for w in out.windows(2) {
            assert!(w[0].1 >= w[1].1 - 1e-9);
        }
    }
}
