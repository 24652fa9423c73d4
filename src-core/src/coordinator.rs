//! Coordinator.
//!
//! Glues the scheduler, the surrogate ensemble, the acquisition optimizer,
//! and the weight learner into the two calls a worker driver needs:
//! `observe` and `next`. Single-threaded cooperative control loop —
//! callers are responsible for serializing access (the demo worker harness
//! in `mfes-cli` does this with a `Mutex`).

use std::collections::HashMap;

use log::{info, warn};
use ndarray::{Array2, ArrayView2};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::acquisition::{maximize, ExpectedImprovement, OptimizerParams};
use crate::config_space::{Configuration, ConfigurationSpace};
use crate::ensemble::{FusionMethod, WeightedSurrogateEnsemble};
use crate::error::{CoreError, WeightUpdateOutcome};
use crate::regressor::{BootstrapForest, Regressor};
use crate::scheduler::BracketScheduler;
use crate::sink::{NullSink, WeightSink};
use crate::weight_learner::{self, WeightMethod};

/// `r_i = eta^i` for `i = 0..=s_max`, `s_max = floor(log_eta(R))`.
/// The top level is always exactly `R`, not `eta^s_max`,
/// so a trial at full fidelity always spends the full declared budget.
pub fn budget_ladder(r: u64, eta: f64) -> Vec<u64> {
    assert!(r >= 1, "max budget must be at least 1");
    assert!(eta > 1.0, "eta must exceed 1");
    let s_max = (r as f64).log(eta).floor().max(0.0) as u32;
    let mut ladder: Vec<u64> = (0..=s_max).map(|i| eta.powi(i as i32).round() as u64).collect();
    ladder.dedup();
    let last = ladder.len() - 1;
    ladder[last] = r;
    ladder
}

/// `budget_ladder` with the lowest `skip_outer_loop` rungs dropped off the
/// bottom (the "outer", lowest-fidelity end of the ladder). Only one bracket
/// is ever active in this scheduler, so "brackets to skip" reduces to rungs
/// to skip; clamped so at least one rung always remains.
fn effective_ladder(r: u64, eta: f64, skip_outer_loop: usize) -> Vec<u64> {
    let full = budget_ladder(r, eta);
    let skip = skip_outer_loop.min(full.len() - 1);
    full[skip..].to_vec()
}

/// One per-budget observation store, `D[r] = (X[r], Y[r])`.
#[derive(Debug, Default)]
struct ObservationStore {
    rows: Vec<Vec<f64>>,
    y: Vec<f64>,
}

impl ObservationStore {
    fn push(&mut self, row: Vec<f64>, loss: f64) {
        self.rows.push(row);
        self.y.push(loss);
    }

    fn as_array(&self) -> Array2<f64> {
        let n = self.rows.len();
        if n == 0 {
            return Array2::zeros((0, 0));
        }
        let d = self.rows[0].len();
        let flat: Vec<f64> = self.rows.iter().flatten().copied().collect();
        Array2::from_shape_vec((n, d), flat).expect("rows share one dimensionality")
    }
}

/// Fixed-at-construction knobs.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub r: u64,
    pub eta: f64,
    /// Number of lowest-fidelity rungs to drop off the ladder's outer end
    /// before scheduling starts. 0 keeps the full ladder.
    pub skip_outer_loop: usize,
    pub rand_prob: f64,
    pub init_weight: Vec<f64>,
    pub update_enable: bool,
    pub weight_method: WeightMethod,
    pub fusion_method: FusionMethod,
    pub random_state: u64,
}

impl CoordinatorConfig {
    pub fn new(r: u64, eta: f64) -> Self {
        Self::with_skip_outer_loop(r, eta, 0)
    }

    pub fn with_skip_outer_loop(r: u64, eta: f64, skip_outer_loop: usize) -> Self {
        let ladder = effective_ladder(r, eta, skip_outer_loop);
        let s_max = ladder.len() - 1;
        let mut init_weight = vec![1.0 / s_max.max(1) as f64; ladder.len()];
        init_weight[0] = 0.0;
        let total: f64 = init_weight.iter().sum();
        for w in &mut init_weight {
            *w /= total;
        }
        Self {
            r,
            eta,
            skip_outer_loop,
            rand_prob: 0.3,
            init_weight,
            update_enable: true,
            weight_method: WeightMethod::default(),
            fusion_method: FusionMethod::Idp,
            random_state: 1,
        }
    }

    /// The ladder this config will actually schedule over, after
    /// `skip_outer_loop` trims the outer end.
    pub fn ladder(&self) -> Vec<u64> {
        effective_ladder(self.r, self.eta, self.skip_outer_loop)
    }
}

/// Extra metadata returned alongside `next()`'s `(config, budget)`.
#[derive(Debug, Clone, Default)]
pub struct NextExtra {
    pub weight_update: Option<WeightUpdateOutcome>,
    pub was_promoted: bool,
}

/// Glue component wiring the acquisition optimizer, scheduler, and weight
/// learner into the two calls workers need.
pub struct Coordinator {
    space: ConfigurationSpace,
    scheduler: BracketScheduler,
    ensemble: WeightedSurrogateEnsemble,
    acq: ExpectedImprovement,
    opt_params: OptimizerParams,
    config: CoordinatorConfig,
    store: HashMap<u64, ObservationStore>,
    incumbents: Vec<(Configuration, f64)>,
    rng: StdRng,
    last_budget_served: Option<u64>,
    weight_update_id: u64,
    weight_changed_cnt: u64,
    hist_weights: Vec<Vec<f64>>,
    sink: Box<dyn WeightSink>,
}

impl Coordinator {
    pub fn new(space: ConfigurationSpace, config: CoordinatorConfig) -> Self {
        Self::with_sink(space, config, Box::new(NullSink))
    }

    pub fn with_sink(space: ConfigurationSpace, config: CoordinatorConfig, sink: Box<dyn WeightSink>) -> Self {
        let ladder = config.ladder();
        let scheduler = BracketScheduler::new(ladder.clone(), config.eta);
        let init_weight = if config.init_weight.len() == ladder.len() {
            config.init_weight.clone()
        } else {
            warn!(
                "init_weight length {} does not match the effective ladder length {} (skip_outer_loop={}); falling back to the uniform default",
                config.init_weight.len(),
                ladder.len(),
                config.skip_outer_loop
            );
            CoordinatorConfig::with_skip_outer_loop(config.r, config.eta, config.skip_outer_loop).init_weight
        };
        let ensemble = WeightedSurrogateEnsemble::new(
            ladder.clone(),
            init_weight,
            config.fusion_method,
            |_| Box::new(BootstrapForest::default()) as Box<dyn Regressor>,
        );
        let store = ladder.iter().map(|&r| (r, ObservationStore::default())).collect();
        let rng = StdRng::seed_from_u64(config.random_state);

        Self {
            space,
            scheduler,
            ensemble,
            acq: ExpectedImprovement::default(),
            opt_params: OptimizerParams::default(),
            config,
            store,
            incumbents: Vec::new(),
            rng,
            last_budget_served: None,
            weight_update_id: 0,
            weight_changed_cnt: 0,
            hist_weights: Vec::new(),
            sink,
        }
    }

    pub fn r_top(&self) -> u64 {
        *self.scheduler.ladder().last().unwrap()
    }

    pub fn s_max(&self) -> usize {
        self.scheduler.s_max()
    }

    pub fn incumbent(&self) -> Option<&(Configuration, f64)> {
        self.incumbents.iter().min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn weight_changed_cnt(&self) -> u64 {
        self.weight_changed_cnt
    }

    pub fn weights(&self) -> &[f64] {
        self.ensemble.weights()
    }

    /// Record a completed trial. Fails with `UnknownJob` if no RUNNING job
    /// matches `(config, budget)`.
    pub fn observe(&mut self, config: &Configuration, budget: u64, loss: f64) -> Result<(), CoreError> {
        self.scheduler.observe(config, budget, loss)?;

        if budget == self.r_top() {
            self.incumbents.push((config.clone(), loss));
        }

        let row = self.space.encode(config).to_vec();
        let entry = self
            .store
            .get_mut(&budget)
            .ok_or(CoreError::UnknownJob { budget })?;
        entry.push(row, loss);

        let y_std = crate::regressor::std_normalize(&entry.y);
        self.ensemble.train(budget, entry.as_array().view(), &y_std)?;
        Ok(())
    }

    /// Falls back for a `next()` sampling attempt that exhausted its retry
    /// budget against `rung_idx`'s exclusion set: reuses the best-loss
    /// completed config at that rung (earliest-completed on ties via job
    /// order), or the first job present if none have completed yet.
    fn best_available_duplicate(&self, rung_idx: usize) -> Configuration {
        let jobs = self.scheduler.rung(rung_idx).jobs();
        jobs.iter()
            .filter(|j| j.loss.is_some())
            .min_by(|a, b| {
                a.loss
                    .unwrap()
                    .partial_cmp(&b.loss.unwrap())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .or_else(|| jobs.first())
            .map(|j| j.config.clone())
            .expect("rung must hold at least one job once its exclusion set exhausted sampling")
    }

    fn rung_index_of_budget(&self, budget: u64) -> usize {
        self.scheduler
            .ladder()
            .iter()
            .position(|&b| b == budget)
            .expect("budget must be on the ladder")
    }

    fn maybe_update_weights(&mut self, budget: u64) -> Option<WeightUpdateOutcome> {
        let budget_changed = self.last_budget_served != Some(budget);
        self.last_budget_served = Some(budget);
        if !budget_changed {
            return None;
        }

        // `weight_update_id` counts budget boundaries crossed so far; the
        // learner only fires once `s_max + 1` boundaries have been observed
        // (warm-up), so the check reads the pre-increment value before
        // bumping the counter.
        let boundaries_seen = self.weight_update_id;
        self.weight_update_id += 1;
        if !self.config.update_enable || boundaries_seen <= self.s_max() as u64 {
            return Some(WeightUpdateOutcome::Skipped);
        }

        let top_budget = self.r_top();
        let entry = &self.store[&top_budget];
        let (outcome, _report) = match weight_learner::update_weights(
            &mut self.ensemble,
            self.config.weight_method,
            entry.as_array().view(),
            &entry.y,
            &mut self.rng,
        ) {
            Ok(pair) => pair,
            Err(e) => {
                warn!("weight update aborted: {e}");
                return Some(WeightUpdateOutcome::Skipped);
            }
        };

        if outcome == WeightUpdateOutcome::Updated {
            self.hist_weights.push(self.ensemble.weights().to_vec());
            self.weight_changed_cnt += 1;
            if let Err(e) = self.sink.write(&self.hist_weights) {
                warn!("failed to persist weight snapshot: {e}");
            }
        } else {
            info!("weight update outcome: {outcome:?}");
        }
        Some(outcome)
    }

    /// Produces the next `(config, budget)` pair plus diagnostics.
    pub fn next(&mut self) -> Result<(Configuration, u64, NextExtra), CoreError> {
        let promoted = self.scheduler.try_promote();

        let budget = match &promoted {
            Some((_, budget)) => *budget,
            None => self.scheduler.ladder()[0],
        };
        let weight_update = self.maybe_update_weights(budget);

        if let Some((config, budget)) = promoted {
            return Ok((config, budget, NextExtra { weight_update, was_promoted: true }));
        }

        let rung0 = self.rung_index_of_budget(self.scheduler.ladder()[0]);
        let excluded = self.scheduler.rung(rung0).configs().clone();
        let top_budget = self.r_top();
        let top_has_data = !self.store[&top_budget].y.is_empty();

        let config = if !top_has_data || self.rng.random_bool(self.config.rand_prob) {
            match self.space.sample(&mut self.rng, &excluded) {
                Ok(cfg) => cfg,
                Err(CoreError::ExhaustedSampling { attempts }) => {
                    warn!("configuration space exhausted after {attempts} attempts; reusing the best available duplicate");
                    self.best_available_duplicate(rung0)
                }
                Err(e) => return Err(e),
            }
        } else {
            let entry = &self.store[&top_budget];
            self.acq.update(
                self.incumbent().map(|(_, loss)| *loss).unwrap_or(0.0),
                entry.y.len(),
            );
            let ranked = maximize(
                &self.space,
                &self.ensemble,
                &self.acq,
                &self.opt_params,
                &mut self.rng,
                self.opt_params.n_random,
            )?;
            match ranked.into_iter().map(|(cfg, _)| cfg).find(|cfg| !excluded.contains(cfg)) {
                Some(cfg) => cfg,
                None => match self.space.sample(&mut self.rng, &excluded) {
                    Ok(cfg) => cfg,
                    Err(CoreError::ExhaustedSampling { attempts }) => {
                        warn!("configuration space exhausted after {attempts} attempts; reusing the best available duplicate");
                        self.best_available_duplicate(rung0)
                    }
                    Err(e) => return Err(e),
                },
            }
        };

        self.scheduler.start_job(rung0, config.clone());
        Ok((config, self.scheduler.ladder()[0], NextExtra { weight_update, was_promoted: false }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_space::Dimension;

    fn toy_space() -> ConfigurationSpace {
        ConfigurationSpace::new(vec![Dimension::float("x", -5.0, 5.0)])
    }

    #[test]
    fn budget_ladder_is_geometric_with_exact_top() {
        let ladder = budget_ladder(9, 3.0);
        assert_eq!(ladder, vec![1, 3, 9]);
        let ladder27 = budget_ladder(27, 3.0);
        assert_eq!(ladder27, vec![1, 3, 9, 27]);
    }

    #[test]
    fn budget_ladder_tops_out_at_r_even_if_not_a_power() {
        let ladder = budget_ladder(10, 3.0);
        assert_eq!(ladder.last(), Some(&10));
    }

    #[test]
    fn skip_outer_loop_drops_lowest_rungs() {
        let full = effective_ladder(27, 3.0, 0);
        assert_eq!(full, vec![1, 3, 9, 27]);
        let skipped = effective_ladder(27, 3.0, 2);
        assert_eq!(skipped, vec![9, 27]);
    }

    #[test]
    fn skip_outer_loop_clamps_to_leave_one_rung() {
        let skipped = effective_ladder(27, 3.0, 99);
        assert_eq!(skipped, vec![27]);
    }

    #[test]
    fn coordinator_config_with_skip_outer_loop_schedules_over_trimmed_ladder() {
        let space = toy_space();
        let config = CoordinatorConfig::with_skip_outer_loop(27, 3.0, 2);
        let mut coordinator = Coordinator::new(space, config);
        let (_cfg, budget, _extra) = coordinator.next().unwrap();
        assert_eq!(budget, 9, "rung 0 of the trimmed ladder is budget 9, not 1");
        assert_eq!(coordinator.r_top(), 27);
    }

    /// A single-point space exhausts `sample`'s retry budget immediately;
    /// `next()` must still return a config (a duplicate) rather than
    /// propagating `CoreError::ExhaustedSampling`.
    #[test]
    fn next_degrades_to_duplicate_when_space_is_exhausted() {
        let space = ConfigurationSpace::new(vec![Dimension::float("x", 1.0, 1.0)]);
        let config = CoordinatorConfig::new(9, 3.0);
        let mut coordinator = Coordinator::new(space, config);

        let (first, budget, _extra) = coordinator.next().unwrap();
        coordinator.observe(&first, budget, 0.5).unwrap();

        let (second, _budget, _extra) = coordinator.next().unwrap();
        assert_eq!(second, first, "only one distinct point exists, so next() must reuse it");
    }

    /// A freshly sampled rung-0 config is never already present there.
    #[test]
    fn next_never_duplicates_rung0_configs() {
        let space = toy_space();
        let config = CoordinatorConfig::new(9, 3.0);
        let mut coordinator = Coordinator::new(space, config);

        let mut seen = Vec::new();
        for _ in 0..5 {
            let (cfg, budget, _extra) = coordinator.next().unwrap();
            assert_eq!(budget, 1);
            assert!(!seen.contains(&cfg));
            seen.push(cfg.clone());
            coordinator.observe(&cfg, 1, 1.0).unwrap();
        }
    }

    #[test]
    fn observe_unknown_job_propagates_error() {
        let space = toy_space();
        let config = CoordinatorConfig::new(9, 3.0);
        let mut coordinator = Coordinator::new(space, config);
        let bogus = Configuration { values: vec![crate::config_space::Value::Float(0.0)] };
        let result = coordinator.observe(&bogus, 1, 1.0);
        assert!(result.is_err());
    }

    /// After observing 9 trials at budget 1, the scheduler has enough
    /// completions to promote, and `next()` must surface that promotion
    /// (budget 3) rather than sampling a fresh rung-0 config.
    #[test]
    fn next_surfaces_promotions_over_fresh_samples() {
        let space = toy_space();
        let config = CoordinatorConfig::new(9, 3.0);
        let mut coordinator = Coordinator::new(space, config);

        for i in 0..9 {
            let (cfg, _budget, _extra) = coordinator.next().unwrap();
            coordinator.observe(&cfg, 1, i as f64).unwrap();
        }
        let (_cfg, budget, extra) = coordinator.next().unwrap();
        assert_eq!(budget, 3);
        assert!(extra.was_promoted);
    }

    /// `rand_prob=1.0` forces every fresh sample through random sampling,
    /// so `next()` must keep working even when the acquisition optimizer's
    /// collaborators (ensemble weights, trained models) are never
    /// exercised.
    #[test]
    fn rand_prob_one_never_touches_acquisition() {
        let space = toy_space();
        let mut config = CoordinatorConfig::new(9, 3.0);
        config.rand_prob = 1.0;
        let mut coordinator = Coordinator::new(space, config);

        for i in 0..9 {
            let (cfg, _budget, _extra) = coordinator.next().unwrap();
            coordinator.observe(&cfg, 1, i as f64).unwrap();
        }
        // Enough top-fidelity-less data exists that a rand_prob < 1.0
        // coordinator would now be eligible to call into the acquisition
        // path; with rand_prob=1.0 it must still sample randomly and
        // succeed without ever training/using the ensemble's predictions.
        for _ in 0..20 {
            coordinator.next().unwrap();
        }
    }
}
