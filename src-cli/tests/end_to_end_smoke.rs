//! End-to-end smoke test: a handful of worker threads evaluating a cheap
//! synthetic objective, driven through the full `Coordinator::next()` /
//! `WorkerPool::dispatch()` / `collect()` / `observe()` loop a short run of
//! `mfesd` would execute.

use std::sync::Arc;
use std::time::Duration;

use mfes_cli::WorkerPool;
use mfes_core::{Coordinator, CoordinatorConfig, ConfigurationSpace, Dimension};
use mfes_testfunctions::{sphere_multi_fidelity, MultiFidelityObjective};

#[test]
fn drives_a_short_optimization_run_to_completion() {
    let objective: Arc<dyn MultiFidelityObjective> = Arc::new(sphere_multi_fidelity(2));
    let dims = objective
        .bounds()
        .into_iter()
        .enumerate()
        .map(|(i, (lo, hi))| Dimension::float(format!("x{i}"), lo, hi))
        .collect();
    let space = ConfigurationSpace::new(dims);

    let config = CoordinatorConfig::new(9, 3.0);
    let mut coordinator = Coordinator::new(space.clone(), config);
    let mut pool = WorkerPool::new(2, space, objective, 9, 7, Duration::from_secs(5));

    let num_trials = 30;
    let mut completed = 0;
    let mut in_flight = 0;
    while completed < num_trials {
        while in_flight < 2 && completed + in_flight < num_trials {
            let (cfg, budget, _extra) = coordinator.next().unwrap();
            pool.dispatch(cfg, budget, completed as u64);
            in_flight += 1;
        }
        let (cfg, budget, loss) = pool.collect();
        in_flight -= 1;
        coordinator.observe(&cfg, budget, loss).unwrap();
        completed += 1;
    }

    assert!(coordinator.incumbent().is_some(), "a completed run always has an incumbent");
}
