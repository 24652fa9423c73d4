use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::info;

use mfes_cli::{config, Args, MfesConfig, WorkerPool};
use mfes_core::{Coordinator, Dimension, ConfigurationSpace};
use mfes_persist::{env_utils, NpyWeightSink};
use mfes_testfunctions::{
    ackley_multi_fidelity, branin_multi_fidelity, rastrigin_multi_fidelity, rosenbrock_multi_fidelity,
    sphere_multi_fidelity, MultiFidelityObjective,
};

fn build_objective(name: &str, dim: usize) -> anyhow::Result<Box<dyn MultiFidelityObjective>> {
    Ok(match name {
        "sphere" => Box::new(sphere_multi_fidelity(dim)),
        "rosenbrock" => Box::new(rosenbrock_multi_fidelity(dim)),
        "rastrigin" => Box::new(rastrigin_multi_fidelity(dim)),
        "ackley" => Box::new(ackley_multi_fidelity(dim)),
        "branin" => Box::new(branin_multi_fidelity()),
        other => anyhow::bail!("unknown objective '{other}'; expected one of: sphere, rosenbrock, rastrigin, ackley, branin"),
    })
}

fn space_for(objective: &dyn MultiFidelityObjective) -> ConfigurationSpace {
    let dims = objective
        .bounds()
        .into_iter()
        .enumerate()
        .map(|(i, (lo, hi))| Dimension::float(format!("x{i}"), lo, hi))
        .collect();
    ConfigurationSpace::new(dims)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mfes_config = match &args.config {
        Some(path) => MfesConfig::load(path)?,
        None => {
            let r = args.r.ok_or_else(|| anyhow::anyhow!("--r is required unless --config provides it"))?;
            let mut cfg = MfesConfig::new(r);
            if let Some(eta) = args.eta {
                cfg.eta = eta;
            }
            cfg
        }
    };

    info!(
        "starting mfesd: R={} eta={} objective={} workers={} trials={}",
        mfes_config.r, mfes_config.eta, args.objective, args.num_workers, args.num_trials
    );

    let objective = Arc::<dyn MultiFidelityObjective>::from(build_objective(&args.objective, args.dim)?);
    let space = space_for(objective.as_ref());
    let coord_config = mfes_config.to_coordinator_config();

    let data_dir = match &args.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir.join("saved_weights"))?;
            dir.join("saved_weights")
        }
        None => env_utils::get_saved_weights_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    let weight_method_name = match mfes_config.weight_method {
        config::WeightMethodName::RankLossPNorm => "rank_loss_p_norm",
        config::WeightMethodName::RankLossProb => "rank_loss_prob",
    };
    let sink = Box::new(NpyWeightSink::new(data_dir, weight_method_name));

    let mut coordinator = Coordinator::with_sink(space.clone(), coord_config, sink);
    let time_limit = Duration::from_secs(mfes_config.time_limit_per_trial);
    let mut pool = WorkerPool::new(args.num_workers, space, objective, mfes_config.r, mfes_config.random_state, time_limit);

    let mut completed = 0usize;
    let mut in_flight = 0usize;
    while completed < args.num_trials {
        while in_flight < args.num_workers && completed + in_flight < args.num_trials {
            let (config, budget, _extra) = coordinator.next()?;
            pool.dispatch(config, budget, completed as u64);
            in_flight += 1;
        }
        let (config, budget, loss) = pool.collect();
        in_flight -= 1;
        coordinator.observe(&config, budget, loss)?;
        completed += 1;

        if completed % 10 == 0 {
            if let Some((_, best_loss)) = coordinator.incumbent() {
                info!("trial {completed}/{}: incumbent loss = {best_loss:.6}", args.num_trials);
            }
        }
    }

    if let Some((config, loss)) = coordinator.incumbent() {
        info!("done. best loss = {loss:.6} at {:?}", config.values());
    }
    Ok(())
}
