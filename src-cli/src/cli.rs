//! Command-line arguments for the `mfesd` demo worker harness.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Asynchronous multi-fidelity optimizer demo harness", long_about = None)]
pub struct Args {
    /// Path to a TOML file with optimizer knobs. Overridden by
    /// any of `--r`/`--eta`/etc. given alongside it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Maximum budget `R`. Required unless present in `--config`.
    #[arg(long)]
    pub r: Option<u64>,

    /// Downsampling factor `eta`.
    #[arg(long)]
    pub eta: Option<f64>,

    /// Synthetic objective to optimize: sphere, rosenbrock, rastrigin, ackley, branin.
    #[arg(long, default_value = "branin")]
    pub objective: String,

    /// Dimensionality of the search space (ignored for `branin`, which is fixed at 2).
    #[arg(long, default_value_t = 2)]
    pub dim: usize,

    /// Number of simulated worker threads evaluating trials concurrently.
    #[arg(long, default_value_t = 4)]
    pub num_workers: usize,

    /// Number of trials to run before exiting.
    #[arg(long, default_value_t = 200)]
    pub num_trials: usize,

    /// Directory under which `saved_weights/` is created; overrides `MFES_DATA_DIR`.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}
