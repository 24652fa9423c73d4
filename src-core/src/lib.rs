//! Core of an asynchronous multi-fidelity surrogate-ensemble hyperparameter
//! optimizer: a bracket scheduler, a weighted per-fidelity regressor
//! ensemble, a rank-loss weight learner, and the coordinator gluing them
//! into the two calls a worker-driving loop needs (`observe`, `next`).
//!
//! Evaluation workers, RPC transport, CLI/config loading, logging wiring,
//! and on-disk persistence are deliberately outside this crate's scope; see
//! `mfes-cli` and `mfes-persist` for those collaborators.

pub mod acquisition;
pub mod config_space;
pub mod coordinator;
pub mod ensemble;
pub mod error;
pub mod regressor;
pub mod scheduler;
pub mod sink;
pub mod weight_learner;

pub use acquisition::{ExpectedImprovement, OptimizerParams};
pub use config_space::{Configuration, ConfigurationSpace, Dimension, Value, VarType};
pub use coordinator::{budget_ladder, Coordinator, CoordinatorConfig, NextExtra};
pub use ensemble::{FusionMethod, WeightedSurrogateEnsemble};
pub use error::{CoreError, WeightUpdateOutcome};
pub use regressor::{BootstrapForest, Regressor};
pub use scheduler::{BracketScheduler, Job, JobStatus, Rung};
pub use sink::{NullSink, WeightSink};
pub use weight_learner::{RankLossReport, WeightMethod};
