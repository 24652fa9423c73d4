//! Library half of the `mfesd` demo worker harness: CLI args, on-disk
//! config, and the in-process worker pool standing in for the out-of-scope
//! RPC transport. `main.rs` is a thin driver over this crate
//! so the harness's control-flow logic stays test-reachable.

pub mod cli;
pub mod config;
pub mod worker_pool;

pub use cli::Args;
pub use config::MfesConfig;
pub use worker_pool::WorkerPool;
