//! On-disk persistence for weight snapshots — the out-of-scope collaborator
//! `mfes-core`'s `WeightSink` seam expects. Resolves its data directory via
//! `MFES_DATA_DIR`.

pub mod env_utils;
pub mod error;
pub mod npy;
pub mod sink;

pub use error::PersistError;
pub use sink::NpyWeightSink;
