//! Error kinds for the persistence collaborator.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("MFES_DATA_DIR environment variable is not set; set it to a writable directory")]
    DataDirNotSet,

    #[error("failed to create data directory {0}: {1}")]
    DataDirCreationFailed(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("malformed weight snapshot file {0}: {1}")]
    Codec(PathBuf, String),
}
