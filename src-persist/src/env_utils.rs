//! `MFES_DATA_DIR` resolution, mirroring the `AUTOEQ_DIR` convention of
//! locating generated artifacts under an env-controlled project directory.

use std::env;
use std::path::PathBuf;

use crate::error::PersistError;

/// Get `MFES_DATA_DIR`, creating it if it does not exist yet.
pub fn get_data_dir() -> Result<PathBuf, PersistError> {
    let raw = env::var("MFES_DATA_DIR").map_err(|_| PersistError::DataDirNotSet)?;
    let path = PathBuf::from(raw);
    if !path.exists() {
        std::fs::create_dir_all(&path).map_err(|e| PersistError::DataDirCreationFailed(path.clone(), e))?;
    }
    Ok(path)
}

/// Get `<data_dir>/saved_weights`, creating it if necessary.
pub fn get_saved_weights_dir() -> Result<PathBuf, PersistError> {
    let dir = get_data_dir()?.join("saved_weights");
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| PersistError::DataDirCreationFailed(dir.clone(), e))?;
    }
    Ok(dir)
}
