//! `NpyWeightSink` — the on-disk collaborator the core's `WeightSink`
//! seam expects, writing to
//! `<data_dir>/saved_weights/mfes_weights_<method_name>.npy`.

use std::path::PathBuf;

use mfes_core::WeightSink;

use crate::npy;

pub struct NpyWeightSink {
    path: PathBuf,
}

impl NpyWeightSink {
    pub fn new(saved_weights_dir: PathBuf, method_name: &str) -> Self {
        let path = saved_weights_dir.join(format!("mfes_weights_{method_name}.npy"));
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl WeightSink for NpyWeightSink {
    fn write(&mut self, hist_weights: &[Vec<f64>]) -> Result<(), String> {
        npy::write_array(&self.path, hist_weights).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_round_trips_via_the_npy_reader() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = NpyWeightSink::new(dir.path().to_path_buf(), "rank_loss_p_norm");
        sink.write(&[vec![0.0, 0.5, 0.5], vec![0.0, 0.4, 0.6]]).unwrap();
        let back = npy::read_array(sink.path()).unwrap();
        assert_eq!(back, vec![vec![0.0, 0.5, 0.5], vec![0.0, 0.4, 0.6]]);
    }
}
