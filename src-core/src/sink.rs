//! Persistence seam for weight snapshots.
//! The core only needs somewhere to hand a snapshot; it has no opinion on
//! format or storage, matching the out-of-scope boundary around on-disk
//! persistence. `mfes-persist` provides the real `.npy`-compatible writer.
//! Persistence failures are reported as a plain message rather than a
//! `CoreError` variant: the core defines error kinds for its own
//! algorithm, not for an out-of-scope collaborator's I/O.

/// Receives each new full `hist_weights` history every time weights change.
pub trait WeightSink: Send {
    fn write(&mut self, hist_weights: &[Vec<f64>]) -> Result<(), String>;
}

/// Discards snapshots. Used when no persistence collaborator is wired up
/// (demos, unit tests).
#[derive(Debug, Default)]
pub struct NullSink;

impl WeightSink for NullSink {
    fn write(&mut self, _hist_weights: &[Vec<f64>]) -> Result<(), String> {
        Ok(())
    }
}
