//! Error kinds for the core. Conditions that are recoverable in the
//! algorithm's own terms (degenerate weights, insufficient data) never
//! escape as a hard failure: those are reported as part of a structured
//! status alongside the operation's normal result, not as an `Err`.

use thiserror::Error;

/// Errors that can abort an operation outright.
#[derive(Debug, Error)]
pub enum CoreError {
    /// `observe` could not find a matching RUNNING job at the given budget.
    #[error("no RUNNING job found for this configuration at budget {budget}")]
    UnknownJob { budget: u64 },

    /// The configuration space exhausted its retry budget while sampling a
    /// value outside the exclusion set.
    #[error("configuration space sampling exhausted after {attempts} attempts")]
    ExhaustedSampling { attempts: usize },

    /// A base regressor failed to fit or predict. The core treats regressors
    /// as black boxes; this wraps whatever the implementation reports.
    #[error("surrogate regressor failure: {0}")]
    Surrogate(String),
}

/// Non-fatal outcome of a weight-update attempt, surfaced alongside the
/// normal return value of `next()` rather than as an `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum WeightUpdateOutcome {
    /// Weights were recomputed and applied.
    Updated,
    /// Fewer than 3 top-fidelity observations were available; previous
    /// weights were retained.
    InsufficientData,
    /// The weighting denominator was zero or non-finite; previous weights
    /// were retained.
    DegenerateWeights,
    /// Weight learning is disabled, or the warm-up period has not elapsed.
    Skipped,
}
