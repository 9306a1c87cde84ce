//! Op-level error types.

use thiserror::Error;

/// Result type for op operations.
pub type OpsResult<T> = Result<T, OpsError>;

/// Errors raised while validating, finalizing or combining ops.
#[derive(Debug, Error)]
pub enum OpsError {
    /// A parameter is outside its legal domain.
    #[error("invalid parameters for {op}: {reason}")]
    InvalidParameters {
        /// Op kind the parameter belongs to.
        op: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Matrix inverse requested for a singular matrix.
    #[error("matrix is not invertible (|det| < {threshold})")]
    NotInvertible {
        /// Singularity threshold that was applied.
        threshold: f64,
    },

    /// Inverse of a non-monotonic 1D LUT.
    #[error("1D LUT channel {channel} is not strictly monotonic; inverse is undefined")]
    NonInvertible1d {
        /// Channel index (0 = R).
        channel: usize,
    },

    /// Broken internal invariant.
    #[error("internal error: {0}")]
    Internal(String),
}
