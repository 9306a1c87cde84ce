//! Engine error taxonomy.
//!
//! Internal boundaries pass `Result`s; the exceptions of the reference
//! API map onto these variants at the host-facing surface. The builder
//! never silently substitutes: a missing file propagates as
//! [`OcioError::MissingFile`] unless the look-chain option mechanism
//! consumes it.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type OcioResult<T> = Result<T, OcioError>;

/// Errors raised while building configs, processors and shaders.
#[derive(Debug, Error)]
pub enum OcioError {
    /// Config / CLF / LUT content that cannot be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// A referenced file could not be located on the search path.
    #[error("file not found: {path}")]
    MissingFile {
        /// The path as requested (after context resolution).
        path: PathBuf,
    },

    /// A file reference chain transitively contains itself.
    #[error("reference cycle through {path}")]
    ReferenceCycle {
        /// The file that closed the cycle.
        path: PathBuf,
    },

    /// Color space, role, look, display or view lookup failed.
    #[error("unknown {kind}: {name}")]
    UnknownName {
        /// Namespace that was searched ("color space", "look", ...).
        kind: &'static str,
        /// The name that was not found.
        name: String,
    },

    /// Op parameters outside their domain.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Inverse of a singular matrix or non-monotonic 1D LUT.
    #[error("not invertible: {0}")]
    NotInvertible(String),

    /// File extension with no registered format reader.
    #[error("unsupported format: {extension:?} ({path})")]
    UnsupportedFormat {
        /// Lowercased extension.
        extension: String,
        /// Offending file.
        path: PathBuf,
    },

    /// GPU resource demands exceed the target language or host limits.
    #[error("shader limit exceeded: {0}")]
    ShaderLimitExceeded(String),

    /// Structural violation in an apply call (null-sized image,
    /// mismatched planes).
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Broken internal invariant; indicates a bug.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O failure while resolving or reading files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<opencolor_ops::OpsError> for OcioError {
    fn from(e: opencolor_ops::OpsError) -> Self {
        use opencolor_ops::OpsError;
        match e {
            OpsError::InvalidParameters { op, reason } => {
                Self::InvalidParameters(format!("{op}: {reason}"))
            }
            OpsError::NotInvertible { threshold } => {
                Self::NotInvertible(format!("matrix determinant below {threshold}"))
            }
            OpsError::NonInvertible1d { channel } => {
                Self::NotInvertible(format!("1D LUT channel {channel} is not monotonic"))
            }
            OpsError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<opencolor_lut::LutError> for OcioError {
    fn from(e: opencolor_lut::LutError) -> Self {
        use opencolor_lut::LutError;
        match e {
            LutError::Io(io) => Self::Io(io),
            other => Self::Parse(other.to_string()),
        }
    }
}
