//! LUT file-format error types.

use thiserror::Error;

/// Result type for LUT file operations.
pub type LutResult<T> = Result<T, LutError>;

/// Errors raised by the file-format readers and writers.
#[derive(Debug, Error)]
pub enum LutError {
    /// Structurally invalid file content.
    #[error("parse error: {0}")]
    Parse(String),

    /// A float field that is not a float.
    #[error("malformed number {text:?} on line {line}")]
    MalformedNumber {
        /// The offending text.
        text: String,
        /// 1-based line number.
        line: usize,
    },

    /// Table size outside the format's limits.
    #[error("invalid LUT size: {0}")]
    InvalidSize(String),

    /// The file is recognized but uses a feature we do not support.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML-level error from the CLF/CDL parsers.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}
