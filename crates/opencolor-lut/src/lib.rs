//! # opencolor-lut
//!
//! The file-format layer of the opencolor engine: readers and writers for
//! the formats that materialize ops.
//!
//! # Supported formats
//!
//! - [`clf`] - Academy/ASC Common LUT Format and the Autodesk CTF superset
//!   (the canonical op serialization)
//! - [`cube`] - Iridas/Resolve `.cube`, including the combined
//!   1D-shaper-plus-3D form
//! - [`spi`] - Sony Pictures Imageworks `.spi1d` / `.spi3d`
//! - [`spi_mtx`] - `.spimtx` 3x4 matrix files
//! - [`cdl`] - ASC CDL `.cc` single corrections and `.ccc` collections
//!
//! Parsers tolerate BOMs, CRLF line endings and trailing blank lines, and
//! reject malformed numbers instead of silently accepting them.
//!
//! # Example
//!
//! ```rust
//! use opencolor_lut::spi::parse_spi1d;
//! use std::io::Cursor;
//!
//! let text = "Version 1\nFrom 0.0 1.0\nLength 2\nComponents 1\n{\n0.0\n1.0\n}\n";
//! let lut = parse_spi1d(Cursor::new(text)).unwrap();
//! assert_eq!(lut.size(), 2);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod lut1d;
mod lut3d;

pub mod cdl;
pub mod clf;
pub mod cube;
pub mod spi;
pub mod spi_mtx;

pub use error::{LutError, LutResult};
pub use lut1d::Lut1d;
pub use lut3d::Lut3d;

/// Parses one float field strictly: anything that is not a finite float
/// is an error, never silently skipped.
pub(crate) fn parse_float(text: &str, line: usize) -> LutResult<f32> {
    match text.parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(LutError::MalformedNumber {
            text: text.to_string(),
            line,
        }),
    }
}

/// Strips a UTF-8 BOM from the first line of a text file.
pub(crate) fn strip_bom(line: &str) -> &str {
    line.strip_prefix('\u{feff}').unwrap_or(line)
}
