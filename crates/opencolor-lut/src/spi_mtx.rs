//! Sony Pictures Imageworks `.spimtx` matrix files.
//!
//! The file holds twelve numbers: a 3x4 matrix in row-major order where
//! the fourth column is an offset expressed in 16-bit code values, so it
//! is divided by 65535 on load.
//!
//! ```text
//! 0.9 0.0 0.0 100
//! 0.0 1.0 0.0 0
//! 0.0 0.0 1.0 0
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::{parse_float, strip_bom, LutError, LutResult};

/// Scale applied to the offset column on load.
pub const OFFSET_SCALE: f32 = 1.0 / 65535.0;

/// A parsed `.spimtx` file: 3x3 matrix plus normalized offset.
#[derive(Debug, Clone, PartialEq)]
pub struct SpiMatrix {
    /// Row-major 3x3 matrix.
    pub matrix: [f32; 9],
    /// Offset per channel, already divided by 65535.
    pub offset: [f32; 3],
}

/// Reads a `.spimtx` file from disk.
pub fn read_spimtx(path: &Path) -> LutResult<SpiMatrix> {
    let file = File::open(path)?;
    parse_spimtx(BufReader::new(file))
}

/// Parses `.spimtx` content from a reader.
pub fn parse_spimtx<R: BufRead>(reader: R) -> LutResult<SpiMatrix> {
    let mut values = Vec::with_capacity(12);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = if lineno == 0 { strip_bom(&line) } else { &line };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for field in line.split_whitespace() {
            values.push(parse_float(field, lineno + 1)?);
        }
    }

    if values.len() != 12 {
        return Err(LutError::Parse(format!(
            "expected 12 values in spimtx, got {}",
            values.len()
        )));
    }

    let mut matrix = [0.0f32; 9];
    let mut offset = [0.0f32; 3];
    for row in 0..3 {
        for col in 0..3 {
            matrix[row * 3 + col] = values[row * 4 + col];
        }
        offset[row] = values[row * 4 + 3] * OFFSET_SCALE;
    }
    Ok(SpiMatrix { matrix, offset })
}

/// Writes a `.spimtx` file.
pub fn write_spimtx(path: &Path, m: &SpiMatrix) -> LutResult<()> {
    let file = File::create(path)?;
    write_spimtx_to(BufWriter::new(file), m)
}

/// Writes `.spimtx` content to any writer.
pub fn write_spimtx_to<W: Write>(mut w: W, m: &SpiMatrix) -> LutResult<()> {
    for row in 0..3 {
        writeln!(
            w,
            "{:.7} {:.7} {:.7} {:.7}",
            m.matrix[row * 3],
            m.matrix[row * 3 + 1],
            m.matrix[row * 3 + 2],
            m.offset[row] / OFFSET_SCALE
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Cursor;

    #[test]
    fn parse_with_offset_scaling() {
        let text = "0.9 0.0 0.0 65535\n0.0 1.0 0.0 0\n0.0 0.0 1.1 32767.5\n";
        let m = parse_spimtx(Cursor::new(text)).unwrap();
        assert_abs_diff_eq!(m.matrix[0], 0.9, epsilon = 1e-6);
        assert_abs_diff_eq!(m.offset[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(m.offset[2], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn wrong_count_rejected() {
        let text = "1 0 0\n0 1 0\n0 0 1\n";
        assert!(parse_spimtx(Cursor::new(text)).is_err());
    }

    #[test]
    fn malformed_number_rejected() {
        let text = "1 0 0 0\n0 x 0 0\n0 0 1 0\n";
        assert!(matches!(
            parse_spimtx(Cursor::new(text)),
            Err(LutError::MalformedNumber { .. })
        ));
    }

    #[test]
    fn round_trip() {
        let m = SpiMatrix {
            matrix: [0.9, 0.1, 0.0, 0.0, 1.0, 0.0, 0.05, 0.0, 1.1],
            offset: [0.25, 0.0, -0.1],
        };
        let mut out = Vec::new();
        write_spimtx_to(&mut out, &m).unwrap();
        let again = parse_spimtx(Cursor::new(out)).unwrap();
        for i in 0..9 {
            assert_abs_diff_eq!(again.matrix[i], m.matrix[i], epsilon = 1e-5);
        }
        for i in 0..3 {
            assert_abs_diff_eq!(again.offset[i], m.offset[i], epsilon = 1e-5);
        }
    }
}
