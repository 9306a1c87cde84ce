//! Iridas/Resolve `.cube` LUT format.
//!
//! ```text
//! # comment
//! TITLE "Grade"
//! LUT_1D_SIZE 1024
//! LUT_1D_INPUT_RANGE 0.0 1.0
//! LUT_3D_SIZE 33
//! LUT_3D_INPUT_RANGE 0.0 1.0
//! DOMAIN_MIN 0.0 0.0 0.0
//! DOMAIN_MAX 1.0 1.0 1.0
//! <1D shaper lines, then 3D lines, red index fastest>
//! ```
//!
//! A file may hold a 1D table, a 3D cube, or the Resolve combined form
//! with a 1D shaper followed by a cube.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::{parse_float, strip_bom, Lut1d, Lut3d, LutError, LutResult};

/// A parsed `.cube` file.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeFile {
    /// TITLE string, if present.
    pub title: Option<String>,
    /// 1D shaper, if present.
    pub shaper: Option<Lut1d>,
    /// 3D cube, if present.
    pub cube: Option<Lut3d>,
}

/// Reads a `.cube` file from disk.
pub fn read_cube(path: &Path) -> LutResult<CubeFile> {
    let file = File::open(path)?;
    parse_cube(BufReader::new(file))
}

/// Parses `.cube` content from a reader.
pub fn parse_cube<R: BufRead>(reader: R) -> LutResult<CubeFile> {
    let mut title = None;
    let mut size_1d: Option<usize> = None;
    let mut size_3d: Option<usize> = None;
    let mut range_1d = [0.0f32, 1.0];
    let mut range_3d = [0.0f32, 1.0];
    let mut domain_min = [0.0f32; 3];
    let mut domain_max = [1.0f32; 3];
    let mut data: Vec<[f32; 3]> = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = if lineno == 0 { strip_bom(&line) } else { &line };
        let line = line.trim();
        let lineno = lineno + 1;

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("TITLE") {
            let rest = rest.trim();
            title = Some(rest.trim_matches('"').to_string());
        } else if let Some(rest) = line.strip_prefix("LUT_1D_SIZE") {
            size_1d = Some(parse_size(rest, lineno)?);
        } else if let Some(rest) = line.strip_prefix("LUT_3D_SIZE") {
            size_3d = Some(parse_size(rest, lineno)?);
        } else if let Some(rest) = line.strip_prefix("LUT_1D_INPUT_RANGE") {
            range_1d = parse_pair(rest, lineno)?;
        } else if let Some(rest) = line.strip_prefix("LUT_3D_INPUT_RANGE") {
            range_3d = parse_pair(rest, lineno)?;
        } else if let Some(rest) = line.strip_prefix("DOMAIN_MIN") {
            domain_min = parse_triple(rest, lineno)?;
        } else if let Some(rest) = line.strip_prefix("DOMAIN_MAX") {
            domain_max = parse_triple(rest, lineno)?;
        } else if line.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
            return Err(LutError::Parse(format!(
                "line {lineno}: unknown keyword {line:?}"
            )));
        } else {
            data.push(parse_triple(line, lineno)?);
        }
    }

    let count_1d = size_1d.unwrap_or(0);
    let count_3d = size_3d.map(|s| s * s * s).unwrap_or(0);
    if size_1d.is_none() && size_3d.is_none() {
        return Err(LutError::Parse("missing LUT_1D_SIZE / LUT_3D_SIZE".into()));
    }
    if data.len() != count_1d + count_3d {
        return Err(LutError::Parse(format!(
            "expected {} data lines (1D {count_1d} + 3D {count_3d}), got {}",
            count_1d + count_3d,
            data.len()
        )));
    }

    let shaper = match size_1d {
        Some(size) => {
            let slice = &data[..size];
            let (lo, hi) = resolve_1d_domain(range_1d, domain_min, domain_max)?;
            Some(Lut1d::from_rgb(
                slice.iter().map(|v| v[0]).collect(),
                slice.iter().map(|v| v[1]).collect(),
                slice.iter().map(|v| v[2]).collect(),
                lo,
                hi,
            )?)
        }
        None => None,
    };

    let cube = match size_3d {
        Some(edge) => {
            let slice = &data[count_1d..];
            let mut samples = Vec::with_capacity(slice.len() * 3);
            for rgb in slice {
                samples.extend_from_slice(rgb);
            }
            let mut cube = Lut3d::new(samples, edge)?;
            cube.domain_min = if size_1d.is_some() {
                [range_3d[0]; 3]
            } else {
                [
                    domain_min[0].max(range_3d[0]),
                    domain_min[1].max(range_3d[0]),
                    domain_min[2].max(range_3d[0]),
                ]
            };
            cube.domain_max = if size_1d.is_some() {
                [range_3d[1]; 3]
            } else {
                [
                    domain_max[0].min(range_3d[1]),
                    domain_max[1].min(range_3d[1]),
                    domain_max[2].min(range_3d[1]),
                ]
            };
            Some(cube)
        }
        None => None,
    };

    Ok(CubeFile {
        title,
        shaper,
        cube,
    })
}

fn resolve_1d_domain(
    range: [f32; 2],
    domain_min: [f32; 3],
    domain_max: [f32; 3],
) -> LutResult<(f32, f32)> {
    // The 1D table needs a scalar domain; a non-uniform DOMAIN_MIN/MAX
    // cannot be expressed.
    if domain_min[0] != domain_min[1]
        || domain_min[0] != domain_min[2]
        || domain_max[0] != domain_max[1]
        || domain_max[0] != domain_max[2]
    {
        return Err(LutError::Unsupported(
            "non-uniform DOMAIN_MIN/MAX on a 1D cube table".into(),
        ));
    }
    let lo = range[0].max(domain_min[0]);
    let hi = range[1].min(domain_max[0]);
    if lo >= hi {
        return Err(LutError::Parse(format!("empty 1D input range [{lo}, {hi}]")));
    }
    Ok((lo, hi))
}

fn parse_size(rest: &str, lineno: usize) -> LutResult<usize> {
    rest.trim()
        .parse()
        .map_err(|_| LutError::Parse(format!("line {lineno}: bad size {rest:?}")))
}

fn parse_pair(rest: &str, lineno: usize) -> LutResult<[f32; 2]> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() != 2 {
        return Err(LutError::Parse(format!("line {lineno}: expected 2 values")));
    }
    Ok([
        parse_float(fields[0], lineno)?,
        parse_float(fields[1], lineno)?,
    ])
}

fn parse_triple(rest: &str, lineno: usize) -> LutResult<[f32; 3]> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(LutError::Parse(format!("line {lineno}: expected 3 values")));
    }
    Ok([
        parse_float(fields[0], lineno)?,
        parse_float(fields[1], lineno)?,
        parse_float(fields[2], lineno)?,
    ])
}

/// Writes a `.cube` file; 1D shaper first, cube second, both optional.
pub fn write_cube(path: &Path, file: &CubeFile) -> LutResult<()> {
    let out = File::create(path)?;
    write_cube_to(BufWriter::new(out), file)
}

/// Writes `.cube` content to any writer.
pub fn write_cube_to<W: Write>(mut w: W, file: &CubeFile) -> LutResult<()> {
    if let Some(title) = &file.title {
        writeln!(w, "TITLE \"{title}\"")?;
    }
    if let Some(shaper) = &file.shaper {
        writeln!(w, "LUT_1D_SIZE {}", shaper.size())?;
        writeln!(
            w,
            "LUT_1D_INPUT_RANGE {:.7} {:.7}",
            shaper.domain_min, shaper.domain_max
        )?;
    }
    if let Some(cube) = &file.cube {
        writeln!(w, "LUT_3D_SIZE {}", cube.edge)?;
        writeln!(
            w,
            "LUT_3D_INPUT_RANGE {:.7} {:.7}",
            cube.domain_min[0], cube.domain_max[0]
        )?;
    }
    if let Some(shaper) = &file.shaper {
        for i in 0..shaper.size() {
            writeln!(w, "{:.7} {:.7} {:.7}", shaper.r[i], shaper.g[i], shaper.b[i])?;
        }
    }
    if let Some(cube) = &file.cube {
        for rgb in cube.samples.chunks_exact(3) {
            writeln!(w, "{:.7} {:.7} {:.7}", rgb[0], rgb[1], rgb[2])?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_3d_only() {
        let mut text = String::from("TITLE \"t\"\nLUT_3D_SIZE 2\n");
        for _ in 0..8 {
            text.push_str("0.0 0.5 1.0\n");
        }
        let file = parse_cube(Cursor::new(text)).unwrap();
        assert_eq!(file.title.as_deref(), Some("t"));
        assert!(file.shaper.is_none());
        assert_eq!(file.cube.unwrap().edge, 2);
    }

    #[test]
    fn parse_1d_only_with_range() {
        let text = "LUT_1D_SIZE 2\nLUT_1D_INPUT_RANGE -1.0 2.0\n0 0 0\n1 1 1\n";
        let file = parse_cube(Cursor::new(text)).unwrap();
        let shaper = file.shaper.unwrap();
        assert_eq!(shaper.domain_min, -1.0);
        assert_eq!(shaper.domain_max, 2.0);
    }

    #[test]
    fn parse_combined_shaper_and_cube() {
        let mut text = String::from("LUT_1D_SIZE 2\nLUT_3D_SIZE 2\n");
        text.push_str("0 0 0\n1 1 1\n");
        for _ in 0..8 {
            text.push_str("0.25 0.5 0.75\n");
        }
        let file = parse_cube(Cursor::new(text)).unwrap();
        assert!(file.shaper.is_some());
        assert!(file.cube.is_some());
    }

    #[test]
    fn wrong_line_count_rejected() {
        let text = "LUT_3D_SIZE 2\n0 0 0\n";
        assert!(parse_cube(Cursor::new(text)).is_err());
    }

    #[test]
    fn malformed_float_rejected() {
        let text = "LUT_1D_SIZE 2\n0 0 0\n1 bad 1\n";
        assert!(matches!(
            parse_cube(Cursor::new(text)),
            Err(LutError::MalformedNumber { .. })
        ));
    }

    #[test]
    fn unknown_keyword_rejected() {
        let text = "LUT_9D_SIZE 2\n";
        assert!(parse_cube(Cursor::new(text)).is_err());
    }

    #[test]
    fn round_trip() {
        let mut text = String::from("LUT_3D_SIZE 2\n");
        for i in 0..8 {
            text.push_str(&format!("0.0 0.5 {:.1}\n", i as f32 / 8.0));
        }
        let file = parse_cube(Cursor::new(text)).unwrap();
        let mut out = Vec::new();
        write_cube_to(&mut out, &file).unwrap();
        let again = parse_cube(Cursor::new(out)).unwrap();
        assert_eq!(again.cube.unwrap().edge, 2);
    }
}
