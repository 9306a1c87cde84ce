//! Sony Pictures Imageworks LUT formats (`.spi1d`, `.spi3d`).
//!
//! # SPI1D
//!
//! ```text
//! Version 1
//! From 0.0 1.0
//! Length 1024
//! Components 3
//! {
//!   0.000000 0.000000 0.000000
//!   ...
//! }
//! ```
//!
//! # SPI3D
//!
//! ```text
//! SPILUT 1.0
//! 3 3
//! 32 32 32
//! 0 0 0 0.000000 0.000000 0.000000
//! ...
//! ```
//!
//! Index triples in SPI3D are explicit per line, so file order is free.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::{parse_float, strip_bom, Lut1d, Lut3d, LutError, LutResult};

/// Reads an SPI1D file from disk.
pub fn read_spi1d(path: &Path) -> LutResult<Lut1d> {
    let file = File::open(path)?;
    parse_spi1d(BufReader::new(file))
}

/// Parses SPI1D from a reader.
pub fn parse_spi1d<R: BufRead>(reader: R) -> LutResult<Lut1d> {
    let mut from_min = 0.0f32;
    let mut from_max = 1.0f32;
    let mut length = 0usize;
    let mut components = 1usize;
    let mut in_data = false;
    let mut r = Vec::new();
    let mut g = Vec::new();
    let mut b = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = if lineno == 0 { strip_bom(&line) } else { &line };
        let line = line.trim();
        let lineno = lineno + 1;

        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == "{" {
            in_data = true;
            continue;
        }
        if line == "}" {
            in_data = false;
            continue;
        }

        if in_data {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < components.min(3) {
                return Err(LutError::Parse(format!(
                    "line {lineno}: expected {components} values, got {}",
                    fields.len()
                )));
            }
            if components == 1 {
                r.push(parse_float(fields[0], lineno)?);
            } else {
                r.push(parse_float(fields[0], lineno)?);
                g.push(parse_float(fields[1], lineno)?);
                b.push(parse_float(fields[2], lineno)?);
            }
        } else {
            let mut parts = line.split_whitespace();
            match parts.next().map(str::to_ascii_lowercase).as_deref() {
                Some("version") => {}
                Some("from") => {
                    from_min = parse_float(parts.next().unwrap_or(""), lineno)?;
                    from_max = parse_float(parts.next().unwrap_or(""), lineno)?;
                }
                Some("length") => {
                    length = parts
                        .next()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| LutError::Parse(format!("line {lineno}: bad Length")))?;
                }
                Some("components") => {
                    components = parts
                        .next()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| LutError::Parse(format!("line {lineno}: bad Components")))?;
                }
                _ => {
                    return Err(LutError::Parse(format!(
                        "line {lineno}: unexpected header {line:?}"
                    )));
                }
            }
        }
    }

    if r.is_empty() {
        return Err(LutError::Parse("no LUT data found".into()));
    }
    if length > 0 && r.len() != length {
        return Err(LutError::Parse(format!(
            "Length says {length} entries, file has {}",
            r.len()
        )));
    }

    if components == 1 {
        Lut1d::from_mono(r, from_min, from_max)
    } else {
        Lut1d::from_rgb(r, g, b, from_min, from_max)
    }
}

/// Writes an SPI1D file.
pub fn write_spi1d(path: &Path, lut: &Lut1d) -> LutResult<()> {
    let file = File::create(path)?;
    write_spi1d_to(BufWriter::new(file), lut)
}

/// Writes SPI1D to any writer.
pub fn write_spi1d_to<W: Write>(mut w: W, lut: &Lut1d) -> LutResult<()> {
    let mono = lut.r == lut.g && lut.r == lut.b;
    writeln!(w, "Version 1")?;
    writeln!(w, "From {} {}", lut.domain_min, lut.domain_max)?;
    writeln!(w, "Length {}", lut.size())?;
    writeln!(w, "Components {}", if mono { 1 } else { 3 })?;
    writeln!(w, "{{")?;
    for i in 0..lut.size() {
        if mono {
            writeln!(w, "  {:.7}", lut.r[i])?;
        } else {
            writeln!(w, "  {:.7} {:.7} {:.7}", lut.r[i], lut.g[i], lut.b[i])?;
        }
    }
    writeln!(w, "}}")?;
    Ok(())
}

/// Reads an SPI3D file from disk.
pub fn read_spi3d(path: &Path) -> LutResult<Lut3d> {
    let file = File::open(path)?;
    parse_spi3d(BufReader::new(file))
}

/// Parses SPI3D from a reader.
pub fn parse_spi3d<R: BufRead>(reader: R) -> LutResult<Lut3d> {
    let mut lines = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = if lineno == 0 { strip_bom(&line) } else { &line };
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        lines.push((lineno + 1, trimmed.to_string()));
    }

    if lines.len() < 3 {
        return Err(LutError::Parse("truncated SPI3D file".into()));
    }
    if !lines[0].1.to_ascii_uppercase().starts_with("SPILUT") {
        return Err(LutError::Parse("missing SPILUT signature".into()));
    }
    // Second line is the channel counts ("3 3"); third the dimensions.
    let dims: Vec<usize> = lines[2]
        .1
        .split_whitespace()
        .filter_map(|s| s.parse().ok())
        .collect();
    if dims.len() != 3 {
        return Err(LutError::Parse(format!(
            "line {}: expected 3 dimensions",
            lines[2].0
        )));
    }
    if dims[0] != dims[1] || dims[0] != dims[2] {
        return Err(LutError::Unsupported(format!(
            "non-cubic SPI3D {}x{}x{}",
            dims[0], dims[1], dims[2]
        )));
    }
    let edge = dims[0];
    if edge < 2 {
        return Err(LutError::InvalidSize(format!("cube edge {edge} too small")));
    }

    let mut samples = vec![0.0f32; edge * edge * edge * 3];
    let mut filled = vec![false; edge * edge * edge];
    for (lineno, line) in &lines[3..] {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(LutError::Parse(format!(
                "line {lineno}: expected 6 fields, got {}",
                fields.len()
            )));
        }
        let idx: Vec<usize> = fields[..3]
            .iter()
            .map(|s| s.parse())
            .collect::<Result<_, _>>()
            .map_err(|_| LutError::Parse(format!("line {lineno}: bad index triple")))?;
        let (r, g, b) = (idx[0], idx[1], idx[2]);
        if r >= edge || g >= edge || b >= edge {
            return Err(LutError::Parse(format!(
                "line {lineno}: index {r} {g} {b} outside cube"
            )));
        }
        let node = (b * edge + g) * edge + r;
        let base = node * 3;
        samples[base] = parse_float(fields[3], *lineno)?;
        samples[base + 1] = parse_float(fields[4], *lineno)?;
        samples[base + 2] = parse_float(fields[5], *lineno)?;
        filled[node] = true;
    }

    if !filled.iter().all(|&f| f) {
        return Err(LutError::Parse("SPI3D is missing grid entries".into()));
    }
    Lut3d::new(samples, edge)
}

/// Writes an SPI3D file.
pub fn write_spi3d(path: &Path, lut: &Lut3d) -> LutResult<()> {
    let file = File::create(path)?;
    write_spi3d_to(BufWriter::new(file), lut)
}

/// Writes SPI3D to any writer.
pub fn write_spi3d_to<W: Write>(mut w: W, lut: &Lut3d) -> LutResult<()> {
    writeln!(w, "SPILUT 1.0")?;
    writeln!(w, "3 3")?;
    writeln!(w, "{} {} {}", lut.edge, lut.edge, lut.edge)?;
    let edge = lut.edge;
    for b in 0..edge {
        for g in 0..edge {
            for r in 0..edge {
                let i = ((b * edge + g) * edge + r) * 3;
                writeln!(
                    w,
                    "{r} {g} {b} {:.7} {:.7} {:.7}",
                    lut.samples[i],
                    lut.samples[i + 1],
                    lut.samples[i + 2]
                )?;
            }
        }
    }
    Ok(())
}
