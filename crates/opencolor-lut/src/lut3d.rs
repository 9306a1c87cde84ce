//! 3D LUT container filled by the format parsers.

use crate::{LutError, LutResult};

/// Raw RGB cube as read from a file.
///
/// Samples are interleaved RGB with the red index varying fastest (the
/// `.cube` file order); parsers for blue-fastest formats reorder on load.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut3d {
    /// Interleaved RGB node values, `edge^3 * 3` entries.
    pub samples: Vec<f32>,
    /// Cube edge length.
    pub edge: usize,
    /// Input domain minimum per axis.
    pub domain_min: [f32; 3],
    /// Input domain maximum per axis.
    pub domain_max: [f32; 3],
}

impl Lut3d {
    /// Cube from interleaved samples over the unit domain.
    pub fn new(samples: Vec<f32>, edge: usize) -> LutResult<Self> {
        if edge < 2 {
            return Err(LutError::InvalidSize(format!("cube edge {edge} too small")));
        }
        if samples.len() != edge * edge * edge * 3 {
            return Err(LutError::InvalidSize(format!(
                "expected {} samples for edge {edge}, got {}",
                edge * edge * edge * 3,
                samples.len()
            )));
        }
        Ok(Self {
            samples,
            edge,
            domain_min: [0.0; 3],
            domain_max: [1.0; 3],
        })
    }
}
