//! 1D LUT container filled by the format parsers.

use crate::{LutError, LutResult};

/// Raw 1D table as read from a file: three channels plus a scalar domain.
///
/// Mono files replicate their single channel into all three.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut1d {
    /// Red channel samples.
    pub r: Vec<f32>,
    /// Green channel samples.
    pub g: Vec<f32>,
    /// Blue channel samples.
    pub b: Vec<f32>,
    /// Input domain minimum.
    pub domain_min: f32,
    /// Input domain maximum.
    pub domain_max: f32,
}

impl Lut1d {
    /// Table from one shared channel.
    pub fn from_mono(data: Vec<f32>, domain_min: f32, domain_max: f32) -> LutResult<Self> {
        if data.is_empty() {
            return Err(LutError::InvalidSize("1D LUT has no entries".into()));
        }
        Ok(Self {
            r: data.clone(),
            g: data.clone(),
            b: data,
            domain_min,
            domain_max,
        })
    }

    /// Table from three equal-length channels.
    pub fn from_rgb(
        r: Vec<f32>,
        g: Vec<f32>,
        b: Vec<f32>,
        domain_min: f32,
        domain_max: f32,
    ) -> LutResult<Self> {
        if r.is_empty() {
            return Err(LutError::InvalidSize("1D LUT has no entries".into()));
        }
        if r.len() != g.len() || r.len() != b.len() {
            return Err(LutError::InvalidSize(format!(
                "channel lengths differ: {} / {} / {}",
                r.len(),
                g.len(),
                b.len()
            )));
        }
        Ok(Self {
            r,
            g,
            b,
            domain_min,
            domain_max,
        })
    }

    /// Entries per channel.
    pub fn size(&self) -> usize {
        self.r.len()
    }

    /// Samples interleaved RGB, the layout the op layer consumes.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.size() * 3);
        for i in 0..self.size() {
            out.extend_from_slice(&[self.r[i], self.g[i], self.b[i]]);
        }
        out
    }
}
