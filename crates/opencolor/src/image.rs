//! Image descriptors for CPU evaluation.
//!
//! Two memory layouts are supported: **packed** (interleaved RGB or
//! RGBA) and **planar** (independent channel slices). Packed buffers may
//! use any supported bit depth; the processor converts at the boundary.
//! The packed-F32 shapes are the fast paths.

use half::f16;

use crate::types::BitDepth;
use crate::{OcioError, OcioResult};

/// Packed pixel storage at one bit depth.
#[derive(Debug)]
pub enum PackedPixels<'a> {
    /// 8-bit code values.
    U8(&'a mut [u8]),
    /// 10/12/16-bit code values in 16-bit words; the image's
    /// [`BitDepth`] gives the scale.
    U16(&'a mut [u16]),
    /// Half floats.
    F16(&'a mut [f16]),
    /// Floats.
    F32(&'a mut [f32]),
}

impl PackedPixels<'_> {
    fn len(&self) -> usize {
        match self {
            Self::U8(d) => d.len(),
            Self::U16(d) => d.len(),
            Self::F16(d) => d.len(),
            Self::F32(d) => d.len(),
        }
    }

    /// The natural bit depth of the storage (U16 words default to U16;
    /// narrow code ranges are declared on the image).
    fn natural_depth(&self) -> BitDepth {
        match self {
            Self::U8(_) => BitDepth::U8,
            Self::U16(_) => BitDepth::U16,
            Self::F16(_) => BitDepth::F16,
            Self::F32(_) => BitDepth::F32,
        }
    }
}

/// A packed (interleaved) image.
#[derive(Debug)]
pub struct PackedImage<'a> {
    /// The pixel storage.
    pub pixels: PackedPixels<'a>,
    /// 3 (RGB) or 4 (RGBA).
    pub channels: usize,
    /// Code-value interpretation of integer storage.
    pub bit_depth: BitDepth,
}

impl<'a> PackedImage<'a> {
    /// Packed RGBA F32.
    pub fn rgba_f32(data: &'a mut [f32]) -> Self {
        Self {
            pixels: PackedPixels::F32(data),
            channels: 4,
            bit_depth: BitDepth::F32,
        }
    }

    /// Packed RGB F32.
    pub fn rgb_f32(data: &'a mut [f32]) -> Self {
        Self {
            pixels: PackedPixels::F32(data),
            channels: 3,
            bit_depth: BitDepth::F32,
        }
    }

    pub(crate) fn validate(&self) -> OcioResult<()> {
        if self.channels != 3 && self.channels != 4 {
            return Err(OcioError::InvalidImage(format!(
                "packed images need 3 or 4 channels, got {}",
                self.channels
            )));
        }
        if self.pixels.len() == 0 {
            return Err(OcioError::InvalidImage("empty image".into()));
        }
        if self.pixels.len() % self.channels != 0 {
            return Err(OcioError::InvalidImage(format!(
                "buffer length {} is not a multiple of {} channels",
                self.pixels.len(),
                self.channels
            )));
        }
        let natural = self.pixels.natural_depth();
        let compatible = match natural {
            BitDepth::U16 => matches!(
                self.bit_depth,
                BitDepth::U10 | BitDepth::U12 | BitDepth::U16
            ),
            other => other == self.bit_depth,
        };
        if !compatible {
            return Err(OcioError::InvalidImage(format!(
                "bit depth {:?} does not match the pixel storage",
                self.bit_depth
            )));
        }
        Ok(())
    }
}

/// A planar F32 image: independent channel slices.
#[derive(Debug)]
pub struct PlanarImage<'a> {
    /// Red plane.
    pub r: &'a mut [f32],
    /// Green plane.
    pub g: &'a mut [f32],
    /// Blue plane.
    pub b: &'a mut [f32],
    /// Optional alpha plane.
    pub a: Option<&'a mut [f32]>,
}

impl PlanarImage<'_> {
    pub(crate) fn validate(&self) -> OcioResult<()> {
        if self.r.is_empty() {
            return Err(OcioError::InvalidImage("empty image".into()));
        }
        let n = self.r.len();
        if self.g.len() != n || self.b.len() != n {
            return Err(OcioError::InvalidImage(format!(
                "mismatched planes: r={} g={} b={}",
                n,
                self.g.len(),
                self.b.len()
            )));
        }
        if let Some(a) = &self.a {
            if a.len() != n {
                return Err(OcioError::InvalidImage(format!(
                    "alpha plane length {} does not match {}",
                    a.len(),
                    n
                )));
            }
        }
        Ok(())
    }
}

/// An image in either layout.
#[derive(Debug)]
pub enum ImageDesc<'a> {
    /// Interleaved pixels.
    Packed(PackedImage<'a>),
    /// Independent planes.
    Planar(PlanarImage<'a>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_validation() {
        let mut data = vec![0.0f32; 12];
        assert!(PackedImage::rgba_f32(&mut data).validate().is_ok());
        assert!(PackedImage::rgb_f32(&mut data).validate().is_ok());

        let mut short = vec![0.0f32; 10];
        assert!(PackedImage::rgb_f32(&mut short).validate().is_err());

        let mut empty: Vec<f32> = Vec::new();
        assert!(PackedImage::rgba_f32(&mut empty).validate().is_err());
    }

    #[test]
    fn planar_validation() {
        let mut r = vec![0.0f32; 4];
        let mut g = vec![0.0f32; 4];
        let mut b = vec![0.0f32; 3];
        let img = PlanarImage {
            r: &mut r,
            g: &mut g,
            b: &mut b,
            a: None,
        };
        assert!(img.validate().is_err());
    }

    #[test]
    fn u16_storage_accepts_narrow_depths() {
        let mut data = vec![0u16; 12];
        let img = PackedImage {
            pixels: PackedPixels::U16(&mut data),
            channels: 3,
            bit_depth: BitDepth::U10,
        };
        assert!(img.validate().is_ok());
    }
}
