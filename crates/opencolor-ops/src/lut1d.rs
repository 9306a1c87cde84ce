//! 1D LUT op: per-channel table lookup.
//!
//! Samples are stored interleaved RGB in a shared array (clones of the op
//! data share the table). Evaluation normalizes the input into the table
//! domain, clamps, and interpolates (nearest or linear). Two optional
//! behaviors extend the plain lookup:
//!
//! - **half-domain**: the input is reinterpreted as an IEEE half-precision
//!   bit pattern and the raw 16-bit integer indexes the table directly,
//!   giving non-uniform sampling that is dense near zero. The table must
//!   have 65536 entries.
//! - **hue-adjust**: the hue-preserving rescale from the ACES 1.0 spec;
//!   the LUT is applied to the min and max channels and the middle channel
//!   is reconstructed so the hue of the maximum channel is kept.
//!
//! Inversion requires each channel to be strictly monotonic; the inverse
//! kernel runs a per-channel binary search followed by linear
//! interpolation of indices.

use std::sync::Arc;

use half::f16;

use crate::hash::CacheIdHasher;
use crate::{Direction, Interpolation, OpsError, OpsResult};

/// Largest allowed table length.
pub const MAX_LUT1D_SIZE: usize = 1 << 22;

/// Absolute tolerance for the identity-ramp check.
const IDENTITY_TOLERANCE: f32 = 1e-5;

/// Declarative parameters of a 1D LUT op.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut1dOpData {
    /// Interleaved RGB samples, `size * 3` entries.
    pub samples: Arc<Vec<f32>>,
    /// Input domain covered by the table.
    pub domain: [f32; 2],
    /// Interpret inputs as raw IEEE half bit patterns.
    pub half_domain: bool,
    /// Apply the ACES hue-preserving rescale.
    pub hue_adjust: bool,
    /// Interpolation between samples.
    pub interpolation: Interpolation,
}

impl Lut1dOpData {
    /// LUT from interleaved RGB samples over [0, 1].
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples: Arc::new(samples),
            domain: [0.0, 1.0],
            half_domain: false,
            hue_adjust: false,
            interpolation: Interpolation::Linear,
        }
    }

    /// Identity ramp of the given length.
    pub fn identity(size: usize) -> Self {
        let mut samples = Vec::with_capacity(size * 3);
        for i in 0..size {
            let v = i as f32 / (size - 1) as f32;
            samples.extend_from_slice(&[v, v, v]);
        }
        Self::new(samples)
    }

    /// Number of entries per channel.
    pub fn size(&self) -> usize {
        self.samples.len() / 3
    }

    /// One channel sample.
    #[inline]
    pub fn sample(&self, i: usize, ch: usize) -> f32 {
        self.samples[i * 3 + ch]
    }

    /// Size limits, domain ordering, half-domain table length.
    pub fn validate(&self) -> OpsResult<()> {
        let err = |reason: String| {
            Err(OpsError::InvalidParameters {
                op: "Lut1D",
                reason,
            })
        };
        let size = self.size();
        if self.samples.len() % 3 != 0 || size < 2 {
            return err(format!("need at least 2 RGB entries, got {}", self.samples.len()));
        }
        if size > MAX_LUT1D_SIZE {
            return err(format!("table length {size} exceeds {MAX_LUT1D_SIZE}"));
        }
        if self.half_domain && size != 65536 {
            return err(format!("half-domain tables must have 65536 entries, got {size}"));
        }
        if !self.half_domain && self.domain[0] >= self.domain[1] {
            return err(format!(
                "domain [{}, {}] is empty",
                self.domain[0], self.domain[1]
            ));
        }
        Ok(())
    }

    /// Samples match the identity ramp within 1e-5 absolute.
    pub fn is_identity(&self) -> bool {
        if self.half_domain || self.hue_adjust {
            return false;
        }
        let size = self.size();
        for i in 0..size {
            let ramp = self.domain[0]
                + (self.domain[1] - self.domain[0]) * i as f32 / (size - 1) as f32;
            for ch in 0..3 {
                if (self.sample(i, ch) - ramp).abs() > IDENTITY_TOLERANCE {
                    return false;
                }
            }
        }
        true
    }

    /// Hue adjust couples the channels.
    pub fn has_channel_crosstalk(&self) -> bool {
        self.hue_adjust
    }

    /// Strictly monotonic per channel (required for inversion).
    pub fn is_monotonic(&self) -> Result<(), usize> {
        let size = self.size();
        for ch in 0..3 {
            let increasing = self.sample(size - 1, ch) >= self.sample(0, ch);
            for i in 1..size {
                let a = self.sample(i - 1, ch);
                let b = self.sample(i, ch);
                let ok = if increasing { b > a } else { b < a };
                if !ok {
                    return Err(ch);
                }
            }
        }
        Ok(())
    }

    /// Resamples `self` through `next`: the fused LUT evaluates
    /// `next(self(x))` over `self`'s domain at the finer of the two sizes.
    ///
    /// Returns `None` when either table cannot be evaluated forward.
    pub fn compose(&self, next: &Lut1dOpData) -> Option<Lut1dOpData> {
        let size = self.size().max(next.size());
        let a = Lut1dKernel::new(self, Direction::Forward).ok()?;
        let b = Lut1dKernel::new(next, Direction::Forward).ok()?;
        let mut samples = Vec::with_capacity(size * 3);
        for i in 0..size {
            let x = self.domain[0]
                + (self.domain[1] - self.domain[0]) * i as f32 / (size - 1) as f32;
            let mut px = [x, x, x, 0.0];
            a.apply(&mut px);
            b.apply(&mut px);
            samples.extend_from_slice(&px[..3]);
        }
        Some(Lut1dOpData {
            samples: Arc::new(samples),
            domain: self.domain,
            half_domain: false,
            hue_adjust: false,
            interpolation: self.interpolation,
        })
    }

    /// Feeds canonical parameters to the hasher.
    pub fn hash_into(&self, h: &mut CacheIdHasher) {
        h.put_str("lut1d");
        h.put_f32s(&self.samples);
        h.put_f64(self.domain[0] as f64);
        h.put_f64(self.domain[1] as f64);
        h.put_bool(self.half_domain);
        h.put_bool(self.hue_adjust);
        h.put_str(self.interpolation.as_str());
    }
}

/// Finalized 1D LUT kernel.
#[derive(Debug, Clone)]
pub struct Lut1dKernel {
    samples: Arc<Vec<f32>>,
    size: usize,
    domain: [f32; 2],
    half_domain: bool,
    hue_adjust: bool,
    nearest: bool,
    inverse: bool,
    /// Per-channel decreasing flags, set when inverting descending tables.
    decreasing: [bool; 3],
}

impl Lut1dKernel {
    /// Builds the kernel; the inverse direction checks monotonicity.
    pub fn new(data: &Lut1dOpData, direction: Direction) -> OpsResult<Self> {
        let inverse = direction == Direction::Inverse;
        let mut decreasing = [false; 3];
        if inverse {
            if let Err(channel) = data.is_monotonic() {
                return Err(OpsError::NonInvertible1d { channel });
            }
            let size = data.size();
            for (ch, flag) in decreasing.iter_mut().enumerate() {
                *flag = data.sample(size - 1, ch) < data.sample(0, ch);
            }
        }
        Ok(Self {
            samples: Arc::clone(&data.samples),
            size: data.size(),
            domain: data.domain,
            half_domain: data.half_domain,
            hue_adjust: data.hue_adjust,
            nearest: data.interpolation == Interpolation::Nearest,
            inverse,
            decreasing,
        })
    }

    #[inline]
    fn sample(&self, i: usize, ch: usize) -> f32 {
        self.samples[i * 3 + ch]
    }

    /// Forward lookup of one value on one channel.
    #[inline]
    fn lookup(&self, v: f32, ch: usize) -> f32 {
        if self.half_domain {
            // Raw half bit pattern indexes the table directly.
            let idx = f16::from_f32(v).to_bits() as usize;
            return self.sample(idx.min(self.size - 1), ch);
        }
        let t = (v - self.domain[0]) / (self.domain[1] - self.domain[0]);
        let idx_f = t.clamp(0.0, 1.0) * (self.size - 1) as f32;
        if self.nearest {
            return self.sample(idx_f.round() as usize, ch);
        }
        let i0 = (idx_f.floor() as usize).min(self.size - 2);
        let frac = idx_f - i0 as f32;
        let a = self.sample(i0, ch);
        let b = self.sample(i0 + 1, ch);
        a + (b - a) * frac
    }

    /// Inverse lookup: binary search over the monotonic table, then
    /// interpolate the index.
    #[inline]
    fn lookup_inverse(&self, v: f32, ch: usize) -> f32 {
        let size = self.size;
        let dec = self.decreasing[ch];
        let first = self.sample(0, ch);
        let last = self.sample(size - 1, ch);
        let (lo_val, hi_val) = if dec { (last, first) } else { (first, last) };
        if v <= lo_val {
            let i = if dec { size - 1 } else { 0 };
            return self.index_to_domain(i as f32);
        }
        if v >= hi_val {
            let i = if dec { 0 } else { size - 1 };
            return self.index_to_domain(i as f32);
        }

        let mut lo = 0usize;
        let mut hi = size - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            let mv = self.sample(mid, ch);
            let go_right = if dec { mv > v } else { mv < v };
            if go_right {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let a = self.sample(lo, ch);
        let b = self.sample(hi, ch);
        let frac = if (b - a).abs() < f32::EPSILON {
            0.0
        } else {
            (v - a) / (b - a)
        };
        self.index_to_domain(lo as f32 + frac)
    }

    #[inline]
    fn index_to_domain(&self, idx: f32) -> f32 {
        self.domain[0] + (self.domain[1] - self.domain[0]) * idx / (self.size - 1) as f32
    }

    /// Applies the LUT to one RGBA pixel; alpha passes through.
    #[inline]
    pub fn apply(&self, px: &mut [f32; 4]) {
        if self.hue_adjust {
            let rgb = [px[0], px[1], px[2]];
            let out = self.apply_hue_adjust(rgb);
            px[0] = out[0];
            px[1] = out[1];
            px[2] = out[2];
            return;
        }
        for ch in 0..3 {
            px[ch] = if self.inverse {
                self.lookup_inverse(px[ch], ch)
            } else {
                self.lookup(px[ch], ch)
            };
        }
    }

    /// ACES hue-preserving lookup: LUT the min and max channels, rebuild
    /// the middle one from the original hue factor.
    fn apply_hue_adjust(&self, rgb: [f32; 3]) -> [f32; 3] {
        // Sort channel indices by value.
        let mut idx = [0usize, 1, 2];
        idx.sort_by(|&a, &b| rgb[a].partial_cmp(&rgb[b]).unwrap_or(std::cmp::Ordering::Equal));
        let [min_i, mid_i, max_i] = idx;

        let orig_chroma = rgb[max_i] - rgb[min_i];
        let hue_factor = if orig_chroma == 0.0 {
            0.0
        } else {
            (rgb[mid_i] - rgb[min_i]) / orig_chroma
        };

        let (new_min, new_max) = if self.inverse {
            (
                self.lookup_inverse(rgb[min_i], min_i),
                self.lookup_inverse(rgb[max_i], max_i),
            )
        } else {
            (self.lookup(rgb[min_i], min_i), self.lookup(rgb[max_i], max_i))
        };
        let new_mid = new_min + hue_factor * (new_max - new_min);

        let mut out = [0.0f32; 3];
        out[min_i] = new_min;
        out[mid_i] = new_mid;
        out[max_i] = new_max;
        out
    }
}
