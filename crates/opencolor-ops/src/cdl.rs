//! ASC CDL op (slope / offset / power / saturation).
//!
//! Implements the ASC CDL v1.2 formula
//!
//! ```text
//! out = (in * slope + offset) ^ power
//! ```
//!
//! followed by a saturation blend using the config's luma coefficients.
//! Two style families encode the clamp behavior: `V1_2` clamps to [0, 1]
//! around the power, `NoClamp` extends the power oddly through zero and
//! never clamps.

use crate::hash::CacheIdHasher;
use crate::{Direction, OpsError, OpsResult, DEFAULT_LUMA};

/// Clamp family of a CDL op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CdlStyle {
    /// ASC CDL v1.2: clamp to [0, 1] before and after the power.
    #[default]
    V1_2,
    /// Extended range: sign-preserving power, no clamping.
    NoClamp,
}

impl CdlStyle {
    /// Stable tag for hashing and serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1_2 => "v1.2",
            Self::NoClamp => "noClamp",
        }
    }
}

/// Declarative parameters of a CDL op.
#[derive(Debug, Clone, PartialEq)]
pub struct CdlOpData {
    /// Multiplicative factor per channel.
    pub slope: [f64; 3],
    /// Additive term per channel.
    pub offset: [f64; 3],
    /// Power per channel.
    pub power: [f64; 3],
    /// Saturation (1.0 = unchanged).
    pub saturation: f64,
    /// Clamp family.
    pub style: CdlStyle,
    /// Luma coefficients for the saturation blend.
    pub luma: [f64; 3],
}

impl Default for CdlOpData {
    fn default() -> Self {
        Self {
            slope: [1.0; 3],
            offset: [0.0; 3],
            power: [1.0; 3],
            saturation: 1.0,
            style: CdlStyle::default(),
            luma: DEFAULT_LUMA,
        }
    }
}

impl CdlOpData {
    /// CDL with the given SOP and saturation, default style and luma.
    pub fn new(slope: [f64; 3], offset: [f64; 3], power: [f64; 3], saturation: f64) -> Self {
        Self {
            slope,
            offset,
            power,
            saturation,
            ..Default::default()
        }
    }

    /// power > 0, slope >= 0, saturation >= 0.
    pub fn validate(&self) -> OpsResult<()> {
        let err = |reason: String| {
            Err(OpsError::InvalidParameters {
                op: "CDL",
                reason,
            })
        };
        for (i, &p) in self.power.iter().enumerate() {
            if !(p > 0.0) || !p.is_finite() {
                return err(format!("power[{i}] must be > 0, got {p}"));
            }
        }
        for (i, &s) in self.slope.iter().enumerate() {
            if !(s >= 0.0) || !s.is_finite() {
                return err(format!("slope[{i}] must be >= 0, got {s}"));
            }
        }
        if !(self.saturation >= 0.0) || !self.saturation.is_finite() {
            return err(format!("saturation must be >= 0, got {}", self.saturation));
        }
        if !self.offset.iter().all(|v| v.is_finite()) {
            return err("offset must be finite".into());
        }
        Ok(())
    }

    /// Unit SOP and saturation.
    ///
    /// Note that a V1_2 identity still clamps; the optimizer replaces it
    /// with a Range(0,1 -> 0,1) rather than dropping it.
    pub fn is_identity(&self) -> bool {
        self.slope == [1.0; 3]
            && self.offset == [0.0; 3]
            && self.power == [1.0; 3]
            && self.saturation == 1.0
    }

    /// True while the V1_2 clamp is semantically active for an identity.
    pub fn clamps(&self) -> bool {
        self.style == CdlStyle::V1_2
    }

    /// Saturation away from 1.0 mixes channels.
    pub fn has_channel_crosstalk(&self) -> bool {
        self.saturation != 1.0
    }

    /// The inverse of a clamping style is only well-defined on the image
    /// of the forward transform.
    pub fn inverse_is_lossy(&self) -> bool {
        self.style == CdlStyle::V1_2
    }

    /// Feeds canonical parameters to the hasher.
    pub fn hash_into(&self, h: &mut CacheIdHasher) {
        h.put_str("cdl").put_str(self.style.as_str());
        h.put_f64s(&self.slope);
        h.put_f64s(&self.offset);
        h.put_f64s(&self.power);
        h.put_f64(self.saturation);
        h.put_f64s(&self.luma);
    }
}

/// Finalized CDL kernel.
#[derive(Debug, Clone)]
pub struct CdlKernel {
    slope: [f32; 3],
    offset: [f32; 3],
    power: [f32; 3],
    saturation: f32,
    luma: [f32; 3],
    style: CdlStyle,
    forward: bool,
}

impl CdlKernel {
    /// Builds the kernel for a direction.
    pub fn new(data: &CdlOpData, direction: Direction) -> Self {
        Self {
            slope: data.slope.map(|v| v as f32),
            offset: data.offset.map(|v| v as f32),
            power: data.power.map(|v| v as f32),
            saturation: data.saturation as f32,
            luma: data.luma.map(|v| v as f32),
            style: data.style,
            forward: direction == Direction::Forward,
        }
    }

    /// Applies the CDL to one RGBA pixel; alpha passes through.
    #[inline]
    pub fn apply(&self, px: &mut [f32; 4]) {
        let rgb = [px[0], px[1], px[2]];
        let out = if self.forward {
            self.apply_fwd(rgb)
        } else {
            self.apply_rev(rgb)
        };
        px[0] = out[0];
        px[1] = out[1];
        px[2] = out[2];
    }

    #[inline]
    fn apply_fwd(&self, rgb: [f32; 3]) -> [f32; 3] {
        let mut out = [0.0f32; 3];
        for i in 0..3 {
            let v = rgb[i] * self.slope[i] + self.offset[i];
            out[i] = match self.style {
                CdlStyle::V1_2 => v.clamp(0.0, 1.0).powf(self.power[i]).clamp(0.0, 1.0),
                CdlStyle::NoClamp => signed_pow(v, self.power[i]),
            };
        }
        out = self.saturate(out, self.saturation);
        if self.style == CdlStyle::V1_2 {
            for v in &mut out {
                *v = v.clamp(0.0, 1.0);
            }
        }
        out
    }

    #[inline]
    fn apply_rev(&self, rgb: [f32; 3]) -> [f32; 3] {
        // Undo saturation first, then SOP in reverse order.
        let mut v = rgb;
        if self.style == CdlStyle::V1_2 {
            for c in &mut v {
                *c = c.clamp(0.0, 1.0);
            }
        }
        if self.saturation != 0.0 {
            v = self.saturate(v, 1.0 / self.saturation);
        }
        let mut out = [0.0f32; 3];
        for i in 0..3 {
            let p = match self.style {
                CdlStyle::V1_2 => v[i].clamp(0.0, 1.0).powf(1.0 / self.power[i]),
                CdlStyle::NoClamp => signed_pow(v[i], 1.0 / self.power[i]),
            };
            out[i] = if self.slope[i] != 0.0 {
                (p - self.offset[i]) / self.slope[i]
            } else {
                0.0
            };
        }
        if self.style == CdlStyle::V1_2 {
            for c in &mut out {
                *c = c.clamp(0.0, 1.0);
            }
        }
        out
    }

    #[inline]
    fn saturate(&self, rgb: [f32; 3], sat: f32) -> [f32; 3] {
        if sat == 1.0 {
            return rgb;
        }
        let luma = rgb[0] * self.luma[0] + rgb[1] * self.luma[1] + rgb[2] * self.luma[2];
        [
            luma + (rgb[0] - luma) * sat,
            luma + (rgb[1] - luma) * sat,
            luma + (rgb[2] - luma) * sat,
        ]
    }
}

/// Sign-preserving power for the no-clamp styles.
#[inline]
fn signed_pow(v: f32, p: f32) -> f32 {
    if v >= 0.0 {
        v.powf(p)
    } else {
        -(-v).powf(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn identity_params() {
        let cdl = CdlOpData::default();
        assert!(cdl.is_identity());
        assert!(cdl.validate().is_ok());
        assert!(!cdl.has_channel_crosstalk());
    }

    #[test]
    fn bad_power_rejected() {
        let cdl = CdlOpData {
            power: [0.0, 1.0, 1.0],
            ..Default::default()
        };
        assert!(cdl.validate().is_err());
    }

    #[test]
    fn asc_v1_2_forward() {
        // slope (1.2, 1.3, 1.4), everything else unit: 0.9 * 1.4 clamps.
        let cdl = CdlOpData::new([1.2, 1.3, 1.4], [0.0; 3], [1.0; 3], 1.0);
        let k = CdlKernel::new(&cdl, Direction::Forward);
        let mut px = [0.1, 0.3, 0.9, 0.5];
        k.apply(&mut px);
        assert_abs_diff_eq!(px[0], 0.12, epsilon = 1e-6);
        assert_abs_diff_eq!(px[1], 0.39, epsilon = 1e-6);
        assert_abs_diff_eq!(px[2], 1.0, epsilon = 1e-6);
        assert_eq!(px[3], 0.5);
    }

    #[test]
    fn saturation_to_luma() {
        let cdl = CdlOpData {
            saturation: 0.0,
            ..Default::default()
        };
        let k = CdlKernel::new(&cdl, Direction::Forward);
        let mut px = [1.0, 0.0, 0.0, 0.0];
        k.apply(&mut px);
        let lum = DEFAULT_LUMA[0] as f32;
        for i in 0..3 {
            assert_abs_diff_eq!(px[i], lum, epsilon = 1e-6);
        }
    }

    #[test]
    fn no_clamp_round_trip() {
        let cdl = CdlOpData {
            slope: [1.2, 0.9, 1.1],
            offset: [0.01, -0.02, 0.03],
            power: [1.1, 0.95, 1.05],
            saturation: 1.1,
            style: CdlStyle::NoClamp,
            ..Default::default()
        };
        let f = CdlKernel::new(&cdl, Direction::Forward);
        let b = CdlKernel::new(&cdl, Direction::Inverse);
        let mut px = [0.3, 0.5, 0.4, 1.0];
        let orig = px;
        f.apply(&mut px);
        b.apply(&mut px);
        for i in 0..3 {
            assert_abs_diff_eq!(px[i], orig[i], epsilon = 1e-4);
        }
    }

    #[test]
    fn no_clamp_negative_mirrors() {
        let cdl = CdlOpData {
            offset: [-0.1; 3],
            power: [2.0; 3],
            style: CdlStyle::NoClamp,
            ..Default::default()
        };
        let k = CdlKernel::new(&cdl, Direction::Forward);
        let mut px = [0.05, 0.05, 0.05, 0.0];
        k.apply(&mut px);
        // (0.05 - 0.1)^2 with sign = -0.0025
        assert_abs_diff_eq!(px[0], -0.0025, epsilon = 1e-6);
    }

    #[test]
    fn lossy_flag_tracks_style() {
        assert!(CdlOpData::default().inverse_is_lossy());
        let nc = CdlOpData {
            style: CdlStyle::NoClamp,
            ..Default::default()
        };
        assert!(!nc.inverse_is_lossy());
    }
}
