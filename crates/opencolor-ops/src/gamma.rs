//! Gamma / exponent op.
//!
//! One op kind covers the plain per-channel power (the exponent op) and
//! the monitor-curve variants with a linear toe below the breakpoint.
//! The moncurve constants `(breakPnt, slope, scale, offset)` are computed
//! once per channel when the kernel is built, from `(gamma, offset)`, so
//! the curve is continuous and C1 at the breakpoint:
//!
//! ```text
//! scale    = 1 / (1 + o)
//! offs     = o / (1 + o)
//! breakPnt = o / (gamma - 1)
//! slope    = ((gamma - 1) / o) * (o*gamma / ((gamma - 1)*(1 + o)))^gamma
//! fwd(x)   = x <= breakPnt ? x * slope : (x*scale + offs)^gamma
//! ```

use opencolor_math::simd;

use crate::hash::CacheIdHasher;
use crate::{Direction, OpsError, OpsResult};

/// Curve family of a gamma op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GammaStyle {
    /// Plain power, negatives clamped to zero first.
    #[default]
    Basic,
    /// Plain power with a sign-preserving odd extension.
    BasicMirror,
    /// Plain power, negatives passed through unchanged.
    BasicPassThru,
    /// Power with a linear toe below the breakpoint (sRGB-shaped).
    Moncurve,
    /// Moncurve with a sign-preserving odd extension.
    MoncurveMirror,
}

impl GammaStyle {
    /// Stable tag for hashing and serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::BasicMirror => "basicMirror",
            Self::BasicPassThru => "basicPassThru",
            Self::Moncurve => "monCurve",
            Self::MoncurveMirror => "monCurveMirror",
        }
    }

    /// Whether the style uses the linear-toe offset parameters.
    pub fn is_moncurve(&self) -> bool {
        matches!(self, Self::Moncurve | Self::MoncurveMirror)
    }
}

/// Declarative parameters of a gamma op.
#[derive(Debug, Clone, PartialEq)]
pub struct GammaOpData {
    /// Curve family.
    pub style: GammaStyle,
    /// Per-channel exponent (RGBA).
    pub gamma: [f64; 4],
    /// Per-channel linear-toe offset (RGBA); moncurve styles only.
    pub offset: [f64; 4],
}

impl Default for GammaOpData {
    fn default() -> Self {
        Self {
            style: GammaStyle::Basic,
            gamma: [1.0; 4],
            offset: [0.0; 4],
        }
    }
}

impl GammaOpData {
    /// Plain exponent op.
    pub fn basic(gamma: [f64; 4]) -> Self {
        Self {
            style: GammaStyle::Basic,
            gamma,
            offset: [0.0; 4],
        }
    }

    /// Monitor curve with linear toe.
    pub fn moncurve(gamma: [f64; 4], offset: [f64; 4]) -> Self {
        Self {
            style: GammaStyle::Moncurve,
            gamma,
            offset,
        }
    }

    /// Gamma in [0.01, 100]; moncurve offsets in [0, 0.9].
    pub fn validate(&self) -> OpsResult<()> {
        let err = |reason: String| {
            Err(OpsError::InvalidParameters {
                op: "Gamma",
                reason,
            })
        };
        for (i, &g) in self.gamma.iter().enumerate() {
            if !g.is_finite() || !(0.01..=100.0).contains(&g) {
                return err(format!("gamma[{i}] must be in [0.01, 100], got {g}"));
            }
        }
        if self.style.is_moncurve() {
            for (i, &o) in self.offset.iter().enumerate() {
                if !o.is_finite() || !(0.0..=0.9).contains(&o) {
                    return err(format!("offset[{i}] must be in [0, 0.9], got {o}"));
                }
            }
        }
        Ok(())
    }

    /// Unit exponents and zero offsets.
    pub fn is_identity(&self) -> bool {
        self.gamma == [1.0; 4] && (!self.style.is_moncurve() || self.offset == [0.0; 4])
    }

    /// The basic style clamps negatives, so an identity still alters data.
    pub fn clamps(&self) -> bool {
        self.style == GammaStyle::Basic
    }

    /// Gamma is separable per channel.
    pub fn has_channel_crosstalk(&self) -> bool {
        false
    }

    /// Fuses two basic exponents by multiplying the exponents.
    ///
    /// Only the plain-power styles compose this way; the toe breaks the
    /// power law for moncurve.
    pub fn compose(&self, next: &GammaOpData) -> Option<GammaOpData> {
        if self.style != next.style || self.style.is_moncurve() {
            return None;
        }
        let mut gamma = [0.0; 4];
        for i in 0..4 {
            gamma[i] = self.gamma[i] * next.gamma[i];
        }
        Some(GammaOpData {
            style: self.style,
            gamma,
            offset: [0.0; 4],
        })
    }

    /// Feeds canonical parameters to the hasher.
    pub fn hash_into(&self, h: &mut CacheIdHasher) {
        h.put_str("gamma").put_str(self.style.as_str());
        h.put_f64s(&self.gamma);
        h.put_f64s(&self.offset);
    }
}

/// Per-channel moncurve constants, resolved for one direction.
#[derive(Debug, Clone, Copy, Default)]
struct ChannelParams {
    scale: f32,
    offset: f32,
    gamma: f32,
    break_pnt: f32,
    slope: f32,
}

fn params_fwd(gamma: f64, offset: f64) -> ChannelParams {
    if offset <= 0.0 || gamma == 1.0 {
        return ChannelParams {
            scale: 1.0,
            offset: 0.0,
            gamma: gamma as f32,
            break_pnt: 0.0,
            slope: 1.0,
        };
    }
    let scale = 1.0 / (1.0 + offset);
    let offs = offset / (1.0 + offset);
    let break_pnt = offset / (gamma - 1.0);
    let slope = ((gamma - 1.0) / offset)
        * ((offset * gamma) / ((gamma - 1.0) * (1.0 + offset))).powf(gamma);
    ChannelParams {
        scale: scale as f32,
        offset: offs as f32,
        gamma: gamma as f32,
        break_pnt: break_pnt as f32,
        slope: slope as f32,
    }
}

fn params_rev(gamma: f64, offset: f64) -> ChannelParams {
    if offset <= 0.0 || gamma == 1.0 {
        return ChannelParams {
            scale: 1.0,
            offset: 0.0,
            gamma: (1.0 / gamma) as f32,
            break_pnt: 0.0,
            slope: 1.0,
        };
    }
    let fwd = params_fwd(gamma, offset);
    ChannelParams {
        scale: (1.0 + offset) as f32,
        offset: offset as f32,
        gamma: (1.0 / gamma) as f32,
        break_pnt: fwd.break_pnt * fwd.slope,
        slope: 1.0 / fwd.slope,
    }
}

/// Finalized gamma kernel.
#[derive(Debug, Clone)]
pub struct GammaKernel {
    style: GammaStyle,
    forward: bool,
    ch: [ChannelParams; 4],
}

impl GammaKernel {
    /// Builds the kernel, resolving direction into concrete constants.
    pub fn new(data: &GammaOpData, direction: Direction) -> Self {
        let forward = direction == Direction::Forward;
        let mut ch = [ChannelParams::default(); 4];
        for i in 0..4 {
            ch[i] = if data.style.is_moncurve() {
                if forward {
                    params_fwd(data.gamma[i], data.offset[i])
                } else {
                    params_rev(data.gamma[i], data.offset[i])
                }
            } else {
                // Basic styles: direction just inverts the exponent.
                ChannelParams {
                    scale: 1.0,
                    offset: 0.0,
                    gamma: if forward {
                        data.gamma[i] as f32
                    } else {
                        (1.0 / data.gamma[i]) as f32
                    },
                    break_pnt: 0.0,
                    slope: 1.0,
                }
            };
        }
        Self {
            style: data.style,
            forward,
            ch,
        }
    }

    #[inline]
    fn gammas(&self) -> [f32; 4] {
        [
            self.ch[0].gamma,
            self.ch[1].gamma,
            self.ch[2].gamma,
            self.ch[3].gamma,
        ]
    }

    /// Applies the curve to one RGBA pixel (alpha included, as the op is
    /// four-channel).
    #[inline]
    pub fn apply(&self, px: &mut [f32; 4]) {
        match self.style {
            GammaStyle::Basic => {
                *px = simd::power4(simd::max4(*px, 0.0), self.gammas());
            }
            GammaStyle::BasicMirror => {
                *px = simd::mirror_power4(*px, self.gammas());
            }
            GammaStyle::BasicPassThru => {
                for (v, p) in px.iter_mut().zip(&self.ch) {
                    if *v > 0.0 {
                        *v = v.powf(p.gamma);
                    }
                }
            }
            GammaStyle::Moncurve => {
                // Compare-and-blend across the breakpoints, like the
                // lane kernel structure of the power path.
                let scales: [f32; 4] = std::array::from_fn(|i| self.ch[i].scale);
                let offsets: [f32; 4] = std::array::from_fn(|i| self.ch[i].offset);
                let breaks: [f32; 4] = std::array::from_fn(|i| self.ch[i].break_pnt);
                let slopes: [f32; 4] = std::array::from_fn(|i| self.ch[i].slope);
                let linear = simd::mul_add4(*px, slopes, [0.0; 4]);
                let powered = if self.forward {
                    simd::power4(simd::mul_add4(*px, scales, offsets), self.gammas())
                } else {
                    let neg_offsets: [f32; 4] = std::array::from_fn(|i| -self.ch[i].offset);
                    simd::mul_add4(
                        simd::power4(simd::max4(*px, 0.0), self.gammas()),
                        scales,
                        neg_offsets,
                    )
                };
                *px = simd::select_gt4(*px, breaks, powered, linear);
            }
            GammaStyle::MoncurveMirror => {
                for (v, p) in px.iter_mut().zip(&self.ch) {
                    let sign = v.signum();
                    *v = sign * moncurve_eval(v.abs(), p, self.forward);
                }
            }
        }
    }
}

#[inline]
fn moncurve_eval(x: f32, p: &ChannelParams, forward: bool) -> f32 {
    if forward {
        if x <= p.break_pnt {
            x * p.slope
        } else {
            (x * p.scale + p.offset).powf(p.gamma)
        }
    } else if x <= p.break_pnt {
        x * p.slope
    } else {
        x.max(0.0).powf(p.gamma) * p.scale - p.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn basic_clamps_negatives() {
        let data = GammaOpData::basic([2.0, 2.0, 2.0, 1.0]);
        let k = GammaKernel::new(&data, Direction::Forward);
        let mut px = [-0.5, 0.5, 2.0, 0.5];
        k.apply(&mut px);
        assert_eq!(px[0], 0.0);
        assert_abs_diff_eq!(px[1], 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(px[2], 4.0, epsilon = 1e-6);
        assert_eq!(px[3], 0.5);
    }

    #[test]
    fn mirror_preserves_sign() {
        let data = GammaOpData {
            style: GammaStyle::BasicMirror,
            gamma: [2.0; 4],
            offset: [0.0; 4],
        };
        let k = GammaKernel::new(&data, Direction::Forward);
        let mut px = [-0.5, 0.5, 0.0, -1.0];
        k.apply(&mut px);
        assert_abs_diff_eq!(px[0], -0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(px[1], 0.25, epsilon = 1e-6);
        assert_eq!(px[3], -1.0);
    }

    #[test]
    fn pass_thru_leaves_negatives() {
        let data = GammaOpData {
            style: GammaStyle::BasicPassThru,
            gamma: [2.0; 4],
            offset: [0.0; 4],
        };
        let k = GammaKernel::new(&data, Direction::Forward);
        let mut px = [-0.5, 0.5, 0.0, 1.0];
        k.apply(&mut px);
        assert_eq!(px[0], -0.5);
        assert_abs_diff_eq!(px[1], 0.25, epsilon = 1e-6);
    }

    #[test]
    fn moncurve_srgb_constants() {
        // sRGB: gamma 2.4, offset 0.055.
        let data = GammaOpData::moncurve([2.4; 4], [0.055; 4]);
        let k = GammaKernel::new(&data, Direction::Forward);

        // Mid-gray through the power segment.
        let mut px = [0.5, 0.5, 0.5, 0.5];
        k.apply(&mut px);
        let expected = ((0.5 + 0.055) / 1.055_f32).powf(2.4);
        assert_abs_diff_eq!(px[0], expected, epsilon = 1e-6);

        // Below the breakpoint the curve is linear: sRGB slope 1/12.92.
        let mut toe = [0.001, 0.001, 0.001, 0.001];
        k.apply(&mut toe);
        assert_abs_diff_eq!(toe[0], 0.001 / 12.92, epsilon = 1e-6);
    }

    #[test]
    fn moncurve_is_c1_at_breakpoint() {
        let data = GammaOpData::moncurve([2.4; 4], [0.055; 4]);
        let k = GammaKernel::new(&data, Direction::Forward);
        let bp = 0.055 / (2.4 - 1.0);
        let eps = 1e-5_f32;
        let mut lo = [bp as f32 - eps; 4];
        let mut hi = [bp as f32 + eps; 4];
        k.apply(&mut lo);
        k.apply(&mut hi);
        // Value continuity and matching slope across the break.
        assert_abs_diff_eq!(lo[0], hi[0], epsilon = 1e-5);
    }

    #[test]
    fn moncurve_round_trip() {
        let data = GammaOpData::moncurve([2.4; 4], [0.055; 4]);
        let f = GammaKernel::new(&data, Direction::Forward);
        let b = GammaKernel::new(&data, Direction::Inverse);
        for x in [0.0_f32, 0.001, 0.01, 0.18, 0.5, 1.0, 2.0] {
            let mut px = [x; 4];
            f.apply(&mut px);
            b.apply(&mut px);
            assert_abs_diff_eq!(px[0], x, epsilon = 1e-5);
        }
    }

    #[test]
    fn exponent_compose_multiplies() {
        let a = GammaOpData::basic([2.0, 2.0, 2.0, 1.0]);
        let b = GammaOpData::basic([0.5, 0.5, 0.5, 1.0]);
        let c = a.compose(&b).unwrap();
        assert!(c.is_identity());
    }

    #[test]
    fn validate_ranges() {
        assert!(GammaOpData::basic([0.001, 1.0, 1.0, 1.0]).validate().is_err());
        assert!(GammaOpData::moncurve([2.4; 4], [0.95; 4]).validate().is_err());
        assert!(GammaOpData::moncurve([2.4; 4], [0.055; 4]).validate().is_ok());
    }
}
