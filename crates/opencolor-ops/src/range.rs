//! Range op: piecewise-linear remap with optional open ends.
//!
//! Depending on which bounds are present, a range acts as a pure
//! scale+offset (both ends closed), a one-sided clamp (one end open), or
//! an identity (all ends open). The optimizer tightens adjacent ranges
//! and promotes fully closed ranges to matrices so they can fuse.

use opencolor_math::simd;

use crate::hash::CacheIdHasher;
use crate::matrix::MatrixOpData;
use crate::{Direction, OpsError, OpsResult};

/// Declarative parameters of a range op.
///
/// `None` means the corresponding end is open. Bounds come in in/out
/// pairs: a minimum input bound without a minimum output bound (or vice
/// versa) fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RangeOpData {
    /// Lower input bound.
    pub min_in: Option<f64>,
    /// Upper input bound.
    pub max_in: Option<f64>,
    /// Lower output bound.
    pub min_out: Option<f64>,
    /// Upper output bound.
    pub max_out: Option<f64>,
}

impl RangeOpData {
    /// Fully specified range.
    pub fn new(min_in: f64, max_in: f64, min_out: f64, max_out: f64) -> Self {
        Self {
            min_in: Some(min_in),
            max_in: Some(max_in),
            min_out: Some(min_out),
            max_out: Some(max_out),
        }
    }

    /// The [0,1] clamp used when replacing clamping identities.
    pub fn clamp01() -> Self {
        Self::new(0.0, 1.0, 0.0, 1.0)
    }

    /// Bounds must be paired, ordered and finite.
    pub fn validate(&self) -> OpsResult<()> {
        let err = |reason: &str| {
            Err(OpsError::InvalidParameters {
                op: "Range",
                reason: reason.into(),
            })
        };
        if self.min_in.is_some() != self.min_out.is_some() {
            return err("minimum bounds must be specified on both sides");
        }
        if self.max_in.is_some() != self.max_out.is_some() {
            return err("maximum bounds must be specified on both sides");
        }
        for v in [self.min_in, self.max_in, self.min_out, self.max_out]
            .into_iter()
            .flatten()
        {
            if !v.is_finite() {
                return err("bounds must be finite");
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_in, self.max_in) {
            if lo >= hi {
                return err("minIn must be less than maxIn");
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_out, self.max_out) {
            if lo >= hi {
                return err("minOut must be less than maxOut");
            }
        }
        Ok(())
    }

    /// All ends open.
    pub fn is_identity(&self) -> bool {
        self.min_in.is_none() && self.max_in.is_none()
    }

    /// True when this range clamps nothing and only scales/offsets.
    pub fn is_closed(&self) -> bool {
        self.min_in.is_some() && self.max_in.is_some()
    }

    /// Ranges are separable per channel.
    pub fn has_channel_crosstalk(&self) -> bool {
        false
    }

    /// Scale and offset of the linear part, for the given direction.
    pub fn scale_offset(&self, direction: Direction) -> (f64, f64) {
        let (min_in, max_in, min_out, max_out) = match direction {
            Direction::Forward => (self.min_in, self.max_in, self.min_out, self.max_out),
            Direction::Inverse => (self.min_out, self.max_out, self.min_in, self.max_in),
        };
        match (min_in, max_in, min_out, max_out) {
            (Some(mi), Some(ma), Some(mo), Some(mx)) => {
                let scale = (mx - mo) / (ma - mi);
                (scale, mo - mi * scale)
            }
            (Some(mi), None, Some(mo), None) => (1.0, mo - mi),
            (None, Some(ma), None, Some(mx)) => (1.0, mx - ma),
            _ => (1.0, 0.0),
        }
    }

    /// Output clamp bounds for the given direction.
    pub fn clamp_bounds(&self, direction: Direction) -> (Option<f64>, Option<f64>) {
        match direction {
            Direction::Forward => (self.min_out, self.max_out),
            Direction::Inverse => (self.min_in, self.max_in),
        }
    }

    /// The range flipped for inverse evaluation.
    pub fn inverted(&self) -> RangeOpData {
        RangeOpData {
            min_in: self.min_out,
            max_in: self.max_out,
            min_out: self.min_in,
            max_out: self.max_in,
        }
    }

    /// Tightens `self` followed by `next` into a single range.
    ///
    /// The output interval of the first is intersected with the input
    /// interval of the second, then mapped through the second's line.
    pub fn compose(&self, next: &RangeOpData) -> RangeOpData {
        let (s2, o2) = next.scale_offset(Direction::Forward);
        let map = |v: f64| v * s2 + o2;

        // Effective input bounds: ours, plus next's input bounds pulled
        // back through our line.
        let (s1, o1) = self.scale_offset(Direction::Forward);
        let pull = |v: f64| if s1 != 0.0 { (v - o1) / s1 } else { v };

        let min_in = match (self.min_in, next.min_in) {
            (Some(a), Some(b)) => Some(a.max(pull(b))),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(pull(b)),
            (None, None) => None,
        };
        let max_in = match (self.max_in, next.max_in) {
            (Some(a), Some(b)) => Some(a.min(pull(b))),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(pull(b)),
            (None, None) => None,
        };

        let fwd = |v: f64| map(v * s1 + o1);
        RangeOpData {
            min_in,
            max_in,
            min_out: min_in.map(fwd),
            max_out: max_in.map(fwd),
        }
    }

    /// Equivalent matrix when both ends are closed and the clamp is the
    /// image of the line (i.e. the clamp never alters in-domain values).
    pub fn as_matrix(&self) -> Option<MatrixOpData> {
        if !self.is_closed() {
            return None;
        }
        let (scale, offset) = self.scale_offset(Direction::Forward);
        let mut m = MatrixOpData::from_diagonal([scale, scale, scale, 1.0]);
        m.matrix.offset = [offset, offset, offset, 0.0];
        Some(m)
    }

    /// Feeds canonical parameters to the hasher.
    pub fn hash_into(&self, h: &mut CacheIdHasher) {
        h.put_str("range");
        for v in [self.min_in, self.max_in, self.min_out, self.max_out] {
            match v {
                Some(x) => {
                    h.put_bool(true).put_f64(x);
                }
                None => {
                    h.put_bool(false);
                }
            }
        }
    }
}

/// Finalized range kernel.
///
/// The constants are laid out as 4-lane vectors with an alpha lane that
/// leaves the channel untouched, so one SIMD pass covers a whole RGBA
/// pixel.
#[derive(Debug, Clone)]
pub struct RangeKernel {
    scale: [f32; 4],
    offset: [f32; 4],
    lo: [f32; 4],
    hi: [f32; 4],
}

impl RangeKernel {
    /// Builds the kernel for a direction.
    pub fn new(data: &RangeOpData, direction: Direction) -> Self {
        let (scale, offset) = data.scale_offset(direction);
        let (lo, hi) = data.clamp_bounds(direction);
        let s = scale as f32;
        let o = offset as f32;
        let lo = lo.map(|v| v as f32).unwrap_or(f32::NEG_INFINITY);
        let hi = hi.map(|v| v as f32).unwrap_or(f32::INFINITY);
        Self {
            scale: [s, s, s, 1.0],
            offset: [o, o, o, 0.0],
            lo: [lo, lo, lo, f32::NEG_INFINITY],
            hi: [hi, hi, hi, f32::INFINITY],
        }
    }

    /// Applies the remap to RGB; alpha passes through.
    #[inline]
    pub fn apply(&self, px: &mut [f32; 4]) {
        let v = simd::mul_add4(*px, self.scale, self.offset);
        *px = simd::min4v(simd::max4v(v, self.lo), self.hi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn open_range_is_identity() {
        let r = RangeOpData::default();
        assert!(r.is_identity());
        assert!(r.validate().is_ok());
        let k = RangeKernel::new(&r, Direction::Forward);
        let mut px = [0.3, -1.0, 2.0, 0.5];
        k.apply(&mut px);
        assert_eq!(px, [0.3, -1.0, 2.0, 0.5]);
    }

    #[test]
    fn unpaired_bound_rejected() {
        let r = RangeOpData {
            min_in: Some(0.0),
            ..Default::default()
        };
        assert!(r.validate().is_err());
    }

    #[test]
    fn closed_range_scales_and_clamps() {
        let r = RangeOpData::new(0.0, 1.0, 0.0, 2.0);
        let k = RangeKernel::new(&r, Direction::Forward);
        let mut px = [0.5, 1.5, -0.5, 1.0];
        k.apply(&mut px);
        assert_abs_diff_eq!(px[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(px[1], 2.0, epsilon = 1e-6); // clamped at maxOut
        assert_abs_diff_eq!(px[2], 0.0, epsilon = 1e-6); // clamped at minOut
        assert_eq!(px[3], 1.0);
    }

    #[test]
    fn one_sided_clamp() {
        let r = RangeOpData {
            min_in: Some(0.0),
            min_out: Some(0.0),
            ..Default::default()
        };
        assert!(r.validate().is_ok());
        let k = RangeKernel::new(&r, Direction::Forward);
        let mut px = [-0.5, 0.5, 3.0, 0.0];
        k.apply(&mut px);
        assert_eq!(px[0], 0.0);
        assert_eq!(px[1], 0.5);
        assert_eq!(px[2], 3.0);
    }

    #[test]
    fn inverse_undoes_forward_inside_domain() {
        let r = RangeOpData::new(0.1, 0.9, 0.0, 1.0);
        let f = RangeKernel::new(&r, Direction::Forward);
        let b = RangeKernel::new(&r, Direction::Inverse);
        let mut px = [0.5, 0.2, 0.8, 1.0];
        let orig = px;
        f.apply(&mut px);
        b.apply(&mut px);
        for i in 0..3 {
            assert_abs_diff_eq!(px[i], orig[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn compose_tightens() {
        let a = RangeOpData::new(0.0, 1.0, 0.0, 1.0);
        let b = RangeOpData::new(0.25, 0.75, 0.25, 0.75);
        let c = a.compose(&b);
        assert_eq!(c.min_in, Some(0.25));
        assert_eq!(c.max_in, Some(0.75));
    }

    #[test]
    fn matrix_promotion_matches() {
        let r = RangeOpData::new(0.0, 1.0, -0.5, 1.5);
        let m = r.as_matrix().unwrap();
        let (s, o) = r.scale_offset(Direction::Forward);
        assert_abs_diff_eq!(s, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(o, -0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(m.matrix.m[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.matrix.offset[0], -0.5, epsilon = 1e-12);
    }
}
