//! Log op: affine-wrapped logarithm, separable per channel.
//!
//! The general form covers plain log2/log10, their anti-logs, and the
//! camera-style lin-to-log curves:
//!
//! ```text
//! log side:  y = logSideSlope * log_base(linSideSlope * x + linSideOffset) + logSideOffset
//! lin side:  x = (base^((y - logSideOffset) / logSideSlope) - linSideOffset) / linSideSlope
//! ```
//!
//! Values at or below zero on the linear side clamp to a small minimum
//! before the log, so the op never produces NaN from in-range pixels.

use crate::hash::CacheIdHasher;
use crate::{Direction, OpsError, OpsResult};

/// Smallest linear-side value fed to the logarithm.
const MIN_LIN: f32 = 1e-10;

/// Declarative parameters of a log op.
///
/// Forward direction converts linear to log; inverse converts back.
#[derive(Debug, Clone, PartialEq)]
pub struct LogOpData {
    /// Logarithm base (2 and 10 are the common cases).
    pub base: f64,
    /// Log-side slope per channel.
    pub log_slope: [f64; 3],
    /// Log-side offset per channel.
    pub log_offset: [f64; 3],
    /// Linear-side slope per channel.
    pub lin_slope: [f64; 3],
    /// Linear-side offset per channel.
    pub lin_offset: [f64; 3],
}

impl Default for LogOpData {
    fn default() -> Self {
        Self {
            base: 2.0,
            log_slope: [1.0; 3],
            log_offset: [0.0; 3],
            lin_slope: [1.0; 3],
            lin_offset: [0.0; 3],
        }
    }
}

impl LogOpData {
    /// Plain logarithm of the given base (unit slopes, zero offsets).
    pub fn with_base(base: f64) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    /// Base must be positive and not 1; slopes must be non-zero.
    pub fn validate(&self) -> OpsResult<()> {
        let err = |reason: String| {
            Err(OpsError::InvalidParameters {
                op: "Log",
                reason,
            })
        };
        if !self.base.is_finite() || self.base <= 0.0 || self.base == 1.0 {
            return err(format!("base must be positive and != 1, got {}", self.base));
        }
        for (i, &s) in self.log_slope.iter().enumerate() {
            if s == 0.0 || !s.is_finite() {
                return err(format!("logSideSlope[{i}] must be non-zero"));
            }
        }
        for (i, &s) in self.lin_slope.iter().enumerate() {
            if s == 0.0 || !s.is_finite() {
                return err(format!("linSideSlope[{i}] must be non-zero"));
            }
        }
        let finite = self
            .log_offset
            .iter()
            .chain(self.lin_offset.iter())
            .all(|v| v.is_finite());
        if !finite {
            return err("offsets must be finite".into());
        }
        Ok(())
    }

    /// A logarithm is never an identity map.
    pub fn is_identity(&self) -> bool {
        false
    }

    /// Log is separable per channel.
    pub fn has_channel_crosstalk(&self) -> bool {
        false
    }

    /// Feeds canonical parameters to the hasher.
    pub fn hash_into(&self, h: &mut CacheIdHasher) {
        h.put_str("log").put_f64(self.base);
        h.put_f64s(&self.log_slope);
        h.put_f64s(&self.log_offset);
        h.put_f64s(&self.lin_slope);
        h.put_f64s(&self.lin_offset);
    }
}

/// Finalized log kernel.
#[derive(Debug, Clone)]
pub struct LogKernel {
    forward: bool,
    inv_ln_base: f32,
    ln_base: f32,
    log_slope: [f32; 3],
    log_offset: [f32; 3],
    lin_slope: [f32; 3],
    lin_offset: [f32; 3],
}

impl LogKernel {
    /// Builds the kernel for a direction.
    pub fn new(data: &LogOpData, direction: Direction) -> Self {
        Self {
            forward: direction == Direction::Forward,
            inv_ln_base: (1.0 / data.base.ln()) as f32,
            ln_base: data.base.ln() as f32,
            log_slope: data.log_slope.map(|v| v as f32),
            log_offset: data.log_offset.map(|v| v as f32),
            lin_slope: data.lin_slope.map(|v| v as f32),
            lin_offset: data.lin_offset.map(|v| v as f32),
        }
    }

    /// Applies the log (or anti-log) to one RGBA pixel; alpha untouched.
    #[inline]
    pub fn apply(&self, px: &mut [f32; 4]) {
        for i in 0..3 {
            px[i] = if self.forward {
                let lin = px[i] * self.lin_slope[i] + self.lin_offset[i];
                self.log_slope[i] * lin.max(MIN_LIN).ln() * self.inv_ln_base
                    + self.log_offset[i]
            } else {
                let log = (px[i] - self.log_offset[i]) / self.log_slope[i];
                ((log * self.ln_base).exp() - self.lin_offset[i]) / self.lin_slope[i]
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn log2_of_powers() {
        let data = LogOpData::with_base(2.0);
        let k = LogKernel::new(&data, Direction::Forward);
        let mut px = [1.0, 2.0, 8.0, 1.0];
        k.apply(&mut px);
        assert_abs_diff_eq!(px[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(px[1], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(px[2], 3.0, epsilon = 1e-6);
        assert_eq!(px[3], 1.0);
    }

    #[test]
    fn round_trip_affine() {
        let data = LogOpData {
            base: 10.0,
            log_slope: [0.25; 3],
            log_offset: [0.41; 3],
            lin_slope: [5.55; 3],
            lin_offset: [0.05; 3],
        };
        assert!(data.validate().is_ok());
        let f = LogKernel::new(&data, Direction::Forward);
        let b = LogKernel::new(&data, Direction::Inverse);
        for x in [0.01_f32, 0.18, 0.5, 1.0, 4.0] {
            let mut px = [x, x, x, 0.0];
            f.apply(&mut px);
            b.apply(&mut px);
            assert_abs_diff_eq!(px[0], x, epsilon = 1e-4);
        }
    }

    #[test]
    fn non_positive_clamps_instead_of_nan() {
        let data = LogOpData::with_base(10.0);
        let k = LogKernel::new(&data, Direction::Forward);
        let mut px = [-1.0, 0.0, 1.0, 0.0];
        k.apply(&mut px);
        assert!(px[0].is_finite());
        assert!(px[1].is_finite());
    }

    #[test]
    fn base_one_rejected() {
        let data = LogOpData::with_base(1.0);
        assert!(data.validate().is_err());
    }
}
