//! Matrix op: `y = M * x + b` on RGBA.
//!
//! The matrix op is the workhorse of the optimizer - any two adjacent
//! matrices fuse into one, and ranges with closed bounds promote to a
//! matrix so they can join the fusion. Parameters are stored in f64 and
//! converted to f32 once, when the kernel is built.

use opencolor_math::simd::mat4_transform;
use opencolor_math::{Matrix44, SINGULARITY_THRESHOLD};

use crate::hash::CacheIdHasher;
use crate::{Direction, OpsError, OpsResult};

/// Declarative parameters of a matrix op.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixOpData {
    /// Matrix plus offset.
    pub matrix: Matrix44,
}

impl Default for MatrixOpData {
    fn default() -> Self {
        Self::new(Matrix44::identity())
    }
}

impl MatrixOpData {
    /// Wraps a matrix as op data.
    pub fn new(matrix: Matrix44) -> Self {
        Self { matrix }
    }

    /// Per-channel scale matrix.
    pub fn from_diagonal(d: [f64; 4]) -> Self {
        Self::new(Matrix44::from_diagonal(d))
    }

    /// Scale matrix converting between two bit-depth code ranges.
    ///
    /// Parameters serialized at one depth are rescaled to another by
    /// `out_scale / in_scale`; this is how CLF nodes with integer depths
    /// are normalized to F32 processing.
    pub fn bit_depth_scale(in_scale: f64, out_scale: f64) -> Self {
        let s = out_scale / in_scale;
        Self::new(Matrix44::from_scale(s))
    }

    /// All parameters finite; nothing else is restricted.
    pub fn validate(&self) -> OpsResult<()> {
        let finite = self.matrix.m.iter().all(|v| v.is_finite())
            && self.matrix.offset.iter().all(|v| v.is_finite());
        if !finite {
            return Err(OpsError::InvalidParameters {
                op: "Matrix",
                reason: "matrix coefficients must be finite".into(),
            });
        }
        Ok(())
    }

    /// Byte-exact identity.
    pub fn is_identity(&self) -> bool {
        self.matrix.is_identity()
    }

    /// A single output channel depends on others whenever the matrix has
    /// non-zero off-diagonal coefficients.
    pub fn has_channel_crosstalk(&self) -> bool {
        !self.matrix.is_diagonal()
    }

    /// The matrix for the given direction; inversion fails on singular
    /// matrices.
    pub fn resolved(&self, direction: Direction) -> OpsResult<Matrix44> {
        match direction {
            Direction::Forward => Ok(self.matrix),
            Direction::Inverse => self.matrix.inverse().ok_or(OpsError::NotInvertible {
                threshold: SINGULARITY_THRESHOLD,
            }),
        }
    }

    /// Fuses `self` followed by `next` into one matrix op.
    pub fn compose(&self, next: &MatrixOpData) -> MatrixOpData {
        MatrixOpData::new(next.matrix.compose(&self.matrix))
    }

    /// True when the two matrices cancel to identity within epsilon.
    pub fn is_inverse_of(&self, other: &MatrixOpData) -> bool {
        let fused = other.matrix.compose(&self.matrix);
        let id = Matrix44::identity();
        let eps = 1e-6;
        fused
            .m
            .iter()
            .zip(id.m.iter())
            .all(|(a, b)| (a - b).abs() < eps)
            && fused.offset.iter().all(|v| v.abs() < eps)
    }

    /// Feeds canonical parameters to the hasher.
    pub fn hash_into(&self, h: &mut CacheIdHasher) {
        h.put_str("matrix");
        h.put_f64s(&self.matrix.m);
        h.put_f64s(&self.matrix.offset);
    }
}

/// Finalized matrix kernel.
#[derive(Debug, Clone)]
pub struct MatrixKernel {
    rows: [[f32; 4]; 4],
    offset: [f32; 4],
}

impl MatrixKernel {
    /// Builds the kernel, resolving the direction.
    pub fn new(data: &MatrixOpData, direction: Direction) -> OpsResult<Self> {
        let m = data.resolved(direction)?;
        let (flat, offset) = m.to_f32();
        let mut rows = [[0.0f32; 4]; 4];
        for r in 0..4 {
            rows[r].copy_from_slice(&flat[r * 4..r * 4 + 4]);
        }
        Ok(Self { rows, offset })
    }

    /// Applies the matrix to one RGBA pixel.
    #[inline]
    pub fn apply(&self, px: &mut [f32; 4]) {
        *px = mat4_transform(&self.rows, self.offset, *px);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn identity_is_identity() {
        assert!(MatrixOpData::default().is_identity());
        assert!(!MatrixOpData::default().has_channel_crosstalk());
    }

    #[test]
    fn crosstalk_detection() {
        let mut m = Matrix44::identity();
        m.m[1] = 0.1;
        assert!(MatrixOpData::new(m).has_channel_crosstalk());
    }

    #[test]
    fn forward_then_inverse_kernel() {
        let data = MatrixOpData::new(Matrix44 {
            m: [
                0.7537, 0.1337, 0.1120, 0.0,
                0.0212, 1.0054, -0.0266, 0.0,
                -0.0098, 0.0045, 1.0053, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ],
            offset: [0.0; 4],
        });
        let fwd = MatrixKernel::new(&data, Direction::Forward).unwrap();
        let inv = MatrixKernel::new(&data, Direction::Inverse).unwrap();

        let mut px = [0.2_f32, 0.4, 0.6, 0.5];
        let orig = px;
        fwd.apply(&mut px);
        inv.apply(&mut px);
        for i in 0..4 {
            assert_abs_diff_eq!(px[i], orig[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn singular_inverse_rejected() {
        let data = MatrixOpData::from_diagonal([0.0, 1.0, 1.0, 1.0]);
        assert!(matches!(
            MatrixKernel::new(&data, Direction::Inverse),
            Err(OpsError::NotInvertible { .. })
        ));
    }

    #[test]
    fn compose_matches_sequential_apply() {
        let a = MatrixOpData::from_diagonal([2.0, 0.5, 1.5, 1.0]);
        let b = MatrixOpData::new(Matrix44 {
            m: Matrix44::from_3x3(&[0.9, 0.1, 0.0, 0.0, 1.0, 0.0, 0.0, 0.2, 0.8]).m,
            offset: [0.05, 0.0, -0.05, 0.0],
        });
        let fused = a.compose(&b);

        let ka = MatrixKernel::new(&a, Direction::Forward).unwrap();
        let kb = MatrixKernel::new(&b, Direction::Forward).unwrap();
        let kf = MatrixKernel::new(&fused, Direction::Forward).unwrap();

        let mut seq = [0.3_f32, 0.6, 0.9, 1.0];
        ka.apply(&mut seq);
        kb.apply(&mut seq);

        let mut one = [0.3_f32, 0.6, 0.9, 1.0];
        kf.apply(&mut one);

        for i in 0..4 {
            assert_abs_diff_eq!(seq[i], one[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn inverse_pair_detected() {
        let data = MatrixOpData::from_diagonal([2.0, 2.0, 2.0, 1.0]);
        let inv = MatrixOpData::new(data.matrix.inverse().unwrap());
        assert!(data.is_inverse_of(&inv));
    }
}
