//! 4-lane f32 helpers for the op kernels.
//!
//! The CPU kernels process one RGBA pixel per 4-lane vector using the
//! `wide` crate for portable SIMD on stable Rust. Each helper has scalar
//! semantics that the vectorized form reproduces exactly up to IEEE
//! rounding, so a kernel written against this module behaves identically
//! whether the target actually vectorizes or not.
//!
//! # Example
//!
//! ```rust
//! use opencolor_math::simd::{mul_add4, clamp4};
//!
//! let v = mul_add4([0.5, 0.5, 0.5, 0.5], [2.0; 4], [0.1; 4]);
//! assert!((v[0] - 1.1).abs() < 1e-6);
//! let c = clamp4([-0.5, 0.5, 1.5, 0.25], 0.0, 1.0);
//! assert_eq!(c, [0.0, 0.5, 1.0, 0.25]);
//! ```

use wide::{CmpGt, f32x4};

/// `v * scale + offset` per lane.
#[inline]
pub fn mul_add4(v: [f32; 4], scale: [f32; 4], offset: [f32; 4]) -> [f32; 4] {
    (f32x4::from(v) * f32x4::from(scale) + f32x4::from(offset)).to_array()
}

/// Per-lane power: `v[i]^e[i]`.
///
/// `powf` has no SIMD form in `wide` that matches libm bit-for-bit, so the
/// lanes are evaluated with scalar `powf`. The helper keeps kernel code in
/// lane form regardless.
#[inline]
pub fn power4(v: [f32; 4], e: [f32; 4]) -> [f32; 4] {
    [
        v[0].powf(e[0]),
        v[1].powf(e[1]),
        v[2].powf(e[2]),
        v[3].powf(e[3]),
    ]
}

/// Per-lane maximum against a scalar floor.
#[inline]
pub fn max4(v: [f32; 4], floor: f32) -> [f32; 4] {
    f32x4::from(v).max(f32x4::splat(floor)).to_array()
}

/// Per-lane minimum against a scalar ceiling.
#[inline]
pub fn min4(v: [f32; 4], ceil: f32) -> [f32; 4] {
    f32x4::from(v).min(f32x4::splat(ceil)).to_array()
}

/// Lane-wise maximum of two vectors.
#[inline]
pub fn max4v(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    f32x4::from(a).max(f32x4::from(b)).to_array()
}

/// Lane-wise minimum of two vectors.
#[inline]
pub fn min4v(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    f32x4::from(a).min(f32x4::from(b)).to_array()
}

/// Clamps each lane to `[lo, hi]`.
#[inline]
pub fn clamp4(v: [f32; 4], lo: f32, hi: f32) -> [f32; 4] {
    f32x4::from(v)
        .max(f32x4::splat(lo))
        .min(f32x4::splat(hi))
        .to_array()
}

/// Lane blend: picks `if_gt[i]` where `v[i] > threshold[i]`, else `if_le[i]`.
///
/// Mirrors the compare-and-blend pattern the moncurve and range kernels
/// use to split pixels across the breakpoint.
#[inline]
pub fn select_gt4(v: [f32; 4], threshold: [f32; 4], if_gt: [f32; 4], if_le: [f32; 4]) -> [f32; 4] {
    let mask = f32x4::from(v).cmp_gt(f32x4::from(threshold));
    mask.blend(f32x4::from(if_gt), f32x4::from(if_le)).to_array()
}

/// Sign-preserving per-lane power: `sign(v) * |v|^e`.
#[inline]
pub fn mirror_power4(v: [f32; 4], e: [f32; 4]) -> [f32; 4] {
    [
        v[0].signum() * v[0].abs().powf(e[0]),
        v[1].signum() * v[1].abs().powf(e[1]),
        v[2].signum() * v[2].abs().powf(e[2]),
        v[3].signum() * v[3].abs().powf(e[3]),
    ]
}

/// Applies `y = M*x + b` to one RGBA pixel with the matrix rows splatted.
///
/// `rows` are the four matrix rows, `offset` the 4-vector; this is the
/// inner step of the matrix kernel.
#[inline]
pub fn mat4_transform(rows: &[[f32; 4]; 4], offset: [f32; 4], v: [f32; 4]) -> [f32; 4] {
    let x = f32x4::from(v);
    let dot = |row: [f32; 4]| -> f32 {
        let p = (f32x4::from(row) * x).to_array();
        p[0] + p[1] + p[2] + p[3]
    };
    [
        dot(rows[0]) + offset[0],
        dot(rows[1]) + offset[1],
        dot(rows[2]) + offset[2],
        dot(rows[3]) + offset[3],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_add_lanes() {
        let out = mul_add4([1.0, 2.0, 3.0, 4.0], [2.0; 4], [1.0; 4]);
        assert_eq!(out, [3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn select_blends_per_lane() {
        let out = select_gt4(
            [0.1, 0.6, 0.4, 0.9],
            [0.5; 4],
            [1.0; 4],
            [0.0; 4],
        );
        assert_eq!(out, [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn mirror_power_keeps_sign() {
        let out = mirror_power4([-0.25, 0.25, -1.0, 0.0], [2.0; 4]);
        assert!((out[0] + 0.0625).abs() < 1e-7);
        assert!((out[1] - 0.0625).abs() < 1e-7);
        assert_eq!(out[2], -1.0);
        assert_eq!(out[3], 0.0);
    }

    #[test]
    fn mat4_transform_identity() {
        let rows = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let out = mat4_transform(&rows, [0.0; 4], [0.2, 0.4, 0.6, 0.8]);
        assert_eq!(out, [0.2, 0.4, 0.6, 0.8]);
    }
}
