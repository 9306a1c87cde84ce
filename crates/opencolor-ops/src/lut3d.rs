//! 3D LUT op: RGB cube lookup.
//!
//! The cube stores `N^3` RGB nodes with the red index varying fastest (the
//! `.cube` convention; the CLF reader reorders on load). The domain is
//! `[0,1]^3` and inputs are clamped to it. Interpolation is trilinear or
//! tetrahedral; tetrahedral picks one of six simplices from the ordering
//! of the fractional coordinates and is the default "best".
//!
//! There is no analytic inverse. The inverse kernel *materializes* one: a
//! forward cube on a 48-edge grid whose nodes are found by Newton
//! iteration against the forward tetrahedral evaluator (the "fast
//! inverse" strategy).

use std::sync::Arc;

use crate::hash::CacheIdHasher;
use crate::{Direction, Interpolation, OpsError, OpsResult};

/// Largest allowed cube edge.
pub const MAX_LUT3D_EDGE: usize = 129;

/// Edge length of the materialized fast-inverse cube.
pub const INVERSE_EDGE: usize = 48;

/// Absolute tolerance for the identity-grid check.
const IDENTITY_TOLERANCE: f32 = 1e-5;

/// Declarative parameters of a 3D LUT op.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut3dOpData {
    /// RGB nodes, red index fastest, `edge^3 * 3` entries.
    pub samples: Arc<Vec<f32>>,
    /// Cube edge length.
    pub edge: usize,
    /// Interpolation method.
    pub interpolation: Interpolation,
}

impl Lut3dOpData {
    /// Cube from raw samples.
    pub fn new(samples: Vec<f32>, edge: usize) -> Self {
        Self {
            samples: Arc::new(samples),
            edge,
            interpolation: Interpolation::Tetrahedral,
        }
    }

    /// Identity cube of the given edge.
    pub fn identity(edge: usize) -> Self {
        let mut samples = Vec::with_capacity(edge * edge * edge * 3);
        let max = (edge - 1) as f32;
        for b in 0..edge {
            for g in 0..edge {
                for r in 0..edge {
                    samples.extend_from_slice(&[r as f32 / max, g as f32 / max, b as f32 / max]);
                }
            }
        }
        Self::new(samples, edge)
    }

    /// Edge limits and sample-count consistency.
    pub fn validate(&self) -> OpsResult<()> {
        let err = |reason: String| {
            Err(OpsError::InvalidParameters {
                op: "Lut3D",
                reason,
            })
        };
        if self.edge < 2 || self.edge > MAX_LUT3D_EDGE {
            return err(format!(
                "cube edge must be in [2, {MAX_LUT3D_EDGE}], got {}",
                self.edge
            ));
        }
        let expected = self.edge * self.edge * self.edge * 3;
        if self.samples.len() != expected {
            return err(format!(
                "expected {expected} samples for edge {}, got {}",
                self.edge,
                self.samples.len()
            ));
        }
        Ok(())
    }

    /// Nodes match the identity grid within 1e-5 absolute.
    pub fn is_identity(&self) -> bool {
        let max = (self.edge - 1) as f32;
        let mut i = 0;
        for b in 0..self.edge {
            for g in 0..self.edge {
                for r in 0..self.edge {
                    let expect = [r as f32 / max, g as f32 / max, b as f32 / max];
                    for ch in 0..3 {
                        if (self.samples[i + ch] - expect[ch]).abs() > IDENTITY_TOLERANCE {
                            return false;
                        }
                    }
                    i += 3;
                }
            }
        }
        true
    }

    /// A cube always couples the channels.
    pub fn has_channel_crosstalk(&self) -> bool {
        true
    }

    /// Feeds canonical parameters to the hasher.
    pub fn hash_into(&self, h: &mut CacheIdHasher) {
        h.put_str("lut3d");
        h.put_u64(self.edge as u64);
        h.put_f32s(&self.samples);
        h.put_str(self.interpolation.as_str());
    }
}

/// Finalized 3D LUT kernel.
#[derive(Debug, Clone)]
pub struct Lut3dKernel {
    samples: Arc<Vec<f32>>,
    edge: usize,
    tetrahedral: bool,
}

impl Lut3dKernel {
    /// Builds the kernel; the inverse direction materializes the fast
    /// inverse cube.
    pub fn new(data: &Lut3dOpData, direction: Direction) -> OpsResult<Self> {
        data.validate()?;
        let tetrahedral = !matches!(data.interpolation, Interpolation::Linear);
        match direction {
            Direction::Forward => Ok(Self {
                samples: Arc::clone(&data.samples),
                edge: data.edge,
                tetrahedral,
            }),
            Direction::Inverse => {
                let forward = Self {
                    samples: Arc::clone(&data.samples),
                    edge: data.edge,
                    tetrahedral: true,
                };
                let inverted = forward.materialize_inverse(INVERSE_EDGE);
                Ok(Self {
                    samples: Arc::new(inverted),
                    edge: INVERSE_EDGE,
                    tetrahedral,
                })
            }
        }
    }

    #[inline]
    fn node(&self, r: usize, g: usize, b: usize) -> [f32; 3] {
        let i = ((b * self.edge + g) * self.edge + r) * 3;
        [self.samples[i], self.samples[i + 1], self.samples[i + 2]]
    }

    /// Evaluates the cube at an RGB point (clamped to [0,1]^3).
    pub fn eval(&self, rgb: [f32; 3]) -> [f32; 3] {
        let max = (self.edge - 1) as f32;
        let ri = rgb[0].clamp(0.0, 1.0) * max;
        let gi = rgb[1].clamp(0.0, 1.0) * max;
        let bi = rgb[2].clamp(0.0, 1.0) * max;

        let r0 = (ri.floor() as usize).min(self.edge - 2);
        let g0 = (gi.floor() as usize).min(self.edge - 2);
        let b0 = (bi.floor() as usize).min(self.edge - 2);

        let fr = ri - r0 as f32;
        let fg = gi - g0 as f32;
        let fb = bi - b0 as f32;

        let c000 = self.node(r0, g0, b0);
        let c100 = self.node(r0 + 1, g0, b0);
        let c010 = self.node(r0, g0 + 1, b0);
        let c110 = self.node(r0 + 1, g0 + 1, b0);
        let c001 = self.node(r0, g0, b0 + 1);
        let c101 = self.node(r0 + 1, g0, b0 + 1);
        let c011 = self.node(r0, g0 + 1, b0 + 1);
        let c111 = self.node(r0 + 1, g0 + 1, b0 + 1);

        let mut out = [0.0f32; 3];
        if self.tetrahedral {
            for i in 0..3 {
                out[i] = if fr > fg {
                    if fg > fb {
                        (1.0 - fr) * c000[i] + (fr - fg) * c100[i] + (fg - fb) * c110[i] + fb * c111[i]
                    } else if fr > fb {
                        (1.0 - fr) * c000[i] + (fr - fb) * c100[i] + (fb - fg) * c101[i] + fg * c111[i]
                    } else {
                        (1.0 - fb) * c000[i] + (fb - fr) * c001[i] + (fr - fg) * c101[i] + fg * c111[i]
                    }
                } else if fr > fb {
                    (1.0 - fg) * c000[i] + (fg - fr) * c010[i] + (fr - fb) * c110[i] + fb * c111[i]
                } else if fg > fb {
                    (1.0 - fg) * c000[i] + (fg - fb) * c010[i] + (fb - fr) * c011[i] + fr * c111[i]
                } else {
                    (1.0 - fb) * c000[i] + (fb - fg) * c001[i] + (fg - fr) * c011[i] + fr * c111[i]
                };
            }
        } else {
            for i in 0..3 {
                let c00 = c000[i] * (1.0 - fr) + c100[i] * fr;
                let c10 = c010[i] * (1.0 - fr) + c110[i] * fr;
                let c01 = c001[i] * (1.0 - fr) + c101[i] * fr;
                let c11 = c011[i] * (1.0 - fr) + c111[i] * fr;
                let c0 = c00 * (1.0 - fg) + c10 * fg;
                let c1 = c01 * (1.0 - fg) + c11 * fg;
                out[i] = c0 * (1.0 - fb) + c1 * fb;
            }
        }
        out
    }

    /// Applies the cube to one RGBA pixel; alpha passes through.
    #[inline]
    pub fn apply(&self, px: &mut [f32; 4]) {
        let out = self.eval([px[0], px[1], px[2]]);
        px[0] = out[0];
        px[1] = out[1];
        px[2] = out[2];
    }

    /// Builds a forward cube approximating this cube's inverse.
    ///
    /// For every node of the output grid the input producing it is found
    /// by damped Newton iteration with a numeric Jacobian.
    fn materialize_inverse(&self, edge: usize) -> Vec<f32> {
        let mut inverted = vec![0.0f32; edge * edge * edge * 3];
        let max_iters = 30;
        let tolerance = 1e-6f32;
        let max = (edge - 1) as f32;

        for iz in 0..edge {
            for iy in 0..edge {
                for ix in 0..edge {
                    let target = [ix as f32 / max, iy as f32 / max, iz as f32 / max];
                    let mut guess = target;

                    for _ in 0..max_iters {
                        let eval = self.eval(guess);
                        let err = [
                            eval[0] - target[0],
                            eval[1] - target[1],
                            eval[2] - target[2],
                        ];
                        let mag = (err[0] * err[0] + err[1] * err[1] + err[2] * err[2]).sqrt();
                        if mag < tolerance {
                            break;
                        }

                        let delta = 1e-4f32;
                        let mut jacobian = [[0.0f32; 3]; 3];
                        for j in 0..3 {
                            let mut plus = guess;
                            plus[j] = (plus[j] + delta).min(1.0);
                            let eval_plus = self.eval(plus);
                            let actual = plus[j] - guess[j];
                            let inv_d = if actual.abs() < f32::EPSILON {
                                0.0
                            } else {
                                1.0 / actual
                            };
                            for i in 0..3 {
                                jacobian[i][j] = (eval_plus[i] - eval[i]) * inv_d;
                            }
                        }

                        let dx = solve_3x3(&jacobian, &[-err[0], -err[1], -err[2]]);
                        let damping = 0.8f32;
                        for j in 0..3 {
                            guess[j] = (guess[j] + damping * dx[j]).clamp(0.0, 1.0);
                        }
                    }

                    let idx = ((iz * edge + iy) * edge + ix) * 3;
                    inverted[idx] = guess[0];
                    inverted[idx + 1] = guess[1];
                    inverted[idx + 2] = guess[2];
                }
            }
        }
        inverted
    }
}

/// Solves a 3x3 linear system with Cramer's rule; singular systems
/// return zero so the Newton step degenerates to no movement.
fn solve_3x3(a: &[[f32; 3]; 3], b: &[f32; 3]) -> [f32; 3] {
    let det = a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
        - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0]);

    if det.abs() < 1e-10 {
        return [0.0, 0.0, 0.0];
    }
    let inv_det = 1.0 / det;

    let det_x = b[0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
        - a[0][1] * (b[1] * a[2][2] - a[1][2] * b[2])
        + a[0][2] * (b[1] * a[2][1] - a[1][1] * b[2]);

    let det_y = a[0][0] * (b[1] * a[2][2] - a[1][2] * b[2])
        - b[0] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * b[2] - b[1] * a[2][0]);

    let det_z = a[0][0] * (a[1][1] * b[2] - b[1] * a[2][1])
        - a[0][1] * (a[1][0] * b[2] - b[1] * a[2][0])
        + b[0] * (a[1][0] * a[2][1] - a[1][1] * a[2][0]);

    [det_x * inv_det, det_y * inv_det, det_z * inv_det]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn identity_cube_is_identity() {
        let lut = Lut3dOpData::identity(17);
        assert!(lut.validate().is_ok());
        assert!(lut.is_identity());
        let k = Lut3dKernel::new(&lut, Direction::Forward).unwrap();
        let mut px = [0.3, 0.6, 0.9, 0.5];
        k.apply(&mut px);
        assert_abs_diff_eq!(px[0], 0.3, epsilon = 1e-6);
        assert_abs_diff_eq!(px[1], 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(px[2], 0.9, epsilon = 1e-6);
        assert_eq!(px[3], 0.5);
    }

    #[test]
    fn oversized_edge_rejected() {
        let lut = Lut3dOpData::new(vec![0.0; 130 * 130 * 130 * 3], 130);
        assert!(lut.validate().is_err());
    }

    #[test]
    fn domain_clamps() {
        let lut = Lut3dOpData::identity(9);
        let k = Lut3dKernel::new(&lut, Direction::Forward).unwrap();
        let mut px = [-0.5, 1.5, 0.5, 0.0];
        k.apply(&mut px);
        assert_eq!(px[0], 0.0);
        assert_eq!(px[1], 1.0);
        assert_abs_diff_eq!(px[2], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn tetrahedral_matches_trilinear_on_nodes() {
        let lut = Lut3dOpData::identity(5);
        let mut tri = lut.clone();
        tri.interpolation = Interpolation::Linear;
        let kt = Lut3dKernel::new(&lut, Direction::Forward).unwrap();
        let kl = Lut3dKernel::new(&tri, Direction::Forward).unwrap();
        let node = [0.25, 0.5, 0.75];
        assert_eq!(kt.eval(node), kl.eval(node));
    }

    #[test]
    fn fast_inverse_round_trip() {
        // Mild grade: per-channel gamma baked into a cube.
        let edge = 17;
        let mut samples = Vec::with_capacity(edge * edge * edge * 3);
        let max = (edge - 1) as f32;
        for b in 0..edge {
            for g in 0..edge {
                for r in 0..edge {
                    samples.extend_from_slice(&[
                        (r as f32 / max).powf(1.2),
                        (g as f32 / max).powf(0.9),
                        (b as f32 / max).powf(1.1),
                    ]);
                }
            }
        }
        let lut = Lut3dOpData::new(samples, edge);
        let f = Lut3dKernel::new(&lut, Direction::Forward).unwrap();
        let inv = Lut3dKernel::new(&lut, Direction::Inverse).unwrap();

        for rgb in [[0.2_f32, 0.5, 0.7], [0.4, 0.4, 0.4], [0.9, 0.1, 0.3]] {
            let fwd = f.eval(rgb);
            let back = inv.eval(fwd);
            for i in 0..3 {
                assert_abs_diff_eq!(back[i], rgb[i], epsilon = 5e-3);
            }
        }
    }
}
