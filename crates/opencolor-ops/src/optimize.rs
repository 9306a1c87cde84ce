//! Op-list optimizer.
//!
//! Rewrites run left-to-right and the whole pass repeats until a full
//! sweep changes nothing:
//!
//! 1. inverse-pair collapse (`is_inverse_of`)
//! 2. same-type combine (`combine_with`): matrices multiply, ranges
//!    tighten, exponents multiply, separable 1D LUTs resample
//! 3. range -> matrix promotion for fully closed ranges
//! 4. identity replacement: unit parameters with clamp semantics become
//!    an explicit Range clamp; non-clamping identities become matrices
//! 5. identity removal
//!
//! All internal ops process F32; conversion to the requested I/O bit
//! depths happens at the processor boundary, so no bit-depth rewrite is
//! needed here. LUT resampling is the only rewrite that is not exact to
//! float epsilon; it is skipped under `lossless` and reported through
//! [`OptimizeReport::lossy`] otherwise.

use tracing::debug;

use crate::cdl::CdlStyle;
use crate::matrix::MatrixOpData;
use crate::range::RangeOpData;
use crate::{Direction, Op, OpData, OpList};

/// Which rewrites are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizationFlags {
    /// Drop ops where `is_identity()` holds.
    pub remove_identity: bool,
    /// Fuse adjacent matrices and adjacent ranges.
    pub compose_matrix: bool,
    /// Drop exact inverse pairs.
    pub pair_inverse: bool,
    /// Fuse adjacent separable 1D LUTs by resampling (not exact).
    pub compose_separable_lut: bool,
    /// Replace clamping identities with cheaper equivalent ops and
    /// promote closed ranges to matrices.
    pub replace_identity: bool,
    /// Restrict every rewrite to exactly invertible cases.
    pub lossless: bool,
}

impl OptimizationFlags {
    /// No rewrites at all.
    pub fn none() -> Self {
        Self {
            remove_identity: false,
            compose_matrix: false,
            pair_inverse: false,
            compose_separable_lut: false,
            replace_identity: false,
            lossless: true,
        }
    }

    /// Exact rewrites only.
    pub fn lossless() -> Self {
        Self {
            remove_identity: true,
            compose_matrix: true,
            pair_inverse: true,
            compose_separable_lut: false,
            replace_identity: false,
            lossless: true,
        }
    }

    /// Everything, including LUT resampling and identity replacement.
    pub fn default_level() -> Self {
        Self {
            remove_identity: true,
            compose_matrix: true,
            pair_inverse: true,
            compose_separable_lut: true,
            replace_identity: true,
            lossless: false,
        }
    }
}

impl Default for OptimizationFlags {
    fn default() -> Self {
        Self::default_level()
    }
}

/// What the optimizer did to the list.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizeReport {
    /// A rewrite that is not exact to float epsilon was applied.
    pub lossy: bool,
    /// Number of full passes executed.
    pub passes: usize,
}

/// Optimizes the list in place to a fixed point.
pub fn optimize(list: &mut OpList, flags: OptimizationFlags) -> OptimizeReport {
    let mut report = OptimizeReport::default();

    // Structural markers are meaningless past this point.
    list.ops_mut().retain(|op| !matches!(op.data, OpData::NoOp(_)));

    let before = list.len();
    loop {
        report.passes += 1;
        let mut changed = false;

        changed |= collapse_inverse_pairs(list, flags);
        changed |= combine_adjacent(list, flags, &mut report);
        changed |= promote_ranges(list, flags);
        changed |= replace_identities(list, flags);
        changed |= remove_identities(list, flags);

        if !changed || report.passes > list.len() + 8 {
            break;
        }
    }

    debug!(
        before,
        after = list.len(),
        passes = report.passes,
        lossy = report.lossy,
        "optimized op list"
    );
    report
}

fn collapse_inverse_pairs(list: &mut OpList, flags: OptimizationFlags) -> bool {
    if !flags.pair_inverse {
        return false;
    }
    let ops = list.ops_mut();
    let mut i = 0;
    let mut changed = false;
    while i + 1 < ops.len() {
        // LUT inversion is approximate; under lossless only exactly
        // invertible pairs may cancel.
        let exact = !matches!(ops[i].data, OpData::Lut1d(_) | OpData::Lut3d(_));
        if (exact || !flags.lossless) && ops[i].is_inverse_of(&ops[i + 1]) {
            ops.drain(i..i + 2);
            changed = true;
            i = i.saturating_sub(1);
        } else {
            i += 1;
        }
    }
    changed
}

fn combine_adjacent(list: &mut OpList, flags: OptimizationFlags, report: &mut OptimizeReport) -> bool {
    let ops = list.ops_mut();
    let mut i = 0;
    let mut changed = false;
    while i + 1 < ops.len() {
        let allowed = match (&ops[i].data, &ops[i + 1].data) {
            (OpData::Matrix(_), OpData::Matrix(_)) | (OpData::Range(_), OpData::Range(_)) => {
                flags.compose_matrix
            }
            (OpData::Lut1d(_), OpData::Lut1d(_)) => {
                flags.compose_separable_lut && !flags.lossless
            }
            (OpData::Gamma(_), OpData::Gamma(_))
            | (OpData::ExposureContrast(_), OpData::ExposureContrast(_)) => flags.compose_matrix,
            _ => false,
        };
        if allowed {
            if let Some(fused) = ops[i].combine_with(&ops[i + 1]) {
                if matches!(fused.data, OpData::Lut1d(_)) {
                    report.lossy = true;
                }
                ops.splice(i..i + 2, [fused]);
                changed = true;
                i = i.saturating_sub(1);
                continue;
            }
        }
        i += 1;
    }
    changed
}

fn promote_ranges(list: &mut OpList, flags: OptimizationFlags) -> bool {
    if !flags.replace_identity {
        return false;
    }
    let ops = list.ops_mut();
    let mut changed = false;
    for i in 0..ops.len() {
        // Promotion drops the clamp, so only do it when a neighboring
        // matrix makes the fusion worthwhile.
        let neighbor_matrix = (i > 0 && matches!(ops[i - 1].data, OpData::Matrix(_)))
            || (i + 1 < ops.len() && matches!(ops[i + 1].data, OpData::Matrix(_)));
        if !neighbor_matrix {
            continue;
        }
        if let OpData::Range(r) = &ops[i].data {
            let normalized = match ops[i].direction {
                Direction::Forward => *r,
                Direction::Inverse => r.inverted(),
            };
            if let Some(m) = normalized.as_matrix() {
                ops[i] = Op::forward(m);
                changed = true;
            }
        }
    }
    changed
}

fn replace_identities(list: &mut OpList, flags: OptimizationFlags) -> bool {
    if !flags.replace_identity {
        return false;
    }
    let ops = list.ops_mut();
    let mut changed = false;
    for op in ops.iter_mut() {
        match &op.data {
            OpData::Cdl(d) if d.is_identity() => {
                // Unit parameters; the clamp family decides the shape.
                op.data = if d.style == CdlStyle::V1_2 {
                    OpData::Range(RangeOpData::clamp01())
                } else {
                    OpData::Matrix(MatrixOpData::default())
                };
                op.direction = Direction::Forward;
                changed = true;
            }
            OpData::Gamma(d) if d.is_identity() && d.clamps() => {
                // Unit basic gamma is a clamp at zero.
                op.data = OpData::Range(RangeOpData {
                    min_in: Some(0.0),
                    min_out: Some(0.0),
                    ..Default::default()
                });
                op.direction = Direction::Forward;
                changed = true;
            }
            _ => {}
        }
    }
    changed
}

fn remove_identities(list: &mut OpList, flags: OptimizationFlags) -> bool {
    if !flags.remove_identity {
        return false;
    }
    let ops = list.ops_mut();
    let before = ops.len();
    ops.retain(|op| !op.is_identity());
    before != ops.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamma::{GammaOpData, GammaStyle};
    use crate::cdl::CdlOpData;
    use crate::lut1d::Lut1dOpData;
    use crate::noop::NoOpData;
    use crate::matrix::MatrixOpData;
    use opencolor_math::Matrix44;

    fn list(ops: Vec<Op>) -> OpList {
        OpList::from_ops(ops)
    }

    #[test]
    fn exponent_inverse_pair_vanishes() {
        // Exponent(2,2,2,1) forward then inverse must optimize to zero
        // ops; mirror style is exactly invertible.
        let data = GammaOpData {
            style: GammaStyle::BasicMirror,
            gamma: [2.0, 2.0, 2.0, 1.0],
            offset: [0.0; 4],
        };
        let mut ops = list(vec![
            Op::forward(data.clone()),
            Op::inverse(data),
        ]);
        optimize(&mut ops, OptimizationFlags::lossless());
        assert!(ops.is_empty());
    }

    #[test]
    fn matrix_chain_fuses_to_one() {
        let mut ops = list(vec![
            Op::forward(MatrixOpData::from_diagonal([2.0, 2.0, 2.0, 1.0])),
            Op::forward(MatrixOpData::from_diagonal([0.25, 0.25, 0.25, 1.0])),
            Op::forward(MatrixOpData::from_diagonal([3.0, 3.0, 3.0, 1.0])),
        ]);
        optimize(&mut ops, OptimizationFlags::lossless());
        assert_eq!(ops.len(), 1);
        match &ops.ops()[0].data {
            OpData::Matrix(m) => assert!((m.matrix.m[0] - 1.5).abs() < 1e-12),
            other => panic!("expected matrix, got {}", other.kind()),
        }
    }

    #[test]
    fn identity_matrix_removed() {
        let mut ops = list(vec![Op::forward(MatrixOpData::new(Matrix44::identity()))]);
        optimize(&mut ops, OptimizationFlags::lossless());
        assert!(ops.is_empty());
    }

    #[test]
    fn clamping_cdl_identity_becomes_range() {
        let mut ops = list(vec![Op::forward(CdlOpData::default())]);
        optimize(&mut ops, OptimizationFlags::default_level());
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops.ops()[0].data, OpData::Range(_)));
    }

    #[test]
    fn markers_are_stripped() {
        let mut ops = list(vec![
            Op::forward(NoOpData::Look { name: "g".into() }),
            Op::forward(NoOpData::File { path: "x.clf".into() }),
        ]);
        optimize(&mut ops, OptimizationFlags::none());
        assert!(ops.is_empty());
    }

    #[test]
    fn lut_compose_reports_lossy() {
        let mut ops = list(vec![
            Op::forward(Lut1dOpData::identity(256)),
            Op::forward(Lut1dOpData::identity(1024)),
        ]);
        let report = optimize(&mut ops, OptimizationFlags::default_level());
        assert!(ops.is_empty() || ops.len() == 1);
        // Either both identities were dropped first or the composition
        // flagged the run as lossy; dropping is allowed to win.
        if ops.len() == 1 {
            assert!(report.lossy);
        }
    }

    #[test]
    fn lossless_skips_lut_compose() {
        let mut gamma = Vec::new();
        for i in 0..256 {
            let v = (i as f32 / 255.0).powf(2.2);
            gamma.extend_from_slice(&[v, v, v]);
        }
        let mut ops = list(vec![
            Op::forward(Lut1dOpData::new(gamma.clone())),
            Op::forward(Lut1dOpData::new(gamma)),
        ]);
        let report = optimize(&mut ops, OptimizationFlags::lossless());
        assert_eq!(ops.len(), 2);
        assert!(!report.lossy);
    }

    #[test]
    fn range_promotes_and_fuses_away() {
        // Range scale 2 promotes to a matrix, fuses with the 0.5 scale,
        // and the resulting identity is removed.
        let mut ops = list(vec![
            Op::forward(RangeOpData::new(0.0, 1.0, 0.0, 2.0)),
            Op::forward(MatrixOpData::from_diagonal([0.5, 0.5, 0.5, 1.0])),
        ]);
        optimize(&mut ops, OptimizationFlags::default_level());
        assert!(ops.is_empty());
    }
}
