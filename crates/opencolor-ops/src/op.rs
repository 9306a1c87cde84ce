//! Op graph node and op list.
//!
//! [`OpData`] is the closed set of op kinds; adding a variant makes every
//! `match` in the crate non-exhaustive, so the compiler flags each place
//! that needs the new kind. An [`Op`] wraps one `OpData` with a direction;
//! an [`OpList`] is the ordered sequence the builder produces and the
//! optimizer rewrites. Finalizing an op list resolves directions and
//! interpolation defaults into concrete [`CpuKernel`]s and strips the
//! NoOp markers.

use crate::cdl::{CdlKernel, CdlOpData};
use crate::dynamic::DynamicProperty;
use crate::exposure_contrast::{ExposureContrastKernel, ExposureContrastOpData};
use crate::fixed_function::{FixedFunctionKernel, FixedFunctionOpData};
use crate::gamma::{GammaKernel, GammaOpData};
use crate::hash::CacheIdHasher;
use crate::log_op::{LogKernel, LogOpData};
use crate::lut1d::{Lut1dKernel, Lut1dOpData};
use crate::lut3d::{Lut3dKernel, Lut3dOpData};
use crate::matrix::{MatrixKernel, MatrixOpData};
use crate::noop::NoOpData;
use crate::range::{RangeKernel, RangeOpData};
use crate::OpsResult;

/// Transform application direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Forward transform.
    #[default]
    Forward,
    /// Inverse transform.
    Inverse,
}

impl Direction {
    /// Returns the opposite direction.
    #[inline]
    pub fn inverse(self) -> Self {
        match self {
            Self::Forward => Self::Inverse,
            Self::Inverse => Self::Forward,
        }
    }

    /// Stable tag for hashing and serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Inverse => "inverse",
        }
    }
}

/// Interpolation method for LUTs.
///
/// `Default` and `Best` resolve to a concrete per-kind value when the
/// kernel is built: linear for 1D tables, tetrahedral for cubes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Nearest neighbor.
    Nearest,
    /// Linear interpolation.
    Linear,
    /// Tetrahedral interpolation (3D only).
    Tetrahedral,
    /// Cubic interpolation (1D only).
    Cubic,
    /// Per-kind default.
    #[default]
    Default,
    /// Best available for the kind.
    Best,
}

impl Interpolation {
    /// Stable tag for hashing and serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Linear => "linear",
            Self::Tetrahedral => "tetrahedral",
            Self::Cubic => "cubic",
            Self::Default => "default",
            Self::Best => "best",
        }
    }

    /// Concrete method for a 1D table.
    pub fn resolve_1d(self) -> Self {
        match self {
            Self::Default | Self::Best | Self::Tetrahedral | Self::Cubic => Self::Linear,
            other => other,
        }
    }

    /// Concrete method for a cube.
    pub fn resolve_3d(self) -> Self {
        match self {
            Self::Default | Self::Best | Self::Cubic => Self::Tetrahedral,
            other => other,
        }
    }
}

/// The closed set of op kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum OpData {
    /// 4x4 matrix + offset.
    Matrix(MatrixOpData),
    /// Piecewise-linear remap with optional open ends.
    Range(RangeOpData),
    /// Per-channel table lookup.
    Lut1d(Lut1dOpData),
    /// RGB cube lookup.
    Lut3d(Lut3dOpData),
    /// ASC CDL.
    Cdl(CdlOpData),
    /// Affine-wrapped logarithm.
    Log(LogOpData),
    /// Gamma / exponent curves.
    Gamma(GammaOpData),
    /// Named closed-form transform.
    FixedFunction(FixedFunctionOpData),
    /// Viewport exposure/contrast.
    ExposureContrast(ExposureContrastOpData),
    /// Structural marker, removed at finalize.
    NoOp(NoOpData),
}

macro_rules! impl_from {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for OpData {
            fn from(data: $ty) -> Self {
                OpData::$variant(data)
            }
        }
    };
}

impl_from!(Matrix, MatrixOpData);
impl_from!(Range, RangeOpData);
impl_from!(Lut1d, Lut1dOpData);
impl_from!(Lut3d, Lut3dOpData);
impl_from!(Cdl, CdlOpData);
impl_from!(Log, LogOpData);
impl_from!(Gamma, GammaOpData);
impl_from!(FixedFunction, FixedFunctionOpData);
impl_from!(ExposureContrast, ExposureContrastOpData);
impl_from!(NoOp, NoOpData);

impl OpData {
    /// Kind name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Matrix(_) => "Matrix",
            Self::Range(_) => "Range",
            Self::Lut1d(_) => "Lut1D",
            Self::Lut3d(_) => "Lut3D",
            Self::Cdl(_) => "CDL",
            Self::Log(_) => "Log",
            Self::Gamma(_) => "Gamma",
            Self::FixedFunction(_) => "FixedFunction",
            Self::ExposureContrast(_) => "ExposureContrast",
            Self::NoOp(_) => "NoOp",
        }
    }

    /// Parameter validation; see each variant.
    pub fn validate(&self) -> OpsResult<()> {
        match self {
            Self::Matrix(d) => d.validate(),
            Self::Range(d) => d.validate(),
            Self::Lut1d(d) => d.validate(),
            Self::Lut3d(d) => d.validate(),
            Self::Cdl(d) => d.validate(),
            Self::Log(d) => d.validate(),
            Self::Gamma(d) => d.validate(),
            Self::FixedFunction(d) => d.validate(),
            Self::ExposureContrast(d) => d.validate(),
            Self::NoOp(_) => Ok(()),
        }
    }

    /// Byte-exact identity under the op's own semantics.
    ///
    /// Ops whose "identity" parameters still clamp (basic gamma, v1.2
    /// CDL) report `false` here; the optimizer replaces them with an
    /// explicit clamp instead of dropping them.
    pub fn is_identity(&self) -> bool {
        match self {
            Self::Matrix(d) => d.is_identity(),
            Self::Range(d) => d.is_identity(),
            Self::Lut1d(d) => d.is_identity(),
            Self::Lut3d(d) => d.is_identity(),
            Self::Cdl(d) => d.is_identity() && !d.clamps(),
            Self::Log(d) => d.is_identity(),
            Self::Gamma(d) => d.is_identity() && !d.clamps(),
            Self::FixedFunction(d) => d.is_identity(),
            Self::ExposureContrast(d) => d.is_identity(),
            Self::NoOp(d) => d.is_identity(),
        }
    }

    /// Whether one output channel depends on other input channels.
    pub fn has_channel_crosstalk(&self) -> bool {
        match self {
            Self::Matrix(d) => d.has_channel_crosstalk(),
            Self::Range(d) => d.has_channel_crosstalk(),
            Self::Lut1d(d) => d.has_channel_crosstalk(),
            Self::Lut3d(d) => d.has_channel_crosstalk(),
            Self::Cdl(d) => d.has_channel_crosstalk(),
            Self::Log(d) => d.has_channel_crosstalk(),
            Self::Gamma(d) => d.has_channel_crosstalk(),
            Self::FixedFunction(d) => d.has_channel_crosstalk(),
            Self::ExposureContrast(d) => d.has_channel_crosstalk(),
            Self::NoOp(d) => d.has_channel_crosstalk(),
        }
    }

    /// Feeds canonical parameters to a hasher.
    pub fn hash_into(&self, h: &mut CacheIdHasher) {
        match self {
            Self::Matrix(d) => d.hash_into(h),
            Self::Range(d) => d.hash_into(h),
            Self::Lut1d(d) => d.hash_into(h),
            Self::Lut3d(d) => d.hash_into(h),
            Self::Cdl(d) => d.hash_into(h),
            Self::Log(d) => d.hash_into(h),
            Self::Gamma(d) => d.hash_into(h),
            Self::FixedFunction(d) => d.hash_into(h),
            Self::ExposureContrast(d) => d.hash_into(h),
            Self::NoOp(d) => d.hash_into(h),
        }
    }
}

/// One node of the op graph: parameters plus a direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    /// The op's declarative parameters.
    pub data: OpData,
    /// Application direction.
    pub direction: Direction,
}

impl Op {
    /// Forward op from data.
    pub fn new(data: OpData, direction: Direction) -> Self {
        Self { data, direction }
    }

    /// Forward convenience constructor.
    pub fn forward(data: impl Into<OpData>) -> Self {
        Self::new(data.into(), Direction::Forward)
    }

    /// Inverse convenience constructor.
    pub fn inverse(data: impl Into<OpData>) -> Self {
        Self::new(data.into(), Direction::Inverse)
    }

    /// The same op with the direction flipped.
    pub fn inverted(&self) -> Self {
        Self {
            data: self.data.clone(),
            direction: self.direction.inverse(),
        }
    }

    /// Identity under the op's semantics (direction does not matter for
    /// an identity).
    pub fn is_identity(&self) -> bool {
        self.data.is_identity()
    }

    /// Same op kind.
    pub fn is_same_type(&self, other: &Op) -> bool {
        std::mem::discriminant(&self.data) == std::mem::discriminant(&other.data)
    }

    /// True when applying `self` then `other` is an exact identity.
    ///
    /// The generic case is equal data with opposite directions; matrices
    /// additionally detect numerically inverse pairs.
    pub fn is_inverse_of(&self, other: &Op) -> bool {
        if self.data == other.data && self.direction == other.direction.inverse() {
            // A clamping kind (v1.2 CDL, basic gamma, bounded range)
            // only cancels with itself when nothing clamps.
            return match &self.data {
                OpData::Cdl(d) => !d.clamps(),
                OpData::Gamma(d) => !d.clamps(),
                OpData::Range(d) => d.is_identity(),
                _ => true,
            };
        }
        if let (OpData::Matrix(a), OpData::Matrix(b)) = (&self.data, &other.data) {
            if let (Ok(ma), Ok(mb)) = (a.resolved(self.direction), b.resolved(other.direction)) {
                return MatrixOpData::new(ma).is_inverse_of(&MatrixOpData::new(mb));
            }
        }
        false
    }

    /// Whether [`Op::combine_with`] can fuse the pair.
    pub fn can_combine_with(&self, other: &Op) -> bool {
        self.combined(other).is_some()
    }

    /// Fuses `self` followed by `other` into one op, if the kinds allow.
    pub fn combine_with(&self, other: &Op) -> Option<Op> {
        self.combined(other)
    }

    fn combined(&self, other: &Op) -> Option<Op> {
        match (&self.data, &other.data) {
            (OpData::Matrix(a), OpData::Matrix(b)) => {
                let ma = a.resolved(self.direction).ok()?;
                let mb = b.resolved(other.direction).ok()?;
                Some(Op::forward(
                    MatrixOpData::new(ma).compose(&MatrixOpData::new(mb)),
                ))
            }
            (OpData::Range(a), OpData::Range(b)) => {
                let ra = self.normalized_range(a)?;
                let rb = other.normalized_range(b)?;
                Some(Op::forward(ra.compose(&rb)))
            }
            (OpData::Gamma(a), OpData::Gamma(b)) => {
                if self.direction != Direction::Forward || other.direction != Direction::Forward {
                    return None;
                }
                a.compose(b).map(Op::forward)
            }
            (OpData::Lut1d(a), OpData::Lut1d(b)) => {
                if self.direction != Direction::Forward
                    || other.direction != Direction::Forward
                    || a.half_domain
                    || b.half_domain
                    || a.hue_adjust
                    || b.hue_adjust
                {
                    return None;
                }
                a.compose(b).map(Op::forward)
            }
            (OpData::ExposureContrast(a), OpData::ExposureContrast(b)) => {
                if self.direction != Direction::Forward || other.direction != Direction::Forward {
                    return None;
                }
                a.compose(b).map(Op::forward)
            }
            _ => None,
        }
    }

    fn normalized_range(&self, data: &RangeOpData) -> Option<RangeOpData> {
        match self.direction {
            Direction::Forward => Some(*data),
            Direction::Inverse => Some(data.inverted()),
        }
    }

    /// Deterministic content id of this op.
    pub fn cache_id(&self) -> String {
        let mut h = CacheIdHasher::new();
        self.data.hash_into(&mut h);
        h.put_str(self.direction.as_str());
        h.finish()
    }

    /// Builds the finalized CPU kernel for this op.
    pub fn cpu(&self, properties: &[DynamicProperty]) -> OpsResult<CpuKernel> {
        Ok(match &self.data {
            OpData::Matrix(d) => CpuKernel::Matrix(MatrixKernel::new(d, self.direction)?),
            OpData::Range(d) => CpuKernel::Range(RangeKernel::new(d, self.direction)),
            OpData::Lut1d(d) => CpuKernel::Lut1d(Lut1dKernel::new(d, self.direction)?),
            OpData::Lut3d(d) => CpuKernel::Lut3d(Lut3dKernel::new(d, self.direction)?),
            OpData::Cdl(d) => CpuKernel::Cdl(CdlKernel::new(d, self.direction)),
            OpData::Log(d) => CpuKernel::Log(LogKernel::new(d, self.direction)),
            OpData::Gamma(d) => CpuKernel::Gamma(GammaKernel::new(d, self.direction)),
            OpData::FixedFunction(d) => {
                CpuKernel::FixedFunction(FixedFunctionKernel::new(d, self.direction)?)
            }
            OpData::ExposureContrast(d) => CpuKernel::ExposureContrast(
                ExposureContrastKernel::new(d, self.direction, properties)?,
            ),
            OpData::NoOp(_) => CpuKernel::Noop,
        })
    }
}

/// Finalized per-op pixel kernel.
#[derive(Debug, Clone)]
pub enum CpuKernel {
    /// See [`MatrixKernel`].
    Matrix(MatrixKernel),
    /// See [`RangeKernel`].
    Range(RangeKernel),
    /// See [`Lut1dKernel`].
    Lut1d(Lut1dKernel),
    /// See [`Lut3dKernel`].
    Lut3d(Lut3dKernel),
    /// See [`CdlKernel`].
    Cdl(CdlKernel),
    /// See [`LogKernel`].
    Log(LogKernel),
    /// See [`GammaKernel`].
    Gamma(GammaKernel),
    /// See [`FixedFunctionKernel`].
    FixedFunction(FixedFunctionKernel),
    /// See [`ExposureContrastKernel`].
    ExposureContrast(ExposureContrastKernel),
    /// Structural marker that survived until finalize; does nothing.
    Noop,
}

impl CpuKernel {
    /// Applies the kernel to one RGBA pixel in place.
    #[inline]
    pub fn apply(&self, px: &mut [f32; 4]) {
        match self {
            Self::Matrix(k) => k.apply(px),
            Self::Range(k) => k.apply(px),
            Self::Lut1d(k) => k.apply(px),
            Self::Lut3d(k) => k.apply(px),
            Self::Cdl(k) => k.apply(px),
            Self::Log(k) => k.apply(px),
            Self::Gamma(k) => k.apply(px),
            Self::FixedFunction(k) => k.apply(px),
            Self::ExposureContrast(k) => k.apply(px),
            Self::Noop => {}
        }
    }
}

/// Top-level metadata carried by an op list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpListMetadata {
    /// Stable id from the serialization, if any.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Free-form descriptions.
    pub descriptions: Vec<String>,
    /// What the input pixels represent.
    pub input_descriptor: String,
    /// What the output pixels represent.
    pub output_descriptor: String,
}

/// Ordered sequence of ops plus metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpList {
    ops: Vec<Op>,
    /// Associated top-level metadata.
    pub metadata: OpListMetadata,
}

impl OpList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// List from ops with default metadata.
    pub fn from_ops(ops: Vec<Op>) -> Self {
        Self {
            ops,
            metadata: OpListMetadata::default(),
        }
    }

    /// Appends an op.
    pub fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    /// Appends every op of another list. The other list's metadata is
    /// adopted when this list has none yet (a processor built from a
    /// single file keeps that file's id and descriptors).
    pub fn extend(&mut self, other: OpList) {
        if self.metadata == OpListMetadata::default() {
            self.metadata = other.metadata;
        }
        self.ops.extend(other.ops);
    }

    /// The ops in order.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Mutable access for the optimizer.
    pub(crate) fn ops_mut(&mut self) -> &mut Vec<Op> {
        &mut self.ops
    }

    /// Number of ops.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Validates every op.
    pub fn validate(&self) -> OpsResult<()> {
        for op in &self.ops {
            op.data.validate()?;
        }
        Ok(())
    }

    /// Whether any op carries a dynamic parameter.
    pub fn is_dynamic(&self) -> bool {
        self.ops.iter().any(|op| {
            matches!(&op.data, OpData::ExposureContrast(d) if d.is_dynamic())
        })
    }

    /// Appends the inverse of this list (reversed order, flipped
    /// directions) to `out`.
    pub fn inverted(&self) -> OpList {
        OpList {
            ops: self.ops.iter().rev().map(Op::inverted).collect(),
            metadata: self.metadata.clone(),
        }
    }

    /// Deterministic content id of the whole list.
    pub fn cache_id(&self) -> String {
        let mut h = CacheIdHasher::new();
        h.put_u64(self.ops.len() as u64);
        for op in &self.ops {
            op.data.hash_into(&mut h);
            h.put_str(op.direction.as_str());
        }
        h.finish()
    }

    /// Builds kernels for every op, dropping the NoOp markers.
    pub fn finalize(&self) -> OpsResult<Vec<CpuKernel>> {
        self.finalize_with(&[])
    }

    /// Like [`OpList::finalize`] but binding dynamic properties.
    pub fn finalize_with(&self, properties: &[DynamicProperty]) -> OpsResult<Vec<CpuKernel>> {
        self.validate()?;
        let mut kernels = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            if matches!(op.data, OpData::NoOp(_)) {
                continue;
            }
            kernels.push(op.cpu(properties)?);
        }
        Ok(kernels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamma::GammaOpData;
    use crate::matrix::MatrixOpData;
    use crate::noop::NoOpData;
    use opencolor_math::Matrix44;

    #[test]
    fn inverse_pair_detection() {
        let fwd = Op::forward(GammaOpData::basic([2.0, 2.0, 2.0, 1.0]));
        let inv = Op::inverse(GammaOpData::basic([2.0, 2.0, 2.0, 1.0]));
        // Basic gamma clamps, so the pair does not cancel exactly.
        assert!(!fwd.is_inverse_of(&inv));

        let fwd = Op::forward(MatrixOpData::from_diagonal([2.0, 2.0, 2.0, 1.0]));
        let inv = Op::inverse(MatrixOpData::from_diagonal([2.0, 2.0, 2.0, 1.0]));
        assert!(fwd.is_inverse_of(&inv));
    }

    #[test]
    fn matrix_inverse_pair_numeric() {
        let a = MatrixOpData::from_diagonal([2.0, 4.0, 8.0, 1.0]);
        let b = MatrixOpData::new(a.matrix.inverse().unwrap());
        let fwd = Op::forward(a);
        let also_fwd = Op::forward(b);
        assert!(fwd.is_inverse_of(&also_fwd));
    }

    #[test]
    fn combine_matrices_resolving_directions() {
        let a = Op::forward(MatrixOpData::from_diagonal([2.0, 2.0, 2.0, 1.0]));
        let b = Op::inverse(MatrixOpData::from_diagonal([2.0, 2.0, 2.0, 1.0]));
        let fused = a.combine_with(&b).unwrap();
        assert!(fused.is_identity());
    }

    #[test]
    fn finalize_strips_markers() {
        let mut ops = OpList::new();
        ops.push(Op::forward(NoOpData::Look {
            name: "grade".into(),
        }));
        ops.push(Op::forward(MatrixOpData::from_diagonal([2.0, 2.0, 2.0, 1.0])));
        let kernels = ops.finalize().unwrap();
        assert_eq!(kernels.len(), 1);
    }

    #[test]
    fn cache_id_depends_on_direction() {
        let fwd = Op::forward(GammaOpData::basic([2.2, 2.2, 2.2, 1.0]));
        let inv = fwd.inverted();
        assert_ne!(fwd.cache_id(), inv.cache_id());
    }

    #[test]
    fn list_inversion_reverses() {
        let mut ops = OpList::new();
        ops.push(Op::forward(MatrixOpData::from_diagonal([2.0, 2.0, 2.0, 1.0])));
        ops.push(Op::forward(GammaOpData::basic([2.2, 2.2, 2.2, 1.0])));
        let inv = ops.inverted();
        assert!(matches!(inv.ops()[0].data, OpData::Gamma(_)));
        assert_eq!(inv.ops()[0].direction, Direction::Inverse);
    }
}
