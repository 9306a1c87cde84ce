//! User-level transform requests.
//!
//! A [`Transform`] describes *what* conversion to perform; the op builder
//! lowers it into the numeric op list. Variants mirror the op kinds plus
//! the higher-level composites (color-space pair, display/view, look
//! chain, group, file reference).

use std::path::PathBuf;

use opencolor_ops::cdl::CdlStyle;
use opencolor_ops::exposure_contrast::ExposureContrastStyle;
use opencolor_ops::fixed_function::FixedFunctionStyle;
use opencolor_ops::gamma::GammaStyle;
use opencolor_ops::noop::{Allocation, AllocationData};
use opencolor_ops::{CacheIdHasher, Direction, Interpolation};

/// A color transform request.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// 4x4 matrix + offset.
    Matrix(MatrixTransform),
    /// Range remap.
    Range(RangeTransform),
    /// Plain exponent.
    Exponent(ExponentTransform),
    /// Exponent with linear toe.
    ExponentWithLinear(ExponentWithLinearTransform),
    /// Affine log.
    Log(LogTransform),
    /// ASC CDL.
    Cdl(CdlTransform),
    /// Fixed function.
    FixedFunction(FixedFunctionTransform),
    /// Viewport exposure/contrast.
    ExposureContrast(ExposureContrastTransform),
    /// Inline 1D LUT.
    Lut1d(Lut1dTransform),
    /// Inline 3D LUT.
    Lut3d(Lut3dTransform),
    /// Ops read from a file.
    File(FileTransform),
    /// Conversion between two named color spaces.
    ColorSpace(ColorSpaceTransform),
    /// Conversion through a display/view pair.
    DisplayView(DisplayViewTransform),
    /// A look chain between two color spaces.
    Look(LookTransform),
    /// Ordered group of transforms.
    Group(GroupTransform),
    /// Allocation marker for the legacy baker.
    Allocation(AllocationTransform),
}

impl Transform {
    /// Convenience group constructor.
    pub fn group(transforms: Vec<Transform>) -> Self {
        Self::Group(GroupTransform {
            transforms,
            direction: Direction::Forward,
        })
    }

    /// Convenience file constructor.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(FileTransform {
            src: path.into(),
            ccc_id: None,
            interpolation: Interpolation::Default,
            direction: Direction::Forward,
        })
    }

    /// The transform's direction field.
    pub fn direction(&self) -> Direction {
        match self {
            Self::Matrix(t) => t.direction,
            Self::Range(t) => t.direction,
            Self::Exponent(t) => t.direction,
            Self::ExponentWithLinear(t) => t.direction,
            Self::Log(t) => t.direction,
            Self::Cdl(t) => t.direction,
            Self::FixedFunction(t) => t.direction,
            Self::ExposureContrast(t) => t.direction,
            Self::Lut1d(t) => t.direction,
            Self::Lut3d(t) => t.direction,
            Self::File(t) => t.direction,
            Self::ColorSpace(t) => t.direction,
            Self::DisplayView(t) => t.direction,
            Self::Look(t) => t.direction,
            Self::Group(t) => t.direction,
            Self::Allocation(t) => t.direction,
        }
    }

    /// The same request with the direction flipped.
    pub fn inverse(mut self) -> Self {
        let flip = |d: &mut Direction| *d = d.inverse();
        match &mut self {
            Self::Matrix(t) => flip(&mut t.direction),
            Self::Range(t) => flip(&mut t.direction),
            Self::Exponent(t) => flip(&mut t.direction),
            Self::ExponentWithLinear(t) => flip(&mut t.direction),
            Self::Log(t) => flip(&mut t.direction),
            Self::Cdl(t) => flip(&mut t.direction),
            Self::FixedFunction(t) => flip(&mut t.direction),
            Self::ExposureContrast(t) => flip(&mut t.direction),
            Self::Lut1d(t) => flip(&mut t.direction),
            Self::Lut3d(t) => flip(&mut t.direction),
            Self::File(t) => flip(&mut t.direction),
            Self::ColorSpace(t) => flip(&mut t.direction),
            Self::DisplayView(t) => flip(&mut t.direction),
            Self::Look(t) => flip(&mut t.direction),
            Self::Group(t) => flip(&mut t.direction),
            Self::Allocation(t) => flip(&mut t.direction),
        }
        self
    }

    /// Feeds a canonical description of the request into a hasher; the
    /// processor cache keys on this.
    pub fn hash_into(&self, h: &mut CacheIdHasher) {
        match self {
            Self::Matrix(t) => {
                h.put_str("matrix").put_str(t.direction.as_str());
                h.put_f64s(&t.matrix);
                h.put_f64s(&t.offset);
            }
            Self::Range(t) => {
                h.put_str("range").put_str(t.direction.as_str());
                for v in [t.min_in, t.max_in, t.min_out, t.max_out] {
                    match v {
                        Some(x) => h.put_bool(true).put_f64(x),
                        None => h.put_bool(false),
                    };
                }
            }
            Self::Exponent(t) => {
                h.put_str("exponent").put_str(t.direction.as_str());
                h.put_f64s(&t.value);
                h.put_str(t.negative_style.as_str());
            }
            Self::ExponentWithLinear(t) => {
                h.put_str("exponentLinear").put_str(t.direction.as_str());
                h.put_f64s(&t.gamma);
                h.put_f64s(&t.offset);
            }
            Self::Log(t) => {
                h.put_str("log").put_str(t.direction.as_str());
                h.put_f64(t.base);
                h.put_f64s(&t.log_side_slope);
                h.put_f64s(&t.log_side_offset);
                h.put_f64s(&t.lin_side_slope);
                h.put_f64s(&t.lin_side_offset);
            }
            Self::Cdl(t) => {
                h.put_str("cdl")
                    .put_str(t.direction.as_str())
                    .put_str(t.style.as_str());
                h.put_f64s(&t.slope);
                h.put_f64s(&t.offset);
                h.put_f64s(&t.power);
                h.put_f64(t.saturation);
            }
            Self::FixedFunction(t) => {
                h.put_str("fixedFunction")
                    .put_str(t.direction.as_str())
                    .put_str(t.style.as_str());
                h.put_f64s(&t.params);
            }
            Self::ExposureContrast(t) => {
                h.put_str("exposureContrast")
                    .put_str(t.direction.as_str())
                    .put_str(t.style.as_str());
                h.put_f64s(&[t.exposure, t.contrast, t.gamma, t.pivot]);
                h.put_bool(t.dynamic_exposure);
                h.put_bool(t.dynamic_contrast);
                h.put_bool(t.dynamic_gamma);
            }
            Self::Lut1d(t) => {
                h.put_str("lut1d").put_str(t.direction.as_str());
                h.put_f32s(&t.samples);
                h.put_bool(t.half_domain);
                h.put_bool(t.hue_adjust);
                h.put_str(t.interpolation.as_str());
            }
            Self::Lut3d(t) => {
                h.put_str("lut3d").put_str(t.direction.as_str());
                h.put_u64(t.edge as u64);
                h.put_f32s(&t.samples);
                h.put_str(t.interpolation.as_str());
            }
            Self::File(t) => {
                h.put_str("file").put_str(t.direction.as_str());
                h.put_str(&t.src.to_string_lossy());
                h.put_str(t.ccc_id.as_deref().unwrap_or(""));
                h.put_str(t.interpolation.as_str());
            }
            Self::ColorSpace(t) => {
                h.put_str("colorspace").put_str(t.direction.as_str());
                h.put_str(&t.src).put_str(&t.dst);
                h.put_bool(t.data_bypass);
            }
            Self::DisplayView(t) => {
                h.put_str("displayview").put_str(t.direction.as_str());
                h.put_str(&t.src)
                    .put_str(&t.display)
                    .put_str(&t.view);
            }
            Self::Look(t) => {
                h.put_str("look").put_str(t.direction.as_str());
                h.put_str(&t.src).put_str(&t.dst).put_str(&t.looks);
            }
            Self::Group(t) => {
                h.put_str("group").put_str(t.direction.as_str());
                h.put_u64(t.transforms.len() as u64);
                for child in &t.transforms {
                    child.hash_into(h);
                }
            }
            Self::Allocation(t) => {
                h.put_str("allocation").put_str(t.direction.as_str());
                h.put_str(t.allocation.allocation.as_str());
                h.put_f64s(&t.allocation.vars);
            }
        }
    }

    /// Canonical id of the request tree.
    pub fn cache_id(&self) -> String {
        let mut h = CacheIdHasher::new();
        self.hash_into(&mut h);
        h.finish()
    }
}

/// 4x4 matrix + offset request.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixTransform {
    /// Row-major 4x4 matrix.
    pub matrix: [f64; 16],
    /// RGBA offset.
    pub offset: [f64; 4],
    /// Direction.
    pub direction: Direction,
}

impl Default for MatrixTransform {
    fn default() -> Self {
        Self {
            matrix: [
                1.0, 0.0, 0.0, 0.0,
                0.0, 1.0, 0.0, 0.0,
                0.0, 0.0, 1.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ],
            offset: [0.0; 4],
            direction: Direction::Forward,
        }
    }
}

/// Range remap request; `None` bounds are open.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RangeTransform {
    /// Lower input bound.
    pub min_in: Option<f64>,
    /// Upper input bound.
    pub max_in: Option<f64>,
    /// Lower output bound.
    pub min_out: Option<f64>,
    /// Upper output bound.
    pub max_out: Option<f64>,
    /// Direction.
    pub direction: Direction,
}

/// Handling of negative values in an exponent request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegativeStyle {
    /// Clamp to zero before the power.
    #[default]
    Clamp,
    /// Sign-preserving odd extension.
    Mirror,
    /// Pass negatives through unchanged.
    PassThru,
}

impl NegativeStyle {
    /// Stable tag for hashing.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clamp => "clamp",
            Self::Mirror => "mirror",
            Self::PassThru => "passThru",
        }
    }

    /// The gamma style this maps onto.
    pub fn gamma_style(&self) -> GammaStyle {
        match self {
            Self::Clamp => GammaStyle::Basic,
            Self::Mirror => GammaStyle::BasicMirror,
            Self::PassThru => GammaStyle::BasicPassThru,
        }
    }
}

/// Plain per-channel exponent request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentTransform {
    /// Per-channel exponents (RGBA).
    pub value: [f64; 4],
    /// Negative handling.
    pub negative_style: NegativeStyle,
    /// Direction.
    pub direction: Direction,
}

impl Default for ExponentTransform {
    fn default() -> Self {
        Self {
            value: [1.0; 4],
            negative_style: NegativeStyle::default(),
            direction: Direction::Forward,
        }
    }
}

/// Exponent with linear toe (sRGB-shaped) request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentWithLinearTransform {
    /// Per-channel gamma (RGBA).
    pub gamma: [f64; 4],
    /// Per-channel toe offset (RGBA).
    pub offset: [f64; 4],
    /// Sign-preserving odd extension instead of clamping.
    pub mirror: bool,
    /// Direction.
    pub direction: Direction,
}

impl Default for ExponentWithLinearTransform {
    fn default() -> Self {
        Self {
            gamma: [1.0; 4],
            offset: [0.0; 4],
            mirror: false,
            direction: Direction::Forward,
        }
    }
}

/// Affine log request.
#[derive(Debug, Clone, PartialEq)]
pub struct LogTransform {
    /// Logarithm base.
    pub base: f64,
    /// Log-side slope per channel.
    pub log_side_slope: [f64; 3],
    /// Log-side offset per channel.
    pub log_side_offset: [f64; 3],
    /// Linear-side slope per channel.
    pub lin_side_slope: [f64; 3],
    /// Linear-side offset per channel.
    pub lin_side_offset: [f64; 3],
    /// Direction (forward is lin-to-log).
    pub direction: Direction,
}

impl Default for LogTransform {
    fn default() -> Self {
        Self {
            base: 2.0,
            log_side_slope: [1.0; 3],
            log_side_offset: [0.0; 3],
            lin_side_slope: [1.0; 3],
            lin_side_offset: [0.0; 3],
            direction: Direction::Forward,
        }
    }
}

/// ASC CDL request.
#[derive(Debug, Clone, PartialEq)]
pub struct CdlTransform {
    /// Slope per channel.
    pub slope: [f64; 3],
    /// Offset per channel.
    pub offset: [f64; 3],
    /// Power per channel.
    pub power: [f64; 3],
    /// Saturation.
    pub saturation: f64,
    /// Clamp family.
    pub style: CdlStyle,
    /// Direction.
    pub direction: Direction,
}

impl Default for CdlTransform {
    fn default() -> Self {
        Self {
            slope: [1.0; 3],
            offset: [0.0; 3],
            power: [1.0; 3],
            saturation: 1.0,
            style: CdlStyle::default(),
            direction: Direction::Forward,
        }
    }
}

/// Fixed-function request.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedFunctionTransform {
    /// Which closed-form transform.
    pub style: FixedFunctionStyle,
    /// Style parameters.
    pub params: Vec<f64>,
    /// Direction.
    pub direction: Direction,
}

/// Exposure/contrast request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureContrastTransform {
    /// Style (linear / video / log).
    pub style: ExposureContrastStyle,
    /// Exposure in stops.
    pub exposure: f64,
    /// Contrast.
    pub contrast: f64,
    /// Gamma.
    pub gamma: f64,
    /// Pivot.
    pub pivot: f64,
    /// Expose exposure as a dynamic property.
    pub dynamic_exposure: bool,
    /// Expose contrast as a dynamic property.
    pub dynamic_contrast: bool,
    /// Expose gamma as a dynamic property.
    pub dynamic_gamma: bool,
    /// Direction.
    pub direction: Direction,
}

impl Default for ExposureContrastTransform {
    fn default() -> Self {
        Self {
            style: ExposureContrastStyle::Linear,
            exposure: 0.0,
            contrast: 1.0,
            gamma: 1.0,
            pivot: 0.18,
            dynamic_exposure: false,
            dynamic_contrast: false,
            dynamic_gamma: false,
            direction: Direction::Forward,
        }
    }
}

/// Inline 1D LUT request.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut1dTransform {
    /// Interleaved RGB samples.
    pub samples: Vec<f32>,
    /// Raw half bit-pattern indexing.
    pub half_domain: bool,
    /// ACES hue-preserving lookup.
    pub hue_adjust: bool,
    /// Interpolation.
    pub interpolation: Interpolation,
    /// Direction.
    pub direction: Direction,
}

/// Inline 3D LUT request.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut3dTransform {
    /// Interleaved RGB nodes, red fastest.
    pub samples: Vec<f32>,
    /// Cube edge.
    pub edge: usize,
    /// Interpolation.
    pub interpolation: Interpolation,
    /// Direction.
    pub direction: Direction,
}

/// File-reference request.
#[derive(Debug, Clone, PartialEq)]
pub struct FileTransform {
    /// Path, possibly containing context placeholders.
    pub src: PathBuf,
    /// Correction id for `.ccc` collections.
    pub ccc_id: Option<String>,
    /// Interpolation override for LUT payloads.
    pub interpolation: Interpolation,
    /// Direction.
    pub direction: Direction,
}

/// Conversion between two named color spaces (or roles).
#[derive(Debug, Clone, PartialEq)]
pub struct ColorSpaceTransform {
    /// Source color-space or role name.
    pub src: String,
    /// Destination color-space or role name.
    pub dst: String,
    /// When false, `isData` spaces are converted numerically anyway.
    pub data_bypass: bool,
    /// Direction.
    pub direction: Direction,
}

impl ColorSpaceTransform {
    /// Conversion with data bypass enabled (the default).
    pub fn new(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            data_bypass: true,
            direction: Direction::Forward,
        }
    }
}

/// Conversion through a display/view pair.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayViewTransform {
    /// Source color-space or role name.
    pub src: String,
    /// Display name.
    pub display: String,
    /// View name.
    pub view: String,
    /// Apply the view's looks.
    pub apply_looks: bool,
    /// Direction.
    pub direction: Direction,
}

/// A look chain between two color spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct LookTransform {
    /// Source color-space or role name.
    pub src: String,
    /// Destination color-space or role name.
    pub dst: String,
    /// Look specification, e.g. `"+shot_grade, -neutral | backup"`.
    pub looks: String,
    /// Direction.
    pub direction: Direction,
}

/// Ordered group of transforms; flattened during building.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupTransform {
    /// Children, applied in order.
    pub transforms: Vec<Transform>,
    /// Direction.
    pub direction: Direction,
}

/// Allocation marker request for the legacy baker.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationTransform {
    /// The allocation mapping.
    pub allocation: AllocationData,
    /// Direction.
    pub direction: Direction,
}

impl Default for AllocationTransform {
    fn default() -> Self {
        Self {
            allocation: AllocationData {
                allocation: Allocation::Uniform,
                vars: vec![0.0, 1.0],
            },
            direction: Direction::Forward,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_flips_direction() {
        let t = Transform::Cdl(CdlTransform::default());
        assert_eq!(t.direction(), Direction::Forward);
        let inv = t.inverse();
        assert_eq!(inv.direction(), Direction::Inverse);
    }

    #[test]
    fn group_inverse_flips_only_direction() {
        let group = Transform::group(vec![
            Transform::Matrix(MatrixTransform::default()),
            Transform::Cdl(CdlTransform::default()),
        ]);
        let inv = group.inverse();
        match inv {
            Transform::Group(g) => {
                assert_eq!(g.direction, Direction::Inverse);
                assert_eq!(g.transforms.len(), 2);
            }
            _ => panic!("expected group"),
        }
    }

    #[test]
    fn cache_id_distinguishes_requests() {
        let a = Transform::ColorSpace(ColorSpaceTransform::new("ACEScg", "sRGB"));
        let b = Transform::ColorSpace(ColorSpaceTransform::new("ACEScg", "Rec709"));
        assert_ne!(a.cache_id(), b.cache_id());
        assert_ne!(a.cache_id(), a.clone().inverse().cache_id());
    }
}
