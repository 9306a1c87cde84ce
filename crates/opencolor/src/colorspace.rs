//! Color space definition.
//!
//! A color space names a pixel-encoding state and carries transforms to
//! and from its reference space. Either direction suffices; the other is
//! derived by inverting.
//!
//! # Example
//!
//! ```
//! use opencolor::{ColorSpace, Encoding};
//!
//! let cs = ColorSpace::builder("ACEScg")
//!     .family("ACES/Working")
//!     .encoding(Encoding::SceneLinear)
//!     .description("ACES CG working space")
//!     .build();
//!
//! assert_eq!(cs.name(), "ACEScg");
//! assert_eq!(cs.encoding(), Encoding::SceneLinear);
//! ```

use opencolor_ops::noop::{Allocation, AllocationData};

use crate::transform::Transform;
use crate::types::{BitDepth, ReferenceSpaceType};

/// Pixel-encoding class of a color space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    /// Scene-referred linear.
    SceneLinear,
    /// Display-referred linear.
    DisplayLinear,
    /// Logarithmic encoding.
    Log,
    /// SDR video (OETF-encoded).
    Sdr,
    /// HDR video (PQ, HLG).
    Hdr,
    /// Non-color data.
    Data,
    /// Unspecified.
    #[default]
    Unknown,
}

impl Encoding {
    /// Parses the config string form.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "scene-linear" | "scene_linear" | "linear" => Self::SceneLinear,
            "display-linear" | "display_linear" => Self::DisplayLinear,
            "log" => Self::Log,
            "sdr-video" | "sdr_video" | "sdr" => Self::Sdr,
            "hdr-video" | "hdr_video" | "hdr" => Self::Hdr,
            "data" => Self::Data,
            _ => Self::Unknown,
        }
    }

    /// The config string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SceneLinear => "scene-linear",
            Self::DisplayLinear => "display-linear",
            Self::Log => "log",
            Self::Sdr => "sdr-video",
            Self::Hdr => "hdr-video",
            Self::Data => "data",
            Self::Unknown => "",
        }
    }
}

/// A named color space.
#[derive(Debug, Clone)]
pub struct ColorSpace {
    name: String,
    aliases: Vec<String>,
    family: String,
    equality_group: String,
    description: String,
    encoding: Encoding,
    categories: Vec<String>,
    bit_depth: BitDepth,
    is_data: bool,
    reference_space: ReferenceSpaceType,
    allocation: AllocationData,
    to_reference: Option<Transform>,
    from_reference: Option<Transform>,
}

impl ColorSpace {
    /// Starts a builder.
    pub fn builder(name: impl Into<String>) -> ColorSpaceBuilder {
        ColorSpaceBuilder::new(name)
    }

    /// The unique name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alternative names.
    #[inline]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Hierarchical family string (separator set by the config).
    #[inline]
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Spaces in the same equality group convert as identity.
    #[inline]
    pub fn equality_group(&self) -> &str {
        &self.equality_group
    }

    /// Free-form description.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Encoding class.
    #[inline]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// UI category tags.
    #[inline]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Preferred bit depth.
    #[inline]
    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    /// Non-color data flag; data spaces bypass numeric transforms.
    #[inline]
    pub fn is_data(&self) -> bool {
        self.is_data
    }

    /// Which reference this space relates to.
    #[inline]
    pub fn reference_space(&self) -> ReferenceSpaceType {
        self.reference_space
    }

    /// Allocation info used when baking to finite-range LUTs.
    #[inline]
    pub fn allocation(&self) -> &AllocationData {
        &self.allocation
    }

    /// Transform from this space to the reference, if declared.
    #[inline]
    pub fn to_reference(&self) -> Option<&Transform> {
        self.to_reference.as_ref()
    }

    /// Transform from the reference to this space, if declared.
    #[inline]
    pub fn from_reference(&self) -> Option<&Transform> {
        self.from_reference.as_ref()
    }

    /// Whether a name or alias matches, case-insensitively.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// Builder for [`ColorSpace`].
#[derive(Debug, Clone)]
pub struct ColorSpaceBuilder {
    inner: ColorSpace,
}

impl ColorSpaceBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            inner: ColorSpace {
                name: name.into(),
                aliases: Vec::new(),
                family: String::new(),
                equality_group: String::new(),
                description: String::new(),
                encoding: Encoding::default(),
                categories: Vec::new(),
                bit_depth: BitDepth::default(),
                is_data: false,
                reference_space: ReferenceSpaceType::Scene,
                allocation: AllocationData {
                    allocation: Allocation::Uniform,
                    vars: vec![0.0, 1.0],
                },
                to_reference: None,
                from_reference: None,
            },
        }
    }

    /// Adds an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.inner.aliases.push(alias.into());
        self
    }

    /// Sets the family string.
    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.inner.family = family.into();
        self
    }

    /// Sets the equality group.
    pub fn equality_group(mut self, group: impl Into<String>) -> Self {
        self.inner.equality_group = group.into();
        self
    }

    /// Sets the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.inner.description = desc.into();
        self
    }

    /// Sets the encoding class.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.inner.encoding = encoding;
        self
    }

    /// Adds a category tag.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.inner.categories.push(category.into());
        self
    }

    /// Sets the preferred bit depth.
    pub fn bit_depth(mut self, depth: BitDepth) -> Self {
        self.inner.bit_depth = depth;
        self
    }

    /// Marks the space as non-color data.
    pub fn is_data(mut self, is_data: bool) -> Self {
        self.inner.is_data = is_data;
        self
    }

    /// Sets the reference-space type.
    pub fn reference_space(mut self, rs: ReferenceSpaceType) -> Self {
        self.inner.reference_space = rs;
        self
    }

    /// Sets the allocation info.
    pub fn allocation(mut self, allocation: Allocation, vars: Vec<f64>) -> Self {
        self.inner.allocation = AllocationData { allocation, vars };
        self
    }

    /// Sets the to-reference transform.
    pub fn to_reference(mut self, t: Transform) -> Self {
        self.inner.to_reference = Some(t);
        self
    }

    /// Sets the from-reference transform.
    pub fn from_reference(mut self, t: Transform) -> Self {
        self.inner.from_reference = Some(t);
        self
    }

    /// Finishes the color space.
    pub fn build(self) -> ColorSpace {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_round_trip() {
        let cs = ColorSpace::builder("ACEScct")
            .alias("acescct")
            .family("ACES/Log")
            .encoding(Encoding::Log)
            .is_data(false)
            .build();
        assert_eq!(cs.name(), "ACEScct");
        assert!(cs.matches_name("ACESCCT"));
        assert!(cs.matches_name("acescct"));
        assert_eq!(cs.encoding(), Encoding::Log);
    }

    #[test]
    fn encoding_parse() {
        assert_eq!(Encoding::parse("scene-linear"), Encoding::SceneLinear);
        assert_eq!(Encoding::parse("data"), Encoding::Data);
        assert_eq!(Encoding::parse("???"), Encoding::Unknown);
    }
}
