//! NoOp marker ops.
//!
//! Markers are numeric identities that carry structural information while
//! a transform is being lowered: file breadcrumbs detect reference cycles,
//! look breadcrumbs delimit look chains, and allocation markers tell the
//! legacy baker where a color-space boundary sits so it can insert shaper
//! curves. All of them are removed when the op list is finalized.

use crate::hash::CacheIdHasher;

/// How a color space maps into the finite normalized range used when
/// baking to 3D LUTs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Allocation {
    /// Uniform mapping between the allocation vars.
    #[default]
    Uniform,
    /// Log2 mapping; an optional third var gives the linear offset.
    Lg2,
}

impl Allocation {
    /// Stable tag for hashing and serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Lg2 => "lg2",
        }
    }
}

/// Allocation info attached to an [`Allocation`] marker.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationData {
    /// Mapping family.
    pub allocation: Allocation,
    /// Two or three vars: min, max, and for lg2 an optional offset.
    pub vars: Vec<f64>,
}

impl Default for AllocationData {
    fn default() -> Self {
        Self {
            allocation: Allocation::Uniform,
            vars: vec![0.0, 1.0],
        }
    }
}

/// The marker variants.
#[derive(Debug, Clone, PartialEq)]
pub enum NoOpData {
    /// Brackets the ops read from a file; used for cycle detection.
    File {
        /// Resolved path of the file.
        path: String,
    },
    /// Brackets a look's ops.
    Look {
        /// Look name.
        name: String,
    },
    /// Marks a color-space boundary for the legacy baker.
    Allocation(AllocationData),
}

impl NoOpData {
    /// Markers never alter pixels.
    pub fn is_identity(&self) -> bool {
        true
    }

    /// Markers are separable (they do nothing).
    pub fn has_channel_crosstalk(&self) -> bool {
        false
    }

    /// Feeds canonical parameters to the hasher.
    pub fn hash_into(&self, h: &mut CacheIdHasher) {
        match self {
            Self::File { path } => {
                h.put_str("fileNoOp").put_str(path);
            }
            Self::Look { name } => {
                h.put_str("lookNoOp").put_str(name);
            }
            Self::Allocation(data) => {
                h.put_str("allocationNoOp").put_str(data.allocation.as_str());
                h.put_f64s(&data.vars);
            }
        }
    }
}
