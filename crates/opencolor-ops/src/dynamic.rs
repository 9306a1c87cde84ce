//! Dynamic properties for runtime parameter adjustment.
//!
//! Exposure, contrast and gamma on an exposure/contrast op may be marked
//! *dynamic*: the processor then hands the host a [`DynamicProperty`]
//! whose value can be changed after the processor has been built, without
//! recompiling the op chain. The CPU kernel and the GPU uniform getters
//! read through the same shared cell, so the next `apply` (or the next
//! uniform refresh) picks up the new value.
//!
//! Writes are intentionally unsynchronized with `apply`: the storage is a
//! single relaxed atomic, so a torn logical state (one op updated, another
//! not) cannot occur within a property, but the host must not mutate a
//! property while an `apply` call is in flight if it needs frame-exact
//! results.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Which parameter of an op a dynamic property drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicPropertyType {
    /// Exposure in stops.
    Exposure,
    /// Contrast multiplier around the pivot.
    Contrast,
    /// Gamma power.
    Gamma,
}

impl DynamicPropertyType {
    /// Stable tag for cache ids and shader resource names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exposure => "exposure",
            Self::Contrast => "contrast",
            Self::Gamma => "gamma",
        }
    }
}

/// A shared mutable f64 cell owned jointly by the processor and every op
/// that opted in.
#[derive(Debug)]
pub struct DynamicValue {
    bits: AtomicU64,
}

impl DynamicValue {
    fn new(v: f64) -> Self {
        Self {
            bits: AtomicU64::new(v.to_bits()),
        }
    }

    /// Reads the current value.
    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Writes a new value.
    #[inline]
    pub fn set(&self, v: f64) {
        self.bits.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// Handle to one dynamic property of a processor.
///
/// Cloning the handle shares the underlying cell.
#[derive(Debug, Clone)]
pub struct DynamicProperty {
    kind: DynamicPropertyType,
    value: Arc<DynamicValue>,
}

impl DynamicProperty {
    /// Creates a property with an initial value.
    pub fn new(kind: DynamicPropertyType, initial: f64) -> Self {
        Self {
            kind,
            value: Arc::new(DynamicValue::new(initial)),
        }
    }

    /// The parameter this property drives.
    #[inline]
    pub fn kind(&self) -> DynamicPropertyType {
        self.kind
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> f64 {
        self.value.get()
    }

    /// Updates the value; every op sharing the cell sees it on the next
    /// apply.
    #[inline]
    pub fn set(&self, v: f64) {
        self.value.set(v);
    }

    /// Shared cell for kernels and uniform getters.
    pub(crate) fn cell(&self) -> Arc<DynamicValue> {
        Arc::clone(&self.value)
    }
}

/// Resolved source for one exposure/contrast parameter: either a constant
/// baked at finalize time or a live dynamic cell.
#[derive(Debug, Clone)]
pub enum ParamSource {
    /// Fixed at finalize.
    Constant(f64),
    /// Driven by a dynamic property.
    Dynamic(Arc<DynamicValue>),
}

impl ParamSource {
    /// Current value of the parameter.
    #[inline]
    pub fn get(&self) -> f64 {
        match self {
            Self::Constant(v) => *v,
            Self::Dynamic(cell) => cell.get(),
        }
    }

    /// Whether this parameter can change after finalize.
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }
}

impl From<&DynamicProperty> for ParamSource {
    fn from(p: &DynamicProperty) -> Self {
        Self::Dynamic(p.cell())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_is_visible_through_clone() {
        let p = DynamicProperty::new(DynamicPropertyType::Exposure, 0.0);
        let q = p.clone();
        p.set(1.5);
        assert_eq!(q.get(), 1.5);
    }

    #[test]
    fn param_source_tracks_cell() {
        let p = DynamicProperty::new(DynamicPropertyType::Gamma, 1.0);
        let src = ParamSource::from(&p);
        assert!(src.is_dynamic());
        p.set(2.2);
        assert_eq!(src.get(), 2.2);
    }
}
