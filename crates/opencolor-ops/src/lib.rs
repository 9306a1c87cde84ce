//! # opencolor-ops
//!
//! The operation model of the opencolor engine.
//!
//! A color transform is executed as an ordered list of *ops* - small,
//! numerically concrete primitives (matrix, LUT, CDL, log, gamma, ...).
//! This crate provides:
//!
//! - One data struct per op kind with validation, identity predicates and
//!   content hashing ([`matrix`], [`range`], [`lut1d`], [`lut3d`], [`cdl`],
//!   [`log_op`], [`gamma`], [`fixed_function`], [`exposure_contrast`])
//! - [`Op`] / [`OpList`] - the graph node and the unit the optimizer
//!   rewrites
//! - [`CpuKernel`] - finalized per-op pixel kernels built on the 4-lane
//!   helpers from `opencolor-math`
//! - [`optimize`] - the fixed-point rewrite pass (identity removal,
//!   inverse-pair collapse, same-type fusion)
//! - [`dynamic`] - runtime-adjustable exposure/contrast/gamma cells
//!
//! # Example
//!
//! ```rust
//! use opencolor_ops::{Op, OpList, Direction};
//! use opencolor_ops::matrix::MatrixOpData;
//! use opencolor_math::Matrix44;
//!
//! let mut ops = OpList::new();
//! ops.push(Op::new(MatrixOpData::new(Matrix44::from_scale(2.0)).into(),
//!                  Direction::Forward));
//!
//! let kernels = ops.finalize().unwrap();
//! let mut px = [0.25_f32, 0.25, 0.25, 1.0];
//! for k in &kernels {
//!     k.apply(&mut px);
//! }
//! assert!((px[0] - 0.5).abs() < 1e-6);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod hash;
mod op;

pub mod matrix;
pub mod range;
pub mod lut1d;
pub mod lut3d;
pub mod cdl;
pub mod log_op;
pub mod gamma;
pub mod fixed_function;
pub mod exposure_contrast;
pub mod noop;
pub mod dynamic;
pub mod optimize;

pub use error::{OpsError, OpsResult};
pub use hash::CacheIdHasher;
pub use op::{CpuKernel, Direction, Interpolation, Op, OpData, OpList, OpListMetadata};
pub use optimize::{optimize, OptimizationFlags};
pub use dynamic::{DynamicProperty, DynamicPropertyType};

/// Default luma coefficients (Rec.709) used by saturation-carrying ops
/// when the config does not override them.
pub const DEFAULT_LUMA: [f64; 3] = [0.2126, 0.7152, 0.0722];
