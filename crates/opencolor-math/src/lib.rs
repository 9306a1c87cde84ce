//! # opencolor-math
//!
//! Math primitives for the opencolor engine.
//!
//! This crate provides the numeric foundation the op kernels build on:
//!
//! - [`Matrix44`] - 4x4 row-major matrices with offset, composition and
//!   analytic inversion
//! - Interpolation utilities ([`lerp`], [`inverse_lerp`])
//! - [`simd`] - 4-lane f32 helpers so the same kernel source expresses
//!   scalar and vector paths
//!
//! # Design
//!
//! All matrix operations assume **row-major** storage and **column
//! vectors**:
//!
//! ```text
//! result = matrix * vector + offset
//! ```
//!
//! # Usage
//!
//! ```rust
//! use opencolor_math::Matrix44;
//!
//! let m = Matrix44::from_diagonal([2.0, 2.0, 2.0, 1.0]);
//! let out = m.transform([0.25, 0.5, 0.75, 1.0]);
//! assert_eq!(out, [0.5, 1.0, 1.5, 1.0]);
//! ```
//!
//! # Dependencies
//!
//! - [`glam`] - double-precision matrix inversion
//! - [`wide`] - portable SIMD on stable Rust

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod mat4;
mod interp;
pub mod simd;

pub use mat4::{Matrix44, SINGULARITY_THRESHOLD};
pub use interp::{lerp, inverse_lerp, clamp01};
