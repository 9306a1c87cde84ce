//! # opencolor
//!
//! A color-management engine for content-creation and rendering
//! pipelines. A [`Config`] describes the color universe of a project -
//! color spaces, roles, displays, views, looks and rules - and hands out
//! [`Processor`]s that convert pixels between named states, either on
//! the CPU or as generated shader source for the GPU.
//!
//! # Quick start
//!
//! ```
//! use opencolor::{ColorSpace, Config, Encoding, Transform};
//! use opencolor::transform::{ExponentTransform, NegativeStyle};
//!
//! let config = Config::builder()
//!     .colorspace(ColorSpace::builder("lin").encoding(Encoding::SceneLinear).build())
//!     .colorspace(
//!         ColorSpace::builder("g24")
//!             .from_reference(Transform::Exponent(ExponentTransform {
//!                 value: [1.0 / 2.4, 1.0 / 2.4, 1.0 / 2.4, 1.0],
//!                 negative_style: NegativeStyle::Clamp,
//!                 direction: Default::default(),
//!             }))
//!             .build(),
//!     )
//!     .role("scene_linear", "lin")
//!     .build()
//!     .unwrap();
//!
//! let processor = config.processor("lin", "g24").unwrap();
//! let cpu = processor.cpu().unwrap();
//!
//! let mut rgb = [0.18_f32, 0.18, 0.18];
//! cpu.apply_rgb(&mut rgb);
//! ```
//!
//! # Layers
//!
//! - [`transform`] - user-level requests (color-space pairs,
//!   display/view, look chains, file references, raw op parameters)
//! - [`Processor`] / [`CpuProcessor`] - the built, optimized product and
//!   its bit-depth specialized evaluator
//! - [`GpuProcessor`] / [`ShaderDesc`] - fragment-shader generation with
//!   LUT textures and dynamic-property uniforms
//! - [`Context`] - string variables and search-path file resolution
//!
//! The op data model, kernels and optimizer live in `opencolor-ops`; the
//! file formats (CLF/CTF, cube, spi1d/spi3d, spimtx, cc/ccc) live in
//! `opencolor-lut`.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod builder;
mod cache;
mod colorspace;
mod config;
mod context;
mod display;
mod error;
mod gpu;
mod image;
mod look;
mod processor;
mod role;
mod rules;
mod types;

pub mod transform;

pub use cache::clear_all_caches;
pub use colorspace::{ColorSpace, ColorSpaceBuilder, Encoding};
pub use config::{
    Config, ConfigBuilder, ENV_ACTIVE_DISPLAYS, ENV_ACTIVE_VIEWS, ENV_INACTIVE_COLORSPACES,
};
pub use context::Context;
pub use display::{Display, View, ViewTransform};
pub use error::{OcioError, OcioResult};
pub use gpu::{
    GpuLanguage, GpuProcessor, GpuTexture, GpuUniform, ShaderDesc, TextureChannels,
    TextureInterpolation, UniformValue,
};
pub use image::{ImageDesc, PackedImage, PackedPixels, PlanarImage};
pub use look::{parse_look_spec, Look, LookOption};
pub use processor::{CpuProcessor, Processor};
pub use role::{names as role_names, Roles};
pub use rules::{FileRule, FileRules, ViewingRule, ViewingRules};
pub use transform::Transform;
pub use types::{BitDepth, ReferenceSpaceType};

// Re-exported op-layer types that appear in this crate's API.
pub use opencolor_ops::cdl::CdlStyle;
pub use opencolor_ops::exposure_contrast::ExposureContrastStyle;
pub use opencolor_ops::fixed_function::FixedFunctionStyle;
pub use opencolor_ops::gamma::GammaStyle;
pub use opencolor_ops::noop::Allocation;
pub use opencolor_ops::{
    Direction, DynamicProperty, DynamicPropertyType, Interpolation, OptimizationFlags,
};

use std::sync::{Arc, OnceLock, RwLock};

/// Environment variable naming the config for [`current_config`].
pub const ENV_CONFIG: &str = "OCIO";

/// Environment variable overriding the log level at process start.
pub const ENV_LOGGING_LEVEL: &str = "OCIO_LOGGING_LEVEL";

/// Log level requested through `OCIO_LOGGING_LEVEL`, for the host to
/// apply when installing its `tracing` subscriber. `None` (the level)
/// silences the library; an unset or unrecognized variable returns
/// `Option::None` so the host keeps its own default.
pub fn logging_level_from_env() -> Option<Option<tracing::Level>> {
    let value = std::env::var(ENV_LOGGING_LEVEL).ok()?;
    match value.to_lowercase().as_str() {
        "none" | "0" => Some(None),
        "warning" | "warn" | "1" => Some(Some(tracing::Level::WARN)),
        "info" | "2" => Some(Some(tracing::Level::INFO)),
        "debug" | "3" => Some(Some(tracing::Level::DEBUG)),
        _ => None,
    }
}

fn current_config_slot() -> &'static RwLock<Option<Arc<Config>>> {
    static SLOT: OnceLock<RwLock<Option<Arc<Config>>>> = OnceLock::new();
    SLOT.get_or_init(|| RwLock::new(None))
}

/// The process-global current config, if one has been set.
pub fn current_config() -> Option<Arc<Config>> {
    current_config_slot()
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// Installs the process-global current config.
pub fn set_current_config(config: Arc<Config>) {
    *current_config_slot()
        .write()
        .unwrap_or_else(|e| e.into_inner()) = Some(config);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_config_round_trip() {
        let config = Arc::new(
            Config::builder()
                .colorspace(ColorSpace::builder("lin").build())
                .build()
                .unwrap(),
        );
        set_current_config(Arc::clone(&config));
        let current = current_config().expect("config was set");
        assert_eq!(current.cache_id(), config.cache_id());
    }
}
