//! Exposure/contrast op for viewport-style adjustments.
//!
//! Three styles interpret the same controls in different encodings:
//!
//! - `Linear`: `out = pivot * (in * 2^exposure / pivot)^(contrast*gamma)`
//! - `Video`: the same shape with the pivot and the exposure factor passed
//!   through an approximate video OETF power (1/1.83)
//! - `Logarithmic`: affine in log space, with Cineon-style constants
//!   `logExposureStep = 0.088` and `logMidGray = 0.435`
//!
//! Exposure, contrast and gamma are each *dynamic-capable*: when an op
//! opts in, the finalized kernel reads the parameter through a shared
//! cell that the host can update after the processor is built.

use crate::dynamic::{DynamicProperty, DynamicPropertyType, ParamSource};
use crate::hash::CacheIdHasher;
use crate::{Direction, OpsError, OpsResult};

/// Video OETF power approximation (1 / 1.83).
pub const VIDEO_OETF_POWER: f64 = 0.54644808743169393;

/// Smallest usable pivot.
pub const MIN_PIVOT: f64 = 0.001;

/// Smallest usable contrast.
pub const MIN_CONTRAST: f64 = 0.001;

/// Default log exposure step (Cineon-style).
pub const LOG_EXPOSURE_STEP_DEFAULT: f64 = 0.088;

/// Default log mid-gray position.
pub const LOG_MIDGRAY_DEFAULT: f64 = 0.435;

/// Encoding the controls operate in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExposureContrastStyle {
    /// Scene-linear pixels.
    #[default]
    Linear,
    /// Video-encoded (gamma) pixels.
    Video,
    /// Log-encoded pixels.
    Logarithmic,
}

impl ExposureContrastStyle {
    /// Stable tag for hashing and serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Video => "video",
            Self::Logarithmic => "log",
        }
    }
}

/// Declarative parameters of an exposure/contrast op.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureContrastOpData {
    /// Style determines the math used.
    pub style: ExposureContrastStyle,
    /// Exposure in stops.
    pub exposure: f64,
    /// Contrast multiplier around the pivot.
    pub contrast: f64,
    /// Gamma power, folded into the effective contrast.
    pub gamma: f64,
    /// Pivot point for contrast.
    pub pivot: f64,
    /// Log exposure step (Logarithmic style).
    pub log_exposure_step: f64,
    /// Log mid-gray position (Logarithmic style).
    pub log_midgray: f64,
    /// Which parameters are dynamic.
    pub dynamic_exposure: bool,
    /// See `dynamic_exposure`.
    pub dynamic_contrast: bool,
    /// See `dynamic_exposure`.
    pub dynamic_gamma: bool,
}

impl Default for ExposureContrastOpData {
    fn default() -> Self {
        Self {
            style: ExposureContrastStyle::Linear,
            exposure: 0.0,
            contrast: 1.0,
            gamma: 1.0,
            pivot: 0.18,
            log_exposure_step: LOG_EXPOSURE_STEP_DEFAULT,
            log_midgray: LOG_MIDGRAY_DEFAULT,
            dynamic_exposure: false,
            dynamic_contrast: false,
            dynamic_gamma: false,
        }
    }
}

impl ExposureContrastOpData {
    /// Op with the given style and defaults elsewhere.
    pub fn new(style: ExposureContrastStyle) -> Self {
        Self {
            style,
            ..Default::default()
        }
    }

    /// Finite parameters; contrast and gamma positive.
    pub fn validate(&self) -> OpsResult<()> {
        let err = |reason: String| {
            Err(OpsError::InvalidParameters {
                op: "ExposureContrast",
                reason,
            })
        };
        let finite = [
            self.exposure,
            self.contrast,
            self.gamma,
            self.pivot,
            self.log_exposure_step,
            self.log_midgray,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return err("parameters must be finite".into());
        }
        if self.contrast <= 0.0 {
            return err(format!("contrast must be > 0, got {}", self.contrast));
        }
        if self.gamma <= 0.0 {
            return err(format!("gamma must be > 0, got {}", self.gamma));
        }
        Ok(())
    }

    /// No adjustment and nothing dynamic.
    ///
    /// An op with a dynamic parameter is never an identity: the host may
    /// change the value after optimization.
    pub fn is_identity(&self) -> bool {
        !self.is_dynamic()
            && self.exposure == 0.0
            && self.contrast == 1.0
            && self.gamma == 1.0
    }

    /// Whether any parameter is dynamic.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic_exposure || self.dynamic_contrast || self.dynamic_gamma
    }

    /// Separable per channel.
    pub fn has_channel_crosstalk(&self) -> bool {
        false
    }

    /// Fuses two static ops of the same style and pivot by adding
    /// exposures and multiplying contrasts and gammas.
    pub fn compose(&self, next: &ExposureContrastOpData) -> Option<ExposureContrastOpData> {
        if self.style != next.style
            || self.pivot != next.pivot
            || self.is_dynamic()
            || next.is_dynamic()
        {
            return None;
        }
        Some(ExposureContrastOpData {
            style: self.style,
            exposure: self.exposure + next.exposure,
            contrast: self.contrast * next.contrast,
            gamma: self.gamma * next.gamma,
            pivot: self.pivot,
            log_exposure_step: self.log_exposure_step,
            log_midgray: self.log_midgray,
            dynamic_exposure: false,
            dynamic_contrast: false,
            dynamic_gamma: false,
        })
    }

    /// Feeds canonical parameters to the hasher.
    ///
    /// Dynamic flags are part of the id: a processor with a live exposure
    /// control is not interchangeable with a baked one.
    pub fn hash_into(&self, h: &mut CacheIdHasher) {
        h.put_str("exposureContrast").put_str(self.style.as_str());
        h.put_f64s(&[
            self.exposure,
            self.contrast,
            self.gamma,
            self.pivot,
            self.log_exposure_step,
            self.log_midgray,
        ]);
        h.put_bool(self.dynamic_exposure);
        h.put_bool(self.dynamic_contrast);
        h.put_bool(self.dynamic_gamma);
    }
}

/// Finalized exposure/contrast kernel.
///
/// Dynamic parameters are read through their shared cells on every apply,
/// so the derived quantities are recomputed per call; static ops fold
/// everything into constants.
#[derive(Debug, Clone)]
pub struct ExposureContrastKernel {
    style: ExposureContrastStyle,
    forward: bool,
    exposure: ParamSource,
    contrast: ParamSource,
    gamma: ParamSource,
    pivot: f64,
    log_exposure_step: f64,
    log_midgray: f64,
}

impl ExposureContrastKernel {
    /// Builds the kernel; dynamic parameters bind to the given properties.
    pub fn new(
        data: &ExposureContrastOpData,
        direction: Direction,
        properties: &[DynamicProperty],
    ) -> OpsResult<Self> {
        data.validate()?;
        let bind = |wanted: DynamicPropertyType, flag: bool, fixed: f64| -> ParamSource {
            if flag {
                properties
                    .iter()
                    .find(|p| p.kind() == wanted)
                    .map(ParamSource::from)
                    .unwrap_or(ParamSource::Constant(fixed))
            } else {
                ParamSource::Constant(fixed)
            }
        };
        Ok(Self {
            style: data.style,
            forward: direction == Direction::Forward,
            exposure: bind(DynamicPropertyType::Exposure, data.dynamic_exposure, data.exposure),
            contrast: bind(DynamicPropertyType::Contrast, data.dynamic_contrast, data.contrast),
            gamma: bind(DynamicPropertyType::Gamma, data.dynamic_gamma, data.gamma),
            pivot: data.pivot,
            log_exposure_step: data.log_exposure_step,
            log_midgray: data.log_midgray,
        })
    }

    /// Applies the adjustment to one RGBA pixel; alpha passes through.
    #[inline]
    pub fn apply(&self, px: &mut [f32; 4]) {
        let exposure = self.exposure.get();
        let contrast = (self.contrast.get() * self.gamma.get()).max(MIN_CONTRAST);
        match self.style {
            ExposureContrastStyle::Linear => {
                self.apply_power(px, exposure, contrast, self.pivot.max(MIN_PIVOT), 1.0)
            }
            ExposureContrastStyle::Video => self.apply_power(
                px,
                exposure,
                contrast,
                self.pivot.max(MIN_PIVOT).powf(VIDEO_OETF_POWER),
                VIDEO_OETF_POWER,
            ),
            ExposureContrastStyle::Logarithmic => self.apply_log(px, exposure, contrast),
        }
    }

    #[inline]
    fn apply_power(&self, px: &mut [f32; 4], exposure: f64, contrast: f64, pivot: f64, oetf: f64) {
        let exposure_val = (2.0_f64.powf(exposure)).powf(oetf);
        if self.forward {
            if contrast == 1.0 {
                let m = exposure_val as f32;
                for v in px.iter_mut().take(3) {
                    *v *= m;
                }
            } else {
                let scale = (exposure_val / pivot) as f32;
                let c = contrast as f32;
                let p = pivot as f32;
                for v in px.iter_mut().take(3) {
                    *v = (*v * scale).max(0.0).powf(c) * p;
                }
            }
        } else if contrast == 1.0 {
            let m = (1.0 / exposure_val) as f32;
            for v in px.iter_mut().take(3) {
                *v *= m;
            }
        } else {
            let inv_contrast = (1.0 / contrast) as f32;
            let inv_pivot = (1.0 / pivot) as f32;
            let post = (pivot / exposure_val) as f32;
            for v in px.iter_mut().take(3) {
                *v = (*v * inv_pivot).max(0.0).powf(inv_contrast) * post;
            }
        }
    }

    #[inline]
    fn apply_log(&self, px: &mut [f32; 4], exposure: f64, contrast: f64) {
        let pivot = self.pivot.max(MIN_PIVOT);
        let log_pivot =
            ((pivot / 0.18).log2() * self.log_exposure_step + self.log_midgray).max(0.0);
        let exposure_val = exposure * self.log_exposure_step;
        if self.forward {
            let offset = ((exposure_val - log_pivot) * contrast + log_pivot) as f32;
            let c = contrast as f32;
            for v in px.iter_mut().take(3) {
                *v = *v * c + offset;
            }
        } else {
            let inv_contrast = 1.0 / contrast;
            let offset = (log_pivot - log_pivot * inv_contrast - exposure_val) as f32;
            let ic = inv_contrast as f32;
            for v in px.iter_mut().take(3) {
                *v = *v * ic + offset;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn kernel(data: &ExposureContrastOpData, dir: Direction) -> ExposureContrastKernel {
        ExposureContrastKernel::new(data, dir, &[]).unwrap()
    }

    #[test]
    fn identity_detection() {
        assert!(ExposureContrastOpData::default().is_identity());
        let dynamic = ExposureContrastOpData {
            dynamic_exposure: true,
            ..Default::default()
        };
        assert!(!dynamic.is_identity());
    }

    #[test]
    fn linear_exposure_doubles() {
        let data = ExposureContrastOpData {
            exposure: 1.0,
            ..Default::default()
        };
        let k = kernel(&data, Direction::Forward);
        let mut px = [0.25, 0.25, 0.25, 1.0];
        k.apply(&mut px);
        assert_abs_diff_eq!(px[0], 0.5, epsilon = 1e-6);
        assert_eq!(px[3], 1.0);
    }

    #[test]
    fn linear_round_trip() {
        let data = ExposureContrastOpData {
            exposure: 0.5,
            contrast: 1.2,
            gamma: 0.9,
            ..Default::default()
        };
        let f = kernel(&data, Direction::Forward);
        let b = kernel(&data, Direction::Inverse);
        let mut px = [0.3, 0.5, 0.4, 0.0];
        let orig = px;
        f.apply(&mut px);
        b.apply(&mut px);
        for i in 0..3 {
            assert_abs_diff_eq!(px[i], orig[i], epsilon = 1e-4);
        }
    }

    #[test]
    fn video_round_trip() {
        let data = ExposureContrastOpData {
            style: ExposureContrastStyle::Video,
            exposure: 0.5,
            contrast: 1.1,
            ..Default::default()
        };
        let f = kernel(&data, Direction::Forward);
        let b = kernel(&data, Direction::Inverse);
        let mut px = [0.3, 0.5, 0.4, 0.0];
        let orig = px;
        f.apply(&mut px);
        b.apply(&mut px);
        for i in 0..3 {
            assert_abs_diff_eq!(px[i], orig[i], epsilon = 1e-4);
        }
    }

    #[test]
    fn log_round_trip() {
        let data = ExposureContrastOpData {
            style: ExposureContrastStyle::Logarithmic,
            exposure: 0.5,
            contrast: 1.2,
            ..Default::default()
        };
        let f = kernel(&data, Direction::Forward);
        let b = kernel(&data, Direction::Inverse);
        let mut px = [0.3, 0.5, 0.4, 0.0];
        let orig = px;
        f.apply(&mut px);
        b.apply(&mut px);
        for i in 0..3 {
            assert_abs_diff_eq!(px[i], orig[i], epsilon = 1e-4);
        }
    }

    #[test]
    fn dynamic_exposure_updates_apply() {
        let data = ExposureContrastOpData {
            dynamic_exposure: true,
            ..Default::default()
        };
        let prop = DynamicProperty::new(DynamicPropertyType::Exposure, 0.0);
        let k = ExposureContrastKernel::new(&data, Direction::Forward, &[prop.clone()]).unwrap();

        let mut px = [0.25, 0.25, 0.25, 0.0];
        k.apply(&mut px);
        assert_abs_diff_eq!(px[0], 0.25, epsilon = 1e-6);

        prop.set(2.0);
        let mut px = [0.25, 0.25, 0.25, 0.0];
        k.apply(&mut px);
        assert_abs_diff_eq!(px[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn compose_static_ops() {
        let a = ExposureContrastOpData {
            exposure: 1.0,
            contrast: 2.0,
            ..Default::default()
        };
        let b = ExposureContrastOpData {
            exposure: -1.0,
            contrast: 0.5,
            ..Default::default()
        };
        let c = a.compose(&b).unwrap();
        assert!(c.is_identity());

        let dynamic = ExposureContrastOpData {
            dynamic_gamma: true,
            ..Default::default()
        };
        assert!(a.compose(&dynamic).is_none());
    }
}
