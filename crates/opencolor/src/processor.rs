//! Processors: the built, optimized, cached end product.
//!
//! A [`Processor`] owns the op list a transform request lowered to. CPU
//! evaluation goes through a [`CpuProcessor`], which optimizes a copy of
//! the list under the requested flags, finalizes it into kernels, and
//! converts pixels between the requested bit depths and the internal F32
//! processing space at the boundary.
//!
//! Numerical pathologies (NaN, infinities) are not errors at apply time;
//! they flow through the kernels. Only structural problems (empty
//! buffers, mismatched planes) raise [`crate::OcioError::InvalidImage`].

use half::f16;
use opencolor_ops::exposure_contrast::ExposureContrastOpData;
use opencolor_ops::{
    optimize, CpuKernel, DynamicProperty, DynamicPropertyType, OpData, OpList, OptimizationFlags,
};

use crate::context::Context;
use crate::image::{ImageDesc, PackedImage, PackedPixels, PlanarImage};
use crate::types::BitDepth;
use crate::OcioResult;

/// The built product of a transform request.
#[derive(Debug)]
pub struct Processor {
    ops: OpList,
    context: Context,
    cache_id: String,
    dynamic: Vec<DynamicProperty>,
}

impl Processor {
    /// Wraps a lowered op list; collects the dynamic-property side
    /// table.
    pub(crate) fn from_ops(
        ops: OpList,
        context: Context,
        cache_id: String,
    ) -> OcioResult<Self> {
        ops.validate()?;
        let mut dynamic: Vec<DynamicProperty> = Vec::new();
        for op in ops.ops() {
            if let OpData::ExposureContrast(ec) = &op.data {
                collect_dynamic(ec, &mut dynamic);
            }
        }
        Ok(Self {
            ops,
            context,
            cache_id,
            dynamic,
        })
    }

    /// Builds a processor directly from an op list (tests, baking).
    pub fn from_op_list(ops: OpList) -> OcioResult<Self> {
        let cache_id = ops.cache_id();
        Self::from_ops(ops, Context::new(), cache_id)
    }

    /// The lowered ops.
    pub fn ops(&self) -> &OpList {
        &self.ops
    }

    /// The context captured at build time.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Content id of the processor (config + context + request).
    pub fn cache_id(&self) -> &str {
        &self.cache_id
    }

    /// Whether any op exposes a dynamic property.
    pub fn is_dynamic(&self) -> bool {
        !self.dynamic.is_empty()
    }

    /// Handle for a dynamic property, when any op opted in.
    pub fn dynamic_property(&self, kind: DynamicPropertyType) -> Option<DynamicProperty> {
        self.dynamic.iter().find(|p| p.kind() == kind).cloned()
    }

    /// True when the whole request reduces to a mathematical identity.
    pub fn is_no_op(&self) -> bool {
        let mut copy = self.ops.clone();
        optimize(&mut copy, OptimizationFlags::default_level());
        copy.is_empty()
    }

    /// Default CPU specialization: F32 in and out, default optimization.
    pub fn cpu(&self) -> OcioResult<CpuProcessor> {
        self.cpu_optimized(OptimizationFlags::default_level(), BitDepth::F32, BitDepth::F32)
    }

    /// CPU specialization for explicit flags and bit depths.
    pub fn cpu_optimized(
        &self,
        flags: OptimizationFlags,
        in_depth: BitDepth,
        out_depth: BitDepth,
    ) -> OcioResult<CpuProcessor> {
        let mut ops = self.ops.clone();
        let report = optimize(&mut ops, flags);
        let kernels = ops.finalize_with(&self.dynamic)?;
        Ok(CpuProcessor {
            kernels,
            in_depth,
            out_depth,
            lossy_hint: report.lossy,
        })
    }
}

fn collect_dynamic(ec: &ExposureContrastOpData, out: &mut Vec<DynamicProperty>) {
    let mut ensure = |kind: DynamicPropertyType, initial: f64| {
        if !out.iter().any(|p| p.kind() == kind) {
            out.push(DynamicProperty::new(kind, initial));
        }
    };
    if ec.dynamic_exposure {
        ensure(DynamicPropertyType::Exposure, ec.exposure);
    }
    if ec.dynamic_contrast {
        ensure(DynamicPropertyType::Contrast, ec.contrast);
    }
    if ec.dynamic_gamma {
        ensure(DynamicPropertyType::Gamma, ec.gamma);
    }
}

/// Bit-depth-specialized CPU evaluator.
///
/// Immutable after construction; many threads may call `apply`
/// concurrently on disjoint buffers, as long as no dynamic property is
/// being written at the same time.
#[derive(Debug)]
pub struct CpuProcessor {
    kernels: Vec<CpuKernel>,
    in_depth: BitDepth,
    out_depth: BitDepth,
    lossy_hint: bool,
}

impl CpuProcessor {
    /// Input bit depth.
    pub fn input_bit_depth(&self) -> BitDepth {
        self.in_depth
    }

    /// Output bit depth.
    pub fn output_bit_depth(&self) -> BitDepth {
        self.out_depth
    }

    /// Whether optimization applied a rewrite that is not exact to
    /// float epsilon (LUT resampling).
    pub fn lossy_hint(&self) -> bool {
        self.lossy_hint
    }

    /// Single-pixel RGBA entry point.
    #[inline]
    pub fn apply_rgba(&self, px: &mut [f32; 4]) {
        for k in &self.kernels {
            k.apply(px);
        }
    }

    /// Single-pixel RGB entry point; alpha is carried as 1.
    #[inline]
    pub fn apply_rgb(&self, rgb: &mut [f32; 3]) {
        let mut px = [rgb[0], rgb[1], rgb[2], 1.0];
        self.apply_rgba(&mut px);
        rgb.copy_from_slice(&px[..3]);
    }

    /// Applies the processor to an image in place.
    pub fn apply(&self, image: &mut ImageDesc<'_>) -> OcioResult<()> {
        match image {
            ImageDesc::Packed(packed) => self.apply_packed(packed),
            ImageDesc::Planar(planar) => self.apply_planar(planar),
        }
    }

    fn apply_packed(&self, image: &mut PackedImage<'_>) -> OcioResult<()> {
        image.validate()?;
        let channels = image.channels;
        match &mut image.pixels {
            // Fast path: packed F32, no boundary conversion.
            PackedPixels::F32(data) => {
                if channels == 4 {
                    for px in data.chunks_exact_mut(4) {
                        let mut v = [px[0], px[1], px[2], px[3]];
                        self.apply_rgba(&mut v);
                        px.copy_from_slice(&v);
                    }
                } else {
                    for px in data.chunks_exact_mut(3) {
                        let mut v = [px[0], px[1], px[2], 1.0];
                        self.apply_rgba(&mut v);
                        px.copy_from_slice(&v[..3]);
                    }
                }
            }
            PackedPixels::U8(data) => {
                let in_scale = 1.0 / self.in_depth.scale();
                let out_scale = self.out_depth.scale();
                for px in data.chunks_exact_mut(channels) {
                    let mut v = [0.0f32; 4];
                    v[3] = 1.0;
                    for (i, c) in px.iter().enumerate().take(channels) {
                        v[i] = *c as f32 * in_scale;
                    }
                    self.apply_rgba(&mut v);
                    for (i, c) in px.iter_mut().enumerate().take(channels) {
                        *c = (v[i] * out_scale).round().clamp(0.0, 255.0) as u8;
                    }
                }
            }
            PackedPixels::U16(data) => {
                let in_scale = 1.0 / self.in_depth.scale();
                let out_scale = self.out_depth.scale();
                let max_code = self.out_depth.scale();
                for px in data.chunks_exact_mut(channels) {
                    let mut v = [0.0f32; 4];
                    v[3] = 1.0;
                    for (i, c) in px.iter().enumerate().take(channels) {
                        v[i] = *c as f32 * in_scale;
                    }
                    self.apply_rgba(&mut v);
                    for (i, c) in px.iter_mut().enumerate().take(channels) {
                        *c = (v[i] * out_scale).round().clamp(0.0, max_code) as u16;
                    }
                }
            }
            PackedPixels::F16(data) => {
                for px in data.chunks_exact_mut(channels) {
                    let mut v = [0.0f32; 4];
                    v[3] = 1.0;
                    for (i, c) in px.iter().enumerate().take(channels) {
                        v[i] = c.to_f32();
                    }
                    self.apply_rgba(&mut v);
                    for (i, c) in px.iter_mut().enumerate().take(channels) {
                        *c = f16::from_f32(v[i]);
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_planar(&self, image: &mut PlanarImage<'_>) -> OcioResult<()> {
        image.validate()?;
        let n = image.r.len();
        for i in 0..n {
            let mut v = [
                image.r[i],
                image.g[i],
                image.b[i],
                image.a.as_ref().map(|a| a[i]).unwrap_or(1.0),
            ];
            self.apply_rgba(&mut v);
            image.r[i] = v[0];
            image.g[i] = v[1];
            image.b[i] = v[2];
            if let Some(a) = image.a.as_mut() {
                a[i] = v[3];
            }
        }
        Ok(())
    }
}
