//! GPU processor: shader source generation.
//!
//! The GPU path never touches pixels; it emits a fragment function the
//! host compiles, plus the textures and uniforms the function needs. A
//! [`ShaderDesc`] carries the target language, naming, the host's
//! texture-size cap, and five text accumulators (declarations, helpers,
//! function header, body, footer); the final shader text is their
//! concatenation.
//!
//! Per op, the generator registers 1D LUT textures (RED channel, wrapped
//! into a 2D texture when wider than the cap), 3D LUT textures (RGB),
//! and typed uniforms whose getter closures re-read dynamic properties
//! at render time, then appends a body fragment that rewrites the pixel
//! variable.
//!
//! Half-domain 1D LUTs are resampled onto a uniform [0,1] domain before
//! upload; extended-range inputs lose precision on the GPU path.
//!
//! A **legacy** mode bakes the whole processor into a single 3D LUT plus
//! one shaper; it clamps inputs to [0,1] and is flagged on the
//! description so hosts can surface the fidelity loss.

use std::fmt::Write as _;
use std::sync::Arc;

use opencolor_ops::dynamic::{DynamicProperty, DynamicPropertyType};
use opencolor_ops::exposure_contrast::{ExposureContrastStyle, VIDEO_OETF_POWER};
use opencolor_ops::fixed_function::FixedFunctionStyle;
use opencolor_ops::gamma::GammaStyle;
use opencolor_ops::lut1d::Lut1dKernel;
use opencolor_ops::lut3d::Lut3dKernel;
use opencolor_ops::{optimize, Direction, Interpolation, OpData, OpList, OptimizationFlags};

use crate::processor::Processor;
use crate::{OcioError, OcioResult};

/// Target shading language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuLanguage {
    /// GLSL 1.20 (OpenGL 2.1).
    Glsl120,
    /// GLSL 3.30 (OpenGL 3.3).
    #[default]
    Glsl330,
    /// GLSL 4.00 (OpenGL 4.0).
    Glsl400,
    /// GLSL ES 3.00 (WebGL 2).
    GlslEs300,
    /// HLSL shader model 5.
    Hlsl50,
    /// Metal shading language.
    Metal,
}

impl GpuLanguage {
    /// Whether the language is a GLSL dialect.
    pub fn is_glsl(&self) -> bool {
        matches!(
            self,
            Self::Glsl120 | Self::Glsl330 | Self::Glsl400 | Self::GlslEs300
        )
    }

    fn vec3(&self) -> &'static str {
        if self.is_glsl() { "vec3" } else { "float3" }
    }

    fn vec4(&self) -> &'static str {
        if self.is_glsl() { "vec4" } else { "float4" }
    }

    fn mix_fn(&self) -> &'static str {
        if self.is_glsl() { "mix" } else { "lerp" }
    }
}

/// Channel semantics of a registered texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureChannels {
    /// Single-channel (separable 1D LUTs).
    Red,
    /// RGB (3D LUTs).
    Rgb,
}

/// Interpolation the host should configure on the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureInterpolation {
    /// Nearest neighbor.
    Nearest,
    /// Linear filtering.
    #[default]
    Linear,
}

/// A texture the host must create and bind.
#[derive(Debug, Clone)]
pub struct GpuTexture {
    /// Texture name in the shader.
    pub name: String,
    /// Sampler name in the shader.
    pub sampler_name: String,
    /// Width in texels.
    pub width: usize,
    /// Height in texels (1 for true 1D data).
    pub height: usize,
    /// Depth (edge length) for 3D textures, 1 otherwise.
    pub depth: usize,
    /// Channel semantics.
    pub channels: TextureChannels,
    /// Sampler filtering.
    pub interpolation: TextureInterpolation,
    /// Texel data, row-major, `channels` floats per texel.
    pub data: Vec<f32>,
}

/// Getter closure for a uniform value.
pub type UniformGetter<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Typed uniform payload.
#[derive(Clone)]
pub enum UniformValue {
    /// A single double.
    Double(UniformGetter<f64>),
    /// A boolean.
    Bool(UniformGetter<bool>),
    /// A float3.
    Float3(UniformGetter<[f64; 3]>),
    /// A float vector of fixed length.
    VectorFloat(UniformGetter<Vec<f64>>),
    /// An int vector of fixed length.
    VectorInt(UniformGetter<Vec<i32>>),
}

impl std::fmt::Debug for UniformValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Double(_) => "double",
            Self::Bool(_) => "bool",
            Self::Float3(_) => "float3",
            Self::VectorFloat(_) => "vectorFloat",
            Self::VectorInt(_) => "vectorInt",
        };
        write!(f, "UniformValue::{kind}")
    }
}

/// A uniform the host must declare and refresh.
#[derive(Debug, Clone)]
pub struct GpuUniform {
    /// Uniform name in the shader.
    pub name: String,
    /// Value and getter.
    pub value: UniformValue,
}

/// Host-provided shader description and accumulator set.
#[derive(Debug)]
pub struct ShaderDesc {
    /// Target language.
    pub language: GpuLanguage,
    /// Name of the emitted function.
    pub function_name: String,
    /// Name of the pixel variable inside the function.
    pub pixel_name: String,
    /// Prefix for textures/uniforms so multiple processors coexist.
    pub resource_prefix: String,
    /// Largest 1D/2D texture width the host can create.
    pub max_texture_width: usize,
    /// Set when the shader came from the legacy baker (inputs clamped to
    /// [0,1]).
    pub legacy: bool,

    declarations: String,
    helpers: String,
    function_header: String,
    function_body: String,
    function_footer: String,
    textures: Vec<GpuTexture>,
    uniforms: Vec<GpuUniform>,
}

impl ShaderDesc {
    /// Description with conventional defaults.
    pub fn new(language: GpuLanguage) -> Self {
        Self {
            language,
            function_name: "OCIODisplay".into(),
            pixel_name: "outColor".into(),
            resource_prefix: "ocio".into(),
            max_texture_width: 4096,
            legacy: false,
            declarations: String::new(),
            helpers: String::new(),
            function_header: String::new(),
            function_body: String::new(),
            function_footer: String::new(),
            textures: Vec::new(),
            uniforms: Vec::new(),
        }
    }

    /// Appends to the declaration section.
    pub fn add_to_declarations(&mut self, text: &str) {
        self.declarations.push_str(text);
    }

    /// Appends to the helper-function section.
    pub fn add_to_helpers(&mut self, text: &str) {
        self.helpers.push_str(text);
    }

    /// Appends to the function body.
    pub fn add_to_body(&mut self, text: &str) {
        self.function_body.push_str(text);
    }

    /// Registers a texture; errors when the host cap is exceeded.
    pub fn add_texture(&mut self, texture: GpuTexture) -> OcioResult<()> {
        if texture.width > self.max_texture_width {
            return Err(OcioError::ShaderLimitExceeded(format!(
                "texture {} is {} texels wide, cap is {}",
                texture.name, texture.width, self.max_texture_width
            )));
        }
        self.textures.push(texture);
        Ok(())
    }

    /// Registers a uniform.
    pub fn add_uniform(&mut self, uniform: GpuUniform) {
        self.uniforms.push(uniform);
    }

    /// Registered textures.
    pub fn textures(&self) -> &[GpuTexture] {
        &self.textures
    }

    /// Registered uniforms.
    pub fn uniforms(&self) -> &[GpuUniform] {
        &self.uniforms
    }

    /// The concatenated shader source.
    pub fn shader_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.declarations);
        out.push_str(&self.helpers);
        out.push_str(&self.function_header);
        out.push_str(&self.function_body);
        out.push_str(&self.function_footer);
        out
    }

    fn resource_name(&self, stem: &str, index: usize) -> String {
        format!("{}_{stem}_{index}", self.resource_prefix)
    }
}

/// Shader-emitting view of a processor.
#[derive(Debug)]
pub struct GpuProcessor {
    ops: OpList,
    dynamic: Vec<DynamicProperty>,
}

impl Processor {
    /// Default GPU specialization (default optimization flags).
    pub fn gpu(&self) -> GpuProcessor {
        let mut ops = self.ops().clone();
        optimize(&mut ops, OptimizationFlags::default_level());
        let dynamic: Vec<DynamicProperty> = [
            DynamicPropertyType::Exposure,
            DynamicPropertyType::Contrast,
            DynamicPropertyType::Gamma,
        ]
        .iter()
        .filter_map(|&k| self.dynamic_property(k))
        .collect();
        GpuProcessor { ops, dynamic }
    }
}

impl GpuProcessor {
    /// Emits the full shader into the description.
    pub fn extract_shader_info(&self, desc: &mut ShaderDesc) -> OcioResult<()> {
        emit_function_header(desc);
        let px = desc.pixel_name.clone();
        for (index, op) in self.ops.ops().iter().enumerate() {
            emit_op(desc, &px, index, op, &self.dynamic)?;
        }
        emit_function_footer(desc);
        Ok(())
    }

    /// Bakes the processor into one 3D LUT (plus clamp) and emits a
    /// shader sampling only that cube. Marks the description legacy.
    pub fn extract_legacy_shader_info(
        &self,
        desc: &mut ShaderDesc,
        edge: usize,
    ) -> OcioResult<()> {
        let kernels = self.ops.finalize_with(&self.dynamic)?;
        let mut samples = Vec::with_capacity(edge * edge * edge * 3);
        let max = (edge - 1) as f32;
        for b in 0..edge {
            for g in 0..edge {
                for r in 0..edge {
                    let mut v = [r as f32 / max, g as f32 / max, b as f32 / max, 1.0];
                    for k in &kernels {
                        k.apply(&mut v);
                    }
                    samples.extend_from_slice(&v[..3]);
                }
            }
        }

        desc.legacy = true;
        emit_function_header(desc);
        let px = desc.pixel_name.clone();
        let name = desc.resource_name("lut3d", 0);
        let sampler = format!("{name}_sampler");
        desc.add_texture(GpuTexture {
            name: name.clone(),
            sampler_name: sampler.clone(),
            width: edge,
            height: edge,
            depth: edge,
            channels: TextureChannels::Rgb,
            interpolation: TextureInterpolation::Linear,
            data: samples,
        })?;
        let vec3 = desc.language.vec3();
        desc.add_to_declarations(&format!("uniform sampler3D {sampler};\n"));
        let scale = (edge - 1) as f32 / edge as f32;
        let offset = 1.0 / (2.0 * edge as f32);
        desc.add_to_body(&format!(
            "  {px}.rgb = clamp({px}.rgb, 0.0, 1.0);\n  {px}.rgb = texture({sampler}, {px}.rgb * {scale:.7} + {vec3}({offset:.7})).rgb;\n"
        ));
        emit_function_footer(desc);
        Ok(())
    }
}

fn emit_function_header(desc: &mut ShaderDesc) {
    let vec4 = desc.language.vec4();
    let header = match desc.language {
        GpuLanguage::Glsl120 => "#version 120\n",
        GpuLanguage::Glsl330 => "#version 330 core\n",
        GpuLanguage::Glsl400 => "#version 400 core\n",
        GpuLanguage::GlslEs300 => "#version 300 es\nprecision highp float;\n",
        GpuLanguage::Hlsl50 | GpuLanguage::Metal => "",
    };
    desc.add_to_declarations(header);
    let name = desc.function_name.clone();
    let px = desc.pixel_name.clone();
    let _ = write!(
        desc.function_header,
        "\n{vec4} {name}({vec4} inPixel)\n{{\n  {vec4} {px} = inPixel;\n"
    );
}

fn emit_function_footer(desc: &mut ShaderDesc) {
    let px = desc.pixel_name.clone();
    let _ = write!(desc.function_footer, "  return {px};\n}}\n");
}

fn float3_literal(desc: &ShaderDesc, v: [f32; 3]) -> String {
    format!(
        "{}({:.7}, {:.7}, {:.7})",
        desc.language.vec3(),
        v[0],
        v[1],
        v[2]
    )
}

/// Emits one op's body fragment (and any textures/uniforms it needs).
fn emit_op(
    desc: &mut ShaderDesc,
    px: &str,
    index: usize,
    op: &opencolor_ops::Op,
    dynamic: &[DynamicProperty],
) -> OcioResult<()> {
    match &op.data {
        OpData::Matrix(m) => {
            let resolved = m.resolved(op.direction)?;
            let (flat, offset) = resolved.to_f32();
            let vec4 = desc.language.vec4();
            // GLSL mat4 constructors are column-major.
            let mut cols = String::new();
            for c in 0..4 {
                for r in 0..4 {
                    let _ = write!(cols, "{:.7}", flat[r * 4 + c]);
                    if !(c == 3 && r == 3) {
                        cols.push_str(", ");
                    }
                }
            }
            if desc.language.is_glsl() {
                desc.add_to_body(&format!(
                    "  {px} = mat4({cols}) * {px} + {vec4}({:.7}, {:.7}, {:.7}, {:.7});\n",
                    offset[0], offset[1], offset[2], offset[3]
                ));
            } else {
                desc.add_to_body(&format!(
                    "  {px} = mul(float4x4({cols}), {px}) + {vec4}({:.7}, {:.7}, {:.7}, {:.7});\n",
                    offset[0], offset[1], offset[2], offset[3]
                ));
            }
        }
        OpData::Range(r) => {
            let (scale, offs) = r.scale_offset(op.direction);
            let (lo, hi) = r.clamp_bounds(op.direction);
            desc.add_to_body(&format!(
                "  {px}.rgb = {px}.rgb * {:.7} + {:.7};\n",
                scale as f32, offs as f32
            ));
            if let Some(lo) = lo {
                desc.add_to_body(&format!("  {px}.rgb = max({px}.rgb, {:.7});\n", lo as f32));
            }
            if let Some(hi) = hi {
                desc.add_to_body(&format!("  {px}.rgb = min({px}.rgb, {:.7});\n", hi as f32));
            }
        }
        OpData::Cdl(c) => {
            let forward = op.direction == Direction::Forward;
            let vec3 = desc.language.vec3();
            let slope = float3_literal(desc, c.slope.map(|v| v as f32));
            let offset = float3_literal(desc, c.offset.map(|v| v as f32));
            let power = float3_literal(desc, c.power.map(|v| v as f32));
            let luma = float3_literal(desc, c.luma.map(|v| v as f32));
            let sat = c.saturation as f32;
            let clamp = c.clamps();
            if forward {
                desc.add_to_body(&format!("  {px}.rgb = {px}.rgb * {slope} + {offset};\n"));
                if clamp {
                    desc.add_to_body(&format!("  {px}.rgb = clamp({px}.rgb, 0.0, 1.0);\n"));
                    desc.add_to_body(&format!(
                        "  {px}.rgb = clamp(pow({px}.rgb, {power}), 0.0, 1.0);\n"
                    ));
                } else {
                    desc.add_to_body(&format!(
                        "  {px}.rgb = sign({px}.rgb) * pow(abs({px}.rgb), {power});\n"
                    ));
                }
                desc.add_to_body(&format!(
                    "  {{ float luma = dot({px}.rgb, {luma}); {px}.rgb = luma + ({px}.rgb - luma) * {sat:.7}; }}\n"
                ));
                if clamp {
                    desc.add_to_body(&format!("  {px}.rgb = clamp({px}.rgb, 0.0, 1.0);\n"));
                }
            } else {
                if clamp {
                    desc.add_to_body(&format!("  {px}.rgb = clamp({px}.rgb, 0.0, 1.0);\n"));
                }
                desc.add_to_body(&format!(
                    "  {{ float luma = dot({px}.rgb, {luma}); {px}.rgb = luma + ({px}.rgb - luma) * {:.7}; }}\n",
                    1.0 / sat
                ));
                if clamp {
                    desc.add_to_body(&format!(
                        "  {px}.rgb = clamp(pow(clamp({px}.rgb, 0.0, 1.0), {vec3}(1.0) / {power}), 0.0, 1.0);\n"
                    ));
                } else {
                    desc.add_to_body(&format!(
                        "  {px}.rgb = sign({px}.rgb) * pow(abs({px}.rgb), {vec3}(1.0) / {power});\n"
                    ));
                }
                let inv_slope = float3_literal(
                    desc,
                    [
                        if c.slope[0] != 0.0 { 1.0 / c.slope[0] as f32 } else { 0.0 },
                        if c.slope[1] != 0.0 { 1.0 / c.slope[1] as f32 } else { 0.0 },
                        if c.slope[2] != 0.0 { 1.0 / c.slope[2] as f32 } else { 0.0 },
                    ],
                );
                desc.add_to_body(&format!(
                    "  {px}.rgb = ({px}.rgb - {offset}) * {inv_slope};\n"
                ));
                if clamp {
                    desc.add_to_body(&format!("  {px}.rgb = clamp({px}.rgb, 0.0, 1.0);\n"));
                }
            }
        }
        OpData::Log(l) => {
            let forward = op.direction == Direction::Forward;
            let log_slope = float3_literal(desc, l.log_slope.map(|v| v as f32));
            let log_offset = float3_literal(desc, l.log_offset.map(|v| v as f32));
            let lin_slope = float3_literal(desc, l.lin_slope.map(|v| v as f32));
            let lin_offset = float3_literal(desc, l.lin_offset.map(|v| v as f32));
            let vec3 = desc.language.vec3();
            if forward {
                let inv_ln_base = (1.0 / l.base.ln()) as f32;
                desc.add_to_body(&format!(
                    "  {px}.rgb = {log_slope} * log(max({px}.rgb * {lin_slope} + {lin_offset}, {vec3}(1e-10))) * {inv_ln_base:.7} + {log_offset};\n"
                ));
            } else {
                let ln_base = l.base.ln() as f32;
                desc.add_to_body(&format!(
                    "  {px}.rgb = (exp((({px}.rgb - {log_offset}) / {log_slope}) * {ln_base:.7}) - {lin_offset}) / {lin_slope};\n"
                ));
            }
        }
        OpData::Gamma(g) => emit_gamma(desc, px, op.direction, g),
        OpData::Lut1d(l) => {
            let kernel = Lut1dKernel::new(l, op.direction)?;
            // The GPU samples a plain uniform table; half-domain and
            // inverse tables are resampled through the CPU kernel.
            let needs_resample =
                l.half_domain || op.direction == Direction::Inverse || l.hue_adjust;
            let (samples, domain) = if needs_resample {
                const RESAMPLED: usize = 4096;
                let mut data = Vec::with_capacity(RESAMPLED * 3);
                for i in 0..RESAMPLED {
                    let x = i as f32 / (RESAMPLED - 1) as f32;
                    let mut v = [x, x, x, 1.0];
                    kernel.apply(&mut v);
                    data.extend_from_slice(&v[..3]);
                }
                (data, [0.0f32, 1.0])
            } else {
                (l.samples.as_ref().clone(), l.domain)
            };

            let size = samples.len() / 3;
            let (width, height) = if size > desc.max_texture_width {
                let width = desc.max_texture_width;
                let height = size.div_ceil(width);
                (width, height)
            } else {
                (size, 1)
            };

            let name = desc.resource_name("lut1d", index);
            let sampler = format!("{name}_sampler");
            // Separable table: three RED-channel rows would waste space,
            // so pack RGB texels and sample each channel's coordinate.
            desc.add_texture(GpuTexture {
                name: name.clone(),
                sampler_name: sampler.clone(),
                width,
                height,
                depth: 1,
                channels: TextureChannels::Rgb,
                interpolation: if l.interpolation == Interpolation::Nearest {
                    TextureInterpolation::Nearest
                } else {
                    TextureInterpolation::Linear
                },
                data: samples,
            })?;

            let dim = if height > 1 { "sampler2D" } else { "sampler1D" };
            desc.add_to_declarations(&format!("uniform {dim} {sampler};\n"));
            let d0 = domain[0];
            let span = domain[1] - domain[0];
            let scale = (size - 1) as f32 / size as f32;
            let offset = 0.5 / size as f32;
            if height > 1 {
                let helper = format!(
                    "\nfloat {name}_sample(float v)\n{{\n  float idx = clamp(v, 0.0, 1.0) * {max_idx:.1};\n  vec2 uv = vec2((mod(idx, {width:.1}) + 0.5) / {width:.1}, (floor(idx / {width:.1}) + 0.5) / {height:.1});\n  return texture({sampler}, uv).r;\n}}\n",
                    max_idx = (size - 1) as f32,
                    width = width as f32,
                    height = height as f32,
                );
                desc.add_to_helpers(&helper);
                desc.add_to_body(&format!(
                    "  {px}.rgb = ({px}.rgb - {d0:.7}) / {span:.7};\n  {px}.r = {name}_sample({px}.r);\n  {px}.g = {name}_sample({px}.g);\n  {px}.b = {name}_sample({px}.b);\n"
                ));
            } else {
                desc.add_to_body(&format!(
                    "  {px}.rgb = ({px}.rgb - {d0:.7}) / {span:.7};\n  {px}.rgb = clamp({px}.rgb, 0.0, 1.0) * {scale:.7} + {offset:.7};\n  {px}.r = texture({sampler}, {px}.r).r;\n  {px}.g = texture({sampler}, {px}.g).g;\n  {px}.b = texture({sampler}, {px}.b).b;\n"
                ));
            }
        }
        OpData::Lut3d(l) => {
            // Inverse cubes are materialized exactly like the CPU path.
            let edge;
            let data;
            if op.direction == Direction::Inverse {
                let kernel = Lut3dKernel::new(l, Direction::Inverse)?;
                edge = opencolor_ops::lut3d::INVERSE_EDGE;
                let max = (edge - 1) as f32;
                let mut samples = Vec::with_capacity(edge * edge * edge * 3);
                for b in 0..edge {
                    for g in 0..edge {
                        for r in 0..edge {
                            let v =
                                kernel.eval([r as f32 / max, g as f32 / max, b as f32 / max]);
                            samples.extend_from_slice(&v);
                        }
                    }
                }
                data = samples;
            } else {
                edge = l.edge;
                data = l.samples.as_ref().clone();
            }

            let name = desc.resource_name("lut3d", index);
            let sampler = format!("{name}_sampler");
            desc.add_texture(GpuTexture {
                name: name.clone(),
                sampler_name: sampler.clone(),
                width: edge,
                height: edge,
                depth: edge,
                channels: TextureChannels::Rgb,
                interpolation: TextureInterpolation::Linear,
                data,
            })?;
            desc.add_to_declarations(&format!("uniform sampler3D {sampler};\n"));
            let vec3 = desc.language.vec3();
            let scale = (edge - 1) as f32 / edge as f32;
            let offset = 0.5 / edge as f32;
            desc.add_to_body(&format!(
                "  {px}.rgb = texture({sampler}, clamp({px}.rgb, 0.0, 1.0) * {scale:.7} + {vec3}({offset:.7})).rgb;\n"
            ));
        }
        OpData::FixedFunction(f) => emit_fixed_function(desc, px, op.direction, f)?,
        OpData::ExposureContrast(ec) => {
            emit_exposure_contrast(desc, px, index, op.direction, ec, dynamic);
        }
        OpData::NoOp(_) => {}
    }
    Ok(())
}

fn emit_gamma(desc: &mut ShaderDesc, px: &str, direction: Direction, g: &opencolor_ops::gamma::GammaOpData) {
    let forward = direction == Direction::Forward;
    let vec4 = desc.language.vec4();
    let gamma: [f32; 4] = std::array::from_fn(|i| {
        if forward { g.gamma[i] as f32 } else { (1.0 / g.gamma[i]) as f32 }
    });
    let glit = format!(
        "{vec4}({:.7}, {:.7}, {:.7}, {:.7})",
        gamma[0], gamma[1], gamma[2], gamma[3]
    );
    match g.style {
        GammaStyle::Basic => {
            desc.add_to_body(&format!(
                "  {px} = pow(max({px}, {vec4}(0.0)), {glit});\n"
            ));
        }
        GammaStyle::BasicMirror => {
            desc.add_to_body(&format!(
                "  {px} = sign({px}) * pow(abs({px}), {glit});\n"
            ));
        }
        GammaStyle::BasicPassThru => {
            let mix = desc.language.mix_fn();
            desc.add_to_body(&format!(
                "  {px} = {mix}({px}, pow(max({px}, {vec4}(0.0)), {glit}), step({vec4}(0.0), {px}));\n"
            ));
        }
        GammaStyle::Moncurve | GammaStyle::MoncurveMirror => {
            // Channel-wise moncurve with precomputed constants; the
            // sign handling wraps the mirror variant.
            let mirror = g.style == GammaStyle::MoncurveMirror;
            let mut body = String::new();
            for (ch, name) in ["r", "g", "b", "a"].iter().enumerate() {
                let (scale, offset, gam, brk, slope) =
                    moncurve_constants(g.gamma[ch], g.offset[ch], forward);
                let value = if mirror {
                    format!("abs({px}.{name})")
                } else {
                    format!("{px}.{name}")
                };
                let curve = if forward {
                    format!(
                        "({value} <= {brk:.7} ? {value} * {slope:.7} : pow({value} * {scale:.7} + {offset:.7}, {gam:.7}))"
                    )
                } else {
                    format!(
                        "({value} <= {brk:.7} ? {value} * {slope:.7} : pow(max({value}, 0.0), {gam:.7}) * {scale:.7} - {offset:.7})"
                    )
                };
                if mirror {
                    let _ = write!(body, "  {px}.{name} = sign({px}.{name}) * {curve};\n");
                } else {
                    let _ = write!(body, "  {px}.{name} = {curve};\n");
                }
            }
            desc.add_to_body(&body);
        }
    }
}

/// Moncurve constants per channel; mirrors the CPU finalization.
fn moncurve_constants(gamma: f64, offset: f64, forward: bool) -> (f32, f32, f32, f32, f32) {
    if offset <= 0.0 || gamma == 1.0 {
        let g = if forward { gamma } else { 1.0 / gamma };
        return (1.0, 0.0, g as f32, 0.0, 1.0);
    }
    let scale = 1.0 / (1.0 + offset);
    let offs = offset / (1.0 + offset);
    let brk = offset / (gamma - 1.0);
    let slope = ((gamma - 1.0) / offset)
        * ((offset * gamma) / ((gamma - 1.0) * (1.0 + offset))).powf(gamma);
    if forward {
        (scale as f32, offs as f32, gamma as f32, brk as f32, slope as f32)
    } else {
        (
            (1.0 + offset) as f32,
            offset as f32,
            (1.0 / gamma) as f32,
            (brk * slope) as f32,
            (1.0 / slope) as f32,
        )
    }
}

fn emit_fixed_function(
    desc: &mut ShaderDesc,
    px: &str,
    direction: Direction,
    f: &opencolor_ops::fixed_function::FixedFunctionOpData,
) -> OcioResult<()> {
    let forward = direction == Direction::Forward;
    let vec3 = desc.language.vec3();
    match f.style {
        FixedFunctionStyle::XyzToXyy => {
            if forward {
                desc.add_to_body(&format!(
                    "  {{ float d = {px}.r + {px}.g + {px}.b; d = (d == 0.0) ? 0.0 : 1.0 / d; {px}.rgb = {vec3}({px}.r * d, {px}.g * d, {px}.g); }}\n"
                ));
            } else {
                desc.add_to_body(&format!(
                    "  {{ float d = ({px}.g == 0.0) ? 0.0 : 1.0 / {px}.g; float Y = {px}.b; {px}.rgb = {vec3}(Y * {px}.r * d, Y, Y * (1.0 - {px}.r - {px}.g) * d); }}\n"
                ));
            }
        }
        FixedFunctionStyle::XyzToUvy => {
            if forward {
                desc.add_to_body(&format!(
                    "  {{ float d = {px}.r + 15.0 * {px}.g + 3.0 * {px}.b; d = (d == 0.0) ? 0.0 : 1.0 / d; {px}.rgb = {vec3}(4.0 * {px}.r * d, 9.0 * {px}.g * d, {px}.g); }}\n"
                ));
            } else {
                desc.add_to_body(&format!(
                    "  {{ float d = ({px}.g == 0.0) ? 0.0 : 1.0 / {px}.g; float Y = {px}.b; {px}.rgb = {vec3}(2.25 * Y * {px}.r * d, Y, 0.75 * Y * (4.0 - {px}.r - 6.6666667 * {px}.g) * d); }}\n"
                ));
            }
        }
        FixedFunctionStyle::Rec2100Surround => {
            let gamma = f.params[0] as f32;
            let (power, min_lum) = if forward {
                (gamma, 1e-4f32)
            } else {
                (1.0 / gamma, (1e-4f32).powf(gamma))
            };
            desc.add_to_body(&format!(
                "  {{ float Y = max({min_lum:.7e}, dot({px}.rgb, {vec3}(0.2627, 0.6780, 0.0593))); {px}.rgb = {px}.rgb * pow(Y, {:.7});\n  }}\n",
                power - 1.0
            ));
        }
        FixedFunctionStyle::AcesDarkToDim10 => {
            let power = if forward { 0.9811f32 } else { 1.0 / 0.9811 };
            desc.add_to_body(&format!(
                "  {{ float Y = max(1e-10, dot({px}.rgb, {vec3}(0.27222872, 0.67408168, 0.05368952))); {px}.rgb = {px}.rgb * pow(Y, {:.7}); }}\n",
                power - 1.0
            ));
        }
        FixedFunctionStyle::AcesGamutComp13 => {
            let p: Vec<f32> = f.params.iter().map(|&v| v as f32).collect();
            let helper_name = format!("{}_gamut_dist", desc.resource_prefix);
            if !desc.helpers.contains(&helper_name) {
                let invert = "bool invert";
                desc.add_to_helpers(&format!(
                    "\nfloat {helper_name}(float dist, float lim, float thr, float pwr, {invert})\n{{\n  if (dist < thr) return dist;\n  float scl = (lim - thr) / pow(pow((1.0 - thr) / (lim - thr), -pwr) - 1.0, 1.0 / pwr);\n  float nd = (dist - thr) / scl;\n  float p = pow(nd, pwr);\n  if (!invert) return thr + scl * nd / pow(1.0 + p, 1.0 / pwr);\n  if (dist >= thr + scl) return dist;\n  return thr + scl * pow(-(p / (p - 1.0)), 1.0 / pwr);\n}}\n"
                ));
            }
            let inv = if forward { "false" } else { "true" };
            desc.add_to_body(&format!(
                "  {{ float ach = max({px}.r, max({px}.g, {px}.b));\n    if (ach != 0.0) {{\n      float aach = abs(ach);\n      {px}.r = ach - {helper_name}((ach - {px}.r) / aach, {:.7}, {:.7}, {:.7}, {inv}) * aach;\n      {px}.g = ach - {helper_name}((ach - {px}.g) / aach, {:.7}, {:.7}, {:.7}, {inv}) * aach;\n      {px}.b = ach - {helper_name}((ach - {px}.b) / aach, {:.7}, {:.7}, {:.7}, {inv}) * aach;\n    }} }}\n",
                p[0], p[3], p[6], p[1], p[4], p[6], p[2], p[5], p[6]
            ));
        }
        FixedFunctionStyle::RgbToHsv => {
            let helper = format!("{}_rgb_hsv", desc.resource_prefix);
            if !desc.helpers.contains(&helper) {
                desc.add_to_helpers(&format!(
                    "\n{vec3} {helper}_fwd({vec3} c)\n{{\n  float mn = min(c.r, min(c.g, c.b));\n  float mx = max(c.r, max(c.g, c.b));\n  float delta = mx - mn;\n  float hue = 0.0;\n  if (delta != 0.0) {{\n    if (c.r == mx) hue = (c.g - c.b) / delta;\n    else if (c.g == mx) hue = 2.0 + (c.b - c.r) / delta;\n    else hue = 4.0 + (c.r - c.g) / delta;\n    if (hue < 0.0) hue += 6.0;\n    hue /= 6.0;\n  }}\n  float denom = max(abs(mx), abs(mn));\n  float sat = (denom != 0.0) ? delta / denom : 0.0;\n  float val = mx + min(mn, 0.0);\n  return {vec3}(hue, sat, val);\n}}\n\n{vec3} {helper}_inv({vec3} c)\n{{\n  float hue = (c.x - floor(c.x)) * 6.0;\n  float sat = clamp(c.y, 0.0, 1.999);\n  float val = c.z;\n  float r = clamp(abs(hue - 3.0) - 1.0, 0.0, 1.0);\n  float g = clamp(2.0 - abs(hue - 2.0), 0.0, 1.0);\n  float b = clamp(2.0 - abs(hue - 4.0), 0.0, 1.0);\n  float mx = val;\n  float mn = val * (1.0 - sat);\n  if (sat > 1.0) {{ mn = val * (1.0 - sat) / (2.0 - sat); mx = val - mn; }}\n  if (val < 0.0) {{ mn = val / (2.0 - sat); mx = val - mn; }}\n  float delta = mx - mn;\n  return {vec3}(r, g, b) * delta + mn;\n}}\n"
                ));
            }
            let suffix = if forward { "fwd" } else { "inv" };
            desc.add_to_body(&format!("  {px}.rgb = {helper}_{suffix}({px}.rgb);\n"));
        }
        FixedFunctionStyle::XyzToLuv => {
            let helper = format!("{}_xyz_luv", desc.resource_prefix);
            if !desc.helpers.contains(&helper) {
                desc.add_to_helpers(&format!(
                    "\n{vec3} {helper}_fwd({vec3} c)\n{{\n  float d = c.x + 15.0 * c.y + 3.0 * c.z;\n  d = (d == 0.0) ? 0.0 : 1.0 / d;\n  float up = 4.0 * c.x * d;\n  float vp = 9.0 * c.y * d;\n  float L = (c.y > 0.008856452) ? 1.16 * pow(c.y, 1.0 / 3.0) - 0.16 : 9.0329626 * c.y;\n  return {vec3}(L, 13.0 * L * (up - 0.19783001), 13.0 * L * (vp - 0.46831999));\n}}\n\n{vec3} {helper}_inv({vec3} c)\n{{\n  if (c.x <= 0.0) return {vec3}(0.0);\n  float d = 1.0 / (13.0 * c.x);\n  float up = c.y * d + 0.19783001;\n  float vp = c.z * d + 0.46831999;\n  float Y;\n  if (c.x > 0.0799962) {{ float t = (c.x + 0.16) / 1.16; Y = t * t * t; }}\n  else Y = c.x / 9.0329626;\n  float dv = (vp == 0.0) ? 0.0 : 1.0 / vp;\n  return {vec3}(2.25 * Y * up * dv, Y, 0.75 * Y * (4.0 - up - 6.6666667 * vp) * dv);\n}}\n"
                ));
            }
            let suffix = if forward { "fwd" } else { "inv" };
            desc.add_to_body(&format!("  {px}.rgb = {helper}_{suffix}({px}.rgb);\n"));
        }
        // The red modifier and glow styles branch on a hue window that
        // has no stable closed shader form in this generator; they go
        // through the legacy baker.
        FixedFunctionStyle::AcesRedMod03
        | FixedFunctionStyle::AcesRedMod10
        | FixedFunctionStyle::AcesGlow03
        | FixedFunctionStyle::AcesGlow10 => {
            return Err(OcioError::ShaderLimitExceeded(format!(
                "fixed function {} has no direct shader form; use the legacy baker",
                f.style.as_str()
            )));
        }
    }
    Ok(())
}

fn emit_exposure_contrast(
    desc: &mut ShaderDesc,
    px: &str,
    index: usize,
    direction: Direction,
    ec: &opencolor_ops::exposure_contrast::ExposureContrastOpData,
    dynamic: &[DynamicProperty],
) {
    let forward = direction == Direction::Forward;
    // Dynamic parameters become uniforms; static ones are inlined.
    let mut param = |flag: bool, kind: DynamicPropertyType, value: f64| -> String {
        if flag {
            if let Some(prop) = dynamic.iter().find(|p| p.kind() == kind) {
                let name = format!(
                    "{}_{}_{}",
                    desc.resource_prefix,
                    kind.as_str(),
                    index
                );
                let prop = prop.clone();
                desc.add_to_declarations(&format!("uniform float {name};\n"));
                desc.add_uniform(GpuUniform {
                    name: name.clone(),
                    value: UniformValue::Double(Arc::new(move || prop.get())),
                });
                return name;
            }
        }
        format!("{:.7}", value as f32)
    };

    let exposure = param(ec.dynamic_exposure, DynamicPropertyType::Exposure, ec.exposure);
    let contrast = param(ec.dynamic_contrast, DynamicPropertyType::Contrast, ec.contrast);
    let gamma = param(ec.dynamic_gamma, DynamicPropertyType::Gamma, ec.gamma);
    let vec3 = desc.language.vec3();

    match ec.style {
        ExposureContrastStyle::Linear | ExposureContrastStyle::Video => {
            let oetf = if ec.style == ExposureContrastStyle::Video {
                VIDEO_OETF_POWER as f32
            } else {
                1.0
            };
            let pivot = (ec.pivot.max(0.001) as f32).powf(oetf);
            let sign = if forward { "" } else { "-" };
            let inv = if forward { "" } else { "1.0 / " };
            desc.add_to_body(&format!(
                "  {{\n    float c = max(0.001, {contrast} * {gamma});\n    float e = pow(pow(2.0, {sign}{exposure}), {oetf:.7});\n    {px}.rgb = pow(max({vec3}(0.0), {px}.rgb * e / {pivot:.7}), {vec3}({inv}c)) * {pivot:.7};\n  }}\n"
            ));
        }
        ExposureContrastStyle::Logarithmic => {
            let pivot = ec.pivot.max(0.001);
            let log_pivot = ((pivot / 0.18).log2() * ec.log_exposure_step + ec.log_midgray)
                .max(0.0) as f32;
            let step = ec.log_exposure_step as f32;
            if forward {
                desc.add_to_body(&format!(
                    "  {{\n    float c = max(0.001, {contrast} * {gamma});\n    float o = ({exposure} * {step:.7} - {log_pivot:.7}) * c + {log_pivot:.7};\n    {px}.rgb = {px}.rgb * c + o;\n  }}\n"
                ));
            } else {
                desc.add_to_body(&format!(
                    "  {{\n    float ic = 1.0 / max(0.001, {contrast} * {gamma});\n    float o = {log_pivot:.7} - {log_pivot:.7} * ic - {exposure} * {step:.7};\n    {px}.rgb = {px}.rgb * ic + o;\n  }}\n"
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencolor_ops::matrix::MatrixOpData;
    use opencolor_ops::exposure_contrast::ExposureContrastOpData;
    use opencolor_ops::lut1d::Lut1dOpData;
    use opencolor_ops::Op;

    fn processor_of(ops: Vec<Op>) -> Processor {
        Processor::from_op_list(OpList::from_ops(ops)).unwrap()
    }

    #[test]
    fn matrix_shader_contains_mat4() {
        let p = processor_of(vec![Op::forward(MatrixOpData::from_diagonal([
            2.0, 2.0, 2.0, 1.0,
        ]))]);
        let mut desc = ShaderDesc::new(GpuLanguage::Glsl330);
        p.gpu().extract_shader_info(&mut desc).unwrap();
        let text = desc.shader_text();
        assert!(text.contains("#version 330 core"));
        assert!(text.contains("mat4("));
        assert!(text.contains("vec4 OCIODisplay(vec4 inPixel)"));
        assert!(text.contains("return outColor;"));
    }

    #[test]
    fn hlsl_uses_mul_and_float4() {
        let p = processor_of(vec![Op::forward(MatrixOpData::from_diagonal([
            2.0, 2.0, 2.0, 1.0,
        ]))]);
        let mut desc = ShaderDesc::new(GpuLanguage::Hlsl50);
        p.gpu().extract_shader_info(&mut desc).unwrap();
        let text = desc.shader_text();
        assert!(text.contains("mul(float4x4("));
        assert!(text.contains("float4 OCIODisplay(float4 inPixel)"));
    }

    #[test]
    fn lut1d_registers_texture() {
        let p = processor_of(vec![Op::forward(Lut1dOpData::identity(1024))]);
        let mut desc = ShaderDesc::new(GpuLanguage::Glsl330);
        p.gpu().extract_shader_info(&mut desc).unwrap();
        assert_eq!(desc.textures().len(), 1);
        let tex = &desc.textures()[0];
        assert_eq!(tex.width, 1024);
        assert_eq!(tex.height, 1);
        assert_eq!(tex.data.len(), 1024 * 3);
    }

    #[test]
    fn wide_lut1d_wraps_to_2d() {
        let p = processor_of(vec![Op::forward(Lut1dOpData::identity(10000))]);
        let mut desc = ShaderDesc::new(GpuLanguage::Glsl330);
        desc.max_texture_width = 4096;
        p.gpu().extract_shader_info(&mut desc).unwrap();
        let tex = &desc.textures()[0];
        assert_eq!(tex.width, 4096);
        assert!(tex.height > 1);
        assert!(desc.shader_text().contains("_sample(float v)"));
    }

    #[test]
    fn dynamic_exposure_becomes_uniform() {
        let p = processor_of(vec![Op::forward(ExposureContrastOpData {
            dynamic_exposure: true,
            ..Default::default()
        })]);
        let exposure = p
            .dynamic_property(DynamicPropertyType::Exposure)
            .expect("dynamic exposure");
        let mut desc = ShaderDesc::new(GpuLanguage::Glsl330);
        p.gpu().extract_shader_info(&mut desc).unwrap();
        assert_eq!(desc.uniforms().len(), 1);

        exposure.set(2.0);
        match &desc.uniforms()[0].value {
            UniformValue::Double(get) => assert_eq!(get(), 2.0),
            other => panic!("expected double uniform, got {other:?}"),
        }
    }

    #[test]
    fn legacy_bake_marks_description() {
        let p = processor_of(vec![Op::forward(MatrixOpData::from_diagonal([
            0.5, 0.5, 0.5, 1.0,
        ]))]);
        let mut desc = ShaderDesc::new(GpuLanguage::Glsl330);
        p.gpu().extract_legacy_shader_info(&mut desc, 17).unwrap();
        assert!(desc.legacy);
        assert_eq!(desc.textures().len(), 1);
        let tex = &desc.textures()[0];
        assert_eq!(tex.depth, 17);
        // The baked cube holds the halved identity values.
        let mid = tex.data.len() / 2;
        assert!(tex.data[mid] <= 0.5 + 1e-5);
        assert!(desc.shader_text().contains("clamp(outColor.rgb, 0.0, 1.0)"));
    }

    #[test]
    fn resource_prefix_isolation() {
        let p = processor_of(vec![Op::forward(Lut1dOpData::identity(64))]);
        let mut a = ShaderDesc::new(GpuLanguage::Glsl330);
        a.resource_prefix = "viewer_a".into();
        let mut b = ShaderDesc::new(GpuLanguage::Glsl330);
        b.resource_prefix = "viewer_b".into();
        p.gpu().extract_shader_info(&mut a).unwrap();
        p.gpu().extract_shader_info(&mut b).unwrap();
        assert!(a.textures()[0].name.starts_with("viewer_a"));
        assert!(b.textures()[0].name.starts_with("viewer_b"));
        assert_ne!(a.textures()[0].name, b.textures()[0].name);
    }
}
