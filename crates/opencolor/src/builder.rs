//! Lowering transforms into op lists.
//!
//! The builder walks a [`Transform`] tree with a [`Config`] and a
//! [`Context`] and emits the ordered op list: reference-space hops for
//! color-space pairs, look chains with fallback alternatives, flattened
//! groups, and file payloads dispatched by extension. File references
//! are bracketed with FileNoOp breadcrumbs and checked against the
//! recursion stack, so a CLF `Reference` chain that contains itself
//! fails with `ReferenceCycle` instead of recursing forever.

use std::path::{Path, PathBuf};

use opencolor_lut::clf::{ProcessList, ProcessNode};
use opencolor_math::Matrix44;
use opencolor_ops::cdl::{CdlOpData, CdlStyle};
use opencolor_ops::exposure_contrast::{ExposureContrastOpData, ExposureContrastStyle};
use opencolor_ops::fixed_function::{FixedFunctionOpData, FixedFunctionStyle};
use opencolor_ops::gamma::{GammaOpData, GammaStyle};
use opencolor_ops::log_op::LogOpData;
use opencolor_ops::lut1d::Lut1dOpData;
use opencolor_ops::lut3d::Lut3dOpData;
use opencolor_ops::matrix::MatrixOpData;
use opencolor_ops::noop::NoOpData;
use opencolor_ops::range::RangeOpData;
use opencolor_ops::{Direction, Interpolation, Op, OpList};
use tracing::debug;

use crate::cache::{cached_cdl, cached_process_list};
use crate::colorspace::ColorSpace;
use crate::config::Config;
use crate::context::Context;
use crate::look::parse_look_spec;
use crate::transform::*;
use crate::{OcioError, OcioResult};

/// Lowers transforms against one config + context.
pub(crate) struct OpBuilder<'a> {
    config: &'a Config,
    context: &'a Context,
    /// Files currently being expanded, for cycle detection.
    file_stack: Vec<PathBuf>,
}

impl<'a> OpBuilder<'a> {
    pub(crate) fn new(config: &'a Config, context: &'a Context) -> Self {
        Self {
            config,
            context,
            file_stack: Vec::new(),
        }
    }

    /// Lowers the root request.
    pub(crate) fn build_root(&mut self, transform: &Transform) -> OcioResult<OpList> {
        let mut ops = OpList::new();
        self.build(transform, Direction::Forward, &mut ops)?;
        debug!(ops = ops.len(), "lowered transform");
        Ok(ops)
    }

    /// Lowers one transform. `direction` is the direction imposed from
    /// above; it combines with the transform's own direction field.
    fn build(
        &mut self,
        transform: &Transform,
        direction: Direction,
        out: &mut OpList,
    ) -> OcioResult<()> {
        let dir = match direction {
            Direction::Forward => transform.direction(),
            Direction::Inverse => transform.direction().inverse(),
        };

        match transform {
            Transform::Matrix(t) => {
                let m = Matrix44 {
                    m: t.matrix,
                    offset: t.offset,
                };
                out.push(Op::new(MatrixOpData::new(m).into(), dir));
            }
            Transform::Range(t) => {
                let data = RangeOpData {
                    min_in: t.min_in,
                    max_in: t.max_in,
                    min_out: t.min_out,
                    max_out: t.max_out,
                };
                out.push(Op::new(data.into(), dir));
            }
            Transform::Exponent(t) => {
                let data = GammaOpData {
                    style: t.negative_style.gamma_style(),
                    gamma: t.value,
                    offset: [0.0; 4],
                };
                out.push(Op::new(data.into(), dir));
            }
            Transform::ExponentWithLinear(t) => {
                let data = GammaOpData {
                    style: if t.mirror {
                        GammaStyle::MoncurveMirror
                    } else {
                        GammaStyle::Moncurve
                    },
                    gamma: t.gamma,
                    offset: t.offset,
                };
                out.push(Op::new(data.into(), dir));
            }
            Transform::Log(t) => {
                let data = LogOpData {
                    base: t.base,
                    log_slope: t.log_side_slope,
                    log_offset: t.log_side_offset,
                    lin_slope: t.lin_side_slope,
                    lin_offset: t.lin_side_offset,
                };
                out.push(Op::new(data.into(), dir));
            }
            Transform::Cdl(t) => {
                let data = CdlOpData {
                    slope: t.slope,
                    offset: t.offset,
                    power: t.power,
                    saturation: t.saturation,
                    style: t.style,
                    luma: self.config.luma(),
                };
                out.push(Op::new(data.into(), dir));
            }
            Transform::FixedFunction(t) => {
                let data = FixedFunctionOpData::with_params(t.style, t.params.clone());
                out.push(Op::new(data.into(), dir));
            }
            Transform::ExposureContrast(t) => {
                let data = ExposureContrastOpData {
                    style: t.style,
                    exposure: t.exposure,
                    contrast: t.contrast,
                    gamma: t.gamma,
                    pivot: t.pivot,
                    dynamic_exposure: t.dynamic_exposure,
                    dynamic_contrast: t.dynamic_contrast,
                    dynamic_gamma: t.dynamic_gamma,
                    ..Default::default()
                };
                out.push(Op::new(data.into(), dir));
            }
            Transform::Lut1d(t) => {
                let mut data = Lut1dOpData::new(t.samples.clone());
                data.half_domain = t.half_domain;
                data.hue_adjust = t.hue_adjust;
                data.interpolation = t.interpolation.resolve_1d();
                out.push(Op::new(data.into(), dir));
            }
            Transform::Lut3d(t) => {
                let mut data = Lut3dOpData::new(t.samples.clone(), t.edge);
                data.interpolation = t.interpolation.resolve_3d();
                out.push(Op::new(data.into(), dir));
            }
            Transform::Group(t) => {
                if dir == Direction::Forward {
                    for child in &t.transforms {
                        self.build(child, Direction::Forward, out)?;
                    }
                } else {
                    for child in t.transforms.iter().rev() {
                        self.build(child, Direction::Inverse, out)?;
                    }
                }
            }
            Transform::Allocation(t) => {
                out.push(Op::new(
                    NoOpData::Allocation(t.allocation.clone()).into(),
                    dir,
                ));
            }
            Transform::File(t) => {
                self.build_file(t, dir, out)?;
            }
            Transform::ColorSpace(t) => {
                let (src, dst) = match dir {
                    Direction::Forward => (&t.src, &t.dst),
                    Direction::Inverse => (&t.dst, &t.src),
                };
                self.build_colorspace_pair(src, dst, t.data_bypass, out)?;
            }
            Transform::Look(t) => {
                self.build_look(t, dir, out)?;
            }
            Transform::DisplayView(t) => {
                if dir == Direction::Forward {
                    self.build_display_view(t, out)?;
                } else {
                    let mut fwd = OpList::new();
                    self.build_display_view(t, &mut fwd)?;
                    out.extend(fwd.inverted());
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Color-space pairs
    // ------------------------------------------------------------------

    fn build_colorspace_pair(
        &mut self,
        src: &str,
        dst: &str,
        data_bypass: bool,
        out: &mut OpList,
    ) -> OcioResult<()> {
        let src_cs = self.config.colorspace(src)?;
        let dst_cs = self.config.colorspace(dst)?;

        // Same space or same equality group: nothing to do.
        if src_cs.name().eq_ignore_ascii_case(dst_cs.name()) {
            return Ok(());
        }
        if !src_cs.equality_group().is_empty()
            && src_cs.equality_group() == dst_cs.equality_group()
        {
            return Ok(());
        }
        // Data spaces bypass all numeric transforms unless the caller
        // explicitly disabled the bypass.
        if data_bypass && (src_cs.is_data() || dst_cs.is_data()) {
            return Ok(());
        }

        self.push_allocation_marker(src_cs, out);
        self.build_to_reference(src_cs, out)?;
        self.build_from_reference(dst_cs, out)?;
        self.push_allocation_marker(dst_cs, out);
        Ok(())
    }

    fn push_allocation_marker(&self, cs: &ColorSpace, out: &mut OpList) {
        out.push(Op::forward(NoOpData::Allocation(cs.allocation().clone())));
    }

    /// Emits `cs -> reference`, deriving the missing direction from the
    /// declared one by inversion.
    fn build_to_reference(&mut self, cs: &ColorSpace, out: &mut OpList) -> OcioResult<()> {
        if let Some(t) = cs.to_reference() {
            self.build(t, Direction::Forward, out)
        } else if let Some(t) = cs.from_reference() {
            self.build(t, Direction::Inverse, out)
        } else {
            Ok(())
        }
    }

    /// Emits `reference -> cs`.
    fn build_from_reference(&mut self, cs: &ColorSpace, out: &mut OpList) -> OcioResult<()> {
        if let Some(t) = cs.from_reference() {
            self.build(t, Direction::Forward, out)
        } else if let Some(t) = cs.to_reference() {
            self.build(t, Direction::Inverse, out)
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Looks
    // ------------------------------------------------------------------

    fn build_look(&mut self, t: &LookTransform, dir: Direction, out: &mut OpList) -> OcioResult<()> {
        if dir == Direction::Inverse {
            let mut fwd = OpList::new();
            self.build_look_forward(&t.src, &t.dst, &t.looks, &mut fwd)?;
            out.extend(fwd.inverted());
            return Ok(());
        }
        self.build_look_forward(&t.src, &t.dst, &t.looks, out)
    }

    fn build_look_forward(
        &mut self,
        src: &str,
        dst: &str,
        looks: &str,
        out: &mut OpList,
    ) -> OcioResult<()> {
        let mut current = src.to_string();
        for option in parse_look_spec(looks) {
            let mut last_err = None;
            let mut applied = false;
            for (name, forward) in &option.alternatives {
                if name.is_empty() {
                    // "or nothing" alternative.
                    applied = true;
                    break;
                }
                match self.try_build_one_look(&current, name, *forward) {
                    Ok((ops, end_space)) => {
                        out.extend(ops);
                        current = end_space;
                        applied = true;
                        break;
                    }
                    // Only a missing file lets the chain fall through to
                    // the next alternative.
                    Err(err @ OcioError::MissingFile { .. }) => {
                        last_err = Some(err);
                    }
                    Err(other) => return Err(other),
                }
            }
            if !applied {
                return Err(last_err.unwrap_or_else(|| OcioError::UnknownName {
                    kind: "look",
                    name: looks.to_string(),
                }));
            }
        }
        let end_space = current;
        self.build_colorspace_pair(&end_space, dst, true, out)?;
        Ok(())
    }

    /// Builds one look application starting at `from_space`; returns the
    /// ops and the space the chain ends in (the look's process space).
    fn try_build_one_look(
        &mut self,
        from_space: &str,
        name: &str,
        forward: bool,
    ) -> OcioResult<(OpList, String)> {
        let look = self.config.find_look(name)?;
        let process_space = if look.get_process_space().is_empty() {
            from_space.to_string()
        } else {
            look.get_process_space().to_string()
        };

        let mut ops = OpList::new();
        ops.push(Op::forward(NoOpData::Look { name: name.to_string() }));
        self.build_colorspace_pair(from_space, &process_space, true, &mut ops)?;

        if forward {
            if let Some(t) = look.get_transform() {
                let t = t.clone();
                self.build(&t, Direction::Forward, &mut ops)?;
            }
        } else if let Some(inv) = look.get_inverse_transform() {
            let inv = inv.clone();
            self.build(&inv, Direction::Forward, &mut ops)?;
        } else if let Some(t) = look.get_transform() {
            let t = t.clone();
            self.build(&t, Direction::Inverse, &mut ops)?;
        }
        Ok((ops, process_space))
    }

    // ------------------------------------------------------------------
    // Display / view
    // ------------------------------------------------------------------

    fn build_display_view(&mut self, t: &DisplayViewTransform, out: &mut OpList) -> OcioResult<()> {
        let view = self.config.find_view(&t.display, &t.view)?.clone();
        let mut current = t.src.clone();

        if t.apply_looks && !view.looks.is_empty() {
            // The look chain ends in the last look's process space; no
            // destination hop here, the view continues from that space.
            let mut end = current.clone();
            for option in parse_look_spec(&view.looks) {
                let mut applied = false;
                let mut last_err = None;
                for (name, forward) in &option.alternatives {
                    if name.is_empty() {
                        applied = true;
                        break;
                    }
                    match self.try_build_one_look(&end, name, *forward) {
                        Ok((look_ops, space)) => {
                            out.extend(look_ops);
                            end = space;
                            applied = true;
                            break;
                        }
                        Err(err @ OcioError::MissingFile { .. }) => last_err = Some(err),
                        Err(other) => return Err(other),
                    }
                }
                if !applied {
                    return Err(last_err.unwrap_or_else(|| OcioError::UnknownName {
                        kind: "look",
                        name: view.looks.clone(),
                    }));
                }
            }
            current = end;
        }

        match &view.view_transform {
            Some(vt_name) => {
                // Two-part view: source to the scene reference, through
                // the view transform, then into the display space.
                let vt = self.config.find_view_transform(vt_name)?;
                let to_display_ref = vt.get_from_reference().cloned();
                let from_scene_ref = vt.get_to_reference().cloned();

                let src_cs = self.config.colorspace(&current)?;
                self.build_to_reference(src_cs, out)?;

                if let Some(t) = to_display_ref {
                    self.build(&t, Direction::Forward, out)?;
                } else if let Some(t) = from_scene_ref {
                    self.build(&t, Direction::Inverse, out)?;
                }

                let display_cs = self.config.colorspace(&view.colorspace)?;
                self.build_from_reference(display_cs, out)?;
            }
            None => {
                self.build_colorspace_pair(&current, &view.colorspace, true, out)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    fn build_file(&mut self, t: &FileTransform, dir: Direction, out: &mut OpList) -> OcioResult<()> {
        let resolved = self
            .context
            .resolve_file(&t.src.to_string_lossy())?;
        self.build_file_at(&resolved, t.ccc_id.as_deref(), t.interpolation, dir, out)
    }

    fn build_file_at(
        &mut self,
        path: &Path,
        ccc_id: Option<&str>,
        interpolation: Interpolation,
        dir: Direction,
        out: &mut OpList,
    ) -> OcioResult<()> {
        if self.file_stack.iter().any(|p| p == path) {
            return Err(OcioError::ReferenceCycle {
                path: path.to_path_buf(),
            });
        }
        self.file_stack.push(path.to_path_buf());
        let result = self.build_file_inner(path, ccc_id, interpolation, dir, out);
        self.file_stack.pop();
        result
    }

    fn build_file_inner(
        &mut self,
        path: &Path,
        ccc_id: Option<&str>,
        interpolation: Interpolation,
        dir: Direction,
        out: &mut OpList,
    ) -> OcioResult<()> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let mut ops = OpList::new();
        ops.push(Op::forward(NoOpData::File {
            path: path.to_string_lossy().into_owned(),
        }));

        match ext.as_str() {
            "clf" | "ctf" => {
                let list = cached_process_list(path)?;
                self.process_list_to_ops(&list, path, interpolation, &mut ops)?;
            }
            "spi1d" => {
                let lut = opencolor_lut::spi::read_spi1d(path)?;
                let mut data = Lut1dOpData::new(lut.interleaved());
                data.domain = [lut.domain_min, lut.domain_max];
                data.interpolation = interpolation.resolve_1d();
                ops.push(Op::forward(data));
            }
            "spi3d" => {
                let lut = opencolor_lut::spi::read_spi3d(path)?;
                let mut data = Lut3dOpData::new(lut.samples, lut.edge);
                data.interpolation = interpolation.resolve_3d();
                ops.push(Op::forward(data));
            }
            "spimtx" => {
                let m = opencolor_lut::spi_mtx::read_spimtx(path)?;
                let values: [f64; 9] = std::array::from_fn(|i| m.matrix[i] as f64);
                let mut data = MatrixOpData::new(Matrix44::from_3x3(&values));
                data.matrix.offset = [
                    m.offset[0] as f64,
                    m.offset[1] as f64,
                    m.offset[2] as f64,
                    0.0,
                ];
                ops.push(Op::forward(data));
            }
            "cube" => {
                let file = opencolor_lut::cube::read_cube(path)?;
                if let Some(shaper) = file.shaper {
                    let mut data = Lut1dOpData::new(shaper.interleaved());
                    data.domain = [shaper.domain_min, shaper.domain_max];
                    data.interpolation = interpolation.resolve_1d();
                    ops.push(Op::forward(data));
                }
                if let Some(cube) = file.cube {
                    self.push_cube_ops(cube, interpolation, &mut ops)?;
                }
            }
            "cc" | "ccc" => {
                let cc = cached_cdl(path, ccc_id)?;
                let data = CdlOpData {
                    slope: cc.slope.map(f64::from),
                    offset: cc.offset.map(f64::from),
                    power: cc.power.map(f64::from),
                    saturation: cc.saturation as f64,
                    style: CdlStyle::V1_2,
                    luma: self.config.luma(),
                };
                ops.push(Op::forward(data));
            }
            _ => {
                return Err(OcioError::UnsupportedFormat {
                    extension: ext,
                    path: path.to_path_buf(),
                });
            }
        }

        ops.push(Op::forward(NoOpData::File {
            path: path.to_string_lossy().into_owned(),
        }));

        match dir {
            Direction::Forward => out.extend(ops),
            Direction::Inverse => out.extend(ops.inverted()),
        }
        Ok(())
    }

    /// A cube with a non-unit domain gets a scale matrix in front so the
    /// op-level cube keeps its fixed [0,1] domain.
    fn push_cube_ops(
        &self,
        cube: opencolor_lut::Lut3d,
        interpolation: Interpolation,
        ops: &mut OpList,
    ) -> OcioResult<()> {
        let unit = cube.domain_min == [0.0; 3] && cube.domain_max == [1.0; 3];
        if !unit {
            let mut scale = [0.0f64; 4];
            let mut offset = [0.0f64; 4];
            for i in 0..3 {
                let span = (cube.domain_max[i] - cube.domain_min[i]) as f64;
                if span == 0.0 {
                    return Err(OcioError::Parse("cube with empty domain".into()));
                }
                scale[i] = 1.0 / span;
                offset[i] = -(cube.domain_min[i] as f64) / span;
            }
            scale[3] = 1.0;
            let mut m = MatrixOpData::from_diagonal(scale);
            m.matrix.offset = offset;
            ops.push(Op::forward(m));
        }
        let mut data = Lut3dOpData::new(cube.samples, cube.edge);
        data.interpolation = interpolation.resolve_3d();
        ops.push(Op::forward(data));
        Ok(())
    }

    /// Converts CLF/CTF process nodes into ops; `Reference` nodes
    /// resolve relative to the containing file and recurse.
    fn process_list_to_ops(
        &mut self,
        list: &ProcessList,
        file: &Path,
        interpolation: Interpolation,
        out: &mut OpList,
    ) -> OcioResult<()> {
        if out.metadata.id.is_empty() {
            out.metadata.id = list.id.clone();
            out.metadata.name = list.name.clone().unwrap_or_default();
            out.metadata.descriptions = list.descriptions.clone();
            out.metadata.input_descriptor = list.input_descriptor.clone().unwrap_or_default();
            out.metadata.output_descriptor = list.output_descriptor.clone().unwrap_or_default();
        }
        for node in &list.nodes {
            match node {
                ProcessNode::Matrix { matrix, offset } => {
                    let m = Matrix44 {
                        m: *matrix,
                        offset: *offset,
                    };
                    out.push(Op::forward(MatrixOpData::new(m)));
                }
                ProcessNode::Lut1d {
                    lut,
                    half_domain,
                    hue_adjust,
                    interpolation: node_interp,
                } => {
                    let mut data = Lut1dOpData::new(lut.interleaved());
                    data.domain = [lut.domain_min, lut.domain_max];
                    data.half_domain = *half_domain;
                    data.hue_adjust = *hue_adjust;
                    data.interpolation = match node_interp.as_deref() {
                        Some("nearest") => Interpolation::Nearest,
                        Some(_) | None => interpolation.resolve_1d(),
                    };
                    out.push(Op::forward(data));
                }
                ProcessNode::Lut3d {
                    lut,
                    interpolation: node_interp,
                } => {
                    let mut data = Lut3dOpData::new(lut.samples.clone(), lut.edge);
                    data.interpolation = match node_interp.as_deref() {
                        Some("trilinear") | Some("linear") => Interpolation::Linear,
                        Some(_) | None => interpolation.resolve_3d(),
                    };
                    out.push(Op::forward(data));
                }
                ProcessNode::Range {
                    min_in,
                    max_in,
                    min_out,
                    max_out,
                    no_clamp,
                } => {
                    let data = RangeOpData {
                        min_in: *min_in,
                        max_in: *max_in,
                        min_out: *min_out,
                        max_out: *max_out,
                    };
                    if *no_clamp {
                        // A non-clamping range is just its line.
                        if let Some(m) = data.as_matrix() {
                            out.push(Op::forward(m));
                        }
                    } else {
                        out.push(Op::forward(data));
                    }
                }
                ProcessNode::Cdl {
                    style,
                    slope,
                    offset,
                    power,
                    saturation,
                } => {
                    let (cdl_style, dir) = parse_cdl_style(style)?;
                    let data = CdlOpData {
                        slope: *slope,
                        offset: *offset,
                        power: *power,
                        saturation: *saturation,
                        style: cdl_style,
                        luma: self.config.luma(),
                    };
                    out.push(Op::new(data.into(), dir));
                }
                ProcessNode::Log {
                    style,
                    base,
                    log_slope,
                    log_offset,
                    lin_slope,
                    lin_offset,
                } => {
                    let (data, dir) = log_from_style(
                        style,
                        *base,
                        *log_slope,
                        *log_offset,
                        *lin_slope,
                        *lin_offset,
                    )?;
                    out.push(Op::new(data.into(), dir));
                }
                ProcessNode::Exponent {
                    style,
                    gamma,
                    offset,
                } => {
                    let (gamma_style, dir) = parse_exponent_style(style)?;
                    let data = GammaOpData {
                        style: gamma_style,
                        gamma: *gamma,
                        offset: *offset,
                    };
                    out.push(Op::new(data.into(), dir));
                }
                ProcessNode::ExposureContrast {
                    style,
                    exposure,
                    contrast,
                    gamma,
                    pivot,
                    dynamic,
                } => {
                    let ec_style = match style.to_lowercase().as_str() {
                        "linear" => ExposureContrastStyle::Linear,
                        "video" => ExposureContrastStyle::Video,
                        "log" => ExposureContrastStyle::Logarithmic,
                        other => {
                            return Err(OcioError::Parse(format!(
                                "unknown ExposureContrast style {other:?}"
                            )));
                        }
                    };
                    let data = ExposureContrastOpData {
                        style: ec_style,
                        exposure: *exposure,
                        contrast: *contrast,
                        gamma: *gamma,
                        pivot: *pivot,
                        dynamic_exposure: dynamic[0],
                        dynamic_contrast: dynamic[1],
                        dynamic_gamma: dynamic[2],
                        ..Default::default()
                    };
                    out.push(Op::forward(data));
                }
                ProcessNode::FixedFunction { style, params } => {
                    let (ff_style, dir) = parse_fixed_function_style(style)?;
                    let data = FixedFunctionOpData::with_params(ff_style, params.clone());
                    out.push(Op::new(data.into(), dir));
                }
                ProcessNode::Reference { path, inverted } => {
                    let base = file.parent().unwrap_or_else(|| Path::new("."));
                    let target = base.join(path);
                    let target = if target.is_file() {
                        target
                    } else {
                        self.context.resolve_file(path)?
                    };
                    let dir = if *inverted {
                        Direction::Inverse
                    } else {
                        Direction::Forward
                    };
                    self.build_file_at(&target, None, interpolation, dir, out)?;
                }
            }
        }
        Ok(())
    }
}

fn parse_cdl_style(style: &str) -> OcioResult<(CdlStyle, Direction)> {
    match style {
        "Fwd" | "v1.2_Fwd" => Ok((CdlStyle::V1_2, Direction::Forward)),
        "Rev" | "v1.2_Rev" => Ok((CdlStyle::V1_2, Direction::Inverse)),
        "FwdNoClamp" | "noClampFwd" => Ok((CdlStyle::NoClamp, Direction::Forward)),
        "RevNoClamp" | "noClampRev" => Ok((CdlStyle::NoClamp, Direction::Inverse)),
        other => Err(OcioError::Parse(format!("unknown CDL style {other:?}"))),
    }
}

fn parse_exponent_style(style: &str) -> OcioResult<(GammaStyle, Direction)> {
    let (base, dir) = split_direction(style);
    let gamma_style = match base {
        "basic" => GammaStyle::Basic,
        "basicMirror" => GammaStyle::BasicMirror,
        "basicPassThru" => GammaStyle::BasicPassThru,
        "monCurve" => GammaStyle::Moncurve,
        "monCurveMirror" => GammaStyle::MoncurveMirror,
        other => {
            return Err(OcioError::Parse(format!(
                "unknown Exponent style {other:?}"
            )));
        }
    };
    Ok((gamma_style, dir))
}

fn parse_fixed_function_style(style: &str) -> OcioResult<(FixedFunctionStyle, Direction)> {
    let normalized = style.replace([' ', '-'], "_");
    let (base, dir) = split_direction(&normalized);
    let ff = match base.to_uppercase().as_str() {
        "ACES_REDMOD03" => FixedFunctionStyle::AcesRedMod03,
        "ACES_REDMOD10" => FixedFunctionStyle::AcesRedMod10,
        "ACES_GLOW03" => FixedFunctionStyle::AcesGlow03,
        "ACES_GLOW10" => FixedFunctionStyle::AcesGlow10,
        "ACES_DARKTODIM10" => FixedFunctionStyle::AcesDarkToDim10,
        "ACES_GAMUTCOMP13" => FixedFunctionStyle::AcesGamutComp13,
        "REC2100_SURROUND" => FixedFunctionStyle::Rec2100Surround,
        "RGB_TO_HSV" => FixedFunctionStyle::RgbToHsv,
        "XYZ_TO_XYY" => FixedFunctionStyle::XyzToXyy,
        "XYZ_TO_UVY" => FixedFunctionStyle::XyzToUvy,
        "XYZ_TO_LUV" => FixedFunctionStyle::XyzToLuv,
        other => {
            return Err(OcioError::Parse(format!(
                "unknown FixedFunction style {other:?}"
            )));
        }
    };
    Ok((ff, dir))
}

/// Splits a trailing `Fwd` / `Rev` / `Inv` direction suffix.
fn split_direction(style: &str) -> (&str, Direction) {
    for (suffix, dir) in [
        ("_Fwd", Direction::Forward),
        ("Fwd", Direction::Forward),
        ("_Rev", Direction::Inverse),
        ("Rev", Direction::Inverse),
        ("_Inv", Direction::Inverse),
        ("Inv", Direction::Inverse),
    ] {
        if let Some(base) = style.strip_suffix(suffix) {
            return (base, dir);
        }
    }
    (style, Direction::Forward)
}

fn log_from_style(
    style: &str,
    base: f64,
    log_slope: [f64; 3],
    log_offset: [f64; 3],
    lin_slope: [f64; 3],
    lin_offset: [f64; 3],
) -> OcioResult<(LogOpData, Direction)> {
    let mut data = LogOpData {
        base,
        log_slope,
        log_offset,
        lin_slope,
        lin_offset,
    };
    let dir = match style {
        "log2" => {
            data.base = 2.0;
            Direction::Forward
        }
        "log10" => {
            data.base = 10.0;
            Direction::Forward
        }
        "antiLog2" => {
            data.base = 2.0;
            Direction::Inverse
        }
        "antiLog10" => {
            data.base = 10.0;
            Direction::Inverse
        }
        "linToLog" | "cameraLinToLog" => Direction::Forward,
        "logToLin" | "cameraLogToLin" => Direction::Inverse,
        other => {
            return Err(OcioError::Parse(format!("unknown Log style {other:?}")));
        }
    };
    Ok((data, dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colorspace::{ColorSpace, Encoding};
    use crate::look::Look;
    use opencolor_ops::OpData;

    fn config_with_gamma_spaces() -> Config {
        Config::builder()
            .colorspace(
                ColorSpace::builder("lin")
                    .encoding(Encoding::SceneLinear)
                    .build(),
            )
            .colorspace(
                ColorSpace::builder("g22")
                    .from_reference(Transform::Exponent(ExponentTransform {
                        value: [1.0 / 2.2, 1.0 / 2.2, 1.0 / 2.2, 1.0],
                        negative_style: NegativeStyle::Clamp,
                        direction: Direction::Forward,
                    }))
                    .build(),
            )
            .colorspace(ColorSpace::builder("raw").is_data(true).build())
            .build()
            .unwrap()
    }

    fn lower(config: &Config, t: Transform) -> OpList {
        let ctx = config.make_context();
        let mut b = OpBuilder::new(config, &ctx);
        b.build_root(&t).unwrap()
    }

    #[test]
    fn colorspace_pair_emits_hops() {
        let config = config_with_gamma_spaces();
        let ops = lower(
            &config,
            Transform::ColorSpace(ColorSpaceTransform::new("lin", "g22")),
        );
        // Allocation markers + the gamma op.
        let gamma_ops: Vec<_> = ops
            .ops()
            .iter()
            .filter(|op| matches!(op.data, OpData::Gamma(_)))
            .collect();
        assert_eq!(gamma_ops.len(), 1);
        assert_eq!(gamma_ops[0].direction, Direction::Forward);
    }

    #[test]
    fn missing_to_reference_is_derived_by_inversion() {
        let config = config_with_gamma_spaces();
        let ops = lower(
            &config,
            Transform::ColorSpace(ColorSpaceTransform::new("g22", "lin")),
        );
        let gamma_ops: Vec<_> = ops
            .ops()
            .iter()
            .filter(|op| matches!(op.data, OpData::Gamma(_)))
            .collect();
        assert_eq!(gamma_ops.len(), 1);
        assert_eq!(gamma_ops[0].direction, Direction::Inverse);
    }

    #[test]
    fn data_space_collapses_to_noop() {
        let config = config_with_gamma_spaces();
        let ops = lower(
            &config,
            Transform::ColorSpace(ColorSpaceTransform::new("raw", "g22")),
        );
        assert!(ops.is_empty());
    }

    #[test]
    fn data_bypass_can_be_disabled() {
        let config = config_with_gamma_spaces();
        let mut t = ColorSpaceTransform::new("raw", "g22");
        t.data_bypass = false;
        let ops = lower(&config, Transform::ColorSpace(t));
        assert!(!ops.is_empty());
    }

    #[test]
    fn group_flattens_and_inverse_reverses() {
        let config = config_with_gamma_spaces();
        let group = Transform::group(vec![
            Transform::Matrix(MatrixTransform::default()),
            Transform::Cdl(CdlTransform::default()),
        ])
        .inverse();
        let ops = lower(&config, group);
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops.ops()[0].data, OpData::Cdl(_)));
        assert_eq!(ops.ops()[0].direction, Direction::Inverse);
    }

    #[test]
    fn look_chain_with_missing_file_falls_back() {
        let config = Config::builder()
            .colorspace(ColorSpace::builder("lin").build())
            .look(
                Look::new("broken")
                    .process_space("lin")
                    .transform(Transform::file("/definitely/not/here.cube")),
            )
            .look(
                Look::new("grade")
                    .process_space("lin")
                    .transform(Transform::Cdl(CdlTransform {
                        slope: [1.1, 1.0, 0.9],
                        ..Default::default()
                    })),
            )
            .build()
            .unwrap();

        let ops = lower(
            &config,
            Transform::Look(LookTransform {
                src: "lin".into(),
                dst: "lin".into(),
                looks: "broken | grade".into(),
                direction: Direction::Forward,
            }),
        );
        let cdls: Vec<_> = ops
            .ops()
            .iter()
            .filter(|op| matches!(op.data, OpData::Cdl(_)))
            .collect();
        assert_eq!(cdls.len(), 1);
    }

    #[test]
    fn unknown_space_fails() {
        let config = config_with_gamma_spaces();
        let ctx = config.make_context();
        let mut b = OpBuilder::new(&config, &ctx);
        let err = b
            .build_root(&Transform::ColorSpace(ColorSpaceTransform::new(
                "lin", "nope",
            )))
            .unwrap_err();
        assert!(matches!(err, OcioError::UnknownName { .. }));
    }

    #[test]
    fn style_parsers() {
        assert!(matches!(
            parse_cdl_style("FwdNoClamp").unwrap(),
            (CdlStyle::NoClamp, Direction::Forward)
        ));
        assert!(matches!(
            parse_exponent_style("monCurveRev").unwrap(),
            (GammaStyle::Moncurve, Direction::Inverse)
        ));
        assert!(matches!(
            parse_fixed_function_style("ACES_RedMod10_Fwd").unwrap(),
            (FixedFunctionStyle::AcesRedMod10, Direction::Forward)
        ));
        assert!(parse_cdl_style("sideways").is_err());
    }
}
