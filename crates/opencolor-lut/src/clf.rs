//! Common LUT Format (CLF) and Autodesk CTF process lists.
//!
//! A `<ProcessList>` holds an ordered sequence of process nodes, one per
//! op kind. Node `inBitDepth` / `outBitDepth` attributes govern **only**
//! the scaling of serialized parameters, never processing precision and
//! never clamping; adjacent nodes must agree on their interface depth.
//! The parser normalizes every parameter to the F32 convention, so
//! downstream consumers never see code values.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <ProcessList id="example" compCLFversion="3.0">
//!   <Description>Example</Description>
//!   <Matrix inBitDepth="32f" outBitDepth="32f">
//!     <Array dim="3 3 3"> ... </Array>
//!   </Matrix>
//!   <LUT1D inBitDepth="32f" outBitDepth="32f">
//!     <Array dim="1024 3"> ... </Array>
//!   </LUT1D>
//! </ProcessList>
//! ```
//!
//! CLF files carry `compCLFversion`; CTF files carry `version` and may
//! use the operator set beyond CLF (`Reference`, `ExposureContrast`,
//! `FixedFunction`).

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::{parse_float, Lut1d, Lut3d, LutError, LutResult};

/// CLF version emitted by the writer.
pub const CLF_VERSION: &str = "3.0";

/// Bit depth tag of a process node.
///
/// Governs the scaling of serialized parameters only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    /// 8-bit code values [0, 255].
    Uint8,
    /// 10-bit code values [0, 1023].
    Uint10,
    /// 12-bit code values [0, 4095].
    Uint12,
    /// 16-bit code values [0, 65535].
    Uint16,
    /// Half float, normalized.
    Float16,
    /// Float, normalized.
    #[default]
    Float32,
}

impl BitDepth {
    /// Maximum code value at this depth.
    #[inline]
    pub fn scale(&self) -> f64 {
        match self {
            BitDepth::Uint8 => 255.0,
            BitDepth::Uint10 => 1023.0,
            BitDepth::Uint12 => 4095.0,
            BitDepth::Uint16 => 65535.0,
            BitDepth::Float16 | BitDepth::Float32 => 1.0,
        }
    }

    /// Parses the CLF attribute form.
    pub fn from_attr(s: &str) -> Option<Self> {
        match s {
            "8i" => Some(BitDepth::Uint8),
            "10i" => Some(BitDepth::Uint10),
            "12i" => Some(BitDepth::Uint12),
            "16i" => Some(BitDepth::Uint16),
            "16f" => Some(BitDepth::Float16),
            "32f" => Some(BitDepth::Float32),
            _ => None,
        }
    }

    /// The CLF attribute form.
    pub fn as_attr(&self) -> &'static str {
        match self {
            BitDepth::Uint8 => "8i",
            BitDepth::Uint10 => "10i",
            BitDepth::Uint12 => "12i",
            BitDepth::Uint16 => "16i",
            BitDepth::Float16 => "16f",
            BitDepth::Float32 => "32f",
        }
    }
}

/// One process node, parameters already normalized to F32 convention.
///
/// Styles are kept as their serialized strings; mapping them onto engine
/// enums is the op builder's concern.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessNode {
    /// 4x4 matrix + offset.
    Matrix {
        /// Row-major 4x4, normalized.
        matrix: [f64; 16],
        /// Offset per channel, normalized.
        offset: [f64; 4],
    },
    /// 1D LUT.
    Lut1d {
        /// The table, output values normalized.
        lut: Lut1d,
        /// Raw IEEE half bit-pattern indexing.
        half_domain: bool,
        /// ACES hue-preserving lookup.
        hue_adjust: bool,
        /// Serialized interpolation attribute.
        interpolation: Option<String>,
    },
    /// 3D LUT.
    Lut3d {
        /// The cube, output values normalized.
        lut: Lut3d,
        /// Serialized interpolation attribute.
        interpolation: Option<String>,
    },
    /// Range remap; open bounds stay `None`.
    Range {
        /// Lower input bound, normalized.
        min_in: Option<f64>,
        /// Upper input bound, normalized.
        max_in: Option<f64>,
        /// Lower output bound, normalized.
        min_out: Option<f64>,
        /// Upper output bound, normalized.
        max_out: Option<f64>,
        /// `style="noClamp"` was present.
        no_clamp: bool,
    },
    /// ASC CDL.
    Cdl {
        /// Serialized style attribute (`Fwd`, `Rev`, `FwdNoClamp`, ...).
        style: String,
        /// Slope per channel.
        slope: [f64; 3],
        /// Offset per channel.
        offset: [f64; 3],
        /// Power per channel.
        power: [f64; 3],
        /// Saturation.
        saturation: f64,
    },
    /// Log with affine parameters.
    Log {
        /// Serialized style (`log2`, `antiLog10`, `linToLog`, ...).
        style: String,
        /// Logarithm base.
        base: f64,
        /// Log-side slope per channel.
        log_slope: [f64; 3],
        /// Log-side offset per channel.
        log_offset: [f64; 3],
        /// Linear-side slope per channel.
        lin_slope: [f64; 3],
        /// Linear-side offset per channel.
        lin_offset: [f64; 3],
    },
    /// Exponent / gamma.
    Exponent {
        /// Serialized style (`basicFwd`, `monCurveRev`, ...).
        style: String,
        /// Exponent per channel (RGBA).
        gamma: [f64; 4],
        /// Moncurve offset per channel (RGBA).
        offset: [f64; 4],
    },
    /// Exposure / contrast (CTF).
    ExposureContrast {
        /// Serialized style (`linear`, `video`, `log`).
        style: String,
        /// Exposure in stops.
        exposure: f64,
        /// Contrast.
        contrast: f64,
        /// Gamma.
        gamma: f64,
        /// Pivot.
        pivot: f64,
        /// Dynamic flags: exposure, contrast, gamma.
        dynamic: [bool; 3],
    },
    /// Fixed function (CTF).
    FixedFunction {
        /// Serialized style name.
        style: String,
        /// Style parameters.
        params: Vec<f64>,
    },
    /// Reference to another transform file (CTF).
    Reference {
        /// Referenced path, relative to the containing file.
        path: String,
        /// Apply the referenced list inverted.
        inverted: bool,
    },
}

/// A parsed `<ProcessList>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessList {
    /// `id` attribute.
    pub id: String,
    /// `name` attribute.
    pub name: Option<String>,
    /// `compCLFversion` (CLF) or `version` (CTF).
    pub version: String,
    /// Whether the file declared itself CTF (`version` attribute).
    pub is_ctf: bool,
    /// Top-level `Description` elements.
    pub descriptions: Vec<String>,
    /// `InputDescriptor` element.
    pub input_descriptor: Option<String>,
    /// `OutputDescriptor` element.
    pub output_descriptor: Option<String>,
    /// Process nodes in order.
    pub nodes: Vec<ProcessNode>,
}

/// Reads a `.clf` / `.ctf` file from disk.
pub fn read_clf(path: &Path) -> LutResult<ProcessList> {
    let file = File::open(path)?;
    parse_process_list(BufReader::new(file))
}

/// In-progress state for the node currently being parsed.
#[derive(Debug, Default)]
struct NodeState {
    tag: String,
    in_depth: BitDepth,
    out_depth: BitDepth,
    style: Option<String>,
    half_domain: bool,
    hue_adjust: bool,
    interpolation: Option<String>,
    array_dim: Vec<usize>,
    array_values: Vec<f64>,
    // Range bounds.
    min_in: Option<f64>,
    max_in: Option<f64>,
    min_out: Option<f64>,
    max_out: Option<f64>,
    // CDL.
    slope: [f64; 3],
    sop_offset: [f64; 3],
    power: [f64; 3],
    saturation: f64,
    // Log.
    base: f64,
    log_slope: [f64; 3],
    log_offset: [f64; 3],
    lin_slope: [f64; 3],
    lin_offset: [f64; 3],
    // Exponent.
    gamma4: [f64; 4],
    offset4: [f64; 4],
    // Exposure/contrast.
    exposure: f64,
    contrast: f64,
    ec_gamma: f64,
    pivot: f64,
    dynamic: [bool; 3],
    // Fixed function.
    params: Vec<f64>,
    // Reference.
    path: Option<String>,
    inverted: bool,
}

impl NodeState {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            slope: [1.0; 3],
            power: [1.0; 3],
            saturation: 1.0,
            base: 2.0,
            log_slope: [1.0; 3],
            lin_slope: [1.0; 3],
            gamma4: [1.0; 4],
            contrast: 1.0,
            ec_gamma: 1.0,
            pivot: 0.18,
            ..Default::default()
        }
    }
}

const NODE_TAGS: [&str; 10] = [
    "Matrix",
    "LUT1D",
    "LUT3D",
    "Range",
    "ASC_CDL",
    "Log",
    "Exponent",
    "Gamma",
    "ExposureContrast",
    "FixedFunction",
];

/// Parses a process list from a reader.
pub fn parse_process_list<R: BufRead>(reader: R) -> LutResult<ProcessList> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut list: Option<ProcessList> = None;
    let mut node: Option<NodeState> = None;
    let mut text = String::new();
    let mut in_array = false;
    let mut array_text = String::new();
    let mut prev_out: Option<BitDepth> = None;

    loop {
        let event = xml
            .read_event_into(&mut buf)
            .map_err(|e| LutError::Parse(e.to_string()))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let empty = matches!(&event, Event::Empty(_));
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let attr = |key: &[u8]| -> Option<String> {
                    e.attributes().flatten().find_map(|a| {
                        (a.key.as_ref() == key)
                            .then(|| String::from_utf8_lossy(&a.value).into_owned())
                    })
                };

                match name.as_str() {
                    "ProcessList" => {
                        let mut pl = ProcessList {
                            id: attr(b"id").unwrap_or_default(),
                            name: attr(b"name"),
                            ..Default::default()
                        };
                        if let Some(v) = attr(b"compCLFversion") {
                            pl.version = v;
                        } else if let Some(v) = attr(b"version") {
                            pl.version = v;
                            pl.is_ctf = true;
                        } else {
                            return Err(LutError::Parse(
                                "ProcessList has neither compCLFversion nor version".into(),
                            ));
                        }
                        list = Some(pl);
                    }
                    tag if NODE_TAGS.contains(&tag) || tag == "Reference" => {
                        let mut state = NodeState::new(tag);
                        if let Some(d) = attr(b"inBitDepth") {
                            state.in_depth = BitDepth::from_attr(&d).ok_or_else(|| {
                                LutError::Parse(format!("bad inBitDepth {d:?}"))
                            })?;
                        }
                        if let Some(d) = attr(b"outBitDepth") {
                            state.out_depth = BitDepth::from_attr(&d).ok_or_else(|| {
                                LutError::Parse(format!("bad outBitDepth {d:?}"))
                            })?;
                        }
                        if let Some(prev) = prev_out {
                            if prev != state.in_depth {
                                return Err(LutError::Parse(format!(
                                    "{tag} inBitDepth {} does not match previous outBitDepth {}",
                                    state.in_depth.as_attr(),
                                    prev.as_attr()
                                )));
                            }
                        }
                        state.style = attr(b"style");
                        state.half_domain = attr(b"halfDomain").as_deref() == Some("true");
                        state.hue_adjust = attr(b"hueAdjust").is_some();
                        state.interpolation = attr(b"interpolation");
                        state.inverted = attr(b"inverted").as_deref() == Some("true");
                        state.path = attr(b"path");
                        if let Some(p) = attr(b"params") {
                            for f in p.split_whitespace() {
                                state.params.push(parse_float(f, 0)? as f64);
                            }
                        }
                        if empty {
                            let finished = finish_node(state, &mut prev_out)?;
                            push_node(&mut list, finished)?;
                        } else {
                            node = Some(state);
                        }
                    }
                    "Array" => {
                        in_array = true;
                        array_text.clear();
                        if let Some(state) = node.as_mut() {
                            if let Some(dim) = attr(b"dim") {
                                state.array_dim = dim
                                    .split_whitespace()
                                    .map(|s| {
                                        s.parse().map_err(|_| {
                                            LutError::Parse(format!("bad dim {dim:?}"))
                                        })
                                    })
                                    .collect::<LutResult<_>>()?;
                            }
                        }
                    }
                    "LogParams" => {
                        if let Some(state) = node.as_mut() {
                            apply_log_params(state, &e.attributes().flatten().collect::<Vec<_>>())?;
                        }
                    }
                    "ExponentParams" | "GammaParams" => {
                        if let Some(state) = node.as_mut() {
                            apply_exponent_params(
                                state,
                                &e.attributes().flatten().collect::<Vec<_>>(),
                            )?;
                        }
                    }
                    "ECParams" => {
                        if let Some(state) = node.as_mut() {
                            for a in e.attributes().flatten() {
                                let v = String::from_utf8_lossy(&a.value).into_owned();
                                match a.key.as_ref() {
                                    b"exposure" => state.exposure = parse_float(&v, 0)? as f64,
                                    b"contrast" => state.contrast = parse_float(&v, 0)? as f64,
                                    b"gamma" => state.ec_gamma = parse_float(&v, 0)? as f64,
                                    b"pivot" => state.pivot = parse_float(&v, 0)? as f64,
                                    _ => {}
                                }
                            }
                        }
                    }
                    "DynamicParameter" => {
                        if let Some(state) = node.as_mut() {
                            for a in e.attributes().flatten() {
                                if a.key.as_ref() == b"param" {
                                    match a.value.as_ref() {
                                        b"EXPOSURE" => state.dynamic[0] = true,
                                        b"CONTRAST" => state.dynamic[1] = true,
                                        b"GAMMA" => state.dynamic[2] = true,
                                        _ => {}
                                    }
                                }
                            }
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            Event::Text(ref e) => {
                let t = e
                    .decode()
                    .map_err(|err| LutError::Parse(err.to_string()))?;
                if in_array {
                    array_text.push(' ');
                    array_text.push_str(&t);
                } else {
                    text = t.into_owned();
                }
            }
            Event::End(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match name.as_str() {
                    "Array" => {
                        in_array = false;
                        if let Some(state) = node.as_mut() {
                            for field in array_text.split_whitespace() {
                                state.array_values.push(parse_float(field, 0)? as f64);
                            }
                        }
                    }
                    "Description" => {
                        if node.is_none() {
                            if let Some(pl) = list.as_mut() {
                                pl.descriptions.push(text.clone());
                            }
                        }
                    }
                    "InputDescriptor" => {
                        if let Some(pl) = list.as_mut() {
                            pl.input_descriptor = Some(text.clone());
                        }
                    }
                    "OutputDescriptor" => {
                        if let Some(pl) = list.as_mut() {
                            pl.output_descriptor = Some(text.clone());
                        }
                    }
                    "Slope" => set_triplet(&mut node, &text, |s, v| s.slope = v)?,
                    "Offset" => set_triplet(&mut node, &text, |s, v| s.sop_offset = v)?,
                    "Power" => set_triplet(&mut node, &text, |s, v| s.power = v)?,
                    "Saturation" => {
                        if let Some(state) = node.as_mut() {
                            state.saturation = parse_float(text.trim(), 0)? as f64;
                        }
                    }
                    "minInValue" => set_bound(&mut node, &text, |s, v| s.min_in = Some(v))?,
                    "maxInValue" => set_bound(&mut node, &text, |s, v| s.max_in = Some(v))?,
                    "minOutValue" => set_bound(&mut node, &text, |s, v| s.min_out = Some(v))?,
                    "maxOutValue" => set_bound(&mut node, &text, |s, v| s.max_out = Some(v))?,
                    tag if (NODE_TAGS.contains(&tag) || tag == "Reference") && node.is_some() => {
                        let state = node.take().ok_or_else(|| {
                            LutError::Parse(format!("unbalanced {tag} element"))
                        })?;
                        let finished = finish_node(state, &mut prev_out)?;
                        push_node(&mut list, finished)?;
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    list.ok_or_else(|| LutError::Parse("no ProcessList element found".into()))
}

fn push_node(list: &mut Option<ProcessList>, node: ProcessNode) -> LutResult<()> {
    list.as_mut()
        .ok_or_else(|| LutError::Parse("process node outside ProcessList".into()))?
        .nodes
        .push(node);
    Ok(())
}

fn set_triplet(
    node: &mut Option<NodeState>,
    text: &str,
    set: impl FnOnce(&mut NodeState, [f64; 3]),
) -> LutResult<()> {
    if let Some(state) = node.as_mut() {
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(LutError::Parse(format!("expected 3 values in {text:?}")));
        }
        let v = [
            parse_float(fields[0], 0)? as f64,
            parse_float(fields[1], 0)? as f64,
            parse_float(fields[2], 0)? as f64,
        ];
        set(state, v);
    }
    Ok(())
}

fn set_bound(
    node: &mut Option<NodeState>,
    text: &str,
    set: impl FnOnce(&mut NodeState, f64),
) -> LutResult<()> {
    if let Some(state) = node.as_mut() {
        set(state, parse_float(text.trim(), 0)? as f64);
    }
    Ok(())
}

fn apply_log_params(
    state: &mut NodeState,
    attrs: &[quick_xml::events::attributes::Attribute<'_>],
) -> LutResult<()> {
    let channels = channel_indices(attrs);
    for a in attrs {
        let v = String::from_utf8_lossy(&a.value).into_owned();
        let mut set3 = |target: &mut [f64; 3]| -> LutResult<()> {
            let val = parse_float(&v, 0)? as f64;
            for &c in &channels {
                target[c] = val;
            }
            Ok(())
        };
        match a.key.as_ref() {
            b"base" => state.base = parse_float(&v, 0)? as f64,
            b"logSideSlope" => set3(&mut state.log_slope)?,
            b"logSideOffset" => set3(&mut state.log_offset)?,
            b"linSideSlope" => set3(&mut state.lin_slope)?,
            b"linSideOffset" => set3(&mut state.lin_offset)?,
            _ => {}
        }
    }
    Ok(())
}

fn apply_exponent_params(
    state: &mut NodeState,
    attrs: &[quick_xml::events::attributes::Attribute<'_>],
) -> LutResult<()> {
    let channels = channel_indices(attrs);
    for a in attrs {
        let v = String::from_utf8_lossy(&a.value).into_owned();
        match a.key.as_ref() {
            b"exponent" | b"gamma" => {
                let val = parse_float(&v, 0)? as f64;
                for &c in &channels {
                    state.gamma4[c] = val;
                }
                if channels.len() == 3 {
                    state.gamma4[3] = 1.0;
                }
            }
            b"offset" => {
                let val = parse_float(&v, 0)? as f64;
                for &c in &channels {
                    state.offset4[c] = val;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Channel indices an R/G/B-qualified params element applies to.
fn channel_indices(attrs: &[quick_xml::events::attributes::Attribute<'_>]) -> Vec<usize> {
    for a in attrs {
        if a.key.as_ref() == b"channel" {
            return match a.value.as_ref() {
                b"R" => vec![0],
                b"G" => vec![1],
                b"B" => vec![2],
                b"A" => vec![3],
                _ => vec![0, 1, 2],
            };
        }
    }
    vec![0, 1, 2]
}

/// Turns accumulated parse state into a normalized node.
fn finish_node(state: NodeState, prev_out: &mut Option<BitDepth>) -> LutResult<ProcessNode> {
    let in_scale = state.in_depth.scale();
    let out_scale = state.out_depth.scale();
    *prev_out = Some(state.out_depth);

    match state.tag.as_str() {
        "Matrix" => {
            let dim = &state.array_dim;
            let values = &state.array_values;
            let (rows, cols) = match dim.as_slice() {
                [r, c, _] => (*r, *c),
                _ => {
                    return Err(LutError::Parse(format!(
                        "Matrix dim must have 3 entries, got {dim:?}"
                    )));
                }
            };
            if values.len() != rows * cols {
                return Err(LutError::Parse(format!(
                    "Matrix expects {} values, got {}",
                    rows * cols,
                    values.len()
                )));
            }
            let has_offset = cols == rows + 1;
            if !(rows == 3 || rows == 4) || !(cols == rows || has_offset) {
                return Err(LutError::Unsupported(format!("Matrix dim {dim:?}")));
            }
            let mut matrix = [
                1.0, 0.0, 0.0, 0.0,
                0.0, 1.0, 0.0, 0.0,
                0.0, 0.0, 1.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ];
            let mut offset = [0.0; 4];
            let coeff_scale = in_scale / out_scale;
            for r in 0..rows {
                for c in 0..cols {
                    let v = values[r * cols + c];
                    if has_offset && c == cols - 1 {
                        offset[r] = v / out_scale;
                    } else {
                        matrix[r * 4 + c] = v * coeff_scale;
                    }
                }
            }
            Ok(ProcessNode::Matrix { matrix, offset })
        }
        "LUT1D" => {
            let values = &state.array_values;
            let (entries, channels) = match state.array_dim.as_slice() {
                [n, c] => (*n, *c),
                _ => {
                    return Err(LutError::Parse("LUT1D dim must be \"n c\"".into()));
                }
            };
            if values.len() != entries * channels || !(channels == 1 || channels == 3) {
                return Err(LutError::Parse(format!(
                    "LUT1D expects {entries}x{channels} values, got {}",
                    values.len()
                )));
            }
            let norm = |v: f64| (v / out_scale) as f32;
            let lut = if channels == 1 {
                Lut1d::from_mono(values.iter().map(|&v| norm(v)).collect(), 0.0, 1.0)?
            } else {
                let mut r = Vec::with_capacity(entries);
                let mut g = Vec::with_capacity(entries);
                let mut b = Vec::with_capacity(entries);
                for chunk in values.chunks_exact(3) {
                    r.push(norm(chunk[0]));
                    g.push(norm(chunk[1]));
                    b.push(norm(chunk[2]));
                }
                Lut1d::from_rgb(r, g, b, 0.0, 1.0)?
            };
            Ok(ProcessNode::Lut1d {
                lut,
                half_domain: state.half_domain,
                hue_adjust: state.hue_adjust,
                interpolation: state.interpolation,
            })
        }
        "LUT3D" => {
            let values = &state.array_values;
            let edge = match state.array_dim.as_slice() {
                [a, b, c, 3] if a == b && b == c => *a,
                _ => {
                    return Err(LutError::Parse(format!(
                        "LUT3D dim must be \"n n n 3\", got {:?}",
                        state.array_dim
                    )));
                }
            };
            if values.len() != edge * edge * edge * 3 {
                return Err(LutError::Parse(format!(
                    "LUT3D expects {} values, got {}",
                    edge * edge * edge * 3,
                    values.len()
                )));
            }
            // CLF cube order is blue-fastest; reorder to red-fastest.
            let mut samples = vec![0.0f32; values.len()];
            let mut i = 0;
            for r in 0..edge {
                for g in 0..edge {
                    for b in 0..edge {
                        let dst = ((b * edge + g) * edge + r) * 3;
                        samples[dst] = (values[i] / out_scale) as f32;
                        samples[dst + 1] = (values[i + 1] / out_scale) as f32;
                        samples[dst + 2] = (values[i + 2] / out_scale) as f32;
                        i += 3;
                    }
                }
            }
            Ok(ProcessNode::Lut3d {
                lut: Lut3d::new(samples, edge)?,
                interpolation: state.interpolation,
            })
        }
        "Range" => Ok(ProcessNode::Range {
            min_in: state.min_in.map(|v| v / in_scale),
            max_in: state.max_in.map(|v| v / in_scale),
            min_out: state.min_out.map(|v| v / out_scale),
            max_out: state.max_out.map(|v| v / out_scale),
            no_clamp: state.style.as_deref() == Some("noClamp"),
        }),
        "ASC_CDL" => Ok(ProcessNode::Cdl {
            style: state.style.unwrap_or_else(|| "Fwd".into()),
            slope: state.slope,
            offset: state.sop_offset,
            power: state.power,
            saturation: state.saturation,
        }),
        "Log" => Ok(ProcessNode::Log {
            style: state.style.unwrap_or_else(|| "log2".into()),
            base: state.base,
            log_slope: state.log_slope,
            log_offset: state.log_offset,
            lin_slope: state.lin_slope,
            lin_offset: state.lin_offset,
        }),
        "Exponent" | "Gamma" => Ok(ProcessNode::Exponent {
            style: state.style.unwrap_or_else(|| "basicFwd".into()),
            gamma: state.gamma4,
            offset: state.offset4,
        }),
        "ExposureContrast" => Ok(ProcessNode::ExposureContrast {
            style: state.style.unwrap_or_else(|| "linear".into()),
            exposure: state.exposure,
            contrast: state.contrast,
            gamma: state.ec_gamma,
            pivot: state.pivot,
            dynamic: state.dynamic,
        }),
        "FixedFunction" => Ok(ProcessNode::FixedFunction {
            style: state
                .style
                .ok_or_else(|| LutError::Parse("FixedFunction needs a style".into()))?,
            params: state.params,
        }),
        "Reference" => Ok(ProcessNode::Reference {
            path: state
                .path
                .ok_or_else(|| LutError::Parse("Reference needs a path".into()))?,
            inverted: state.inverted,
        }),
        other => Err(LutError::Unsupported(format!("process node {other}"))),
    }
}

/// Writes a process list as canonical CLF 3.0 (Unix newlines, 7 decimal
/// digits, stable attribute order).
pub fn write_clf(path: &Path, list: &ProcessList) -> LutResult<()> {
    let file = File::create(path)?;
    write_clf_to(BufWriter::new(file), list)
}

/// Writes canonical CLF to any writer.
pub fn write_clf_to<W: Write>(mut w: W, list: &ProcessList) -> LutResult<()> {
    writeln!(w, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(
        w,
        "<ProcessList id=\"{}\" compCLFversion=\"{}\">",
        escape(&list.id),
        CLF_VERSION
    )?;
    for d in &list.descriptions {
        writeln!(w, "  <Description>{}</Description>", escape(d))?;
    }
    if let Some(d) = &list.input_descriptor {
        writeln!(w, "  <InputDescriptor>{}</InputDescriptor>", escape(d))?;
    }
    if let Some(d) = &list.output_descriptor {
        writeln!(w, "  <OutputDescriptor>{}</OutputDescriptor>", escape(d))?;
    }
    for node in &list.nodes {
        write_node(&mut w, node)?;
    }
    writeln!(w, "</ProcessList>")?;
    Ok(())
}

fn write_node<W: Write>(w: &mut W, node: &ProcessNode) -> LutResult<()> {
    match node {
        ProcessNode::Matrix { matrix, offset } => {
            writeln!(w, "  <Matrix inBitDepth=\"32f\" outBitDepth=\"32f\">")?;
            let has_offset = offset.iter().any(|&v| v != 0.0);
            if has_offset {
                writeln!(w, "    <Array dim=\"3 4 3\">")?;
                for r in 0..3 {
                    writeln!(
                        w,
                        "      {:.7} {:.7} {:.7} {:.7}",
                        matrix[r * 4],
                        matrix[r * 4 + 1],
                        matrix[r * 4 + 2],
                        offset[r]
                    )?;
                }
            } else {
                writeln!(w, "    <Array dim=\"3 3 3\">")?;
                for r in 0..3 {
                    writeln!(
                        w,
                        "      {:.7} {:.7} {:.7}",
                        matrix[r * 4],
                        matrix[r * 4 + 1],
                        matrix[r * 4 + 2]
                    )?;
                }
            }
            writeln!(w, "    </Array>")?;
            writeln!(w, "  </Matrix>")?;
        }
        ProcessNode::Lut1d {
            lut,
            half_domain,
            hue_adjust,
            ..
        } => {
            write!(w, "  <LUT1D inBitDepth=\"32f\" outBitDepth=\"32f\"")?;
            if *half_domain {
                write!(w, " halfDomain=\"true\"")?;
            }
            if *hue_adjust {
                write!(w, " hueAdjust=\"dw3\"")?;
            }
            writeln!(w, ">")?;
            writeln!(w, "    <Array dim=\"{} 3\">", lut.size())?;
            for i in 0..lut.size() {
                writeln!(w, "      {:.7} {:.7} {:.7}", lut.r[i], lut.g[i], lut.b[i])?;
            }
            writeln!(w, "    </Array>")?;
            writeln!(w, "  </LUT1D>")?;
        }
        ProcessNode::Lut3d { lut, .. } => {
            writeln!(w, "  <LUT3D inBitDepth=\"32f\" outBitDepth=\"32f\">")?;
            let e = lut.edge;
            writeln!(w, "    <Array dim=\"{e} {e} {e} 3\">")?;
            // Emit in CLF blue-fastest order.
            for r in 0..e {
                for g in 0..e {
                    for b in 0..e {
                        let i = ((b * e + g) * e + r) * 3;
                        writeln!(
                            w,
                            "      {:.7} {:.7} {:.7}",
                            lut.samples[i],
                            lut.samples[i + 1],
                            lut.samples[i + 2]
                        )?;
                    }
                }
            }
            writeln!(w, "    </Array>")?;
            writeln!(w, "  </LUT3D>")?;
        }
        ProcessNode::Range {
            min_in,
            max_in,
            min_out,
            max_out,
            no_clamp,
        } => {
            write!(w, "  <Range inBitDepth=\"32f\" outBitDepth=\"32f\"")?;
            if *no_clamp {
                write!(w, " style=\"noClamp\"")?;
            }
            writeln!(w, ">")?;
            if let Some(v) = min_in {
                writeln!(w, "    <minInValue>{v:.7}</minInValue>")?;
            }
            if let Some(v) = max_in {
                writeln!(w, "    <maxInValue>{v:.7}</maxInValue>")?;
            }
            if let Some(v) = min_out {
                writeln!(w, "    <minOutValue>{v:.7}</minOutValue>")?;
            }
            if let Some(v) = max_out {
                writeln!(w, "    <maxOutValue>{v:.7}</maxOutValue>")?;
            }
            writeln!(w, "  </Range>")?;
        }
        ProcessNode::Cdl {
            style,
            slope,
            offset,
            power,
            saturation,
        } => {
            writeln!(
                w,
                "  <ASC_CDL inBitDepth=\"32f\" outBitDepth=\"32f\" style=\"{}\">",
                escape(style)
            )?;
            writeln!(w, "    <SOPNode>")?;
            writeln!(
                w,
                "      <Slope>{:.7} {:.7} {:.7}</Slope>",
                slope[0], slope[1], slope[2]
            )?;
            writeln!(
                w,
                "      <Offset>{:.7} {:.7} {:.7}</Offset>",
                offset[0], offset[1], offset[2]
            )?;
            writeln!(
                w,
                "      <Power>{:.7} {:.7} {:.7}</Power>",
                power[0], power[1], power[2]
            )?;
            writeln!(w, "    </SOPNode>")?;
            writeln!(w, "    <SatNode>")?;
            writeln!(w, "      <Saturation>{saturation:.7}</Saturation>")?;
            writeln!(w, "    </SatNode>")?;
            writeln!(w, "  </ASC_CDL>")?;
        }
        ProcessNode::Log {
            style,
            base,
            log_slope,
            log_offset,
            lin_slope,
            lin_offset,
        } => {
            writeln!(
                w,
                "  <Log inBitDepth=\"32f\" outBitDepth=\"32f\" style=\"{}\">",
                escape(style)
            )?;
            writeln!(
                w,
                "    <LogParams base=\"{base:.7}\" logSideSlope=\"{:.7}\" logSideOffset=\"{:.7}\" linSideSlope=\"{:.7}\" linSideOffset=\"{:.7}\"/>",
                log_slope[0], log_offset[0], lin_slope[0], lin_offset[0]
            )?;
            writeln!(w, "  </Log>")?;
        }
        ProcessNode::Exponent {
            style,
            gamma,
            offset,
        } => {
            writeln!(
                w,
                "  <Exponent inBitDepth=\"32f\" outBitDepth=\"32f\" style=\"{}\">",
                escape(style)
            )?;
            if offset.iter().any(|&v| v != 0.0) {
                writeln!(
                    w,
                    "    <ExponentParams exponent=\"{:.7}\" offset=\"{:.7}\"/>",
                    gamma[0], offset[0]
                )?;
            } else {
                writeln!(w, "    <ExponentParams exponent=\"{:.7}\"/>", gamma[0])?;
            }
            writeln!(w, "  </Exponent>")?;
        }
        ProcessNode::ExposureContrast {
            style,
            exposure,
            contrast,
            gamma,
            pivot,
            dynamic,
        } => {
            writeln!(
                w,
                "  <ExposureContrast inBitDepth=\"32f\" outBitDepth=\"32f\" style=\"{}\">",
                escape(style)
            )?;
            writeln!(
                w,
                "    <ECParams exposure=\"{exposure:.7}\" contrast=\"{contrast:.7}\" gamma=\"{gamma:.7}\" pivot=\"{pivot:.7}\"/>"
            )?;
            for (flag, name) in dynamic.iter().zip(["EXPOSURE", "CONTRAST", "GAMMA"]) {
                if *flag {
                    writeln!(w, "    <DynamicParameter param=\"{name}\"/>")?;
                }
            }
            writeln!(w, "  </ExposureContrast>")?;
        }
        ProcessNode::FixedFunction { style, params } => {
            write!(
                w,
                "  <FixedFunction inBitDepth=\"32f\" outBitDepth=\"32f\" style=\"{}\"",
                escape(style)
            )?;
            if !params.is_empty() {
                let joined: Vec<String> = params.iter().map(|p| format!("{p:.7}")).collect();
                write!(w, " params=\"{}\"", joined.join(" "))?;
            }
            writeln!(w, "/>")?;
        }
        ProcessNode::Reference { path, inverted } => {
            write!(
                w,
                "  <Reference inBitDepth=\"32f\" outBitDepth=\"32f\" path=\"{}\"",
                escape(path)
            )?;
            if *inverted {
                write!(w, " inverted=\"true\"")?;
            }
            writeln!(w, "/>")?;
        }
    }
    Ok(())
}

fn escape(s: &str) -> String {
    quick_xml::escape::escape(s).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Cursor;

    #[test]
    fn parse_matrix_with_bit_depth_scaling() {
        let xml = r#"<?xml version="1.0"?>
<ProcessList id="m" compCLFversion="3.0">
  <Matrix inBitDepth="10i" outBitDepth="10i">
    <Array dim="3 4 3">
      1.0 0.0 0.0 511.5
      0.0 1.0 0.0 0.0
      0.0 0.0 1.0 0.0
    </Array>
  </Matrix>
</ProcessList>"#;
        let pl = parse_process_list(Cursor::new(xml)).unwrap();
        assert_eq!(pl.id, "m");
        assert!(!pl.is_ctf);
        match &pl.nodes[0] {
            ProcessNode::Matrix { matrix, offset } => {
                // Coefficients keep their value (in and out scales match);
                // the offset column is normalized by the out scale.
                assert_abs_diff_eq!(matrix[0], 1.0, epsilon = 1e-9);
                assert_abs_diff_eq!(offset[0], 0.5, epsilon = 1e-9);
            }
            other => panic!("expected matrix, got {other:?}"),
        }
    }

    #[test]
    fn parse_lut1d_with_scaling_and_flags() {
        let xml = r#"<ProcessList id="l" compCLFversion="3.0">
  <LUT1D inBitDepth="32f" outBitDepth="10i" interpolation="linear">
    <Array dim="2 3">
      0 0 0
      1023 1023 1023
    </Array>
  </LUT1D>
</ProcessList>"#;
        let pl = parse_process_list(Cursor::new(xml)).unwrap();
        match &pl.nodes[0] {
            ProcessNode::Lut1d { lut, half_domain, .. } => {
                assert!(!half_domain);
                assert_eq!(lut.size(), 2);
                assert_abs_diff_eq!(lut.r[1], 1.0, epsilon = 1e-6);
            }
            other => panic!("expected lut1d, got {other:?}"),
        }
    }

    #[test]
    fn adjacent_depth_mismatch_rejected() {
        let xml = r#"<ProcessList id="x" compCLFversion="3.0">
  <Matrix inBitDepth="32f" outBitDepth="10i">
    <Array dim="3 3 3">1 0 0 0 1 0 0 0 1</Array>
  </Matrix>
  <Range inBitDepth="32f" outBitDepth="32f">
    <minInValue>0.0</minInValue>
    <minOutValue>0.0</minOutValue>
  </Range>
</ProcessList>"#;
        assert!(parse_process_list(Cursor::new(xml)).is_err());
    }

    #[test]
    fn parse_range_scales_per_side() {
        let xml = r#"<ProcessList id="r" compCLFversion="3.0">
  <Range inBitDepth="10i" outBitDepth="32f">
    <minInValue>0</minInValue>
    <maxInValue>1023</maxInValue>
    <minOutValue>0.0</minOutValue>
    <maxOutValue>2.0</maxOutValue>
  </Range>
</ProcessList>"#;
        let pl = parse_process_list(Cursor::new(xml)).unwrap();
        match &pl.nodes[0] {
            ProcessNode::Range {
                min_in,
                max_in,
                max_out,
                ..
            } => {
                assert_abs_diff_eq!(min_in.unwrap(), 0.0, epsilon = 1e-9);
                assert_abs_diff_eq!(max_in.unwrap(), 1.0, epsilon = 1e-9);
                assert_abs_diff_eq!(max_out.unwrap(), 2.0, epsilon = 1e-9);
            }
            other => panic!("expected range, got {other:?}"),
        }
    }

    #[test]
    fn parse_ctf_with_reference_and_ec() {
        let xml = r#"<ProcessList id="c" version="1.8">
  <Reference inBitDepth="32f" outBitDepth="32f" path="shared/base.ctf" inverted="true"/>
  <ExposureContrast inBitDepth="32f" outBitDepth="32f" style="linear">
    <ECParams exposure="0.5" contrast="1.2" gamma="1.0" pivot="0.18"/>
    <DynamicParameter param="EXPOSURE"/>
  </ExposureContrast>
</ProcessList>"#;
        let pl = parse_process_list(Cursor::new(xml)).unwrap();
        assert!(pl.is_ctf);
        match &pl.nodes[0] {
            ProcessNode::Reference { path, inverted } => {
                assert_eq!(path, "shared/base.ctf");
                assert!(inverted);
            }
            other => panic!("expected reference, got {other:?}"),
        }
        match &pl.nodes[1] {
            ProcessNode::ExposureContrast {
                exposure, dynamic, ..
            } => {
                assert_abs_diff_eq!(*exposure, 0.5, epsilon = 1e-9);
                assert_eq!(*dynamic, [true, false, false]);
            }
            other => panic!("expected exposure/contrast, got {other:?}"),
        }
    }

    #[test]
    fn parse_cdl_and_log() {
        let xml = r#"<ProcessList id="g" compCLFversion="3.0">
  <ASC_CDL inBitDepth="32f" outBitDepth="32f" style="Fwd">
    <SOPNode>
      <Slope>1.2 1.3 1.4</Slope>
      <Offset>0.0 0.0 0.0</Offset>
      <Power>1.0 1.0 1.0</Power>
    </SOPNode>
    <SatNode><Saturation>0.9</Saturation></SatNode>
  </ASC_CDL>
  <Log inBitDepth="32f" outBitDepth="32f" style="linToLog">
    <LogParams base="10" logSideSlope="0.25" logSideOffset="0.41" linSideSlope="5.55" linSideOffset="0.05"/>
  </Log>
</ProcessList>"#;
        let pl = parse_process_list(Cursor::new(xml)).unwrap();
        match &pl.nodes[0] {
            ProcessNode::Cdl { slope, saturation, .. } => {
                assert_abs_diff_eq!(slope[1], 1.3, epsilon = 1e-6);
                assert_abs_diff_eq!(*saturation, 0.9, epsilon = 1e-6);
            }
            other => panic!("expected cdl, got {other:?}"),
        }
        match &pl.nodes[1] {
            ProcessNode::Log { base, log_slope, .. } => {
                assert_abs_diff_eq!(*base, 10.0, epsilon = 1e-9);
                assert_abs_diff_eq!(log_slope[0], 0.25, epsilon = 1e-6);
            }
            other => panic!("expected log, got {other:?}"),
        }
    }

    #[test]
    fn malformed_array_value_rejected() {
        let xml = r#"<ProcessList id="x" compCLFversion="3.0">
  <Matrix inBitDepth="32f" outBitDepth="32f">
    <Array dim="3 3 3">1 0 0 0 bogus 0 0 0 1</Array>
  </Matrix>
</ProcessList>"#;
        assert!(matches!(
            parse_process_list(Cursor::new(xml)),
            Err(LutError::MalformedNumber { .. })
        ));
    }

    #[test]
    fn write_then_parse_round_trip() {
        let xml = r#"<ProcessList id="rt" compCLFversion="3.0">
  <Matrix inBitDepth="32f" outBitDepth="32f">
    <Array dim="3 4 3">
      0.75 0.13 0.11 0.01
      0.02 1.0 -0.02 0.0
      -0.01 0.0 1.0 0.0
    </Array>
  </Matrix>
  <Range inBitDepth="32f" outBitDepth="32f">
    <minInValue>0.0</minInValue>
    <maxInValue>1.0</maxInValue>
    <minOutValue>0.0</minOutValue>
    <maxOutValue>1.0</maxOutValue>
  </Range>
</ProcessList>"#;
        let pl = parse_process_list(Cursor::new(xml)).unwrap();
        let mut out = Vec::new();
        write_clf_to(&mut out, &pl).unwrap();
        let again = parse_process_list(Cursor::new(out)).unwrap();
        assert_eq!(again.nodes.len(), pl.nodes.len());
        match (&pl.nodes[0], &again.nodes[0]) {
            (
                ProcessNode::Matrix { matrix: a, .. },
                ProcessNode::Matrix { matrix: b, .. },
            ) => {
                for i in 0..16 {
                    assert_abs_diff_eq!(a[i], b[i], epsilon = 1e-6);
                }
            }
            _ => panic!("expected matrices"),
        }
    }

    #[test]
    fn lut3d_reorders_to_red_fastest() {
        // Identity 2-cube in CLF blue-fastest order.
        let xml = r#"<ProcessList id="c3" compCLFversion="3.0">
  <LUT3D inBitDepth="32f" outBitDepth="32f" interpolation="tetrahedral">
    <Array dim="2 2 2 3">
      0 0 0
      0 0 1
      0 1 0
      0 1 1
      1 0 0
      1 0 1
      1 1 0
      1 1 1
    </Array>
  </LUT3D>
</ProcessList>"#;
        let pl = parse_process_list(Cursor::new(xml)).unwrap();
        match &pl.nodes[0] {
            ProcessNode::Lut3d { lut, .. } => {
                // Red-fastest node (1,0,0) must hold RGB (1,0,0).
                assert_eq!(&lut.samples[3..6], &[1.0, 0.0, 0.0]);
                // Blue neighbor (0,0,1) holds (0,0,1).
                let idx = ((1 * 2 + 0) * 2 + 0) * 3;
                assert_eq!(&lut.samples[idx..idx + 3], &[0.0, 0.0, 1.0]);
            }
            other => panic!("expected lut3d, got {other:?}"),
        }
    }
}
