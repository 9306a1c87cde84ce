//! End-to-end engine tests: file-driven processors, optimizer
//! semantics, caches and cycle detection.

use std::sync::Arc;

use opencolor::transform::{
    CdlTransform, ColorSpaceTransform, ExponentTransform, FileTransform, Lut1dTransform,
    NegativeStyle,
};
use opencolor::{
    clear_all_caches, CdlStyle, ColorSpace, Config, Direction, Interpolation, OcioError,
    OptimizationFlags, Transform,
};

fn write_file(dir: &std::path::Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn empty_config_with_search_path(dir: &std::path::Path) -> Config {
    Config::builder()
        .colorspace(ColorSpace::builder("lin").build())
        .search_path(dir)
        .build()
        .unwrap()
}

const MATRIX_CTF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ProcessList id="fwd-matrix" version="1.8">
  <Matrix inBitDepth="32f" outBitDepth="32f">
    <Array dim="3 3 3">
      0.7537 0.1337 0.1120
      0.0212 1.0054 -0.0266
      -0.0098 0.0045 1.0053
    </Array>
  </Matrix>
</ProcessList>"#;

#[test]
fn matrix_ctf_forward_then_inverse_is_identity() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "m.ctf", MATRIX_CTF);
    let config = empty_config_with_search_path(dir.path());
    let ctx = config.make_context();

    let request = Transform::group(vec![
        Transform::file("m.ctf"),
        Transform::File(FileTransform {
            src: "m.ctf".into(),
            ccc_id: None,
            interpolation: Interpolation::Default,
            direction: Direction::Inverse,
        }),
    ]);
    let processor = config.processor_for_transform(&request, &ctx).unwrap();
    let cpu = processor.cpu().unwrap();

    for sample in [[0.1f32, 0.5, 0.9], [0.0, 0.0, 0.0], [1.0, 0.2, 0.7]] {
        let mut rgb = sample;
        cpu.apply_rgb(&mut rgb);
        for i in 0..3 {
            assert!(
                (rgb[i] - sample[i]).abs() < 1e-6,
                "channel {i}: {} vs {}",
                rgb[i],
                sample[i]
            );
        }
    }
}

#[test]
fn exponent_inverse_pair_optimizes_to_empty() {
    let config = Config::builder()
        .colorspace(ColorSpace::builder("lin").build())
        .build()
        .unwrap();
    let ctx = config.make_context();

    // Mirror style is exactly invertible, so the optimizer must cancel
    // the pair completely.
    let fwd = Transform::Exponent(ExponentTransform {
        value: [2.0, 2.0, 2.0, 1.0],
        negative_style: NegativeStyle::Mirror,
        direction: Direction::Forward,
    });
    let inv = Transform::Exponent(ExponentTransform {
        value: [2.0, 2.0, 2.0, 1.0],
        negative_style: NegativeStyle::Mirror,
        direction: Direction::Inverse,
    });
    let processor = config
        .processor_for_transform(&Transform::group(vec![fwd, inv]), &ctx)
        .unwrap();
    assert!(processor.is_no_op());
}

#[test]
fn asc_cdl_v12_forward_pixel() {
    let config = Config::builder()
        .colorspace(ColorSpace::builder("lin").build())
        .build()
        .unwrap();
    let ctx = config.make_context();

    let cdl = Transform::Cdl(CdlTransform {
        slope: [1.2, 1.3, 1.4],
        offset: [0.0; 3],
        power: [1.0; 3],
        saturation: 1.0,
        style: CdlStyle::V1_2,
        direction: Direction::Forward,
    });
    let processor = config.processor_for_transform(&cdl, &ctx).unwrap();
    let cpu = processor.cpu().unwrap();

    let mut px = [0.1f32, 0.3, 0.9, 0.5];
    cpu.apply_rgba(&mut px);
    assert!((px[0] - 0.12).abs() < 1e-6);
    assert!((px[1] - 0.39).abs() < 1e-6);
    assert!((px[2] - 1.0).abs() < 1e-6); // 1.26 clamps to 1
    assert_eq!(px[3], 0.5);
}

#[test]
fn lut1d_fast_inverse_round_trip() {
    // An sRGB-style encode in a 4096-entry table.
    let size = 4096;
    let mut samples = Vec::with_capacity(size * 3);
    for i in 0..size {
        let x = i as f32 / (size - 1) as f32;
        let v = if x <= 0.0031308 {
            x * 12.92
        } else {
            1.055 * x.powf(1.0 / 2.4) - 0.055
        };
        samples.extend_from_slice(&[v, v, v]);
    }

    let config = Config::builder()
        .colorspace(ColorSpace::builder("lin").build())
        .build()
        .unwrap();
    let ctx = config.make_context();
    let fwd = Transform::Lut1d(Lut1dTransform {
        samples: samples.clone(),
        half_domain: false,
        hue_adjust: false,
        interpolation: Interpolation::Linear,
        direction: Direction::Forward,
    });
    let inv = Transform::Lut1d(Lut1dTransform {
        samples,
        half_domain: false,
        hue_adjust: false,
        interpolation: Interpolation::Linear,
        direction: Direction::Inverse,
    });
    let processor = config
        .processor_for_transform(&Transform::group(vec![fwd, inv]), &ctx)
        .unwrap();
    let cpu = processor
        .cpu_optimized(
            OptimizationFlags::none(),
            opencolor::BitDepth::F32,
            opencolor::BitDepth::F32,
        )
        .unwrap();

    for i in 0..=48 {
        let x = i as f32 / 48.0;
        let mut rgb = [x, x, x];
        cpu.apply_rgb(&mut rgb);
        assert!(
            (rgb[0] - x).abs() < 2e-4,
            "round trip at {x}: got {}",
            rgb[0]
        );
    }
}

#[test]
fn optimizer_preserves_semantics() {
    let config = Config::builder()
        .colorspace(ColorSpace::builder("lin").build())
        .build()
        .unwrap();
    let ctx = config.make_context();

    let chain = Transform::group(vec![
        Transform::Matrix(opencolor::transform::MatrixTransform {
            matrix: [
                0.9, 0.05, 0.05, 0.0,
                0.02, 0.95, 0.03, 0.0,
                0.01, 0.02, 0.97, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ],
            offset: [0.01, 0.0, -0.01, 0.0],
            direction: Direction::Forward,
        }),
        Transform::Matrix(opencolor::transform::MatrixTransform {
            matrix: [
                1.1, 0.0, 0.0, 0.0,
                0.0, 1.1, 0.0, 0.0,
                0.0, 0.0, 1.1, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ],
            offset: [0.0; 4],
            direction: Direction::Forward,
        }),
        Transform::Cdl(CdlTransform {
            slope: [1.05, 1.0, 0.95],
            offset: [0.01, 0.0, 0.0],
            power: [1.0, 1.1, 1.0],
            saturation: 0.9,
            style: CdlStyle::NoClamp,
            direction: Direction::Forward,
        }),
    ]);
    let processor = config.processor_for_transform(&chain, &ctx).unwrap();

    let plain = processor
        .cpu_optimized(
            OptimizationFlags::none(),
            opencolor::BitDepth::F32,
            opencolor::BitDepth::F32,
        )
        .unwrap();
    let optimized = processor.cpu().unwrap();

    let mut i = 0u32;
    while i < 1000 {
        // Deterministic pseudo-random samples in [-0.25, 1.25].
        let r = ((i * 7919) % 1000) as f32 / 1000.0 * 1.5 - 0.25;
        let g = ((i * 104729) % 1000) as f32 / 1000.0 * 1.5 - 0.25;
        let b = ((i * 1299709) % 1000) as f32 / 1000.0 * 1.5 - 0.25;
        let mut a = [r, g, b];
        let mut o = [r, g, b];
        plain.apply_rgb(&mut a);
        optimized.apply_rgb(&mut o);
        for c in 0..3 {
            assert!(
                (a[c] - o[c]).abs() < 1e-5,
                "sample {i} channel {c}: {} vs {}",
                a[c],
                o[c]
            );
        }
        i += 1;
    }
}

#[test]
fn reference_cycle_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "a.ctf",
        r#"<ProcessList id="a" version="1.8">
  <Reference inBitDepth="32f" outBitDepth="32f" path="b.ctf"/>
</ProcessList>"#,
    );
    write_file(
        dir.path(),
        "b.ctf",
        r#"<ProcessList id="b" version="1.8">
  <Reference inBitDepth="32f" outBitDepth="32f" path="a.ctf"/>
</ProcessList>"#,
    );
    clear_all_caches();
    let config = empty_config_with_search_path(dir.path());
    let ctx = config.make_context();
    let err = config
        .processor_for_transform(&Transform::file("a.ctf"), &ctx)
        .unwrap_err();
    assert!(matches!(err, OcioError::ReferenceCycle { .. }));
}

#[test]
fn self_reference_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "selfref.ctf",
        r#"<ProcessList id="s" version="1.8">
  <Reference inBitDepth="32f" outBitDepth="32f" path="selfref.ctf"/>
</ProcessList>"#,
    );
    clear_all_caches();
    let config = empty_config_with_search_path(dir.path());
    let ctx = config.make_context();
    let err = config
        .processor_for_transform(&Transform::file("selfref.ctf"), &ctx)
        .unwrap_err();
    assert!(matches!(err, OcioError::ReferenceCycle { .. }));
}

#[test]
fn cache_purity_across_equal_configs() {
    fn make_config() -> Config {
        Config::builder()
            .colorspace(ColorSpace::builder("lin").build())
            .colorspace(
                ColorSpace::builder("g22")
                    .from_reference(Transform::Exponent(ExponentTransform {
                        value: [1.0 / 2.2, 1.0 / 2.2, 1.0 / 2.2, 1.0],
                        negative_style: NegativeStyle::Clamp,
                        direction: Direction::Forward,
                    }))
                    .build(),
            )
            .build()
            .unwrap()
    }

    let a = make_config();
    let b = make_config();
    assert_eq!(a.cache_id(), b.cache_id());

    let pa = a.processor("lin", "g22").unwrap();
    let pb = b.processor("lin", "g22").unwrap();
    assert_eq!(pa.cache_id(), pb.cache_id());

    let ca = pa.cpu().unwrap();
    let cb = pb.cpu().unwrap();
    for x in [0.0f32, 0.18, 0.5, 1.0, 2.0] {
        let mut ra = [x, x, x];
        let mut rb = [x, x, x];
        ca.apply_rgb(&mut ra);
        cb.apply_rgb(&mut rb);
        assert_eq!(ra, rb, "outputs must be byte-identical at {x}");
    }
}

#[test]
fn context_variables_resolve_lut_paths() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "grade_sh010.cc",
        r#"<ColorCorrection id="sh010">
  <SOPNode>
    <Slope>2.0 2.0 2.0</Slope>
    <Offset>0 0 0</Offset>
    <Power>1 1 1</Power>
  </SOPNode>
</ColorCorrection>"#,
    );
    clear_all_caches();
    let config = empty_config_with_search_path(dir.path());
    let mut ctx = config.make_context();
    ctx.set("SHOT", "sh010");

    let processor = config
        .processor_for_transform(&Transform::file("grade_$SHOT.cc"), &ctx)
        .unwrap();
    let cpu = processor.cpu().unwrap();
    let mut rgb = [0.25f32, 0.25, 0.25];
    cpu.apply_rgb(&mut rgb);
    assert!((rgb[0] - 0.5).abs() < 1e-6);
}

#[test]
fn processor_is_shareable_across_threads() {
    let config = Config::builder()
        .colorspace(ColorSpace::builder("lin").build())
        .build()
        .unwrap();
    let ctx = config.make_context();
    let cdl = Transform::Cdl(CdlTransform {
        slope: [1.1, 1.0, 0.9],
        style: CdlStyle::NoClamp,
        ..Default::default()
    });
    let processor = config.processor_for_transform(&cdl, &ctx).unwrap();
    let cpu = Arc::new(processor.cpu().unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cpu = Arc::clone(&cpu);
            std::thread::spawn(move || {
                let mut rgb = [0.1 * t as f32, 0.5, 0.9];
                cpu.apply_rgb(&mut rgb);
                rgb
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn display_view_pipeline() {
    use opencolor::transform::DisplayViewTransform;
    use opencolor::{Display, View, ViewTransform};

    let config = Config::builder()
        .colorspace(ColorSpace::builder("lin").build())
        .colorspace(
            ColorSpace::builder("srgb-display")
                .reference_space(opencolor::ReferenceSpaceType::Display)
                .from_reference(Transform::Exponent(ExponentTransform {
                    value: [1.0 / 2.4, 1.0 / 2.4, 1.0 / 2.4, 1.0],
                    negative_style: NegativeStyle::Clamp,
                    direction: Direction::Forward,
                }))
                .build(),
        )
        .view_transform(
            ViewTransform::new("sdr", opencolor::ReferenceSpaceType::Scene).from_reference(
                Transform::Cdl(CdlTransform {
                    slope: [0.9, 0.9, 0.9],
                    style: CdlStyle::NoClamp,
                    ..Default::default()
                }),
            ),
        )
        .display(
            Display::new("monitor").view(View::with_view_transform("Film", "sdr", "srgb-display")),
        )
        .build()
        .unwrap();

    let ctx = config.make_context();
    let processor = config
        .processor_for_transform(
            &Transform::DisplayView(DisplayViewTransform {
                src: "lin".into(),
                display: "monitor".into(),
                view: "Film".into(),
                apply_looks: true,
                direction: Direction::Forward,
            }),
            &ctx,
        )
        .unwrap();
    let cpu = processor.cpu().unwrap();

    let mut rgb = [0.5f32, 0.5, 0.5];
    cpu.apply_rgb(&mut rgb);
    // 0.5 * 0.9 through the view transform, then the display encode.
    let expected = (0.5f32 * 0.9).powf(1.0 / 2.4);
    assert!(
        (rgb[0] - expected).abs() < 1e-5,
        "{} vs {expected}",
        rgb[0]
    );

    // Active lists default to everything declared.
    assert_eq!(config.active_displays(), vec!["monitor".to_string()]);
    assert_eq!(config.active_views("monitor").unwrap(), vec!["Film".to_string()]);
}

#[test]
fn clf_metadata_flows_to_processor() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "meta.clf",
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ProcessList id="grade-v2" compCLFversion="3.0">
  <Description>Show grade</Description>
  <InputDescriptor>ACEScct</InputDescriptor>
  <OutputDescriptor>ACEScct</OutputDescriptor>
  <Matrix inBitDepth="32f" outBitDepth="32f">
    <Array dim="3 3 3">1 0 0 0 1 0 0 0 1</Array>
  </Matrix>
</ProcessList>"#,
    );
    clear_all_caches();
    let config = empty_config_with_search_path(dir.path());
    let ctx = config.make_context();
    let processor = config
        .processor_for_transform(&Transform::file("meta.clf"), &ctx)
        .unwrap();
    assert_eq!(processor.ops().metadata.id, "grade-v2");
    assert_eq!(processor.ops().metadata.input_descriptor, "ACEScct");
    assert_eq!(
        processor.ops().metadata.descriptions,
        vec!["Show grade".to_string()]
    );
}

#[test]
fn colorspace_roundtrip_through_reference() {
    // lin -> g22 -> lin must be identity over [0, 1].
    let config = Config::builder()
        .colorspace(ColorSpace::builder("lin").build())
        .colorspace(
            ColorSpace::builder("g22")
                .from_reference(Transform::Exponent(ExponentTransform {
                    value: [1.0 / 2.2, 1.0 / 2.2, 1.0 / 2.2, 1.0],
                    negative_style: NegativeStyle::Clamp,
                    direction: Direction::Forward,
                }))
                .build(),
        )
        .build()
        .unwrap();
    let ctx = config.make_context();

    let there = Transform::ColorSpace(ColorSpaceTransform::new("lin", "g22"));
    let back = Transform::ColorSpace(ColorSpaceTransform::new("g22", "lin"));
    let processor = config
        .processor_for_transform(&Transform::group(vec![there, back]), &ctx)
        .unwrap();
    let cpu = processor.cpu().unwrap();

    for x in [0.0f32, 0.1, 0.18, 0.5, 0.9, 1.0] {
        let mut rgb = [x, x, x];
        cpu.apply_rgb(&mut rgb);
        assert!((rgb[0] - x).abs() < 1e-5, "at {x}: {}", rgb[0]);
    }
}
