//! Whole-pipeline properties across the CPU reference and both dialect
//! emulations.

use std::sync::Arc;

use filmgrade_core::engine::StageEngine;
use filmgrade_core::params::{BaseMode, InversionMode};
use filmgrade_core::parity::{DEFAULT_PARITY_TOLERANCE, EmulatedShaderBackend, check_backend};
use filmgrade_core::{
    BitDepth, CpuBackend, GradingParameters, Lut3D, PixelBuffer, RenderBackend, RenderSession,
    ShaderDialect, Stage, UniformSet,
};

fn backends() -> Vec<Box<dyn RenderBackend>> {
    vec![
        Box::new(CpuBackend::new()),
        Box::new(EmulatedShaderBackend::new(ShaderDialect::Gen1)),
        Box::new(EmulatedShaderBackend::new(ShaderDialect::Gen2)),
    ]
}

/// 16x16 ramp: R across, G down, B diagonal.
fn gradient(depth: BitDepth) -> PixelBuffer {
    let mut pixels = Vec::with_capacity(256);
    for y in 0..16 {
        for x in 0..16 {
            let r = x as f32 / 15.0;
            let g = y as f32 / 15.0;
            pixels.push([r, g, (r + g) * 0.5]);
        }
    }
    PixelBuffer::new(16, 16, pixels, depth).expect("valid shape")
}

fn squaring_lut(size: u32) -> Lut3D {
    let mut lut = Lut3D::identity(size).expect("valid size");
    for e in &mut lut.data {
        *e = e.map(|v| v * v);
    }
    lut
}

fn warm_lut(size: u32) -> Lut3D {
    let mut lut = Lut3D::identity(size).expect("valid size");
    for e in &mut lut.data {
        *e = [(e[0] * 1.08).min(1.0), e[1] * 0.98, e[2] * 0.85];
    }
    lut
}

/// Every stage enabled with moderate settings.
fn busy_params() -> GradingParameters {
    let mut p = GradingParameters::default();
    p.inversion.enabled = true;
    p.inversion.mode = InversionMode::Linear;
    p.film_curve.enabled = true;
    p.film_curve.gamma = 1.1;
    p.film_curve.toe = 0.2;
    p.film_curve.shoulder = 0.1;
    p.base.gains = [1.05, 1.0, 0.95];
    p.levels.enabled = true;
    p.levels.min = [0.1, 0.1, 0.1];
    p.levels.max = [1.9, 1.8, 1.7];
    p.lut3d.grid = Some(Arc::new(warm_lut(17)));
    p.lut3d.intensity = 0.7;
    p.white_balance.temperature = 10.0;
    p.tone.exposure = 5.0;
    p.tone.contrast = 15.0;
    p.tone.whites = 10.0;
    p.tone.blacks = -5.0;
    p.tone.shadows = 20.0;
    p.tone.highlights = -15.0;
    p.tone_curve.rgb = vec![[0.0, 0.0], [96.0, 110.0], [255.0, 250.0]];
    p.tone_curve.red = vec![[0.0, 4.0], [255.0, 255.0]];
    p.hsl.orange = [10.0, 20.0, -10.0];
    p.hsl.blue = [-15.0, -30.0, 5.0];
    p.saturation.global = 12.0;
    p.split_tone.shadow_hue = 210.0;
    p.split_tone.shadow_saturation = 25.0;
    p.split_tone.highlight_hue = 40.0;
    p.split_tone.highlight_saturation = 15.0;
    p.split_tone.balance = 10.0;
    p
}

#[test]
fn test_neutral_8bit_pass_through_on_every_backend() {
    let source = gradient(BitDepth::U8).quantized();
    let expected = source.to_u8();
    for mut backend in backends() {
        let out = backend
            .render(&GradingParameters::default(), &source)
            .expect("render");
        assert_eq!(out.to_u8(), expected, "{} changed neutral input", backend.kind());
    }
}

#[test]
fn test_contrast_mid_gray_scenario_on_every_backend() {
    let source = PixelBuffer::from_u8(1, 1, &[128, 128, 128]).expect("valid shape");
    let mut params = GradingParameters::default();
    params.tone.contrast = 50.0;
    for mut backend in backends() {
        let out = backend.render(&params, &source).expect("render");
        assert_eq!(out.to_u8(), vec![149, 149, 149], "{}", backend.kind());
    }
}

#[test]
fn test_linear_inversion_scenario_on_every_backend() {
    let source = PixelBuffer::from_u8(1, 1, &[200, 50, 10]).expect("valid shape");
    let mut params = GradingParameters::default();
    params.inversion.enabled = true;
    for mut backend in backends() {
        let out = backend.render(&params, &source).expect("render");
        assert_eq!(out.to_u8(), vec![55, 205, 245], "{}", backend.kind());
    }
}

#[test]
fn test_emulated_dialects_match_cpu_within_one_code() {
    let source = gradient(BitDepth::F32);
    let params = busy_params();
    for dialect in ShaderDialect::ALL {
        let mut backend = EmulatedShaderBackend::new(dialect);
        let report = check_backend(&mut backend, &params, &source).expect("render");
        assert!(
            report.passes(DEFAULT_PARITY_TOLERANCE),
            "{dialect}: {report}"
        );
    }
}

#[test]
fn test_disabled_stages_are_bit_exact() {
    // Only some stages on; every other stage must hand its input through.
    let mut params = GradingParameters::default();
    params.inversion.enabled = true;
    params.tone.exposure = 20.0;
    params.saturation.global = 30.0;
    let mut session = RenderSession::new();
    let uniforms = session.sync(&params);
    let textures = session.reference_textures();
    let engine = StageEngine::new(&uniforms, &textures);

    for px in gradient(BitDepth::F32).pixels {
        let mut prev = px;
        for (stage, out) in engine.trace(px) {
            if !stage.is_enabled(&uniforms) {
                assert_eq!(out, prev, "{stage:?} altered {px:?}");
            }
            prev = out;
        }
    }
}

#[test]
fn test_lut_runs_after_inversion_and_before_exposure() {
    let all = Stage::ALL;
    let pos = |s: Stage| all.iter().position(|x| *x == s).expect("listed");
    assert!(pos(Stage::Inversion) < pos(Stage::Lut3d));
    assert!(pos(Stage::Lut3d) < pos(Stage::WhiteBalance));

    let mut params = GradingParameters::default();
    params.inversion.enabled = true;
    params.lut3d.grid = Some(Arc::new(squaring_lut(33)));
    params.tone.exposure = 50.0;
    let mut session = RenderSession::new();
    let uniforms = session.sync(&params);
    let textures = session.reference_textures();
    let engine = StageEngine::new(&uniforms, &textures);

    // 0.8 → invert 0.2 → square 0.04 → ×2 = 0.08.
    // Any other order lands on 0.16, 0.92 or 0.36.
    let out = engine.evaluate([0.8; 3]);
    for (i, v) in out.iter().enumerate() {
        assert!((v - 0.08).abs() < 1e-3, "channel {i}: {v}");
    }
}

#[test]
fn test_tone_curve_is_monotone_end_to_end() {
    let mut params = GradingParameters::default();
    params.tone_curve.rgb = vec![[0.0, 0.0], [40.0, 90.0], [128.0, 140.0], [255.0, 255.0]];
    params.tone_curve.green = vec![[0.0, 10.0], [200.0, 180.0], [255.0, 240.0]];
    let uniforms = UniformSet::from_params(&params);
    assert!(uniforms.tone_curve_enabled.get());

    let mut session = RenderSession::new();
    session.sync(&params);
    let textures = session.reference_textures();
    let engine = StageEngine::new(&uniforms, &textures);
    let mut last = [f32::MIN; 3];
    for i in 0..=255 {
        let v = i as f32 / 255.0;
        let out = engine.evaluate([v; 3]);
        for ch in 0..3 {
            assert!(out[ch] >= last[ch] - 1e-6, "channel {ch} dropped at {i}");
        }
        last = out;
    }
}

#[test]
fn test_density_base_correction_parity() {
    let mut params = GradingParameters::default();
    params.base.mode = BaseMode::DensitySubtract;
    params.base.densities = [0.2, 0.35, 0.5];
    params.inversion.enabled = true;
    params.inversion.mode = InversionMode::Log;
    let source = gradient(BitDepth::F32);
    for dialect in ShaderDialect::ALL {
        let mut backend = EmulatedShaderBackend::new(dialect);
        let report = check_backend(&mut backend, &params, &source).expect("render");
        assert_eq!(report.max_error, 0.0, "{dialect}: {report}");
    }
}
