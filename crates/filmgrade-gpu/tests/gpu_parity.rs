//! GPU integration tests. Skipped when no adapter is present.

use std::sync::{Arc, Mutex, OnceLock};

use filmgrade_core::parity::{DEFAULT_PARITY_TOLERANCE, check_backend};
use filmgrade_core::{
    BackendKind, BitDepth, GradingParameters, Lut3D, PixelBuffer, RenderBackend, ShaderDialect,
};
use filmgrade_gpu::{Backend, ShaderBackend, is_available};

fn gpu_test_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn gpu_or_skip() -> bool {
    if is_available() {
        return true;
    }
    eprintln!("skipping: no GPU adapter");
    false
}

fn gradient(width: u32, height: u32) -> PixelBuffer {
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let r = x as f32 / (width - 1) as f32;
            let g = y as f32 / (height - 1) as f32;
            pixels.push([r, g, 0.5]);
        }
    }
    PixelBuffer::new(width, height, pixels, BitDepth::F32).expect("valid shape")
}

fn graded_params() -> GradingParameters {
    let mut lut = Lut3D::identity(17).expect("valid size");
    for e in &mut lut.data {
        *e = [e[0] * 0.95, e[1], (e[2] * 1.05).min(1.0)];
    }
    let mut p = GradingParameters::default();
    p.inversion.enabled = true;
    p.lut3d.grid = Some(Arc::new(lut));
    p.lut3d.intensity = 0.8;
    p.tone.exposure = 10.0;
    p.tone.contrast = 20.0;
    p.tone.shadows = 15.0;
    p.tone_curve.rgb = vec![[0.0, 0.0], [128.0, 140.0], [255.0, 255.0]];
    p.hsl.red = [5.0, 10.0, 0.0];
    p.saturation.global = 10.0;
    p.split_tone.shadow_hue = 200.0;
    p.split_tone.shadow_saturation = 20.0;
    p
}

#[test]
fn test_gpu_dialects_match_cpu() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    if !gpu_or_skip() {
        return;
    }
    let source = gradient(32, 16);
    let params = graded_params();
    for dialect in ShaderDialect::ALL {
        let mut backend = ShaderBackend::new(dialect).expect("shader backend");
        let report = check_backend(&mut backend, &params, &source).expect("render");
        assert!(report.passes(DEFAULT_PARITY_TOLERANCE), "{dialect}: {report}");
    }
}

#[test]
fn test_gpu_contrast_mid_gray() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    if !gpu_or_skip() {
        return;
    }
    let source = PixelBuffer::from_u8(1, 1, &[128, 128, 128]).expect("valid shape");
    let mut params = GradingParameters::default();
    params.tone.contrast = 50.0;
    for kind in [BackendKind::Gen1Shader, BackendKind::Gen2Shader] {
        let mut backend = Backend::create(kind).expect("backend");
        let out = backend.render(&params, &source).expect("render");
        assert_eq!(out.to_u8(), vec![149, 149, 149], "{kind}");
    }
}

#[test]
fn test_gpu_tables_follow_parameter_changes() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    if !gpu_or_skip() {
        return;
    }
    let source = gradient(8, 8);
    let mut backend = ShaderBackend::new(ShaderDialect::Gen2).expect("shader backend");
    let neutral = backend
        .render(&GradingParameters::default(), &source)
        .expect("render");

    let mut params = GradingParameters::default();
    params.tone_curve.rgb = vec![[0.0, 0.0], [128.0, 180.0], [255.0, 255.0]];
    let curved = backend.render(&params, &source).expect("render");
    assert_ne!(neutral.pixels, curved.pixels);

    let again = backend
        .render(&GradingParameters::default(), &source)
        .expect("render");
    let report = filmgrade_core::parity::compare(&neutral, &again).expect("same shape");
    assert!(report.passes(DEFAULT_PARITY_TOLERANCE), "{report}");
}

#[test]
fn test_cpu_backend_needs_no_device() {
    let mut backend = Backend::create(BackendKind::Cpu).expect("cpu backend");
    assert_eq!(backend.kind(), BackendKind::Cpu);
    let source = PixelBuffer::from_u8(1, 1, &[10, 20, 30]).expect("valid shape");
    let out = backend
        .render(&GradingParameters::default(), &source)
        .expect("render");
    assert_eq!(out.to_u8(), vec![10, 20, 30]);
}
