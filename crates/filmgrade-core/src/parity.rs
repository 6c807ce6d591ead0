//! Cross-backend parity checks.
//!
//! [`ShaderEmulator`] reads the LUT and curves through the exact texture
//! encodings a dialect uploads (packed `f32` vs native `f16` LUT, split vs
//! interleaved curves), so the stage code can be run "as the shader sees
//! it" without a GPU. [`compare`] measures two renders against each other.

use glam::Vec3;

use crate::backend::{BackendKind, RenderBackend};
use crate::cpu::evaluate_buffer;
use crate::curves::{CURVE_SIZE, CurveSet, lerp_table};
use crate::engine::{CurveChannel, TextureAccess};
use crate::error::RenderError;
use crate::image::PixelBuffer;
use crate::lut::{NativeLut3d, PackedLut2d};
use crate::params::GradingParameters;
use crate::session::RenderSession;
use crate::shader::ShaderDialect;

/// One 8-bit code value.
pub const DEFAULT_PARITY_TOLERANCE: f32 = 1.0 / 255.0;

#[derive(Debug, Clone)]
enum EmulatedLut {
    Packed(PackedLut2d),
    Native(NativeLut3d),
}

#[derive(Debug, Clone)]
enum EmulatedCurves {
    /// Four single-channel tables.
    Split(CurveSet),
    /// One RGBA table: master, red, green, blue.
    Interleaved(Vec<[f32; 4]>),
}

/// Texture reads as a shader dialect performs them.
#[derive(Debug, Clone)]
pub struct ShaderEmulator {
    dialect: ShaderDialect,
    lut: Option<EmulatedLut>,
    curves: EmulatedCurves,
}

impl ShaderEmulator {
    /// Build the dialect's encodings from a synced session.
    pub fn from_session(dialect: ShaderDialect, session: &mut RenderSession) -> Self {
        let lut = match dialect {
            ShaderDialect::Gen1 => session.packed_lut().cloned().map(EmulatedLut::Packed),
            ShaderDialect::Gen2 => session.native_lut().cloned().map(EmulatedLut::Native),
        };
        let curves = match dialect {
            ShaderDialect::Gen1 => EmulatedCurves::Split(session.curves().clone()),
            ShaderDialect::Gen2 => EmulatedCurves::Interleaved(interleave_curves(session.curves())),
        };
        Self {
            dialect,
            lut,
            curves,
        }
    }

    pub fn dialect(&self) -> ShaderDialect {
        self.dialect
    }
}

/// Texel rows of the Gen2 curve texture.
pub fn interleave_curves(curves: &CurveSet) -> Vec<[f32; 4]> {
    let [m, r, g, b] = curves.tables();
    (0..CURVE_SIZE).map(|i| [m[i], r[i], g[i], b[i]]).collect()
}

impl TextureAccess for ShaderEmulator {
    fn sample_lut(&self, rgb: Vec3) -> Vec3 {
        let rgb = rgb.to_array();
        match &self.lut {
            Some(EmulatedLut::Packed(lut)) => Vec3::from(lut.sample(rgb)),
            Some(EmulatedLut::Native(lut)) => Vec3::from(lut.sample(rgb)),
            None => Vec3::from(rgb),
        }
    }

    fn curve(&self, channel: CurveChannel, v: f32) -> f32 {
        match &self.curves {
            EmulatedCurves::Split(set) => {
                let table = match channel {
                    CurveChannel::Master => set.master.table(),
                    CurveChannel::Red => set.red.table(),
                    CurveChannel::Green => set.green.table(),
                    CurveChannel::Blue => set.blue.table(),
                };
                lerp_table(table, v)
            }
            EmulatedCurves::Interleaved(rows) => {
                let lane = match channel {
                    CurveChannel::Master => 0,
                    CurveChannel::Red => 1,
                    CurveChannel::Green => 2,
                    CurveChannel::Blue => 3,
                };
                let x = v.clamp(0.0, 1.0) * (CURVE_SIZE - 1) as f32;
                let i = x.floor().min((CURVE_SIZE - 2) as f32);
                let f = x - i;
                let i = i as usize;
                rows[i][lane] + (rows[i + 1][lane] - rows[i][lane]) * f
            }
        }
    }
}

/// Runs the stage engine through a dialect's texture encodings on the CPU.
///
/// The emulator is rebuilt only when the session reports a new curve or
/// LUT generation.
#[derive(Debug)]
pub struct EmulatedShaderBackend {
    dialect: ShaderDialect,
    session: RenderSession,
    /// Emulator and the `(curve, lut)` generations it was built from.
    emulator: Option<((u64, u64), ShaderEmulator)>,
    emulator_builds: u64,
}

impl EmulatedShaderBackend {
    pub fn new(dialect: ShaderDialect) -> Self {
        Self {
            dialect,
            session: RenderSession::new(),
            emulator: None,
            emulator_builds: 0,
        }
    }

    fn sync_emulator(&mut self) -> &ShaderEmulator {
        let current = (
            self.session.curve_generation(),
            self.session.lut_generation(),
        );
        if !matches!(&self.emulator, Some((built, _)) if *built == current) {
            self.emulator = None;
        }
        let (_, emulator) = self.emulator.get_or_insert_with(|| {
            self.emulator_builds += 1;
            tracing::trace!(
                dialect = %self.dialect,
                curve_generation = current.0,
                lut_generation = current.1,
                "rebuilt shader emulator"
            );
            (
                current,
                ShaderEmulator::from_session(self.dialect, &mut self.session),
            )
        });
        emulator
    }
}

impl RenderBackend for EmulatedShaderBackend {
    fn kind(&self) -> BackendKind {
        match self.dialect {
            ShaderDialect::Gen1 => BackendKind::Gen1Shader,
            ShaderDialect::Gen2 => BackendKind::Gen2Shader,
        }
    }

    fn render(
        &mut self,
        params: &GradingParameters,
        source: &PixelBuffer,
    ) -> Result<PixelBuffer, RenderError> {
        let uniforms = self.session.sync(params);
        let emulator = self.sync_emulator();
        Ok(evaluate_buffer(&uniforms, emulator, source))
    }
}

/// Worst and mean absolute difference between two renders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParityReport {
    pub max_error: f32,
    pub mean_error: f32,
    /// `(x, y, channel)` of the largest difference.
    pub worst: Option<(u32, u32, usize)>,
    pub samples: usize,
}

impl ParityReport {
    /// Whether every sample is within `tolerance`.
    pub fn passes(&self, tolerance: f32) -> bool {
        self.max_error <= tolerance
    }

    /// Max error in 8-bit code values.
    pub fn max_error_codes(&self) -> f32 {
        self.max_error * 255.0
    }
}

impl std::fmt::Display for ParityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "max {:.6} ({:.3}/255), mean {:.6} over {} samples",
            self.max_error,
            self.max_error_codes(),
            self.mean_error,
            self.samples
        )?;
        if let Some((x, y, ch)) = self.worst {
            write!(f, ", worst at ({x}, {y}) channel {ch}")?;
        }
        Ok(())
    }
}

/// Compare two buffers sample by sample.
pub fn compare(a: &PixelBuffer, b: &PixelBuffer) -> Result<ParityReport, RenderError> {
    if (a.width, a.height) != (b.width, b.height) || a.pixels.len() != b.pixels.len() {
        return Err(RenderError::ShapeMismatch {
            width: a.width,
            height: a.height,
            samples: b.pixels.len() * 3,
        });
    }

    let mut max_error = 0.0f32;
    let mut sum = 0.0f64;
    let mut worst = None;
    for (i, (pa, pb)) in a.pixels.iter().zip(&b.pixels).enumerate() {
        for ch in 0..3 {
            let err = (pa[ch] - pb[ch]).abs();
            sum += err as f64;
            if err > max_error {
                max_error = err;
                let w = a.width.max(1);
                worst = Some((i as u32 % w, i as u32 / w, ch));
            }
        }
    }
    let samples = a.pixels.len() * 3;
    let mean_error = if samples == 0 {
        0.0
    } else {
        (sum / samples as f64) as f32
    };
    Ok(ParityReport {
        max_error,
        mean_error,
        worst,
        samples,
    })
}

/// Render `source` on `backend` and on the CPU reference, then compare.
pub fn check_backend(
    backend: &mut dyn RenderBackend,
    params: &GradingParameters,
    source: &PixelBuffer,
) -> Result<ParityReport, RenderError> {
    let reference = crate::cpu::CpuBackend::new().render(params, source)?;
    let candidate = backend.render(params, source)?;
    let report = compare(&reference, &candidate)?;
    tracing::debug!(backend = %backend.kind(), %report, "parity check");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::BitDepth;

    #[test]
    fn test_compare_identical_is_zero() {
        let a = PixelBuffer::filled(4, 4, [0.3, 0.5, 0.7], BitDepth::U8);
        let report = compare(&a, &a).expect("same shape");
        assert_eq!(report.max_error, 0.0);
        assert_eq!(report.worst, None);
        assert!(report.passes(DEFAULT_PARITY_TOLERANCE));
    }

    #[test]
    fn test_compare_locates_worst_sample() {
        let a = PixelBuffer::filled(3, 2, [0.5; 3], BitDepth::F32);
        let mut b = a.clone();
        b.pixels[4][2] = 0.6;
        let report = compare(&a, &b).expect("same shape");
        assert!((report.max_error - 0.1).abs() < 1e-6);
        assert_eq!(report.worst, Some((1, 1, 2)));
        assert!(!report.passes(DEFAULT_PARITY_TOLERANCE));
    }

    #[test]
    fn test_compare_rejects_shape_mismatch() {
        let a = PixelBuffer::filled(2, 2, [0.0; 3], BitDepth::U8);
        let b = PixelBuffer::filled(4, 1, [0.0; 3], BitDepth::U8);
        assert!(compare(&a, &b).is_err());
    }

    #[test]
    fn test_emulator_rebuilt_only_on_table_changes() {
        let source = PixelBuffer::filled(2, 2, [0.3, 0.5, 0.7], BitDepth::F32);
        let mut params = GradingParameters::default();
        params.tone_curve.rgb = vec![[0.0, 0.0], [128.0, 150.0], [255.0, 255.0]];
        let mut backend = EmulatedShaderBackend::new(ShaderDialect::Gen2);

        let first = backend.render(&params, &source).expect("renders");
        params.tone.exposure = 20.0;
        backend.render(&params, &source).expect("renders");
        assert_eq!(backend.emulator_builds, 1, "uniform-only change reuses tables");

        params.tone.exposure = 0.0;
        assert_eq!(backend.render(&params, &source).expect("renders"), first);
        assert_eq!(backend.emulator_builds, 1);

        params.tone_curve.rgb = vec![[0.0, 0.0], [128.0, 100.0], [255.0, 255.0]];
        let bent = backend.render(&params, &source).expect("renders");
        assert_eq!(backend.emulator_builds, 2, "curve change rebuilds");
        assert_ne!(bent, first);
    }

    #[test]
    fn test_interleaved_curves_match_split() {
        let mut params = GradingParameters::default();
        params.tone_curve.rgb = vec![[0.0, 0.0], [64.0, 90.0], [255.0, 255.0]];
        params.tone_curve.blue = vec![[0.0, 20.0], [255.0, 230.0]];
        let mut session = RenderSession::new();
        session.sync(&params);
        let gen1 = ShaderEmulator::from_session(ShaderDialect::Gen1, &mut session);
        let gen2 = ShaderEmulator::from_session(ShaderDialect::Gen2, &mut session);
        for i in 0..=40 {
            let v = i as f32 / 40.0;
            for ch in [CurveChannel::Master, CurveChannel::Blue] {
                let a = gen1.curve(ch, v);
                let b = gen2.curve(ch, v);
                assert!((a - b).abs() < 1e-6, "{ch:?} at {v}: {a} vs {b}");
            }
        }
    }
}
