//! The ordered stage list and the per-pixel math of every stage.
//!
//! Stage functions take and return `glam::Vec3` and read their controls
//! from [`UniformSet`]. They are written to mirror the generated WGSL line
//! for line: same operation order, same guards, same constants.
//!
//! Clamping: stages 1–5 and 12–15 clamp their output to `[0, 1]`; the tone
//! group (6–11) runs unclamped and highlight roll-off clamps once at its end.

pub mod color;
pub mod film;
pub mod tone;

use glam::Vec3;

use crate::uniforms::UniformSet;

/// `log10(2)`: converts `-log2(t)` to optical density.
pub const LOG10_2: f32 = std::f32::consts::LOG10_2;
/// `log2(10)`: converts density back to a base-2 exponent.
pub const LOG2_10: f32 = std::f32::consts::LOG2_10;

/// Rec. 709 luminance weights.
pub const LUMA: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

/// One step of the rendering pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    FilmCurve,
    BaseCorrection,
    DensityLevels,
    Inversion,
    Lut3d,
    WhiteBalance,
    Exposure,
    Contrast,
    WhitesBlacks,
    ShadowsHighlights,
    HighlightRolloff,
    ToneCurve,
    Hsl,
    Saturation,
    SplitTone,
}

impl Stage {
    /// Every stage in the order all backends execute them.
    pub const ALL: [Stage; 15] = [
        Stage::FilmCurve,
        Stage::BaseCorrection,
        Stage::DensityLevels,
        Stage::Inversion,
        Stage::Lut3d,
        Stage::WhiteBalance,
        Stage::Exposure,
        Stage::Contrast,
        Stage::WhitesBlacks,
        Stage::ShadowsHighlights,
        Stage::HighlightRolloff,
        Stage::ToneCurve,
        Stage::Hsl,
        Stage::Saturation,
        Stage::SplitTone,
    ];

    /// 1-based position in [`Stage::ALL`].
    pub fn number(self) -> usize {
        Self::ALL
            .iter()
            .position(|s| *s == self)
            .map_or(0, |i| i + 1)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::FilmCurve => "film_curve",
            Self::BaseCorrection => "base_correction",
            Self::DensityLevels => "density_levels",
            Self::Inversion => "inversion",
            Self::Lut3d => "lut3d",
            Self::WhiteBalance => "white_balance",
            Self::Exposure => "exposure",
            Self::Contrast => "contrast",
            Self::WhitesBlacks => "whites_blacks",
            Self::ShadowsHighlights => "shadows_highlights",
            Self::HighlightRolloff => "highlight_rolloff",
            Self::ToneCurve => "tone_curve",
            Self::Hsl => "hsl",
            Self::Saturation => "saturation",
            Self::SplitTone => "split_tone",
        }
    }

    /// Name of the uniform gate that enables this stage.
    pub fn gate(self) -> &'static str {
        match self {
            Self::FilmCurve => "film_curve_enabled",
            Self::BaseCorrection => "base_enabled",
            Self::DensityLevels => "levels_enabled",
            Self::Inversion => "inversion_enabled",
            Self::Lut3d => "lut_enabled",
            Self::WhiteBalance => "wb_enabled",
            Self::Exposure => "exposure_enabled",
            Self::Contrast => "contrast_enabled",
            Self::WhitesBlacks => "white_black_enabled",
            Self::ShadowsHighlights => "shadows_highlights_enabled",
            Self::HighlightRolloff => "rolloff_enabled",
            Self::ToneCurve => "tone_curve_enabled",
            Self::Hsl => "hsl_enabled",
            Self::Saturation => "saturation_enabled",
            Self::SplitTone => "split_enabled",
        }
    }

    pub fn is_enabled(self, u: &UniformSet) -> bool {
        let gate = match self {
            Self::FilmCurve => u.film_curve_enabled,
            Self::BaseCorrection => u.base_enabled,
            Self::DensityLevels => u.levels_enabled,
            Self::Inversion => u.inversion_enabled,
            Self::Lut3d => u.lut_enabled,
            Self::WhiteBalance => u.wb_enabled,
            Self::Exposure => u.exposure_enabled,
            Self::Contrast => u.contrast_enabled,
            Self::WhitesBlacks => u.white_black_enabled,
            Self::ShadowsHighlights => u.shadows_highlights_enabled,
            Self::HighlightRolloff => u.rolloff_enabled,
            Self::ToneCurve => u.tone_curve_enabled,
            Self::Hsl => u.hsl_enabled,
            Self::Saturation => u.saturation_enabled,
            Self::SplitTone => u.split_enabled,
        };
        gate.get()
    }

    /// WGSL function name, e.g. `stage_05_lut3d`.
    pub fn function_name(self) -> String {
        format!("stage_{:02}_{}", self.number(), self.name())
    }

    /// Source marker preceding the stage function in generated WGSL.
    pub fn marker(self) -> String {
        format!("// @stage {:02} {}", self.number(), self.name())
    }
}

/// Transmittance → optical density, `-log10(t)`.
#[inline]
pub fn density(t: f32) -> f32 {
    -t.log2() * LOG10_2
}

/// Optical density → transmittance, `10^-d`.
#[inline]
pub fn transmittance(d: f32) -> f32 {
    (-d * LOG2_10).exp2()
}

#[inline]
pub fn luma(c: Vec3) -> f32 {
    c.dot(LUMA)
}

#[inline]
pub fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    let t = ((x - e0) / (e1 - e0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[inline]
pub fn clamp01(c: Vec3) -> Vec3 {
    c.clamp(Vec3::ZERO, Vec3::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lut_sits_between_inversion_and_white_balance() {
        let lut = Stage::Lut3d.number();
        assert_eq!(Stage::Inversion.number() + 1, lut);
        assert_eq!(Stage::WhiteBalance.number(), lut + 1);
    }

    #[test]
    fn test_numbers_follow_all() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.number(), i + 1);
        }
        assert_eq!(Stage::SplitTone.function_name(), "stage_15_split_tone");
        assert_eq!(Stage::FilmCurve.marker(), "// @stage 01 film_curve");
    }

    #[test]
    fn test_gate_names_are_uniform_fields() {
        let fields = UniformSet::default().fields();
        for stage in Stage::ALL {
            assert!(
                fields.iter().any(|f| f.name == stage.gate()),
                "{} has no uniform",
                stage.gate()
            );
        }
    }

    #[test]
    fn test_density_round_trip() {
        for t in [0.001_f32, 0.1, 0.5, 1.0] {
            assert!((transmittance(density(t)) - t).abs() < 1e-6 * t.max(1.0));
        }
        assert!((density(0.1) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_smoothstep_midpoint() {
        assert_eq!(smoothstep(0.0, 0.5, 0.25), 0.5);
        assert_eq!(smoothstep(0.0, 1.0, -3.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 3.0), 1.0);
    }
}
