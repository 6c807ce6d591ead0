//! Parameter → uniform mapping.
//!
//! [`UniformSet::from_params`] turns user-facing slider values into the
//! exact numbers every backend consumes: gates, gains, factors and
//! normalized hues. The CPU engine reads this struct directly and both
//! shader dialects derive their uniform declarations and byte packing from
//! [`UniformSet::fields`], so there is one place where a control is added.

use crate::curves::CurveSet;
use crate::params::{BaseMode, GradingParameters, HSL_BAND_COUNT, InversionMode};

/// A boolean gate carried as `0.0` / `1.0` and tested with `> 0.5`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoolUniform(f32);

impl BoolUniform {
    pub const OFF: Self = Self(0.0);
    pub const ON: Self = Self(1.0);

    pub fn new(on: bool) -> Self {
        if on { Self::ON } else { Self::OFF }
    }

    /// Same test the shaders apply.
    #[inline]
    pub fn get(self) -> bool {
        self.0 > 0.5
    }

    pub fn as_f32(self) -> f32 {
        self.0
    }
}

impl From<bool> for BoolUniform {
    fn from(on: bool) -> Self {
        Self::new(on)
    }
}

/// One uniform value as the shaders see it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Gate(BoolUniform),
    Scalar(f32),
    Vec3([f32; 3]),
}

impl UniformValue {
    /// Number of `f32` components.
    pub fn components(&self) -> usize {
        match self {
            Self::Gate(_) | Self::Scalar(_) => 1,
            Self::Vec3(_) => 3,
        }
    }
}

/// A named uniform member.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformField {
    pub name: &'static str,
    pub value: UniformValue,
}

/// Uniform names of the eight HSL bands, red first.
pub const HSL_BAND_FIELDS: [&str; HSL_BAND_COUNT] = [
    "hsl_red",
    "hsl_orange",
    "hsl_yellow",
    "hsl_green",
    "hsl_aqua",
    "hsl_blue",
    "hsl_purple",
    "hsl_magenta",
];

/// Every derived control value, one member per uniform.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformSet {
    // Film curve
    pub film_curve_enabled: BoolUniform,
    pub film_gamma: [f32; 3],
    pub film_dmin: f32,
    pub film_drange: f32,
    pub film_toe: f32,
    pub film_shoulder: f32,

    // Base correction
    pub base_enabled: BoolUniform,
    pub base_density_mode: BoolUniform,
    pub base_gains: [f32; 3],
    pub base_densities: [f32; 3],

    // Density levels
    pub levels_enabled: BoolUniform,
    pub levels_min: [f32; 3],
    pub levels_range: [f32; 3],
    pub levels_output_range: f32,

    // Inversion
    pub inversion_enabled: BoolUniform,
    pub inversion_log: BoolUniform,

    // 3-D LUT
    pub lut_enabled: BoolUniform,
    pub lut_size: f32,
    pub lut_intensity: f32,

    // Tone group
    pub wb_enabled: BoolUniform,
    pub wb_gains: [f32; 3],
    pub exposure_enabled: BoolUniform,
    pub exposure_gain: f32,
    pub contrast_enabled: BoolUniform,
    pub contrast_factor: f32,
    pub white_black_enabled: BoolUniform,
    pub black_point: f32,
    pub white_point: f32,
    pub shadows_highlights_enabled: BoolUniform,
    pub shadow_factor: f32,
    pub highlight_factor: f32,
    pub rolloff_enabled: BoolUniform,

    // Color group
    pub tone_curve_enabled: BoolUniform,
    pub hsl_enabled: BoolUniform,
    /// `[hue degrees, saturation scale, luminance offset]` per band.
    pub hsl_bands: [[f32; 3]; HSL_BAND_COUNT],
    pub saturation_enabled: BoolUniform,
    pub saturation: f32,

    // Split toning
    pub split_enabled: BoolUniform,
    pub split_highlight_hue: f32,
    pub split_highlight_sat: f32,
    pub split_midtone_hue: f32,
    pub split_midtone_sat: f32,
    pub split_shadow_hue: f32,
    pub split_shadow_sat: f32,
    pub split_balance: f32,
}

impl UniformSet {
    /// Derive uniforms, baking the tone curves only to decide their gate.
    pub fn from_params(params: &GradingParameters) -> Self {
        let curves = CurveSet::from_tone_curve(&params.tone_curve);
        Self::from_params_with_curves(params, &curves)
    }

    /// Derive uniforms using an already-baked curve set.
    pub fn from_params_with_curves(params: &GradingParameters, curves: &CurveSet) -> Self {
        let film = &params.film_curve;
        let film_gamma = [0, 1, 2].map(|c| film.gamma * film.gamma_rgb[c]);

        let base = &params.base;
        let base_enabled = match base.mode {
            BaseMode::LinearGain => base.gains != [1.0; 3],
            BaseMode::DensitySubtract => base.densities != [0.0; 3],
        };

        let levels = &params.levels;
        let levels_range = [0, 1, 2].map(|c| levels.max[c] - levels.min[c]);
        let levels_output_range =
            ((levels_range[0] + levels_range[1] + levels_range[2]) / 3.0).clamp(0.5, 2.5);

        let lut_size = params.lut3d.grid.as_ref().map_or(0.0, |g| g.size as f32);
        let lut_enabled = params.lut3d.present() && params.lut3d.intensity > 0.0;

        let wb = &params.white_balance;
        let temp = wb.temperature / 200.0;
        let tint = wb.tint / 200.0;
        let wb_gains = [
            (wb.gains[0] + temp + tint).max(0.0),
            (wb.gains[1] + temp - tint).max(0.0),
            (wb.gains[2] - temp).max(0.0),
        ];
        let wb_enabled = wb_gains != [1.0; 3];

        let tone = &params.tone;
        let exposure_enabled = tone.exposure != 0.0;
        let contrast_enabled = tone.contrast != 0.0;
        let white_black_enabled = tone.whites != 0.0 || tone.blacks != 0.0;
        let shadows_highlights_enabled = tone.shadows != 0.0 || tone.highlights != 0.0;
        let c = tone.contrast * 2.55;
        let contrast_factor = 259.0 * (c + 255.0) / (255.0 * (259.0 - c));

        let hsl_raw = params.hsl.bands();
        let hsl_bands = hsl_raw.map(|[h, s, l]| [h * 0.3, s / 100.0, l / 100.0]);
        let hsl_enabled = hsl_raw.iter().flatten().any(|v| *v != 0.0);

        let split = &params.split_tone;
        let split_enabled = split.highlight_saturation > 0.0
            || split.midtone_saturation > 0.0
            || split.shadow_saturation > 0.0;

        Self {
            film_curve_enabled: (params.inversion.enabled && film.enabled).into(),
            film_gamma,
            film_dmin: film.d_min,
            film_drange: (film.d_max - film.d_min).max(1e-4),
            film_toe: film.toe,
            film_shoulder: film.shoulder,

            base_enabled: base_enabled.into(),
            base_density_mode: (base.mode == BaseMode::DensitySubtract).into(),
            base_gains: base.gains,
            base_densities: base.densities,

            levels_enabled: levels.enabled.into(),
            levels_min: levels.min,
            levels_range,
            levels_output_range,

            inversion_enabled: params.inversion.enabled.into(),
            inversion_log: (params.inversion.mode == InversionMode::Log).into(),

            lut_enabled: lut_enabled.into(),
            lut_size,
            lut_intensity: params.lut3d.intensity,

            wb_enabled: wb_enabled.into(),
            wb_gains,
            exposure_enabled: exposure_enabled.into(),
            exposure_gain: (tone.exposure / 50.0).exp2(),
            contrast_enabled: contrast_enabled.into(),
            contrast_factor,
            white_black_enabled: white_black_enabled.into(),
            black_point: -tone.blacks * 0.002,
            white_point: 1.0 - tone.whites * 0.002,
            shadows_highlights_enabled: shadows_highlights_enabled.into(),
            shadow_factor: tone.shadows * 0.005,
            highlight_factor: tone.highlights * 0.005,
            rolloff_enabled: (wb_enabled
                || exposure_enabled
                || contrast_enabled
                || white_black_enabled
                || shadows_highlights_enabled)
                .into(),

            tone_curve_enabled: curves.is_active().into(),
            hsl_enabled: hsl_enabled.into(),
            hsl_bands,
            saturation_enabled: (params.saturation.global != 0.0).into(),
            saturation: params.saturation.global / 100.0,

            split_enabled: split_enabled.into(),
            split_highlight_hue: split.highlight_hue / 360.0,
            split_highlight_sat: split.highlight_saturation / 100.0,
            split_midtone_hue: split.midtone_hue / 360.0,
            split_midtone_sat: split.midtone_saturation / 100.0,
            split_shadow_hue: split.shadow_hue / 360.0,
            split_shadow_sat: split.shadow_saturation / 100.0,
            split_balance: split.balance / 100.0,
        }
    }

    /// Every member in declaration order.
    ///
    /// The destructuring below has no `..`, so adding a member without
    /// listing it here fails to compile.
    pub fn fields(&self) -> Vec<UniformField> {
        let Self {
            film_curve_enabled,
            film_gamma,
            film_dmin,
            film_drange,
            film_toe,
            film_shoulder,
            base_enabled,
            base_density_mode,
            base_gains,
            base_densities,
            levels_enabled,
            levels_min,
            levels_range,
            levels_output_range,
            inversion_enabled,
            inversion_log,
            lut_enabled,
            lut_size,
            lut_intensity,
            wb_enabled,
            wb_gains,
            exposure_enabled,
            exposure_gain,
            contrast_enabled,
            contrast_factor,
            white_black_enabled,
            black_point,
            white_point,
            shadows_highlights_enabled,
            shadow_factor,
            highlight_factor,
            rolloff_enabled,
            tone_curve_enabled,
            hsl_enabled,
            hsl_bands,
            saturation_enabled,
            saturation,
            split_enabled,
            split_highlight_hue,
            split_highlight_sat,
            split_midtone_hue,
            split_midtone_sat,
            split_shadow_hue,
            split_shadow_sat,
            split_balance,
        } = *self;

        use UniformValue::{Gate, Scalar, Vec3};
        let mut fields = vec![
            field("film_curve_enabled", Gate(film_curve_enabled)),
            field("film_gamma", Vec3(film_gamma)),
            field("film_dmin", Scalar(film_dmin)),
            field("film_drange", Scalar(film_drange)),
            field("film_toe", Scalar(film_toe)),
            field("film_shoulder", Scalar(film_shoulder)),
            field("base_enabled", Gate(base_enabled)),
            field("base_density_mode", Gate(base_density_mode)),
            field("base_gains", Vec3(base_gains)),
            field("base_densities", Vec3(base_densities)),
            field("levels_enabled", Gate(levels_enabled)),
            field("levels_min", Vec3(levels_min)),
            field("levels_range", Vec3(levels_range)),
            field("levels_output_range", Scalar(levels_output_range)),
            field("inversion_enabled", Gate(inversion_enabled)),
            field("inversion_log", Gate(inversion_log)),
            field("lut_enabled", Gate(lut_enabled)),
            field("lut_size", Scalar(lut_size)),
            field("lut_intensity", Scalar(lut_intensity)),
            field("wb_enabled", Gate(wb_enabled)),
            field("wb_gains", Vec3(wb_gains)),
            field("exposure_enabled", Gate(exposure_enabled)),
            field("exposure_gain", Scalar(exposure_gain)),
            field("contrast_enabled", Gate(contrast_enabled)),
            field("contrast_factor", Scalar(contrast_factor)),
            field("white_black_enabled", Gate(white_black_enabled)),
            field("black_point", Scalar(black_point)),
            field("white_point", Scalar(white_point)),
            field("shadows_highlights_enabled", Gate(shadows_highlights_enabled)),
            field("shadow_factor", Scalar(shadow_factor)),
            field("highlight_factor", Scalar(highlight_factor)),
            field("rolloff_enabled", Gate(rolloff_enabled)),
            field("tone_curve_enabled", Gate(tone_curve_enabled)),
            field("hsl_enabled", Gate(hsl_enabled)),
        ];
        fields.extend(
            HSL_BAND_FIELDS
                .iter()
                .zip(hsl_bands)
                .map(|(name, band)| field(*name, Vec3(band))),
        );
        fields.extend([
            field("saturation_enabled", Gate(saturation_enabled)),
            field("saturation", Scalar(saturation)),
            field("split_enabled", Gate(split_enabled)),
            field("split_highlight_hue", Scalar(split_highlight_hue)),
            field("split_highlight_sat", Scalar(split_highlight_sat)),
            field("split_midtone_hue", Scalar(split_midtone_hue)),
            field("split_midtone_sat", Scalar(split_midtone_sat)),
            field("split_shadow_hue", Scalar(split_shadow_hue)),
            field("split_shadow_sat", Scalar(split_shadow_sat)),
            field("split_balance", Scalar(split_balance)),
        ]);
        fields
    }
}

impl Default for UniformSet {
    fn default() -> Self {
        Self::from_params(&GradingParameters::default())
    }
}

fn field(name: &'static str, value: UniformValue) -> UniformField {
    UniformField { name, value }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    fn gates(set: &UniformSet) -> Vec<(&'static str, bool)> {
        set.fields()
            .into_iter()
            .filter_map(|f| match f.value {
                UniformValue::Gate(g) => Some((f.name, g.get())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_bool_uniform_threshold() {
        assert!(BoolUniform::ON.get());
        assert!(!BoolUniform::OFF.get());
        assert_eq!(BoolUniform::from(true).as_f32(), 1.0);
    }

    #[test]
    fn test_defaults_disable_every_gate() {
        let set = UniformSet::from_params(&GradingParameters::default());
        for (name, on) in gates(&set) {
            assert!(!on, "{name} should be off for default parameters");
        }
    }

    #[test]
    fn test_field_names_unique() {
        let fields = UniformSet::default().fields();
        let mut names: Vec<_> = fields.iter().map(|f| f.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), fields.len());
    }

    #[test]
    fn test_film_curve_requires_inversion() {
        let mut params = GradingParameters::default();
        params.film_curve.enabled = true;
        assert!(!UniformSet::from_params(&params).film_curve_enabled.get());
        params.inversion.enabled = true;
        assert!(UniformSet::from_params(&params).film_curve_enabled.get());
    }

    #[test]
    fn test_white_balance_gain_formula() {
        let mut params = GradingParameters::default();
        params.white_balance.temperature = 40.0;
        params.white_balance.tint = -20.0;
        let set = UniformSet::from_params(&params);
        assert!((set.wb_gains[0] - 1.1).abs() < EPSILON);
        assert!((set.wb_gains[1] - 1.3).abs() < EPSILON);
        assert!((set.wb_gains[2] - 0.8).abs() < EPSILON);
        assert!(set.wb_enabled.get());
        assert!(set.rolloff_enabled.get());
    }

    #[test]
    fn test_tone_factors() {
        let mut params = GradingParameters::default();
        params.tone.exposure = 50.0;
        params.tone.contrast = 50.0;
        params.tone.blacks = 10.0;
        params.tone.whites = 10.0;
        let set = UniformSet::from_params(&params);
        assert!((set.exposure_gain - 2.0).abs() < EPSILON);
        let c = 127.5_f32;
        let expected = 259.0 * (c + 255.0) / (255.0 * (259.0 - c));
        assert!((set.contrast_factor - expected).abs() < 1e-5);
        assert!((set.black_point + 0.02).abs() < EPSILON);
        assert!((set.white_point - 0.98).abs() < EPSILON);
    }

    #[test]
    fn test_levels_output_range_is_clamped_mean() {
        let mut params = GradingParameters::default();
        params.levels.min = [0.2, 0.3, 0.4];
        params.levels.max = [0.4, 0.5, 0.6];
        let set = UniformSet::from_params(&params);
        assert!((set.levels_output_range - 0.5).abs() < EPSILON);

        params.levels.min = [0.0; 3];
        params.levels.max = [1.2, 1.5, 1.8];
        let set = UniformSet::from_params(&params);
        assert!((set.levels_output_range - 1.5).abs() < EPSILON);
    }

    #[test]
    fn test_split_and_hsl_normalization() {
        let mut params = GradingParameters::default();
        params.split_tone.shadow_hue = 180.0;
        params.split_tone.shadow_saturation = 50.0;
        params.split_tone.balance = -40.0;
        params.hsl.blue = [100.0, -50.0, 20.0];
        let set = UniformSet::from_params(&params);
        assert!(set.split_enabled.get());
        assert!((set.split_shadow_hue - 0.5).abs() < EPSILON);
        assert!((set.split_shadow_sat - 0.5).abs() < EPSILON);
        assert!((set.split_balance + 0.4).abs() < EPSILON);
        assert!(set.hsl_enabled.get());
        assert_eq!(set.hsl_bands[5], [30.0, -0.5, 0.2]);
    }

    #[test]
    fn test_neutral_base_gate_depends_on_mode() {
        let mut params = GradingParameters::default();
        params.base.densities = [0.1, 0.2, 0.3];
        assert!(!UniformSet::from_params(&params).base_enabled.get());
        params.base.mode = BaseMode::DensitySubtract;
        let set = UniformSet::from_params(&params);
        assert!(set.base_enabled.get());
        assert!(set.base_density_mode.get());
    }
}
