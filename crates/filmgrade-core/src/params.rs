//! Central parameter struct that defines the entire film rendering transform.
//!
//! `GradingParameters` is the single source of truth for every grading
//! control. It serializes to a flat JSON object with stable camelCase field
//! names; absent fields take the identity value of their stage.
//!
//! Validation is the caller's job: [`GradingParameters::validate`] rejects
//! out-of-range or malformed fields. The pipeline itself never clamps inputs
//! as a substitute for validation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::lut::Lut3D;

/// Inversion transfer used to turn a negative into a positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InversionMode {
    /// `1 - v`.
    #[default]
    Linear,
    /// `1 - ln(255v + 1) / ln(256)`. Keeps more shadow separation.
    Log,
}

/// How the film base mask is neutralized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseMode {
    /// Multiply RGB by fixed gains.
    #[default]
    LinearGain,
    /// Subtract a density triple in the density domain.
    DensitySubtract,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Inversion {
    #[serde(rename = "inversionEnabled")]
    pub enabled: bool,
    #[serde(rename = "inversionMode")]
    pub mode: InversionMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseCorrection {
    #[serde(rename = "baseMode")]
    pub mode: BaseMode,
    /// Per-channel multipliers for [`BaseMode::LinearGain`].
    #[serde(rename = "baseGains")]
    pub gains: [f32; 3],
    /// Per-channel base densities for [`BaseMode::DensitySubtract`].
    #[serde(rename = "baseDensities")]
    pub densities: [f32; 3],
}

impl Default for BaseCorrection {
    fn default() -> Self {
        Self {
            mode: BaseMode::LinearGain,
            gains: [1.0; 3],
            densities: [0.0; 3],
        }
    }
}

/// Per-channel auto-levels in the density domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityLevels {
    #[serde(rename = "levelsEnabled")]
    pub enabled: bool,
    #[serde(rename = "levelsMin")]
    pub min: [f32; 3],
    #[serde(rename = "levelsMax")]
    pub max: [f32; 3],
}

impl Default for DensityLevels {
    fn default() -> Self {
        Self {
            enabled: false,
            min: [0.0; 3],
            max: [3.0; 3],
        }
    }
}

/// H&D characteristic curve applied to the negative before inversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilmCurve {
    #[serde(rename = "filmCurveEnabled")]
    pub enabled: bool,
    #[serde(rename = "filmGamma")]
    pub gamma: f32,
    #[serde(rename = "filmGammaRgb")]
    pub gamma_rgb: [f32; 3],
    #[serde(rename = "filmDMin")]
    pub d_min: f32,
    #[serde(rename = "filmDMax")]
    pub d_max: f32,
    #[serde(rename = "filmToe")]
    pub toe: f32,
    #[serde(rename = "filmShoulder")]
    pub shoulder: f32,
}

impl Default for FilmCurve {
    fn default() -> Self {
        Self {
            enabled: false,
            gamma: 1.0,
            gamma_rgb: [1.0; 3],
            d_min: 0.0,
            d_max: 3.0,
            toe: 0.0,
            shoulder: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhiteBalance {
    /// Warm/cool shift, `[-100, 100]`.
    pub temperature: f32,
    /// Green/magenta shift, `[-100, 100]`.
    pub tint: f32,
    #[serde(rename = "wbGains")]
    pub gains: [f32; 3],
}

impl Default for WhiteBalance {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            tint: 0.0,
            gains: [1.0; 3],
        }
    }
}

/// Slider-style tone controls, each in `[-100, 100]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tone {
    pub exposure: f32,
    pub contrast: f32,
    pub highlights: f32,
    pub shadows: f32,
    pub whites: f32,
    pub blacks: f32,
}

/// Control points in `[0, 255]` for the composite and per-channel curves.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneCurve {
    #[serde(rename = "curveRgb")]
    pub rgb: Vec<[f32; 2]>,
    #[serde(rename = "curveRed")]
    pub red: Vec<[f32; 2]>,
    #[serde(rename = "curveGreen")]
    pub green: Vec<[f32; 2]>,
    #[serde(rename = "curveBlue")]
    pub blue: Vec<[f32; 2]>,
}

impl ToneCurve {
    /// Curves in master, red, green, blue order.
    pub fn channels(&self) -> [&[[f32; 2]]; 4] {
        [&self.rgb, &self.red, &self.green, &self.blue]
    }
}

/// Attached 3-D LUT grid and blend amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Lut3dWire", into = "Lut3dWire")]
pub struct Lut3dParams {
    /// Decoded grid; `None` when no LUT is attached.
    pub grid: Option<Arc<Lut3D>>,
    /// Blend between pre-LUT and LUT color, `[0, 1]`.
    pub intensity: f32,
}

impl Lut3dParams {
    pub fn present(&self) -> bool {
        self.grid.is_some()
    }
}

impl Default for Lut3dParams {
    fn default() -> Self {
        Self {
            grid: None,
            intensity: 1.0,
        }
    }
}

/// Flat JSON shape of [`Lut3dParams`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct Lut3dWire {
    #[serde(rename = "lut3dSize", skip_serializing_if = "Option::is_none")]
    size: Option<u32>,
    #[serde(rename = "lut3dData", skip_serializing_if = "Option::is_none")]
    data: Option<Vec<f32>>,
    #[serde(rename = "lut3dIntensity")]
    intensity: f32,
}

impl Default for Lut3dWire {
    fn default() -> Self {
        Self {
            size: None,
            data: None,
            intensity: 1.0,
        }
    }
}

impl TryFrom<Lut3dWire> for Lut3dParams {
    type Error = String;

    fn try_from(wire: Lut3dWire) -> Result<Self, Self::Error> {
        let grid = match (wire.size, wire.data) {
            (None, None) => None,
            (Some(size), Some(data)) => Some(Arc::new(
                Lut3D::from_flat(size, &data).map_err(|e| format!("lut3dData: {e}"))?,
            )),
            (Some(_), None) => return Err("lut3dSize given without lut3dData".to_string()),
            (None, Some(_)) => return Err("lut3dData given without lut3dSize".to_string()),
        };
        Ok(Self {
            grid,
            intensity: wire.intensity,
        })
    }
}

impl From<Lut3dParams> for Lut3dWire {
    fn from(params: Lut3dParams) -> Self {
        Self {
            size: params.grid.as_ref().map(|g| g.size),
            data: params.grid.as_ref().map(|g| g.to_flat()),
            intensity: params.intensity,
        }
    }
}

/// Number of HSL hue bands.
pub const HSL_BAND_COUNT: usize = 8;

/// Per-band `[hue, saturation, luminance]` offsets, each `[-100, 100]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HslAdjustments {
    #[serde(rename = "hslRed")]
    pub red: [f32; 3],
    #[serde(rename = "hslOrange")]
    pub orange: [f32; 3],
    #[serde(rename = "hslYellow")]
    pub yellow: [f32; 3],
    #[serde(rename = "hslGreen")]
    pub green: [f32; 3],
    #[serde(rename = "hslAqua")]
    pub aqua: [f32; 3],
    #[serde(rename = "hslBlue")]
    pub blue: [f32; 3],
    #[serde(rename = "hslPurple")]
    pub purple: [f32; 3],
    #[serde(rename = "hslMagenta")]
    pub magenta: [f32; 3],
}

impl HslAdjustments {
    /// Band offsets in hue order (red first).
    pub fn bands(&self) -> [[f32; 3]; HSL_BAND_COUNT] {
        [
            self.red,
            self.orange,
            self.yellow,
            self.green,
            self.aqua,
            self.blue,
            self.purple,
            self.magenta,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Saturation {
    #[serde(rename = "saturation")]
    pub global: f32,
}

/// Independent tints for shadow, midtone and highlight zones.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitTone {
    #[serde(rename = "splitHighlightHue")]
    pub highlight_hue: f32,
    #[serde(rename = "splitHighlightSaturation")]
    pub highlight_saturation: f32,
    #[serde(rename = "splitMidtoneHue")]
    pub midtone_hue: f32,
    #[serde(rename = "splitMidtoneSaturation")]
    pub midtone_saturation: f32,
    #[serde(rename = "splitShadowHue")]
    pub shadow_hue: f32,
    #[serde(rename = "splitShadowSaturation")]
    pub shadow_saturation: f32,
    #[serde(rename = "splitBalance")]
    pub balance: f32,
}

/// Every grading control. Immutable for the duration of one render call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingParameters {
    #[serde(flatten)]
    pub inversion: Inversion,
    #[serde(flatten)]
    pub base: BaseCorrection,
    #[serde(flatten)]
    pub levels: DensityLevels,
    #[serde(flatten)]
    pub film_curve: FilmCurve,
    #[serde(flatten)]
    pub white_balance: WhiteBalance,
    #[serde(flatten)]
    pub tone: Tone,
    #[serde(flatten)]
    pub tone_curve: ToneCurve,
    #[serde(flatten)]
    pub lut3d: Lut3dParams,
    #[serde(flatten)]
    pub hsl: HslAdjustments,
    #[serde(flatten)]
    pub saturation: Saturation,
    #[serde(flatten)]
    pub split_tone: SplitTone,
}

/// Reasons a parameter set is rejected before rendering.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("{field} is not a finite number")]
    NotFinite { field: String },
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: f32,
        min: f32,
        max: f32,
    },
    #[error("{field}: {reason}")]
    Malformed { field: String, reason: String },
    #[error("invalid parameter JSON: {0}")]
    Json(String),
}

impl GradingParameters {
    /// Parse the flat JSON contract.
    pub fn from_json(json: &str) -> Result<Self, ParamError> {
        serde_json::from_str(json).map_err(|e| ParamError::Json(e.to_string()))
    }

    /// Serialize to the flat JSON contract.
    pub fn to_json(&self) -> String {
        // Every field is a plain number, bool, enum or array; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse and validate in one step.
    pub fn from_json_validated(json: &str) -> Result<Self, ParamError> {
        let params = Self::from_json(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Reject out-of-range, non-finite or inconsistent fields.
    pub fn validate(&self) -> Result<(), ParamError> {
        check_rgb("baseGains", &self.base.gains, 0.0, 8.0)?;
        check_rgb("baseDensities", &self.base.densities, -2.0, 4.0)?;

        check_rgb("levelsMin", &self.levels.min, 0.0, 5.0)?;
        check_rgb("levelsMax", &self.levels.max, 0.0, 5.0)?;
        for c in 0..3 {
            if self.levels.min[c] > self.levels.max[c] {
                return Err(ParamError::Malformed {
                    field: format!("levelsMax[{c}]"),
                    reason: "maximum density is below minimum density".to_string(),
                });
            }
        }

        let film = &self.film_curve;
        check_range("filmGamma", film.gamma, 0.1, 5.0)?;
        check_rgb("filmGammaRgb", &film.gamma_rgb, 0.1, 5.0)?;
        check_range("filmDMin", film.d_min, 0.0, 5.0)?;
        check_range("filmDMax", film.d_max, 0.0, 5.0)?;
        if film.d_max <= film.d_min {
            return Err(ParamError::Malformed {
                field: "filmDMax".to_string(),
                reason: "must be greater than filmDMin".to_string(),
            });
        }
        check_range("filmToe", film.toe, 0.0, 1.0)?;
        check_range("filmShoulder", film.shoulder, 0.0, 1.0)?;

        check_range("temperature", self.white_balance.temperature, -100.0, 100.0)?;
        check_range("tint", self.white_balance.tint, -100.0, 100.0)?;
        check_rgb("wbGains", &self.white_balance.gains, 0.0, 4.0)?;

        let tone = &self.tone;
        for (field, value) in [
            ("exposure", tone.exposure),
            ("contrast", tone.contrast),
            ("highlights", tone.highlights),
            ("shadows", tone.shadows),
            ("whites", tone.whites),
            ("blacks", tone.blacks),
        ] {
            check_range(field, value, -100.0, 100.0)?;
        }

        let curve_names = ["curveRgb", "curveRed", "curveGreen", "curveBlue"];
        for (name, points) in curve_names.iter().zip(self.tone_curve.channels()) {
            for (i, point) in points.iter().enumerate() {
                check_range(&format!("{name}[{i}].x"), point[0], 0.0, 255.0)?;
                check_range(&format!("{name}[{i}].y"), point[1], 0.0, 255.0)?;
            }
        }

        check_range("lut3dIntensity", self.lut3d.intensity, 0.0, 1.0)?;
        if let Some(grid) = &self.lut3d.grid {
            grid.validate().map_err(|e| ParamError::Malformed {
                field: "lut3dData".to_string(),
                reason: e.to_string(),
            })?;
        }

        let band_names = [
            "hslRed",
            "hslOrange",
            "hslYellow",
            "hslGreen",
            "hslAqua",
            "hslBlue",
            "hslPurple",
            "hslMagenta",
        ];
        for (name, band) in band_names.iter().zip(self.hsl.bands()) {
            check_rgb(name, &band, -100.0, 100.0)?;
        }

        check_range("saturation", self.saturation.global, -100.0, 100.0)?;

        let split = &self.split_tone;
        check_range("splitHighlightHue", split.highlight_hue, 0.0, 360.0)?;
        check_range("splitMidtoneHue", split.midtone_hue, 0.0, 360.0)?;
        check_range("splitShadowHue", split.shadow_hue, 0.0, 360.0)?;
        check_range("splitHighlightSaturation", split.highlight_saturation, 0.0, 100.0)?;
        check_range("splitMidtoneSaturation", split.midtone_saturation, 0.0, 100.0)?;
        check_range("splitShadowSaturation", split.shadow_saturation, 0.0, 100.0)?;
        check_range("splitBalance", split.balance, -100.0, 100.0)?;

        Ok(())
    }
}

fn check_range(field: &str, value: f32, min: f32, max: f32) -> Result<(), ParamError> {
    if !value.is_finite() {
        return Err(ParamError::NotFinite {
            field: field.to_string(),
        });
    }
    if value < min || value > max {
        return Err(ParamError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn check_rgb(field: &str, values: &[f32; 3], min: f32, max: f32) -> Result<(), ParamError> {
    for (c, value) in values.iter().enumerate() {
        check_range(&format!("{field}[{c}]"), *value, min, max)?;
    }
    Ok(())
}
