//! Stage engine - applies the full ordered pipeline to a single pixel.
//!
//! The generated WGSL of both dialects mirrors this exactly: one function
//! per [`Stage`], gated by its uniform, called in [`Stage::ALL`] order.
//! Table lookups go through [`TextureAccess`] so the same code can read the
//! reference tables or an emulation of a dialect's texture encoding.

use glam::Vec3;

use crate::curves::{CurveSet, lerp_table};
use crate::lut::Lut3D;
use crate::stages::{Stage, color, film, tone};
use crate::uniforms::UniformSet;

/// Which of the four tone curves to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveChannel {
    Master,
    Red,
    Green,
    Blue,
}

/// Table reads the stages need: the 3-D LUT and the four curves.
pub trait TextureAccess {
    /// Trilinear LUT sample of an in-range color.
    fn sample_lut(&self, rgb: Vec3) -> Vec3;
    /// Interpolated curve lookup.
    fn curve(&self, channel: CurveChannel, v: f32) -> f32;
}

/// Full-precision tables straight from the session caches.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceTextures<'a> {
    pub curves: &'a CurveSet,
    pub lut: Option<&'a Lut3D>,
}

impl TextureAccess for ReferenceTextures<'_> {
    fn sample_lut(&self, rgb: Vec3) -> Vec3 {
        match self.lut {
            Some(lut) => Vec3::from(lut.sample(rgb.to_array())),
            None => rgb,
        }
    }

    fn curve(&self, channel: CurveChannel, v: f32) -> f32 {
        let table = match channel {
            CurveChannel::Master => self.curves.master.table(),
            CurveChannel::Red => self.curves.red.table(),
            CurveChannel::Green => self.curves.green.table(),
            CurveChannel::Blue => self.curves.blue.table(),
        };
        lerp_table(table, v)
    }
}

/// Per-pixel evaluator over one uniform set and one texture source.
pub struct StageEngine<'a, T: TextureAccess> {
    uniforms: &'a UniformSet,
    textures: &'a T,
    enabled: [bool; 15],
}

impl<'a, T: TextureAccess> StageEngine<'a, T> {
    pub fn new(uniforms: &'a UniformSet, textures: &'a T) -> Self {
        let enabled = Stage::ALL.map(|stage| stage.is_enabled(uniforms));
        Self {
            uniforms,
            textures,
            enabled,
        }
    }

    /// Stages that will run for this uniform set, in order.
    pub fn active_stages(&self) -> Vec<Stage> {
        Stage::ALL
            .iter()
            .zip(self.enabled)
            .filter_map(|(stage, on)| on.then_some(*stage))
            .collect()
    }

    /// Apply one stage if its gate is on; otherwise return `c` untouched.
    pub fn apply(&self, stage: Stage, c: Vec3) -> Vec3 {
        if !stage.is_enabled(self.uniforms) {
            return c;
        }
        self.run(stage, c)
    }

    fn run(&self, stage: Stage, c: Vec3) -> Vec3 {
        let u = self.uniforms;
        match stage {
            Stage::FilmCurve => film::film_curve(c, u),
            Stage::BaseCorrection => film::base_correction(c, u),
            Stage::DensityLevels => film::density_levels(c, u),
            Stage::Inversion => film::inversion(c, u),
            Stage::Lut3d => film::lut3d(c, u, self.textures),
            Stage::WhiteBalance => tone::white_balance(c, u),
            Stage::Exposure => tone::exposure(c, u),
            Stage::Contrast => tone::contrast(c, u),
            Stage::WhitesBlacks => tone::whites_blacks(c, u),
            Stage::ShadowsHighlights => tone::shadows_highlights(c, u),
            Stage::HighlightRolloff => tone::highlight_rolloff(c, u),
            Stage::ToneCurve => color::tone_curve(c, u, self.textures),
            Stage::Hsl => color::hsl(c, u),
            Stage::Saturation => color::saturation(c, u),
            Stage::SplitTone => color::split_tone(c, u),
        }
    }

    /// Run every enabled stage in order.
    #[inline]
    pub fn evaluate(&self, rgb: [f32; 3]) -> [f32; 3] {
        let mut c = Vec3::from(rgb);
        for (stage, on) in Stage::ALL.iter().zip(self.enabled) {
            if on {
                c = self.run(*stage, c);
            }
        }
        c.to_array()
    }

    /// Color after each stage, for inspecting where a render diverges.
    pub fn trace(&self, rgb: [f32; 3]) -> Vec<(Stage, [f32; 3])> {
        let mut c = Vec3::from(rgb);
        Stage::ALL
            .iter()
            .map(|stage| {
                c = self.apply(*stage, c);
                (*stage, c.to_array())
            })
            .collect()
    }
}
