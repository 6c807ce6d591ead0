//! Per-backend render session owning the derived caches.
//!
//! Baked curves and LUT encodings are rebuilt only when their source
//! parameters change. Curves are keyed by the control points themselves;
//! the LUT grid by `Arc` identity, so re-sending the same grid costs
//! nothing while a new grid always rebuilds.

use std::sync::Arc;

use crate::curves::CurveSet;
use crate::engine::ReferenceTextures;
use crate::lut::{Lut3D, NativeLut3d, PackedLut2d};
use crate::params::{GradingParameters, ToneCurve};
use crate::uniforms::UniformSet;

#[derive(Debug, Default)]
pub struct RenderSession {
    curve_key: Option<ToneCurve>,
    curves: CurveSet,
    curve_generation: u64,

    lut: Option<Arc<Lut3D>>,
    packed: Option<PackedLut2d>,
    native: Option<NativeLut3d>,
    lut_generation: u64,
}

impl RenderSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the caches up to date and derive the uniform set.
    pub fn sync(&mut self, params: &GradingParameters) -> UniformSet {
        self.sync_curves(&params.tone_curve);
        self.sync_lut(params.lut3d.grid.as_ref());
        UniformSet::from_params_with_curves(params, &self.curves)
    }

    fn sync_curves(&mut self, tone_curve: &ToneCurve) {
        if self.curve_key.as_ref() == Some(tone_curve) {
            return;
        }
        self.curves = CurveSet::from_tone_curve(tone_curve);
        self.curve_key = Some(tone_curve.clone());
        self.curve_generation += 1;
        tracing::debug!(generation = self.curve_generation, "rebuilt tone curves");
    }

    fn sync_lut(&mut self, grid: Option<&Arc<Lut3D>>) {
        let unchanged = match (&self.lut, grid) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        if unchanged {
            return;
        }
        self.lut = grid.cloned();
        self.packed = None;
        self.native = None;
        self.lut_generation += 1;
        tracing::debug!(
            generation = self.lut_generation,
            size = self.lut.as_ref().map(|l| l.size),
            "3D LUT changed"
        );
    }

    pub fn curves(&self) -> &CurveSet {
        &self.curves
    }

    pub fn lut(&self) -> Option<&Lut3D> {
        self.lut.as_deref()
    }

    /// Gen1 encoding of the current grid, built on first use.
    pub fn packed_lut(&mut self) -> Option<&PackedLut2d> {
        if self.packed.is_none() {
            self.packed = self.lut.as_ref().map(|lut| lut.packed_2d());
        }
        self.packed.as_ref()
    }

    /// Gen2 encoding of the current grid, built on first use.
    pub fn native_lut(&mut self) -> Option<&NativeLut3d> {
        if self.native.is_none() {
            self.native = self.lut.as_ref().map(|lut| lut.native_3d());
        }
        self.native.as_ref()
    }

    /// Bumped every time the curves are rebaked.
    pub fn curve_generation(&self) -> u64 {
        self.curve_generation
    }

    /// Bumped every time the LUT grid changes.
    pub fn lut_generation(&self) -> u64 {
        self.lut_generation
    }

    pub fn reference_textures(&self) -> ReferenceTextures<'_> {
        ReferenceTextures {
            curves: &self.curves,
            lut: self.lut(),
        }
    }
}
