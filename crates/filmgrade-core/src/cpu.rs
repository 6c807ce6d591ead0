//! CPU reference backend.

use crate::backend::{BackendKind, RenderBackend};
use crate::engine::{StageEngine, TextureAccess};
use crate::error::RenderError;
use crate::image::PixelBuffer;
use crate::params::GradingParameters;
use crate::session::RenderSession;
use crate::uniforms::UniformSet;

/// Evaluates the stage engine per pixel in full `f32`.
#[derive(Debug, Default)]
pub struct CpuBackend {
    session: RenderSession,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> &RenderSession {
        &self.session
    }
}

impl RenderBackend for CpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn render(
        &mut self,
        params: &GradingParameters,
        source: &PixelBuffer,
    ) -> Result<PixelBuffer, RenderError> {
        let uniforms = self.session.sync(params);
        let textures = self.session.reference_textures();
        Ok(evaluate_buffer(&uniforms, &textures, source))
    }
}

/// Run the engine over every pixel and quantize to the source depth.
pub fn evaluate_buffer<T: TextureAccess>(
    uniforms: &UniformSet,
    textures: &T,
    source: &PixelBuffer,
) -> PixelBuffer {
    let engine = StageEngine::new(uniforms, textures);
    let pixels = source.pixels.iter().map(|px| engine.evaluate(*px)).collect();
    PixelBuffer {
        width: source.width,
        height: source.height,
        pixels,
        depth: source.depth,
    }
    .quantized()
}
