//! Backend selection and the render entry point.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::image::PixelBuffer;
use crate::params::GradingParameters;

/// The three execution backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// Per-pixel floating-point loop.
    #[default]
    #[serde(rename = "cpu")]
    Cpu,
    /// Scalar uniforms, packed 2-D LUT, four curve textures.
    #[serde(rename = "gen1")]
    Gen1Shader,
    /// Packed `vec4` uniforms, native 3-D LUT, one curve texture.
    #[serde(rename = "gen2")]
    Gen2Shader,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [Self::Cpu, Self::Gen1Shader, Self::Gen2Shader];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gen1Shader => "gen1",
            Self::Gen2Shader => "gen2",
        }
    }

    pub fn is_shader(self) -> bool {
        !matches!(self, Self::Cpu)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "gen1" | "gen1shader" | "gen1-shader" => Ok(Self::Gen1Shader),
            "gen2" | "gen2shader" | "gen2-shader" => Ok(Self::Gen2Shader),
            other => Err(format!("unknown backend '{other}' (expected cpu, gen1 or gen2)")),
        }
    }
}

/// Something that can run the full pipeline over a buffer.
///
/// Implementations own their caches and device resources, hence `&mut`.
/// Parameters are assumed valid; see [`render_checked`].
pub trait RenderBackend {
    fn kind(&self) -> BackendKind;

    /// Render `source`, returning a buffer with the same size and depth,
    /// quantized to that depth.
    fn render(
        &mut self,
        params: &GradingParameters,
        source: &PixelBuffer,
    ) -> Result<PixelBuffer, RenderError>;
}

/// Render through a caller-chosen backend.
pub fn render(
    buffer: &PixelBuffer,
    params: &GradingParameters,
    backend: &mut dyn RenderBackend,
) -> Result<PixelBuffer, RenderError> {
    backend.render(params, buffer)
}

/// Validate the parameters first, then render.
pub fn render_checked(
    buffer: &PixelBuffer,
    params: &GradingParameters,
    backend: &mut dyn RenderBackend,
) -> Result<PixelBuffer, RenderError> {
    params.validate()?;
    render(buffer, params, backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_names() {
        assert_eq!("CPU".parse::<BackendKind>(), Ok(BackendKind::Cpu));
        assert_eq!("gen2".parse::<BackendKind>(), Ok(BackendKind::Gen2Shader));
        assert!("metal".parse::<BackendKind>().is_err());
        for kind in BackendKind::ALL {
            assert_eq!(kind.to_string().parse::<BackendKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_serde_names_match_display() {
        let json = serde_json::to_string(&BackendKind::Gen1Shader).expect("serializes");
        assert_eq!(json, "\"gen1\"");
    }
}
