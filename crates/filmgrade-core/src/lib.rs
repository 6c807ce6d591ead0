//! Filmgrade Core - domain layer for film-scan color rendering.
//!
//! This crate contains the parameter model, curve and LUT builders, the
//! ordered stage engine, the CPU backend, WGSL generation for both shader
//! dialects and the parity harness. No GPU or framework dependencies.

pub mod backend;
pub mod batch;
pub mod config;
pub mod cpu;
pub mod curves;
pub mod engine;
pub mod error;
pub mod image;
pub mod lut;
pub mod lut_file;
pub mod lut_invert;
pub mod params;
pub mod parity;
pub mod session;
pub mod shader;
pub mod stages;
pub mod uniforms;

// Re-exports for convenience.
pub use backend::{BackendKind, RenderBackend, render};
pub use cpu::CpuBackend;
pub use error::RenderError;
pub use image::{BitDepth, PixelBuffer};
pub use lut::Lut3D;
pub use params::GradingParameters;
pub use session::RenderSession;
pub use shader::{ShaderDialect, ShaderProgram};
pub use stages::Stage;
pub use uniforms::{BoolUniform, UniformSet};
