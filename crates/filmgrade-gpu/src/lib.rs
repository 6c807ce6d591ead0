//! wgpu render backends for the grading pipeline.
//!
//! Each backend generates its dialect's WGSL from `filmgrade-core`, draws a
//! single full-screen triangle into an `Rgba32Float` target and reads the
//! result back. No windowing or surface is involved.

pub mod backend;
pub mod buffers;
pub mod context;
pub mod pipeline;
pub mod readback;

pub use backend::{Backend, ShaderBackend};
pub use context::{GpuContext, GpuError, is_available};
pub use pipeline::DialectPipeline;
