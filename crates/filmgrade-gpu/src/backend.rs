//! GPU render backends and backend selection.

use filmgrade_core::backend::{BackendKind, RenderBackend};
use filmgrade_core::image::PixelBuffer;
use filmgrade_core::params::GradingParameters;
use filmgrade_core::shader::{ShaderDialect, gen1, gen2};
use filmgrade_core::{CpuBackend, RenderError, RenderSession};
use wgpu::util::DeviceExt;

use crate::buffers::{self, GpuTexture};
use crate::context::{GpuContext, GpuError};
use crate::pipeline::DialectPipeline;
use crate::readback;

/// LUT and curve textures in the dialect's encoding.
enum TableTextures {
    Gen1 {
        lut: GpuTexture,
        curves: [GpuTexture; 4],
    },
    Gen2 {
        lut: GpuTexture,
        sampler: wgpu::Sampler,
        curves: GpuTexture,
    },
}

/// Renders through one generated WGSL dialect on the GPU.
///
/// Owns its device, pipeline, uploaded tables and session caches. Tables
/// are re-uploaded only when the session reports a new curve or LUT
/// generation.
pub struct ShaderBackend {
    ctx: GpuContext,
    pipeline: DialectPipeline,
    session: RenderSession,
    tables: Option<TableTextures>,
    uploaded: (u64, u64),
}

impl std::fmt::Debug for ShaderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderBackend")
            .field("dialect", &self.pipeline.dialect())
            .field("ctx", &self.ctx)
            .finish()
    }
}

impl ShaderBackend {
    pub fn new(dialect: ShaderDialect) -> Result<Self, GpuError> {
        Self::with_context(GpuContext::new()?, dialect)
    }

    pub fn with_context(ctx: GpuContext, dialect: ShaderDialect) -> Result<Self, GpuError> {
        let pipeline = DialectPipeline::new(&ctx.device, dialect)?;
        Ok(Self {
            ctx,
            pipeline,
            session: RenderSession::new(),
            tables: None,
            uploaded: (0, 0),
        })
    }

    pub fn dialect(&self) -> ShaderDialect {
        self.pipeline.dialect()
    }

    /// Generated WGSL this backend runs.
    pub fn source(&self) -> &str {
        self.pipeline.program.source()
    }

    fn sync_tables(&mut self) -> Result<(), GpuError> {
        let current = (
            self.session.curve_generation(),
            self.session.lut_generation(),
        );
        if self.tables.is_some() && self.uploaded == current {
            return Ok(());
        }

        let device = &self.ctx.device;
        let queue = &self.ctx.queue;
        let placeholder = buffers::placeholder_lut();
        let tables = match self.pipeline.dialect() {
            ShaderDialect::Gen1 => {
                let lut = match self.session.packed_lut() {
                    Some(packed) => buffers::upload_packed_lut(device, queue, packed)?,
                    None => buffers::upload_packed_lut(device, queue, &placeholder.packed_2d())?,
                };
                TableTextures::Gen1 {
                    lut,
                    curves: buffers::upload_split_curves(device, queue, self.session.curves()),
                }
            }
            ShaderDialect::Gen2 => {
                let lut = match self.session.native_lut() {
                    Some(native) => buffers::upload_native_lut(device, queue, native)?,
                    None => buffers::upload_native_lut(device, queue, &placeholder.native_3d())?,
                };
                TableTextures::Gen2 {
                    lut,
                    sampler: buffers::lut_sampler(device),
                    curves: buffers::upload_interleaved_curves(device, queue, self.session.curves()),
                }
            }
        };
        tracing::debug!(
            dialect = %self.pipeline.dialect(),
            curve_generation = current.0,
            lut_generation = current.1,
            "uploaded lookup tables"
        );
        self.tables = Some(tables);
        self.uploaded = current;
        Ok(())
    }

    fn render_gpu(
        &mut self,
        params: &GradingParameters,
        source: &PixelBuffer,
    ) -> Result<PixelBuffer, GpuError> {
        let uniforms = self.session.sync(params);
        self.sync_tables()?;

        let device = &self.ctx.device;
        let queue = &self.ctx.queue;
        let packed = self.pipeline.program.pack_uniforms(&uniforms);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("filmgrade_params_uniform"),
            contents: bytemuck::cast_slice(&packed),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let src = buffers::upload_source(device, queue, source)?;
        let target = buffers::create_target(device, source.width, source.height)?;

        let Some(tables) = &self.tables else {
            return Err(GpuError::TablesMissing);
        };
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform_buffer.as_entire_binding(),
        }];
        match tables {
            TableTextures::Gen1 { lut, curves } => {
                entries.push(view_entry(gen1::SOURCE_BINDING, &src.view));
                entries.push(view_entry(gen1::LUT_BINDING, &lut.view));
                for ((binding, _), tex) in gen1::CURVE_BINDINGS.iter().zip(curves) {
                    entries.push(view_entry(*binding, &tex.view));
                }
            }
            TableTextures::Gen2 {
                lut,
                sampler,
                curves,
            } => {
                entries.push(view_entry(gen2::SOURCE_BINDING, &src.view));
                entries.push(view_entry(gen2::LUT_BINDING, &lut.view));
                entries.push(wgpu::BindGroupEntry {
                    binding: gen2::LUT_SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(sampler),
                });
                entries.push(view_entry(gen2::CURVE_BINDING, &curves.view));
            }
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("filmgrade_bind_group"),
            layout: &self.pipeline.bind_group_layout,
            entries: &entries,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("filmgrade_render_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("filmgrade_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        queue.submit(std::iter::once(encoder.finish()));

        let texels = readback::download_rgba32f(
            device,
            queue,
            &target.texture,
            source.width,
            source.height,
        )?;
        let pixels = texels.into_iter().map(|[r, g, b, _]| [r, g, b]).collect();
        Ok(PixelBuffer {
            width: source.width,
            height: source.height,
            pixels,
            depth: source.depth,
        }
        .quantized())
    }
}

fn view_entry(binding: u32, view: &wgpu::TextureView) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::TextureView(view),
    }
}

impl RenderBackend for ShaderBackend {
    fn kind(&self) -> BackendKind {
        match self.pipeline.dialect() {
            ShaderDialect::Gen1 => BackendKind::Gen1Shader,
            ShaderDialect::Gen2 => BackendKind::Gen2Shader,
        }
    }

    fn render(
        &mut self,
        params: &GradingParameters,
        source: &PixelBuffer,
    ) -> Result<PixelBuffer, RenderError> {
        if source.is_empty() {
            return Ok(source.clone());
        }
        Ok(self.render_gpu(params, source)?)
    }
}

/// Any of the three backends behind one type.
#[derive(Debug)]
pub enum Backend {
    Cpu(CpuBackend),
    Gen1Shader(ShaderBackend),
    Gen2Shader(ShaderBackend),
}

impl Backend {
    /// Create the requested backend. A shader backend that cannot get a
    /// device falls back to the CPU with a warning; other GPU failures are
    /// returned.
    pub fn create(kind: BackendKind) -> Result<Self, GpuError> {
        let dialect = match kind {
            BackendKind::Cpu => return Ok(Self::Cpu(CpuBackend::new())),
            BackendKind::Gen1Shader => ShaderDialect::Gen1,
            BackendKind::Gen2Shader => ShaderDialect::Gen2,
        };
        match ShaderBackend::new(dialect) {
            Ok(backend) => {
                tracing::info!(backend = %kind, "using shader backend");
                Ok(match dialect {
                    ShaderDialect::Gen1 => Self::Gen1Shader(backend),
                    ShaderDialect::Gen2 => Self::Gen2Shader(backend),
                })
            }
            Err(e) if e.is_unavailable() => {
                tracing::warn!(requested = %kind, error = %e, "GPU unavailable, falling back to CPU");
                Ok(Self::Cpu(CpuBackend::new()))
            }
            Err(e) => Err(e),
        }
    }

    fn inner(&mut self) -> &mut dyn RenderBackend {
        match self {
            Self::Cpu(b) => b,
            Self::Gen1Shader(b) | Self::Gen2Shader(b) => b,
        }
    }
}

impl RenderBackend for Backend {
    fn kind(&self) -> BackendKind {
        match self {
            Self::Cpu(_) => BackendKind::Cpu,
            Self::Gen1Shader(_) => BackendKind::Gen1Shader,
            Self::Gen2Shader(_) => BackendKind::Gen2Shader,
        }
    }

    fn render(
        &mut self,
        params: &GradingParameters,
        source: &PixelBuffer,
    ) -> Result<PixelBuffer, RenderError> {
        self.inner().render(params, source)
    }
}
