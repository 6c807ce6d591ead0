//! Render pipeline for one shader dialect.

use std::num::NonZeroU64;

use filmgrade_core::shader::{ShaderDialect, ShaderProgram, gen1, gen2};

use crate::context::GpuError;

/// Compiled module, bind group layout and pipeline for a dialect.
pub struct DialectPipeline {
    pub program: ShaderProgram,
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

fn texture_entry(
    binding: u32,
    dimension: wgpu::TextureViewDimension,
    filterable: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32, size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(size),
        },
        count: None,
    }
}

/// Layout entries in binding order; must agree with the dialect prelude.
fn layout_entries(dialect: ShaderDialect, uniform_size: u64) -> Vec<wgpu::BindGroupLayoutEntry> {
    use wgpu::TextureViewDimension::{D2, D3};
    match dialect {
        ShaderDialect::Gen1 => {
            let mut entries = vec![
                uniform_entry(gen1::PARAMS_BINDING, uniform_size),
                texture_entry(gen1::SOURCE_BINDING, D2, false),
                texture_entry(gen1::LUT_BINDING, D2, false),
            ];
            entries.extend(
                gen1::CURVE_BINDINGS
                    .iter()
                    .map(|(binding, _)| texture_entry(*binding, D2, false)),
            );
            entries
        }
        ShaderDialect::Gen2 => vec![
            uniform_entry(gen2::PARAMS_BINDING, uniform_size),
            texture_entry(gen2::SOURCE_BINDING, D2, false),
            texture_entry(gen2::LUT_BINDING, D3, true),
            wgpu::BindGroupLayoutEntry {
                binding: gen2::LUT_SAMPLER_BINDING,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            texture_entry(gen2::CURVE_BINDING, D2, false),
        ],
    }
}

impl DialectPipeline {
    /// Generate the WGSL for `dialect` and build the pipeline around it.
    pub fn new(device: &wgpu::Device, dialect: ShaderDialect) -> Result<Self, GpuError> {
        let program = ShaderProgram::generate(dialect)?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("filmgrade_pipeline_shader"),
            source: wgpu::ShaderSource::Wgsl(program.source().into()),
        });

        let entries = layout_entries(dialect, program.layout().byte_size());
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("filmgrade_pipeline_layout_entries"),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("filmgrade_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("filmgrade_render_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: wgpu::TextureFormat::Rgba32Float,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::Shader(err.to_string()));
        }

        tracing::debug!(
            %dialect,
            uniform_bytes = program.layout().byte_size(),
            "created render pipeline"
        );
        Ok(Self {
            program,
            pipeline,
            bind_group_layout,
        })
    }

    pub fn dialect(&self) -> ShaderDialect {
        self.program.dialect()
    }
}
