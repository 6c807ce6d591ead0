//! Adapter and device setup.

use filmgrade_core::RenderError;
use filmgrade_core::shader::ShaderError;

#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no GPU adapter available: {0}")]
    NoAdapter(String),
    #[error("device request failed: {0}")]
    DeviceRequest(String),
    #[error("shader generation failed: {0}")]
    Generate(#[from] ShaderError),
    #[error("shader module rejected: {0}")]
    Shader(String),
    #[error("{what} of {size} exceeds the device limit {limit}")]
    TooLarge {
        what: &'static str,
        size: u32,
        limit: u32,
    },
    #[error("lookup tables were not uploaded before drawing")]
    TablesMissing,
    #[error("readback failed: {0}")]
    Readback(String),
}

impl GpuError {
    /// Failures that mean "no usable GPU" rather than a broken render.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NoAdapter(_) | Self::DeviceRequest(_))
    }
}

impl From<GpuError> for RenderError {
    fn from(e: GpuError) -> Self {
        RenderError::Backend(e.to_string())
    }
}

/// A device and queue, plus what they run on.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("adapter", &self.adapter_info.name)
            .field("backend", &self.adapter_info.backend)
            .finish()
    }
}

fn instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

async fn adapter(instance: &wgpu::Instance) -> Result<wgpu::Adapter, GpuError> {
    instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| GpuError::NoAdapter(e.to_string()))
}

/// Whether any adapter can be found, without creating a device.
pub fn is_available() -> bool {
    let instance = instance();
    pollster::block_on(adapter(&instance)).is_ok()
}

impl GpuContext {
    /// Open the default high-performance adapter. Blocks.
    pub fn new() -> Result<Self, GpuError> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> Result<Self, GpuError> {
        let instance = instance();
        let adapter = adapter(&instance).await?;
        let adapter_info = adapter.get_info();

        // Gen1 packs a whole LUT into one row of slices; ask for the
        // adapter's real texture limits instead of the conservative defaults.
        let adapter_limits = adapter.limits();
        let limits = wgpu::Limits {
            max_texture_dimension_2d: adapter_limits.max_texture_dimension_2d,
            max_texture_dimension_3d: adapter_limits.max_texture_dimension_3d,
            max_uniform_buffer_binding_size: adapter_limits.max_uniform_buffer_binding_size,
            ..Default::default()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("filmgrade_device"),
                required_features: wgpu::Features::empty(),
                required_limits: limits,
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await
            .map_err(|e| GpuError::DeviceRequest(e.to_string()))?;

        tracing::info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "GPU device ready"
        );
        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    pub fn max_texture_2d(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    pub fn max_texture_3d(&self) -> u32 {
        self.device.limits().max_texture_dimension_3d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_device_failures_trigger_fallback() {
        assert!(GpuError::NoAdapter("none".into()).is_unavailable());
        assert!(GpuError::DeviceRequest("lost".into()).is_unavailable());
        assert!(!GpuError::TablesMissing.is_unavailable());
        assert!(!GpuError::Readback("map failed".into()).is_unavailable());
    }

    #[test]
    fn test_missing_tables_message() {
        let err: RenderError = GpuError::TablesMissing.into();
        let message = err.to_string();
        assert!(message.contains("lookup tables were not uploaded"), "{message}");
        assert!(!message.contains("readback"), "{message}");
    }
}
