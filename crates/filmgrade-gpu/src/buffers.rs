//! Texture creation and upload for the render pass.
//!
//! Every texture here is read with `textureLoad` except the Gen2 LUT, which
//! is `Rgba16Float` and sampled through a linear sampler.

use filmgrade_core::PixelBuffer;
use filmgrade_core::curves::{CURVE_SIZE, CurveSet};
use filmgrade_core::lut::{Lut3D, NativeLut3d, PackedLut2d};
use filmgrade_core::parity::interleave_curves;

use crate::context::GpuError;

/// A texture and its default view.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl GpuTexture {
    fn create(device: &wgpu::Device, desc: &wgpu::TextureDescriptor) -> Self {
        let texture = device.create_texture(desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

fn extent(width: u32, height: u32, depth: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: depth,
    }
}

fn sampled_desc<'a>(
    label: &'a str,
    size: wgpu::Extent3d,
    dimension: wgpu::TextureDimension,
    format: wgpu::TextureFormat,
) -> wgpu::TextureDescriptor<'a> {
    wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    }
}

fn write(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    data: &[u8],
    bytes_per_texel: u32,
    size: wgpu::Extent3d,
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size.width * bytes_per_texel),
            rows_per_image: Some(size.height),
        },
        size,
    );
}

fn check_2d(device: &wgpu::Device, what: &'static str, w: u32, h: u32) -> Result<(), GpuError> {
    let limit = device.limits().max_texture_dimension_2d;
    let size = w.max(h);
    if size > limit {
        return Err(GpuError::TooLarge { what, size, limit });
    }
    Ok(())
}

/// Upload the source image as `Rgba32Float`, alpha 1.
pub fn upload_source(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &PixelBuffer,
) -> Result<GpuTexture, GpuError> {
    check_2d(device, "source image", image.width, image.height)?;
    let size = extent(image.width, image.height, 1);
    let tex = GpuTexture::create(
        device,
        &sampled_desc(
            "filmgrade_source",
            size,
            wgpu::TextureDimension::D2,
            wgpu::TextureFormat::Rgba32Float,
        ),
    );
    let texels: Vec<[f32; 4]> = image.pixels.iter().map(|&[r, g, b]| [r, g, b, 1.0]).collect();
    write(queue, &tex.texture, bytemuck::cast_slice(&texels), 16, size);
    Ok(tex)
}

/// `Rgba32Float` render target that can be copied out.
pub fn create_target(
    device: &wgpu::Device,
    width: u32,
    height: u32,
) -> Result<GpuTexture, GpuError> {
    check_2d(device, "render target", width, height)?;
    Ok(GpuTexture::create(
        device,
        &wgpu::TextureDescriptor {
            label: Some("filmgrade_target"),
            size: extent(width, height, 1),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        },
    ))
}

/// Placeholder grid bound while no LUT is set; the stage gate keeps it unread.
pub fn placeholder_lut() -> Lut3D {
    Lut3D {
        size: 2,
        data: vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
        ],
    }
}

/// Gen1 LUT: the blue slices side by side, `N² × N` `Rgba32Float`.
pub fn upload_packed_lut(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    lut: &PackedLut2d,
) -> Result<GpuTexture, GpuError> {
    let (w, h) = lut.dimensions();
    check_2d(device, "packed LUT width", w, h)?;
    let size = extent(w, h, 1);
    let tex = GpuTexture::create(
        device,
        &sampled_desc(
            "filmgrade_lut_packed",
            size,
            wgpu::TextureDimension::D2,
            wgpu::TextureFormat::Rgba32Float,
        ),
    );
    write(queue, &tex.texture, bytemuck::cast_slice(&lut.texels), 16, size);
    Ok(tex)
}

/// Gen2 LUT: native `N³` `Rgba16Float`.
pub fn upload_native_lut(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    lut: &NativeLut3d,
) -> Result<GpuTexture, GpuError> {
    let limit = device.limits().max_texture_dimension_3d;
    if lut.size > limit {
        return Err(GpuError::TooLarge {
            what: "3D LUT",
            size: lut.size,
            limit,
        });
    }
    let size = extent(lut.size, lut.size, lut.size);
    let tex = GpuTexture::create(
        device,
        &sampled_desc(
            "filmgrade_lut_3d",
            size,
            wgpu::TextureDimension::D3,
            wgpu::TextureFormat::Rgba16Float,
        ),
    );
    write(queue, &tex.texture, lut.as_bytes(), 8, size);
    Ok(tex)
}

/// Gen1 curves: four `256 × 1` `R32Float` textures (master, red, green, blue).
pub fn upload_split_curves(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    curves: &CurveSet,
) -> [GpuTexture; 4] {
    const LABELS: [&str; 4] = [
        "filmgrade_curve_master",
        "filmgrade_curve_red",
        "filmgrade_curve_green",
        "filmgrade_curve_blue",
    ];
    let tables = curves.tables();
    let size = extent(CURVE_SIZE as u32, 1, 1);
    std::array::from_fn(|i| {
        let tex = GpuTexture::create(
            device,
            &sampled_desc(
                LABELS[i],
                size,
                wgpu::TextureDimension::D2,
                wgpu::TextureFormat::R32Float,
            ),
        );
        write(queue, &tex.texture, bytemuck::cast_slice(&tables[i][..]), 4, size);
        tex
    })
}

/// Gen2 curves: one `256 × 1` `Rgba32Float` texture, rgba = master, r, g, b.
pub fn upload_interleaved_curves(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    curves: &CurveSet,
) -> GpuTexture {
    let size = extent(CURVE_SIZE as u32, 1, 1);
    let tex = GpuTexture::create(
        device,
        &sampled_desc(
            "filmgrade_curves_rgba",
            size,
            wgpu::TextureDimension::D2,
            wgpu::TextureFormat::Rgba32Float,
        ),
    );
    let rows = interleave_curves(curves);
    write(queue, &tex.texture, bytemuck::cast_slice(&rows), 16, size);
    tex
}

/// Linear clamp sampler for the Gen2 LUT.
pub fn lut_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("filmgrade_lut_sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}
