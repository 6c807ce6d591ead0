//! Subcommand implementations and the file plumbing they share.

pub mod batch;
pub mod lut;
pub mod parity;
pub mod render;
pub mod shader;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use filmgrade_core::config::RenderConfig;
use filmgrade_core::lut_file::read_lut;
use filmgrade_core::{GradingParameters, PixelBuffer};

/// Read and validate a parameter file, attaching `lut` when given.
pub fn load_params(
    path: &Path,
    lut: Option<&Path>,
    config: &RenderConfig,
) -> Result<GradingParameters> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading parameters {}", path.display()))?;
    let mut params = GradingParameters::from_json_validated(&json)
        .with_context(|| format!("parsing parameters {}", path.display()))?;

    if let Some(lut_path) = lut {
        let grid =
            read_lut(lut_path).with_context(|| format!("reading LUT {}", lut_path.display()))?;
        config
            .check_lut(&grid)
            .with_context(|| format!("LUT {}", lut_path.display()))?;
        tracing::info!(path = %lut_path.display(), size = grid.size, "loaded 3D LUT");
        params.lut3d.grid = Some(Arc::new(grid));
    }
    if let Some(grid) = &params.lut3d.grid {
        config.check_lut(grid).context("embedded LUT")?;
    }
    Ok(params)
}

pub fn read_image(path: &Path) -> Result<PixelBuffer> {
    let img = image::open(path).with_context(|| format!("opening {}", path.display()))?;
    let buffer = PixelBuffer::from_dynamic_image(&img)
        .with_context(|| format!("decoding {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        width = buffer.width,
        height = buffer.height,
        depth = ?buffer.depth,
        "read image"
    );
    Ok(buffer)
}

/// Write at the buffer's depth. Float buffers go out as 16-bit unless the
/// target format stores floats.
pub fn write_image(path: &Path, buffer: &PixelBuffer) -> Result<()> {
    let img = buffer
        .to_dynamic_image()
        .context("rendered buffer does not match its dimensions")?;
    let float_target = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("exr"));
    let img = match img {
        image::DynamicImage::ImageRgb32F(_) if !float_target => {
            image::DynamicImage::ImageRgb16(img.to_rgb16())
        }
        other => other,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    img.save(path)
        .with_context(|| format!("writing {}", path.display()))
}
