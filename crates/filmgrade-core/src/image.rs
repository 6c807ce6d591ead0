//! Pixel buffer representation for the rendering pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RenderError;

/// Supported bit depths for source images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    /// 8-bit unsigned integer.
    U8,
    /// 10-bit unsigned integer.
    U10,
    /// 12-bit unsigned integer.
    U12,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit floating point. Never quantized.
    F32,
}

impl BitDepth {
    /// Largest code value of an integer depth, `None` for float.
    pub fn max_code(self) -> Option<u32> {
        match self {
            Self::U8 => Some(255),
            Self::U10 => Some(1023),
            Self::U12 => Some(4095),
            Self::U16 => Some(65535),
            Self::F32 => None,
        }
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8 => write!(f, "8-bit"),
            Self::U10 => write!(f, "10-bit"),
            Self::U12 => write!(f, "12-bit"),
            Self::U16 => write!(f, "16-bit"),
            Self::F32 => write!(f, "32-bit float"),
        }
    }
}

impl From<u8> for BitDepth {
    fn from(bits: u8) -> Self {
        match bits {
            10 => Self::U10,
            12 => Self::U12,
            16 => Self::U16,
            32 => Self::F32,
            _ => Self::U8,
        }
    }
}

/// Round-half-up quantization of a normalized value to an integer code.
#[inline]
pub fn quantize(v: f32, max_code: u32) -> u32 {
    let scaled = v.clamp(0.0, 1.0) * max_code as f32;
    ((scaled + 0.5).floor() as u32).min(max_code)
}

/// Image samples in normalized RGB f32, plus the depth they came from.
///
/// The pipeline works on the float samples only; the depth is carried so
/// output can be snapped back to the source grid at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Row-major RGB samples in `[0, 1]`.
    pub pixels: Vec<[f32; 3]>,
    /// Bit depth of the source samples.
    pub depth: BitDepth,
}

impl PixelBuffer {
    /// Wrap normalized samples, checking the pixel count.
    pub fn new(
        width: u32,
        height: u32,
        pixels: Vec<[f32; 3]>,
        depth: BitDepth,
    ) -> Result<Self, RenderError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(RenderError::ShapeMismatch {
                width,
                height,
                samples: pixels.len() * 3,
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
            depth,
        })
    }

    /// Build from interleaved 8-bit RGB.
    pub fn from_u8(width: u32, height: u32, samples: &[u8]) -> Result<Self, RenderError> {
        check_samples(width, height, samples.len())?;
        let pixels = samples
            .chunks_exact(3)
            .map(|px| [px[0] as f32 / 255.0, px[1] as f32 / 255.0, px[2] as f32 / 255.0])
            .collect();
        Self::new(width, height, pixels, BitDepth::U8)
    }

    /// Build from interleaved integer RGB stored in `u16`, with a declared depth.
    pub fn from_u16(
        width: u32,
        height: u32,
        samples: &[u16],
        depth: BitDepth,
    ) -> Result<Self, RenderError> {
        check_samples(width, height, samples.len())?;
        let max = depth.max_code().unwrap_or(65535) as f32;
        let pixels = samples
            .chunks_exact(3)
            .map(|px| {
                [
                    (px[0] as f32 / max).min(1.0),
                    (px[1] as f32 / max).min(1.0),
                    (px[2] as f32 / max).min(1.0),
                ]
            })
            .collect();
        Self::new(width, height, pixels, depth)
    }

    /// Build from interleaved float RGB. Values are clamped to `[0, 1]`.
    pub fn from_f32(width: u32, height: u32, samples: &[f32]) -> Result<Self, RenderError> {
        check_samples(width, height, samples.len())?;
        let pixels = samples
            .chunks_exact(3)
            .map(|px| [clamp01(px[0]), clamp01(px[1]), clamp01(px[2])])
            .collect();
        Self::new(width, height, pixels, BitDepth::F32)
    }

    /// Convert an `image` crate buffer, keeping 16-bit and float precision.
    pub fn from_dynamic_image(img: &image::DynamicImage) -> Result<Self, RenderError> {
        use image::DynamicImage;
        let (width, height) = (img.width(), img.height());
        match img {
            DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
            | DynamicImage::ImageRgb16(_)
            | DynamicImage::ImageRgba16(_) => {
                Self::from_u16(width, height, img.to_rgb16().as_raw(), BitDepth::U16)
            }
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                Self::from_f32(width, height, img.to_rgb32f().as_raw())
            }
            _ => Self::from_u8(width, height, img.to_rgb8().as_raw()),
        }
    }

    /// Solid-color buffer, mostly for tests.
    pub fn filled(width: u32, height: u32, rgb: [f32; 3], depth: BitDepth) -> Self {
        Self {
            width,
            height,
            pixels: vec![rgb; width as usize * height as usize],
            depth,
        }
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Interleaved 8-bit RGB, round-half-up.
    pub fn to_u8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|px| px.map(|v| quantize(v, 255) as u8))
            .collect()
    }

    /// Interleaved 16-bit RGB scaled to the full `u16` range.
    pub fn to_u16(&self) -> Vec<u16> {
        self.pixels
            .iter()
            .flat_map(|px| px.map(|v| quantize(v, 65535) as u16))
            .collect()
    }

    /// Snap every sample to this buffer's depth grid. Float buffers are
    /// returned unchanged.
    pub fn quantized(mut self) -> Self {
        if let Some(max) = self.depth.max_code() {
            let scale = max as f32;
            for px in &mut self.pixels {
                for v in px.iter_mut() {
                    *v = quantize(*v, max) as f32 / scale;
                }
            }
        }
        self
    }

    /// Convert to an `image` crate buffer matching the source depth.
    pub fn to_dynamic_image(&self) -> Option<image::DynamicImage> {
        match self.depth {
            BitDepth::U8 => {
                image::RgbImage::from_raw(self.width, self.height, self.to_u8())
                    .map(image::DynamicImage::ImageRgb8)
            }
            BitDepth::U10 | BitDepth::U12 | BitDepth::U16 => {
                image::ImageBuffer::<image::Rgb<u16>, _>::from_raw(
                    self.width,
                    self.height,
                    self.to_u16(),
                )
                .map(image::DynamicImage::ImageRgb16)
            }
            BitDepth::F32 => {
                let raw: Vec<f32> = self.pixels.iter().flatten().copied().collect();
                image::Rgb32FImage::from_raw(self.width, self.height, raw)
                    .map(image::DynamicImage::ImageRgb32F)
            }
        }
    }
}

fn check_samples(width: u32, height: u32, samples: usize) -> Result<(), RenderError> {
    if samples != width as usize * height as usize * 3 {
        return Err(RenderError::ShapeMismatch {
            width,
            height,
            samples,
        });
    }
    Ok(())
}

#[inline]
fn clamp01(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}
