//! 3-D LUT grid, trilinear sampling and the two texture encodings.
//!
//! The grid is stored R-fastest, then G, then B, exactly as `.cube` files
//! list it. Sampling is trilinear with `p = clamp(c, 0, 1) · (N - 1)`,
//! interpolating along R, then G, then B.
//!
//! Shader dialects never see the grid directly: Gen1 reads a
//! [`PackedLut2d`] (slices laid side by side in a 2-D float texture) and
//! Gen2 a [`NativeLut3d`] (half-float 3-D texture with hardware filtering).
//! Both encodings can be sampled on the CPU for parity checks.

use half::f16;
use serde::{Deserialize, Serialize};

/// Smallest accepted grid size.
pub const MIN_LUT_SIZE: u32 = 2;
/// Largest accepted grid size.
pub const MAX_LUT_SIZE: u32 = 129;

/// Errors from LUT construction and file decoding.
#[derive(Debug, thiserror::Error)]
pub enum LutError {
    #[error("invalid LUT size: {0}")]
    InvalidSize(String),
    #[error("expected {expected} RGB entries, found {found}")]
    DataLength { expected: usize, found: usize },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("non-finite value at entry {0}")]
    NonFinite(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A cubic RGB lookup grid.
///
/// Deserialization goes through [`Lut3D::from_data`], so a decoded grid is
/// always valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LutRepr")]
pub struct Lut3D {
    /// Grid size per axis.
    pub size: u32,
    /// `size³` entries, R fastest.
    pub data: Vec<[f32; 3]>,
}

#[derive(Deserialize)]
struct LutRepr {
    size: u32,
    data: Vec<[f32; 3]>,
}

impl TryFrom<LutRepr> for Lut3D {
    type Error = LutError;

    fn try_from(repr: LutRepr) -> Result<Self, Self::Error> {
        Self::from_data(repr.size, repr.data)
    }
}

impl Lut3D {
    /// Grid that maps every color to itself.
    pub fn identity(size: u32) -> Result<Self, LutError> {
        check_size(size)?;
        let n = size as usize;
        let scale = (n - 1) as f32;
        let mut data = Vec::with_capacity(n * n * n);
        for b in 0..n {
            for g in 0..n {
                for r in 0..n {
                    data.push([r as f32 / scale, g as f32 / scale, b as f32 / scale]);
                }
            }
        }
        Ok(Self { size, data })
    }

    /// Wrap R-fastest entries, checking size and length.
    pub fn from_data(size: u32, data: Vec<[f32; 3]>) -> Result<Self, LutError> {
        check_size(size)?;
        let expected = (size as usize).pow(3);
        if data.len() != expected {
            return Err(LutError::DataLength {
                expected,
                found: data.len(),
            });
        }
        let lut = Self { size, data };
        lut.validate()?;
        Ok(lut)
    }

    /// Build from a flat `[r, g, b, r, g, b, ...]` array.
    pub fn from_flat(size: u32, flat: &[f32]) -> Result<Self, LutError> {
        if flat.len() % 3 != 0 {
            return Err(LutError::DataLength {
                expected: (size as usize).pow(3),
                found: flat.len() / 3,
            });
        }
        let data = flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
        Self::from_data(size, data)
    }

    pub fn to_flat(&self) -> Vec<f32> {
        self.data.iter().flatten().copied().collect()
    }

    /// Check size, length and finiteness.
    pub fn validate(&self) -> Result<(), LutError> {
        check_size(self.size)?;
        let expected = (self.size as usize).pow(3);
        if self.data.len() != expected {
            return Err(LutError::DataLength {
                expected,
                found: self.data.len(),
            });
        }
        if let Some(i) = self
            .data
            .iter()
            .position(|e| e.iter().any(|v| !v.is_finite()))
        {
            return Err(LutError::NonFinite(i));
        }
        Ok(())
    }

    #[inline]
    pub fn index(&self, r: usize, g: usize, b: usize) -> usize {
        let n = self.size as usize;
        r + g * n + b * n * n
    }

    #[inline]
    pub fn at(&self, r: usize, g: usize, b: usize) -> [f32; 3] {
        self.data[self.index(r, g, b)]
    }

    /// Trilinear sample at `rgb`.
    pub fn sample(&self, rgb: [f32; 3]) -> [f32; 3] {
        trilinear(self.size, rgb, |r, g, b| self.at(r, g, b))
    }

    /// Gen1 encoding.
    pub fn packed_2d(&self) -> PackedLut2d {
        PackedLut2d::from_lut(self)
    }

    /// Gen2 encoding.
    pub fn native_3d(&self) -> NativeLut3d {
        NativeLut3d::from_lut(self)
    }
}

pub(crate) fn check_size(size: u32) -> Result<(), LutError> {
    if !(MIN_LUT_SIZE..=MAX_LUT_SIZE).contains(&size) {
        return Err(LutError::InvalidSize(format!(
            "{size} is outside [{MIN_LUT_SIZE}, {MAX_LUT_SIZE}]"
        )));
    }
    Ok(())
}

/// Trilinear interpolation over any grid fetch, R then G then B.
///
/// Every LUT sampler in the crate goes through this so the CPU reference
/// and the texture emulations share one interpolation order.
pub fn trilinear(size: u32, rgb: [f32; 3], fetch: impl Fn(usize, usize, usize) -> [f32; 3]) -> [f32; 3] {
    let max = (size - 1) as f32;
    let p = rgb.map(|v| v.clamp(0.0, 1.0) * max);
    let i0 = p.map(|v| v.floor().min(max));
    let f = [p[0] - i0[0], p[1] - i0[1], p[2] - i0[2]];
    let i0 = i0.map(|v| v as usize);
    let i1 = i0.map(|v| (v + 1).min(size as usize - 1));

    let c000 = fetch(i0[0], i0[1], i0[2]);
    let c100 = fetch(i1[0], i0[1], i0[2]);
    let c010 = fetch(i0[0], i1[1], i0[2]);
    let c110 = fetch(i1[0], i1[1], i0[2]);
    let c001 = fetch(i0[0], i0[1], i1[2]);
    let c101 = fetch(i1[0], i0[1], i1[2]);
    let c011 = fetch(i0[0], i1[1], i1[2]);
    let c111 = fetch(i1[0], i1[1], i1[2]);

    let mut out = [0.0; 3];
    for c in 0..3 {
        let c00 = mix(c000[c], c100[c], f[0]);
        let c10 = mix(c010[c], c110[c], f[0]);
        let c01 = mix(c001[c], c101[c], f[0]);
        let c11 = mix(c011[c], c111[c], f[0]);
        let c0 = mix(c00, c10, f[1]);
        let c1 = mix(c01, c11, f[1]);
        out[c] = mix(c0, c1, f[2]);
    }
    out
}

#[inline]
fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Gen1 layout: the N blue slices side by side in an `N² × N` RGBA32F
/// texture, grid entry `(r, g, b)` at texel `(r + b·N, g)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedLut2d {
    pub size: u32,
    /// Row-major texels, alpha fixed at 1.
    pub texels: Vec<[f32; 4]>,
}

impl PackedLut2d {
    pub fn from_lut(lut: &Lut3D) -> Self {
        let n = lut.size as usize;
        let width = n * n;
        let mut texels = vec![[0.0, 0.0, 0.0, 1.0]; width * n];
        for b in 0..n {
            for g in 0..n {
                for r in 0..n {
                    let [cr, cg, cb] = lut.at(r, g, b);
                    texels[g * width + r + b * n] = [cr, cg, cb, 1.0];
                }
            }
        }
        Self {
            size: lut.size,
            texels,
        }
    }

    /// `(width, height)` of the texture.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.size * self.size, self.size)
    }

    /// Texel fetch the way the Gen1 shader addresses it.
    #[inline]
    pub fn load(&self, r: usize, g: usize, b: usize) -> [f32; 3] {
        let n = self.size as usize;
        let t = self.texels[g * n * n + r + b * n];
        [t[0], t[1], t[2]]
    }

    /// Manual 8-tap trilinear sample.
    pub fn sample(&self, rgb: [f32; 3]) -> [f32; 3] {
        trilinear(self.size, rgb, |r, g, b| self.load(r, g, b))
    }
}

/// Gen2 layout: `N × N × N` RGBA16F texture, R along x, G along y, B along z.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeLut3d {
    pub size: u32,
    pub texels: Vec<[f16; 4]>,
}

impl NativeLut3d {
    pub fn from_lut(lut: &Lut3D) -> Self {
        let texels = lut
            .data
            .iter()
            .map(|&[r, g, b]| {
                [
                    f16::from_f32(r),
                    f16::from_f32(g),
                    f16::from_f32(b),
                    f16::ONE,
                ]
            })
            .collect();
        Self {
            size: lut.size,
            texels,
        }
    }

    /// Raw bytes for texture upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }

    #[inline]
    pub fn load(&self, r: usize, g: usize, b: usize) -> [f32; 3] {
        let n = self.size as usize;
        let t = self.texels[r + g * n + b * n * n];
        [t[0].to_f32(), t[1].to_f32(), t[2].to_f32()]
    }

    /// Emulates a linear/clamp sampler read at `(p + 0.5) / N`, which lands
    /// on the same eight texels and weights as the reference sampler.
    pub fn sample(&self, rgb: [f32; 3]) -> [f32; 3] {
        trilinear(self.size, rgb, |r, g, b| self.load(r, g, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn warm_lut(size: u32) -> Lut3D {
        let mut lut = Lut3D::identity(size).expect("valid size");
        for e in &mut lut.data {
            *e = [(e[0] * 1.1).min(1.0), e[1], e[2] * 0.8];
        }
        lut
    }

    #[test]
    fn test_identity_sample_returns_input() {
        let lut = Lut3D::identity(17).expect("valid size");
        for rgb in [[0.0, 0.0, 0.0], [0.3, 0.6, 0.9], [1.0, 1.0, 1.0], [0.51, 0.02, 0.77]] {
            let out = lut.sample(rgb);
            for i in 0..3 {
                assert!((out[i] - rgb[i]).abs() < EPSILON, "channel {i}: {:?} vs {:?}", out, rgb);
            }
        }
    }

    #[test]
    fn test_sample_hits_grid_points_exactly() {
        let lut = warm_lut(5);
        assert_eq!(lut.sample([0.25, 0.5, 0.75]), lut.at(1, 2, 3));
    }

    #[test]
    fn test_sample_clamps_out_of_domain() {
        let lut = warm_lut(5);
        assert_eq!(lut.sample([-1.0, 2.0, 0.0]), lut.at(0, 4, 0));
    }

    #[test]
    fn test_size_bounds() {
        assert!(matches!(Lut3D::identity(1), Err(LutError::InvalidSize(_))));
        assert!(matches!(Lut3D::identity(130), Err(LutError::InvalidSize(_))));
        assert!(Lut3D::identity(2).is_ok());
    }

    #[test]
    fn test_from_flat_rejects_short_data() {
        let err = Lut3D::from_flat(2, &[0.0; 21]).expect_err("7 entries for a 2³ grid");
        assert!(matches!(err, LutError::DataLength { expected: 8, found: 7 }));
    }

    #[test]
    fn test_from_data_rejects_nan() {
        let mut data = Lut3D::identity(2).expect("valid size").data;
        data[3][1] = f32::NAN;
        assert!(matches!(Lut3D::from_data(2, data), Err(LutError::NonFinite(3))));
    }

    #[test]
    fn test_packed_layout_addresses() {
        let lut = warm_lut(3);
        let packed = lut.packed_2d();
        assert_eq!(packed.dimensions(), (9, 3));
        // (r=2, g=1, b=2) lives at x = 2 + 2*3 = 8, y = 1.
        let t = packed.texels[9 + 8];
        assert_eq!([t[0], t[1], t[2]], lut.at(2, 1, 2));
    }

    #[test]
    fn test_encodings_match_reference_sampler() {
        let lut = warm_lut(9);
        let packed = lut.packed_2d();
        let native = lut.native_3d();
        for i in 0..64 {
            let t = i as f32 / 63.0;
            let rgb = [t, (t * 7.3).fract(), 1.0 - t];
            let reference = lut.sample(rgb);
            let a = packed.sample(rgb);
            let b = native.sample(rgb);
            for c in 0..3 {
                assert!((reference[c] - a[c]).abs() < EPSILON, "packed channel {c}");
                assert!((reference[c] - b[c]).abs() < 1.0 / 255.0, "native channel {c}");
            }
        }
    }

    #[test]
    fn test_deserialize_validates_grid() {
        let err = serde_json::from_str::<Lut3D>(r#"{"size":0,"data":[]}"#)
            .expect_err("size 0 is not a grid");
        assert!(err.to_string().contains("invalid LUT size"), "{err}");
        let short = serde_json::from_str::<Lut3D>(r#"{"size":2,"data":[[0,0,0]]}"#);
        assert!(short.is_err(), "one entry for a 2³ grid");

        let lut = warm_lut(3);
        let json = serde_json::to_string(&lut).expect("serializes");
        let back: Lut3D = serde_json::from_str(&json).expect("valid grid deserializes");
        assert_eq!(back, lut);
    }

    #[test]
    fn test_native_bytes_length() {
        let native = Lut3D::identity(4).expect("valid size").native_3d();
        assert_eq!(native.as_bytes().len(), 4 * 4 * 4 * 4 * 2);
    }
}
