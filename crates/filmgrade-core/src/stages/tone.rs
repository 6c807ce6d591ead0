//! Tone group: white balance through highlight roll-off.
//!
//! These stages may push values outside `[0, 1]`; only
//! [`highlight_rolloff`] clamps.

use glam::Vec3;

use super::clamp01;
use crate::uniforms::UniformSet;

/// Contrast pivot (perceptual mid-gray).
pub const CONTRAST_PIVOT: f32 = 0.46;
/// Roll-off knee start.
pub const ROLLOFF_THRESHOLD: f32 = 0.8;
/// Headroom the knee compresses into.
pub const ROLLOFF_KNEE: f32 = 0.2;

/// Stage 6.
pub fn white_balance(c: Vec3, u: &UniformSet) -> Vec3 {
    c * Vec3::from(u.wb_gains)
}

/// Stage 7.
pub fn exposure(c: Vec3, u: &UniformSet) -> Vec3 {
    c * u.exposure_gain
}

/// Stage 8.
pub fn contrast(c: Vec3, u: &UniformSet) -> Vec3 {
    (c - Vec3::splat(CONTRAST_PIVOT)) * u.contrast_factor + Vec3::splat(CONTRAST_PIVOT)
}

/// Stage 9. Remap `[black, white]` onto `[0, 1]`.
pub fn whites_blacks(c: Vec3, u: &UniformSet) -> Vec3 {
    let span = (u.white_point - u.black_point).max(1e-4);
    (c - Vec3::splat(u.black_point)) / span
}

/// Stage 10. Additive Bernstein bumps centered low and high.
pub fn shadows_highlights(c: Vec3, u: &UniformSet) -> Vec3 {
    let x = clamp01(c);
    let inv = Vec3::ONE - x;
    c + u.shadow_factor * inv * inv * x * 4.0 + u.highlight_factor * x * x * inv * 4.0
}

/// Stage 11. Soft knee on the max channel, applied to all channels by the
/// same ratio, then clamp.
pub fn highlight_rolloff(c: Vec3, _u: &UniformSet) -> Vec3 {
    let m = c.max_element();
    let mut out = c;
    if m > ROLLOFF_THRESHOLD {
        let compressed =
            ROLLOFF_THRESHOLD + ROLLOFF_KNEE * ((m - ROLLOFF_THRESHOLD) / ROLLOFF_KNEE).tanh();
        out = c * (compressed / m);
    }
    clamp01(out)
}
