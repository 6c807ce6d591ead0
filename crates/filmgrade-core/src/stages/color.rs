//! Color group: tone curve, HSL bands, saturation and split toning.

use glam::Vec3;

use super::{clamp01, luma, smoothstep};
use crate::engine::{CurveChannel, TextureAccess};
use crate::params::HSL_BAND_COUNT;
use crate::uniforms::UniformSet;

/// Band centers in degrees: red, orange, yellow, green, aqua, blue, purple, magenta.
pub const HSL_BAND_CENTERS: [f32; HSL_BAND_COUNT] =
    [0.0, 30.0, 60.0, 120.0, 180.0, 240.0, 270.0, 300.0];
/// Band half-widths in degrees; weight falls to zero at this distance.
pub const HSL_BAND_HALF_RANGES: [f32; HSL_BAND_COUNT] =
    [60.0, 30.0, 60.0, 60.0, 60.0, 60.0, 30.0, 60.0];

/// Stage 12. Master curve, then the per-channel curves.
pub fn tone_curve(c: Vec3, _u: &UniformSet, textures: &impl TextureAccess) -> Vec3 {
    let m = Vec3::new(
        textures.curve(CurveChannel::Master, c.x),
        textures.curve(CurveChannel::Master, c.y),
        textures.curve(CurveChannel::Master, c.z),
    );
    let out = Vec3::new(
        textures.curve(CurveChannel::Red, m.x),
        textures.curve(CurveChannel::Green, m.y),
        textures.curve(CurveChannel::Blue, m.z),
    );
    clamp01(out)
}

/// Raised-cosine weight of a hue for one band.
#[inline]
pub fn band_weight(hue: f32, center: f32, half_range: f32) -> f32 {
    let d = (hue - center).abs();
    let dist = d.min(360.0 - d);
    if dist < half_range {
        0.5 * (1.0 + (std::f32::consts::PI * dist / half_range).cos())
    } else {
        0.0
    }
}

/// Stage 13. Hue rotation, saturation scale and lightness offset from the
/// eight overlapping hue bands.
pub fn hsl(c: Vec3, u: &UniformSet) -> Vec3 {
    let (h, s, l) = rgb_to_hsl(c);
    let mut dh = 0.0;
    let mut ds = 0.0;
    let mut dl = 0.0;
    for i in 0..HSL_BAND_COUNT {
        let w = band_weight(h, HSL_BAND_CENTERS[i], HSL_BAND_HALF_RANGES[i]);
        let band = u.hsl_bands[i];
        dh += w * band[0];
        ds += w * band[1];
        dl += w * band[2];
    }
    let h2 = wrap_hue(h + dh);
    let s2 = (s * (1.0 + ds)).clamp(0.0, 1.0);
    let l2 = (l + dl * 0.5 * s).clamp(0.0, 1.0);
    clamp01(hsl_to_rgb(h2, s2, l2))
}

/// Stage 14. Luma-preserving saturation.
pub fn saturation(c: Vec3, u: &UniformSet) -> Vec3 {
    let y = Vec3::splat(luma(c));
    clamp01(y + (c - y) * (1.0 + u.saturation))
}

/// Zone weights `(shadow, midtone, highlight)` for split toning.
///
/// `balance` is the normalized `[-1, 1]` control; the zone boundaries move
/// by `balance / 2` (slider / 200).
pub fn split_weights(lum: f32, balance: f32) -> (f32, f32, f32) {
    let shift = balance * 0.5;
    let ws = 1.0 - smoothstep(shift, 0.5 + shift, lum);
    let wh = smoothstep(0.5 + shift, 1.0 + shift, lum);
    let wm = (1.0 - ws - wh).max(0.0);
    (ws, wm, wh)
}

/// Stage 15. Blend each zone toward a luminance-matched tint.
pub fn split_tone(c: Vec3, u: &UniformSet) -> Vec3 {
    let l = luma(c);
    let (ws, wm, wh) = split_weights(l, u.split_balance);
    let mut out = c;
    out = tint_zone(out, l, u.split_shadow_hue, ws * u.split_shadow_sat);
    out = tint_zone(out, l, u.split_midtone_hue, wm * u.split_midtone_sat);
    out = tint_zone(out, l, u.split_highlight_hue, wh * u.split_highlight_sat);
    clamp01(out)
}

fn tint_zone(c: Vec3, lum: f32, hue: f32, amount: f32) -> Vec3 {
    if amount <= 0.0 {
        return c;
    }
    let tint = hsl_to_rgb(hue * 360.0, 1.0, 0.5);
    let target = clamp01(Vec3::splat(lum) + (tint - Vec3::splat(luma(tint))));
    c.lerp(target, amount)
}

#[inline]
pub fn wrap_hue(h: f32) -> f32 {
    h - 360.0 * (h / 360.0).floor()
}

/// RGB → `(hue degrees, saturation, lightness)`.
pub fn rgb_to_hsl(c: Vec3) -> (f32, f32, f32) {
    let max = c.x.max(c.y).max(c.z);
    let min = c.x.min(c.y).min(c.z);
    let l = (max + min) * 0.5;
    let delta = max - min;
    if delta < 1e-6 {
        return (0.0, 0.0, l);
    }

    let s = if l > 0.5 {
        delta / (2.0 - max - min).max(1e-6)
    } else {
        delta / (max + min).max(1e-6)
    };

    let mut h = if max == c.x {
        (c.y - c.z) / delta
    } else if max == c.y {
        (c.z - c.x) / delta + 2.0
    } else {
        (c.x - c.y) / delta + 4.0
    };
    if h < 0.0 {
        h += 6.0;
    }
    (h * 60.0, s, l)
}

/// `(hue degrees, saturation, lightness)` → RGB.
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Vec3 {
    if s <= 0.0 {
        return Vec3::splat(l);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let t = h / 360.0;
    Vec3::new(
        hue_to_channel(p, q, t + 1.0 / 3.0),
        hue_to_channel(p, q, t),
        hue_to_channel(p, q, t - 1.0 / 3.0),
    )
}

fn hue_to_channel(p: f32, q: f32, t: f32) -> f32 {
    let mut t = t;
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GradingParameters;

    const EPSILON: f32 = 1e-5;

    fn uniforms(edit: impl FnOnce(&mut GradingParameters)) -> UniformSet {
        let mut params = GradingParameters::default();
        edit(&mut params);
        UniformSet::from_params(&params)
    }

    #[test]
    fn test_hsl_roundtrip_preserves_values() {
        for original in [
            Vec3::new(0.8, 0.4, 0.2),
            Vec3::new(0.1, 0.9, 0.3),
            Vec3::new(0.2, 0.3, 0.95),
        ] {
            let (h, s, l) = rgb_to_hsl(original);
            let back = hsl_to_rgb(h, s, l);
            for i in 0..3 {
                assert!(
                    (original[i] - back[i]).abs() < 0.001,
                    "channel {i}: {:.6} vs {:.6}",
                    original[i],
                    back[i]
                );
            }
        }
    }

    #[test]
    fn test_band_weight_window() {
        assert_eq!(band_weight(0.0, 0.0, 60.0), 1.0);
        assert!((band_weight(30.0, 0.0, 60.0) - 0.5).abs() < EPSILON);
        assert_eq!(band_weight(60.0, 0.0, 60.0), 0.0);
        // Circular distance: 350° is 10° from red.
        assert!((band_weight(350.0, 0.0, 60.0) - band_weight(10.0, 0.0, 60.0)).abs() < EPSILON);
    }

    #[test]
    fn test_hsl_hue_shift_moves_pure_red() {
        let u = uniforms(|p| p.hsl.red = [100.0, 0.0, 0.0]);
        let out = hsl(Vec3::new(1.0, 0.0, 0.0), &u);
        let (h, _, _) = rgb_to_hsl(out);
        assert!((h - 30.0).abs() < 0.01, "hue {h}");
    }

    #[test]
    fn test_hsl_leaves_gray_alone() {
        let u = uniforms(|p| {
            p.hsl.red = [100.0, 100.0, 100.0];
            p.hsl.blue = [-100.0, -100.0, -100.0];
        });
        let gray = Vec3::splat(0.42);
        assert!((hsl(gray, &u) - gray).abs().max_element() < EPSILON);
    }

    #[test]
    fn test_saturation_keeps_luma() {
        let u = uniforms(|p| p.saturation.global = 40.0);
        let c = Vec3::new(0.6, 0.4, 0.3);
        let out = saturation(c, &u);
        assert!((luma(out) - luma(c)).abs() < EPSILON);
        assert!(out.x - out.z > c.x - c.z);
    }

    #[test]
    fn test_split_weights_partition() {
        for balance in [-1.0, -0.3, 0.0, 0.5, 1.0] {
            for i in 0..=50 {
                let lum = i as f32 / 50.0;
                let (ws, wm, wh) = split_weights(lum, balance);
                assert!((ws + wm + wh - 1.0).abs() < EPSILON, "lum {lum} balance {balance}");
            }
        }
    }

    #[test]
    fn test_split_weights_crossings_shift_with_balance() {
        let (ws, _, _) = split_weights(0.25, 0.0);
        assert!((ws - 0.5).abs() < EPSILON);
        let (_, _, wh) = split_weights(0.75, 0.0);
        assert!((wh - 0.5).abs() < EPSILON);

        // balance +40 → shift 0.2
        let (ws, _, _) = split_weights(0.45, 0.4);
        let (_, _, wh) = split_weights(0.95, 0.4);
        assert!((ws - 0.5).abs() < EPSILON);
        assert!((wh - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_split_tone_tints_shadows_only() {
        let u = uniforms(|p| {
            p.split_tone.shadow_hue = 240.0;
            p.split_tone.shadow_saturation = 100.0;
        });
        let dark = split_tone(Vec3::splat(0.05), &u);
        assert!(dark.z > dark.x, "shadow tinted blue: {dark:?}");
        let bright = Vec3::splat(0.9);
        assert_eq!(split_tone(bright, &u), bright);
    }
}
