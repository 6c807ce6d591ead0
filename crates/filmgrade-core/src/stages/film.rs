//! Negative-side stages: film curve, base correction, density levels,
//! inversion and the 3-D LUT.

use glam::Vec3;

use super::{clamp01, density, transmittance};
use crate::engine::TextureAccess;
use crate::uniforms::UniformSet;

/// Stage 1. H&D curve in the density domain, per channel.
pub fn film_curve(c: Vec3, u: &UniformSet) -> Vec3 {
    let gamma = Vec3::from(u.film_gamma);
    let out = Vec3::new(
        film_channel(c.x, gamma.x, u),
        film_channel(c.y, gamma.y, u),
        film_channel(c.z, gamma.z, u),
    );
    clamp01(out)
}

fn film_channel(v: f32, gamma: f32, u: &UniformSet) -> f32 {
    let t = v.max(0.001);
    let d = density(t);
    let dn = ((d - u.film_dmin) / u.film_drange).clamp(0.0, 1.0);
    let mut y = dn.max(1e-6).powf(gamma);
    if u.film_toe > 0.0 {
        let k = u.film_toe;
        y = y * y * (1.0 + k) / (y + k);
    }
    if u.film_shoulder > 0.0 {
        let k = u.film_shoulder;
        let s = 1.0 - y;
        y = 1.0 - s * s * (1.0 + k) / (s + k);
    }
    transmittance(u.film_dmin + y * u.film_drange)
}

/// Stage 2. Neutralize the orange mask by gain or by density subtraction.
pub fn base_correction(c: Vec3, u: &UniformSet) -> Vec3 {
    if u.base_density_mode.get() {
        let dens = Vec3::from(u.base_densities);
        let out = Vec3::new(
            transmittance(density(c.x.max(1e-6)) - dens.x),
            transmittance(density(c.y.max(1e-6)) - dens.y),
            transmittance(density(c.z.max(1e-6)) - dens.z),
        );
        clamp01(out)
    } else {
        clamp01(c * Vec3::from(u.base_gains))
    }
}

/// Stage 3. Stretch each channel's density range onto a shared output range.
pub fn density_levels(c: Vec3, u: &UniformSet) -> Vec3 {
    let mut out = c;
    for i in 0..3 {
        let range = u.levels_range[i];
        if range > 0.001 {
            let d = density(out[i].max(1e-6));
            let dn = (d - u.levels_min[i]) / range * u.levels_output_range;
            out[i] = transmittance(dn);
        }
    }
    clamp01(out)
}

/// Stage 4. Negative → positive.
pub fn inversion(c: Vec3, u: &UniformSet) -> Vec3 {
    let out = if u.inversion_log.get() {
        Vec3::ONE - (c * 255.0 + Vec3::ONE).map(f32::log2) / 8.0
    } else {
        Vec3::ONE - c
    };
    clamp01(out)
}

/// Stage 5. Blend toward the LUT-mapped color.
pub fn lut3d(c: Vec3, u: &UniformSet, textures: &impl TextureAccess) -> Vec3 {
    let sampled = textures.sample_lut(clamp01(c));
    clamp01(c.lerp(sampled, u.lut_intensity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{BaseMode, GradingParameters, InversionMode};

    const EPSILON: f32 = 1e-5;

    fn uniforms(edit: impl FnOnce(&mut GradingParameters)) -> UniformSet {
        let mut params = GradingParameters::default();
        edit(&mut params);
        UniformSet::from_params(&params)
    }

    #[test]
    fn test_inversion_linear() {
        let u = uniforms(|p| p.inversion.enabled = true);
        let out = inversion(Vec3::new(200.0, 50.0, 10.0) / 255.0, &u);
        let expected = Vec3::new(55.0, 205.0, 245.0) / 255.0;
        assert!((out - expected).abs().max_element() < EPSILON);
    }

    #[test]
    fn test_inversion_log_endpoints() {
        let u = uniforms(|p| {
            p.inversion.enabled = true;
            p.inversion.mode = InversionMode::Log;
        });
        let out = inversion(Vec3::new(0.0, 1.0, 0.5), &u);
        assert!((out.x - 1.0).abs() < EPSILON);
        assert!(out.y.abs() < EPSILON);
        let expected = 1.0 - (255.0_f32 * 0.5 + 1.0).ln() / 256.0_f32.ln();
        assert!((out.z - expected).abs() < EPSILON);
    }

    #[test]
    fn test_film_curve_neutral_settings_keep_transmittance() {
        let u = uniforms(|p| {
            p.inversion.enabled = true;
            p.film_curve.enabled = true;
        });
        // dMin 0, dMax 3, gamma 1: density passes through unchanged.
        let c = Vec3::new(0.5, 0.1, 0.01);
        let out = film_curve(c, &u);
        assert!((out - c).abs().max_element() < 1e-5, "{out:?}");
    }

    #[test]
    fn test_film_toe_and_shoulder_stay_in_range() {
        let u = uniforms(|p| {
            p.film_curve.toe = 1.0;
            p.film_curve.shoulder = 1.0;
            p.film_curve.gamma = 2.0;
        });
        for i in 0..=20 {
            let v = i as f32 / 20.0;
            let out = film_curve(Vec3::splat(v), &u);
            assert!(out.is_finite());
            assert!(out.min_element() >= 0.0 && out.max_element() <= 1.0);
        }
    }

    #[test]
    fn test_base_density_subtract() {
        let u = uniforms(|p| {
            p.base.mode = BaseMode::DensitySubtract;
            p.base.densities = [1.0, 0.0, 0.0];
        });
        let out = base_correction(Vec3::new(0.05, 0.5, 0.5), &u);
        assert!((out.x - 0.5).abs() < 1e-4);
        assert!((out.y - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_base_gain_clamps() {
        let u = uniforms(|p| p.base.gains = [2.0, 1.0, 0.5]);
        let out = base_correction(Vec3::new(0.75, 0.5, 0.5), &u);
        assert_eq!(out, Vec3::new(1.0, 0.5, 0.25));
    }

    #[test]
    fn test_levels_skip_flat_channels() {
        let u = uniforms(|p| {
            p.levels.enabled = true;
            p.levels.min = [0.5, 1.0, 0.2];
            p.levels.max = [1.5, 1.0005, 1.2];
        });
        let c = Vec3::new(0.1, 0.3, 0.1);
        let out = density_levels(c, &u);
        assert_eq!(out.y, c.y);
        // density 1.0 sits halfway through [0.5, 1.5]; output range is the
        // clamped mean (1.0 + 0.0005 + 1.0) / 3.
        let expected = transmittance(0.5 * u.levels_output_range);
        assert!((out.x - expected).abs() < 1e-5);
    }
}
