//! LUT resampling and inversion.
//!
//! Inversion solves `lut(x) = t` for every grid point `t` of the output
//! grid with damped Newton steps on the trilinear interpolator. The
//! Jacobian is taken by central differences, the step is the regularized
//! normal-equation solution and a halving line search keeps every accepted
//! step downhill. Results are clamped to the unit cube.
//!
//! Grid points the LUT cannot reach (outside its output gamut) converge to
//! the closest reachable input and are counted in the log.

use glam::{Mat3, Vec3};
use rayon::prelude::*;

use crate::lut::{Lut3D, LutError, check_size};

const MAX_ITERATIONS: usize = 30;
const TOLERANCE: f32 = 1e-6;
const JACOBIAN_STEP: f32 = 1e-3;
const DAMPING: f32 = 1e-8;
const LINE_SEARCH_STEPS: usize = 10;
/// Residual above which a seed search is tried.
const RETRY_ERROR: f32 = 1e-4;
/// Residual above which a grid point counts as unreachable.
const HIGH_ERROR: f32 = 0.01;
/// Coarse grid used to seed points the first solve missed.
const SEED_GRID: usize = 9;

/// Round-trip error statistics from [`verify_inversion`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InversionReport {
    pub samples: usize,
    pub mean: f32,
    pub max: f32,
    pub min: f32,
}

impl InversionReport {
    /// Rough grade of the round trip, by maximum error.
    pub fn quality(&self) -> &'static str {
        if self.max < 0.01 {
            "excellent"
        } else if self.max < 0.03 {
            "good"
        } else {
            "fair (try a larger output size)"
        }
    }
}

impl Lut3D {
    /// Trilinearly resample onto a grid of `size` points per axis.
    pub fn resample(&self, size: u32) -> Result<Lut3D, LutError> {
        check_size(size)?;
        let data = grid_points(size).map(|p| self.sample(p)).collect();
        Lut3D::from_data(size, data)
    }

    /// Inverse grid with `output_size` points per axis, so that
    /// `inverse.sample(self.sample(x)) ≈ x`.
    pub fn invert(&self, output_size: u32) -> Result<Lut3D, LutError> {
        check_size(output_size)?;
        let n = output_size as usize;
        let scale = (n - 1) as f32;

        // Blue slices in parallel; inside a slice each solve seeds from
        // the previous one.
        let slices: Vec<(Vec<[f32; 3]>, usize)> = (0..n)
            .into_par_iter()
            .map(|b| {
                let mut out = Vec::with_capacity(n * n);
                let mut unreachable = 0;
                let mut previous: Option<Vec3> = None;
                for g in 0..n {
                    for r in 0..n {
                        let target = Vec3::new(r as f32, g as f32, b as f32) / scale;
                        let (x, error) = self.solve_point(target, previous);
                        if error > HIGH_ERROR {
                            unreachable += 1;
                        }
                        previous = Some(x);
                        out.push(x.to_array());
                    }
                }
                (out, unreachable)
            })
            .collect();

        let unreachable: usize = slices.iter().map(|(_, u)| u).sum();
        if unreachable > 0 {
            tracing::warn!(
                unreachable,
                total = n * n * n,
                "some inverse grid points are outside the LUT's output range"
            );
        }
        tracing::debug!(input_size = self.size, output_size, "inverted 3D LUT");

        let data = slices.into_iter().flat_map(|(s, _)| s).collect();
        Lut3D::from_data(output_size, data)
    }

    fn apply(&self, x: Vec3) -> Vec3 {
        Vec3::from_array(self.sample(x.to_array()))
    }

    fn residual(&self, x: Vec3, target: Vec3) -> f32 {
        (self.apply(x) - target).abs().max_element()
    }

    fn solve_point(&self, target: Vec3, previous: Option<Vec3>) -> (Vec3, f32) {
        let mut seed = target;
        if let Some(p) = previous
            && self.residual(p, target) < self.residual(seed, target)
        {
            seed = p;
        }
        let (x, error) = self.newton(target, seed);
        if error <= RETRY_ERROR {
            return (x, error);
        }
        let (y, retry) = self.newton(target, self.nearest_seed(target));
        if retry < error { (y, retry) } else { (x, error) }
    }

    /// Coarse-grid input whose output lands closest to `target`.
    fn nearest_seed(&self, target: Vec3) -> Vec3 {
        let scale = (SEED_GRID - 1) as f32;
        let mut best = (f32::INFINITY, target);
        for b in 0..SEED_GRID {
            for g in 0..SEED_GRID {
                for r in 0..SEED_GRID {
                    let x = Vec3::new(r as f32, g as f32, b as f32) / scale;
                    let d = self.apply(x).distance_squared(target);
                    if d < best.0 {
                        best = (d, x);
                    }
                }
            }
        }
        best.1
    }

    fn newton(&self, target: Vec3, seed: Vec3) -> (Vec3, f32) {
        let mut x = seed.clamp(Vec3::ZERO, Vec3::ONE);
        let mut error = self.residual(x, target);

        for _ in 0..MAX_ITERATIONS {
            if error < TOLERANCE {
                break;
            }
            let residual = self.apply(x) - target;
            let jacobian = self.jacobian(x);
            let jt = jacobian.transpose();
            let normal = jt * jacobian + Mat3::from_diagonal(Vec3::splat(DAMPING));
            if normal.determinant().abs() <= f32::EPSILON * f32::EPSILON {
                break;
            }
            let delta = normal.inverse() * -(jt * residual);

            let mut alpha = 1.0;
            let mut accepted = false;
            for _ in 0..LINE_SEARCH_STEPS {
                let candidate = (x + delta * alpha).clamp(Vec3::ZERO, Vec3::ONE);
                let candidate_error = self.residual(candidate, target);
                if candidate_error < error {
                    x = candidate;
                    error = candidate_error;
                    accepted = true;
                    break;
                }
                alpha *= 0.5;
            }
            if !accepted {
                x = (x + delta * 0.1).clamp(Vec3::ZERO, Vec3::ONE);
                error = self.residual(x, target);
            }
        }
        (x, error)
    }

    /// Central-difference Jacobian, one-sided at the cube faces.
    fn jacobian(&self, x: Vec3) -> Mat3 {
        let mut cols = [Vec3::ZERO; 3];
        for (i, col) in cols.iter_mut().enumerate() {
            let mut plus = x;
            let mut minus = x;
            plus[i] = (x[i] + JACOBIAN_STEP).min(1.0);
            minus[i] = (x[i] - JACOBIAN_STEP).max(0.0);
            let dx = plus[i] - minus[i];
            if dx > 0.0 {
                *col = (self.apply(plus) - self.apply(minus)) / dx;
            }
        }
        Mat3::from_cols(cols[0], cols[1], cols[2])
    }
}

/// Measure `inverse(lut(p))` against `p` over `samples` points spread
/// through the unit cube. Errors are Euclidean distances.
pub fn verify_inversion(lut: &Lut3D, inverse: &Lut3D, samples: usize) -> InversionReport {
    let errors: Vec<f32> = sample_points(samples)
        .map(|p| {
            let round_trip = Vec3::from_array(inverse.sample(lut.sample(p.to_array())));
            round_trip.distance(p)
        })
        .collect();
    if errors.is_empty() {
        return InversionReport {
            samples: 0,
            mean: 0.0,
            max: 0.0,
            min: 0.0,
        };
    }
    InversionReport {
        samples: errors.len(),
        mean: errors.iter().sum::<f32>() / errors.len() as f32,
        max: errors.iter().copied().fold(0.0, f32::max),
        min: errors.iter().copied().fold(f32::INFINITY, f32::min),
    }
}

/// Grid coordinates in R-fastest order.
fn grid_points(size: u32) -> impl Iterator<Item = [f32; 3]> {
    let n = size as usize;
    let scale = (n - 1) as f32;
    (0..n * n * n).map(move |i| {
        let r = i % n;
        let g = (i / n) % n;
        let b = i / (n * n);
        [r as f32 / scale, g as f32 / scale, b as f32 / scale]
    })
}

/// Additive-recurrence points in the unit cube; deterministic and evenly
/// spread.
fn sample_points(count: usize) -> impl Iterator<Item = Vec3> {
    // Generalized golden ratio for three dimensions.
    const PHI: f32 = 1.220_744_1;
    let step = Vec3::new(1.0 / PHI, 1.0 / (PHI * PHI), 1.0 / (PHI * PHI * PHI));
    (0..count).map(move |i| (Vec3::splat(0.5) + step * (i + 1) as f32).fract())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn gamma_lut(size: u32) -> Lut3D {
        let mut lut = Lut3D::identity(size).expect("valid size");
        for e in &mut lut.data {
            *e = e.map(|v| v * v);
        }
        lut
    }

    /// Each channel bends with its neighbour but keeps its cube faces.
    fn cross_channel_lut(size: u32) -> Lut3D {
        let mut lut = Lut3D::identity(size).expect("valid size");
        for e in &mut lut.data {
            let [r, g, b] = *e;
            *e = [
                r + 0.1 * r * (1.0 - r) * (2.0 * g - 1.0),
                g + 0.1 * g * (1.0 - g) * (2.0 * b - 1.0),
                b + 0.1 * b * (1.0 - b) * (2.0 * r - 1.0),
            ];
        }
        lut
    }

    #[test]
    fn test_resample_identity_stays_identity() {
        let lut = Lut3D::identity(9).expect("valid size");
        let resampled = lut.resample(17).expect("valid size");
        let expected = Lut3D::identity(17).expect("valid size");
        assert_eq!(resampled.size, 17);
        for (i, (a, b)) in resampled.data.iter().zip(&expected.data).enumerate() {
            for c in 0..3 {
                assert!((a[c] - b[c]).abs() < EPSILON, "entry {i} channel {c}: {a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_resample_rejects_bad_size() {
        let lut = Lut3D::identity(5).expect("valid size");
        assert!(matches!(lut.resample(1), Err(LutError::InvalidSize(_))));
    }

    #[test]
    fn test_invert_identity_is_identity() {
        let lut = Lut3D::identity(9).expect("valid size");
        let inverse = lut.invert(9).expect("inverts");
        for (i, (a, b)) in inverse.data.iter().zip(&lut.data).enumerate() {
            for c in 0..3 {
                assert!((a[c] - b[c]).abs() < EPSILON, "entry {i} channel {c}: {a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_invert_gamma_round_trips() {
        let lut = gamma_lut(9);
        let inverse = lut.invert(9).expect("inverts");
        for v in [0.0, 0.5, 0.6, 0.75, 0.9, 1.0] {
            let rgb = [v; 3];
            let back = inverse.sample(lut.sample(rgb));
            for c in 0..3 {
                assert!((back[c] - v).abs() < 0.02, "channel {c}: {v} came back as {}", back[c]);
            }
        }
        // Every grid point of the inverse maps back onto itself through the LUT.
        let scale = 8.0;
        for (i, x) in inverse.data.iter().enumerate() {
            let target = [
                (i % 9) as f32 / scale,
                ((i / 9) % 9) as f32 / scale,
                (i / 81) as f32 / scale,
            ];
            let hit = lut.sample(*x);
            for c in 0..3 {
                assert!((hit[c] - target[c]).abs() < 1e-3, "entry {i} channel {c}");
            }
        }
    }

    #[test]
    fn test_invert_cross_channel_lut() {
        let lut = cross_channel_lut(9);
        let inverse = lut.invert(17).expect("inverts");
        assert_eq!(inverse.size, 17);
        let report = verify_inversion(&lut, &inverse, 200);
        assert_eq!(report.samples, 200);
        assert!(report.max < 0.03, "max round-trip error {}", report.max);
        assert!(report.min <= report.mean && report.mean <= report.max);
    }

    #[test]
    fn test_verify_flags_a_wrong_inverse() {
        let lut = gamma_lut(9);
        let not_inverse = Lut3D::identity(9).expect("valid size");
        let report = verify_inversion(&lut, &not_inverse, 100);
        assert!(report.max > 0.1, "identity is not the inverse of a gamma LUT");
        assert_ne!(report.quality(), "excellent");
    }

    #[test]
    fn test_sample_points_stay_in_cube() {
        for p in sample_points(500) {
            assert!(p.cmpge(Vec3::ZERO).all() && p.cmplt(Vec3::ONE).all(), "{p}");
        }
    }
}
