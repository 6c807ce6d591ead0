//! Monotone cubic curve evaluation and 256-entry LUT baking.
//!
//! Control points arrive in `[0, 255]` and are normalized to `[0, 1]`. The
//! curve is a cubic Hermite spline whose tangents are limited with the
//! Fritsch–Carlson rule, so monotone control points always give a monotone
//! curve (no overshoot between points).
//!
//! # Algorithm
//! For secants `d_k = (y_{k+1} - y_k) / (x_{k+1} - x_k)`:
//! ```text
//! m_0 = d_0, m_{n-1} = d_{n-2}
//! m_k = 0                      if d_{k-1} · d_k <= 0
//! m_k = (d_{k-1} + d_k) / 2    otherwise
//! ```
//! then for each segment with `a = m_k / d_k`, `b = m_{k+1} / d_k`, when
//! `a² + b² > 9` both tangents are scaled by `3 / sqrt(a² + b²)`.
//!
//! # Complexity
//! - Evaluate: O(log N) binary search + O(1) interpolation
//! - Bake: O(256 log N)

use crate::params::ToneCurve;

/// Entries per baked curve.
pub const CURVE_SIZE: usize = 256;

/// Evaluates a monotone cubic spline through normalized control points.
///
/// Points are sorted by x with duplicate x collapsed to the last point
/// given. Fewer than two distinct points evaluate as identity.
#[derive(Debug, Clone)]
pub struct MonotoneCurve {
    xs: Vec<f32>,
    ys: Vec<f32>,
    tangents: Vec<f32>,
}

impl MonotoneCurve {
    /// Build from `[x, y]` control points in `[0, 255]`.
    pub fn from_points(points: &[[f32; 2]]) -> Self {
        let mut sorted: Vec<[f32; 2]> = points
            .iter()
            .map(|p| [p[0] / 255.0, p[1] / 255.0])
            .collect();
        // Stable sort keeps input order among equal x, so "last wins" holds.
        sorted.sort_by(|a, b| a[0].total_cmp(&b[0]));

        let mut xs: Vec<f32> = Vec::with_capacity(sorted.len());
        let mut ys: Vec<f32> = Vec::with_capacity(sorted.len());
        for [x, y] in sorted {
            if xs.last() == Some(&x) {
                if let Some(last) = ys.last_mut() {
                    *last = y;
                }
            } else {
                xs.push(x);
                ys.push(y);
            }
        }

        let tangents = fritsch_carlson_tangents(&xs, &ys);
        Self { xs, ys, tangents }
    }

    /// True when there are not enough points to define a curve.
    pub fn is_degenerate(&self) -> bool {
        self.xs.len() < 2
    }

    /// Evaluate at normalized `t`, flat outside the first/last point.
    pub fn evaluate(&self, t: f32) -> f32 {
        if self.is_degenerate() {
            return t;
        }
        let n = self.xs.len();
        if t <= self.xs[0] {
            return self.ys[0];
        }
        if t >= self.xs[n - 1] {
            return self.ys[n - 1];
        }

        // Binary search for the segment containing t
        let mut lo = 0;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.xs[mid] <= t {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let h = self.xs[hi] - self.xs[lo];
        let s = (t - self.xs[lo]) / h;
        hermite(
            self.ys[lo],
            self.ys[hi],
            self.tangents[lo] * h,
            self.tangents[hi] * h,
            s,
        )
    }
}

fn fritsch_carlson_tangents(xs: &[f32], ys: &[f32]) -> Vec<f32> {
    let n = xs.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let secants: Vec<f32> = (0..n - 1)
        .map(|k| (ys[k + 1] - ys[k]) / (xs[k + 1] - xs[k]))
        .collect();

    let mut m = vec![0.0_f32; n];
    m[0] = secants[0];
    m[n - 1] = secants[n - 2];
    for k in 1..n - 1 {
        let (d0, d1) = (secants[k - 1], secants[k]);
        m[k] = if d0 * d1 <= 0.0 { 0.0 } else { 0.5 * (d0 + d1) };
    }

    for k in 0..n - 1 {
        let d = secants[k];
        if d == 0.0 {
            m[k] = 0.0;
            m[k + 1] = 0.0;
            continue;
        }
        let a = m[k] / d;
        let b = m[k + 1] / d;
        let s = a * a + b * b;
        if s > 9.0 {
            let tau = 3.0 / s.sqrt();
            m[k] = tau * a * d;
            m[k + 1] = tau * b * d;
        }
    }
    m
}

/// Cubic Hermite basis on the unit interval with tangents pre-scaled by
/// the segment width.
fn hermite(p0: f32, p1: f32, m0: f32, m1: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    (2.0 * t3 - 3.0 * t2 + 1.0) * p0
        + (t3 - 2.0 * t2 + t) * m0
        + (-2.0 * t3 + 3.0 * t2) * p1
        + (t3 - t2) * m1
}

/// Dense 256-entry transfer function in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveLut {
    table: [f32; CURVE_SIZE],
}

impl CurveLut {
    pub fn identity() -> Self {
        let mut table = [0.0; CURVE_SIZE];
        for (i, v) in table.iter_mut().enumerate() {
            *v = i as f32 / (CURVE_SIZE - 1) as f32;
        }
        Self { table }
    }

    /// Bake control points in `[0, 255]`.
    pub fn from_points(points: &[[f32; 2]]) -> Self {
        let curve = MonotoneCurve::from_points(points);
        if curve.is_degenerate() {
            return Self::identity();
        }
        let mut table = [0.0; CURVE_SIZE];
        for (i, v) in table.iter_mut().enumerate() {
            let t = i as f32 / (CURVE_SIZE - 1) as f32;
            *v = curve.evaluate(t).clamp(0.0, 1.0);
        }
        Self { table }
    }

    pub fn table(&self) -> &[f32; CURVE_SIZE] {
        &self.table
    }

    /// True when every entry equals its index within `1e-6`.
    pub fn is_identity(&self) -> bool {
        self.table
            .iter()
            .enumerate()
            .all(|(i, v)| (v - i as f32 / (CURVE_SIZE - 1) as f32).abs() < 1e-6)
    }

    /// Linear interpolation between neighbouring entries at `v · 255`.
    #[inline]
    pub fn lookup(&self, v: f32) -> f32 {
        lerp_table(&self.table, v)
    }
}

/// Shared lookup rule for every curve table, reference or emulated.
#[inline]
pub fn lerp_table(table: &[f32; CURVE_SIZE], v: f32) -> f32 {
    let x = v.clamp(0.0, 1.0) * (CURVE_SIZE - 1) as f32;
    let i0 = x.floor().min((CURVE_SIZE - 2) as f32);
    let f = x - i0;
    let i0 = i0 as usize;
    table[i0] + (table[i0 + 1] - table[i0]) * f
}

/// The four baked tone curves plus whether any of them does anything.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveSet {
    pub master: CurveLut,
    pub red: CurveLut,
    pub green: CurveLut,
    pub blue: CurveLut,
}

impl CurveSet {
    pub fn identity() -> Self {
        Self {
            master: CurveLut::identity(),
            red: CurveLut::identity(),
            green: CurveLut::identity(),
            blue: CurveLut::identity(),
        }
    }

    pub fn from_tone_curve(curve: &ToneCurve) -> Self {
        Self {
            master: CurveLut::from_points(&curve.rgb),
            red: CurveLut::from_points(&curve.red),
            green: CurveLut::from_points(&curve.green),
            blue: CurveLut::from_points(&curve.blue),
        }
    }

    /// Gate for the tone-curve stage.
    pub fn is_active(&self) -> bool {
        !(self.master.is_identity()
            && self.red.is_identity()
            && self.green.is_identity()
            && self.blue.is_identity())
    }

    /// Curves in master, red, green, blue order.
    pub fn tables(&self) -> [&[f32; CURVE_SIZE]; 4] {
        [
            self.master.table(),
            self.red.table(),
            self.green.table(),
            self.blue.table(),
        ]
    }
}

impl Default for CurveSet {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_fewer_than_two_points_is_identity() {
        assert!(CurveLut::from_points(&[]).is_identity());
        assert!(CurveLut::from_points(&[[128.0, 40.0]]).is_identity());
        // Two points at the same x collapse to one.
        assert!(CurveLut::from_points(&[[10.0, 0.0], [10.0, 255.0]]).is_identity());
    }

    #[test]
    fn test_diagonal_points_are_identity() {
        let lut = CurveLut::from_points(&[[0.0, 0.0], [128.0, 128.0], [255.0, 255.0]]);
        assert!(lut.is_identity());
    }

    #[test]
    fn test_passes_through_control_points() {
        let curve = MonotoneCurve::from_points(&[[0.0, 0.0], [64.0, 100.0], [255.0, 255.0]]);
        assert!((curve.evaluate(64.0 / 255.0) - 100.0 / 255.0).abs() < EPSILON);
    }

    #[test]
    fn test_increasing_points_give_monotone_table() {
        let lut = CurveLut::from_points(&[
            [0.0, 0.0],
            [40.0, 90.0],
            [60.0, 95.0],
            [200.0, 200.0],
            [255.0, 255.0],
        ]);
        for (i, pair) in lut.table().windows(2).enumerate() {
            assert!(pair[1] >= pair[0], "entry {i}: {} > {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_flat_outside_endpoints() {
        let lut = CurveLut::from_points(&[[50.0, 30.0], [200.0, 220.0]]);
        assert!((lut.table()[0] - 30.0 / 255.0).abs() < EPSILON);
        assert!((lut.table()[20] - 30.0 / 255.0).abs() < EPSILON);
        assert!((lut.table()[255] - 220.0 / 255.0).abs() < EPSILON);
    }

    #[test]
    fn test_unsorted_and_duplicate_points() {
        let sorted = CurveLut::from_points(&[[0.0, 0.0], [128.0, 160.0], [255.0, 255.0]]);
        let messy = CurveLut::from_points(&[
            [255.0, 255.0],
            [128.0, 10.0],
            [0.0, 0.0],
            [128.0, 160.0],
        ]);
        assert_eq!(sorted, messy);
    }

    #[test]
    fn test_lookup_interpolates_between_entries() {
        let lut = CurveLut::from_points(&[[0.0, 0.0], [255.0, 127.5]]);
        let v = 100.5 / 255.0;
        let expected = 0.5 * (lut.table()[100] + lut.table()[101]);
        assert!((lut.lookup(v) - expected).abs() < EPSILON);
        assert_eq!(lut.lookup(1.0), lut.table()[255]);
        assert_eq!(lut.lookup(-1.0), lut.table()[0]);
    }

    #[test]
    fn test_curve_set_gate() {
        assert!(!CurveSet::from_tone_curve(&ToneCurve::default()).is_active());
        let curve = ToneCurve {
            blue: vec![[0.0, 20.0], [255.0, 255.0]],
            ..ToneCurve::default()
        };
        assert!(CurveSet::from_tone_curve(&curve).is_active());
    }
}
