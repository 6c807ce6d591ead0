//! Stage fragments shared by both dialects.
//!
//! Each fragment is WGSL template text mirroring the matching function in
//! [`crate::stages`]. Dialect differences live behind `sample_lut3d`,
//! `curve_*` and the uniform placeholders.

use std::fmt::Write as _;

use super::template::{gate_ref, uniform_ref};
use crate::stages::color::{HSL_BAND_CENTERS, HSL_BAND_HALF_RANGES};
use crate::stages::tone::{CONTRAST_PIVOT, ROLLOFF_KNEE, ROLLOFF_THRESHOLD};
use crate::stages::{LOG2_10, LOG10_2, LUMA, Stage};
use crate::uniforms::HSL_BAND_FIELDS;

/// Module-scope constants, printed from the values the CPU stages use.
pub fn stage_constants() -> String {
    let mut out = String::new();
    let scalars = [
        ("LOG10_2", LOG10_2),
        ("LOG2_10", LOG2_10),
        ("PI", std::f32::consts::PI),
        ("CONTRAST_PIVOT", CONTRAST_PIVOT),
        ("ROLLOFF_THRESHOLD", ROLLOFF_THRESHOLD),
        ("ROLLOFF_KNEE", ROLLOFF_KNEE),
    ];
    for (name, value) in scalars {
        let _ = writeln!(out, "const {name}: f32 = {value:?};");
    }
    let _ = writeln!(
        out,
        "const LUMA: vec3<f32> = vec3<f32>({:?}, {:?}, {:?});",
        LUMA.x, LUMA.y, LUMA.z
    );
    out
}

/// Constants plus the color helpers used by the stage functions.
pub fn common_prelude() -> String {
    let mut out = stage_constants();
    out.push('\n');
    out.push_str(HELPERS);
    out
}

const HELPERS: &str = r#"fn density(t: f32) -> f32 {
    return -log2(t) * LOG10_2;
}

fn transmittance(d: f32) -> f32 {
    return exp2(-d * LOG2_10);
}

fn luma(c: vec3<f32>) -> f32 {
    return dot(c, LUMA);
}

fn smooth_step(e0: f32, e1: f32, x: f32) -> f32 {
    let t = clamp((x - e0) / (e1 - e0), 0.0, 1.0);
    return t * t * (3.0 - 2.0 * t);
}

fn clamp01(c: vec3<f32>) -> vec3<f32> {
    return clamp(c, vec3<f32>(0.0), vec3<f32>(1.0));
}

fn wrap_hue(h: f32) -> f32 {
    return h - 360.0 * floor(h / 360.0);
}

fn rgb_to_hsl(c: vec3<f32>) -> vec3<f32> {
    let mx = max(c.x, max(c.y, c.z));
    let mn = min(c.x, min(c.y, c.z));
    let l = (mx + mn) * 0.5;
    let delta = mx - mn;
    if delta < 1e-6 {
        return vec3<f32>(0.0, 0.0, l);
    }
    var s: f32;
    if l > 0.5 {
        s = delta / max(2.0 - mx - mn, 1e-6);
    } else {
        s = delta / max(mx + mn, 1e-6);
    }
    var h: f32;
    if mx == c.x {
        h = (c.y - c.z) / delta;
    } else if mx == c.y {
        h = (c.z - c.x) / delta + 2.0;
    } else {
        h = (c.x - c.y) / delta + 4.0;
    }
    if h < 0.0 {
        h = h + 6.0;
    }
    return vec3<f32>(h * 60.0, s, l);
}

fn hue_to_channel(p: f32, q: f32, t_in: f32) -> f32 {
    var t = t_in;
    if t < 0.0 {
        t = t + 1.0;
    }
    if t > 1.0 {
        t = t - 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 0.5 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    return p;
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> vec3<f32> {
    if s <= 0.0 {
        return vec3<f32>(l);
    }
    var q: f32;
    if l < 0.5 {
        q = l * (1.0 + s);
    } else {
        q = l + s - l * s;
    }
    let p = 2.0 * l - q;
    let t = h / 360.0;
    return vec3<f32>(
        hue_to_channel(p, q, t + 1.0 / 3.0),
        hue_to_channel(p, q, t),
        hue_to_channel(p, q, t - 1.0 / 3.0),
    );
}

fn band_weight(h: f32, center: f32, half_range: f32) -> f32 {
    let d = abs(h - center);
    let dist = min(d, 360.0 - d);
    if dist < half_range {
        return 0.5 * (1.0 + cos(PI * dist / half_range));
    }
    return 0.0;
}
"#;

const FILM_CURVE: &str = r#"fn film_channel(v: f32, gamma: f32) -> f32 {
    let t = max(v, 0.001);
    let d = density(t);
    let dn = clamp((d - {{u:film_dmin}}) / {{u:film_drange}}, 0.0, 1.0);
    var y = pow(max(dn, 1e-6), gamma);
    if {{u:film_toe}} > 0.0 {
        let k = {{u:film_toe}};
        y = y * y * (1.0 + k) / (y + k);
    }
    if {{u:film_shoulder}} > 0.0 {
        let k = {{u:film_shoulder}};
        let s = 1.0 - y;
        y = 1.0 - s * s * (1.0 + k) / (s + k);
    }
    return transmittance({{u:film_dmin}} + y * {{u:film_drange}});
}

@@MARKER@@
fn @@NAME@@(c: vec3<f32>) -> vec3<f32> {
    if !{{gate:film_curve_enabled}} {
        return c;
    }
    let gamma = {{u:film_gamma}};
    return clamp01(vec3<f32>(
        film_channel(c.x, gamma.x),
        film_channel(c.y, gamma.y),
        film_channel(c.z, gamma.z),
    ));
}
"#;

const BASE_CORRECTION: &str = r#"@@MARKER@@
fn @@NAME@@(c: vec3<f32>) -> vec3<f32> {
    if !{{gate:base_enabled}} {
        return c;
    }
    if {{gate:base_density_mode}} {
        let dens = {{u:base_densities}};
        return clamp01(vec3<f32>(
            transmittance(density(max(c.x, 1e-6)) - dens.x),
            transmittance(density(max(c.y, 1e-6)) - dens.y),
            transmittance(density(max(c.z, 1e-6)) - dens.z),
        ));
    }
    return clamp01(c * {{u:base_gains}});
}
"#;

const DENSITY_LEVELS: &str = r#"fn levels_channel(v: f32, lo: f32, range: f32, out_range: f32) -> f32 {
    if range > 0.001 {
        let d = density(max(v, 1e-6));
        return transmittance((d - lo) / range * out_range);
    }
    return v;
}

@@MARKER@@
fn @@NAME@@(c: vec3<f32>) -> vec3<f32> {
    if !{{gate:levels_enabled}} {
        return c;
    }
    let lo = {{u:levels_min}};
    let range = {{u:levels_range}};
    let out_range = {{u:levels_output_range}};
    return clamp01(vec3<f32>(
        levels_channel(c.x, lo.x, range.x, out_range),
        levels_channel(c.y, lo.y, range.y, out_range),
        levels_channel(c.z, lo.z, range.z, out_range),
    ));
}
"#;

const INVERSION: &str = r#"@@MARKER@@
fn @@NAME@@(c: vec3<f32>) -> vec3<f32> {
    if !{{gate:inversion_enabled}} {
        return c;
    }
    if {{gate:inversion_log}} {
        return clamp01(vec3<f32>(1.0) - log2(c * 255.0 + vec3<f32>(1.0)) / 8.0);
    }
    return clamp01(vec3<f32>(1.0) - c);
}
"#;

const LUT3D: &str = r#"@@MARKER@@
fn @@NAME@@(c: vec3<f32>) -> vec3<f32> {
    if !{{gate:lut_enabled}} {
        return c;
    }
    let sampled = sample_lut3d(clamp01(c));
    return clamp01(mix(c, sampled, {{u:lut_intensity}}));
}
"#;

const WHITE_BALANCE: &str = r#"@@MARKER@@
fn @@NAME@@(c: vec3<f32>) -> vec3<f32> {
    if !{{gate:wb_enabled}} {
        return c;
    }
    return c * {{u:wb_gains}};
}
"#;

const EXPOSURE: &str = r#"@@MARKER@@
fn @@NAME@@(c: vec3<f32>) -> vec3<f32> {
    if !{{gate:exposure_enabled}} {
        return c;
    }
    return c * {{u:exposure_gain}};
}
"#;

const CONTRAST: &str = r#"@@MARKER@@
fn @@NAME@@(c: vec3<f32>) -> vec3<f32> {
    if !{{gate:contrast_enabled}} {
        return c;
    }
    return (c - vec3<f32>(CONTRAST_PIVOT)) * {{u:contrast_factor}} + vec3<f32>(CONTRAST_PIVOT);
}
"#;

const WHITES_BLACKS: &str = r#"@@MARKER@@
fn @@NAME@@(c: vec3<f32>) -> vec3<f32> {
    if !{{gate:white_black_enabled}} {
        return c;
    }
    let span = max({{u:white_point}} - {{u:black_point}}, 1e-4);
    return (c - vec3<f32>({{u:black_point}})) / span;
}
"#;

const SHADOWS_HIGHLIGHTS: &str = r#"@@MARKER@@
fn @@NAME@@(c: vec3<f32>) -> vec3<f32> {
    if !{{gate:shadows_highlights_enabled}} {
        return c;
    }
    let x = clamp01(c);
    let inv = vec3<f32>(1.0) - x;
    return c + {{u:shadow_factor}} * inv * inv * x * 4.0 + {{u:highlight_factor}} * x * x * inv * 4.0;
}
"#;

const HIGHLIGHT_ROLLOFF: &str = r#"@@MARKER@@
fn @@NAME@@(c: vec3<f32>) -> vec3<f32> {
    if !{{gate:rolloff_enabled}} {
        return c;
    }
    let m = max(c.x, max(c.y, c.z));
    var res = c;
    if m > ROLLOFF_THRESHOLD {
        let compressed = ROLLOFF_THRESHOLD + ROLLOFF_KNEE * tanh((m - ROLLOFF_THRESHOLD) / ROLLOFF_KNEE);
        res = c * (compressed / m);
    }
    return clamp01(res);
}
"#;

const TONE_CURVE: &str = r#"@@MARKER@@
fn @@NAME@@(c: vec3<f32>) -> vec3<f32> {
    if !{{gate:tone_curve_enabled}} {
        return c;
    }
    let m = vec3<f32>(curve_master(c.x), curve_master(c.y), curve_master(c.z));
    return clamp01(vec3<f32>(curve_red(m.x), curve_green(m.y), curve_blue(m.z)));
}
"#;

const SATURATION: &str = r#"@@MARKER@@
fn @@NAME@@(c: vec3<f32>) -> vec3<f32> {
    if !{{gate:saturation_enabled}} {
        return c;
    }
    let y = vec3<f32>(luma(c));
    return clamp01(y + (c - y) * (1.0 + {{u:saturation}}));
}
"#;

const SPLIT_TONE: &str = r#"fn tint_zone(c: vec3<f32>, lum: f32, hue: f32, amount: f32) -> vec3<f32> {
    if amount <= 0.0 {
        return c;
    }
    let tint = hsl_to_rgb(hue * 360.0, 1.0, 0.5);
    let goal = clamp01(vec3<f32>(lum) + (tint - vec3<f32>(luma(tint))));
    return mix(c, goal, amount);
}

@@MARKER@@
fn @@NAME@@(c: vec3<f32>) -> vec3<f32> {
    if !{{gate:split_enabled}} {
        return c;
    }
    let l = luma(c);
    let shift = {{u:split_balance}} * 0.5;
    let ws = 1.0 - smooth_step(shift, 0.5 + shift, l);
    let wh = smooth_step(0.5 + shift, 1.0 + shift, l);
    let wm = max(1.0 - ws - wh, 0.0);
    var res = c;
    res = tint_zone(res, l, {{u:split_shadow_hue}}, ws * {{u:split_shadow_sat}});
    res = tint_zone(res, l, {{u:split_midtone_hue}}, wm * {{u:split_midtone_sat}});
    res = tint_zone(res, l, {{u:split_highlight_hue}}, wh * {{u:split_highlight_sat}});
    return clamp01(res);
}
"#;

/// HSL stage with the band loop unrolled into literal constants.
fn hsl_fragment() -> String {
    let mut body = String::from("@@MARKER@@\nfn @@NAME@@(c: vec3<f32>) -> vec3<f32> {\n");
    let _ = writeln!(body, "    if !{} {{\n        return c;\n    }}", gate_ref("hsl_enabled"));
    body.push_str("    let hsl = rgb_to_hsl(c);\n");
    body.push_str("    var w: f32;\n    var dh: f32 = 0.0;\n    var ds: f32 = 0.0;\n    var dl: f32 = 0.0;\n");
    for (i, name) in HSL_BAND_FIELDS.iter().enumerate() {
        let _ = writeln!(body, "    let band{i} = {};", uniform_ref(name));
        let _ = writeln!(
            body,
            "    w = band_weight(hsl.x, {:.1}, {:.1});",
            HSL_BAND_CENTERS[i], HSL_BAND_HALF_RANGES[i]
        );
        let _ = writeln!(body, "    dh = dh + w * band{i}.x;");
        let _ = writeln!(body, "    ds = ds + w * band{i}.y;");
        let _ = writeln!(body, "    dl = dl + w * band{i}.z;");
    }
    body.push_str(
        "    let h2 = wrap_hue(hsl.x + dh);\n    \
         let s2 = clamp(hsl.y * (1.0 + ds), 0.0, 1.0);\n    \
         let l2 = clamp(hsl.z + dl * 0.5 * hsl.y, 0.0, 1.0);\n    \
         return clamp01(hsl_to_rgb(h2, s2, l2));\n}\n",
    );
    body
}

/// Template text of one stage: helpers, marker line and `stage_NN_name`.
pub fn stage_fragment(stage: Stage) -> String {
    let text = match stage {
        Stage::FilmCurve => FILM_CURVE.to_string(),
        Stage::BaseCorrection => BASE_CORRECTION.to_string(),
        Stage::DensityLevels => DENSITY_LEVELS.to_string(),
        Stage::Inversion => INVERSION.to_string(),
        Stage::Lut3d => LUT3D.to_string(),
        Stage::WhiteBalance => WHITE_BALANCE.to_string(),
        Stage::Exposure => EXPOSURE.to_string(),
        Stage::Contrast => CONTRAST.to_string(),
        Stage::WhitesBlacks => WHITES_BLACKS.to_string(),
        Stage::ShadowsHighlights => SHADOWS_HIGHLIGHTS.to_string(),
        Stage::HighlightRolloff => HIGHLIGHT_ROLLOFF.to_string(),
        Stage::ToneCurve => TONE_CURVE.to_string(),
        Stage::Hsl => hsl_fragment(),
        Stage::Saturation => SATURATION.to_string(),
        Stage::SplitTone => SPLIT_TONE.to_string(),
    };
    text.replace("@@MARKER@@", &stage.marker())
        .replace("@@NAME@@", &stage.function_name())
}

/// Full-screen triangle vertex stage and the fragment entry calling every
/// stage in order.
pub fn entry_points() -> String {
    let mut out = String::from(
        r#"@vertex
fn vs_main(@builtin(vertex_index) vid: u32) -> @builtin(position) vec4<f32> {
    let x = f32((vid << 1u) & 2u) * 2.0 - 1.0;
    let y = f32(vid & 2u) * 2.0 - 1.0;
    return vec4<f32>(x, y, 0.0, 1.0);
}

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    var c = textureLoad(src_tex, vec2<i32>(pos.xy), 0).rgb;
"#,
    );
    for stage in Stage::ALL {
        let _ = writeln!(out, "    c = {}(c);", stage.function_name());
    }
    out.push_str("    return vec4<f32>(c, 1.0);\n}\n");
    out
}
