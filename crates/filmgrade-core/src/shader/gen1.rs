//! Gen1 dialect: flat `f32` uniforms, the LUT packed into a 2-D texture
//! and one `R32Float` texture per curve.
//!
//! LUT texel `(r, g, b)` sits at `(r + b * N, g)` of an `N² × N` texture;
//! sampling does the eight loads and the trilinear blend by hand.

pub const PARAMS_BINDING: u32 = 0;
pub const SOURCE_BINDING: u32 = 1;
pub const LUT_BINDING: u32 = 2;
pub const CURVE_MASTER_BINDING: u32 = 3;
pub const CURVE_RED_BINDING: u32 = 4;
pub const CURVE_GREEN_BINDING: u32 = 5;
pub const CURVE_BLUE_BINDING: u32 = 6;

/// Curve textures in binding order.
pub const CURVE_BINDINGS: [(u32, &str); 4] = [
    (CURVE_MASTER_BINDING, "curve_master_tex"),
    (CURVE_RED_BINDING, "curve_red_tex"),
    (CURVE_GREEN_BINDING, "curve_green_tex"),
    (CURVE_BLUE_BINDING, "curve_blue_tex"),
];

const SAMPLING: &str = r#"fn lut_texel(r: i32, g: i32, b: i32, n: i32) -> vec3<f32> {
    return textureLoad(lut_tex, vec2<i32>(r + b * n, g), 0).rgb;
}

fn sample_lut3d(c: vec3<f32>) -> vec3<f32> {
    let n = i32({{u:lut_size}});
    let p = c * f32(n - 1);
    let i0 = min(vec3<i32>(floor(p)), vec3<i32>(n - 2));
    let f = p - vec3<f32>(i0);
    let i1 = i0 + vec3<i32>(1);

    let c000 = lut_texel(i0.x, i0.y, i0.z, n);
    let c100 = lut_texel(i1.x, i0.y, i0.z, n);
    let c010 = lut_texel(i0.x, i1.y, i0.z, n);
    let c110 = lut_texel(i1.x, i1.y, i0.z, n);
    let c001 = lut_texel(i0.x, i0.y, i1.z, n);
    let c101 = lut_texel(i1.x, i0.y, i1.z, n);
    let c011 = lut_texel(i0.x, i1.y, i1.z, n);
    let c111 = lut_texel(i1.x, i1.y, i1.z, n);

    let c00 = mix(c000, c100, f.x);
    let c10 = mix(c010, c110, f.x);
    let c01 = mix(c001, c101, f.x);
    let c11 = mix(c011, c111, f.x);
    let c0 = mix(c00, c10, f.y);
    let c1 = mix(c01, c11, f.y);
    return mix(c0, c1, f.z);
}

fn curve_lookup(tex: texture_2d<f32>, v: f32) -> f32 {
    let x = clamp(v, 0.0, 1.0) * 255.0;
    let i = min(floor(x), 254.0);
    let a = textureLoad(tex, vec2<i32>(i32(i), 0), 0).r;
    let b = textureLoad(tex, vec2<i32>(i32(i) + 1, 0), 0).r;
    return mix(a, b, x - i);
}

fn curve_master(v: f32) -> f32 {
    return curve_lookup(curve_master_tex, v);
}

fn curve_red(v: f32) -> f32 {
    return curve_lookup(curve_red_tex, v);
}

fn curve_green(v: f32) -> f32 {
    return curve_lookup(curve_green_tex, v);
}

fn curve_blue(v: f32) -> f32 {
    return curve_lookup(curve_blue_tex, v);
}
"#;

/// Bindings and texture sampling, placed after the `Params` struct.
pub fn prelude() -> String {
    let mut out = format!(
        "@group(0) @binding({PARAMS_BINDING}) var<uniform> u: Params;\n\
         @group(0) @binding({SOURCE_BINDING}) var src_tex: texture_2d<f32>;\n\
         @group(0) @binding({LUT_BINDING}) var lut_tex: texture_2d<f32>;\n"
    );
    for (binding, name) in CURVE_BINDINGS {
        out.push_str(&format!(
            "@group(0) @binding({binding}) var {name}: texture_2d<f32>;\n"
        ));
    }
    out.push('\n');
    out.push_str(SAMPLING);
    out
}
