//! Gen2 dialect: `vec4` uniform slots, a native 3-D LUT texture read with
//! hardware filtering and one RGBA curve texture holding all four curves.

pub const PARAMS_BINDING: u32 = 0;
pub const SOURCE_BINDING: u32 = 1;
pub const LUT_BINDING: u32 = 2;
pub const LUT_SAMPLER_BINDING: u32 = 3;
pub const CURVE_BINDING: u32 = 4;

const SAMPLING: &str = r#"fn sample_lut3d(c: vec3<f32>) -> vec3<f32> {
    let size = {{u:lut_size}};
    let uvw = (c * (size - 1.0) + vec3<f32>(0.5)) / size;
    return textureSampleLevel(lut_tex, lut_sampler, uvw, 0.0).rgb;
}

fn curve_texels(v: f32) -> vec4<f32> {
    let x = clamp(v, 0.0, 1.0) * 255.0;
    let i = min(floor(x), 254.0);
    let a = textureLoad(curve_tex, vec2<i32>(i32(i), 0), 0);
    let b = textureLoad(curve_tex, vec2<i32>(i32(i) + 1, 0), 0);
    return mix(a, b, x - i);
}

fn curve_master(v: f32) -> f32 {
    return curve_texels(v).r;
}

fn curve_red(v: f32) -> f32 {
    return curve_texels(v).g;
}

fn curve_green(v: f32) -> f32 {
    return curve_texels(v).b;
}

fn curve_blue(v: f32) -> f32 {
    return curve_texels(v).a;
}
"#;

/// Bindings and texture sampling, placed after the `Params` struct.
pub fn prelude() -> String {
    let mut out = format!(
        "@group(0) @binding({PARAMS_BINDING}) var<uniform> u: Params;\n\
         @group(0) @binding({SOURCE_BINDING}) var src_tex: texture_2d<f32>;\n\
         @group(0) @binding({LUT_BINDING}) var lut_tex: texture_3d<f32>;\n\
         @group(0) @binding({LUT_SAMPLER_BINDING}) var lut_sampler: sampler;\n\
         @group(0) @binding({CURVE_BINDING}) var curve_tex: texture_2d<f32>;\n"
    );
    out.push('\n');
    out.push_str(SAMPLING);
    out
}
