use std::borrow::Cow;

use crate::reflect::{FULLSCREEN_ENTRY, VERTEX_ENTRY};

/// Fullscreen copy used by filtered blits and mip generation.
///
/// Internal to the backend: binds its source directly in group 0 instead of
/// following the program binding layout.
pub const BLIT_SHADER: &str = r#"
@group(0) @binding(0) var source: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv * vec2<f32>(2.0, -2.0) + vec2<f32>(-1.0, 1.0), 0.0, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSampleLevel(source, source_sampler, in.uv, 0.0);
}
"#;

/// Vertex stage shared by fullscreen programs that do not provide their own.
///
/// Appended to a program source when it only declares `fs_main`.
pub const FULLSCREEN_VERTEX: &str = r#"
struct FullscreenOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> FullscreenOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: FullscreenOutput;
    out.position = vec4<f32>(uv * vec2<f32>(2.0, -2.0) + vec2<f32>(-1.0, 1.0), 0.0, 1.0);
    out.uv = uv;
    return out;
}
"#;

/// Program source with [`FULLSCREEN_VERTEX`] appended when it declares no vertex entry point.
pub fn complete_source(source: &str) -> Cow<'_, str> {
    if source.contains(VERTEX_ENTRY) || source.contains(FULLSCREEN_ENTRY) {
        Cow::Borrowed(source)
    } else {
        Cow::Owned(format!("{source}\n{FULLSCREEN_VERTEX}"))
    }
}
