//! Translation from backend-agnostic descriptors to wgpu types.

use tidewater_common::{Filter, Layout, TextureShape, Wrap};
use tidewater_render::{DepthFunc, Faces, PipelineState};

/// wgpu has no packed three-channel formats: those are widened to four.
pub fn texture_format(layout: Layout) -> wgpu::TextureFormat {
    use wgpu::TextureFormat as F;
    match layout {
        Layout::R8 => F::R8Unorm,
        Layout::R32F => F::R32Float,
        Layout::RG32F => F::Rg32Float,
        Layout::RGB8 => F::Rgba8Unorm,
        Layout::SRGB8 | Layout::SRGB8Alpha8 => F::Rgba8UnormSrgb,
        Layout::RGB16F | Layout::RGBA16F => F::Rgba16Float,
        Layout::RGB32F | Layout::RGBA32F => F::Rgba32Float,
        Layout::Depth32F => F::Depth32Float,
    }
}

/// Channels actually stored on the GPU.
fn stored_channels(layout: Layout) -> u32 {
    match layout.channels() {
        3 => 4,
        n => n,
    }
}

/// Bytes per texel as stored on the GPU.
pub fn stored_bytes_per_pixel(layout: Layout) -> u32 {
    stored_channels(layout) * layout.channel_bytes()
}

/// Widens tightly packed RGB data to RGBA with an opaque alpha.
///
/// Layouts that are stored as-is are returned borrowed.
pub fn widen_pixels(layout: Layout, data: &[u8]) -> std::borrow::Cow<'_, [u8]> {
    if layout.channels() != 3 {
        return std::borrow::Cow::Borrowed(data);
    }
    let channel = layout.channel_bytes() as usize;
    let opaque: &[u8] = match channel {
        1 => &[0xff],
        2 => &[0x00, 0x3c],
        _ => &[0x00, 0x00, 0x80, 0x3f],
    };
    let texel = channel * 3;
    let mut out = Vec::with_capacity(data.len() / 3 * 4);
    for rgb in data.chunks_exact(texel) {
        out.extend_from_slice(rgb);
        out.extend_from_slice(opaque);
    }
    std::borrow::Cow::Owned(out)
}

pub fn view_dimension(shape: TextureShape) -> wgpu::TextureViewDimension {
    match shape {
        TextureShape::D2 => wgpu::TextureViewDimension::D2,
        TextureShape::Cube => wgpu::TextureViewDimension::Cube,
    }
}

/// Number of mip levels for a texture of this size.
pub fn mip_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

pub fn sampler_descriptor(filter: Filter, wrap: Wrap) -> wgpu::SamplerDescriptor<'static> {
    use wgpu::FilterMode::{Linear, Nearest};
    let (texel, mip) = match filter {
        Filter::Nearest | Filter::NearestNearest => (Nearest, Nearest),
        Filter::Linear | Filter::LinearNearest => (Linear, Nearest),
        Filter::NearestLinear => (Nearest, Linear),
        Filter::LinearLinear => (Linear, Linear),
    };
    let address = match wrap {
        Wrap::Clamp => wgpu::AddressMode::ClampToEdge,
        Wrap::Repeat => wgpu::AddressMode::Repeat,
        Wrap::Mirror => wgpu::AddressMode::MirrorRepeat,
    };
    wgpu::SamplerDescriptor {
        label: Some("tidewater_sampler"),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: texel,
        min_filter: texel,
        mipmap_filter: mip,
        ..Default::default()
    }
}

pub fn compare_function(func: DepthFunc) -> wgpu::CompareFunction {
    use wgpu::CompareFunction as C;
    match func {
        DepthFunc::Never => C::Never,
        DepthFunc::Less => C::Less,
        DepthFunc::Equal => C::Equal,
        DepthFunc::LessEqual => C::LessEqual,
        DepthFunc::Greater => C::Greater,
        DepthFunc::NotEqual => C::NotEqual,
        DepthFunc::GreaterEqual => C::GreaterEqual,
        DepthFunc::Always => C::Always,
    }
}

/// Depth-stencil state for a target with a depth attachment.
///
/// A disabled depth test never writes either.
pub fn depth_stencil(state: &PipelineState, format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
    let (compare, write) = if state.depth.test {
        (compare_function(state.depth.func), state.depth.write)
    } else {
        (wgpu::CompareFunction::Always, false)
    };
    wgpu::DepthStencilState {
        format,
        depth_write_enabled: write,
        depth_compare: compare,
        stencil: Default::default(),
        bias: Default::default(),
    }
}

/// Culling of both face sets has no wgpu equivalent and is returned as `None`;
/// callers skip those draws.
pub fn cull_mode(cull: Option<Faces>) -> Option<Option<wgpu::Face>> {
    match cull {
        None => Some(None),
        Some(Faces::Front) => Some(Some(wgpu::Face::Front)),
        Some(Faces::Back) => Some(Some(wgpu::Face::Back)),
        Some(Faces::All) => None,
    }
}

pub fn polygon_mode(mode: tidewater_render::PolygonMode) -> wgpu::PolygonMode {
    match mode {
        tidewater_render::PolygonMode::Fill => wgpu::PolygonMode::Fill,
        tidewater_render::PolygonMode::Line => wgpu::PolygonMode::Line,
        tidewater_render::PolygonMode::Point => wgpu::PolygonMode::Point,
    }
}

pub fn blend_state(blend: bool) -> Option<wgpu::BlendState> {
    blend.then_some(wgpu::BlendState::ALPHA_BLENDING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewater_render::PolygonMode;

    #[test]
    fn rgb_layouts_are_widened() {
        assert_eq!(texture_format(Layout::RGB32F), wgpu::TextureFormat::Rgba32Float);
        assert_eq!(stored_bytes_per_pixel(Layout::RGB32F), 16);
        assert_eq!(stored_bytes_per_pixel(Layout::R8), 1);
        assert_eq!(stored_bytes_per_pixel(Layout::RGB16F), 8);
    }

    #[test]
    fn widen_adds_opaque_alpha() {
        let out = widen_pixels(Layout::RGB8, &[1, 2, 3, 4, 5, 6]);
        assert_eq!(&*out, &[1, 2, 3, 255, 4, 5, 6, 255]);

        let rgb: Vec<u8> = bytemuck::cast_slice(&[0.5f32, 0.25, 0.125]).to_vec();
        let out = widen_pixels(Layout::RGB32F, &rgb);
        let floats: &[f32] = bytemuck::cast_slice(&out);
        assert_eq!(floats, &[0.5, 0.25, 0.125, 1.0]);
    }

    #[test]
    fn rgba_data_is_borrowed() {
        let data = [0u8; 8];
        assert!(matches!(
            widen_pixels(Layout::SRGB8Alpha8, &data),
            std::borrow::Cow::Borrowed(_)
        ));
    }

    #[test]
    fn mip_counts() {
        assert_eq!(mip_count(1, 1), 1);
        assert_eq!(mip_count(512, 512), 10);
        assert_eq!(mip_count(300, 20), 9);
    }

    #[test]
    fn disabled_depth_test_never_writes() {
        let state = PipelineState::opaque().with_depth_test(false);
        let ds = depth_stencil(&state, wgpu::TextureFormat::Depth32Float);
        assert!(!ds.depth_write_enabled);
        assert_eq!(ds.depth_compare, wgpu::CompareFunction::Always);

        let ds = depth_stencil(&PipelineState::opaque(), wgpu::TextureFormat::Depth32Float);
        assert!(ds.depth_write_enabled);
        assert_eq!(ds.depth_compare, wgpu::CompareFunction::Less);
    }

    #[test]
    fn culling_both_faces_is_unsupported() {
        assert_eq!(cull_mode(Some(Faces::Back)), Some(Some(wgpu::Face::Back)));
        assert_eq!(cull_mode(None), Some(None));
        assert_eq!(cull_mode(Some(Faces::All)), None);
        assert_eq!(polygon_mode(PolygonMode::Line), wgpu::PolygonMode::Line);
    }

    #[test]
    fn sampler_filters() {
        let s = sampler_descriptor(Filter::LinearNearest, Wrap::Repeat);
        assert_eq!(s.mag_filter, wgpu::FilterMode::Linear);
        assert_eq!(s.mipmap_filter, wgpu::FilterMode::Nearest);
        assert_eq!(s.address_mode_u, wgpu::AddressMode::Repeat);
    }
}
