use serde::{Deserialize, Serialize};

/// Pixel storage format of a texture or render target attachment.
///
/// Three-channel float layouts are stored padded to four channels by GPU
/// backends that lack packed RGB formats; the logical channel count is kept
/// here so CPU-side data stays tightly packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layout {
    R8,
    R32F,
    RG32F,
    RGB8,
    SRGB8,
    SRGB8Alpha8,
    RGB16F,
    RGBA16F,
    RGB32F,
    RGBA32F,
    Depth32F,
}

impl Layout {
    /// Number of logical channels.
    pub fn channels(self) -> u32 {
        match self {
            Layout::R8 | Layout::R32F | Layout::Depth32F => 1,
            Layout::RG32F => 2,
            Layout::RGB8 | Layout::SRGB8 | Layout::RGB16F | Layout::RGB32F => 3,
            Layout::SRGB8Alpha8 | Layout::RGBA16F | Layout::RGBA32F => 4,
        }
    }

    /// Size of one logical channel in bytes.
    pub fn channel_bytes(self) -> u32 {
        match self {
            Layout::R8 | Layout::RGB8 | Layout::SRGB8 | Layout::SRGB8Alpha8 => 1,
            Layout::RGB16F | Layout::RGBA16F => 2,
            Layout::R32F | Layout::RG32F | Layout::RGB32F | Layout::RGBA32F | Layout::Depth32F => 4,
        }
    }

    /// Tightly packed bytes per pixel for CPU-side data.
    pub fn bytes_per_pixel(self) -> u32 {
        self.channels() * self.channel_bytes()
    }

    pub fn is_float(self) -> bool {
        self.channel_bytes() > 1
    }

    pub fn is_srgb(self) -> bool {
        matches!(self, Layout::SRGB8 | Layout::SRGB8Alpha8)
    }

    pub fn is_depth(self) -> bool {
        matches!(self, Layout::Depth32F)
    }
}

/// Sampling filter. Two-part variants name the texel filter then the mip filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Filter {
    Nearest,
    Linear,
    NearestNearest,
    LinearNearest,
    NearestLinear,
    LinearLinear,
}

impl Filter {
    pub fn is_linear(self) -> bool {
        matches!(self, Filter::Linear | Filter::LinearNearest | Filter::LinearLinear)
    }

    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, Filter::Nearest | Filter::Linear)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Wrap {
    Clamp,
    Repeat,
    Mirror,
}

/// Format, filtering and wrapping of one texture or attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Descriptor {
    pub layout: Layout,
    pub filter: Filter,
    pub wrap: Wrap,
}

impl Descriptor {
    pub const fn new(layout: Layout, filter: Filter, wrap: Wrap) -> Self {
        Self {
            layout,
            filter,
            wrap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureShape {
    D2,
    Cube,
}

impl TextureShape {
    pub fn layers(self) -> u32 {
        match self {
            TextureShape::D2 => 1,
            TextureShape::Cube => 6,
        }
    }
}

/// Everything needed to allocate a standalone texture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureDesc {
    pub label: String,
    pub shape: TextureShape,
    pub width: u32,
    pub height: u32,
    pub descriptor: Descriptor,
}

impl TextureDesc {
    pub fn d2(label: impl Into<String>, width: u32, height: u32, descriptor: Descriptor) -> Self {
        Self {
            label: label.into(),
            shape: TextureShape::D2,
            width,
            height,
            descriptor,
        }
    }

    /// Expected length of tightly packed pixel data covering every layer.
    pub fn data_len(&self) -> usize {
        (self.width * self.height * self.shape.layers() * self.descriptor.layout.bytes_per_pixel())
            as usize
    }
}

/// Layout of a render target: its attachments, shape and depth buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramebufferDesc {
    pub label: String,
    pub shape: TextureShape,
    pub width: u32,
    pub height: u32,
    pub attachments: Vec<Descriptor>,
    pub depth: bool,
}
