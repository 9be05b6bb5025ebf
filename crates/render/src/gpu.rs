use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use tidewater_common::{
    BufferId, Filter, FramebufferDesc, FramebufferId, MeshData, MeshId, ProgramId, Resolution,
    TextureDesc, TextureId,
};

use crate::error::RenderError;
use crate::state::PipelineState;

/// Where draws land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// An offscreen framebuffer. `layer` selects the cube face for cube targets.
    Framebuffer { id: FramebufferId, layer: u32 },
    /// The presentation surface.
    Display { srgb: bool },
}

impl RenderTarget {
    pub fn framebuffer(id: FramebufferId) -> Self {
        Self::Framebuffer { id, layer: 0 }
    }
}

/// Pixel rectangle of the bound target that draws cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn full(resolution: Resolution) -> Self {
        Self {
            x: 0,
            y: 0,
            width: resolution.width,
            height: resolution.height,
        }
    }
}

/// Value bound to a named program uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

macro_rules! uniform_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for UniformValue {
            fn from(value: $ty) -> Self {
                UniformValue::$variant(value)
            }
        })*
    };
}

uniform_from! {
    bool => Bool,
    i32 => Int,
    f32 => Float,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Mat3 => Mat3,
    Mat4 => Mat4,
}

/// The graphics capability the island renderer drives.
///
/// Resources are created up front and referred to by handle. Framebuffer
/// attachment handles stay valid across [`GpuBackend::resize_framebuffer`]:
/// only the storage behind them is reallocated.
///
/// Binding state (target, viewport, program, uniforms, textures) persists
/// until changed, like a classic immediate-mode API. Draw calls that fail
/// are logged by the backend and skipped; they never abort a frame.
pub trait GpuBackend {
    fn create_program(&mut self, name: &str, source: &str) -> Result<ProgramId, RenderError>;

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        data: Option<&[u8]>,
    ) -> Result<TextureId, RenderError>;
    /// Replace the full contents of a texture. `data` must be tightly packed.
    fn write_texture(&mut self, texture: TextureId, data: &[u8]) -> Result<(), RenderError>;
    fn destroy_texture(&mut self, texture: TextureId);

    fn create_buffer(&mut self, label: &str, size: u64) -> Result<BufferId, RenderError>;
    fn write_buffer(&mut self, buffer: BufferId, data: &[u8]) -> Result<(), RenderError>;
    fn destroy_buffer(&mut self, buffer: BufferId);

    fn create_mesh(&mut self, label: &str, mesh: &MeshData) -> Result<MeshId, RenderError>;
    fn destroy_mesh(&mut self, mesh: MeshId);

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId, RenderError>;
    /// Reallocate every attachment at a new size, keeping layouts and handles.
    fn resize_framebuffer(
        &mut self,
        framebuffer: FramebufferId,
        resolution: Resolution,
    ) -> Result<(), RenderError>;
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId);
    fn framebuffer_texture(
        &self,
        framebuffer: FramebufferId,
        attachment: usize,
    ) -> Result<TextureId, RenderError>;
    fn framebuffer_size(&self, framebuffer: FramebufferId) -> Option<Resolution>;

    fn pipeline_state(&self) -> PipelineState;
    fn set_pipeline_state(&mut self, state: PipelineState);

    fn bind_target(&mut self, target: RenderTarget);
    fn unbind_target(&mut self);
    fn set_viewport(&mut self, viewport: Viewport);
    /// Clear the bound target. `None` leaves that aspect untouched.
    fn clear(&mut self, color: Option<Vec4>, depth: Option<f32>);

    fn use_program(&mut self, program: ProgramId);
    fn uniform(&mut self, name: &str, value: UniformValue);
    fn bind_texture(&mut self, texture: TextureId, slot: u32);
    fn bind_buffer(&mut self, buffer: BufferId, slot: u32);

    fn draw_mesh(&mut self, mesh: MeshId);
    /// Draw a mesh as patches of `patch_size` control points.
    fn draw_tessellated(&mut self, mesh: MeshId, patch_size: u32);
    /// Draw a single triangle covering the viewport.
    fn draw_fullscreen(&mut self);
    /// Copy a texture into the first attachment of a framebuffer.
    fn blit(&mut self, source: TextureId, destination: FramebufferId, filter: Filter);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_conversions() {
        assert_eq!(UniformValue::from(true), UniformValue::Bool(true));
        assert_eq!(UniformValue::from(2.5f32), UniformValue::Float(2.5));
        assert_eq!(
            UniformValue::from(Vec3::X),
            UniformValue::Vec3(Vec3::new(1.0, 0.0, 0.0))
        );
        assert_eq!(
            UniformValue::from(Mat4::IDENTITY),
            UniformValue::Mat4(Mat4::IDENTITY)
        );
    }

    #[test]
    fn full_viewport() {
        let v = Viewport::full(Resolution::new(960, 540));
        assert_eq!((v.x, v.y, v.width, v.height), (0, 0, 960, 540));
    }
}
