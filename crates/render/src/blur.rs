use glam::Vec2;
use tidewater_common::{
    Descriptor, Filter, FramebufferDesc, FramebufferId, Layout, ProgramId, Resolution, TextureId,
    TextureShape, Wrap,
};

use crate::error::RenderError;
use crate::gpu::{GpuBackend, RenderTarget, Viewport};
use crate::resources::ResourceProvider;
use crate::state::{PipelineState, StateScope};

/// Blurs a texture into a framebuffer.
pub trait BlurProcessor {
    /// Blur `source` into the first attachment of `destination`, at the destination's size.
    fn process(&mut self, gpu: &mut dyn GpuBackend, source: TextureId, destination: FramebufferId);
    fn clean(&mut self, gpu: &mut dyn GpuBackend);
}

/// Separable Gaussian blur: a horizontal pass into an intermediate target,
/// then a vertical pass into the destination.
#[derive(Debug)]
pub struct GaussianBlur {
    program: ProgramId,
    intermediate: FramebufferId,
    intermediate_texture: TextureId,
    size: Resolution,
}

impl GaussianBlur {
    pub const PROGRAM: &'static str = "blur_gaussian";

    pub fn new(
        gpu: &mut dyn GpuBackend,
        resources: &mut dyn ResourceProvider,
        size: Resolution,
        layout: Layout,
    ) -> Result<Self, RenderError> {
        let program = resources.program(gpu, Self::PROGRAM)?;
        let intermediate = gpu.create_framebuffer(&FramebufferDesc {
            label: "blur_intermediate".into(),
            shape: TextureShape::D2,
            width: size.width,
            height: size.height,
            attachments: vec![Descriptor::new(layout, Filter::Linear, Wrap::Clamp)],
            depth: false,
        })?;
        let intermediate_texture = gpu.framebuffer_texture(intermediate, 0)?;
        Ok(Self {
            program,
            intermediate,
            intermediate_texture,
            size,
        })
    }

    pub fn intermediate_size(&self) -> Resolution {
        self.size
    }

    fn pass(
        &self,
        gpu: &mut dyn GpuBackend,
        source: TextureId,
        target: FramebufferId,
        direction: Vec2,
    ) {
        gpu.bind_target(RenderTarget::framebuffer(target));
        gpu.set_viewport(Viewport::full(self.size));
        gpu.use_program(self.program);
        gpu.uniform("direction", direction.into());
        gpu.uniform("invTargetSize", self.size.inverse_size().into());
        gpu.bind_texture(source, 0);
        gpu.draw_fullscreen();
        gpu.unbind_target();
    }
}

impl BlurProcessor for GaussianBlur {
    fn process(&mut self, gpu: &mut dyn GpuBackend, source: TextureId, destination: FramebufferId) {
        let Some(size) = gpu.framebuffer_size(destination) else {
            tracing::warn!(?destination, "blur destination does not exist");
            return;
        };
        if size != self.size {
            if let Err(e) = gpu.resize_framebuffer(self.intermediate, size) {
                tracing::error!(error = %e, "failed to resize blur intermediate");
                return;
            }
            self.size = size;
        }

        let base = gpu.pipeline_state();
        let mut scope = StateScope::push(gpu, base.with_depth_test(false).with_blend(false));
        self.pass(&mut *scope, source, self.intermediate, Vec2::X);
        self.pass(&mut *scope, self.intermediate_texture, destination, Vec2::Y);
    }

    fn clean(&mut self, gpu: &mut dyn GpuBackend) {
        gpu.destroy_framebuffer(self.intermediate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{GpuCommand, RecordingGpu};
    use crate::resources::MemoryResources;
    use crate::gpu::UniformValue;

    fn setup(size: Resolution) -> (RecordingGpu, GaussianBlur, FramebufferId, TextureId) {
        let mut gpu = RecordingGpu::new();
        let mut resources = MemoryResources::new();
        resources.insert_shader(GaussianBlur::PROGRAM, "blur");
        let blur = GaussianBlur::new(&mut gpu, &mut resources, size, Layout::RGB32F).unwrap();
        let dest = gpu
            .create_framebuffer(&FramebufferDesc {
                label: "dest".into(),
                shape: TextureShape::D2,
                width: size.width,
                height: size.height,
                attachments: vec![Descriptor::new(Layout::RGB32F, Filter::Linear, Wrap::Clamp)],
                depth: false,
            })
            .unwrap();
        let src = gpu.framebuffer_texture(dest, 0).unwrap();
        (gpu, blur, dest, src)
    }

    #[test]
    fn two_passes_horizontal_then_vertical() {
        let (mut gpu, mut blur, dest, src) = setup(Resolution::new(64, 32));
        gpu.take_commands();
        blur.process(&mut gpu, src, dest);
        assert_eq!(gpu.draws().count(), 2);
        assert_eq!(
            gpu.uniform_values("direction"),
            vec![UniformValue::Vec2(Vec2::X), UniformValue::Vec2(Vec2::Y)]
        );
        let last = gpu.draws().last().unwrap();
        assert_eq!(last.target, Some(RenderTarget::framebuffer(dest)));
        assert!(!last.state.depth.test);
    }

    #[test]
    fn state_restored_after_process() {
        let (mut gpu, mut blur, dest, src) = setup(Resolution::new(16, 16));
        gpu.set_pipeline_state(PipelineState::opaque());
        blur.process(&mut gpu, src, dest);
        assert_eq!(gpu.pipeline_state(), PipelineState::opaque());
        assert!(matches!(
            gpu.commands().last(),
            Some(GpuCommand::SetState(s)) if *s == PipelineState::opaque()
        ));
    }

    #[test]
    fn intermediate_follows_destination_size() {
        let (mut gpu, mut blur, dest, src) = setup(Resolution::new(16, 16));
        gpu.resize_framebuffer(dest, Resolution::new(40, 20)).unwrap();
        blur.process(&mut gpu, src, dest);
        assert_eq!(blur.intermediate_size(), Resolution::new(40, 20));
    }

    #[test]
    fn missing_program_fails_construction() {
        let mut gpu = RecordingGpu::new();
        let mut resources = MemoryResources::new();
        let err = GaussianBlur::new(&mut gpu, &mut resources, Resolution::new(8, 8), Layout::R8)
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingAsset { kind: "program", .. }));
    }
}
