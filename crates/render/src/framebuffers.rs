use tidewater_common::{
    Descriptor, Filter, FramebufferDesc, FramebufferId, Layout, Resolution, TextureId,
    TextureShape, Wrap,
};

use crate::error::RenderError;
use crate::gpu::GpuBackend;

/// Edge length of the environment cube faces. Independent of the window size.
pub const ENVIRONMENT_SIZE: u32 = 512;

/// Written to every scene channel before geometry; the ocean passes treat it as "no surface".
pub const SCENE_CLEAR_SENTINEL: f32 = 10000.0;

const SCENE_ATTACHMENT: Descriptor =
    Descriptor::new(Layout::RGB32F, Filter::LinearNearest, Wrap::Clamp);
const ENVIRONMENT_ATTACHMENT: Descriptor =
    Descriptor::new(Layout::RGB16F, Filter::LinearNearest, Wrap::Clamp);

fn target(
    label: &str,
    shape: TextureShape,
    size: Resolution,
    attachments: usize,
    depth: bool,
    descriptor: Descriptor,
) -> FramebufferDesc {
    FramebufferDesc {
        label: label.to_string(),
        shape,
        width: size.width,
        height: size.height,
        attachments: vec![descriptor; attachments],
        depth,
    }
}

/// The offscreen targets of the island pipeline.
///
/// # Invariants
/// - `scene` and `water_position` match the rendering resolution.
/// - `water_effects_half` and `water_effects_blur` are half of it.
/// - `environment` is a fixed cube, never resized.
/// - Only `scene` has a depth buffer.
#[derive(Debug)]
pub struct IslandTargets {
    resolution: Resolution,
    scene: FramebufferId,
    water_position: FramebufferId,
    water_effects_half: FramebufferId,
    water_effects_blur: FramebufferId,
    environment: FramebufferId,
    scene_color: TextureId,
    scene_position: TextureId,
    water_position_texture: TextureId,
    water_effects_half_texture: TextureId,
    water_effects_blur_texture: TextureId,
    environment_texture: TextureId,
}

impl IslandTargets {
    pub fn new(gpu: &mut dyn GpuBackend, resolution: Resolution) -> Result<Self, RenderError> {
        let half = resolution.half();
        let scene = gpu.create_framebuffer(&target(
            "scene",
            TextureShape::D2,
            resolution,
            2,
            true,
            SCENE_ATTACHMENT,
        ))?;
        let water_position = gpu.create_framebuffer(&target(
            "water_position",
            TextureShape::D2,
            resolution,
            1,
            false,
            SCENE_ATTACHMENT,
        ))?;
        let water_effects_half = gpu.create_framebuffer(&target(
            "water_effects_half",
            TextureShape::D2,
            half,
            1,
            false,
            SCENE_ATTACHMENT,
        ))?;
        let water_effects_blur = gpu.create_framebuffer(&target(
            "water_effects_blur",
            TextureShape::D2,
            half,
            1,
            false,
            SCENE_ATTACHMENT,
        ))?;
        let environment = gpu.create_framebuffer(&target(
            "environment",
            TextureShape::Cube,
            Resolution::new(ENVIRONMENT_SIZE, ENVIRONMENT_SIZE),
            1,
            false,
            ENVIRONMENT_ATTACHMENT,
        ))?;

        tracing::debug!(%resolution, %half, "created island targets");
        Ok(Self {
            resolution,
            scene,
            water_position,
            water_effects_half,
            water_effects_blur,
            environment,
            scene_color: gpu.framebuffer_texture(scene, 0)?,
            scene_position: gpu.framebuffer_texture(scene, 1)?,
            water_position_texture: gpu.framebuffer_texture(water_position, 0)?,
            water_effects_half_texture: gpu.framebuffer_texture(water_effects_half, 0)?,
            water_effects_blur_texture: gpu.framebuffer_texture(water_effects_blur, 0)?,
            environment_texture: gpu.framebuffer_texture(environment, 0)?,
        })
    }

    /// Reallocate the resolution-dependent targets. A no-op at the current resolution.
    pub fn resize(
        &mut self,
        gpu: &mut dyn GpuBackend,
        resolution: Resolution,
    ) -> Result<(), RenderError> {
        if resolution == self.resolution {
            return Ok(());
        }
        let half = resolution.half();
        gpu.resize_framebuffer(self.scene, resolution)?;
        gpu.resize_framebuffer(self.water_position, resolution)?;
        gpu.resize_framebuffer(self.water_effects_half, half)?;
        gpu.resize_framebuffer(self.water_effects_blur, half)?;
        tracing::debug!(from = %self.resolution, to = %resolution, "resized island targets");
        self.resolution = resolution;
        Ok(())
    }

    /// Release every target. Handles are invalid afterwards.
    pub fn clean(self, gpu: &mut dyn GpuBackend) {
        for fb in [
            self.scene,
            self.water_position,
            self.water_effects_half,
            self.water_effects_blur,
            self.environment,
        ] {
            gpu.destroy_framebuffer(fb);
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn half_resolution(&self) -> Resolution {
        self.resolution.half()
    }

    pub fn scene(&self) -> FramebufferId {
        self.scene
    }

    pub fn water_position(&self) -> FramebufferId {
        self.water_position
    }

    pub fn water_effects_half(&self) -> FramebufferId {
        self.water_effects_half
    }

    pub fn water_effects_blur(&self) -> FramebufferId {
        self.water_effects_blur
    }

    pub fn environment(&self) -> FramebufferId {
        self.environment
    }

    /// Lit scene color.
    pub fn scene_color(&self) -> TextureId {
        self.scene_color
    }

    /// World-space position of the nearest surface.
    pub fn scene_position(&self) -> TextureId {
        self.scene_position
    }

    pub fn water_position_texture(&self) -> TextureId {
        self.water_position_texture
    }

    pub fn water_effects_half_texture(&self) -> TextureId {
        self.water_effects_half_texture
    }

    pub fn water_effects_blur_texture(&self) -> TextureId {
        self.water_effects_blur_texture
    }

    pub fn environment_texture(&self) -> TextureId {
        self.environment_texture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingGpu;

    #[test]
    fn sizes_follow_resolution() {
        let mut gpu = RecordingGpu::new();
        let targets = IslandTargets::new(&mut gpu, Resolution::new(1920, 1080)).unwrap();
        assert_eq!(
            gpu.framebuffer_size(targets.scene()),
            Some(Resolution::new(1920, 1080))
        );
        assert_eq!(
            gpu.framebuffer_size(targets.water_effects_blur()),
            Some(Resolution::new(960, 540))
        );
        assert_eq!(
            gpu.framebuffer_size(targets.environment()),
            Some(Resolution::new(ENVIRONMENT_SIZE, ENVIRONMENT_SIZE))
        );
    }

    #[test]
    fn resize_leaves_environment_alone() {
        let mut gpu = RecordingGpu::new();
        let mut targets = IslandTargets::new(&mut gpu, Resolution::new(1920, 1080)).unwrap();
        targets.resize(&mut gpu, Resolution::new(1280, 720)).unwrap();
        assert_eq!(
            gpu.framebuffer_size(targets.water_effects_half()),
            Some(Resolution::new(640, 360))
        );
        assert_eq!(
            gpu.framebuffer_size(targets.water_position()),
            Some(Resolution::new(1280, 720))
        );
        assert_eq!(
            gpu.framebuffer_size(targets.environment()),
            Some(Resolution::new(ENVIRONMENT_SIZE, ENVIRONMENT_SIZE))
        );
    }

    #[test]
    fn only_the_scene_has_depth() {
        let mut gpu = RecordingGpu::new();
        let targets = IslandTargets::new(&mut gpu, Resolution::new(320, 240)).unwrap();
        let depth = |fb| gpu.framebuffer_desc(fb).map(|d| d.depth);
        assert_eq!(depth(targets.scene()), Some(true));
        for fb in [
            targets.water_position(),
            targets.water_effects_half(),
            targets.water_effects_blur(),
            targets.environment(),
        ] {
            assert_eq!(depth(fb), Some(false));
        }
        // Two scene attachments and their depth, plus one color each for the other four.
        assert_eq!(gpu.live_allocations(), 7);
    }

    #[test]
    fn environment_samples_linear_without_mip_blending() {
        let mut gpu = RecordingGpu::new();
        let targets = IslandTargets::new(&mut gpu, Resolution::new(320, 240)).unwrap();
        let desc = gpu.framebuffer_desc(targets.environment()).unwrap();
        assert_eq!(desc.shape, TextureShape::Cube);
        assert_eq!(desc.attachments[0].filter, Filter::LinearNearest);
        assert_eq!(desc.attachments[0].layout, Layout::RGB16F);
    }

    #[test]
    fn resize_keeps_texture_handles() {
        let mut gpu = RecordingGpu::new();
        let mut targets = IslandTargets::new(&mut gpu, Resolution::new(800, 600)).unwrap();
        let color = targets.scene_color();
        targets.resize(&mut gpu, Resolution::new(1024, 768)).unwrap();
        assert_eq!(gpu.framebuffer_texture(targets.scene(), 0).unwrap(), color);
    }

    #[test]
    fn same_size_resize_is_idempotent() {
        let mut gpu = RecordingGpu::new();
        let mut targets = IslandTargets::new(&mut gpu, Resolution::new(1280, 720)).unwrap();
        let live = gpu.live_allocations();
        targets.resize(&mut gpu, Resolution::new(1280, 720)).unwrap();
        targets.resize(&mut gpu, Resolution::new(1280, 720)).unwrap();
        assert_eq!(gpu.live_allocations(), live);
        assert_eq!(targets.resolution(), Resolution::new(1280, 720));
    }

    #[test]
    fn clean_releases_everything() {
        let mut gpu = RecordingGpu::new();
        let targets = IslandTargets::new(&mut gpu, Resolution::new(64, 64)).unwrap();
        targets.clean(&mut gpu);
        assert_eq!(gpu.live_framebuffers(), 0);
        assert_eq!(gpu.live_allocations(), 0);
    }
}
