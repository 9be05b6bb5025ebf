use std::ops::{Deref, DerefMut};

use crate::gpu::GpuBackend;

/// Depth comparison function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthFunc {
    Never,
    Less,
    LessEqual,
    Equal,
    GreaterEqual,
    Greater,
    NotEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    pub test: bool,
    pub func: DepthFunc,
    pub write: bool,
}

impl DepthState {
    pub const fn new(test: bool, func: DepthFunc, write: bool) -> Self {
        Self { test, func, write }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Faces {
    Front,
    Back,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
}

/// The complete fixed-function state used by a draw.
///
/// Passes compute the state they need as a value and apply it in one go,
/// instead of toggling individual flags on a global state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineState {
    pub depth: DepthState,
    /// Faces removed by culling, `None` disables culling.
    pub cull: Option<Faces>,
    pub polygon: PolygonMode,
    pub blend: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::opaque()
    }
}

impl PipelineState {
    /// Strict depth test with writes, back faces culled, filled, no blending.
    pub const fn opaque() -> Self {
        Self {
            depth: DepthState::new(true, DepthFunc::Less, true),
            cull: Some(Faces::Back),
            polygon: PolygonMode::Fill,
            blend: false,
        }
    }

    pub const fn with_depth(mut self, depth: DepthState) -> Self {
        self.depth = depth;
        self
    }

    /// Same comparison and write mask, depth test switched on or off.
    pub const fn with_depth_test(mut self, test: bool) -> Self {
        self.depth.test = test;
        self
    }

    pub const fn with_cull(mut self, cull: Option<Faces>) -> Self {
        self.cull = cull;
        self
    }

    pub const fn with_polygon(mut self, polygon: PolygonMode) -> Self {
        self.polygon = polygon;
        self
    }

    pub const fn with_blend(mut self, blend: bool) -> Self {
        self.blend = blend;
        self
    }

    /// Line rasterization with a relaxed depth comparison, to overlay edges on
    /// geometry that was just drawn filled.
    pub const fn wireframe_overlay(self) -> Self {
        self.with_polygon(PolygonMode::Line)
            .with_depth(DepthState::new(true, DepthFunc::LessEqual, true))
    }
}

/// Applies a pipeline state and restores the previous one when dropped.
///
/// Derefs to the backend, so draws go through the scope while it is alive.
/// Restoration happens on every exit path, early returns included.
pub struct StateScope<'a> {
    gpu: &'a mut dyn GpuBackend,
    restore: PipelineState,
}

impl<'a> StateScope<'a> {
    pub fn push(gpu: &'a mut dyn GpuBackend, state: PipelineState) -> Self {
        let restore = gpu.pipeline_state();
        gpu.set_pipeline_state(state);
        Self { gpu, restore }
    }

    /// State that will be put back on drop.
    pub fn restores_to(&self) -> PipelineState {
        self.restore
    }
}

impl<'a> Deref for StateScope<'a> {
    type Target = dyn GpuBackend + 'a;

    fn deref(&self) -> &Self::Target {
        self.gpu
    }
}

impl DerefMut for StateScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.gpu
    }
}

impl Drop for StateScope<'_> {
    fn drop(&mut self) {
        self.gpu.set_pipeline_state(self.restore);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingGpu;

    #[test]
    fn opaque_defaults() {
        let s = PipelineState::default();
        assert!(s.depth.test && s.depth.write);
        assert_eq!(s.depth.func, DepthFunc::Less);
        assert_eq!(s.cull, Some(Faces::Back));
        assert!(!s.blend);
    }

    #[test]
    fn wireframe_overlay_relaxes_depth() {
        let s = PipelineState::opaque().wireframe_overlay();
        assert_eq!(s.polygon, PolygonMode::Line);
        assert_eq!(s.depth.func, DepthFunc::LessEqual);
        assert_eq!(s.cull, Some(Faces::Back));
    }

    #[test]
    fn scope_restores_on_drop() {
        let mut gpu = RecordingGpu::new();
        let base = PipelineState::opaque();
        gpu.set_pipeline_state(base);
        {
            let scope = StateScope::push(&mut gpu, base.with_depth_test(false));
            assert!(!scope.pipeline_state().depth.test);
            assert_eq!(scope.restores_to(), base);
        }
        assert_eq!(gpu.pipeline_state(), base);
    }

    #[test]
    fn nested_scopes_unwind_in_order() {
        let mut gpu = RecordingGpu::new();
        let base = PipelineState::opaque();
        gpu.set_pipeline_state(base);
        let always = base.with_depth(DepthState::new(true, DepthFunc::Always, true));
        {
            let mut outer = StateScope::push(&mut gpu, always);
            {
                let inner = StateScope::push(&mut *outer, always.wireframe_overlay());
                assert_eq!(inner.pipeline_state().polygon, PolygonMode::Line);
            }
            assert_eq!(outer.pipeline_state(), always);
        }
        assert_eq!(gpu.pipeline_state(), base);
    }

    #[test]
    fn scope_restores_on_early_return() {
        fn draw_or_bail(gpu: &mut dyn GpuBackend, bail: bool) -> Option<()> {
            let _scope = StateScope::push(gpu, PipelineState::opaque().with_cull(None));
            if bail {
                return None;
            }
            Some(())
        }
        let mut gpu = RecordingGpu::new();
        gpu.set_pipeline_state(PipelineState::opaque());
        assert!(draw_or_bail(&mut gpu, true).is_none());
        assert_eq!(gpu.pipeline_state(), PipelineState::opaque());
    }
}
