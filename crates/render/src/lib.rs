//! Island renderer: frame orchestration over an abstract GPU backend.
//!
//! # Invariants
//! - The renderer never talks to a graphics API directly; every call goes
//!   through [`GpuBackend`], so frames can be recorded headlessly.
//! - Pipeline state changes are scoped ([`StateScope`]) and undone on exit.
//! - Offscreen targets track the rendering resolution; the environment cube does not.
//!
//! [`RecordingGpu`] stands in for a real backend in tests and in the CLI.

mod blur;
mod camera;
mod config;
mod error;
mod framebuffers;
mod frustum;
mod gpu;
mod island;
mod recording;
mod resources;
mod sky;
mod state;
mod terrain;

pub use blur::{BlurProcessor, GaussianBlur};
pub use camera::{Camera, FrameView, cube_face_view_projections};
pub use config::{
    ConfigError, IslandConfig, RenderToggles, RenderingConfig, RenderingOverrides,
    TessellationParams,
};
pub use error::RenderError;
pub use framebuffers::{ENVIRONMENT_SIZE, IslandTargets, SCENE_CLEAR_SENTINEL};
pub use frustum::Frustum;
pub use gpu::{GpuBackend, RenderTarget, UniformValue, Viewport};
pub use island::{
    FrameStats, IslandRenderer, OCEAN_PATCH_SIZE, PROGRAM_ASSETS, Pass, SEA_LEVEL, SKY_MESH,
    STOPPED_TIME, TEXTURE_ASSETS, TRANSITION_NOISE_TEXTURE, headless_resources, is_underwater,
};
pub use recording::{DrawCall, DrawKind, GpuCommand, RecordingGpu};
pub use resources::{MemoryResources, ResourceProvider, TextureSource};
pub use sky::SkyCache;
pub use state::{DepthFunc, DepthState, Faces, PipelineState, PolygonMode, StateScope};
pub use terrain::{
    CELL_HEIGHT_BOUNDS, TerrainCell, TerrainSource, cell_world_bbox, grid_shift, terrain_anchor,
};

pub fn crate_info() -> &'static str {
    "tidewater-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
