//! Procedural island terrain for the island renderer.
//!
//! # Invariants
//! - Level 0 of the clipmap is a full block of cells; every further level is a
//!   ring whose hole is exactly the footprint of the level below.
//! - Cell bounds are in texels of the cell's own level, with flat height.
//! - The shadow mask is recomputed only when asked, never per frame.

mod cells;
mod heightmap;
mod procedural;
mod shadow;

pub use cells::{CellLayout, cell_mesh, clipmap_extent, clipmap_layout};
pub use heightmap::{Heightmap, IslandShape, transition_noise};
pub use procedural::{ProceduralTerrain, TerrainParams, transition_noise_source};
pub use shadow::{LIT, SHADOWED, lit_fraction, shadow_mask};

use tidewater_render::RenderError;

#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    #[error("invalid terrain parameters: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<TerrainError> for RenderError {
    fn from(e: TerrainError) -> Self {
        match e {
            TerrainError::Render(e) => e,
            other => RenderError::Backend(other.to_string()),
        }
    }
}

pub fn crate_info() -> &'static str {
    "tidewater-terrain v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert_eq!(crate_info(), "tidewater-terrain v0.1.0");
    }

    #[test]
    fn render_errors_pass_through() {
        let e: RenderError = TerrainError::Render(RenderError::Backend("lost".into())).into();
        assert!(matches!(e, RenderError::Backend(m) if m == "lost"));
    }
}
