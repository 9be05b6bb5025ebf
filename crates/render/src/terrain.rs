use glam::Vec3;
use tidewater_common::{Aabb, MeshId, TextureId};

use crate::error::RenderError;
use crate::gpu::GpuBackend;

/// Vertical extent given to every terrain cell when culling.
pub const CELL_HEIGHT_BOUNDS: (f32, f32) = (-5.0, 5.0);

/// One level-of-detail cell of the terrain.
///
/// `bbox` is expressed in texels of the cell's own level, relative to its snapped origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainCell {
    pub level: u32,
    pub bbox: Aabb,
    pub mesh: MeshId,
}

/// The terrain the island renderer draws.
pub trait TerrainSource {
    fn heightmap(&self) -> TextureId;
    /// Width of the heightmap, in texels.
    fn map_width(&self) -> u32;
    fn shadow_map(&self) -> TextureId;
    /// World size of one heightmap texel.
    fn texel_size(&self) -> f32;
    /// Vertices per side of a cell mesh.
    fn grid_size(&self) -> u32;
    /// World size of the full mesh.
    fn mesh_size(&self) -> f32;
    fn cells(&self) -> &[TerrainCell];
    /// Recompute the shadow map for a new light direction.
    fn generate_shadow_map(
        &mut self,
        gpu: &mut dyn GpuBackend,
        light_direction: Vec3,
    ) -> Result<(), RenderError>;
    fn clean(&mut self, gpu: &mut dyn GpuBackend);
}

/// Point the terrain grid is centered on for a given look-at point.
///
/// Clamped horizontally to the region the heightmap covers, at sea level.
pub fn terrain_anchor(look_at: Vec3, terrain: &dyn TerrainSource) -> Vec3 {
    let extent = 0.25
        * (terrain.map_width() as f32 * terrain.texel_size() - 0.5 * terrain.mesh_size()).abs();
    let clamped = look_at.clamp(Vec3::splat(-extent), Vec3::splat(extent));
    Vec3::new(clamped.x, 0.0, clamped.z)
}

/// World-space bounding box of a cell when the grid is anchored at `anchor`.
///
/// The local box is scaled by the level's texel size and translated to the
/// anchor snapped to that level's grid. Height is replaced by a fixed range
/// that covers any terrain elevation.
pub fn cell_world_bbox(cell: &TerrainCell, texel_size: f32, anchor: Vec3) -> Aabb {
    let level_size = (1u32 << cell.level.min(31)) as f32 * texel_size;
    let snapped = (anchor / level_size).round() * level_size;
    let mut bbox = cell.bbox.scaled_translated(level_size, snapped);
    bbox.min.y = CELL_HEIGHT_BOUNDS.0;
    bbox.max.y = CELL_HEIGHT_BOUNDS.1;
    bbox
}

/// Grid snapping offset passed to the ground program.
pub fn grid_shift(camera_position: Vec3) -> Vec3 {
    camera_position.round()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatTerrain {
        cells: Vec<TerrainCell>,
    }

    impl TerrainSource for FlatTerrain {
        fn heightmap(&self) -> TextureId {
            TextureId(1)
        }
        fn map_width(&self) -> u32 {
            1024
        }
        fn shadow_map(&self) -> TextureId {
            TextureId(2)
        }
        fn texel_size(&self) -> f32 {
            0.05
        }
        fn grid_size(&self) -> u32 {
            64
        }
        fn mesh_size(&self) -> f32 {
            20.0
        }
        fn cells(&self) -> &[TerrainCell] {
            &self.cells
        }
        fn generate_shadow_map(
            &mut self,
            _gpu: &mut dyn GpuBackend,
            _light_direction: Vec3,
        ) -> Result<(), RenderError> {
            Ok(())
        }
        fn clean(&mut self, _gpu: &mut dyn GpuBackend) {}
    }

    #[test]
    fn anchor_is_clamped_to_extent() {
        let terrain = FlatTerrain { cells: Vec::new() };
        // 0.25 * |1024 * 0.05 - 10| = 10.3
        let a = terrain_anchor(Vec3::new(100.0, 7.0, -3.0), &terrain);
        assert!((a.x - 10.3).abs() < 1e-4);
        assert_eq!(a.y, 0.0);
        assert_eq!(a.z, -3.0);
        let b = terrain_anchor(Vec3::new(-50.0, -2.0, -50.0), &terrain);
        assert!((b.x + 10.3).abs() < 1e-4);
        assert!((b.z + 10.3).abs() < 1e-4);
    }

    #[test]
    fn cell_bbox_snaps_to_level_grid() {
        let cell = TerrainCell {
            level: 2,
            bbox: Aabb::new(Vec3::new(-8.0, 0.0, -8.0), Vec3::new(8.0, 0.0, 8.0)),
            mesh: MeshId(3),
        };
        // level size = 4 * 0.05 = 0.2; anchor 0.33 snaps to 0.4
        let bbox = cell_world_bbox(&cell, 0.05, Vec3::new(0.33, 0.0, -0.09));
        assert!((bbox.min.x - (-1.6 + 0.4)).abs() < 1e-5);
        assert!((bbox.max.x - (1.6 + 0.4)).abs() < 1e-5);
        assert!((bbox.min.z - (-1.6 - 0.0)).abs() < 1e-5);
        assert_eq!(bbox.min.y, -5.0);
        assert_eq!(bbox.max.y, 5.0);
    }

    #[test]
    fn shift_rounds_position() {
        assert_eq!(
            grid_shift(Vec3::new(1.4, -2.6, 0.5)),
            Vec3::new(1.0, -3.0, 1.0)
        );
    }
}
