use glam::Vec3;
use tidewater_common::{Aabb, MeshData, Vertex};

/// Cells per side of a level's footprint.
const CELLS_PER_SIDE: i32 = 4;

/// Placement of one cell in its level's local texel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellLayout {
    pub level: u32,
    /// Cell index along x and z, in `-2..2`.
    pub x: i32,
    pub z: i32,
}

impl CellLayout {
    /// Local bounds in texels of this cell's level. Height is left flat.
    pub fn bbox(&self, grid_size: u32) -> Aabb {
        let g = grid_size as f32;
        Aabb::new(
            Vec3::new(self.x as f32 * g, 0.0, self.z as f32 * g),
            Vec3::new((self.x + 1) as f32 * g, 0.0, (self.z + 1) as f32 * g),
        )
    }
}

/// Nested square rings around the viewer.
///
/// Level 0 is a full 4x4 block of cells. Each further level doubles the texel
/// size and keeps only the outer ring of its 4x4 block, the hole being exactly
/// the footprint of the level below.
pub fn clipmap_layout(levels: u32) -> Vec<CellLayout> {
    let half = CELLS_PER_SIDE / 2;
    let mut cells = Vec::new();
    for level in 0..levels {
        for z in -half..half {
            for x in -half..half {
                let inner = (-1..=0).contains(&x) && (-1..=0).contains(&z);
                if level > 0 && inner {
                    continue;
                }
                cells.push(CellLayout { level, x, z });
            }
        }
    }
    cells
}

/// World width covered by the outermost level.
pub fn clipmap_extent(levels: u32, grid_size: u32, texel_size: f32) -> f32 {
    let top = levels.saturating_sub(1).min(31);
    CELLS_PER_SIDE as f32 * grid_size as f32 * (1u32 << top) as f32 * texel_size
}

/// Flat grid of `grid_size` quads per side covering the cell, in level texels.
pub fn cell_mesh(layout: &CellLayout, grid_size: u32) -> MeshData {
    let g = grid_size.max(1);
    let origin = Vec3::new((layout.x * g as i32) as f32, 0.0, (layout.z * g as i32) as f32);
    let mut vertices = Vec::with_capacity(((g + 1) * (g + 1)) as usize);
    for z in 0..=g {
        for x in 0..=g {
            let pos = origin + Vec3::new(x as f32, 0.0, z as f32);
            vertices.push(Vertex::new(
                pos,
                Vec3::Y,
                [x as f32 / g as f32, z as f32 / g as f32],
            ));
        }
    }
    let mut indices = Vec::with_capacity((g * g * 6) as usize);
    for z in 0..g {
        for x in 0..g {
            let i = z * (g + 1) + x;
            let below = i + g + 1;
            indices.extend_from_slice(&[i, below, i + 1, i + 1, below, below + 1]);
        }
    }
    MeshData::new(vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_zero_is_full_and_rings_have_holes() {
        let cells = clipmap_layout(3);
        assert_eq!(cells.iter().filter(|c| c.level == 0).count(), 16);
        assert_eq!(cells.iter().filter(|c| c.level == 1).count(), 12);
        assert_eq!(cells.len(), 16 + 12 + 12);
    }

    #[test]
    fn ring_hole_matches_previous_level() {
        // Level 1 ring has no cell within [-g, g) in its own texels,
        // which is [-2g, 2g) in level 0 texels: the full level 0 block.
        let g = 32;
        for cell in clipmap_layout(2).iter().filter(|c| c.level == 1) {
            let b = cell.bbox(g);
            let inside = b.min.x >= -(g as f32) && b.max.x <= g as f32
                && b.min.z >= -(g as f32) && b.max.z <= g as f32;
            assert!(!inside, "{cell:?}");
        }
    }

    #[test]
    fn mesh_matches_bbox() {
        let layout = CellLayout {
            level: 2,
            x: -2,
            z: 1,
        };
        let mesh = cell_mesh(&layout, 8);
        assert_eq!(mesh.vertices.len(), 81);
        assert_eq!(mesh.triangle_count(), 128);
        assert_eq!(mesh.bbox, Some(layout.bbox(8)));
    }

    #[test]
    fn extent_of_outer_level() {
        assert!((clipmap_extent(4, 32, 0.05) - 51.2).abs() < 1e-4);
        assert!((clipmap_extent(1, 32, 0.05) - 6.4).abs() < 1e-5);
    }
}
