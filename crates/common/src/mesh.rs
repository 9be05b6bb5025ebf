use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::types::Aabb;

/// Interleaved vertex layout shared by every mesh uploaded to the GPU.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: [f32; 2]) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv,
        }
    }
}

/// CPU-side indexed triangle mesh with its local bounding box.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub bbox: Option<Aabb>,
}

impl MeshData {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        let bbox = if vertices.is_empty() {
            None
        } else {
            Some(Aabb::from_points(
                vertices.iter().map(|v| Vec3::from_array(v.position)),
            ))
        };
        Self {
            vertices,
            indices,
            bbox,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Flat grid in the XZ plane, `resolution` quads per side, centered on the origin.
    pub fn grid(resolution: u32, spacing: f32) -> Self {
        let res = resolution.max(1);
        let half = res as f32 * spacing * 0.5;
        let mut vertices = Vec::with_capacity(((res + 1) * (res + 1)) as usize);
        for z in 0..=res {
            for x in 0..=res {
                let pos = Vec3::new(x as f32 * spacing - half, 0.0, z as f32 * spacing - half);
                vertices.push(Vertex::new(
                    pos,
                    Vec3::Y,
                    [x as f32 / res as f32, z as f32 / res as f32],
                ));
            }
        }

        let mut indices = Vec::with_capacity((res * res * 6) as usize);
        for z in 0..res {
            for x in 0..res {
                let top_left = z * (res + 1) + x;
                let top_right = top_left + 1;
                let bottom_left = (z + 1) * (res + 1) + x;
                let bottom_right = bottom_left + 1;
                indices.extend_from_slice(&[
                    top_left,
                    bottom_left,
                    top_right,
                    top_right,
                    bottom_left,
                    bottom_right,
                ]);
            }
        }
        Self::new(vertices, indices)
    }

    /// Open cylinder around the Y axis, centered on the origin, normals pointing inward.
    pub fn cylinder(segments: u32, radius: f32, height: f32) -> Self {
        let segments = segments.max(3);
        let half = height * 0.5;
        let mut vertices = Vec::with_capacity(((segments + 1) * 2) as usize);
        for i in 0..=segments {
            let t = i as f32 / segments as f32;
            let angle = t * std::f32::consts::TAU;
            let (s, c) = angle.sin_cos();
            let normal = Vec3::new(-c, 0.0, -s);
            vertices.push(Vertex::new(Vec3::new(radius * c, -half, radius * s), normal, [t, 0.0]));
            vertices.push(Vertex::new(Vec3::new(radius * c, half, radius * s), normal, [t, 1.0]));
        }

        let mut indices = Vec::with_capacity((segments * 6) as usize);
        for i in 0..segments {
            let b0 = i * 2;
            let t0 = b0 + 1;
            let b1 = b0 + 2;
            let t1 = b0 + 3;
            indices.extend_from_slice(&[b0, t0, b1, b1, t0, t1]);
        }
        Self::new(vertices, indices)
    }

    /// Two-triangle quad covering clip space, used for background passes.
    pub fn plane() -> Self {
        #[rustfmt::skip]
        let vertices = vec![
            Vertex::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::Z, [0.0, 0.0]),
            Vertex::new(Vec3::new( 1.0, -1.0, 0.0), Vec3::Z, [1.0, 0.0]),
            Vertex::new(Vec3::new( 1.0,  1.0, 0.0), Vec3::Z, [1.0, 1.0]),
            Vertex::new(Vec3::new(-1.0,  1.0, 0.0), Vec3::Z, [0.0, 1.0]),
        ];
        Self::new(vertices, vec![0, 1, 2, 2, 3, 0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_counts_and_bounds() {
        let grid = MeshData::grid(4, 1.0);
        assert_eq!(grid.vertices.len(), 25);
        assert_eq!(grid.indices.len(), 4 * 4 * 6);
        let bbox = grid.bbox.unwrap();
        assert_eq!(bbox.min, Vec3::new(-2.0, 0.0, -2.0));
        assert_eq!(bbox.max, Vec3::new(2.0, 0.0, 2.0));
    }

    #[test]
    fn grid_indices_in_range() {
        let grid = MeshData::grid(8, 0.5);
        let count = grid.vertices.len() as u32;
        assert!(grid.indices.iter().all(|&i| i < count));
    }

    #[test]
    fn cylinder_spans_height_and_radius() {
        let cyl = MeshData::cylinder(64, 128.0, 256.0);
        assert_eq!(cyl.triangle_count(), 128);
        let bbox = cyl.bbox.unwrap();
        assert!((bbox.max.y - 128.0).abs() < 1e-4);
        assert!((bbox.min.y + 128.0).abs() < 1e-4);
        assert!((bbox.max.x - 128.0).abs() < 1e-3);
    }

    #[test]
    fn plane_covers_clip_space() {
        let plane = MeshData::plane();
        assert_eq!(plane.triangle_count(), 2);
        let bbox = plane.bbox.unwrap();
        assert_eq!(bbox.min.truncate(), glam::Vec2::splat(-1.0));
        assert_eq!(bbox.max.truncate(), glam::Vec2::splat(1.0));
    }

    #[test]
    fn empty_mesh_has_no_bbox() {
        assert!(MeshData::new(Vec::new(), Vec::new()).bbox.is_none());
    }
}
