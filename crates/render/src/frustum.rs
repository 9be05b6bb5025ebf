//! View frustum for visibility culling.

use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};
use tidewater_common::Aabb;

/// Six world-space planes (left, right, bottom, top, near, far).
///
/// Each plane stores `(normal, d)` with the normal pointing into the frustum,
/// so a point `p` is inside when `normal.dot(p) + d >= 0` for every plane.
/// Built from a view-projection matrix with a `[0, 1]` clip depth range.
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    pub planes: [Vec4; 6],
}

impl Frustum {
    pub fn from_view_proj(view_proj: &Mat4) -> Self {
        let m = view_proj.transpose();
        let planes = [
            m.w_axis + m.x_axis,
            m.w_axis - m.x_axis,
            m.w_axis + m.y_axis,
            m.w_axis - m.y_axis,
            m.z_axis,
            m.w_axis - m.z_axis,
        ]
        .map(normalize_plane);
        Self { planes }
    }

    /// Conservative box test: `false` only when the box lies entirely outside one plane.
    ///
    /// Boxes straddling a corner of the frustum may pass while being outside,
    /// but a visible box is never rejected.
    pub fn intersects(&self, bbox: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let normal = plane.xyz();
            let farthest = Vec3::select(normal.cmpge(Vec3::ZERO), bbox.max, bbox.min);
            normal.dot(farthest) + plane.w >= 0.0
        })
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.xyz().dot(point) + plane.w >= 0.0)
    }
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let len = plane.xyz().length();
    if len > f32::EPSILON { plane / len } else { plane }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_down_negative_z() -> Frustum {
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        Frustum::from_view_proj(&(proj * view))
    }

    fn unit_box_at(center: Vec3) -> Aabb {
        Aabb::new(center - Vec3::splat(0.5), center + Vec3::splat(0.5))
    }

    #[test]
    fn box_in_front_is_visible() {
        let f = looking_down_negative_z();
        assert!(f.intersects(&unit_box_at(Vec3::new(0.0, 0.0, -10.0))));
    }

    #[test]
    fn box_behind_is_culled() {
        let f = looking_down_negative_z();
        assert!(!f.intersects(&unit_box_at(Vec3::new(0.0, 0.0, 10.0))));
    }

    #[test]
    fn box_past_far_plane_is_culled() {
        let f = looking_down_negative_z();
        assert!(!f.intersects(&unit_box_at(Vec3::new(0.0, 0.0, -200.0))));
    }

    #[test]
    fn box_far_to_the_side_is_culled() {
        let f = looking_down_negative_z();
        assert!(!f.intersects(&unit_box_at(Vec3::new(50.0, 0.0, -10.0))));
    }

    #[test]
    fn straddling_box_is_kept() {
        let f = looking_down_negative_z();
        let big = Aabb::new(Vec3::new(-100.0, -5.0, -50.0), Vec3::new(100.0, 5.0, 50.0));
        assert!(f.intersects(&big));
    }

    #[test]
    fn visible_corner_keeps_box() {
        let f = looking_down_negative_z();
        // Only the corner nearest the axis pokes into view.
        let b = Aabb::new(Vec3::new(5.0, 0.0, -20.0), Vec3::new(30.0, 1.0, -10.0));
        assert!(f.contains_point(Vec3::new(5.0, 0.5, -20.0)));
        assert!(f.intersects(&b));
    }

    #[test]
    fn planes_are_normalized() {
        for plane in looking_down_negative_z().planes {
            assert!((plane.xyz().length() - 1.0).abs() < 1e-5);
        }
    }
}
