use glam::{UVec2, Vec3};
use serde::{Deserialize, Serialize};

/// Handle to a compiled shader program owned by a GPU backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgramId(pub u32);

/// Handle to a texture owned by a GPU backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextureId(pub u32);

/// Handle to an uploaded mesh owned by a GPU backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshId(pub u32);

/// Handle to a GPU-visible data buffer (uniform or storage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BufferId(pub u32);

/// Handle to a render target (one or more attachments plus optional depth).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FramebufferId(pub u32);

/// Width and height of a render target, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Half of this resolution, rounding down. Never collapses to zero.
    pub fn half(self) -> Self {
        Self {
            width: (self.width / 2).max(1),
            height: (self.height / 2).max(1),
        }
    }

    pub fn aspect_ratio(self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn as_uvec2(self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    /// Reciprocal of the size, as used for screen-space texel offsets.
    pub fn inverse_size(self) -> glam::Vec2 {
        glam::Vec2::ONE / glam::Vec2::new(self.width.max(1) as f32, self.height.max(1) as f32)
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point. Empty input yields a degenerate box at the origin.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::new(Vec3::ZERO, Vec3::ZERO);
        };
        iter.fold(Self::new(first, first), |acc, p| {
            Self::new(acc.min.min(p), acc.max.max(p))
        })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }

    /// The eight corners, in min/max bit order (x fastest).
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Scale both corners then translate, as done when mapping a local cell box to world space.
    pub fn scaled_translated(&self, scale: f32, translation: Vec3) -> Self {
        Self::new(self.min * scale + translation, self.max * scale + translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_resolution_rounds_down() {
        assert_eq!(Resolution::new(1920, 1080).half(), Resolution::new(960, 540));
        assert_eq!(Resolution::new(1281, 721).half(), Resolution::new(640, 360));
        assert_eq!(Resolution::new(1, 1).half(), Resolution::new(1, 1));
    }

    #[test]
    fn resolution_display() {
        assert_eq!(Resolution::new(640, 360).to_string(), "640x360");
    }

    #[test]
    fn aabb_from_points() {
        let b = Aabb::from_points([
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-1.0, 3.0, 0.0),
            Vec3::new(0.0, 0.0, 4.0),
        ]);
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 3.0, 4.0));
        assert_eq!(b.center(), Vec3::new(0.0, 0.5, 2.0));
    }

    #[test]
    fn aabb_corners_cover_box() {
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::splat(2.0));
        let corners = b.corners();
        assert_eq!(corners[0], b.min);
        assert_eq!(corners[7], b.max);
        assert_eq!(Aabb::from_points(corners), b);
    }

    #[test]
    fn aabb_scale_translate() {
        let b = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));
        let t = b.scaled_translated(2.0, Vec3::new(10.0, 0.0, -10.0));
        assert_eq!(t.min, Vec3::new(10.0, 0.0, -10.0));
        assert_eq!(t.max, Vec3::new(12.0, 2.0, -8.0));
    }
}
