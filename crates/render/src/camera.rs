use glam::{Mat3, Mat4, Vec3};

use crate::frustum::Frustum;

/// A positioned perspective camera.
///
/// Field of view is vertical, in radians. Projections use a `[0, 1]` depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub center: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    /// Overlooking the island shore from slightly above the sea.
    fn default() -> Self {
        Self {
            eye: Vec3::new(-2.234801, 3.446842, -6.892219),
            center: Vec3::new(-1.869996, 2.552125, -5.859552),
            up: Vec3::new(0.210734, 0.774429, 0.596532),
            fov_y: 1.34,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.center, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn direction(&self) -> Vec3 {
        (self.center - self.eye)
            .try_normalize()
            .unwrap_or(Vec3::NEG_Z)
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }
}

/// Camera matrices derived once per frame.
#[derive(Debug, Clone)]
pub struct FrameView {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_proj: Mat4,
    /// Clip space to world directions, ignoring the camera translation.
    pub clip_to_world: Mat4,
    pub position: Vec3,
    pub direction: Vec3,
    pub frustum: Frustum,
}

impl FrameView {
    pub fn new(camera: &Camera) -> Self {
        let view = camera.view();
        let projection = camera.projection();
        let view_proj = projection * view;
        let cam_to_world = view.inverse();
        let clip_to_cam = projection.inverse();
        let clip_to_world = Mat4::from_mat3(Mat3::from_mat4(cam_to_world)) * clip_to_cam;
        Self {
            view,
            projection,
            view_proj,
            clip_to_world,
            position: camera.eye,
            direction: camera.direction(),
            frustum: Frustum::from_view_proj(&view_proj),
        }
    }
}

/// View-projection of each cube face, in +X, -X, +Y, -Y, +Z, -Z order.
pub fn cube_face_view_projections() -> [Mat4; 6] {
    const FACES: [(Vec3, Vec3); 6] = [
        (Vec3::X, Vec3::NEG_Y),
        (Vec3::NEG_X, Vec3::NEG_Y),
        (Vec3::Y, Vec3::Z),
        (Vec3::NEG_Y, Vec3::NEG_Z),
        (Vec3::Z, Vec3::NEG_Y),
        (Vec3::NEG_Z, Vec3::NEG_Y),
    ];
    let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.01, 100.0);
    FACES.map(|(dir, up)| projection * Mat4::look_at_rh(Vec3::ZERO, dir, up))
}
