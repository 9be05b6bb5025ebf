use glam::Vec3;
use tidewater_render::Camera;

/// Fly camera with position, yaw and pitch, driven by keyboard and mouse.
pub struct FlyCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub speed: f32,
    pub sensitivity: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self::looking_from(&Camera::default())
    }
}

impl FlyCamera {
    /// Fly camera at the pose of a look-at camera.
    pub fn looking_from(camera: &Camera) -> Self {
        let dir = camera.direction();
        Self {
            position: camera.eye,
            yaw: dir.z.atan2(dir.x),
            pitch: dir.y.clamp(-1.0, 1.0).asin(),
            fov: camera.fov_y,
            near: camera.near,
            far: camera.far,
            speed: 2.0,
            sensitivity: 0.003,
        }
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    /// Moves along the camera axes. `amount` is (right, up, forward), scaled by speed and `dt`.
    pub fn translate(&mut self, amount: Vec3, dt: f32) {
        let step = self.speed * dt;
        self.position +=
            (self.right() * amount.x + Vec3::Y * amount.y + self.forward() * amount.z) * step;
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch -= dy * self.sensitivity;
        self.pitch = self.pitch.clamp(-89.0_f32.to_radians(), 89.0_f32.to_radians());
    }

    /// Look-at camera for the renderer.
    pub fn camera(&self, aspect: f32) -> Camera {
        let mut camera = Camera {
            eye: self.position,
            center: self.position + self.forward(),
            up: Vec3::Y,
            fov_y: self.fov,
            near: self.near,
            far: self.far,
            ..Camera::default()
        };
        camera.set_aspect(aspect);
        camera
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_the_island_pose() {
        let reference = Camera::default();
        let fly = FlyCamera::default();
        let camera = fly.camera(16.0 / 9.0);
        assert_eq!(camera.eye, reference.eye);
        assert!(camera.direction().abs_diff_eq(reference.direction(), 1e-4));
    }

    #[test]
    fn translate_moves_forward() {
        let mut cam = FlyCamera::default();
        let start = cam.position;
        cam.translate(Vec3::Z, 1.0);
        assert!((cam.position - start).dot(cam.forward()) > 0.0);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = FlyCamera::default();
        cam.rotate(0.0, -1.0e6);
        assert!(cam.pitch <= 89.0_f32.to_radians());
    }

    #[test]
    fn invalid_aspect_keeps_default() {
        let camera = FlyCamera::default().camera(0.0);
        assert_eq!(camera.aspect, Camera::default().aspect);
    }
}
