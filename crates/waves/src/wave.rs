use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Number of waves in a bank. Shaders declare a fixed-size array of this length.
pub const WAVE_COUNT: usize = 8;

/// Waves `0..LOW_FREQUENCY_COUNT` form the low-frequency group, the rest the choppy group.
pub const LOW_FREQUENCY_COUNT: usize = 3;

/// Divisor of the steepness normalization `Q / (A * w * NORMALIZATION)`.
pub const STEEPNESS_NORMALIZATION: f32 = 8.0;

/// One Gerstner wave, laid out as two `vec4<f32>` for direct GPU upload.
///
/// `aqwp` is (amplitude, steepness, angular frequency, phase).
/// `di_angle_active` is (direction x, direction y, angle in radians, active flag).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Wave {
    pub aqwp: [f32; 4],
    pub di_angle_active: [f32; 4],
}

impl Wave {
    /// Build an active wave from a raw steepness, normalizing it against amplitude and frequency.
    pub fn new(amplitude: f32, raw_steepness: f32, frequency: f32, phase: f32, angle: f32) -> Self {
        let mut wave = Self {
            aqwp: [amplitude, raw_steepness, frequency, phase],
            di_angle_active: [0.0, 0.0, 0.0, 1.0],
        };
        wave.set_angle(angle);
        wave.aqwp[1] /= amplitude * frequency * STEEPNESS_NORMALIZATION;
        wave
    }

    pub fn amplitude(&self) -> f32 {
        self.aqwp[0]
    }

    /// Normalized steepness `Q`.
    pub fn steepness(&self) -> f32 {
        self.aqwp[1]
    }

    pub fn frequency(&self) -> f32 {
        self.aqwp[2]
    }

    pub fn phase(&self) -> f32 {
        self.aqwp[3]
    }

    pub fn angle(&self) -> f32 {
        self.di_angle_active[2]
    }

    pub fn direction(&self) -> Vec2 {
        Vec2::new(self.di_angle_active[0], self.di_angle_active[1])
    }

    pub fn is_active(&self) -> bool {
        self.di_angle_active[3] > 0.001
    }

    /// Steepness before normalization, `Q * A * w * 8`.
    pub fn raw_steepness(&self) -> f32 {
        self.steepness() * self.amplitude() * self.frequency() * STEEPNESS_NORMALIZATION
    }

    /// Horizontal displacement bound `Q * A * w` contributed by this wave.
    pub fn displacement_factor(&self) -> f32 {
        self.steepness() * self.amplitude() * self.frequency()
    }

    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.aqwp[0] = amplitude;
    }

    pub fn set_steepness(&mut self, steepness: f32) {
        self.aqwp[1] = steepness;
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.aqwp[2] = frequency;
    }

    pub fn set_phase(&mut self, phase: f32) {
        self.aqwp[3] = phase;
    }

    /// Set the propagation angle; the direction vector follows.
    pub fn set_angle(&mut self, angle: f32) {
        let (s, c) = angle.sin_cos();
        self.di_angle_active[0] = c;
        self.di_angle_active[1] = s;
        self.di_angle_active[2] = angle;
    }

    pub fn set_active(&mut self, active: bool) {
        self.di_angle_active[3] = if active { 1.0 } else { 0.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wave_layout_is_two_vec4() {
        assert_eq!(std::mem::size_of::<Wave>(), 32);
    }

    #[test]
    fn new_normalizes_steepness() {
        let w = Wave::new(0.02, 1.2, 10.0, 1.0, 0.5);
        assert!((w.steepness() - 1.2 / (0.02 * 10.0 * 8.0)).abs() < 1e-6);
        assert!((w.raw_steepness() - 1.2).abs() < 1e-5);
        assert!(w.is_active());
    }

    #[test]
    fn set_angle_updates_direction() {
        let mut w = Wave::new(0.02, 1.0, 10.0, 0.0, 0.0);
        w.set_angle(std::f32::consts::FRAC_PI_2);
        assert!(w.direction().x.abs() < 1e-6);
        assert!((w.direction().y - 1.0).abs() < 1e-6);
        assert_eq!(w.angle(), std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn deactivated_wave_keeps_parameters() {
        let mut w = Wave::new(0.02, 1.0, 10.0, 0.3, 1.0);
        let before = w.aqwp;
        w.set_active(false);
        assert!(!w.is_active());
        assert_eq!(w.aqwp, before);
        w.set_active(true);
        assert!(w.is_active());
    }
}
