use glam::Vec3;

/// Light direction and whether the environment cube and shadow map derived from it are stale.
///
/// Starts dirty so the first frame renders the environment.
#[derive(Debug, Clone)]
pub struct SkyCache {
    light_direction: Vec3,
    dirty: bool,
    generation: u64,
}

impl SkyCache {
    /// A zero direction falls back to straight up.
    pub fn new(light_direction: Vec3) -> Self {
        Self {
            light_direction: light_direction.try_normalize().unwrap_or(Vec3::Y),
            dirty: true,
            generation: 0,
        }
    }

    pub fn light_direction(&self) -> Vec3 {
        self.light_direction
    }

    /// Set the light direction, marking the cache dirty if it actually moved.
    ///
    /// Returns whether the direction changed. Zero vectors are ignored.
    pub fn set_light_direction(&mut self, direction: Vec3) -> bool {
        let Some(direction) = direction.try_normalize() else {
            return false;
        };
        if direction.abs_diff_eq(self.light_direction, 1e-6) {
            return false;
        }
        self.light_direction = direction;
        self.dirty = true;
        true
    }

    pub fn needs_update(&self) -> bool {
        self.dirty
    }

    /// Force a regeneration on the next frame.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Record a completed regeneration.
    pub fn mark_updated(&mut self) {
        self.dirty = false;
        self.generation += 1;
    }

    /// Number of regenerations performed so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
