use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

/// Shape of the generated island.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IslandShape {
    /// Height of the island center above sea level, in world units.
    pub peak: f32,
    /// Depth of the sea floor far from the island.
    pub floor: f32,
    /// Radius of the island relative to the half-width of the map.
    pub radius: f32,
    /// Amplitude of the fractal detail added on top of the radial profile.
    pub roughness: f32,
    pub octaves: usize,
    /// Noise frequency in cycles per texel.
    pub frequency: f64,
}

impl Default for IslandShape {
    fn default() -> Self {
        Self {
            peak: 1.5,
            floor: -2.0,
            radius: 0.45,
            roughness: 0.8,
            octaves: 6,
            frequency: 1.0 / 256.0,
        }
    }
}

/// Square grid of world-space heights, row-major, `x` fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightmap {
    width: u32,
    heights: Vec<f32>,
}

impl Heightmap {
    pub fn from_heights(width: u32, heights: Vec<f32>) -> Option<Self> {
        (heights.len() == (width as usize) * (width as usize)).then_some(Self { width, heights })
    }

    /// Fractal island: a radial dome falling to the sea floor, roughened by fBm noise.
    pub fn island(width: u32, seed: u32, shape: &IslandShape) -> Self {
        let fbm = Fbm::<Perlin>::new(seed)
            .set_octaves(shape.octaves.max(1))
            .set_frequency(shape.frequency)
            .set_lacunarity(2.0)
            .set_persistence(0.5);
        let half = width as f32 * 0.5;
        let radius = (shape.radius * half).max(1.0);

        let mut heights = Vec::with_capacity((width * width) as usize);
        for y in 0..width {
            for x in 0..width {
                let dx = (x as f32 + 0.5 - half) / radius;
                let dy = (y as f32 + 0.5 - half) / radius;
                let falloff = (1.0 - (dx * dx + dy * dy)).max(-1.0);
                let dome = if falloff >= 0.0 {
                    falloff * shape.peak
                } else {
                    -falloff * shape.floor
                };
                let detail = fbm.get([x as f64, y as f64]) as f32 * shape.roughness;
                // Detail fades out over open sea.
                let weight = (falloff + 1.0).clamp(0.0, 1.0);
                heights.push(dome + detail * weight);
            }
        }
        tracing::debug!(width, seed, "generated island heightmap");
        Self { width, heights }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    /// Height at integer texel coordinates, clamped to the border.
    pub fn texel(&self, x: i32, y: i32) -> f32 {
        let max = self.width as i32 - 1;
        let x = x.clamp(0, max) as usize;
        let y = y.clamp(0, max) as usize;
        self.heights[y * self.width as usize + x]
    }

    /// Bilinear height at fractional texel coordinates.
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let (fx, fy) = (x - x0, y - y0);
        let (x0, y0) = (x0 as i32, y0 as i32);
        let top = self.texel(x0, y0) * (1.0 - fx) + self.texel(x0 + 1, y0) * fx;
        let bottom = self.texel(x0, y0 + 1) * (1.0 - fx) + self.texel(x0 + 1, y0 + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Lowest and highest height.
    pub fn range(&self) -> (f32, f32) {
        self.heights
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &h| (lo.min(h), hi.max(h)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.heights)
    }
}

/// Tileable-looking fBm noise used to break up material transitions.
///
/// Values are remapped from `[-1, 1]` to `[0, 1]`.
pub fn transition_noise(size: u32, seed: u32) -> Vec<f32> {
    let fbm = Fbm::<Perlin>::new(seed)
        .set_octaves(4)
        .set_persistence(0.5)
        .set_lacunarity(2.0)
        .set_frequency(0.01);
    let mut values = Vec::with_capacity((size * size) as usize);
    for y in 0..size {
        for x in 0..size {
            let v = fbm.get([x as f64, y as f64]) as f32;
            values.push((v * 0.5 + 0.5).clamp(0.0, 1.0));
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn island_is_high_in_the_middle_and_low_at_the_edges() {
        let map = Heightmap::island(128, 4567, &IslandShape::default());
        let center = map.texel(64, 64);
        let corner = map.texel(0, 0);
        assert!(center > 0.0, "center {center}");
        assert!(corner < 0.0, "corner {corner}");
    }

    #[test]
    fn same_seed_same_heights() {
        let shape = IslandShape::default();
        assert_eq!(
            Heightmap::island(32, 1, &shape),
            Heightmap::island(32, 1, &shape)
        );
    }

    #[test]
    fn bilinear_sampling_interpolates() {
        let map = Heightmap::from_heights(2, vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(map.sample(0.0, 0.0), 0.0);
        assert!((map.sample(0.5, 0.0) - 0.5).abs() < 1e-6);
        assert!((map.sample(0.5, 0.5) - 1.5).abs() < 1e-6);
        // Clamped past the border.
        assert_eq!(map.sample(5.0, 5.0), 3.0);
    }

    #[test]
    fn from_heights_checks_length() {
        assert!(Heightmap::from_heights(3, vec![0.0; 8]).is_none());
    }

    #[test]
    fn transition_noise_in_unit_range() {
        let values = transition_noise(64, 9);
        assert_eq!(values.len(), 64 * 64);
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        let (lo, hi) = values
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        assert!(hi > lo);
    }

    #[test]
    fn bytes_cover_every_texel() {
        let map = Heightmap::island(16, 2, &IslandShape::default());
        assert_eq!(map.as_bytes().len(), 16 * 16 * 4);
        let (lo, hi) = map.range();
        assert!(lo <= hi);
    }
}
