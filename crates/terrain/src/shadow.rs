use glam::{Vec2, Vec3};

use crate::heightmap::Heightmap;

/// Lit texel value in the shadow mask.
pub const LIT: u8 = 255;
/// Shadowed texel value in the shadow mask.
pub const SHADOWED: u8 = 0;

/// Ray-marches the heightmap toward the light and marks occluded texels.
///
/// `light` points from the ground toward the sun. The mask is `resolution`
/// texels wide, covering the same area as the heightmap, one byte per texel.
/// A sun at or below the horizon shadows everything.
pub fn shadow_mask(map: &Heightmap, resolution: u32, light: Vec3, texel_size: f32) -> Vec<u8> {
    let resolution = resolution.max(1);
    let count = (resolution * resolution) as usize;
    let light = light.normalize_or_zero();
    if light.y <= 0.0 {
        return vec![SHADOWED; count];
    }

    let horizontal = Vec2::new(light.x, light.z);
    let run = horizontal.length();
    if run <= f32::EPSILON {
        // Sun straight overhead.
        return vec![LIT; count];
    }
    // One heightmap texel per step, rising by the light slope.
    let step = horizontal / run;
    let rise = light.y / run * texel_size;
    let (_, max_height) = map.range();
    let scale = map.width() as f32 / resolution as f32;

    let mut mask = Vec::with_capacity(count);
    for y in 0..resolution {
        for x in 0..resolution {
            let start = Vec2::new((x as f32 + 0.5) * scale, (y as f32 + 0.5) * scale);
            mask.push(march(map, start, step, rise, max_height));
        }
    }
    mask
}

fn march(map: &Heightmap, start: Vec2, step: Vec2, rise: f32, max_height: f32) -> u8 {
    let width = map.width() as f32;
    let mut height = map.sample(start.x - 0.5, start.y - 0.5);
    let mut pos = start;
    loop {
        pos += step;
        height += rise;
        if height > max_height || pos.x < 0.0 || pos.y < 0.0 || pos.x >= width || pos.y >= width {
            return LIT;
        }
        if map.sample(pos.x - 0.5, pos.y - 0.5) > height {
            return SHADOWED;
        }
    }
}

/// Fraction of lit texels.
pub fn lit_fraction(mask: &[u8]) -> f32 {
    if mask.is_empty() {
        return 0.0;
    }
    mask.iter().filter(|&&v| v == LIT).count() as f32 / mask.len() as f32
}
