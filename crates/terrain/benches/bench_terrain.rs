use std::hint::black_box;
use std::time::Instant;

use glam::Vec3;
use tidewater_terrain::{Heightmap, IslandShape, clipmap_layout, cell_mesh, shadow_mask};

fn bench_heightmap(width: u32, iterations: usize) {
    let shape = IslandShape::default();
    let start = Instant::now();
    for i in 0..iterations {
        black_box(Heightmap::island(width, i as u32, &shape));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  heightmap {width}x{width} ({iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn bench_shadow(width: u32, resolution: u32, iterations: usize) {
    let map = Heightmap::island(width, 4567, &IslandShape::default());
    let light = Vec3::new(0.437, 0.482, -0.896);
    let start = Instant::now();
    for _ in 0..iterations {
        black_box(shadow_mask(&map, resolution, black_box(light), 0.05));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  shadow {resolution}x{resolution} over {width}x{width} ({iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_cell_meshes(levels: u32, grid: u32, iterations: usize) {
    let start = Instant::now();
    for _ in 0..iterations {
        for layout in clipmap_layout(levels) {
            black_box(cell_mesh(&layout, grid));
        }
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  cell meshes ({levels} levels, grid {grid}, {iterations} iters): {per_iter:?}/iter");
}

fn main() {
    println!("=== Terrain Benchmarks ===");
    bench_heightmap(256, 10);
    bench_heightmap(1024, 2);
    bench_shadow(256, 128, 10);
    bench_shadow(1024, 512, 2);
    bench_cell_meshes(4, 32, 100);
}
