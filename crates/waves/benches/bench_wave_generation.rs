use std::hint::black_box;
use std::time::Instant;

use tidewater_waves::{WaveBank, WaveGenerator};

fn bench_generate(iterations: usize) {
    let mut generator = WaveGenerator::with_seed(42);
    let start = Instant::now();
    for _ in 0..iterations {
        black_box(generator.generate());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  generate ({iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn bench_regenerate_bank(iterations: usize) {
    let mut generator = WaveGenerator::with_seed(7);
    let mut bank = WaveBank::generate(&mut generator);
    let start = Instant::now();
    for _ in 0..iterations {
        bank.regenerate(&mut generator);
        black_box(bank.as_bytes());
        bank.mark_uploaded();
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  regenerate + serialize ({iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn main() {
    println!("=== Wave Bank Benchmarks ===");
    bench_generate(10_000);
    bench_generate(100_000);
    bench_regenerate_bank(10_000);
}
