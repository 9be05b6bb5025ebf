//! Wave field: a fixed bank of Gerstner waves for the ocean surface.
//!
//! # Invariants
//! - Every generated wave has its steepness normalized as `Q / (A * w * 8)`.
//! - Waves `0..3` are long swells, `3..8` are short choppy waves.
//! - The bank is uploaded as a whole; there are no partial updates.

mod bank;
mod generator;
mod wave;

pub use bank::{WaveBank, WaveError, WaveGroup};
pub use generator::{WaveGenParams, WaveGenerator, WaveGroupParams};
pub use wave::{LOW_FREQUENCY_COUNT, STEEPNESS_NORMALIZATION, WAVE_COUNT, Wave};
