use std::f32::consts::PI;
use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::wave::{LOW_FREQUENCY_COUNT, WAVE_COUNT, Wave};

/// Sampling ranges for one group of waves.
///
/// Amplitude is `base_amplitude + U(amplitude_jitter)`, frequency is
/// `base_frequency + U(frequency_jitter)`, raw steepness is
/// `steepness_scale * U(steepness)`. The angle of the `j`-th wave of an
/// `n`-wave group is `((2/n) * (j + U(-angle_variance, angle_variance)) + angle_offset) * PI`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveGroupParams {
    pub base_amplitude: f32,
    pub amplitude_jitter: (f32, f32),
    pub steepness: (f32, f32),
    pub steepness_scale: f32,
    pub base_frequency: f32,
    pub frequency_jitter: (f32, f32),
    pub phase: (f32, f32),
    /// Angular offset of the group, in multiples of PI.
    pub angle_offset: f32,
}

impl WaveGroupParams {
    /// Long swells.
    pub fn low_frequency() -> Self {
        Self {
            base_amplitude: 0.025,
            amplitude_jitter: (-0.01, 0.01),
            steepness: (0.1, 0.5),
            steepness_scale: 3.0,
            base_frequency: 2.5,
            frequency_jitter: (-1.5, 1.5),
            phase: (0.2, 1.5),
            angle_offset: 0.0,
        }
    }

    /// Short choppy waves.
    pub fn high_frequency() -> Self {
        Self {
            base_amplitude: 0.02,
            amplitude_jitter: (-0.01, 0.01),
            steepness: (0.6, 1.0),
            steepness_scale: 3.0,
            base_frequency: 10.0,
            frequency_jitter: (-3.0, 8.0),
            phase: (1.0, 3.0),
            angle_offset: 0.2,
        }
    }

    pub fn amplitude_range(&self) -> RangeInclusive<f32> {
        self.base_amplitude + self.amplitude_jitter.0..=self.base_amplitude + self.amplitude_jitter.1
    }

    pub fn frequency_range(&self) -> RangeInclusive<f32> {
        self.base_frequency + self.frequency_jitter.0..=self.base_frequency + self.frequency_jitter.1
    }

    pub fn raw_steepness_range(&self) -> RangeInclusive<f32> {
        self.steepness_scale * self.steepness.0..=self.steepness_scale * self.steepness.1
    }

    /// Base angle of wave `index` in a group of `group_size`, before jitter.
    pub fn base_angle(&self, index: usize, group_size: usize) -> f32 {
        ((2.0 / group_size as f32) * index as f32 + self.angle_offset) * PI
    }
}

/// Parameters of the whole bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveGenParams {
    pub low: WaveGroupParams,
    pub high: WaveGroupParams,
    /// Angle jitter, in units of the group's angular spacing.
    pub angle_variance: f32,
}

impl Default for WaveGenParams {
    fn default() -> Self {
        Self {
            low: WaveGroupParams::low_frequency(),
            high: WaveGroupParams::high_frequency(),
            angle_variance: 0.5,
        }
    }
}

impl WaveGenParams {
    /// Largest raw steepness either group can produce.
    pub fn max_raw_steepness(&self) -> f32 {
        self.low
            .raw_steepness_range()
            .end()
            .max(*self.high.raw_steepness_range().end())
    }
}

/// Seeded generator of constrained Gerstner wave banks.
pub struct WaveGenerator {
    params: WaveGenParams,
    rng: StdRng,
}

impl WaveGenerator {
    pub fn new(params: WaveGenParams, seed: u64) -> Self {
        Self {
            params,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(WaveGenParams::default(), seed)
    }

    pub fn params(&self) -> &WaveGenParams {
        &self.params
    }

    /// Sample a full bank. Successive calls continue the same random stream.
    pub fn generate(&mut self) -> [Wave; WAVE_COUNT] {
        let mut waves = [Wave::new(1.0, 0.0, 1.0, 0.0, 0.0); WAVE_COUNT];
        let high_count = WAVE_COUNT - LOW_FREQUENCY_COUNT;

        for (j, slot) in waves[..LOW_FREQUENCY_COUNT].iter_mut().enumerate() {
            *slot = sample_wave(
                &mut self.rng,
                &self.params.low,
                j,
                LOW_FREQUENCY_COUNT,
                self.params.angle_variance,
            );
        }
        for (j, slot) in waves[LOW_FREQUENCY_COUNT..].iter_mut().enumerate() {
            *slot = sample_wave(
                &mut self.rng,
                &self.params.high,
                j,
                high_count,
                self.params.angle_variance,
            );
        }

        tracing::debug!(
            low = LOW_FREQUENCY_COUNT,
            high = high_count,
            "generated wave bank"
        );
        waves
    }
}

fn sample_wave(
    rng: &mut StdRng,
    group: &WaveGroupParams,
    index: usize,
    group_size: usize,
    angle_variance: f32,
) -> Wave {
    let amplitude = rng.gen_range(group.amplitude_range());
    let raw_steepness = rng.gen_range(group.raw_steepness_range());
    let frequency = rng.gen_range(group.frequency_range());
    let phase = rng.gen_range(group.phase.0..=group.phase.1);
    let jitter = rng.gen_range(-angle_variance..=angle_variance);
    let angle = group.base_angle(index, group_size) + (2.0 / group_size as f32) * jitter * PI;
    Wave::new(amplitude, raw_steepness, frequency, phase, angle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extremes(range: RangeInclusive<f32>) -> [f32; 2] {
        [*range.start(), *range.end()]
    }

    #[test]
    fn same_seed_same_bank() {
        let a = WaveGenerator::with_seed(7).generate();
        let b = WaveGenerator::with_seed(7).generate();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let a = WaveGenerator::with_seed(1).generate();
        let b = WaveGenerator::with_seed(2).generate();
        assert_ne!(a, b);
    }

    #[test]
    fn normalization_round_trips() {
        let params = WaveGenParams::default();
        for seed in 0..32 {
            let waves = WaveGenerator::with_seed(seed).generate();
            for (i, w) in waves.iter().enumerate() {
                let group = if i < LOW_FREQUENCY_COUNT {
                    &params.low
                } else {
                    &params.high
                };
                let raw = w.raw_steepness();
                let range = group.raw_steepness_range();
                assert!(w.steepness() >= 0.0);
                assert!(raw >= range.start() - 1e-4 && raw <= range.end() + 1e-4);
            }
        }
    }

    #[test]
    fn directions_match_angles() {
        for seed in [3, 11, 4242] {
            for w in WaveGenerator::with_seed(seed).generate() {
                let (s, c) = w.angle().sin_cos();
                assert!((w.direction().x - c).abs() < 1e-6);
                assert!((w.direction().y - s).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn frequency_groups_are_disjoint() {
        let params = WaveGenParams::default();
        assert!(params.low.frequency_range().end() < params.high.frequency_range().start());
        for seed in 0..16 {
            let waves = WaveGenerator::with_seed(seed).generate();
            let max_low = waves[..LOW_FREQUENCY_COUNT]
                .iter()
                .map(Wave::frequency)
                .fold(f32::MIN, f32::max);
            let min_high = waves[LOW_FREQUENCY_COUNT..]
                .iter()
                .map(Wave::frequency)
                .fold(f32::MAX, f32::min);
            assert!(max_low < min_high);
        }
    }

    #[test]
    fn steepness_bound_holds_at_sampling_extremes() {
        let params = WaveGenParams::default();
        let bound = params.max_raw_steepness() / crate::STEEPNESS_NORMALIZATION;
        for group in [&params.low, &params.high] {
            for a in extremes(group.amplitude_range()) {
                for w in extremes(group.frequency_range()) {
                    for q in extremes(group.raw_steepness_range()) {
                        let wave = Wave::new(a, q, w, 0.0, 0.0);
                        assert!(wave.steepness() >= 0.0);
                        assert!(wave.displacement_factor() <= bound + 1e-6);
                    }
                }
            }
        }
    }

    #[test]
    fn steepness_bound_holds_across_seeds() {
        let params = WaveGenParams::default();
        let bound = params.max_raw_steepness() / crate::STEEPNESS_NORMALIZATION;
        for seed in [0, u64::MAX, 123_456_789] {
            let mut generator = WaveGenerator::with_seed(seed);
            for _ in 0..2 {
                for w in generator.generate() {
                    assert!(w.steepness() <= bound / (w.amplitude() * w.frequency()) + 1e-4);
                }
            }
        }
    }

    #[test]
    fn low_group_spreads_over_full_circle() {
        let p = WaveGroupParams::low_frequency();
        assert_eq!(p.base_angle(0, 3), 0.0);
        assert!((p.base_angle(1, 3) - 2.0 * PI / 3.0).abs() < 1e-6);
        assert!((p.base_angle(2, 3) - 4.0 * PI / 3.0).abs() < 1e-6);
    }

    #[test]
    fn high_group_offset_matches_global_indexing() {
        // ((2/5) * i - 1) * PI for i in 3..8
        let p = WaveGroupParams::high_frequency();
        for j in 0..5 {
            let expected = ((2.0 / 5.0) * (j + 3) as f32 - 1.0) * PI;
            assert!((p.base_angle(j, 5) - expected).abs() < 1e-5);
        }
    }
}
