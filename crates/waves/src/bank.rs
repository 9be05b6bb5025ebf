use crate::generator::WaveGenerator;
use crate::wave::{LOW_FREQUENCY_COUNT, WAVE_COUNT, Wave};

/// Errors from wave bank edits.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WaveError {
    #[error("wave index {0} out of range")]
    IndexOutOfRange(usize),
}

/// Which frequency group a wave slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveGroup {
    Low,
    High,
}

/// The fixed bank of waves, tracking whether the GPU copy is stale.
///
/// Any mutation marks the whole bank dirty; the owner re-uploads it in one
/// write and then calls [`WaveBank::mark_uploaded`].
#[derive(Debug, Clone)]
pub struct WaveBank {
    waves: [Wave; WAVE_COUNT],
    dirty: bool,
    revision: u64,
}

impl WaveBank {
    /// Build a bank from a first generation.
    pub fn generate(generator: &mut WaveGenerator) -> Self {
        Self {
            waves: generator.generate(),
            dirty: true,
            revision: 1,
        }
    }

    /// Replace every slot with a fresh generation.
    pub fn regenerate(&mut self, generator: &mut WaveGenerator) {
        self.waves = generator.generate();
        self.touch();
    }

    pub fn waves(&self) -> &[Wave; WAVE_COUNT] {
        &self.waves
    }

    pub fn get(&self, index: usize) -> Option<&Wave> {
        self.waves.get(index)
    }

    pub fn group(index: usize) -> WaveGroup {
        if index < LOW_FREQUENCY_COUNT {
            WaveGroup::Low
        } else {
            WaveGroup::High
        }
    }

    /// Apply an interactive edit to one wave. The bank is marked dirty only if the wave changed.
    pub fn edit(&mut self, index: usize, f: impl FnOnce(&mut Wave)) -> Result<bool, WaveError> {
        let wave = self
            .waves
            .get_mut(index)
            .ok_or(WaveError::IndexOutOfRange(index))?;
        let before = *wave;
        f(wave);
        let changed = *wave != before;
        if changed {
            self.touch();
        }
        Ok(changed)
    }

    pub fn set_active(&mut self, index: usize, active: bool) -> Result<bool, WaveError> {
        self.edit(index, |w| w.set_active(active))
    }

    pub fn active_count(&self) -> usize {
        self.waves.iter().filter(|w| w.is_active()).count()
    }

    /// Sum of `Q * A * w` over active waves; Gerstner crests fold once this exceeds one.
    pub fn total_displacement_factor(&self) -> f32 {
        self.waves
            .iter()
            .filter(|w| w.is_active())
            .map(Wave::displacement_factor)
            .sum()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Incremented on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn mark_uploaded(&mut self) {
        self.dirty = false;
    }

    /// Raw bytes of the whole bank, in GPU layout.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.waves)
    }

    pub fn byte_size() -> u64 {
        (WAVE_COUNT * std::mem::size_of::<Wave>()) as u64
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_bank_is_dirty() {
        let bank = WaveBank::generate(&mut WaveGenerator::with_seed(1));
        assert!(bank.is_dirty());
        assert_eq!(bank.active_count(), WAVE_COUNT);
        assert_eq!(bank.as_bytes().len() as u64, WaveBank::byte_size());
    }

    #[test]
    fn edit_marks_dirty_only_on_change() {
        let mut bank = WaveBank::generate(&mut WaveGenerator::with_seed(1));
        bank.mark_uploaded();
        let rev = bank.revision();

        assert_eq!(bank.set_active(0, true), Ok(false));
        assert!(!bank.is_dirty());

        assert_eq!(bank.set_active(0, false), Ok(true));
        assert!(bank.is_dirty());
        assert_eq!(bank.revision(), rev + 1);
        assert_eq!(bank.active_count(), WAVE_COUNT - 1);
    }

    #[test]
    fn edit_out_of_range() {
        let mut bank = WaveBank::generate(&mut WaveGenerator::with_seed(1));
        assert_eq!(
            bank.edit(WAVE_COUNT, |w| w.set_phase(0.0)),
            Err(WaveError::IndexOutOfRange(WAVE_COUNT))
        );
    }

    #[test]
    fn angle_edit_keeps_direction_consistent() {
        let mut bank = WaveBank::generate(&mut WaveGenerator::with_seed(5));
        bank.edit(4, |w| w.set_angle(std::f32::consts::PI)).unwrap();
        let w = bank.get(4).unwrap();
        assert!((w.direction().x + 1.0).abs() < 1e-6);
    }

    #[test]
    fn regenerate_replaces_waves() {
        let mut generator = WaveGenerator::with_seed(9);
        let mut bank = WaveBank::generate(&mut generator);
        let first = *bank.waves();
        bank.mark_uploaded();
        bank.regenerate(&mut generator);
        assert!(bank.is_dirty());
        assert_ne!(first, *bank.waves());
    }

    #[test]
    fn groups_split_at_low_count() {
        assert_eq!(WaveBank::group(0), WaveGroup::Low);
        assert_eq!(WaveBank::group(2), WaveGroup::Low);
        assert_eq!(WaveBank::group(3), WaveGroup::High);
        assert_eq!(WaveBank::group(7), WaveGroup::High);
    }

    #[test]
    fn inactive_waves_do_not_displace() {
        let mut bank = WaveBank::generate(&mut WaveGenerator::with_seed(2));
        let all = bank.total_displacement_factor();
        for i in 0..WAVE_COUNT {
            bank.set_active(i, false).unwrap();
        }
        assert_eq!(bank.total_displacement_factor(), 0.0);
        assert!(all > 0.0);
    }
}
