//! Up/down events to brightness

use log::*;
use lumen_mcu::{Actuator, Storage};

use crate::settings::SettingsStore;

/// Brightness index after boot
pub const START_INDEX: usize = 0;

/// Stepped brightness cursor driving the actuator
///
/// The index is deliberately not persisted; every boot starts at
/// [`START_INDEX`].
pub struct ControlEngine<A: Actuator> {
    actuator: A,
    index: usize,
}

impl<A: Actuator> ControlEngine<A> {
    pub fn new(actuator: A) -> Self {
        Self {
            actuator,
            index: START_INDEX,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Step one level up or down, clamped to the selected profile, and drive
    /// the actuator. Returns the new level.
    pub fn on_up_down<S: Storage>(&mut self, increase: bool, settings: &SettingsStore<S>) -> f32 {
        let last = settings.level_count().saturating_sub(1);
        // The profile may have shrunk since the last event
        let index = self.index.min(last);
        self.index = if increase {
            (index + 1).min(last)
        } else {
            index.saturating_sub(1)
        };
        self.drive(settings)
    }

    /// Re-send the level at the current index (boot, profile change)
    pub fn apply_current<S: Storage>(&mut self, settings: &SettingsStore<S>) -> f32 {
        self.index = self.index.min(settings.level_count().saturating_sub(1));
        self.drive(settings)
    }

    fn drive<S: Storage>(&mut self, settings: &SettingsStore<S>) -> f32 {
        let level = settings.current_level(self.index);
        debug!("Brightness index {} -> level {level}", self.index);
        if let Err(e) = self.actuator.set_level(level) {
            warn!("Actuator rejected level {level}: {e}");
        }
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingActuator;
    use crate::settings::Profiles;
    use crate::storage::MemoryStorage;

    fn settings() -> SettingsStore<MemoryStorage> {
        SettingsStore::load(MemoryStorage::default())
    }

    #[test]
    fn steps_and_clamps() {
        let settings = settings();
        let actuator = RecordingActuator::default();
        let mut control = ControlEngine::new(actuator.clone());

        assert_eq!(control.on_up_down(false, &settings), 0.0);
        assert_eq!(control.index(), 0);
        for _ in 0..10 {
            control.on_up_down(true, &settings);
        }
        assert_eq!(control.index(), 4);
        assert_eq!(control.on_up_down(false, &settings), 0.75);
        assert_eq!(actuator.levels().last(), Some(&0.75));
    }

    #[test]
    fn index_stays_in_range_for_any_sequence() {
        let settings = settings();
        let mut control = ControlEngine::new(RecordingActuator::default());
        let count = settings.level_count();

        // Deterministic pseudo-random walk
        let mut seed: u32 = 0x1234_5678;
        for _ in 0..1000 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let increase = seed >> 31 == 1;
            let before = control.index();
            control.on_up_down(increase, &settings);
            let after = control.index();

            assert!(after < count);
            if increase {
                assert_eq!(after, (before + 1).min(count - 1));
            } else {
                assert_eq!(after, before.saturating_sub(1));
            }
        }
    }

    #[test]
    fn shrinking_profile_clamps_index() {
        let mut settings = settings();
        let mut control = ControlEngine::new(RecordingActuator::default());
        for _ in 0..4 {
            control.on_up_down(true, &settings);
        }

        let mut profiles = Profiles::new();
        profiles.insert("default".to_string(), vec![0.2, 0.4]);
        settings.replace_profiles(profiles).unwrap();

        assert_eq!(control.apply_current(&settings), 0.4);
        assert_eq!(control.index(), 1);
        assert_eq!(control.on_up_down(false, &settings), 0.2);
    }

    #[test]
    fn actuator_failure_is_not_fatal() {
        let settings = settings();
        let actuator = RecordingActuator::failing();
        let mut control = ControlEngine::new(actuator.clone());
        assert_eq!(control.on_up_down(true, &settings), 0.25);
        assert_eq!(control.index(), 1);
        assert!(actuator.levels().is_empty());
    }
}
