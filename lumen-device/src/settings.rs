//! Brightness profiles and the selected profile
//!
//! Stored as one slot: the selected profile name on the first line, followed
//! by the JSON mapping of profile name to levels.
//!
//! ```text
//! default
//! {"default":[0.0,0.25,0.5,0.75,1.0]}
//! ```

use std::collections::BTreeMap;

use log::*;
use lumen_mcu::{Slot, Storage};

use crate::error::{PersistenceError, ValidationError};

/// Profile created on first boot and used whenever storage is unusable
pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_LEVELS: [f32; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

/// Profile name -> ordered brightness levels
pub type Profiles = BTreeMap<String, Vec<f32>>;

/// All profiles plus the selected one
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsCollection {
    pub current: String,
    pub profiles: Profiles,
}

impl SettingsCollection {
    pub fn bootstrap() -> Self {
        let mut profiles = Profiles::new();
        profiles.insert(DEFAULT_PROFILE.to_string(), DEFAULT_LEVELS.to_vec());
        Self {
            current: DEFAULT_PROFILE.to_string(),
            profiles,
        }
    }

    /// Check every profile and the selection; the first violation is returned
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_profiles(&self.profiles)?;
        if !self.profiles.contains_key(&self.current) {
            return Err(ValidationError::UnknownProfile(self.current.clone()));
        }
        Ok(())
    }

    /// Levels of the selected profile
    pub fn levels(&self) -> &[f32] {
        self.profiles
            .get(&self.current)
            .map(Vec::as_slice)
            .unwrap_or(&DEFAULT_LEVELS)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ValidationError> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(self.current.as_bytes());
        buf.push(b'\n');
        serde_json::to_writer(&mut buf, &self.profiles)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        Ok(buf)
    }

    /// Parse the stored format. Only the syntax is checked here.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ValidationError> {
        let newline = data
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| ValidationError::Malformed("missing profile name line".to_string()))?;

        let current = std::str::from_utf8(&data[..newline])
            .map_err(|e| ValidationError::Malformed(e.to_string()))?
            .trim_end()
            .to_string();
        let profiles: Profiles = serde_json::from_slice(&data[newline + 1..])
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;

        Ok(Self { current, profiles })
    }

    /// Re-select (and if needed re-create) the default profile when the
    /// selection points nowhere. Returns true if anything changed.
    fn heal(&mut self) -> bool {
        if self.profiles.contains_key(&self.current) {
            return false;
        }
        warn!("Selected profile '{}' does not exist, falling back to '{DEFAULT_PROFILE}'", self.current);
        self.profiles
            .entry(DEFAULT_PROFILE.to_string())
            .or_insert_with(|| DEFAULT_LEVELS.to_vec());
        self.current = DEFAULT_PROFILE.to_string();
        true
    }
}

/// Every name non-empty, every profile non-empty, every level finite in [0, 1]
pub fn validate_profiles(profiles: &Profiles) -> Result<(), ValidationError> {
    for (name, levels) in profiles {
        if name.is_empty() {
            return Err(ValidationError::EmptyProfileName);
        }
        if levels.is_empty() {
            return Err(ValidationError::EmptyProfile(name.clone()));
        }
        for (index, level) in levels.iter().enumerate() {
            if !level.is_finite() || !(0.0..=1.0).contains(level) {
                return Err(ValidationError::LevelOutOfRange {
                    profile: name.clone(),
                    index,
                    level: *level,
                });
            }
        }
    }
    Ok(())
}

/// Owner of the persisted profiles
pub struct SettingsStore<S: Storage> {
    storage: S,
    collection: SettingsCollection,
}

impl<S: Storage> SettingsStore<S> {
    /// Load settings, bootstrapping (and persisting) the default profile when
    /// storage is absent or unusable
    pub fn load(storage: S) -> Self {
        let (collection, dirty) = match storage.read(Slot::Settings) {
            Ok(Some(bytes)) => match parse_stored(&bytes) {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!("Stored settings are invalid ({e}), using defaults");
                    (SettingsCollection::bootstrap(), true)
                }
            },
            Ok(None) => {
                info!("No settings stored, creating '{DEFAULT_PROFILE}' profile");
                (SettingsCollection::bootstrap(), true)
            }
            Err(e) => {
                warn!("Failed to read settings ({e}), using defaults");
                (SettingsCollection::bootstrap(), true)
            }
        };

        let mut store = Self { storage, collection };
        if dirty {
            store.persist_logged();
        }
        info!(
            "Settings: {} profile(s), selected '{}' with {} level(s)",
            store.collection.profiles.len(),
            store.collection.current,
            store.level_count()
        );
        store
    }

    pub fn collection(&self) -> &SettingsCollection {
        &self.collection
    }

    pub fn current_profile(&self) -> &str {
        &self.collection.current
    }

    pub fn level_count(&self) -> usize {
        self.collection.levels().len()
    }

    /// Level at `index`, clamped to the selected profile
    pub fn current_level(&self, index: usize) -> f32 {
        let levels = self.collection.levels();
        levels[index.min(levels.len() - 1)]
    }

    pub fn select_profile(&mut self, name: &str) -> Result<(), ValidationError> {
        if !self.collection.profiles.contains_key(name) {
            return Err(ValidationError::UnknownProfile(name.to_string()));
        }
        self.collection.current = name.to_string();
        info!("Selected profile '{name}'");
        self.persist_logged();
        Ok(())
    }

    /// Replace everything after validating the whole candidate
    pub fn replace_collection(&mut self, candidate: SettingsCollection) -> Result<(), ValidationError> {
        candidate.validate()?;
        self.collection = candidate;
        info!("Replaced settings: {} profile(s)", self.collection.profiles.len());
        self.persist_logged();
        Ok(())
    }

    /// Replace the profiles, keeping the current selection (which must still exist)
    pub fn replace_profiles(&mut self, profiles: Profiles) -> Result<(), ValidationError> {
        self.replace_collection(SettingsCollection {
            current: self.collection.current.clone(),
            profiles,
        })
    }

    fn persist(&mut self) -> Result<(), PersistenceError> {
        let bytes = self.collection.to_bytes().map_err(|e| PersistenceError::Write {
            slot: Slot::Settings.name(),
            reason: e.to_string(),
        })?;
        self.storage
            .write(Slot::Settings, &bytes)
            .map_err(|e| PersistenceError::Write {
                slot: Slot::Settings.name(),
                reason: e.to_string(),
            })
    }

    // In-memory settings stay authoritative when the write fails
    fn persist_logged(&mut self) {
        if let Err(e) = self.persist() {
            error!("{e}");
        }
    }
}

fn parse_stored(bytes: &[u8]) -> Result<(SettingsCollection, bool), ValidationError> {
    let mut collection = SettingsCollection::from_bytes(bytes)?;
    let healed = collection.heal();
    collection.validate()?;
    Ok((collection, healed))
}
