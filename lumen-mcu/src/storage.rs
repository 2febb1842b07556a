//! Persistent Storage Abstraction Traits
//!
//! Non-volatile storage is a handful of named slots. Each slot holds one value
//! and is overwritten wholesale on every write.

/// A named value in non-volatile storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Current remote key (raw bytes)
    RemoteKey,
    /// Selected profile name line followed by the JSON profile mapping
    Settings,
    /// MAC address pinned by the connectionless transport (6 raw bytes)
    PinnedMac,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::RemoteKey, Slot::Settings, Slot::PinnedMac];

    /// File (or NVS key) name of the slot
    pub fn name(&self) -> &'static str {
        match self {
            Slot::RemoteKey => "remote_key",
            Slot::Settings => "settings",
            Slot::PinnedMac => "stored_remote",
        }
    }
}

/// Trait for persistent storage operations
///
/// MCU-specific crates implement this trait using their storage backend
/// (NVS for ESP32, flash for nRF, files on a host). A write either replaces
/// the whole value or leaves the previous value in place.
pub trait Storage {
    /// Error type for storage operations
    type Error: core::fmt::Display;

    /// Read a slot, `None` if it was never written
    fn read(&self, slot: Slot) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Replace the value of a slot
    fn write(&mut self, slot: Slot, data: &[u8]) -> Result<(), Self::Error>;

    /// Remove a slot (no-op if absent)
    fn remove(&mut self, slot: Slot) -> Result<(), Self::Error>;

    /// Clear all device data (factory reset)
    fn clear_all(&mut self) -> Result<(), Self::Error> {
        for slot in Slot::ALL {
            self.remove(slot)?;
        }
        Ok(())
    }
}
