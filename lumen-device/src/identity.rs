//! Remote identity - the paired controller's key and the pinned beacon MAC
//!
//! Both values live in their own storage slot and are written synchronously.
//! The in-memory copy only changes after the write went through, so a failed
//! write leaves the previous identity authoritative everywhere.

use std::fmt;

use log::*;
use lumen_mcu::{MacAddress, Slot, Storage, mac_to_string};
use lumen_proto::ble::{KEY_LEN, UNPAIRED_KEY};
use sha2::{Digest, Sha256};

use crate::error::PersistenceError;

/// Key a controller advertises to be recognised
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemoteKey([u8; KEY_LEN]);

impl RemoteKey {
    /// Identity of a controller (or dimmer) that was never paired
    pub const UNPAIRED: RemoteKey = RemoteKey(UNPAIRED_KEY);

    /// Exactly `KEY_LEN` bytes, anything else is rejected
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(RemoteKey)
    }

    /// Derive a key from a fine-grained timestamp.
    ///
    /// SHA-256 of the seed, truncated and hex encoded so the key is printable
    /// and can be advertised as a local name.
    pub fn generate(seed: u128) -> Self {
        let digest = Sha256::digest(seed.to_be_bytes());
        let hex = data_encoding::HEXLOWER.encode(&digest[..KEY_LEN / 2]);
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(hex.as_bytes());
        RemoteKey(key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn is_unpaired(&self) -> bool {
        *self == Self::UNPAIRED
    }

    /// Short form for logs; the full key only appears at debug level
    pub fn redacted(&self) -> String {
        if self.is_unpaired() {
            return self.to_string();
        }
        let shown: String = self.to_string().chars().take(2).collect();
        format!("{shown}******")
    }
}

impl fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => f.write_str(&data_encoding::HEXLOWER.encode(&self.0)),
        }
    }
}

impl fmt::Debug for RemoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteKey({self})")
    }
}

/// Owner of the current remote key
pub struct KeyStore<S: Storage> {
    storage: S,
    current: RemoteKey,
}

impl<S: Storage> KeyStore<S> {
    /// Load the key from storage, falling back to unpaired on a missing or
    /// corrupt slot
    pub fn load(storage: S) -> Self {
        let current = match storage.read(Slot::RemoteKey) {
            Ok(Some(bytes)) => match RemoteKey::from_bytes(&bytes) {
                Some(key) => {
                    info!("Loaded remote key {}", key.redacted());
                    debug!("Remote key is {key}");
                    key
                }
                None => {
                    warn!("Stored remote key is corrupt ({} bytes), starting unpaired", bytes.len());
                    RemoteKey::UNPAIRED
                }
            },
            Ok(None) => {
                info!("No remote key stored, starting unpaired");
                RemoteKey::UNPAIRED
            }
            Err(e) => {
                warn!("Failed to read remote key: {e}, starting unpaired");
                RemoteKey::UNPAIRED
            }
        };

        Self { storage, current }
    }

    pub fn current(&self) -> RemoteKey {
        self.current
    }

    pub fn is_paired(&self) -> bool {
        !self.current.is_unpaired()
    }

    /// Persist a new key; on failure the previous key stays in effect
    pub fn commit(&mut self, key: RemoteKey) -> Result<(), PersistenceError> {
        self.storage
            .write(Slot::RemoteKey, key.as_bytes())
            .map_err(|e| PersistenceError::Write {
                slot: Slot::RemoteKey.name(),
                reason: e.to_string(),
            })?;

        info!("Remote key changed {} -> {}", self.current.redacted(), key.redacted());
        self.current = key;
        Ok(())
    }
}

/// Owner of the MAC address pinned by the connectionless transport
pub struct PinStore<S: Storage> {
    storage: S,
    pinned: Option<MacAddress>,
}

impl<S: Storage> PinStore<S> {
    pub fn load(storage: S) -> Self {
        let pinned = match storage.read(Slot::PinnedMac) {
            Ok(Some(bytes)) => match MacAddress::try_from(bytes.as_slice()) {
                Ok(mac) => {
                    info!("Pinned remote {}", mac_to_string(&mac));
                    Some(mac)
                }
                Err(_) => {
                    warn!("Stored remote MAC is corrupt ({} bytes), ignoring", bytes.len());
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read pinned remote: {e}");
                None
            }
        };

        Self { storage, pinned }
    }

    pub fn pinned(&self) -> Option<MacAddress> {
        self.pinned
    }

    /// Adopt a sender as the only accepted remote
    pub fn pin(&mut self, mac: MacAddress) -> Result<(), PersistenceError> {
        self.storage
            .write(Slot::PinnedMac, &mac)
            .map_err(|e| PersistenceError::Write {
                slot: Slot::PinnedMac.name(),
                reason: e.to_string(),
            })?;

        info!("Pinned remote {}", mac_to_string(&mac));
        self.pinned = Some(mac);
        Ok(())
    }
}
