//! Pairing state machine for the connection-oriented transport
//!
//! ```text
//! Idle -> AwaitingExchange -> Committed
//!                          \-> Failed
//! ```
//!
//! The transport resets the engine to `Idle` when its session ends, whatever
//! the outcome. A key is only committed after the controller acknowledged it.

use std::time::{SystemTime, UNIX_EPOCH};

use log::*;
use lumen_mcu::Storage;

use crate::error::PairingError;
use crate::identity::{KeyStore, RemoteKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    Idle,
    /// Key offered to the controller, acknowledgment pending
    AwaitingExchange(RemoteKey),
    Committed(RemoteKey),
    Failed,
}

#[derive(Debug)]
pub struct PairingEngine {
    state: PairingState,
}

impl Default for PairingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PairingEngine {
    pub fn new() -> Self {
        Self { state: PairingState::Idle }
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    /// Generate the key to hand to the controller. Refused while another
    /// exchange is awaiting its acknowledgment.
    pub fn begin(&mut self, seed: u128) -> Result<RemoteKey, PairingError> {
        if let PairingState::AwaitingExchange(_) = self.state {
            return Err(PairingError::Busy);
        }
        let key = RemoteKey::generate(seed);
        debug!("Pairing: offering key {key}");
        self.state = PairingState::AwaitingExchange(key);
        Ok(key)
    }

    /// The controller acknowledged the key: persist it
    pub fn confirm<S: Storage>(&mut self, keys: &mut KeyStore<S>) -> Result<RemoteKey, PairingError> {
        let PairingState::AwaitingExchange(key) = self.state else {
            return Err(PairingError::NotAwaiting);
        };

        match keys.commit(key) {
            Ok(()) => {
                info!("Pairing: committed key {}", key.redacted());
                self.state = PairingState::Committed(key);
                Ok(key)
            }
            Err(e) => {
                self.state = PairingState::Failed;
                Err(e.into())
            }
        }
    }

    /// Delivery failed or timed out
    pub fn fail(&mut self) {
        if let PairingState::AwaitingExchange(key) = self.state {
            warn!("Pairing: key {} was not delivered", key.redacted());
            self.state = PairingState::Failed;
        }
    }

    /// Session over, discard anything in flight
    pub fn reset(&mut self) {
        self.state = PairingState::Idle;
    }
}

/// Nanoseconds since the epoch, the seed for key generation
pub fn timestamp_seed() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}
