//! Lumen Device Library
//!
//! The pairing and remote-control engine of a BLE dimmer. A [`Dimmer`] owns
//! the persisted remote identity and brightness profiles, and drives an
//! [`Actuator`] from events received through a [`Radio`]. Two transports are
//! supported:
//!
//! - **GATT**: the controller advertises its key (or the unpaired sentinel) as
//!   its local name; the dimmer connects, hands out a key when pairing, and
//!   reads one up/down notification per session.
//! - **Beacon**: the controller broadcasts a tagged frame per press; the first
//!   sender is pinned by MAC address.
//!
//! # Example
//!
//! ```ignore
//! use lumen_device::{Config, Dimmer, FileStorage, lumen_home};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let home = lumen_home()?;
//!     let config = Config::load(&home.join("config.json"))?;
//!     let storage = FileStorage::new(home.join("state"))?;
//!
//!     let mut dimmer = Dimmer::load(storage, MyPwm::new(), config);
//!     dimmer.run(&mut MyRadio::open().await?).await;
//!     Ok(())
//! }
//! ```

mod beacon;
mod config;
mod control;
mod debounce;
mod error;
mod gatt;
mod identity;
mod pairing;
mod phone;
mod settings;
mod storage;

#[cfg(test)]
mod mock;

pub use beacon::{BeaconOutcome, ticks_ms};
pub use config::{Config, Transport, lumen_home};
pub use control::{ControlEngine, START_INDEX};
pub use debounce::Debouncer;
pub use error::{ConfigError, Error, PairingError, PersistenceError, TransportError, ValidationError};
pub use gatt::{SessionKind, SessionReport, classify};
pub use identity::{KeyStore, PinStore, RemoteKey};
pub use pairing::{PairingEngine, PairingState, timestamp_seed};
pub use phone::{PhoneLink, advertising_payload};
pub use settings::{DEFAULT_LEVELS, DEFAULT_PROFILE, Profiles, SettingsCollection, SettingsStore};
pub use storage::{FileStorage, MemoryError, MemoryStorage};

pub use lumen_mcu::{Actuator, Radio, Storage};

use log::*;
use lumen_mcu::{Advertisement, MacAddress, RadioEvent};

/// Scan-relevant radio events, after phone traffic has been handled
pub(crate) enum ScanEvent {
    Advertisement(Advertisement),
    Complete,
}

/// A dimmer: persisted state, engines and configuration
pub struct Dimmer<S: Storage + Clone, A: Actuator> {
    config: Config,
    keys: KeyStore<S>,
    pins: PinStore<S>,
    settings: SettingsStore<S>,
    control: ControlEngine<A>,
    pairing: PairingEngine,
    debouncer: Debouncer,
    phone: PhoneLink,
}

impl<S: Storage + Clone, A: Actuator> Dimmer<S, A> {
    /// Load all persisted state. Never fails: unreadable slots fall back to
    /// the unpaired identity and the default profile.
    pub fn load(storage: S, actuator: A, config: Config) -> Self {
        let keys = KeyStore::load(storage.clone());
        let pins = PinStore::load(storage.clone());
        let settings = SettingsStore::load(storage);

        Self {
            debouncer: Debouncer::new(config.cooldown()),
            config,
            keys,
            pins,
            settings,
            control: ControlEngine::new(actuator),
            pairing: PairingEngine::new(),
            phone: PhoneLink::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn keys(&self) -> &KeyStore<S> {
        &self.keys
    }

    pub fn pinned_remote(&self) -> Option<MacAddress> {
        self.pins.pinned()
    }

    pub fn settings(&self) -> &SettingsStore<S> {
        &self.settings
    }

    pub fn control(&self) -> &ControlEngine<A> {
        &self.control
    }

    pub fn pairing_state(&self) -> PairingState {
        self.pairing.state()
    }

    pub fn phone(&self) -> &PhoneLink {
        &self.phone
    }

    /// Drive the actuator at the boot level, announce the configuration
    /// service and run the configured transport until the radio shuts down
    pub async fn run<R: Radio>(&mut self, radio: &mut R) {
        let level = self.control.apply_current(&self.settings);
        info!(
            "Starting {:?} transport, {}, brightness {level:.2}",
            self.config.transport,
            if self.keys.is_paired() { "paired" } else { "unpaired" },
        );

        self.advertise_config(radio).await;

        match self.config.transport {
            Transport::Gatt => self.run_gatt(radio).await,
            Transport::Beacon => self.run_beacon(radio).await,
        }
    }

    /// Start scanning, retrying until the radio accepts
    pub(crate) async fn start_scanning<R: Radio>(&mut self, radio: &mut R) {
        let params = self.config.scan_params();
        loop {
            match radio.start_scan(&params).await {
                Ok(()) => return,
                Err(e) => {
                    warn!("Failed to start scan: {e}, retrying");
                    tokio::time::sleep(self.config.scan_retry_delay()).await;
                }
            }
        }
    }

    /// Next advertisement or end of scan window. Phone traffic arriving in
    /// between is handled here. `None` once the radio has shut down.
    pub(crate) async fn next_scan_event<R: Radio>(&mut self, radio: &mut R) -> Option<ScanEvent> {
        loop {
            let event = radio.next_event().await?;
            if let Some(event) = self.dispatch_event(radio, event).await {
                return Some(event);
            }
        }
    }

    /// Serve phone events in place; scan events are handed back to the caller
    pub(crate) async fn dispatch_event<R: Radio>(&mut self, radio: &mut R, event: RadioEvent) -> Option<ScanEvent> {
        match event {
            RadioEvent::Advertisement(adv) => return Some(ScanEvent::Advertisement(adv)),
            RadioEvent::ScanComplete => return Some(ScanEvent::Complete),
            RadioEvent::CentralConnected { conn_handle } => self.phone.connected(conn_handle),
            RadioEvent::CentralDisconnected { conn_handle } => {
                if self.phone.disconnected(conn_handle) {
                    self.advertise_config(radio).await;
                }
            }
            RadioEvent::ConfigWrite {
                conn_handle,
                target,
                value,
            } => self.serve_config_write(radio, conn_handle, target, &value).await,
        }
        None
    }
}
