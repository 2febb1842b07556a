//! Phone configuration channel
//!
//! While the dimmer scans for its remote, it also advertises a configuration
//! service. A phone writes either the whole profile mapping (JSON) or the name
//! of the profile to select; both go through settings validation and are
//! rejected wholesale when invalid.

use std::collections::BTreeSet;
use std::io;

use log::*;
use lumen_mcu::{Actuator, CONFIG_SERVICE_UUID, ConfigTarget, Radio, Storage};
use lumen_proto::adv::AdvertisingData;
use lumen_proto::ble::uuid_to_le_bytes;

use crate::Dimmer;
use crate::config::Config;
use crate::error::ValidationError;
use crate::settings::Profiles;

/// Phones currently connected to the configuration service
#[derive(Debug, Default)]
pub struct PhoneLink {
    connections: BTreeSet<u16>,
}

impl PhoneLink {
    pub fn connected(&mut self, conn_handle: u16) {
        info!("Phone connected (handle {conn_handle})");
        self.connections.insert(conn_handle);
    }

    /// Returns false for a handle that was never connected
    pub fn disconnected(&mut self, conn_handle: u16) -> bool {
        let known = self.connections.remove(&conn_handle);
        if known {
            info!("Phone disconnected (handle {conn_handle})");
        }
        known
    }

    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }
}

/// Advertising payload announcing the configuration service
pub fn advertising_payload(config: &Config) -> io::Result<Vec<u8>> {
    AdvertisingData {
        name: Some(config.device_name.clone()),
        services: vec![uuid_to_le_bytes(CONFIG_SERVICE_UUID)?.to_vec()],
        ..Default::default()
    }
    .to_bytes()
}

impl<S: Storage + Clone, A: Actuator> Dimmer<S, A> {
    /// Apply a phone write, then re-drive the actuator at the current index
    pub fn apply_config_write(&mut self, target: ConfigTarget, value: &[u8]) -> Result<(), ValidationError> {
        match target {
            ConfigTarget::Settings => {
                let profiles: Profiles =
                    serde_json::from_slice(value).map_err(|e| ValidationError::Malformed(e.to_string()))?;
                self.settings.replace_profiles(profiles)?;
            }
            ConfigTarget::Profile => {
                let name = std::str::from_utf8(value).map_err(|e| ValidationError::Malformed(e.to_string()))?;
                self.settings.select_profile(name.trim())?;
            }
        }
        self.control.apply_current(&self.settings);
        Ok(())
    }

    /// Value a phone reads back from a configuration characteristic
    pub fn config_value(&self, target: ConfigTarget) -> Vec<u8> {
        match target {
            ConfigTarget::Settings => serde_json::to_vec(&self.settings.collection().profiles).unwrap_or_default(),
            ConfigTarget::Profile => self.settings.current_profile().as_bytes().to_vec(),
        }
    }

    pub(crate) async fn serve_config_write<R: Radio>(
        &mut self,
        radio: &mut R,
        conn_handle: u16,
        target: ConfigTarget,
        value: &[u8],
    ) {
        match self.apply_config_write(target, value) {
            Ok(()) => {
                let stored = self.config_value(target);
                if let Err(e) = radio.publish_config(target, &stored).await {
                    warn!("Failed to publish {target:?} value: {e}");
                }
            }
            Err(e) => {
                warn!("Rejected {target:?} write from handle {conn_handle}: {e}");
                if let Err(e) = radio.disconnect_central(conn_handle).await {
                    warn!("Failed to drop phone (handle {conn_handle}): {e}");
                }
            }
        }
    }

    pub(crate) async fn advertise_config<R: Radio>(&mut self, radio: &mut R) {
        if !self.config.config_service {
            return;
        }
        let payload = match advertising_payload(&self.config) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Cannot build advertising payload: {e}");
                return;
            }
        };
        match radio.advertise(self.config.advertise_interval_us, &payload).await {
            Ok(()) => info!("Advertising configuration service as '{}'", self.config.device_name),
            Err(e) => warn!("Failed to advertise configuration service: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockRadio, RecordingActuator};
    use crate::settings::SettingsStore;
    use crate::storage::MemoryStorage;
    use lumen_mcu::RadioEvent;
    use lumen_proto::adv;

    fn new_dimmer(storage: &MemoryStorage, actuator: &RecordingActuator) -> Dimmer<MemoryStorage, RecordingActuator> {
        Dimmer::load(storage.clone(), actuator.clone(), Config::default())
    }

    #[test]
    fn payload_announces_service_and_name() {
        let payload = advertising_payload(&Config::default()).unwrap();
        assert!(payload.len() <= adv::MAX_ADV_LEN);
        assert_eq!(adv::local_name(&payload), Some(&b"lumen"[..]));
        let uuid = uuid_to_le_bytes(CONFIG_SERVICE_UUID).unwrap();
        assert_eq!(adv::find(&payload, adv::AD_UUID128_COMPLETE), Some(&uuid[..]));

        let config = Config {
            device_name: "a dimmer name that does not fit".to_string(),
            ..Config::default()
        };
        assert!(advertising_payload(&config).is_err());
    }

    #[test]
    fn settings_write_replaces_profiles() {
        let storage = MemoryStorage::default();
        let actuator = RecordingActuator::default();
        let mut dimmer = new_dimmer(&storage, &actuator);

        let json = br#"{"default":[0.1,0.9],"night":[0.0,0.05]}"#;
        dimmer.apply_config_write(ConfigTarget::Settings, json).unwrap();
        assert_eq!(dimmer.settings().collection().profiles.len(), 2);
        assert_eq!(actuator.levels(), vec![0.1]);

        dimmer.apply_config_write(ConfigTarget::Profile, b" night\n").unwrap();
        assert_eq!(dimmer.settings().current_profile(), "night");
        assert_eq!(actuator.levels(), vec![0.1, 0.0]);
        assert_eq!(dimmer.config_value(ConfigTarget::Profile), b"night");

        // Persisted for the next boot
        assert_eq!(SettingsStore::load(storage).current_profile(), "night");
    }

    #[test]
    fn invalid_writes_change_nothing() {
        let storage = MemoryStorage::default();
        let actuator = RecordingActuator::default();
        let mut dimmer = new_dimmer(&storage, &actuator);
        let before = dimmer.settings().collection().clone();

        let rejected: [(ConfigTarget, &[u8]); 5] = [
            (ConfigTarget::Settings, br#"{"default":[0.0,1.5]}"#),
            (ConfigTarget::Settings, br#"{"default":[-0.1]}"#),
            (ConfigTarget::Settings, br#"{"other":[0.5]}"#),
            (ConfigTarget::Settings, b"not json"),
            (ConfigTarget::Profile, b"missing"),
        ];
        for (target, value) in rejected {
            assert!(dimmer.apply_config_write(target, value).is_err());
        }
        assert_eq!(dimmer.settings().collection(), &before);
        assert!(actuator.levels().is_empty());
    }

    #[tokio::test]
    async fn phone_events_are_served_while_scanning() {
        let storage = MemoryStorage::default();
        let actuator = RecordingActuator::default();
        let mut dimmer = new_dimmer(&storage, &actuator);

        let mut radio = MockRadio::new(vec![
            RadioEvent::CentralConnected { conn_handle: 3 },
            RadioEvent::ConfigWrite {
                conn_handle: 3,
                target: ConfigTarget::Settings,
                value: br#"{"default":[0.3,0.6]}"#.to_vec(),
            },
            RadioEvent::CentralConnected { conn_handle: 4 },
            RadioEvent::ConfigWrite {
                conn_handle: 4,
                target: ConfigTarget::Profile,
                value: b"missing".to_vec(),
            },
            RadioEvent::CentralDisconnected { conn_handle: 4 },
            RadioEvent::CentralDisconnected { conn_handle: 3 },
            // Unknown handle, no re-advertising
            RadioEvent::CentralDisconnected { conn_handle: 9 },
        ]);
        dimmer.run(&mut radio).await;

        assert_eq!(dimmer.settings().level_count(), 2);
        assert_eq!(dimmer.settings().current_profile(), "default");
        // Boot level, then the level from the new profile
        assert_eq!(actuator.levels(), vec![0.0, 0.3]);
        assert!(!dimmer.phone().is_connected());

        let journal = radio.journal();
        let journal = journal.borrow();
        let payload = advertising_payload(&Config::default()).unwrap();
        assert_eq!(journal.advertised, vec![payload.clone(), payload.clone(), payload]);
        // Only the accepted write is stored and notified back
        assert_eq!(
            journal.published,
            vec![(ConfigTarget::Settings, br#"{"default":[0.3,0.6]}"#.to_vec())]
        );
        // The phone sending the bad profile name is dropped
        assert_eq!(journal.dropped_centrals, vec![4]);
    }

    #[tokio::test]
    async fn advertising_failure_is_not_fatal() {
        let storage = MemoryStorage::default();
        let mut dimmer = new_dimmer(&storage, &RecordingActuator::default());
        let mut radio = MockRadio::new(vec![]);
        radio.fail_advertise = true;

        dimmer.run(&mut radio).await;
        assert!(radio.journal().borrow().advertised.is_empty());
        assert_eq!(radio.journal().borrow().scans_started, 1);
    }
}
