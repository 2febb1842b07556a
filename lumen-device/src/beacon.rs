//! Connectionless transport
//!
//! The controller has no write channel: it re-broadcasts a short
//! manufacturer-data frame for every press. The first tagged sender seen while
//! unpaired is pinned by MAC address; afterwards only the pinned MAC is
//! obeyed, one press per cooldown window.

use log::*;
use lumen_mcu::{Actuator, Advertisement, MacAddress, Radio, Storage, mac_to_string};
use lumen_proto::ble::BeaconFrame;
use tokio::time::Instant;

use crate::{Dimmer, ScanEvent};

/// What happened to one advertisement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeaconOutcome {
    /// Not a beacon frame
    NotBeacon,
    /// First sender adopted as the remote
    Pinned(MacAddress),
    /// First sender seen but its MAC could not be stored
    PinFailed,
    /// Beacon from a MAC other than the pinned one
    ForeignSender,
    /// Inside the cooldown window
    Debounced,
    /// Command applied, new level
    Applied(f32),
}

/// Millisecond tick counter since `epoch`, wrapping at 32 bits
pub fn ticks_ms(epoch: Instant) -> u32 {
    epoch.elapsed().as_millis() as u32
}

impl<S: Storage + Clone, A: Actuator> Dimmer<S, A> {
    /// Handle one advertisement received at tick `now_ms`
    pub fn handle_beacon(&mut self, adv: &Advertisement, now_ms: u32) -> BeaconOutcome {
        let Ok(frame) = BeaconFrame::from_bytes(&adv.payload) else {
            return BeaconOutcome::NotBeacon;
        };

        let Some(pinned) = self.pins.pinned() else {
            return match self.pins.pin(adv.mac) {
                Ok(()) => BeaconOutcome::Pinned(adv.mac),
                Err(e) => {
                    warn!("Failed to pin {}: {e}", mac_to_string(&adv.mac));
                    BeaconOutcome::PinFailed
                }
            };
        };

        if pinned != adv.mac {
            debug!("Ignoring beacon from {}", mac_to_string(&adv.mac));
            return BeaconOutcome::ForeignSender;
        }

        if !self.debouncer.admit(now_ms) {
            return BeaconOutcome::Debounced;
        }

        let increase = frame.direction().is_increase();
        BeaconOutcome::Applied(self.control.on_up_down(increase, &self.settings))
    }

    /// Scan forever, returns once the radio shuts down
    pub async fn run_beacon<R: Radio>(&mut self, radio: &mut R) {
        let epoch = Instant::now();
        self.start_scanning(radio).await;

        loop {
            match self.next_scan_event(radio).await {
                None => {
                    info!("Radio closed, leaving scan loop");
                    return;
                }
                Some(ScanEvent::Complete) => self.start_scanning(radio).await,
                Some(ScanEvent::Advertisement(adv)) => {
                    match self.handle_beacon(&adv, ticks_ms(epoch)) {
                        BeaconOutcome::Applied(level) => info!("Brightness set to {level:.2}"),
                        BeaconOutcome::Pinned(mac) => info!("Paired with remote {}", mac_to_string(&mac)),
                        _ => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Transport};
    use crate::identity::PinStore;
    use crate::mock::{MockRadio, RecordingActuator, raw_advertisement};
    use crate::storage::MemoryStorage;
    use lumen_mcu::{RadioEvent, Slot};
    use lumen_proto::ble::UpDown;

    const REMOTE: MacAddress = [0xaa, 0xbb, 0xcc, 0x00, 0x11, 0x22];
    const OTHER: MacAddress = [0x10, 0x20, 0x30, 0x40, 0x50, 0x60];

    fn beacon(mac: MacAddress, direction: UpDown) -> Advertisement {
        raw_advertisement(mac, &BeaconFrame::new(direction).to_bytes())
    }

    fn new_dimmer(storage: &MemoryStorage, actuator: &RecordingActuator) -> Dimmer<MemoryStorage, RecordingActuator> {
        let config = Config {
            transport: Transport::Beacon,
            ..Config::default()
        };
        Dimmer::load(storage.clone(), actuator.clone(), config)
    }

    #[test]
    fn first_sender_is_pinned_and_others_ignored() {
        let storage = MemoryStorage::default();
        let actuator = RecordingActuator::default();
        let mut dimmer = new_dimmer(&storage, &actuator);

        assert_eq!(dimmer.handle_beacon(&beacon(REMOTE, UpDown::Up), 0), BeaconOutcome::Pinned(REMOTE));
        assert_eq!(storage.get(Slot::PinnedMac), Some(REMOTE.to_vec()));
        assert!(actuator.levels().is_empty());

        assert_eq!(dimmer.handle_beacon(&beacon(OTHER, UpDown::Up), 1000), BeaconOutcome::ForeignSender);
        assert!(actuator.levels().is_empty());
        assert_eq!(dimmer.pinned_remote(), Some(REMOTE));

        assert_eq!(dimmer.handle_beacon(&beacon(REMOTE, UpDown::Up), 2000), BeaconOutcome::Applied(0.25));
        assert_eq!(actuator.levels(), vec![0.25]);
    }

    #[test]
    fn presses_inside_cooldown_are_dropped() {
        let storage = MemoryStorage::default();
        storage.put(Slot::PinnedMac, &REMOTE);
        let actuator = RecordingActuator::default();
        let mut dimmer = new_dimmer(&storage, &actuator);

        let up = beacon(REMOTE, UpDown::Up);
        assert_eq!(dimmer.handle_beacon(&up, 0), BeaconOutcome::Applied(0.25));
        assert_eq!(dimmer.handle_beacon(&up, 50), BeaconOutcome::Debounced);
        assert_eq!(dimmer.handle_beacon(&up, 100), BeaconOutcome::Debounced);
        assert_eq!(dimmer.handle_beacon(&up, 250), BeaconOutcome::Applied(0.5));
        assert_eq!(dimmer.handle_beacon(&beacon(REMOTE, UpDown::Down), 500), BeaconOutcome::Applied(0.25));
        assert_eq!(actuator.levels(), vec![0.25, 0.5, 0.25]);
    }

    #[test]
    fn unknown_command_byte_decreases() {
        let storage = MemoryStorage::default();
        storage.put(Slot::PinnedMac, &REMOTE);
        let actuator = RecordingActuator::default();
        let mut dimmer = new_dimmer(&storage, &actuator);

        dimmer.handle_beacon(&beacon(REMOTE, UpDown::Up), 0);
        dimmer.handle_beacon(&beacon(REMOTE, UpDown::Up), 1000);

        let mut frame = BeaconFrame::new(UpDown::Up).to_bytes();
        frame[6] = 0x7f;
        let outcome = dimmer.handle_beacon(&raw_advertisement(REMOTE, &frame), 2000);
        assert_eq!(outcome, BeaconOutcome::Applied(0.25));
    }

    #[test]
    fn non_beacon_payloads_are_ignored() {
        let storage = MemoryStorage::default();
        let actuator = RecordingActuator::default();
        let mut dimmer = new_dimmer(&storage, &actuator);

        let frame = BeaconFrame::new(UpDown::Up).to_bytes();
        let mut wrong_tag = frame;
        wrong_tag[3] = 0x00;
        let too_long = [&frame[..], &[0u8][..]].concat();

        for payload in [&frame[..6], &wrong_tag[..], &too_long[..]] {
            assert_eq!(dimmer.handle_beacon(&raw_advertisement(OTHER, payload), 0), BeaconOutcome::NotBeacon);
        }
        assert_eq!(dimmer.pinned_remote(), None);
        assert_eq!(storage.get(Slot::PinnedMac), None);
    }

    #[test]
    fn failed_pin_stays_unpaired() {
        let storage = MemoryStorage::default();
        let actuator = RecordingActuator::default();
        let mut dimmer = new_dimmer(&storage, &actuator);
        storage.set_fail_writes(true);

        assert_eq!(dimmer.handle_beacon(&beacon(REMOTE, UpDown::Up), 0), BeaconOutcome::PinFailed);
        assert_eq!(dimmer.pinned_remote(), None);

        storage.set_fail_writes(false);
        assert_eq!(dimmer.handle_beacon(&beacon(OTHER, UpDown::Up), 10), BeaconOutcome::Pinned(OTHER));
    }

    #[test]
    fn pin_survives_reboot() {
        let storage = MemoryStorage::default();
        let mut dimmer = new_dimmer(&storage, &RecordingActuator::default());
        dimmer.handle_beacon(&beacon(REMOTE, UpDown::Up), 0);
        drop(dimmer);

        assert_eq!(PinStore::load(storage.clone()).pinned(), Some(REMOTE));
        let actuator = RecordingActuator::default();
        let mut dimmer = new_dimmer(&storage, &actuator);
        assert_eq!(dimmer.handle_beacon(&beacon(OTHER, UpDown::Up), 0), BeaconOutcome::ForeignSender);
        assert!(actuator.levels().is_empty());
    }

    #[tokio::test]
    async fn scan_loop_pins_then_applies() {
        let storage = MemoryStorage::default();
        let actuator = RecordingActuator::default();
        let mut dimmer = new_dimmer(&storage, &actuator);

        let mut radio = MockRadio::new(vec![
            RadioEvent::Advertisement(beacon(REMOTE, UpDown::Up)),
            RadioEvent::Advertisement(beacon(OTHER, UpDown::Up)),
            RadioEvent::ScanComplete,
            RadioEvent::Advertisement(beacon(REMOTE, UpDown::Up)),
        ]);
        dimmer.run_beacon(&mut radio).await;

        assert_eq!(dimmer.pinned_remote(), Some(REMOTE));
        assert_eq!(actuator.levels(), vec![0.25]);
        assert_eq!(radio.journal().borrow().scans_started, 2);
        assert!(radio.journal().borrow().connects.is_empty());
    }
}
