//! Simulated beacon remote - drives a dimmer without any Bluetooth hardware
//!
//! A scripted radio delivers beacon frames from two remotes. The first one is
//! pinned, the second is ignored, and repeated frames inside the cooldown
//! window are dropped.
//!
//! Run with: cargo run -p lumen-device --example simulated-beacon

use std::collections::VecDeque;
use std::convert::Infallible;
use std::time::Duration;

use lumen_device::{Actuator, Config, Dimmer, MemoryStorage, Radio, Transport};
use lumen_mcu::{AddressType, Advertisement, ConfigTarget, GattSession, MacAddress, RadioEvent, ScanParams};
use lumen_proto::ble::{BeaconFrame, UpDown};

const REMOTE: MacAddress = [0x02, 0x11, 0x22, 0x33, 0x44, 0x55];
const NEIGHBOUR: MacAddress = [0x02, 0x66, 0x77, 0x88, 0x99, 0xaa];

struct PrintActuator;

impl Actuator for PrintActuator {
    type Error = Infallible;

    fn set_level(&mut self, level: f32) -> Result<(), Infallible> {
        println!("light at {:>3.0}%", level * 100.0);
        Ok(())
    }
}

/// Frames with the delay that precedes them
struct ScriptedRadio {
    script: VecDeque<(u64, MacAddress, UpDown)>,
}

impl Radio for ScriptedRadio {
    type Error = Infallible;
    type Session = NoSession;

    async fn start_scan(&mut self, _params: &ScanParams) -> Result<(), Infallible> {
        Ok(())
    }

    async fn stop_scan(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    async fn next_event(&mut self) -> Option<RadioEvent> {
        let (delay_ms, mac, direction) = self.script.pop_front()?;
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        println!("beacon {direction:?} from {}", lumen_mcu::mac_to_string(&mac));
        Some(RadioEvent::Advertisement(Advertisement {
            addr_type: AddressType::Random,
            mac,
            adv_type: 3,
            rssi: None,
            payload: BeaconFrame::new(direction).to_bytes().to_vec(),
        }))
    }

    async fn connect(&mut self, _mac: &MacAddress) -> Result<NoSession, Infallible> {
        Ok(NoSession)
    }

    async fn advertise(&mut self, _interval_us: u32, _payload: &[u8]) -> Result<(), Infallible> {
        Ok(())
    }

    async fn disconnect_central(&mut self, _conn_handle: u16) -> Result<(), Infallible> {
        Ok(())
    }

    async fn publish_config(&mut self, _target: ConfigTarget, _value: &[u8]) -> Result<(), Infallible> {
        Ok(())
    }
}

/// The beacon transport never connects
struct NoSession;

impl GattSession for NoSession {
    type Error = Infallible;
    type Service = ();
    type Characteristic = ();

    async fn discover_service(&self, _uuid: &str) -> Result<Option<()>, Infallible> {
        Ok(None)
    }

    async fn discover_characteristic(&self, _service: &(), _uuid: &str) -> Result<Option<()>, Infallible> {
        Ok(None)
    }

    async fn write(&self, _characteristic: &(), _data: &[u8], _with_response: bool) -> Result<(), Infallible> {
        Ok(())
    }

    async fn next_notification(&self, _characteristic: &()) -> Result<Vec<u8>, Infallible> {
        Ok(Vec::new())
    }

    async fn disconnect(self) -> Result<(), Infallible> {
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config = Config {
        transport: Transport::Beacon,
        config_service: false,
        ..Config::default()
    };
    let mut dimmer = Dimmer::load(MemoryStorage::default(), PrintActuator, config);

    let mut radio = ScriptedRadio {
        script: VecDeque::from([
            (0, REMOTE, UpDown::Up),      // pins REMOTE
            (300, REMOTE, UpDown::Up),    // 25%
            (50, REMOTE, UpDown::Up),     // re-broadcast, debounced
            (300, NEIGHBOUR, UpDown::Up), // not our remote
            (300, REMOTE, UpDown::Up),    // 50%
            (300, REMOTE, UpDown::Down),  // 25%
        ]),
    };

    dimmer.run(&mut radio).await;
}
