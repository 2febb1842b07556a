//! Scripted radio and actuator for engine tests

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use lumen_mcu::{
    Actuator, AddressType, Advertisement, ConfigTarget, GattSession, MacAddress, NOTIFY_UUID, PAIRING_UUID,
    Radio, RadioEvent, SERVICE_UUID, ScanParams,
};
use tokio::time::Instant;
use lumen_proto::adv::AdvertisingData;

#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("no peripheral answered")]
    NoPeer,
    #[error("write rejected by peer")]
    Rejected,
    #[error("advertising not available")]
    Advertise,
    #[error("actuator offline")]
    Actuator,
}

/// Everything the engine asked the radio to do
#[derive(Debug, Default)]
pub struct Journal {
    pub connects: Vec<MacAddress>,
    pub writes: Vec<Vec<u8>>,
    pub disconnects: usize,
    pub scans_started: usize,
    pub scans_stopped: usize,
    pub advertised: Vec<Vec<u8>>,
    pub published: Vec<(ConfigTarget, Vec<u8>)>,
    pub dropped_centrals: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBehavior {
    Ack,
    Reject,
    /// Acknowledgment never arrives
    Hang,
}

/// Script for one connection
#[derive(Debug, Clone)]
pub struct MockSession {
    pub has_service: bool,
    pub has_pairing: bool,
    pub has_notify: bool,
    pub write: WriteBehavior,
    /// `None` never notifies
    pub notification: Option<Vec<u8>>,
    /// Link teardown never completes
    pub hang_disconnect: bool,
}

impl MockSession {
    /// Well-behaved controller sending one notification
    pub fn ok(notification: Vec<u8>) -> Self {
        Self {
            has_service: true,
            has_pairing: true,
            has_notify: true,
            write: WriteBehavior::Ack,
            notification: Some(notification),
            hang_disconnect: false,
        }
    }
}

pub struct MockRadio {
    events: VecDeque<RadioEvent>,
    sessions: VecDeque<MockSession>,
    journal: Rc<RefCell<Journal>>,
    pub fail_advertise: bool,
}

impl MockRadio {
    /// Radio delivering `events`, then shutting down
    pub fn new(events: Vec<RadioEvent>) -> Self {
        Self {
            events: events.into(),
            sessions: VecDeque::new(),
            journal: Rc::default(),
            fail_advertise: false,
        }
    }

    /// Script the next successful connection
    pub fn push_session(&mut self, session: MockSession) {
        self.sessions.push_back(session);
    }

    pub fn journal(&self) -> Rc<RefCell<Journal>> {
        self.journal.clone()
    }
}

impl Radio for MockRadio {
    type Error = MockError;
    type Session = MockConnection;

    async fn start_scan(&mut self, _params: &ScanParams) -> Result<(), MockError> {
        self.journal.borrow_mut().scans_started += 1;
        Ok(())
    }

    async fn stop_scan(&mut self) -> Result<(), MockError> {
        self.journal.borrow_mut().scans_stopped += 1;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<RadioEvent> {
        self.events.pop_front()
    }

    async fn connect(&mut self, mac: &MacAddress) -> Result<MockConnection, MockError> {
        self.journal.borrow_mut().connects.push(*mac);
        let script = self.sessions.pop_front().ok_or(MockError::NoPeer)?;
        Ok(MockConnection {
            script,
            journal: self.journal.clone(),
        })
    }

    async fn advertise(&mut self, _interval_us: u32, payload: &[u8]) -> Result<(), MockError> {
        if self.fail_advertise {
            return Err(MockError::Advertise);
        }
        self.journal.borrow_mut().advertised.push(payload.to_vec());
        Ok(())
    }

    async fn disconnect_central(&mut self, conn_handle: u16) -> Result<(), MockError> {
        self.journal.borrow_mut().dropped_centrals.push(conn_handle);
        Ok(())
    }

    async fn publish_config(&mut self, target: ConfigTarget, value: &[u8]) -> Result<(), MockError> {
        self.journal.borrow_mut().published.push((target, value.to_vec()));
        Ok(())
    }
}

pub struct MockConnection {
    script: MockSession,
    journal: Rc<RefCell<Journal>>,
}

impl GattSession for MockConnection {
    type Error = MockError;
    type Service = ();
    type Characteristic = String;

    async fn discover_service(&self, uuid: &str) -> Result<Option<()>, MockError> {
        Ok((self.script.has_service && uuid == SERVICE_UUID).then_some(()))
    }

    async fn discover_characteristic(&self, _service: &(), uuid: &str) -> Result<Option<String>, MockError> {
        let present = match uuid {
            PAIRING_UUID => self.script.has_pairing,
            NOTIFY_UUID => self.script.has_notify,
            _ => false,
        };
        Ok(present.then(|| uuid.to_string()))
    }

    async fn write(&self, _characteristic: &String, data: &[u8], _with_response: bool) -> Result<(), MockError> {
        match self.script.write {
            WriteBehavior::Ack => {
                self.journal.borrow_mut().writes.push(data.to_vec());
                Ok(())
            }
            WriteBehavior::Reject => Err(MockError::Rejected),
            WriteBehavior::Hang => std::future::pending().await,
        }
    }

    async fn next_notification(&self, _characteristic: &String) -> Result<Vec<u8>, MockError> {
        match &self.script.notification {
            Some(payload) => Ok(payload.clone()),
            None => std::future::pending().await,
        }
    }

    async fn disconnect(self) -> Result<(), MockError> {
        if self.script.hang_disconnect {
            return std::future::pending().await;
        }
        self.journal.borrow_mut().disconnects += 1;
        Ok(())
    }
}

/// Connectable advertisement carrying `name` as its local name
pub fn advertisement(mac: MacAddress, name: &[u8]) -> Advertisement {
    let payload = AdvertisingData {
        name: Some(String::from_utf8_lossy(name).into_owned()),
        ..Default::default()
    }
    .to_bytes()
    .unwrap();

    Advertisement {
        addr_type: AddressType::Public,
        mac,
        adv_type: 0,
        rssi: Some(-60),
        payload,
    }
}

/// Non-connectable advertisement with raw AD bytes
pub fn raw_advertisement(mac: MacAddress, payload: &[u8]) -> Advertisement {
    Advertisement {
        addr_type: AddressType::Random,
        mac,
        adv_type: 3,
        rssi: Some(-70),
        payload: payload.to_vec(),
    }
}

/// Actuator remembering every level it accepted
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    levels: Rc<RefCell<Vec<(f32, Instant)>>>,
    fail: bool,
}

impl RecordingActuator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn levels(&self) -> Vec<f32> {
        self.levels.borrow().iter().map(|(level, _)| *level).collect()
    }

    /// Levels with the (tokio) time they were applied
    pub fn history(&self) -> Vec<(f32, Instant)> {
        self.levels.borrow().clone()
    }
}

impl Actuator for RecordingActuator {
    type Error = MockError;

    fn set_level(&mut self, level: f32) -> Result<(), MockError> {
        if self.fail {
            return Err(MockError::Actuator);
        }
        self.levels.borrow_mut().push((level, Instant::now()));
        Ok(())
    }
}
