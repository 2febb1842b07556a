//! Connection-oriented transport
//!
//! Per advertisement:
//! 1. Classify the advertised name: the paired key opens a control session,
//!    the unpaired sentinel opens a pairing session, anything else is ignored.
//! 2. Stop scanning and connect; discover the remote-control service, then the
//!    pairing and notify characteristics together.
//! 3. Pairing session: write a new key with response, commit on acknowledgment.
//! 4. Wait for exactly one up/down notification and apply it.
//! 5. Disconnect and scan again, whatever happened.
//!
//! Phone configuration events keep flowing while a session waits.

use log::*;
use lumen_mcu::{
    Actuator, GattSession, MacAddress, NOTIFY_UUID, PAIRING_UUID, Radio, SERVICE_UUID, Storage,
    UNPAIRED_KEY, mac_to_string,
};
use lumen_proto::ble::UpDown;
use tokio::time::timeout;

use crate::error::{Error, TransportError, ValidationError};
use crate::identity::RemoteKey;
use crate::pairing::timestamp_seed;
use crate::{Dimmer, ScanEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Controller advertises the current key
    Control,
    /// Controller advertises the unpaired sentinel
    Pairing,
}

/// Decide what to do with an advertised identity
pub fn classify(identity: Option<&[u8]>, key: &RemoteKey) -> Option<SessionKind> {
    let identity = identity?;
    if !key.is_unpaired() && identity == key.as_bytes() {
        Some(SessionKind::Control)
    } else if identity == UNPAIRED_KEY {
        Some(SessionKind::Pairing)
    } else {
        None
    }
}

/// Result of a completed session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionReport {
    /// Key committed during this session
    pub paired: Option<RemoteKey>,
    /// Brightness applied from the notification
    pub level: f32,
}

impl<S: Storage + Clone, A: Actuator> Dimmer<S, A> {
    /// Scan/connect loop; returns once the radio shuts down
    pub async fn run_gatt<R: Radio>(&mut self, radio: &mut R) {
        loop {
            self.start_scanning(radio).await;

            let target = loop {
                match self.next_scan_event(radio).await {
                    None => {
                        info!("Radio closed, leaving scan loop");
                        return;
                    }
                    Some(ScanEvent::Complete) => break None,
                    Some(ScanEvent::Advertisement(adv)) => {
                        if let Some(kind) = classify(adv.identity(), &self.keys.current()) {
                            break Some((adv.mac, kind));
                        }
                    }
                }
            };

            // Scan window ended without a candidate
            let Some((mac, kind)) = target else { continue };

            if let Err(e) = radio.stop_scan().await {
                debug!("Failed to stop scan: {e}");
            }

            match self.run_session(radio, &mac, kind).await {
                Ok(report) => {
                    if let Some(key) = report.paired {
                        info!("Paired with {} (key {})", mac_to_string(&mac), key.redacted());
                    }
                    info!("Brightness set to {:.2}", report.level);
                }
                Err(e) => warn!("Session with {} aborted: {e}", mac_to_string(&mac)),
            }
        }
    }

    /// One connection attempt. The connection is always closed and the pairing
    /// engine reset before returning. Phone traffic keeps being served while
    /// the session waits on the controller.
    pub async fn run_session<R: Radio>(
        &mut self,
        radio: &mut R,
        mac: &MacAddress,
        kind: SessionKind,
    ) -> Result<SessionReport, Error> {
        info!("Connecting to {} ({kind:?})", mac_to_string(mac));

        let session = match timeout(self.config.connect_timeout(), radio.connect(mac)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(TransportError::Connect(e.to_string()).into()),
            Err(_) => return Err(TransportError::Timeout("connection").into()),
        };

        let mut radio_open = true;
        let result = self.exchange(radio, &mut radio_open, &session, kind).await;

        self.pairing.reset();
        let teardown = timeout(self.config.connect_timeout(), session.disconnect());
        match self.serve_while(radio, &mut radio_open, teardown).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Disconnect from {} failed: {e}", mac_to_string(mac)),
            Err(_) => warn!("Disconnect from {} timed out", mac_to_string(mac)),
        }
        result
    }

    async fn exchange<R: Radio>(
        &mut self,
        radio: &mut R,
        radio_open: &mut bool,
        session: &R::Session,
        kind: SessionKind,
    ) -> Result<SessionReport, Error> {
        let discovery = self.config.discovery_timeout();

        let service = self
            .serve_while(radio, radio_open, timeout(discovery, session.discover_service(SERVICE_UUID)))
            .await
            .map_err(|_| TransportError::Timeout("service discovery"))?
            .map_err(|e| TransportError::Radio(e.to_string()))?
            .ok_or(TransportError::ServiceNotFound(SERVICE_UUID))?;

        // Both characteristics must resolve
        let lookups = timeout(discovery, async {
            tokio::join!(
                find_characteristic(session, &service, PAIRING_UUID),
                find_characteristic(session, &service, NOTIFY_UUID),
            )
        });
        let (pairing_char, notify_char) = self
            .serve_while(radio, radio_open, lookups)
            .await
            .map_err(|_| TransportError::Timeout("characteristic discovery"))?;
        let pairing_char = pairing_char?;
        let notify_char = notify_char?;

        let mut paired = None;
        if kind == SessionKind::Pairing {
            let key = self.pairing.begin(timestamp_seed())?;
            let write = timeout(self.config.write_timeout(), session.write(&pairing_char, key.as_bytes(), true));

            match self.serve_while(radio, radio_open, write).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.pairing.fail();
                    return Err(TransportError::WriteFailed(e.to_string()).into());
                }
                Err(_) => {
                    self.pairing.fail();
                    return Err(TransportError::Timeout("pairing acknowledgment").into());
                }
            }

            // From here on this session already runs under the new key
            paired = Some(self.pairing.confirm(&mut self.keys)?);
        }

        let notification = timeout(self.config.notify_timeout(), session.next_notification(&notify_char));
        let payload = self
            .serve_while(radio, radio_open, notification)
            .await
            .map_err(|_| TransportError::Timeout("up/down notification"))?
            .map_err(|e| TransportError::Radio(e.to_string()))?;

        let direction = UpDown::from_notification(&payload)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        let level = self.control.on_up_down(direction.is_increase(), &self.settings);

        Ok(SessionReport { paired, level })
    }

    /// Drive `step` to completion, dispatching radio events meanwhile.
    /// `radio_open` is cleared once the radio shuts down; later steps then
    /// run on their own.
    async fn serve_while<R: Radio, T>(
        &mut self,
        radio: &mut R,
        radio_open: &mut bool,
        step: impl Future<Output = T>,
    ) -> T {
        tokio::pin!(step);

        while *radio_open {
            let event = tokio::select! {
                biased;
                out = &mut step => return out,
                event = radio.next_event() => event,
            };
            match event {
                Some(event) => {
                    if let Some(ScanEvent::Advertisement(adv)) = self.dispatch_event(radio, event).await {
                        trace!("Ignoring {} while connected", mac_to_string(&adv.mac));
                    }
                }
                None => *radio_open = false,
            }
        }
        step.await
    }
}

async fn find_characteristic<G: GattSession>(
    session: &G,
    service: &G::Service,
    uuid: &'static str,
) -> Result<G::Characteristic, TransportError> {
    session
        .discover_characteristic(service, uuid)
        .await
        .map_err(|e| TransportError::Radio(e.to_string()))?
        .ok_or(TransportError::CharacteristicNotFound(uuid))
}
