//! btleplug-backed radio
//!
//! btleplug only exposes parsed advertisement properties, so the raw payload
//! is rebuilt from them: manufacturer data first, then the local name.

use std::collections::HashMap;
use std::pin::Pin;

use btleplug::api::{
    AddressType as BtleAddressType, BDAddr, Central, CentralEvent, Characteristic, Manager as _,
    Peripheral as _, PeripheralProperties, ScanFilter, Service, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::{Stream, StreamExt};
use log::*;
use lumen_mcu::{AddressType, Advertisement, ConfigTarget, GattSession, MacAddress, Radio, RadioEvent, ScanParams, mac_to_string};
use lumen_proto::adv::{self, AD_COMPLETE_NAME, AD_MANUFACTURER_DATA};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    #[error(transparent)]
    Btle(#[from] btleplug::Error),
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    #[error("peripheral {0} not seen")]
    UnknownPeripheral(String),
    #[error("invalid UUID: {0}")]
    Uuid(#[from] uuid::Error),
    #[error("advertising is not supported by this adapter")]
    Unsupported,
    #[error("notification stream closed")]
    Closed,
}

type Events = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

pub struct BtleRadio {
    adapter: Adapter,
    events: Events,
}

impl BtleRadio {
    /// Open the first adapter of the system
    pub async fn open() -> Result<Self, RadioError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(RadioError::NoAdapter)?;
        info!("Using adapter {}", adapter.adapter_info().await?);

        let events = adapter.events().await?;
        Ok(Self { adapter, events })
    }

    async fn advertisement(&self, peripheral: &Peripheral) -> Option<Advertisement> {
        let props = match peripheral.properties().await {
            Ok(Some(props)) => props,
            Ok(None) => return None,
            Err(e) => {
                debug!("No properties for {}: {e}", peripheral.address());
                return None;
            }
        };

        Some(Advertisement {
            addr_type: match props.address_type {
                Some(BtleAddressType::Random) => AddressType::Random,
                _ => AddressType::Public,
            },
            mac: props.address.into_inner(),
            adv_type: 0,
            rssi: props.rssi,
            payload: rebuild_payload(&props),
        })
    }
}

/// Reassemble AD structures from parsed properties
fn rebuild_payload(props: &PeripheralProperties) -> Vec<u8> {
    let mut payload = Vec::new();
    push_manufacturer_data(&mut payload, &props.manufacturer_data);
    if let Some(name) = &props.local_name {
        if let Err(e) = adv::push_ad(&mut payload, AD_COMPLETE_NAME, name.as_bytes()) {
            debug!("Skipping local name: {e}");
        }
    }
    payload
}

fn push_manufacturer_data(payload: &mut Vec<u8>, data: &HashMap<u16, Vec<u8>>) {
    let mut companies: Vec<_> = data.iter().collect();
    companies.sort_by_key(|(company, _)| **company);
    for (company, bytes) in companies {
        let mut value = company.to_le_bytes().to_vec();
        value.extend_from_slice(bytes);
        if let Err(e) = adv::push_ad(payload, AD_MANUFACTURER_DATA, &value) {
            debug!("Skipping manufacturer data: {e}");
        }
    }
}

impl Radio for BtleRadio {
    type Error = RadioError;
    type Session = BtleSession;

    async fn start_scan(&mut self, params: &ScanParams) -> Result<(), RadioError> {
        // Window, interval and active scanning are chosen by the host stack
        debug!("Starting scan ({params:?})");
        self.adapter.start_scan(ScanFilter::default()).await?;
        Ok(())
    }

    async fn stop_scan(&mut self) -> Result<(), RadioError> {
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<RadioEvent> {
        loop {
            let id = match self.events.next().await? {
                CentralEvent::DeviceDiscovered(id)
                | CentralEvent::DeviceUpdated(id)
                | CentralEvent::ManufacturerDataAdvertisement { id, .. } => id,
                _ => continue,
            };

            let Ok(peripheral) = self.adapter.peripheral(&id).await else {
                continue;
            };
            if let Some(adv) = self.advertisement(&peripheral).await {
                return Some(RadioEvent::Advertisement(adv));
            }
        }
    }

    async fn connect(&mut self, mac: &MacAddress) -> Result<BtleSession, RadioError> {
        let address = BDAddr::from(*mac);
        let peripheral = self
            .adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|p| p.address() == address)
            .ok_or_else(|| RadioError::UnknownPeripheral(mac_to_string(mac)))?;

        peripheral.connect().await?;
        Ok(BtleSession { peripheral })
    }

    async fn advertise(&mut self, _interval_us: u32, _payload: &[u8]) -> Result<(), RadioError> {
        Err(RadioError::Unsupported)
    }

    // No GATT server on the host side, so no phone ever connects
    async fn disconnect_central(&mut self, _conn_handle: u16) -> Result<(), RadioError> {
        Err(RadioError::Unsupported)
    }

    async fn publish_config(&mut self, _target: ConfigTarget, _value: &[u8]) -> Result<(), RadioError> {
        Err(RadioError::Unsupported)
    }
}

/// Connection to one controller
pub struct BtleSession {
    peripheral: Peripheral,
}

impl GattSession for BtleSession {
    type Error = RadioError;
    type Service = Service;
    type Characteristic = Characteristic;

    async fn discover_service(&self, uuid: &str) -> Result<Option<Service>, RadioError> {
        let uuid = Uuid::parse_str(uuid)?;
        self.peripheral.discover_services().await?;
        Ok(self.peripheral.services().into_iter().find(|s| s.uuid == uuid))
    }

    async fn discover_characteristic(&self, service: &Service, uuid: &str) -> Result<Option<Characteristic>, RadioError> {
        let uuid = Uuid::parse_str(uuid)?;
        Ok(service.characteristics.iter().find(|c| c.uuid == uuid).cloned())
    }

    async fn write(&self, characteristic: &Characteristic, data: &[u8], with_response: bool) -> Result<(), RadioError> {
        let write_type = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        self.peripheral.write(characteristic, data, write_type).await?;
        Ok(())
    }

    async fn next_notification(&self, characteristic: &Characteristic) -> Result<Vec<u8>, RadioError> {
        let mut notifications = self.peripheral.notifications().await?;
        self.peripheral.subscribe(characteristic).await?;

        while let Some(notification) = notifications.next().await {
            if notification.uuid == characteristic.uuid {
                return Ok(notification.value);
            }
        }
        Err(RadioError::Closed)
    }

    async fn disconnect(self) -> Result<(), RadioError> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
