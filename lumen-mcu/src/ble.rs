//! BLE central types and traits for the Lumen dimmer
//!
//! Protocol constants (UUIDs, key format, beacon layout) are in lumen_proto::ble.
//! This module provides the radio primitives the engine drives.

// Re-export protocol constants for convenience
pub use lumen_proto::ble::{
    CONFIG_PROFILE_UUID, CONFIG_SERVICE_UUID, CONFIG_SETTINGS_UUID, KEY_LEN, NOTIFY_UUID,
    PAIRING_UUID, SERVICE_UUID, UNPAIRED_KEY,
};

/// 48-bit Bluetooth device address
pub type MacAddress = [u8; 6];

/// Format a MAC address as `aa:bb:cc:dd:ee:ff`
pub fn mac_to_string(mac: &MacAddress) -> String {
    mac.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":")
}

/// Address type reported with an advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Public,
    Random,
}

/// One received advertising report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub addr_type: AddressType,
    pub mac: MacAddress,
    /// Advertising PDU type (0 = connectable undirected)
    pub adv_type: u8,
    pub rssi: Option<i16>,
    /// Raw advertising data (AD structures)
    pub payload: Vec<u8>,
}

impl Advertisement {
    /// Advertised local name, the identity used by connection-oriented controllers
    pub fn identity(&self) -> Option<&[u8]> {
        lumen_proto::adv::local_name(&self.payload)
    }
}

/// Scan parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParams {
    pub window_us: u32,
    pub interval_us: u32,
    /// Request scan responses
    pub active: bool,
}

/// Which phone configuration value a write targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigTarget {
    /// JSON profile mapping (CONFIG_SETTINGS_UUID)
    Settings,
    /// Selected profile name (CONFIG_PROFILE_UUID)
    Profile,
}

/// Asynchronous radio events delivered to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// Advertising report received while scanning
    Advertisement(Advertisement),
    /// The scan window ended; the engine restarts scanning
    ScanComplete,
    /// A phone connected to the configuration service
    CentralConnected { conn_handle: u16 },
    /// A phone disconnected from the configuration service
    CentralDisconnected { conn_handle: u16 },
    /// A phone wrote a configuration characteristic
    ConfigWrite {
        conn_handle: u16,
        target: ConfigTarget,
        value: Vec<u8>,
    },
}

/// Trait for the BLE radio
///
/// MCU-specific crates implement this trait using their BLE stack. Only one
/// connection is ever requested at a time; the engine stops scanning before
/// connecting and restarts it afterwards.
#[allow(async_fn_in_trait)]
pub trait Radio {
    /// Error type for radio operations
    type Error: core::fmt::Display;

    /// Connected GATT client session
    type Session: GattSession;

    /// Start (or restart) scanning
    async fn start_scan(&mut self, params: &ScanParams) -> Result<(), Self::Error>;

    /// Stop scanning
    async fn stop_scan(&mut self) -> Result<(), Self::Error>;

    /// Next radio event, `None` once the radio has shut down.
    ///
    /// Also polled while a GATT session is in progress and dropped whenever a
    /// session step completes first, so phone events must not be consumed
    /// before this future resolves.
    async fn next_event(&mut self) -> Option<RadioEvent>;

    /// Connect to a peripheral
    async fn connect(&mut self, mac: &MacAddress) -> Result<Self::Session, Self::Error>;

    /// Start advertising the given payload
    async fn advertise(&mut self, interval_us: u32, payload: &[u8]) -> Result<(), Self::Error>;

    /// Drop a phone connected to the configuration service
    async fn disconnect_central(&mut self, conn_handle: u16) -> Result<(), Self::Error>;

    /// Store a configuration value and notify subscribed phones
    async fn publish_config(&mut self, target: ConfigTarget, value: &[u8]) -> Result<(), Self::Error>;
}

/// Trait for a connected GATT client session
///
/// Lookups take `&self` so independent discoveries can be awaited together.
#[allow(async_fn_in_trait)]
pub trait GattSession {
    /// Error type for session operations
    type Error: core::fmt::Display;

    type Service;
    type Characteristic;

    /// Discover a primary service, `None` if the peer does not expose it
    async fn discover_service(&self, uuid: &str) -> Result<Option<Self::Service>, Self::Error>;

    /// Discover a characteristic of a service, `None` if absent
    async fn discover_characteristic(
        &self,
        service: &Self::Service,
        uuid: &str,
    ) -> Result<Option<Self::Characteristic>, Self::Error>;

    /// Write a characteristic, waiting for the acknowledgment when `with_response`
    async fn write(
        &self,
        characteristic: &Self::Characteristic,
        data: &[u8],
        with_response: bool,
    ) -> Result<(), Self::Error>;

    /// Subscribe (if needed) and wait for the next notification
    async fn next_notification(
        &self,
        characteristic: &Self::Characteristic,
    ) -> Result<Vec<u8>, Self::Error>;

    /// Close the connection
    async fn disconnect(self) -> Result<(), Self::Error>;
}
