//! BLE GATT Service Protocol Constants for the Lumen remote
//!
//! The dimmer is the BLE central: it scans for its controller, connects, writes
//! a freshly generated remote key to the pairing characteristic (first contact
//! only) and then waits for one up/down notification.
//!
//! The connectionless controllers never accept connections. They broadcast a
//! fixed 7-byte beacon frame instead, see [`BeaconFrame`].

use std::io;

/// Remote-control service UUID (exposed by the controller)
pub const SERVICE_UUID: &str = "a9dcfe62-41af-49e3-adc0-000000000000";

/// Pairing Characteristic UUID (write with response)
pub const PAIRING_UUID: &str = "a9dcfe62-41af-49e3-adc0-000000000001";

/// Up/down Characteristic UUID (notify)
pub const NOTIFY_UUID: &str = "a9dcfe62-41af-49e3-adc0-000000000002";

/// Phone configuration service UUID (exposed by the dimmer)
pub const CONFIG_SERVICE_UUID: &str = "a9dcfe62-41af-49e3-adc0-100000000000";

/// Settings blob Characteristic UUID (read/write, JSON profile mapping)
pub const CONFIG_SETTINGS_UUID: &str = "a9dcfe62-41af-49e3-adc0-100000000001";

/// Selected profile Characteristic UUID (read/write, UTF-8 profile name)
pub const CONFIG_PROFILE_UUID: &str = "a9dcfe62-41af-49e3-adc0-100000000002";

/// Length of a remote key in bytes
pub const KEY_LEN: usize = 8;

/// Identity advertised by a controller that has never been paired.
///
/// Generated keys only ever contain lowercase hex digits, so they can not
/// collide with this value.
pub const UNPAIRED_KEY: [u8; KEY_LEN] = *b"unpaired";

/// Connectionless beacon layout
pub mod beacon {
    /// Identity tag carried by every beacon frame
    pub const TAG: [u8; 4] = [0xca, 0xfe, 0x12, 0x34];

    /// Offset of the tag inside the advertisement payload
    pub const TAG_OFFSET: usize = 2;

    /// Offset of the command byte
    pub const COMMAND_OFFSET: usize = 6;

    /// Total payload length of a beacon advertisement
    pub const FRAME_LEN: usize = 7;

    /// Raise brightness one step
    pub const CMD_INCREASE: u8 = 0x02;

    /// Lower brightness one step (any non-increase byte is treated the same)
    pub const CMD_DECREASE: u8 = 0x01;
}

/// Direction of a single control event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpDown {
    Up,
    Down,
}

impl UpDown {
    pub fn from_increase(increase: bool) -> Self {
        if increase { UpDown::Up } else { UpDown::Down }
    }

    pub fn is_increase(self) -> bool {
        self == UpDown::Up
    }

    /// Decode an up/down notification: exactly one byte, `0` is down and
    /// anything else is up.
    pub fn from_notification(data: &[u8]) -> io::Result<Self> {
        match data {
            [0] => Ok(UpDown::Down),
            [_] => Ok(UpDown::Up),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("up/down notification must be 1 byte, got {}", data.len()),
            )),
        }
    }

    pub fn to_notification(self) -> [u8; 1] {
        match self {
            UpDown::Up => [1],
            UpDown::Down => [0],
        }
    }
}

/// A connectionless beacon frame: `len, type, CA FE 12 34, command`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconFrame {
    pub command: u8,
}

impl BeaconFrame {
    pub fn new(direction: UpDown) -> Self {
        let command = match direction {
            UpDown::Up => beacon::CMD_INCREASE,
            UpDown::Down => beacon::CMD_DECREASE,
        };
        Self { command }
    }

    pub fn direction(&self) -> UpDown {
        UpDown::from_increase(self.command == beacon::CMD_INCREASE)
    }

    pub fn to_bytes(&self) -> [u8; beacon::FRAME_LEN] {
        let mut buf = [0u8; beacon::FRAME_LEN];
        // Manufacturer specific data, tag doubles as company id + product id
        buf[0] = (beacon::FRAME_LEN - 1) as u8;
        buf[1] = crate::adv::AD_MANUFACTURER_DATA;
        buf[beacon::TAG_OFFSET..beacon::COMMAND_OFFSET].copy_from_slice(&beacon::TAG);
        buf[beacon::COMMAND_OFFSET] = self.command;
        buf
    }

    pub fn from_bytes(data: &[u8]) -> io::Result<Self> {
        if data.len() != beacon::FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("beacon must be {} bytes, got {}", beacon::FRAME_LEN, data.len()),
            ));
        }
        if data[beacon::TAG_OFFSET..beacon::COMMAND_OFFSET] != beacon::TAG {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "beacon tag mismatch"));
        }
        Ok(Self { command: data[beacon::COMMAND_OFFSET] })
    }
}

/// Convert a textual 128-bit UUID into the little-endian byte order used on air
pub fn uuid_to_le_bytes(uuid: &str) -> io::Result<[u8; 16]> {
    let hex: Vec<u8> = uuid.bytes().filter(|b| *b != b'-').collect();
    if hex.len() != 32 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("invalid UUID: {uuid}")));
    }

    let mut out = [0u8; 16];
    for (i, pair) in hex.chunks(2).enumerate() {
        let digits = std::str::from_utf8(pair)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid UUID: {uuid}")))?;
        let byte = u8::from_str_radix(digits, 16)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid UUID: {uuid}")))?;
        out[15 - i] = byte;
    }
    Ok(out)
}
