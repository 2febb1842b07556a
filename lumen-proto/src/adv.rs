//! Advertising data (AD structure) encoding and lookup
//!
//! Every AD structure is `length, type, value...` where `length` counts the
//! type byte plus the value. A legacy advertisement holds at most 31 bytes.

use std::io;

pub const AD_FLAGS: u8 = 0x01;
pub const AD_UUID16_COMPLETE: u8 = 0x03;
pub const AD_UUID32_COMPLETE: u8 = 0x05;
pub const AD_UUID128_COMPLETE: u8 = 0x07;
pub const AD_SHORT_NAME: u8 = 0x08;
pub const AD_COMPLETE_NAME: u8 = 0x09;
pub const AD_APPEARANCE: u8 = 0x19;
pub const AD_MANUFACTURER_DATA: u8 = 0xff;

/// Maximum size of a legacy advertising payload
pub const MAX_ADV_LEN: usize = 31;

/// Fields of an advertising payload
#[derive(Debug, Clone, Default)]
pub struct AdvertisingData {
    /// Limited discoverable mode (general discoverable otherwise)
    pub limited_discoverable: bool,
    /// Advertise BR/EDR support
    pub br_edr: bool,
    pub name: Option<String>,
    /// Service UUIDs in on-air byte order (2, 4 or 16 bytes each)
    pub services: Vec<Vec<u8>>,
    /// GAP appearance, omitted when zero
    pub appearance: u16,
}

impl AdvertisingData {
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(MAX_ADV_LEN);

        let discoverable = if self.limited_discoverable { 0x01 } else { 0x02 };
        let bredr = if self.br_edr { 0x18 } else { 0x04 };
        push_ad(&mut buf, AD_FLAGS, &[discoverable + bredr])?;

        if let Some(name) = &self.name {
            push_ad(&mut buf, AD_COMPLETE_NAME, name.as_bytes())?;
        }

        for uuid in &self.services {
            let ad_type = match uuid.len() {
                2 => AD_UUID16_COMPLETE,
                4 => AD_UUID32_COMPLETE,
                16 => AD_UUID128_COMPLETE,
                n => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("service UUID must be 2, 4 or 16 bytes, got {n}"),
                    ));
                }
            };
            push_ad(&mut buf, ad_type, uuid)?;
        }

        if self.appearance != 0 {
            push_ad(&mut buf, AD_APPEARANCE, &self.appearance.to_le_bytes())?;
        }

        if buf.len() > MAX_ADV_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("advertising payload too large ({} bytes)", buf.len()),
            ));
        }
        Ok(buf)
    }
}

/// Append one AD structure
pub fn push_ad(buf: &mut Vec<u8>, ad_type: u8, value: &[u8]) -> io::Result<()> {
    let len = u8::try_from(value.len() + 1)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "AD value too long"))?;
    buf.push(len);
    buf.push(ad_type);
    buf.extend_from_slice(value);
    Ok(())
}

/// Iterator over the AD structures of a payload.
///
/// Stops at the first zero-length structure or at a structure that runs past
/// the end of the payload.
pub struct AdStructures<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (&len, rest) = self.data.split_first()?;
        let len = len as usize;
        if len == 0 || rest.len() < len {
            self.data = &[];
            return None;
        }
        let ad_type = rest[0];
        let value = &rest[1..len];
        self.data = &rest[len..];
        Some((ad_type, value))
    }
}

pub fn structures(payload: &[u8]) -> AdStructures<'_> {
    AdStructures { data: payload }
}

/// Value of the first AD structure of the given type
pub fn find(payload: &[u8], ad_type: u8) -> Option<&[u8]> {
    structures(payload).find(|(t, _)| *t == ad_type).map(|(_, v)| v)
}

/// Advertised local name, complete name preferred over the shortened one
pub fn local_name(payload: &[u8]) -> Option<&[u8]> {
    find(payload, AD_COMPLETE_NAME).or_else(|| find(payload, AD_SHORT_NAME))
}
