//! Lumen remote protocol - constants and byte formats
//!
//! Shared by the dimmer firmware and anything that talks to it:
//! - `ble`: GATT UUIDs, remote key format, up/down and beacon encodings
//! - `adv`: advertising data (AD structure) builder and parser
//!
//! This crate has no dependencies so it builds for every MCU target.

pub mod adv;
pub mod ble;
