//! Lumen MCU Library
//!
//! Traits a platform implements to host the Lumen dimmer engine.
//!
//! This crate provides:
//! - BLE central primitives (scan, connect, discovery, write, notify, advertise)
//! - Persistent storage slots for the remote key, settings and pinned MAC
//! - The brightness actuator (PWM duty cycle)
//!
//! # Implementations
//! - Host (BlueZ/CoreBluetooth via btleplug): see `lumen-ble`
//! - In-memory storage and file storage: see `lumen-device`
//!
//! # Note
//! This crate only depends on `lumen-proto`.

pub mod actuator;
pub mod ble;
pub mod storage;

pub use actuator::*;
pub use ble::*;
pub use storage::*;
