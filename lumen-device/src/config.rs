//! Engine configuration - stored in LUMEN_HOME/config.json
//!
//! Every field has a default; a missing file means all defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lumen_mcu::ScanParams;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How the controller reaches the dimmer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Scan, connect, pair over GATT, one notification per connection
    #[default]
    Gatt,
    /// Scan only, beacon frames from a pinned MAC address
    Beacon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transport: Transport,
    pub scan_window_us: u32,
    pub scan_interval_us: u32,
    pub active_scan: bool,
    pub connect_timeout_ms: u64,
    pub discovery_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub notify_timeout_ms: u64,
    /// Pause before retrying a scan that failed to start
    pub scan_retry_delay_ms: u64,
    /// Beacon debounce window
    pub cooldown_ms: u64,
    /// Advertise the phone configuration service
    pub config_service: bool,
    pub advertise_interval_us: u32,
    pub device_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: Transport::Gatt,
            scan_window_us: 30_000,
            scan_interval_us: 30_000,
            active_scan: true,
            connect_timeout_ms: 5_000,
            discovery_timeout_ms: 5_000,
            write_timeout_ms: 2_000,
            notify_timeout_ms: 10_000,
            scan_retry_delay_ms: 1_000,
            cooldown_ms: 200,
            config_service: true,
            advertise_interval_us: 500_000,
            device_name: "lumen".to_string(),
        }
    }
}

impl Config {
    /// Load from a JSON file, defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        serde_json::from_slice(&data).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    pub fn scan_params(&self) -> ScanParams {
        ScanParams {
            window_us: self.scan_window_us,
            interval_us: self.scan_interval_us,
            active: self.active_scan,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    pub fn scan_retry_delay(&self) -> Duration {
        Duration::from_millis(self.scan_retry_delay_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Get LUMEN_HOME directory (default `~/.lumen`), creating it if needed
pub fn lumen_home() -> Result<PathBuf, ConfigError> {
    let home = match std::env::var_os("LUMEN_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir().ok_or(ConfigError::NoHome)?.join(".lumen"),
    };

    fs::create_dir_all(&home).map_err(|e| ConfigError::Io(home.clone(), e))?;
    Ok(home)
}
