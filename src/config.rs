use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

use serde::Deserialize;

use crate::listener::{DEFAULT_HOST, DEFAULT_PORT};
use crate::sync::SyncMode;
use crate::{Error, Result};

/// Bridge-level configuration, as found in the host's JSON config.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub use_push: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub name: String,
    pub ip: IpAddr,
    /// Current temperature calibration, °C.
    #[serde(default)]
    pub offset: f64,
    /// Expose eco, turbo and night as separate switches in the home
    /// automation layer. The sync core behaves the same either way.
    #[serde(default)]
    pub mode_toggles: bool,
}

/// Largest calibration accepted for a device, in either direction, °C.
pub const MAX_OFFSET: f64 = 20.0;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl BridgeConfig {
    pub fn from_json(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            return Err(Error::Config("devices must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(Error::Config(format!(
                    "device {} has an empty name",
                    device.ip
                )));
            }
            if !device.offset.is_finite() || device.offset.abs() > MAX_OFFSET {
                return Err(Error::Config(format!(
                    "device {} offset must be between -{MAX_OFFSET} and {MAX_OFFSET}",
                    device.name
                )));
            }
            if !seen.insert(device.ip) {
                return Err(Error::Config(format!("duplicate device ip {}", device.ip)));
            }
        }

        if self.use_push && self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty in push mode".into()));
        }
        Ok(())
    }

    pub fn sync_mode(&self) -> SyncMode {
        if self.use_push {
            SyncMode::Push
        } else {
            SyncMode::Poll
        }
    }
}
