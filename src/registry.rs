use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::types::DeviceState;
use crate::{DeviceClient, Error, Result};

/// Routes heartbeats arriving on the shared listener to the client that owns
/// the reporting device, keyed by device IP.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    devices: Arc<RwLock<HashMap<IpAddr, DeviceClient>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the client previously registered for the same IP, if any.
    pub fn register(&self, client: DeviceClient) -> Option<DeviceClient> {
        info!(ip = %client.ip(), name = client.name(), "registered device");
        self.devices.write().insert(client.ip(), client)
    }

    pub fn get(&self, ip: &IpAddr) -> Option<DeviceClient> {
        self.devices.read().get(ip).cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Hands a pushed HMI string to the owning client.
    pub fn deliver(&self, source: &str, hmi: &str) -> Result<Option<DeviceState>> {
        let client = source
            .trim()
            .parse::<IpAddr>()
            .ok()
            .and_then(|ip| self.get(&ip))
            .ok_or_else(|| Error::UnknownDevice(source.to_string()))?;
        debug!(ip = %client.ip(), "delivering pushed state");
        Ok(client.apply_report(hmi))
    }
}
