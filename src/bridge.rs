use std::net::{IpAddr, SocketAddr};

use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{BridgeConfig, DeviceConfig};
use crate::listener::PushListener;
use crate::registry::DeviceRegistry;
use crate::sync::{self, SyncMode};
use crate::{DeviceClient, DeviceClientBuilder, Result};

/// Running set of configured devices: one sync loop per device plus, in push
/// mode, the shared listener.
pub struct Bridge {
    registry: DeviceRegistry,
    mode: SyncMode,
    listener_addr: Option<SocketAddr>,
    tasks: Vec<JoinHandle<()>>,
}

impl Bridge {
    pub async fn start(config: &BridgeConfig) -> Result<Self> {
        Self::start_with(config, |_, builder| builder).await
    }

    /// Like [`Bridge::start`], letting the caller adjust each device's
    /// builder (callbacks, message log, port) before it is built.
    pub async fn start_with<F>(config: &BridgeConfig, mut configure: F) -> Result<Self>
    where
        F: FnMut(&DeviceConfig, DeviceClientBuilder) -> DeviceClientBuilder,
    {
        config.validate()?;
        let mode = config.sync_mode();
        let registry = DeviceRegistry::new();

        let mut clients = Vec::with_capacity(config.devices.len());
        for device in &config.devices {
            let builder = DeviceClient::builder(device.ip)
                .name(&device.name)
                .temperature_offset(device.offset);
            let client = configure(device, builder).build()?;
            registry.register(client.clone());
            clients.push(client);
        }

        let mut tasks = Vec::with_capacity(clients.len() + 1);
        let listener_addr = match mode {
            SyncMode::Push => {
                let listener = PushListener::bind(&config.host, config.port, registry.clone()).await?;
                let addr = listener.local_addr()?;
                tasks.push(listener.spawn());
                Some(addr)
            }
            SyncMode::Poll => None,
        };

        for client in clients {
            tasks.push(sync::spawn(client, mode));
        }

        info!(devices = registry.len(), ?mode, "bridge started");
        Ok(Self {
            registry,
            mode,
            listener_addr,
            tasks,
        })
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn device(&self, ip: IpAddr) -> Option<DeviceClient> {
        self.registry.get(&ip)
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Bound listener address in push mode.
    pub fn listener_addr(&self) -> Option<SocketAddr> {
        self.listener_addr
    }

    /// Aborts the sync loops and the listener. In-flight exchanges are not
    /// awaited.
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
        info!("bridge stopped");
    }
}
