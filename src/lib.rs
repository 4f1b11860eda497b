mod bridge;
mod client;
pub mod config;
mod diff;
mod error;
pub mod hmi;
pub mod listener;
mod logger;
mod protocol;
mod registry;
pub mod sync;
mod types;

pub use bridge::Bridge;
pub use client::{DEFAULT_DEBOUNCE, DEFAULT_TIMEOUT, DeviceClient, DeviceClientBuilder};
pub use config::{BridgeConfig, DeviceConfig};
pub use error::{Error, Result};
pub use hmi::{Field, HmiVector};
pub use listener::PushListener;
pub use logger::MessageLogMode;
pub use protocol::{DEVICE_PORT, FILLER, HEARTBEAT_ACK, IDLE_HMI};
pub use registry::DeviceRegistry;
pub use sync::{Schedule, SyncAction, SyncMode};
pub use types::*;
