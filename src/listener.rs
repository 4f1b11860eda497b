//! Stand-in for the vendor cloud endpoint.
//!
//! Push-mode units are pointed at this server instead of the cloud. One
//! socket serves every device; heartbeats are routed by the reporting IP.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, RawQuery, State};
use axum::http::Method;
use axum::response::Html;
use chrono::Local;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::form_urlencoded;

use crate::Result;
use crate::protocol::{
    CMD_HEARTBEAT, CMD_NTP, FILLER, HEARTBEAT_ACK, PARAM_CMD, PARAM_HMI, PARAM_IP, ntp_reply,
};
use crate::registry::DeviceRegistry;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 42420;

pub fn router(registry: DeviceRegistry) -> Router {
    Router::new().fallback(handle).with_state(registry)
}

pub struct PushListener {
    listener: TcpListener,
    registry: DeviceRegistry,
}

impl PushListener {
    pub async fn bind(host: &str, port: u16, registry: DeviceRegistry) -> Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        info!(addr = %listener.local_addr()?, "listener started");
        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn serve(self) -> Result<()> {
        axum::serve(
            self.listener,
            router(self.registry).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.serve().await {
                error!(error = %e, "listener stopped");
            }
        })
    }
}

async fn handle(
    State(registry): State<DeviceRegistry>,
    peer: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Html<String> {
    let params: HashMap<String, String> = query
        .as_deref()
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    if method != Method::GET {
        debug!(%method, ?params, body_len = body.len(), "listener request");
        return Html(FILLER.to_string());
    }

    match params.get(PARAM_CMD).map(String::as_str) {
        Some(CMD_NTP) => {
            debug!(?params, "listener UI_NTP");
            Html(ntp_reply(&Local::now()))
        }
        Some(CMD_HEARTBEAT) => {
            debug!(?params, "listener UI_FLG");
            heartbeat(&registry, &params, peer.map(|ConnectInfo(addr)| addr));
            Html(HEARTBEAT_ACK.to_string())
        }
        _ => {
            debug!(?params, "listener GET");
            Html(FILLER.to_string())
        }
    }
}

fn heartbeat(registry: &DeviceRegistry, params: &HashMap<String, String>, peer: Option<SocketAddr>) {
    let source = params
        .get(PARAM_IP)
        .cloned()
        .or_else(|| peer.map(|p| p.ip().to_string()));

    let (Some(source), Some(hmi)) = (source, params.get(PARAM_HMI)) else {
        warn!("heartbeat without source or HMI, dropped");
        return;
    };

    if let Err(e) = registry.deliver(&source, hmi) {
        warn!(source = %source, error = %e, "heartbeat dropped");
    }
}
