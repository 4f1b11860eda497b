use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use argo_hmi::{
    DeviceClient, DeviceRegistry, DeviceState, FILLER, FanSpeed, HEARTBEAT_ACK, OperationMode,
    PushListener,
};

const HEARTBEAT_HMI: &str =
    "200,180,1,1,3,N,N,N,0,0,0,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N";

type Observed = Arc<Mutex<Vec<DeviceState>>>;

fn observed_client(ip: &str) -> (DeviceClient, Observed) {
    let observed: Observed = Arc::new(Mutex::new(vec![]));
    let observed_clone = observed.clone();
    let client = DeviceClient::builder(ip.parse().unwrap())
        .on_state(move |state| observed_clone.lock().unwrap().push(state.clone()))
        .build()
        .unwrap();
    (client, observed)
}

async fn start_listener(registry: DeviceRegistry) -> SocketAddr {
    let listener = PushListener::bind("127.0.0.1", 0, registry)
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().unwrap();
    listener.spawn();
    addr
}

async fn get(addr: SocketAddr, query: &str) -> (u16, String) {
    let resp = reqwest::get(format!("http://{addr}/{query}"))
        .await
        .expect("listener should answer");
    let status = resp.status().as_u16();
    (status, resp.text().await.unwrap())
}

#[tokio::test]
async fn heartbeat_is_acknowledged_and_routed() {
    let registry = DeviceRegistry::new();
    let (client, observed) = observed_client("10.0.0.5");
    registry.register(client);
    let addr = start_listener(registry).await;

    let (status, body) = get(addr, &format!("?CM=UI_FLG&IP=10.0.0.5&HMI={HEARTBEAT_HMI}")).await;
    assert_eq!(status, 200);
    assert_eq!(body, HEARTBEAT_ACK);

    let states = observed.lock().unwrap();
    assert_eq!(states.len(), 1);
    let state = &states[0];
    assert_eq!(state.target_temperature.unwrap().celsius(), 20.0);
    assert_eq!(state.current_temperature.unwrap().celsius(), 18.0);
    assert_eq!(state.power, Some(true));
    assert_eq!(state.mode, Some(OperationMode::Cool));
    assert_eq!(state.fan_speed, Some(FanSpeed::new(3).unwrap()));
}

#[tokio::test]
async fn unknown_device_heartbeat_still_gets_ack() {
    let registry = DeviceRegistry::new();
    let (client, observed) = observed_client("10.0.0.5");
    registry.register(client);
    let addr = start_listener(registry).await;

    let (status, body) = get(addr, &format!("?CM=UI_FLG&IP=10.0.0.99&HMI={HEARTBEAT_HMI}")).await;
    assert_eq!(status, 200);
    assert_eq!(body, HEARTBEAT_ACK);
    assert!(observed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn heartbeat_without_ip_uses_peer_address() {
    let registry = DeviceRegistry::new();
    let (client, observed) = observed_client("127.0.0.1");
    registry.register(client);
    let addr = start_listener(registry).await;

    let (status, _) = get(addr, &format!("?CM=UI_FLG&HMI={HEARTBEAT_HMI}")).await;
    assert_eq!(status, 200);
    assert_eq!(observed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn ntp_reply_carries_rfc3339_timestamp() {
    let addr = start_listener(DeviceRegistry::new()).await;

    let (status, body) = get(addr, "?CM=UI_NTP").await;
    assert_eq!(status, 200);
    let stamp = body
        .strip_prefix("NTP ")
        .and_then(|rest| rest.strip_suffix(" UI SERVER (M.A.V. srl)"))
        .unwrap_or_else(|| panic!("unexpected NTP reply: {body}"));
    chrono::DateTime::parse_from_rfc3339(stamp).expect("timestamp should parse");
}

#[tokio::test]
async fn other_requests_get_filler() {
    let addr = start_listener(DeviceRegistry::new()).await;

    let (status, body) = get(addr, "?CM=UI_RST").await;
    assert_eq!((status, body.as_str()), (200, FILLER));

    let (status, body) = get(addr, "some/path").await;
    assert_eq!((status, body.as_str()), (200, FILLER));

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/?CM=UI_FLG"))
        .body("HMI=1,2,3")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), FILLER);
}

#[tokio::test]
async fn malformed_heartbeat_does_not_break_listener() {
    let registry = DeviceRegistry::new();
    let (client, observed) = observed_client("10.0.0.5");
    registry.register(client);
    let addr = start_listener(registry).await;

    let (status, body) = get(addr, "?CM=UI_FLG&IP=10.0.0.5&HMI=%ZZ,,").await;
    assert_eq!((status, body.as_str()), (200, HEARTBEAT_ACK));
    assert!(observed.lock().unwrap().is_empty());

    let (status, _) = get(addr, "?CM=UI_FLG&IP=not-an-ip").await;
    assert_eq!(status, 200);

    let (status, _) = get(addr, &format!("?CM=UI_FLG&IP=10.0.0.5&HMI={HEARTBEAT_HMI}")).await;
    assert_eq!(status, 200);
    assert_eq!(observed.lock().unwrap().len(), 1);
}
