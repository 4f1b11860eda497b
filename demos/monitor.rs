use std::env;

use argo_hmi::{Bridge, BridgeConfig, Event};

#[tokio::main]
async fn main() -> argo_hmi::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: monitor <config.json>");
        return Ok(());
    };

    let config = BridgeConfig::from_path(path)?;
    let bridge = Bridge::start_with(&config, |device, builder| {
        let name = device.name.clone();
        let mode_toggles = device.mode_toggles;
        builder
            .on_event(move |event| {
                if mode_toggles || !matches!(event, Event::SpecialModeChanged { .. }) {
                    println!("[{name}] {event:?}");
                }
            })
            .on_state(|state| {
                if let (Some(current), Some(target)) =
                    (state.current_temperature, state.target_temperature)
                {
                    println!(
                        "{current} -> {target} | power: {:?} | mode: {:?} | fan: {:?} | {:?}",
                        state.power,
                        state.mode,
                        state.fan_speed.map(|s| s.value()),
                        state.activity(),
                    );
                }
            })
    })
    .await?;

    if let Some(addr) = bridge.listener_addr() {
        println!("Listening for device heartbeats on {addr}");
    }
    println!("Monitoring {} device(s). Ctrl-C to stop.", bridge.registry().len());

    tokio::signal::ctrl_c().await?;
    bridge.shutdown();
    Ok(())
}
