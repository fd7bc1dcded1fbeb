//! Poll a relay board and print every update
//!
//! ```text
//! cargo run --example poll_board -- /dev/ttyACM0
//! cargo run --example poll_board -- --simulate
//! ```

use anyhow::{bail, Context};
use relayboard::{BoardEvent, DriverSettings, LoopbackConnector, PortConfig, RelayBoard};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let settings = DriverSettings::load().context("loading driver settings")?;
    let arg = std::env::args().nth(1).unwrap_or_default();

    let board = if arg == "--simulate" {
        let (connector, mut devices) = LoopbackConnector::new();
        tokio::spawn(async move {
            while let Some(device) = devices.recv().await {
                tokio::spawn(device.simulate([0, 1, 0, 1], [0; 8]));
            }
        });
        RelayBoard::with_connector(connector, settings)
    } else {
        RelayBoard::with_settings(settings)
    };

    for port in relayboard::list_ports().unwrap_or_default() {
        tracing::info!("Found port {} ({:?})", port.name, port.product);
    }

    let config = PortConfig::new(if arg == "--simulate" { "sim0" } else { arg.as_str() }, 0);
    let used = board.try_connect(config).await?;
    tracing::info!("Polling {}", used);

    let mut events = board.subscribe();
    let deadline = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event? {
                BoardEvent::UpdateAvailable(status) => {
                    println!("relay={:?} gpio={:?}", status.relay, status.gpio);
                }
                BoardEvent::StateChanged(state) => {
                    if !board.is_connected() {
                        bail!("board went {}", state);
                    }
                }
            },
        }
    }

    board.set_relay(0, true).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("final: {:?}", board.get_updated_data());

    board.disconnect().await;
    Ok(())
}
