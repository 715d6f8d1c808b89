//! HTTP remote control for the Romi.
//!
//! Serves the light, horn and wheel routes on port 5000 (override with
//! `ROMI_PORT`). The indicator light is on BCM GPIO 6 unless
//! `ROMI_LIGHT_PIN` says otherwise.
//!
//! ```bash
//! cargo run --features linux,web --bin romi_server
//! ```

use std::sync::Arc;

use log::info;
use romi_drive::config::Config;
use romi_drive::device::Romi32U4;
use romi_drive::hal::linux::{init_logging, open_bus, open_output_pin};
use romi_drive::services::{run_server, AppState, SharedDrive, WebServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env();
    let bus = open_bus(&config.bus)?;
    let romi = Romi32U4::with_address(bus, config.device.romi_address);
    let light = open_output_pin(config.web.light_pin)?;

    let drive = Arc::new(SharedDrive::new(romi, light));
    drive.stop_all()?;

    let state = AppState::new(Arc::clone(&drive), &config.web, &config.device);
    info!("{} ready, wheel power {}", config.device.name, config.web.wheel_power);
    run_server(state, WebServerConfig::from_config(&config.web)).await?;

    drive.stop_all()?;
    Ok(())
}
