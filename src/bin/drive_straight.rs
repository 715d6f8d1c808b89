//! Drive the Romi in a straight line until button A is pressed.
//!
//! Configuration comes from `ROMI_*` environment variables (see
//! [`Config::with_overrides`](romi_drive::config::Config::with_overrides)).
//!
//! ```bash
//! ROMI_INIT_POWER=80 ROMI_PERIOD_MS=500 cargo run --features linux --bin drive_straight
//! ```

use log::info;
use romi_drive::config::Config;
use romi_drive::controller::StraightLineController;
use romi_drive::device::Romi32U4;
use romi_drive::hal::linux::{init_logging, open_bus, Delay};

fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env();
    info!("controller: {:?}", config.controller);

    let bus = open_bus(&config.bus)?;
    let romi = Romi32U4::with_address(bus, config.device.romi_address);

    let mut controller = StraightLineController::new(romi, Delay, config.controller);
    let summary = controller.run()?;

    info!(
        "stopped ({:?}) after {} periods, {} anomalies, final power ({}, {})",
        summary.reason,
        summary.iterations,
        summary.anomalies,
        summary.final_command.left,
        summary.final_command.right
    );
    Ok(())
}
