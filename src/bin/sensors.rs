//! Sensor bench: prints the coprocessor's sensors once, then streams IMU
//! readings every second until button A is pressed.
//!
//! ```bash
//! ROMI_IMU_ODR=104 cargo run --features linux --bin sensors
//! ```

use anyhow::bail;
use log::{info, warn};
use romi_drive::config::Config;
use romi_drive::device::Romi32U4;
use romi_drive::hal::linux::{init_logging, open_bus, Delay, I2cdev};
use romi_drive::imu::Lsm6;
use romi_drive::registers::lsm6;
use romi_drive::traits::Button;

const POLL_MS: u32 = 1000;

fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env();
    let bus = open_bus(&config.bus)?;
    let mut romi = Romi32U4::with_address(bus, config.device.romi_address);

    let buttons = romi.get_button_state()?;
    info!("buttons a={} b={} c={}", buttons.a, buttons.b, buttons.c);
    info!("battery {} mV", romi.get_battery_mv()?);
    info!("analog {:?}", romi.get_analog()?);
    let encoders = romi.get_encoders()?;
    info!("encoders left={} right={}", encoders.left, encoders.right);

    if !config.imu.enabled {
        return Ok(());
    }

    let imu = Lsm6::new(config.imu.address);
    let id = imu.who_am_i(romi.bus_mut())?;
    if id != lsm6::WHO_AM_I_ID {
        bail!("unexpected WHO_AM_I {:#04x} at {:#04x}", id, imu.address());
    }

    imu.enable(romi.bus_mut(), config.imu.odr)?;
    let streamed = stream_until_button(&mut romi, &imu);
    // Power the IMU down even if streaming failed.
    if let Err(e) = imu.disable(romi.bus_mut()) {
        warn!("failed to disable imu: {}", e);
    }
    streamed
}

fn stream_until_button(
    romi: &mut Romi32U4<I2cdev, Delay>,
    imu: &Lsm6,
) -> anyhow::Result<()> {
    info!("press button A to stop");
    while !romi.get_button_state()?.is_pressed(Button::A) {
        romi.bus_mut().delay_ms(POLL_MS);
        let data = imu.read_all(romi.bus_mut())?;
        info!(
            "gyro ({}, {}, {}) accel ({}, {}, {})",
            data.gyro.x, data.gyro.y, data.gyro.z, data.accel.x, data.accel.y, data.accel.z
        );
    }
    Ok(())
}
