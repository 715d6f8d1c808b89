//! Linux bindings: `/dev/i2c-N` through `i2cdev` and sysfs GPIO.

use anyhow::Context;
use embedded_hal::digital::PinState;
use log::{info, LevelFilter};

pub use linux_embedded_hal::{Delay, I2cdev, SysfsPin};

use crate::bus::RegisterBus;
use crate::config::BusConfig;

/// Register bus over a Linux I2C character device.
pub type LinuxBus = RegisterBus<I2cdev, Delay>;

/// Installs `pretty_env_logger` at `info`, refined by `RUST_LOG` when set.
pub fn init_logging() {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

/// Opens the configured I2C device.
///
/// # Errors
///
/// Fails if the device node is missing or not accessible.
pub fn open_bus(config: &BusConfig) -> anyhow::Result<LinuxBus> {
    info!(
        "opening {} (settle {} us, retry_once {})",
        config.device_path, config.settle_us, config.retry_once
    );
    let i2c = I2cdev::new(config.device_path.as_str())
        .with_context(|| format!("opening I2C bus {}", config.device_path))?;
    Ok(RegisterBus::with_config(i2c, Delay, config))
}

/// Exports BCM `pin` through sysfs and drives it low.
///
/// # Errors
///
/// Fails if the pin cannot be exported or configured as an output.
pub fn open_output_pin(pin: u64) -> anyhow::Result<SysfsPin> {
    let gpio = SysfsPin::new(pin);
    gpio.export()
        .with_context(|| format!("exporting GPIO {}", pin))?;
    gpio.into_output_pin(PinState::Low)
        .with_context(|| format!("configuring GPIO {} as output", pin))
}
