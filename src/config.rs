//! Shared configuration for the library and the binaries.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`.
//!
//! # Example
//!
//! ```rust
//! use romi_drive::config::{BusConfig, Config, ControllerConfig, WebConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.controller.init_power, 50);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_bus(BusConfig::default().with_device_path("/dev/i2c-3"))
//!     .with_controller(ControllerConfig::default().with_leeway(8))
//!     .with_web(WebConfig::default().with_port(8080));
//! ```

use heapless::String as HString;

use crate::bus::DEFAULT_SETTLE_US;
use crate::imu::Odr;
use crate::registers::{lsm6, romi};
use crate::traits::Button;

/// Maximum length for short config strings (names, device paths)
pub const MAX_SHORT_STRING: usize = 64;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Create a ShortString from a &str, truncating at a character boundary if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    let end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= MAX_SHORT_STRING)
        .last()
        .unwrap_or(0);
    let _ = hs.push_str(&s[..end]);
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// I2C bus configuration
    pub bus: BusConfig,
    /// Straight-line controller configuration
    pub controller: ControllerConfig,
    /// Inertial sensor configuration
    pub imu: ImuConfig,
    /// Web server configuration
    pub web: WebConfig,
    /// Device identification and addressing
    pub device: DeviceConfig,
}

impl Config {
    /// Set bus configuration
    pub fn with_bus(mut self, bus: BusConfig) -> Self {
        self.bus = bus;
        self
    }

    /// Set controller configuration
    pub fn with_controller(mut self, controller: ControllerConfig) -> Self {
        self.controller = controller;
        self
    }

    /// Set IMU configuration
    pub fn with_imu(mut self, imu: ImuConfig) -> Self {
        self.imu = imu;
        self
    }

    /// Set web configuration
    pub fn with_web(mut self, web: WebConfig) -> Self {
        self.web = web;
        self
    }

    /// Set device configuration
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Applies `ROMI_*` overrides from `lookup` on top of this config.
    ///
    /// Unparseable values are logged and ignored. Recognized keys:
    ///
    /// | Key | Field |
    /// |-----|-------|
    /// | `ROMI_I2C_DEVICE` | `bus.device_path` |
    /// | `ROMI_SETTLE_US` | `bus.settle_us` |
    /// | `ROMI_RETRY_ONCE` | `bus.retry_once` |
    /// | `ROMI_INIT_POWER` | `controller.init_power` |
    /// | `ROMI_LEEWAY` | `controller.leeway` |
    /// | `ROMI_ANOMALY_LIMIT` | `controller.anomaly_limit` |
    /// | `ROMI_PERIOD_MS` | `controller.sample_period_ms` |
    /// | `ROMI_STOP_BUTTON` | `controller.stop_button` |
    /// | `ROMI_MAX_ITERATIONS` | `controller.max_iterations` (`0` = unbounded) |
    /// | `ROMI_IMU_ODR` | `imu.odr` in Hz |
    /// | `ROMI_PORT` | `web.port` |
    /// | `ROMI_WHEEL_POWER` | `web.wheel_power` |
    /// | `ROMI_LIGHT_PIN` | `web.light_pin` |
    /// | `ROMI_NAME` | `device.name` |
    ///
    /// ```
    /// use romi_drive::config::Config;
    ///
    /// let config = Config::default().with_overrides(|key| match key {
    ///     "ROMI_LEEWAY" => Some("8"),
    ///     "ROMI_RETRY_ONCE" => Some("yes"),
    ///     _ => None,
    /// });
    /// assert_eq!(config.controller.leeway, 8);
    /// assert!(config.bus.retry_once);
    /// ```
    pub fn with_overrides<F, V>(mut self, mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<V>,
        V: AsRef<str>,
    {
        let mut get = |key: &'static str| lookup(key).map(|v| (key, v));

        if let Some((_, v)) = get("ROMI_I2C_DEVICE") {
            self.bus = self.bus.with_device_path(v.as_ref());
        }
        if let Some(us) = get("ROMI_SETTLE_US").and_then(parsed) {
            self.bus = self.bus.with_settle_us(us);
        }
        if let Some(retry) = get("ROMI_RETRY_ONCE").and_then(flag) {
            self.bus = self.bus.with_retry_once(retry);
        }
        if let Some(power) = get("ROMI_INIT_POWER").and_then(parsed) {
            self.controller = self.controller.with_init_power(power);
        }
        if let Some(leeway) = get("ROMI_LEEWAY").and_then(parsed) {
            self.controller = self.controller.with_leeway(leeway);
        }
        if let Some(limit) = get("ROMI_ANOMALY_LIMIT").and_then(parsed) {
            self.controller = self.controller.with_anomaly_limit(limit);
        }
        if let Some(ms) = get("ROMI_PERIOD_MS").and_then(parsed) {
            self.controller = self.controller.with_sample_period_ms(ms);
        }
        if let Some(button) = get("ROMI_STOP_BUTTON").and_then(|kv| with_parser(kv, Button::from_text)) {
            self.controller = self.controller.with_stop_button(button);
        }
        if let Some(max) = get("ROMI_MAX_ITERATIONS").and_then(parsed::<u32, _>) {
            self.controller = self.controller.with_max_iterations((max > 0).then_some(max));
        }
        if let Some(odr) = get("ROMI_IMU_ODR").and_then(|kv| with_parser(kv, Odr::from_text)) {
            self.imu = self.imu.with_odr(odr);
        }
        if let Some(port) = get("ROMI_PORT").and_then(parsed) {
            self.web = self.web.with_port(port);
        }
        if let Some(power) = get("ROMI_WHEEL_POWER").and_then(parsed) {
            self.web = self.web.with_wheel_power(power);
        }
        if let Some(pin) = get("ROMI_LIGHT_PIN").and_then(parsed) {
            self.web = self.web.with_light_pin(pin);
        }
        if let Some((_, v)) = get("ROMI_NAME") {
            self.device = self.device.with_name(v.as_ref());
        }
        self
    }

    /// Defaults with `ROMI_*` overrides from the process environment.
    #[cfg(feature = "std")]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }
}

fn with_parser<T, V: AsRef<str>>((key, value): (&str, V), parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
    let parsed = parse(value.as_ref().trim());
    if parsed.is_none() {
        log::warn!("ignoring {}={:?}", key, value.as_ref());
    }
    parsed
}

fn parsed<T: core::str::FromStr, V: AsRef<str>>(kv: (&str, V)) -> Option<T> {
    with_parser(kv, |s| s.parse().ok())
}

fn flag<V: AsRef<str>>(kv: (&str, V)) -> Option<bool> {
    with_parser(kv, |s| match s {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

// ============================================================================
// Bus Config
// ============================================================================

/// I2C bus configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusConfig {
    /// Character device of the bus (Raspberry Pi header bus is `/dev/i2c-1`)
    pub device_path: ShortString,
    /// Settle delay after each write phase, microseconds (never below 100)
    pub settle_us: u32,
    /// Re-issue a failed transaction once before reporting it
    pub retry_once: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            device_path: short_string("/dev/i2c-1"),
            settle_us: DEFAULT_SETTLE_US,
            retry_once: false,
        }
    }
}

impl BusConfig {
    /// Set the device path
    pub fn with_device_path(mut self, path: &str) -> Self {
        self.device_path = short_string(path);
        self
    }

    /// Set the settle delay, raised to the 100 µs minimum
    pub fn with_settle_us(mut self, us: u32) -> Self {
        self.settle_us = us.max(DEFAULT_SETTLE_US);
        self
    }

    /// Enable or disable the single retry
    pub fn with_retry_once(mut self, retry: bool) -> Self {
        self.retry_once = retry;
        self
    }
}

// ============================================================================
// Controller Config
// ============================================================================

/// Straight-line controller configuration
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerConfig {
    /// Power both wheels start at and re-center on
    pub init_power: i16,
    /// Dead-band half-width in ticks per period
    pub leeway: i32,
    /// Tick differences above this are discarded as glitches
    pub anomaly_limit: i32,
    /// Sampling period in milliseconds
    pub sample_period_ms: u32,
    /// Button that ends the run
    pub stop_button: Button,
    /// Optional bound on sampling periods (None = until the button)
    pub max_iterations: Option<u32>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            init_power: 50,
            leeway: 5,
            anomaly_limit: 100,
            sample_period_ms: 1000,
            stop_button: Button::A,
            max_iterations: None,
        }
    }
}

impl ControllerConfig {
    /// Set the initial power
    pub fn with_init_power(mut self, power: i16) -> Self {
        self.init_power = power;
        self
    }

    /// Set the dead-band (negative values are taken as their magnitude)
    pub fn with_leeway(mut self, leeway: i32) -> Self {
        self.leeway = leeway.saturating_abs();
        self
    }

    /// Set the anomaly limit (negative values are taken as their magnitude)
    pub fn with_anomaly_limit(mut self, limit: i32) -> Self {
        self.anomaly_limit = limit.saturating_abs();
        self
    }

    /// Set the sampling period
    pub fn with_sample_period_ms(mut self, ms: u32) -> Self {
        self.sample_period_ms = ms;
        self
    }

    /// Set the stop button
    pub fn with_stop_button(mut self, button: Button) -> Self {
        self.stop_button = button;
        self
    }

    /// Bound the number of sampling periods
    pub fn with_max_iterations(mut self, max: Option<u32>) -> Self {
        self.max_iterations = max;
        self
    }
}

// ============================================================================
// IMU Config
// ============================================================================

/// Inertial sensor configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImuConfig {
    /// 7-bit I2C address (0x6b, or 0x6a with SA0 low)
    pub address: u8,
    /// Output data rate applied to both sensors on enable
    pub odr: Odr,
    /// Whether the IMU is used at all
    pub enabled: bool,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            address: lsm6::ADDRESS,
            odr: Odr::Hz1660,
            enabled: true,
        }
    }
}

impl ImuConfig {
    /// Set the address
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Set the output data rate
    pub fn with_odr(mut self, odr: Odr) -> Self {
        self.odr = odr;
        self
    }

    /// Enable or disable the IMU
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

// ============================================================================
// Web Config
// ============================================================================

/// Web server configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WebConfig {
    /// Port to listen on
    pub port: u16,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
    /// Power applied by the wheel endpoints
    pub wheel_power: i16,
    /// BCM number of the indicator light GPIO
    pub light_pin: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            cors_permissive: true,
            wheel_power: 100,
            light_pin: 6,
        }
    }
}

impl WebConfig {
    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set CORS mode
    pub fn with_cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }

    /// Set the wheel power, clamped to the motor range
    pub fn with_wheel_power(mut self, power: i16) -> Self {
        self.wheel_power = power.clamp(0, crate::traits::MOTOR_LIMIT);
        self
    }

    /// Set the light GPIO
    pub fn with_light_pin(mut self, pin: u64) -> Self {
        self.light_pin = pin;
        self
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Device identification configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    /// Human-readable robot name
    pub name: ShortString,
    /// 7-bit I2C address of the 32U4 coprocessor
    pub romi_address: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: short_string("romi"),
            romi_address: romi::ADDRESS,
        }
    }
}

impl DeviceConfig {
    /// Set the robot name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }

    /// Set the coprocessor address
    pub fn with_romi_address(mut self, address: u8) -> Self {
        self.romi_address = address;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
