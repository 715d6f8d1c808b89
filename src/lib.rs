//! # romi-drive
//!
//! Register-level driver and straight-line drive controller for the Pololu
//! Romi with a 32U4 coprocessor, on a Raspberry Pi or any `embedded-hal` I2C
//! bus.
//!
//! ## Features
//!
//! - **Settle-aware bus layer**: pointer write, settle delay, single-byte reads;
//!   works around the 32U4's slow write-to-read turnaround
//! - **Declarative register codec**: `struct`-style format strings (`"hh"`,
//!   `"?14s"`), little-endian, strict on decode
//! - **Masked register fields**: read-modify-write that preserves foreign bits
//! - **Device facades**: the coprocessor (LEDs, buttons, motors, battery,
//!   analog, notes, encoders) and the LSM6DS33 IMU
//! - **Straight-line controller**: encoder-difference feedback with dead-band,
//!   anomaly rejection and power re-centering
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `bus` - Transaction layer over `embedded_hal::i2c::I2c`
//! - `codec` / `register` / `registers` - Formats, typed access, register map
//! - `device` / `imu` - Semantic device operations
//! - `controller` - The straight-line control loop
//! - `traits` - The `DriveBase` collaborator interface
//! - `hal` - Concrete implementations (mock for testing, linux for hardware)
//!
//! ## Example
//!
//! ```rust
//! use romi_drive::{
//!     bus::RegisterBus,
//!     config::ControllerConfig,
//!     controller::StraightLineController,
//!     device::Romi32U4,
//!     hal::{MockBus, MockDelay},
//! };
//!
//! // Coprocessor with button A already held
//! let mock = MockBus::new();
//! mock.set_register(0x14, 0x03, &[1, 0, 0]);
//!
//! let romi = Romi32U4::new(RegisterBus::new(mock.clone(), mock.delay()));
//! let mut controller =
//!     StraightLineController::new(romi, MockDelay::new(), ControllerConfig::default());
//!
//! controller.run().unwrap();
//! assert_eq!(mock.register(0x14, 0x06, 4), vec![0, 0, 0, 0]);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

/// Register-addressed bus transactions with settle delays.
pub mod bus;
/// Fixed-layout little-endian binary codec.
pub mod codec;
/// Closed-loop straight-line drive controller.
pub mod controller;
/// Romi 32U4 coprocessor facade.
pub mod device;
/// Error types for bus and format failures.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// LSM6DS33 inertial sensor facade.
pub mod imu;
/// Typed and masked register access.
pub mod register;
/// Canonical register map.
pub mod registers;
/// Core traits for hardware abstraction.
pub mod traits;

/// Shared configuration system.
pub mod config;

/// Network services for the HTTP API (feature-gated).
#[cfg(feature = "web")]
pub mod services;

// Re-exports for convenience
pub use bus::RegisterBus;
pub use codec::{Format, Value};
pub use controller::{decide, ControllerState, Decision, RunSummary, StopReason, StraightLineController};
pub use device::Romi32U4;
pub use error::{Error, FormatError};
pub use imu::{FifoMode, Lsm6, Odr};
pub use register::MaskedField;
pub use traits::{
    Button, ButtonState, DriveBase, EncoderSample, LedState, MotorCommand, MOTOR_LIMIT,
};

// Config re-exports
pub use config::{BusConfig, Config, ControllerConfig, DeviceConfig, ImuConfig, WebConfig};
