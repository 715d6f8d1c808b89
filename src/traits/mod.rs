//! Trait definitions for hardware abstraction.
//!
//! This module defines the abstractions that allow romi-drive to:
//! - Run the straight-line controller against real hardware or a mock
//! - Let a presentation layer drive the robot without touching registers
//!
//! # Hardware Abstraction
//!
//! - [`DriveBase`]: motors, buttons, encoders and battery of a differential
//!   drive
//!
//! The bus itself is abstracted by [`embedded_hal::i2c::I2c`] and
//! [`embedded_hal::delay::DelayNs`]; nothing here re-declares those.

pub mod hardware;

pub use hardware::*;
