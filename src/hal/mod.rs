//! Hardware Abstraction Layer implementations.
//!
//! This module contains the concrete transports and test doubles behind the
//! `embedded-hal` traits and [`crate::traits::DriveBase`].
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development (requires `std`)
//! - `linux`: `/dev/i2c-N` bus and sysfs GPIO on a Raspberry Pi (requires `linux` feature)

#[cfg(feature = "std")]
pub mod mock;

#[cfg(feature = "linux")]
pub mod linux;

#[cfg(feature = "std")]
pub use mock::*;

#[cfg(feature = "linux")]
pub use linux::*;
