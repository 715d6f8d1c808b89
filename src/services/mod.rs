//! Network services for the HTTP API.
//!
//! The web service is a second consumer of the drive base. It shares a single
//! [`DriveBase`](crate::traits::DriveBase) with nothing else in the process
//! through `SharedDrive<B, L>` wrapped in `Arc`, and runs every request's bus
//! traffic under one lock.
//!
//! ```ignore
//! use std::sync::Arc;
//! use romi_drive::services::{AppState, SharedDrive, WebServerConfig, run_server};
//!
//! let drive = Arc::new(SharedDrive::new(romi, light_pin));
//! let state = AppState::new(drive, &config.web, &config.device);
//! run_server(state, WebServerConfig::from_config(&config.web)).await?;
//! ```

pub mod api;
pub mod shared;
pub mod web;

pub use api::*;
pub use shared::*;
pub use web::*;
