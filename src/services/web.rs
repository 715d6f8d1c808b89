//! Axum-based HTTP server for remote control of the robot.
//!
//! Provides REST endpoints for:
//! - GET `/api/status` - Battery, buttons, encoders, motors, light
//! - POST `/light/{on|off}` - Switch the indicator light
//! - POST `/horn` - Acknowledged, the horn is not driven
//! - POST `/wheel/{left|right|both}/{forward|reverse|stop}` - Drive a wheel
//! - POST `/wheel/stop-all` - Stop both wheels
//!
//! The light, horn and wheel routes also answer GET so a browser address bar
//! can drive them.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use embedded_hal::digital::OutputPin;
use log::{error, info, warn};
use tower_http::cors::{Any, CorsLayer};

use crate::config::{DeviceConfig, WebConfig};
use crate::traits::DriveBase;

use super::api::{AckResponse, ApiResponse, LightResponse, StatusResponse, WheelResponse};
use super::shared::{SharedDrive, Side, WheelDirection};

/// Handler result: status code plus JSON envelope.
type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

fn ok<T>(data: T) -> Reply<T> {
    (StatusCode::OK, Json(ApiResponse::ok(data)))
}

fn fail<T>(status: StatusCode, message: &str) -> Reply<T> {
    (status, Json(ApiResponse::err(message)))
}

/// Runs `f` against the drive on the blocking pool.
///
/// Every drive call is a chain of I2C transfers and settle sleeps under a
/// `std::sync::Mutex`, which must stay off the async workers.
async fn on_drive<B, L, T, F>(state: &AppState<B, L>, f: F) -> Reply<T>
where
    B: DriveBase + Send + 'static,
    L: OutputPin + Send + 'static,
    T: Send + 'static,
    F: FnOnce(&SharedDrive<B, L>) -> Reply<T> + Send + 'static,
{
    let drive = Arc::clone(&state.drive);
    match tokio::task::spawn_blocking(move || f(&drive)).await {
        Ok(reply) => reply,
        Err(e) => {
            error!("drive task failed: {}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Drive error")
        }
    }
}

// ============================================================================
// Router State
// ============================================================================

/// State handed to every route.
pub struct AppState<B, L> {
    /// The one drive handle.
    pub drive: Arc<SharedDrive<B, L>>,
    /// Magnitude used by the wheel routes.
    pub wheel_power: i16,
    /// Robot name reported by `/api/status`.
    pub name: String,
}

// Manual impl: a derive would demand `B: Clone` and `L: Clone`.
impl<B, L> Clone for AppState<B, L> {
    fn clone(&self) -> Self {
        Self {
            drive: Arc::clone(&self.drive),
            wheel_power: self.wheel_power,
            name: self.name.clone(),
        }
    }
}

impl<B, L> AppState<B, L> {
    /// Builds route state from the web and device configuration.
    pub fn new(drive: Arc<SharedDrive<B, L>>, web: &WebConfig, device: &DeviceConfig) -> Self {
        Self {
            drive,
            wheel_power: web.wheel_power,
            name: device.name.as_str().to_owned(),
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /api/status - Returns a fresh sensor snapshot
async fn get_status<B, L>(State(state): State<AppState<B, L>>) -> Reply<StatusResponse>
where
    B: DriveBase + Send + 'static,
    L: OutputPin + Send + 'static,
{
    let name = state.name.clone();
    on_drive(&state, move |drive| match drive.snapshot() {
        Ok(snapshot) => ok(StatusResponse::new(&name, &snapshot, drive.uptime_ms())),
        Err(e) => {
            error!("status read failed: {:?}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Drive error")
        }
    })
    .await
}

/// /light/:mode - `on` or `off`
async fn set_light<B, L>(
    State(state): State<AppState<B, L>>,
    Path(mode): Path<String>,
) -> Reply<LightResponse>
where
    B: DriveBase + Send + 'static,
    L: OutputPin + Send + 'static,
{
    let on = match mode.as_str() {
        "on" => true,
        "off" => false,
        _ => {
            warn!("light {:?} is not a valid mode", mode);
            return fail(StatusCode::BAD_REQUEST, "Invalid mode");
        }
    };
    on_drive(&state, move |drive| match drive.set_light(on) {
        Ok(()) => ok(LightResponse::new(on)),
        Err(e) => {
            error!("light pin failed: {:?}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Light error")
        }
    })
    .await
}

/// /horn - Acknowledged only
async fn horn() -> Reply<AckResponse> {
    info!("blow horn");
    ok(AckResponse::ok())
}

/// /wheel/:side/:direction
async fn set_wheel<B, L>(
    State(state): State<AppState<B, L>>,
    Path((side, direction)): Path<(String, String)>,
) -> Reply<WheelResponse>
where
    B: DriveBase + Send + 'static,
    L: OutputPin + Send + 'static,
{
    let (Some(side), Some(direction)) =
        (Side::from_text(&side), WheelDirection::from_text(&direction))
    else {
        warn!("wheel {:?}/{:?} is not a valid command", side, direction);
        return fail(StatusCode::BAD_REQUEST, "Invalid wheel command");
    };

    let power = direction.power(state.wheel_power);
    on_drive(&state, move |drive| match drive.set_wheel(side, power) {
        Ok(motors) => ok(WheelResponse::new(side, direction, motors)),
        Err(e) => {
            error!("wheel command failed: {:?}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Drive error")
        }
    })
    .await
}

/// /wheel/stop-all
async fn stop_all<B, L>(State(state): State<AppState<B, L>>) -> Reply<AckResponse>
where
    B: DriveBase + Send + 'static,
    L: OutputPin + Send + 'static,
{
    on_drive(&state, |drive| match drive.stop_all() {
        Ok(()) => ok(AckResponse::ok()),
        Err(e) => {
            error!("stop-all failed: {:?}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Drive error")
        }
    })
    .await
}

/// Fallback handler for 404
async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::err("Not found")),
    )
}

// ============================================================================
// Server Builder
// ============================================================================

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Address to bind to
    pub addr: SocketAddr,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self::from_config(&WebConfig::default())
    }
}

impl WebServerConfig {
    /// Create from shared WebConfig
    pub fn from_config(config: &WebConfig) -> Self {
        Self {
            addr: ([0, 0, 0, 0], config.port).into(),
            cors_permissive: config.cors_permissive,
        }
    }
}

/// Build the Axum router with all routes
pub fn build_router<B, L>(state: AppState<B, L>, config: &WebServerConfig) -> Router
where
    B: DriveBase + Send + 'static,
    L: OutputPin + Send + 'static,
{
    let mut router = Router::new()
        .route("/api/status", get(get_status::<B, L>))
        .route(
            "/light/:mode",
            get(set_light::<B, L>).post(set_light::<B, L>),
        )
        .route("/horn", get(horn).post(horn))
        .route(
            "/wheel/stop-all",
            get(stop_all::<B, L>).post(stop_all::<B, L>),
        )
        .route(
            "/wheel/:side/:direction",
            get(set_wheel::<B, L>).post(set_wheel::<B, L>),
        )
        .fallback(not_found)
        .with_state(state);

    if config.cors_permissive {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Start the web server
///
/// This function blocks until the server is shut down.
pub async fn run_server<B, L>(state: AppState<B, L>, config: WebServerConfig) -> Result<(), std::io::Error>
where
    B: DriveBase + Send + 'static,
    L: OutputPin + Send + 'static,
{
    let router = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("web server listening on http://{}", config.addr);

    axum::serve(listener, router).await
}
