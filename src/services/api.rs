//! API request and response types for the HTTP service.

use serde::{Deserialize, Serialize};

use crate::traits::{ButtonState, EncoderSample, MotorCommand};

use super::shared::{DriveSnapshot, Side, WheelDirection};

// ============================================================================
// Response Types
// ============================================================================

/// API response wrapper for consistent JSON structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (present when success=true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (present when success=false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response with data
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Robot status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Configured robot name
    pub name: String,
    /// Battery voltage in millivolts
    pub battery_mv: u16,
    /// User buttons
    pub buttons: ButtonState,
    /// Encoder counters
    pub encoders: EncoderSample,
    /// Last commanded motor power
    pub motors: MotorCommand,
    /// Indicator light state
    pub light: bool,
    /// Milliseconds since the service started
    pub uptime_ms: u64,
}

impl StatusResponse {
    /// Builds the response from a drive snapshot.
    pub fn new(name: impl Into<String>, snapshot: &DriveSnapshot, uptime_ms: u64) -> Self {
        Self {
            name: name.into(),
            battery_mv: snapshot.battery_mv,
            buttons: snapshot.buttons,
            encoders: snapshot.encoders,
            motors: snapshot.motors,
            light: snapshot.light,
            uptime_ms,
        }
    }
}

/// Light switch result: `{"status": "on"}` or `{"status": "off"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightResponse {
    /// `"on"` or `"off"`
    pub status: String,
}

impl LightResponse {
    /// Response for a light state.
    pub fn new(on: bool) -> Self {
        Self {
            status: if on { "on" } else { "off" }.into(),
        }
    }
}

/// Wheel command result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelResponse {
    /// Always `"ok"`
    pub status: String,
    /// Addressed side
    pub side: Side,
    /// Requested motion
    pub direction: WheelDirection,
    /// Command actually sent to the motors
    pub motors: MotorCommand,
}

impl WheelResponse {
    /// Successful wheel command.
    pub fn new(side: Side, direction: WheelDirection, motors: MotorCommand) -> Self {
        Self {
            status: "ok".into(),
            side,
            direction,
            motors,
        }
    }
}

/// Bare acknowledgement: `{"status": "ok"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    /// Always `"ok"`
    pub status: String,
}

impl AckResponse {
    /// `{"status": "ok"}`
    pub fn ok() -> Self {
        Self { status: "ok".into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_omits_data() {
        let json = serde_json::to_string(&ApiResponse::<()>::err("Invalid mode")).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"Invalid mode"}"#);
    }

    #[test]
    fn light_status_text() {
        let json = serde_json::to_string(&ApiResponse::ok(LightResponse::new(true))).unwrap();
        assert_eq!(json, r#"{"success":true,"data":{"status":"on"}}"#);
        assert_eq!(LightResponse::new(false).status, "off");
    }

    #[test]
    fn wheel_response_uses_lowercase_names() {
        let resp = WheelResponse::new(Side::Both, WheelDirection::Reverse, MotorCommand::new(-100, -100));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["side"], "both");
        assert_eq!(value["direction"], "reverse");
        assert_eq!(value["motors"]["left"], -100);
    }
}
