//! Shared, mutex-guarded drive for the web service.
//!
//! `SharedDrive` owns the one [`DriveBase`] and the indicator light. Every
//! request runs its whole sequence of bus transactions under a single lock, so
//! two handlers can never interleave a pointer write with another device's
//! read.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use romi_drive::hal::{MockDrive, MockPin};
//! use romi_drive::services::{SharedDrive, Side};
//!
//! let state = Arc::new(SharedDrive::new(MockDrive::new(), MockPin::new()));
//!
//! state.set_wheel(Side::Left, 100).unwrap();
//! state.set_wheel(Side::Right, -100).unwrap();
//! assert_eq!(state.last_command().left, 100);
//! assert_eq!(state.last_command().right, -100);
//!
//! state.stop_all().unwrap();
//! assert!(state.last_command().is_stop());
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use embedded_hal::digital::OutputPin;
use log::info;

use crate::traits::{ButtonState, DriveBase, EncoderSample, MotorCommand};

// ============================================================================
// Path Vocabulary
// ============================================================================

/// Which wheel(s) a request addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Left wheel only.
    Left,
    /// Right wheel only.
    Right,
    /// Both wheels.
    Both,
}

impl Side {
    /// Parse `"left"`, `"right"` or `"both"`.
    pub fn from_text(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Side::Left),
            "right" => Some(Side::Right),
            "both" => Some(Side::Both),
            _ => None,
        }
    }
}

/// Requested wheel motion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WheelDirection {
    /// Positive power.
    Forward,
    /// Negative power.
    Reverse,
    /// Zero power.
    Stop,
}

impl WheelDirection {
    /// Parse `"forward"`, `"reverse"` or `"stop"`.
    pub fn from_text(s: &str) -> Option<Self> {
        match s {
            "forward" => Some(WheelDirection::Forward),
            "reverse" => Some(WheelDirection::Reverse),
            "stop" => Some(WheelDirection::Stop),
            _ => None,
        }
    }

    /// Signed power for a magnitude.
    pub fn power(self, magnitude: i16) -> i16 {
        match self {
            WheelDirection::Forward => magnitude,
            WheelDirection::Reverse => magnitude.saturating_neg(),
            WheelDirection::Stop => 0,
        }
    }
}

// ============================================================================
// Shared Drive
// ============================================================================

/// Sensor snapshot taken under one lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriveSnapshot {
    /// Battery voltage in millivolts.
    pub battery_mv: u16,
    /// User buttons.
    pub buttons: ButtonState,
    /// Encoder counters.
    pub encoders: EncoderSample,
    /// Last motor command sent through this handle.
    pub motors: MotorCommand,
    /// Indicator light state.
    pub light: bool,
}

struct Inner<B, L> {
    drive: B,
    light: L,
    last_command: MotorCommand,
    light_on: bool,
}

/// Thread-safe owner of the drive base and indicator light.
///
/// Uses `Mutex` (not `RwLock`): every drive call, reads included, moves the
/// device register pointer and needs exclusive access.
pub struct SharedDrive<B, L> {
    inner: Mutex<Inner<B, L>>,
    start_time: Instant,
}

impl<B: DriveBase, L: OutputPin> SharedDrive<B, L> {
    /// Wraps a drive base and light.
    pub fn new(drive: B, light: L) -> Self {
        Self {
            inner: Mutex::new(Inner {
                drive,
                light,
                last_command: MotorCommand::STOP,
                light_on: false,
            }),
            start_time: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<B, L>> {
        // A handler that panicked mid-request leaves the drive itself intact.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Milliseconds since this handle was created.
    #[inline]
    pub fn uptime_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Access the drive base with the lock held.
    ///
    /// The closure pattern prevents accidentally holding the lock across
    /// await points.
    pub fn with_drive<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut B) -> R,
    {
        let mut guard = self.lock();
        f(&mut guard.drive)
    }

    /// Reads battery, buttons and encoders in one critical section.
    pub fn snapshot(&self) -> Result<DriveSnapshot, B::Error> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        Ok(DriveSnapshot {
            battery_mv: inner.drive.get_battery_mv()?,
            buttons: inner.drive.get_button_state()?,
            encoders: inner.drive.get_encoders()?,
            motors: inner.last_command,
            light: inner.light_on,
        })
    }

    /// Last motor command sent through this handle.
    pub fn last_command(&self) -> MotorCommand {
        self.lock().last_command
    }

    /// Whether the indicator light is on.
    pub fn light_on(&self) -> bool {
        self.lock().light_on
    }

    /// Switches the indicator light.
    pub fn set_light(&self, on: bool) -> Result<(), L::Error> {
        let mut guard = self.lock();
        if on {
            guard.light.set_high()?;
        } else {
            guard.light.set_low()?;
        }
        guard.light_on = on;
        info!("light {}", if on { "on" } else { "off" });
        Ok(())
    }

    /// Sets one or both wheels to `power`, keeping the other wheel's last power.
    ///
    /// Returns the command actually sent (after clamping).
    pub fn set_wheel(&self, side: Side, power: i16) -> Result<MotorCommand, B::Error> {
        let mut guard = self.lock();
        let last = guard.last_command;
        let cmd = match side {
            Side::Left => MotorCommand::new(power, last.right),
            Side::Right => MotorCommand::new(last.left, power),
            Side::Both => MotorCommand::new(power, power),
        };
        guard.drive.command(cmd)?;
        guard.last_command = cmd;
        info!("{:?} wheel power {} -> {:?}", side, power, cmd);
        Ok(cmd)
    }

    /// Stops both wheels.
    pub fn stop_all(&self) -> Result<(), B::Error> {
        let mut guard = self.lock();
        guard.drive.stop()?;
        guard.last_command = MotorCommand::STOP;
        info!("wheels: stop all");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{DriveFault, MockDrive, MockPin};
    use std::sync::Arc;

    fn shared() -> (Arc<SharedDrive<MockDrive, MockPin>>, MockPin) {
        let pin = MockPin::new();
        (Arc::new(SharedDrive::new(MockDrive::new(), pin.clone())), pin)
    }

    #[test]
    fn path_vocabulary() {
        assert_eq!(Side::from_text("both"), Some(Side::Both));
        assert_eq!(Side::from_text("Left"), None);
        assert_eq!(WheelDirection::from_text("reverse"), Some(WheelDirection::Reverse));
        assert_eq!(WheelDirection::Reverse.power(100), -100);
        assert_eq!(WheelDirection::Stop.power(100), 0);
        assert_eq!(WheelDirection::Reverse.power(i16::MIN), i16::MAX);
    }

    #[test]
    fn snapshot_reads_every_sensor() {
        let (state, _) = shared();
        state.with_drive(|d| d.queue_encoders(&[(7, -7)]));
        let snap = state.snapshot().unwrap();
        assert_eq!(snap.battery_mv, 7200);
        assert_eq!(snap.encoders, EncoderSample::new(7, -7));
        assert_eq!(snap.motors, MotorCommand::STOP);
        assert!(!snap.light);
    }

    #[test]
    fn wheel_keeps_other_side() {
        let (state, _) = shared();
        state.set_wheel(Side::Both, 80).unwrap();
        state.set_wheel(Side::Right, -80).unwrap();
        assert_eq!(state.last_command(), MotorCommand::new(80, -80));
        state.with_drive(|d| {
            assert_eq!(d.last_command(), Some(MotorCommand::new(80, -80)));
        });
    }

    #[test]
    fn failed_command_does_not_update_last() {
        let (state, _) = shared();
        state.set_wheel(Side::Left, 50).unwrap();
        state.with_drive(|d| d.fail_motors_from(1));
        assert_eq!(state.set_wheel(Side::Right, 50), Err(DriveFault::Motors));
        assert_eq!(state.last_command(), MotorCommand::new(50, 0));
    }

    #[test]
    fn light_drives_pin() {
        let (state, pin) = shared();
        state.set_light(true).unwrap();
        assert!(pin.is_high());
        assert!(state.light_on());
        state.set_light(false).unwrap();
        assert!(!pin.is_high());
    }

    #[test]
    fn concurrent_requests_serialize() {
        use std::thread;

        let (state, _) = shared();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    for _ in 0..25 {
                        state.set_wheel(Side::Both, i * 10).unwrap();
                        let _ = state.snapshot().unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        state.with_drive(|d| assert_eq!(d.commands.len(), 100));
    }
}
