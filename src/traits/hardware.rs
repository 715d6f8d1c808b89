//! Hardware abstraction for a differential-drive base.
//!
//! This module defines the collaborator interface the controller and any
//! presentation layer use to talk to the robot, plus the small value types that
//! cross it.
//!
//! # Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`DriveBase`] | Motors, buttons, encoders, battery |
//! | [`MotorCommand`] | Clamped left/right power pair |
//! | [`EncoderSample`] | Left/right tick counters at one instant |
//! | [`ButtonState`] | The three user buttons |
//! | [`LedState`] | The three indicator LEDs |
//!
//! # Implementation
//!
//! [`Romi32U4`](crate::device::Romi32U4) implements [`DriveBase`] over a
//! [`RegisterBus`](crate::bus::RegisterBus). For tests without a bus, use
//! [`MockDrive`](crate::hal::MockDrive).
//!
//! # Example
//!
//! ```rust
//! use romi_drive::traits::{DriveBase, MotorCommand};
//! use romi_drive::hal::MockDrive;
//!
//! let mut drive = MockDrive::new();
//! drive.set_motor_power(120, 110).unwrap();
//! assert_eq!(drive.last_command(), Some(MotorCommand::new(120, 110)));
//!
//! drive.stop().unwrap();
//! assert_eq!(drive.last_command(), Some(MotorCommand::STOP));
//! ```

/// Largest motor power magnitude the coprocessor accepts.
pub const MOTOR_LIMIT: i16 = 300;

/// One of the three user buttons on the control board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Button {
    /// Button A (leftmost).
    #[default]
    A,
    /// Button B (middle).
    B,
    /// Button C (rightmost).
    C,
}

impl Button {
    /// Parse a button name (`"a"`, `"b"`, `"c"`, case-insensitive).
    ///
    /// ```
    /// use romi_drive::traits::Button;
    ///
    /// assert_eq!(Button::from_text("a"), Some(Button::A));
    /// assert_eq!(Button::from_text(" C "), Some(Button::C));
    /// assert_eq!(Button::from_text("d"), None);
    /// ```
    pub fn from_text(s: &str) -> Option<Self> {
        match s.trim() {
            "a" | "A" => Some(Button::A),
            "b" | "B" => Some(Button::B),
            "c" | "C" => Some(Button::C),
            _ => None,
        }
    }
}

/// Pressed state of the three user buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ButtonState {
    /// Button A pressed.
    pub a: bool,
    /// Button B pressed.
    pub b: bool,
    /// Button C pressed.
    pub c: bool,
}

impl ButtonState {
    /// Returns true if `button` is pressed.
    #[inline]
    pub const fn is_pressed(&self, button: Button) -> bool {
        match button {
            Button::A => self.a,
            Button::B => self.b,
            Button::C => self.c,
        }
    }
}

impl From<(bool, bool, bool)> for ButtonState {
    fn from((a, b, c): (bool, bool, bool)) -> Self {
        Self { a, b, c }
    }
}

/// On/off state of the three indicator LEDs.
///
/// Field order matches the coprocessor register layout: yellow, green, red.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LedState {
    /// Yellow LED.
    pub yellow: bool,
    /// Green LED.
    pub green: bool,
    /// Red LED.
    pub red: bool,
}

/// Left/right encoder tick counters captured at one instant.
///
/// Counters are signed 16-bit and wrap; use [`ticks_since`](Self::ticks_since)
/// rather than subtracting fields directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncoderSample {
    /// Left wheel counter.
    pub left: i16,
    /// Right wheel counter.
    pub right: i16,
}

impl EncoderSample {
    /// Creates a sample.
    #[inline]
    pub const fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }

    /// Ticks travelled by each wheel since `earlier`, accounting for wrap.
    ///
    /// ```
    /// use romi_drive::traits::EncoderSample;
    ///
    /// let old = EncoderSample::new(i16::MAX, 0);
    /// let new = EncoderSample::new(i16::MIN, 10);
    /// assert_eq!(new.ticks_since(&old), (1, 10));
    /// ```
    #[inline]
    pub fn ticks_since(&self, earlier: &EncoderSample) -> (i16, i16) {
        (
            self.left.wrapping_sub(earlier.left),
            self.right.wrapping_sub(earlier.right),
        )
    }

    /// Left travel minus right travel since `earlier`.
    ///
    /// Positive means the left wheel went further (the right wheel is behind).
    #[inline]
    pub fn ticks_diff(&self, earlier: &EncoderSample) -> i32 {
        let (left, right) = self.ticks_since(earlier);
        i32::from(left) - i32::from(right)
    }
}

/// Left/right motor power, clamped to `±MOTOR_LIMIT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorCommand {
    /// Left motor power.
    pub left: i16,
    /// Right motor power.
    pub right: i16,
}

impl MotorCommand {
    /// Both motors off.
    pub const STOP: Self = Self { left: 0, right: 0 };

    /// Creates a command, clamping each side to `±MOTOR_LIMIT`.
    ///
    /// ```
    /// use romi_drive::traits::MotorCommand;
    ///
    /// let cmd = MotorCommand::new(500, -400);
    /// assert_eq!((cmd.left, cmd.right), (300, -300));
    /// ```
    #[inline]
    pub fn new(left: i16, right: i16) -> Self {
        Self {
            left: left.clamp(-MOTOR_LIMIT, MOTOR_LIMIT),
            right: right.clamp(-MOTOR_LIMIT, MOTOR_LIMIT),
        }
    }

    /// Returns true if both motors are commanded off.
    #[inline]
    pub fn is_stop(&self) -> bool {
        *self == Self::STOP
    }
}

/// Differential-drive base: the only surface consumers may call.
///
/// Every method performs a fresh device transaction; nothing is cached, so
/// call frequency bounds loop rate. Methods take `&mut self` because reads
/// move the device's register pointer.
///
/// # Implementation Notes
///
/// - `set_motor_power` must clamp to the device range
/// - Errors are surfaced unchanged from the transport
pub trait DriveBase {
    /// Error type for drive operations.
    type Error: core::fmt::Debug;

    /// Command left/right motor power.
    fn set_motor_power(&mut self, left: i16, right: i16) -> Result<(), Self::Error>;

    /// Read the three user buttons.
    fn get_button_state(&mut self) -> Result<ButtonState, Self::Error>;

    /// Read both encoder counters.
    fn get_encoders(&mut self) -> Result<EncoderSample, Self::Error>;

    /// Read battery voltage in millivolts.
    fn get_battery_mv(&mut self) -> Result<u16, Self::Error>;

    /// Apply a [`MotorCommand`].
    fn command(&mut self, cmd: MotorCommand) -> Result<(), Self::Error> {
        self.set_motor_power(cmd.left, cmd.right)
    }

    /// Command both motors to zero.
    fn stop(&mut self) -> Result<(), Self::Error> {
        self.command(MotorCommand::STOP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Value Type Tests
    // =========================================================================

    #[test]
    fn button_default_is_a() {
        assert_eq!(Button::default(), Button::A);
    }

    #[test]
    fn button_state_lookup() {
        let state = ButtonState::from((false, true, false));
        assert!(!state.is_pressed(Button::A));
        assert!(state.is_pressed(Button::B));
        assert!(!state.is_pressed(Button::C));
    }

    #[test]
    fn encoder_ticks_diff_sign() {
        let old = EncoderSample::new(100, 100);
        let new = EncoderSample::new(110, 100);
        assert_eq!(new.ticks_since(&old), (10, 0));
        assert_eq!(new.ticks_diff(&old), 10);
        assert_eq!(old.ticks_diff(&new), -10);
    }

    #[test]
    fn encoder_ticks_wrap_backwards() {
        let old = EncoderSample::new(i16::MIN, 5);
        let new = EncoderSample::new(i16::MAX, 0);
        assert_eq!(new.ticks_since(&old), (-1, -5));
        assert_eq!(new.ticks_diff(&old), 4);
    }

    #[test]
    fn motor_command_clamps() {
        assert_eq!(MotorCommand::new(301, -301), MotorCommand::new(300, -300));
        assert!(MotorCommand::STOP.is_stop());
        assert!(!MotorCommand::new(0, 1).is_stop());
    }

    // =========================================================================
    // DriveBase Default Methods Tests
    // =========================================================================

    #[derive(Default)]
    struct TestDrive {
        commands: std::vec::Vec<(i16, i16)>,
    }

    impl DriveBase for TestDrive {
        type Error = ();

        fn set_motor_power(&mut self, left: i16, right: i16) -> Result<(), ()> {
            self.commands.push((left, right));
            Ok(())
        }

        fn get_button_state(&mut self) -> Result<ButtonState, ()> {
            Ok(ButtonState::default())
        }

        fn get_encoders(&mut self) -> Result<EncoderSample, ()> {
            Ok(EncoderSample::default())
        }

        fn get_battery_mv(&mut self) -> Result<u16, ()> {
            Ok(7200)
        }
    }

    #[test]
    fn drive_base_stop_default_impl() {
        let mut drive = TestDrive::default();
        drive.command(MotorCommand::new(40, 60)).unwrap();
        drive.stop().unwrap();
        assert_eq!(drive.commands, vec![(40, 60), (0, 0)]);
    }
}
