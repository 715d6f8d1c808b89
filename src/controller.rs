//! Closed-loop straight-line drive.
//!
//! The controller samples both wheel encoders once per period and nudges the
//! power of whichever wheel fell behind. Three regimes, by the tick
//! difference `d = Δleft - Δright` over one period:
//!
//! ```text
//!   |d| > anomaly_limit   discard the sample (glitch), no change
//!   d < -leeway           left is behind:  left  += ceil(|d| / 10)
//!   d > leeway            right is behind: right += ceil(|d| / 10)
//!   otherwise             re-center on init_power, keeping the learned bias
//! ```
//!
//! Re-centering keeps the power *difference* the loop has learned but moves
//! the lower-powered wheel back to `init_power`, so corrections never ratchet the
//! overall speed upward.
//!
//! # Exit
//!
//! [`StraightLineController::run`] returns when the stop button is pressed,
//! the optional iteration budget is spent, or any collaborator call fails. In
//! every case a zero motor command is issued before returning.
//!
//! # Example
//!
//! ```rust
//! use romi_drive::config::ControllerConfig;
//! use romi_drive::controller::{StopReason, StraightLineController};
//! use romi_drive::hal::{MockDelay, MockDrive};
//! use romi_drive::traits::{ButtonState, MotorCommand};
//!
//! let mut drive = MockDrive::new();
//! drive.queue_encoders(&[(0, 0), (110, 100)]);
//! drive.queue_buttons(&[ButtonState::default(), ButtonState::from((true, false, false))]);
//!
//! let mut controller =
//!     StraightLineController::new(drive, MockDelay::new(), ControllerConfig::default());
//! let summary = controller.run().unwrap();
//!
//! assert_eq!(summary.reason, StopReason::Button);
//! assert_eq!(summary.final_command, MotorCommand::new(50, 51));
//! assert_eq!(controller.drive().last_command(), Some(MotorCommand::STOP));
//! ```

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::traits::{DriveBase, EncoderSample, MotorCommand, MOTOR_LIMIT};

/// Outcome of one sampling period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Difference exceeded the anomaly limit; sample discarded.
    Anomaly,
    /// Left wheel was behind; its power was raised by the amount.
    CorrectLeft(i16),
    /// Right wheel was behind; its power was raised by the amount.
    CorrectRight(i16),
    /// Inside the dead-band; powers re-centered.
    Maintain,
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The configured stop button was pressed.
    Button,
    /// `max_iterations` periods completed.
    IterationLimit,
}

/// Mutable loop state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ControllerState {
    /// Left motor power.
    pub left: i16,
    /// Right motor power.
    pub right: i16,
    /// Samples discarded as anomalies.
    pub anomalies: u32,
    /// Completed sampling periods.
    pub iterations: u32,
}

impl ControllerState {
    /// Both wheels at `power`, counters zeroed.
    pub fn new(power: i16) -> Self {
        let power = clamp_power(i32::from(power));
        Self {
            left: power,
            right: power,
            ..Default::default()
        }
    }

    /// Current powers as a command.
    pub fn command(&self) -> MotorCommand {
        MotorCommand::new(self.left, self.right)
    }
}

/// Summary returned by a completed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Why the loop ended.
    pub reason: StopReason,
    /// Completed sampling periods.
    pub iterations: u32,
    /// Samples discarded as anomalies.
    pub anomalies: u32,
    /// Powers in effect when the loop ended (before the final stop).
    pub final_command: MotorCommand,
}

fn clamp_power(power: i32) -> i16 {
    let limit = i32::from(MOTOR_LIMIT);
    // Within ±300, so the narrowing cast is lossless.
    power.clamp(-limit, limit) as i16
}

/// Applies one tick difference to `state`.
///
/// Pure apart from `state`; `run` is this function plus I/O.
///
/// ```
/// use romi_drive::config::ControllerConfig;
/// use romi_drive::controller::{decide, ControllerState, Decision};
///
/// let config = ControllerConfig::default();
/// let mut state = ControllerState::new(config.init_power);
///
/// assert_eq!(decide(&config, &mut state, 10), Decision::CorrectRight(1));
/// assert_eq!((state.left, state.right), (50, 51));
///
/// assert_eq!(decide(&config, &mut state, 200), Decision::Anomaly);
/// assert_eq!((state.left, state.right), (50, 51));
/// ```
pub fn decide(config: &ControllerConfig, state: &mut ControllerState, ticks_diff: i32) -> Decision {
    state.iterations += 1;

    let magnitude = ticks_diff.unsigned_abs();
    if magnitude > config.anomaly_limit.unsigned_abs() {
        state.anomalies += 1;
        return Decision::Anomaly;
    }

    let adjust = clamp_power(magnitude.div_ceil(10) as i32);
    let outside_leeway = magnitude > config.leeway.unsigned_abs();
    if outside_leeway && ticks_diff < 0 {
        state.left = clamp_power(i32::from(state.left) + i32::from(adjust));
        Decision::CorrectLeft(adjust)
    } else if outside_leeway {
        state.right = clamp_power(i32::from(state.right) + i32::from(adjust));
        Decision::CorrectRight(adjust)
    } else {
        let init = i32::from(config.init_power);
        let diff = i32::from(state.left) - i32::from(state.right);
        if diff < 0 {
            state.left = clamp_power(init);
            state.right = clamp_power(init - diff);
        } else {
            state.right = clamp_power(init);
            state.left = clamp_power(init + diff);
        }
        Decision::Maintain
    }
}

/// Straight-line controller over a [`DriveBase`].
///
/// # Type Parameters
///
/// - `B`: the drive base (a [`Romi32U4`](crate::device::Romi32U4) or a mock)
/// - `D`: the delay source used to wait out each sampling period
pub struct StraightLineController<B, D> {
    drive: B,
    delay: D,
    config: ControllerConfig,
    state: ControllerState,
}

impl<B: DriveBase, D: DelayNs> StraightLineController<B, D> {
    /// Creates a controller; nothing is sent until [`run`](Self::run).
    pub fn new(drive: B, delay: D, config: ControllerConfig) -> Self {
        let state = ControllerState::new(config.init_power);
        Self {
            drive,
            delay,
            config,
            state,
        }
    }

    /// Loop configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Current loop state.
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// The drive base.
    pub fn drive(&self) -> &B {
        &self.drive
    }

    /// Mutable access to the drive base.
    pub fn drive_mut(&mut self) -> &mut B {
        &mut self.drive
    }

    /// Releases the drive base and delay source.
    pub fn into_inner(self) -> (B, D) {
        (self.drive, self.delay)
    }

    /// Runs until the stop button, the iteration budget or an error.
    ///
    /// Motors are commanded to `(0, 0)` on every exit path.
    ///
    /// # Errors
    ///
    /// The first collaborator error. If stopping the motors also fails after
    /// that, the stop failure is logged and the first error is returned.
    pub fn run(&mut self) -> Result<RunSummary, B::Error> {
        let result = self.drive_loop();
        match (self.drive.stop(), result) {
            (Ok(()), result) => result,
            (Err(stop), Ok(_)) => {
                warn!("failed to stop motors: {:?}", stop);
                Err(stop)
            }
            (Err(stop), Err(primary)) => {
                warn!("failed to stop motors after {:?}: {:?}", primary, stop);
                Err(primary)
            }
        }
    }

    /// Runs one sampling period against `previous`, replacing it with the new
    /// sample.
    ///
    /// Returns `None` without touching the motors if the stop button is
    /// pressed.
    pub fn step(&mut self, previous: &mut EncoderSample) -> Result<Option<Decision>, B::Error> {
        if self.drive.get_button_state()?.is_pressed(self.config.stop_button) {
            info!("stop button {:?} pressed", self.config.stop_button);
            return Ok(None);
        }

        let battery = self.drive.get_battery_mv()?;
        info!(
            "power ({}, {}) bias {} battery {} mV",
            self.state.left,
            self.state.right,
            i32::from(self.state.left) - i32::from(self.state.right),
            battery
        );
        self.drive.command(self.state.command())?;

        self.delay.delay_ms(self.config.sample_period_ms);

        let sample = self.drive.get_encoders()?;
        let (left, right) = sample.ticks_since(previous);
        let ticks_diff = sample.ticks_diff(previous);
        *previous = sample;
        debug!("ticks ({}, {}) diff {}", left, right, ticks_diff);

        let decision = decide(&self.config, &mut self.state, ticks_diff);
        match decision {
            Decision::Anomaly => warn!(
                "anomaly: tick difference {} exceeds {}, sample discarded",
                ticks_diff, self.config.anomaly_limit
            ),
            Decision::CorrectLeft(adjust) => info!("+{} left", adjust),
            Decision::CorrectRight(adjust) => info!("+{} right", adjust),
            Decision::Maintain => info!("maintain"),
        }
        Ok(Some(decision))
    }

    fn drive_loop(&mut self) -> Result<RunSummary, B::Error> {
        self.state = ControllerState::new(self.config.init_power);
        info!(
            "driving straight: init {} leeway {} anomaly limit {} period {} ms",
            self.config.init_power,
            self.config.leeway,
            self.config.anomaly_limit,
            self.config.sample_period_ms
        );
        self.drive.command(self.state.command())?;
        let mut previous = self.drive.get_encoders()?;

        let reason = loop {
            if self
                .config
                .max_iterations
                .is_some_and(|max| self.state.iterations >= max)
            {
                break StopReason::IterationLimit;
            }
            if self.step(&mut previous)?.is_none() {
                break StopReason::Button;
            }
        };

        Ok(RunSummary {
            reason,
            iterations: self.state.iterations,
            anomalies: self.state.anomalies,
            final_command: self.state.command(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{DriveFault, MockDelay, MockDrive};
    use crate::traits::{Button, ButtonState};

    fn config() -> ControllerConfig {
        ControllerConfig::default()
    }

    const PRESSED_A: ButtonState = ButtonState {
        a: true,
        b: false,
        c: false,
    };
    const RELEASED: ButtonState = ButtonState {
        a: false,
        b: false,
        c: false,
    };

    // =========================================================================
    // decide()
    // =========================================================================

    #[test]
    fn negative_leeway_treated_as_magnitude() {
        let config = ControllerConfig {
            leeway: -5,
            ..config()
        };
        let mut state = ControllerState::new(50);
        assert_eq!(decide(&config, &mut state, 0), Decision::Maintain);
        assert_eq!(decide(&config, &mut state, -5), Decision::Maintain);
        assert_eq!(decide(&config, &mut state, -6), Decision::CorrectLeft(1));
        assert_eq!((state.left, state.right), (51, 50));
    }

    #[test]
    fn correction_right_wheel_behind() {
        let mut state = ControllerState::new(50);
        assert_eq!(decide(&config(), &mut state, 10), Decision::CorrectRight(1));
        assert_eq!((state.left, state.right), (50, 51));
    }

    #[test]
    fn correction_left_wheel_behind() {
        let mut state = ControllerState::new(50);
        assert_eq!(decide(&config(), &mut state, -25), Decision::CorrectLeft(3));
        assert_eq!((state.left, state.right), (53, 50));
    }

    #[test]
    fn anomaly_leaves_powers() {
        let mut state = ControllerState::new(50);
        state.right = 57;
        assert_eq!(decide(&config(), &mut state, 200), Decision::Anomaly);
        assert_eq!(decide(&config(), &mut state, -101), Decision::Anomaly);
        assert_eq!((state.left, state.right), (50, 57));
        assert_eq!(state.anomalies, 2);
        assert_eq!(state.iterations, 2);
    }

    #[test]
    fn anomaly_limit_is_exclusive() {
        let mut state = ControllerState::new(50);
        assert_eq!(decide(&config(), &mut state, 100), Decision::CorrectRight(10));
    }

    #[test]
    fn leeway_is_inclusive_dead_band() {
        for d in -5..=5 {
            let mut state = ControllerState::new(50);
            assert_eq!(decide(&config(), &mut state, d), Decision::Maintain, "d={}", d);
        }
        let mut state = ControllerState::new(50);
        assert_eq!(decide(&config(), &mut state, 6), Decision::CorrectRight(1));
    }

    #[test]
    fn maintain_recenters_keeping_bias() {
        let cfg = config();

        let mut state = ControllerState::new(50);
        state.left = 60;
        state.right = 64;
        assert_eq!(decide(&cfg, &mut state, 3), Decision::Maintain);
        assert_eq!((state.left, state.right), (50, 54));

        state.left = 70;
        state.right = 62;
        decide(&cfg, &mut state, 0);
        assert_eq!((state.left, state.right), (58, 50));
    }

    #[test]
    fn powers_saturate_at_motor_limit() {
        let mut state = ControllerState::new(50);
        state.right = 295;
        decide(&config(), &mut state, 90);
        assert_eq!(state.right, MOTOR_LIMIT);
    }

    // =========================================================================
    // run()
    // =========================================================================

    #[test]
    fn stops_immediately_when_button_held() {
        let mut drive = MockDrive::new();
        drive.queue_buttons(&[PRESSED_A]);
        let mut c = StraightLineController::new(drive, MockDelay::new(), config());

        let summary = c.run().unwrap();
        assert_eq!(summary.reason, StopReason::Button);
        assert_eq!(summary.iterations, 0);
        assert_eq!(
            c.drive().commands,
            vec![MotorCommand::new(50, 50), MotorCommand::STOP]
        );
    }

    #[test]
    fn new_sample_replaces_old_every_period() {
        let mut drive = MockDrive::new();
        // Period 1: right behind. Period 2: anomaly. Period 3 is measured
        // against the anomalous sample, not the one before it.
        drive.queue_encoders(&[(0, 0), (10, 0), (500, 0), (512, 2)]);
        drive.queue_buttons(&[RELEASED, RELEASED, RELEASED, PRESSED_A]);
        let delay = MockDelay::new();
        let mut c = StraightLineController::new(drive, delay.clone(), config());

        let summary = c.run().unwrap();
        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.anomalies, 1);
        assert_eq!(summary.final_command, MotorCommand::new(50, 52));
        assert_eq!(delay.total_ns(), 3 * 1_000_000_000);
        assert_eq!(c.drive().last_command(), Some(MotorCommand::STOP));
    }

    #[test]
    fn iteration_limit_ends_run() {
        let mut drive = MockDrive::new();
        drive.queue_encoders(&[(0, 0), (100, 100), (200, 200)]);
        let cfg = config().with_max_iterations(Some(2));
        let mut c = StraightLineController::new(drive, MockDelay::new(), cfg);

        let summary = c.run().unwrap();
        assert_eq!(summary.reason, StopReason::IterationLimit);
        assert_eq!(summary.iterations, 2);
        assert_eq!(summary.final_command, MotorCommand::new(50, 50));
        assert_eq!(c.drive().last_command(), Some(MotorCommand::STOP));
    }

    #[test]
    fn custom_stop_button() {
        let mut drive = MockDrive::new();
        drive.queue_buttons(&[PRESSED_A, ButtonState::from((false, false, true))]);
        drive.queue_encoders(&[(0, 0), (0, 0)]);
        let cfg = config().with_stop_button(Button::C);
        let mut c = StraightLineController::new(drive, MockDelay::new(), cfg);

        let summary = c.run().unwrap();
        assert_eq!(summary.iterations, 1);
    }

    #[test]
    fn error_mid_run_still_stops() {
        let mut drive = MockDrive::new();
        drive.queue_encoders(&[(0, 0), (5, 5)]);
        drive.fail_encoders_on(2);
        let mut c = StraightLineController::new(drive, MockDelay::new(), config());

        assert_eq!(c.run(), Err(DriveFault::Encoders));
        assert_eq!(c.drive().last_command(), Some(MotorCommand::STOP));
    }

    #[test]
    fn primary_error_wins_over_stop_failure() {
        let mut drive = MockDrive::new();
        drive.fail_encoders_on(0);
        drive.fail_motors_from(1);
        let mut c = StraightLineController::new(drive, MockDelay::new(), config());

        assert_eq!(c.run(), Err(DriveFault::Encoders));
        assert_eq!(c.drive().commands, vec![MotorCommand::new(50, 50)]);
    }

    #[test]
    fn stop_failure_reported_after_clean_exit() {
        let mut drive = MockDrive::new();
        drive.queue_buttons(&[PRESSED_A]);
        drive.fail_motors_from(1);
        let mut c = StraightLineController::new(drive, MockDelay::new(), config());

        assert_eq!(c.run(), Err(DriveFault::Motors));
    }

    #[test]
    fn step_reports_button_without_commanding() {
        let mut drive = MockDrive::new();
        drive.queue_buttons(&[PRESSED_A]);
        let mut c = StraightLineController::new(drive, MockDelay::new(), config());
        let mut prev = EncoderSample::default();

        assert_eq!(c.step(&mut prev), Ok(None));
        assert!(c.drive().commands.is_empty());
    }
}
