//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for the bus, the delay source, the drive
//! base and the indicator light, enabling development and testing on desktop
//! without a robot attached.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockBus`] | [`I2c`] | Register file per device, transaction log |
//! | [`MockDelay`] | [`DelayNs`] | Records delays, optionally into a bus log |
//! | [`MockDrive`] | [`DriveBase`] | Queued samples, command log, fault injection |
//! | [`MockPin`] | [`OutputPin`] | Shared on/off state |
//!
//! # Example
//!
//! ```rust
//! use romi_drive::device::Romi32U4;
//! use romi_drive::bus::RegisterBus;
//! use romi_drive::hal::MockBus;
//! use romi_drive::traits::DriveBase;
//!
//! let mock = MockBus::new();
//! mock.set_register(0x14, 0x0a, &7400u16.to_le_bytes());
//!
//! let mut romi = Romi32U4::new(RegisterBus::new(mock.clone(), mock.delay()));
//! assert_eq!(romi.get_battery_mv().unwrap(), 7400);
//! ```
//!
//! [`I2c`]: embedded_hal::i2c::I2c
//! [`DelayNs`]: embedded_hal::delay::DelayNs
//! [`OutputPin`]: embedded_hal::digital::OutputPin

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::i2c::{self, ErrorKind, NoAcknowledgeSource, Operation};

use crate::traits::{ButtonState, DriveBase, EncoderSample, MotorCommand};

// ============================================================================
// Bus Mock
// ============================================================================

/// One recorded bus event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusOp {
    /// Write to `device` with the given bytes (pointer first).
    Write(u8, Vec<u8>),
    /// Read of `len` bytes from `device`.
    Read(u8, usize),
    /// Delay in nanoseconds, recorded by an attached [`MockDelay`].
    Delay(u64),
}

/// Transport error reported by [`MockBus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockI2cError;

impl i2c::Error for MockI2cError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
    }
}

struct Device {
    regs: [u8; 256],
    pointer: u8,
    scripts: HashMap<u8, VecDeque<Vec<u8>>>,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            regs: [0; 256],
            pointer: 0,
            scripts: HashMap::new(),
        }
    }
}

#[derive(Default)]
struct BusState {
    devices: HashMap<u8, Device>,
    ops: Vec<BusOp>,
    fail_next: usize,
    failing: Vec<(u8, u8)>,
}

impl BusState {
    fn take_failure(&mut self) -> bool {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            true
        } else {
            false
        }
    }
}

/// Simulated I2C bus with one 256-byte register file per device address.
///
/// Models the pointer semantics of the Romi coprocessor and the LSM6: a write
/// sets the register pointer from its first byte and stores the rest from
/// there; each read byte returns the register at the pointer and advances it.
///
/// Clones share state, so a test keeps one handle while the driver owns
/// another.
///
/// # Example
///
/// ```rust
/// use embedded_hal::i2c::I2c;
/// use romi_drive::hal::{BusOp, MockBus};
///
/// let mut mock = MockBus::new();
/// mock.set_register(0x14, 0x03, &[1, 0, 1]);
///
/// let mut buf = [0u8; 1];
/// mock.write(0x14, &[0x03]).unwrap();
/// mock.read(0x14, &mut buf).unwrap();
/// assert_eq!(buf, [1]);
/// assert_eq!(mock.ops()[1], BusOp::Read(0x14, 1));
/// ```
#[derive(Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<BusState>>,
}

impl MockBus {
    /// Creates an empty bus; every register reads as zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        // A panicking test must not poison unrelated assertions.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores `bytes` starting at `register` on `device`.
    pub fn set_register(&self, device: u8, register: u8, bytes: &[u8]) {
        let mut state = self.lock();
        let dev = state.devices.entry(device).or_default();
        for (i, b) in bytes.iter().enumerate() {
            dev.regs[register.wrapping_add(i as u8) as usize] = *b;
        }
    }

    /// Returns `len` bytes starting at `register` on `device`.
    pub fn register(&self, device: u8, register: u8, len: usize) -> Vec<u8> {
        let mut state = self.lock();
        let dev = state.devices.entry(device).or_default();
        (0..len)
            .map(|i| dev.regs[register.wrapping_add(i as u8) as usize])
            .collect()
    }

    /// Queues `bytes` to be loaded at `register` the next time a pointer-only
    /// write selects it. Successive scripts are consumed in order.
    pub fn script(&self, device: u8, register: u8, bytes: &[u8]) {
        let mut state = self.lock();
        state
            .devices
            .entry(device)
            .or_default()
            .scripts
            .entry(register)
            .or_default()
            .push_back(bytes.to_vec());
    }

    /// Queues successive encoder readings for the coprocessor at `device`.
    pub fn queue_encoders(&self, device: u8, samples: &[(i16, i16)]) {
        for (left, right) in samples {
            let mut bytes = left.to_le_bytes().to_vec();
            bytes.extend_from_slice(&right.to_le_bytes());
            self.script(device, crate::registers::romi::ENCODERS.address, &bytes);
        }
    }

    /// Makes the next `count` bus operations fail.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// Makes every transaction whose pointer selects `register` fail.
    pub fn fail_register(&self, device: u8, register: u8) {
        self.lock().failing.push((device, register));
    }

    /// Stops failing transactions on every register.
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.fail_next = 0;
        state.failing.clear();
    }

    /// Snapshot of the operation log.
    pub fn ops(&self) -> Vec<BusOp> {
        self.lock().ops.clone()
    }

    /// Returns a delay source that records into this bus's operation log.
    pub fn delay(&self) -> MockDelay {
        MockDelay {
            total_ns: Arc::new(AtomicU64::new(0)),
            log: Some(Arc::clone(&self.state)),
        }
    }

    fn apply(state: &mut BusState, address: u8, op: &mut Operation<'_>) -> Result<(), MockI2cError> {
        match op {
            Operation::Write(bytes) => {
                state.ops.push(BusOp::Write(address, bytes.to_vec()));
                let Some((&register, payload)) = bytes.split_first() else {
                    return Ok(());
                };
                if state.take_failure() || state.failing.contains(&(address, register)) {
                    return Err(MockI2cError);
                }
                let dev = state.devices.entry(address).or_default();
                dev.pointer = register;
                if payload.is_empty() {
                    if let Some(bytes) = dev.scripts.get_mut(&register).and_then(VecDeque::pop_front) {
                        for (i, b) in bytes.iter().enumerate() {
                            dev.regs[register.wrapping_add(i as u8) as usize] = *b;
                        }
                    }
                }
                for b in payload.iter() {
                    dev.regs[dev.pointer as usize] = *b;
                    dev.pointer = dev.pointer.wrapping_add(1);
                }
                Ok(())
            }
            Operation::Read(buf) => {
                state.ops.push(BusOp::Read(address, buf.len()));
                if state.take_failure() {
                    return Err(MockI2cError);
                }
                let dev = state.devices.entry(address).or_default();
                for b in buf.iter_mut() {
                    *b = dev.regs[dev.pointer as usize];
                    dev.pointer = dev.pointer.wrapping_add(1);
                }
                Ok(())
            }
        }
    }
}

impl i2c::ErrorType for MockBus {
    type Error = MockI2cError;
}

impl i2c::I2c for MockBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.lock();
        for op in operations.iter_mut() {
            Self::apply(&mut state, address, op)?;
        }
        Ok(())
    }
}

// ============================================================================
// Delay Mock
// ============================================================================

/// Delay source that returns immediately and records what was requested.
///
/// A standalone `MockDelay` only accumulates a total; one obtained from
/// [`MockBus::delay`] also appends [`BusOp::Delay`] entries to the bus log so
/// tests can check ordering against transfers.
#[derive(Clone, Default)]
pub struct MockDelay {
    total_ns: Arc<AtomicU64>,
    log: Option<Arc<Mutex<BusState>>>,
}

impl MockDelay {
    /// Creates a delay that is not attached to any bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requested delay in nanoseconds.
    pub fn total_ns(&self) -> u64 {
        self.total_ns.load(Ordering::Relaxed)
    }

    /// Total requested delay in whole microseconds.
    pub fn total_us(&self) -> u64 {
        self.total_ns() / 1_000
    }

    fn record(&self, ns: u64) {
        self.total_ns.fetch_add(ns, Ordering::Relaxed);
        if let Some(log) = &self.log {
            let mut state = log.lock().unwrap_or_else(|e| e.into_inner());
            state.ops.push(BusOp::Delay(ns));
        }
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.record(u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.record(u64::from(us) * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.record(u64::from(ms) * 1_000_000);
    }
}

// ============================================================================
// Drive Mock
// ============================================================================

/// Failure reported by [`MockDrive`], naming the operation that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriveFault {
    /// `set_motor_power` failed.
    Motors,
    /// `get_encoders` failed.
    Encoders,
    /// `get_button_state` failed.
    Buttons,
}

/// Mock drive base for testing consumers of [`DriveBase`].
///
/// Encoder samples and button states are queued and consumed one per read;
/// once a queue is empty the last value repeats. Every successful motor
/// command is logged in [`commands`](Self::commands).
///
/// # Example
///
/// ```rust
/// use romi_drive::hal::MockDrive;
/// use romi_drive::traits::{ButtonState, DriveBase, EncoderSample};
///
/// let mut drive = MockDrive::new();
/// drive.queue_encoders(&[(0, 0), (12, 10)]);
/// drive.queue_buttons(&[ButtonState::default(), ButtonState::from((true, false, false))]);
///
/// assert_eq!(drive.get_encoders().unwrap(), EncoderSample::new(0, 0));
/// assert_eq!(drive.get_encoders().unwrap(), EncoderSample::new(12, 10));
/// assert_eq!(drive.get_encoders().unwrap(), EncoderSample::new(12, 10));
///
/// assert!(!drive.get_button_state().unwrap().a);
/// assert!(drive.get_button_state().unwrap().a);
/// ```
#[derive(Debug, Default)]
pub struct MockDrive {
    /// Every motor command accepted, in order.
    pub commands: Vec<MotorCommand>,
    /// Battery voltage returned by `get_battery_mv`.
    pub battery_mv: u16,
    /// Number of `get_encoders` calls so far, failed ones included.
    pub encoder_reads: usize,
    encoders: VecDeque<EncoderSample>,
    last_encoders: EncoderSample,
    buttons: VecDeque<ButtonState>,
    last_buttons: ButtonState,
    fail_encoders_on: Option<usize>,
    fail_motors_from: Option<usize>,
    fail_buttons: bool,
    motor_calls: usize,
}

impl MockDrive {
    /// Creates a drive at rest with a 7.2 V battery.
    pub fn new() -> Self {
        Self {
            battery_mv: 7200,
            ..Default::default()
        }
    }

    /// Queue encoder readings, consumed in order.
    pub fn queue_encoders(&mut self, samples: &[(i16, i16)]) {
        self.encoders
            .extend(samples.iter().map(|&(l, r)| EncoderSample::new(l, r)));
    }

    /// Queue button states, consumed in order.
    pub fn queue_buttons(&mut self, states: &[ButtonState]) {
        self.buttons.extend(states.iter().copied());
    }

    /// Fail the `n`th `get_encoders` call (zero-based).
    pub fn fail_encoders_on(&mut self, n: usize) {
        self.fail_encoders_on = Some(n);
    }

    /// Fail every `set_motor_power` call from the `n`th onward (zero-based).
    pub fn fail_motors_from(&mut self, n: usize) {
        self.fail_motors_from = Some(n);
    }

    /// Fail every `get_button_state` call.
    pub fn fail_buttons(&mut self, fail: bool) {
        self.fail_buttons = fail;
    }

    /// The most recent accepted motor command.
    pub fn last_command(&self) -> Option<MotorCommand> {
        self.commands.last().copied()
    }
}

impl DriveBase for MockDrive {
    type Error = DriveFault;

    fn set_motor_power(&mut self, left: i16, right: i16) -> Result<(), DriveFault> {
        let call = self.motor_calls;
        self.motor_calls += 1;
        if self.fail_motors_from.is_some_and(|n| call >= n) {
            return Err(DriveFault::Motors);
        }
        self.commands.push(MotorCommand::new(left, right));
        Ok(())
    }

    fn get_button_state(&mut self) -> Result<ButtonState, DriveFault> {
        if self.fail_buttons {
            return Err(DriveFault::Buttons);
        }
        if let Some(state) = self.buttons.pop_front() {
            self.last_buttons = state;
        }
        Ok(self.last_buttons)
    }

    fn get_encoders(&mut self) -> Result<EncoderSample, DriveFault> {
        let call = self.encoder_reads;
        self.encoder_reads += 1;
        if self.fail_encoders_on == Some(call) {
            return Err(DriveFault::Encoders);
        }
        if let Some(sample) = self.encoders.pop_front() {
            self.last_encoders = sample;
        }
        Ok(self.last_encoders)
    }

    fn get_battery_mv(&mut self) -> Result<u16, DriveFault> {
        Ok(self.battery_mv)
    }
}

// ============================================================================
// Pin Mock
// ============================================================================

/// Output pin whose level can be observed from a clone.
#[derive(Clone, Debug, Default)]
pub struct MockPin {
    high: Arc<AtomicBool>,
}

impl MockPin {
    /// Creates a pin driven low.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the pin is driven high.
    pub fn is_high(&self) -> bool {
        self.high.load(Ordering::Relaxed)
    }
}

impl digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::I2c;

    // =========================================================================
    // MockBus Tests
    // =========================================================================

    #[test]
    fn mock_bus_unset_registers_read_zero() {
        let mut bus = MockBus::new();
        let mut buf = [0xffu8; 2];
        bus.write(0x20, &[0x10]).unwrap();
        bus.read(0x20, &mut buf).unwrap();
        assert_eq!(buf, [0, 0]);
    }

    #[test]
    fn mock_bus_pointer_advances() {
        let mut bus = MockBus::new();
        bus.set_register(0x14, 0x0a, &[1, 2, 3]);
        bus.write(0x14, &[0x0a]).unwrap();
        let mut a = [0u8];
        let mut b = [0u8];
        bus.read(0x14, &mut a).unwrap();
        bus.read(0x14, &mut b).unwrap();
        assert_eq!((a[0], b[0]), (1, 2));
    }

    #[test]
    fn mock_bus_block_write_stores_payload() {
        let mut bus = MockBus::new();
        bus.write(0x14, &[0x06, 9, 8, 7]).unwrap();
        assert_eq!(bus.register(0x14, 0x06, 3), vec![9, 8, 7]);
    }

    #[test]
    fn mock_bus_devices_are_independent() {
        let mut bus = MockBus::new();
        bus.write(0x14, &[0x00, 1]).unwrap();
        bus.write(0x6b, &[0x00, 2]).unwrap();
        assert_eq!(bus.register(0x14, 0x00, 1), vec![1]);
        assert_eq!(bus.register(0x6b, 0x00, 1), vec![2]);
    }

    #[test]
    fn mock_bus_scripts_load_on_pointer_write() {
        let mut bus = MockBus::new();
        bus.script(0x14, 0x27, &[5]);
        bus.script(0x14, 0x27, &[6]);

        let mut buf = [0u8];
        bus.write(0x14, &[0x27]).unwrap();
        bus.read(0x14, &mut buf).unwrap();
        assert_eq!(buf, [5]);
        bus.write(0x14, &[0x27]).unwrap();
        bus.read(0x14, &mut buf).unwrap();
        assert_eq!(buf, [6]);
        // Exhausted scripts leave the last value in place.
        bus.write(0x14, &[0x27]).unwrap();
        bus.read(0x14, &mut buf).unwrap();
        assert_eq!(buf, [6]);
    }

    #[test]
    fn mock_bus_fail_next_counts_down() {
        let mut bus = MockBus::new();
        bus.fail_next(1);
        assert_eq!(bus.write(0x14, &[0x00, 1]), Err(MockI2cError));
        assert_eq!(bus.register(0x14, 0x00, 1), vec![0]);
        bus.write(0x14, &[0x00, 1]).unwrap();
        assert_eq!(bus.register(0x14, 0x00, 1), vec![1]);
    }

    #[test]
    fn mock_bus_fail_register_is_sticky() {
        let mut bus = MockBus::new();
        bus.fail_register(0x14, 0x27);
        assert!(bus.write(0x14, &[0x27]).is_err());
        assert!(bus.write(0x14, &[0x27]).is_err());
        assert!(bus.write(0x14, &[0x0a]).is_ok());
        bus.clear_failures();
        assert!(bus.write(0x14, &[0x27]).is_ok());
    }

    #[test]
    fn mock_delay_attached_records_into_bus_log() {
        let bus = MockBus::new();
        let mut delay = bus.delay();
        delay.delay_us(100);
        delay.delay_ms(2);
        assert_eq!(bus.ops(), vec![BusOp::Delay(100_000), BusOp::Delay(2_000_000)]);
        assert_eq!(delay.total_us(), 2_100);
    }

    #[test]
    fn mock_delay_standalone_only_totals() {
        let mut delay = MockDelay::new();
        let observer = delay.clone();
        delay.delay_ns(500);
        delay.delay_us(1);
        assert_eq!(observer.total_ns(), 1_500);
    }

    // =========================================================================
    // MockDrive Tests
    // =========================================================================

    #[test]
    fn mock_drive_clamps_and_logs_commands() {
        let mut drive = MockDrive::new();
        drive.set_motor_power(400, -20).unwrap();
        drive.stop().unwrap();
        assert_eq!(
            drive.commands,
            vec![MotorCommand::new(300, -20), MotorCommand::STOP]
        );
    }

    #[test]
    fn mock_drive_fault_injection() {
        let mut drive = MockDrive::new();
        drive.queue_encoders(&[(1, 1), (2, 2)]);
        drive.fail_encoders_on(1);
        drive.fail_motors_from(1);

        assert_eq!(drive.get_encoders().unwrap(), EncoderSample::new(1, 1));
        assert_eq!(drive.get_encoders(), Err(DriveFault::Encoders));
        assert_eq!(drive.get_encoders().unwrap(), EncoderSample::new(2, 2));

        drive.set_motor_power(10, 10).unwrap();
        assert_eq!(drive.set_motor_power(0, 0), Err(DriveFault::Motors));
        assert_eq!(drive.commands.len(), 1);
    }

    #[test]
    fn mock_drive_buttons_hold_last_state() {
        let mut drive = MockDrive::new();
        assert_eq!(drive.get_button_state().unwrap(), ButtonState::default());
        drive.queue_buttons(&[ButtonState::from((false, false, true))]);
        assert!(drive.get_button_state().unwrap().c);
        assert!(drive.get_button_state().unwrap().c);
        drive.fail_buttons(true);
        assert_eq!(drive.get_button_state(), Err(DriveFault::Buttons));
    }

    // =========================================================================
    // MockPin Tests
    // =========================================================================

    #[test]
    fn mock_pin_shared_level() {
        let mut pin = MockPin::new();
        let observer = pin.clone();
        assert!(!observer.is_high());
        pin.set_high().unwrap();
        assert!(observer.is_high());
        pin.set_low().unwrap();
        assert!(!observer.is_high());
    }
}
