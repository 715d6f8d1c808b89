//! Register-addressed bus transactions with the coprocessor settle discipline.
//!
//! The 32U4's TWI peripheral cannot keep up with a repeated-start
//! write-then-read: the STOP interrupt of the pointer write occasionally lands
//! after the next START, and the peripheral stays disabled until the interrupt
//! is serviced. Every transaction here is therefore split into phases with a
//! settle delay after each write:
//!
//! ```text
//! read:   [W dev reg] -- settle -- [R dev 1] [R dev 1] ... (N times)
//! write:  [W dev reg d0 d1 ...] -- settle
//! ```
//!
//! # Ownership
//!
//! [`RegisterBus`] owns the I2C peripheral and the delay source. Every
//! operation takes `&mut self`, so exactly one transaction can be in flight.
//! Sharing the bus between threads requires wrapping the owner (not single
//! calls) in a mutex; see `services::SharedDrive`.
//!
//! # Example
//!
//! ```rust
//! use romi_drive::bus::RegisterBus;
//! use romi_drive::hal::{MockBus, MockDelay};
//!
//! let mock = MockBus::new();
//! mock.set_register(0x14, 0x0a, &[0x60, 0x1d]);
//!
//! let mut bus = RegisterBus::new(mock.clone(), MockDelay::new());
//! let mut buf = [0u8; 2];
//! bus.read(0x14, 0x0a, &mut buf).unwrap();
//! assert_eq!(u16::from_le_bytes(buf), 7520);
//! ```

use core::slice;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use heapless::Vec;
use log::{debug, trace, warn};

use crate::codec::MAX_TRANSFER;
use crate::config::BusConfig;
use crate::error::{Error, FormatError};

/// Minimum settle time after each write phase, in microseconds.
pub const DEFAULT_SETTLE_US: u32 = 100;

/// Exclusive handle on a register-addressed I2C bus.
///
/// # Type Parameters
///
/// - `I2C`: the [`embedded_hal::i2c::I2c`] transport
/// - `D`: the [`embedded_hal::delay::DelayNs`] source used for settle delays
pub struct RegisterBus<I2C, D> {
    i2c: I2C,
    delay: D,
    settle_us: u32,
    retry_once: bool,
}

impl<I2C: I2c, D: DelayNs> RegisterBus<I2C, D> {
    /// Creates a bus with the default 100 µs settle delay and no retry.
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self {
            i2c,
            delay,
            settle_us: DEFAULT_SETTLE_US,
            retry_once: false,
        }
    }

    /// Creates a bus from configuration.
    ///
    /// Settle times below [`DEFAULT_SETTLE_US`] are raised to it.
    pub fn with_config(i2c: I2C, delay: D, config: &BusConfig) -> Self {
        Self {
            i2c,
            delay,
            settle_us: config.settle_us.max(DEFAULT_SETTLE_US),
            retry_once: config.retry_once,
        }
    }

    /// Settle delay currently applied after each write phase.
    #[inline]
    pub fn settle_us(&self) -> u32 {
        self.settle_us
    }

    /// Reads `buf.len()` bytes starting at `register`.
    ///
    /// Writes the register pointer, waits the settle delay, then performs one
    /// single-byte read per output byte.
    ///
    /// # Errors
    ///
    /// [`Error::Bus`] if the transport fails (after at most one retry when
    /// configured).
    pub fn read(
        &mut self,
        device: u8,
        register: u8,
        buf: &mut [u8],
    ) -> Result<(), Error<I2C::Error>> {
        debug!(
            "read dev={:#04x} reg={:#04x} len={}",
            device,
            register,
            buf.len()
        );
        self.transact(|bus| bus.read_once(device, register, buf))?;
        trace!("read dev={:#04x} reg={:#04x} -> {:02x?}", device, register, buf);
        Ok(())
    }

    /// Writes `data` starting at `register` as one block, then settles.
    ///
    /// # Errors
    ///
    /// - [`Error::Format`] if `data` exceeds [`MAX_TRANSFER`] bytes.
    /// - [`Error::Bus`] if the transport fails.
    pub fn write(&mut self, device: u8, register: u8, data: &[u8]) -> Result<(), Error<I2C::Error>> {
        let mut frame: Vec<u8, { MAX_TRANSFER + 1 }> = Vec::new();
        // Capacity is MAX_TRANSFER + 1, so the pointer byte always fits.
        let _ = frame.push(register);
        frame
            .extend_from_slice(data)
            .map_err(|_| FormatError::TooLarge { max: MAX_TRANSFER })?;

        debug!(
            "write dev={:#04x} reg={:#04x} len={}",
            device,
            register,
            data.len()
        );
        trace!("write dev={:#04x} reg={:#04x} <- {:02x?}", device, register, data);
        self.transact(|bus| {
            bus.i2c.write(device, &frame)?;
            bus.settle();
            Ok(())
        })
    }

    /// Blocks for `ms` milliseconds on the bus's delay source.
    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// Releases the transport and delay source.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn read_once(&mut self, device: u8, register: u8, buf: &mut [u8]) -> Result<(), I2C::Error> {
        self.i2c.write(device, &[register])?;
        self.settle();
        for byte in buf.iter_mut() {
            self.i2c.read(device, slice::from_mut(byte))?;
        }
        Ok(())
    }

    fn settle(&mut self) {
        self.delay.delay_us(self.settle_us);
    }

    fn transact<T>(
        &mut self,
        mut op: impl FnMut(&mut Self) -> Result<T, I2C::Error>,
    ) -> Result<T, Error<I2C::Error>> {
        match op(self) {
            Ok(v) => Ok(v),
            Err(e) if self.retry_once => {
                warn!("bus transaction failed ({:?}), retrying once", e);
                self.settle();
                op(self).map_err(Error::Bus)
            }
            Err(e) => Err(Error::Bus(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{BusOp, MockBus, MockDelay};

    const DEV: u8 = 0x14;

    #[test]
    fn read_issues_pointer_then_single_bytes() {
        let mock = MockBus::new();
        mock.set_register(DEV, 0x27, &[1, 2, 3, 4]);
        let delay = mock.delay();
        let mut bus = RegisterBus::new(mock.clone(), delay.clone());

        let mut buf = [0u8; 4];
        bus.read(DEV, 0x27, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);

        let ops = mock.ops();
        assert_eq!(ops.len(), 6);
        assert_eq!(ops[0], BusOp::Write(DEV, vec![0x27]));
        assert_eq!(ops[1], BusOp::Delay(100_000));
        for op in &ops[2..] {
            assert_eq!(*op, BusOp::Read(DEV, 1));
        }
        assert_eq!(delay.total_us(), 100);
    }

    #[test]
    fn write_is_one_block_then_settle() {
        let mock = MockBus::new();
        let mut bus = RegisterBus::new(mock.clone(), mock.delay());

        bus.write(DEV, 0x06, &[0x32, 0x00, 0x32, 0x00]).unwrap();

        assert_eq!(
            mock.ops(),
            vec![
                BusOp::Write(DEV, vec![0x06, 0x32, 0x00, 0x32, 0x00]),
                BusOp::Delay(100_000),
            ]
        );
        assert_eq!(mock.register(DEV, 0x06, 4), vec![0x32, 0x00, 0x32, 0x00]);
    }

    #[test]
    fn write_rejects_oversized_payload() {
        let mock = MockBus::new();
        let mut bus = RegisterBus::new(mock.clone(), MockDelay::new());
        let data = [0u8; MAX_TRANSFER + 1];
        assert!(matches!(
            bus.write(DEV, 0x00, &data),
            Err(Error::Format(FormatError::TooLarge { .. }))
        ));
        assert!(mock.ops().is_empty());
    }

    #[test]
    fn transport_failure_propagates_without_retry() {
        let mock = MockBus::new();
        mock.fail_next(1);
        let mut bus = RegisterBus::new(mock.clone(), MockDelay::new());

        let mut buf = [0u8; 2];
        assert!(matches!(bus.read(DEV, 0x0a, &mut buf), Err(Error::Bus(_))));
    }

    #[test]
    fn retry_once_recovers_from_single_failure() {
        let mock = MockBus::new();
        mock.set_register(DEV, 0x0a, &[0x10, 0x27]);
        mock.fail_next(1);
        let config = BusConfig::default().with_retry_once(true);
        let mut bus = RegisterBus::with_config(mock.clone(), MockDelay::new(), &config);

        let mut buf = [0u8; 2];
        bus.read(DEV, 0x0a, &mut buf).unwrap();
        assert_eq!(u16::from_le_bytes(buf), 10_000);

        // The retry re-issues the pointer write.
        let pointer_writes = mock
            .ops()
            .iter()
            .filter(|op| matches!(op, BusOp::Write(_, data) if data.len() == 1))
            .count();
        assert_eq!(pointer_writes, 2);
    }

    #[test]
    fn retry_once_gives_up_after_second_failure() {
        let mock = MockBus::new();
        mock.fail_next(2);
        let config = BusConfig::default().with_retry_once(true);
        let mut bus = RegisterBus::with_config(mock.clone(), MockDelay::new(), &config);

        assert!(matches!(bus.write(DEV, 0x06, &[0; 4]), Err(Error::Bus(_))));
        // A third attempt would have succeeded; it must not happen.
        assert_eq!(mock.register(DEV, 0x06, 4), vec![0; 4]);
    }

    #[test]
    fn settle_never_below_minimum() {
        let config = BusConfig::default().with_settle_us(10);
        let bus = RegisterBus::with_config(MockBus::new(), MockDelay::new(), &config);
        assert_eq!(bus.settle_us(), DEFAULT_SETTLE_US);

        let config = BusConfig::default().with_settle_us(250);
        let bus = RegisterBus::with_config(MockBus::new(), MockDelay::new(), &config);
        assert_eq!(bus.settle_us(), 250);
    }
}
