//! Romi 32U4 coprocessor facade.
//!
//! [`Romi32U4`] owns the [`RegisterBus`] and turns the coprocessor's shared
//! register buffer into semantic operations. Nothing is cached: every call is
//! one fresh bus transaction, so a value read here is never older than the
//! call that returned it.
//!
//! # Example
//!
//! ```rust
//! use romi_drive::bus::RegisterBus;
//! use romi_drive::device::Romi32U4;
//! use romi_drive::hal::MockBus;
//! use romi_drive::traits::{DriveBase, EncoderSample};
//!
//! let mock = MockBus::new();
//! mock.set_register(0x14, 0x27, &[0x0a, 0x00, 0xf6, 0xff]);
//!
//! let mut romi = Romi32U4::new(RegisterBus::new(mock.clone(), mock.delay()));
//! assert_eq!(romi.get_encoders().unwrap(), EncoderSample::new(10, -10));
//!
//! romi.set_motor_power(120, -500).unwrap();
//! assert_eq!(mock.register(0x14, 0x06, 4), vec![120, 0, 0xd4, 0xfe]);
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info};

use crate::bus::RegisterBus;
use crate::codec::{value_at, Value};
use crate::error::{Error, FormatError};
use crate::register::{read_register, write_register};
use crate::registers::romi;
use crate::traits::{ButtonState, DriveBase, EncoderSample, LedState, MotorCommand};

/// Number of analog channels exposed by the coprocessor.
pub const ANALOG_CHANNELS: usize = 6;

/// The Romi 32U4 control board.
pub struct Romi32U4<I2C, D> {
    bus: RegisterBus<I2C, D>,
    address: u8,
}

impl<I2C: I2c, D: DelayNs> Romi32U4<I2C, D> {
    /// Creates a facade at the default address `0x14`.
    pub fn new(bus: RegisterBus<I2C, D>) -> Self {
        Self::with_address(bus, romi::ADDRESS)
    }

    /// Creates a facade at a non-default address.
    pub fn with_address(bus: RegisterBus<I2C, D>, address: u8) -> Self {
        Self { bus, address }
    }

    /// Coprocessor address.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// The underlying bus, for other devices sharing it.
    pub fn bus_mut(&mut self) -> &mut RegisterBus<I2C, D> {
        &mut self.bus
    }

    /// Releases the bus.
    pub fn release(self) -> RegisterBus<I2C, D> {
        self.bus
    }

    /// Sets the three indicator LEDs.
    pub fn set_leds(&mut self, leds: LedState) -> Result<(), Error<I2C::Error>> {
        debug!("leds {:?}", leds);
        write_register(
            &mut self.bus,
            self.address,
            &romi::LEDS,
            &[leds.yellow.into(), leds.green.into(), leds.red.into()],
        )
    }

    /// Commands motor power, clamped to `±MOTOR_LIMIT`.
    pub fn set_motor_power(&mut self, left: i16, right: i16) -> Result<(), Error<I2C::Error>> {
        let cmd = MotorCommand::new(left, right);
        if (cmd.left, cmd.right) != (left, right) {
            debug!("motor power ({}, {}) clamped to ({}, {})", left, right, cmd.left, cmd.right);
        }
        write_register(
            &mut self.bus,
            self.address,
            &romi::MOTORS,
            &[cmd.left.into(), cmd.right.into()],
        )
    }

    /// Starts playing a note sequence (Pololu `PLAY` syntax, e.g. `"l16ceg>c"`).
    ///
    /// # Errors
    ///
    /// [`FormatError::StringTooLong`] for more than 14 bytes and
    /// [`FormatError::InvalidFormat`] for non-ASCII text; nothing is sent in
    /// either case.
    pub fn play_notes(&mut self, notes: &str) -> Result<(), Error<I2C::Error>> {
        if !notes.is_ascii() {
            return Err(FormatError::InvalidFormat.into());
        }
        if notes.len() > romi::NOTES_LEN {
            return Err(FormatError::StringTooLong {
                capacity: romi::NOTES_LEN,
                actual: notes.len(),
            }
            .into());
        }
        info!("play {:?}", notes);
        write_register(
            &mut self.bus,
            self.address,
            &romi::PLAY,
            &[Value::Bool(true), Value::text(notes)?],
        )
    }

    /// Reads the three user buttons.
    pub fn get_button_state(&mut self) -> Result<ButtonState, Error<I2C::Error>> {
        let v = read_register(&mut self.bus, self.address, &romi::BUTTONS)?;
        Ok(ButtonState {
            a: value_at(&v, 0)?,
            b: value_at(&v, 1)?,
            c: value_at(&v, 2)?,
        })
    }

    /// Reads the battery voltage in millivolts.
    pub fn get_battery_mv(&mut self) -> Result<u16, Error<I2C::Error>> {
        let v = read_register(&mut self.bus, self.address, &romi::BATTERY)?;
        Ok(value_at(&v, 0)?)
    }

    /// Reads analog channels A0 through A5.
    pub fn get_analog(&mut self) -> Result<[u16; ANALOG_CHANNELS], Error<I2C::Error>> {
        let v = read_register(&mut self.bus, self.address, &romi::ANALOG)?;
        let mut out = [0u16; ANALOG_CHANNELS];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = value_at(&v, i)?;
        }
        Ok(out)
    }

    /// Reads both encoder counters.
    pub fn get_encoders(&mut self) -> Result<EncoderSample, Error<I2C::Error>> {
        let v = read_register(&mut self.bus, self.address, &romi::ENCODERS)?;
        Ok(EncoderSample::new(value_at(&v, 0)?, value_at(&v, 1)?))
    }
}

impl<I2C: I2c, D: DelayNs> DriveBase for Romi32U4<I2C, D> {
    type Error = Error<I2C::Error>;

    fn set_motor_power(&mut self, left: i16, right: i16) -> Result<(), Self::Error> {
        Romi32U4::set_motor_power(self, left, right)
    }

    fn get_button_state(&mut self) -> Result<ButtonState, Self::Error> {
        Romi32U4::get_button_state(self)
    }

    fn get_encoders(&mut self) -> Result<EncoderSample, Self::Error> {
        Romi32U4::get_encoders(self)
    }

    fn get_battery_mv(&mut self) -> Result<u16, Self::Error> {
        Romi32U4::get_battery_mv(self)
    }
}
