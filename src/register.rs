//! Typed and masked register access over a [`RegisterBus`].
//!
//! These are free functions taking the bus, the device address and the
//! register explicitly. Nothing binds a device address implicitly.
//!
//! # Masked fields
//!
//! Sub-byte configuration fields share a register with unrelated bits.
//! [`write_masked`] always performs a fresh read and preserves every bit
//! outside the mask:
//!
//! ```text
//! new = (current & !mask) | (value & mask)
//! ```
//!
//! The read-modify-write is not atomic: a second writer to the same register
//! between the read and the write would be lost. Devices are single-owner.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::debug;

use crate::bus::RegisterBus;
use crate::codec::{self, Format, Values, MAX_TRANSFER};
use crate::error::{Error, FormatError};
use crate::registers::Register;

/// A bit field inside a single 8-bit register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaskedField {
    /// Register offset.
    pub register: u8,
    /// Bits belonging to the field.
    pub mask: u8,
}

impl MaskedField {
    /// Creates a field descriptor.
    pub const fn new(register: u8, mask: u8) -> Self {
        Self { register, mask }
    }

    /// Reads this field from `device`.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::Bus`].
    pub fn read<I2C: I2c, D: DelayNs>(
        &self,
        bus: &mut RegisterBus<I2C, D>,
        device: u8,
    ) -> Result<u8, Error<I2C::Error>> {
        read_masked(bus, device, self.register, self.mask)
    }

    /// Writes this field on `device`, preserving all other bits.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::Bus`].
    pub fn write<I2C: I2c, D: DelayNs>(
        &self,
        bus: &mut RegisterBus<I2C, D>,
        device: u8,
        value: u8,
    ) -> Result<(), Error<I2C::Error>> {
        write_masked(bus, device, self.register, self.mask, value)
    }
}

/// Reads `format.size()` bytes at `register` and decodes them.
///
/// # Errors
///
/// [`Error::Bus`] on transport failure, [`Error::Format`] if decoding fails.
pub fn read_unpack<I2C: I2c, D: DelayNs>(
    bus: &mut RegisterBus<I2C, D>,
    device: u8,
    register: u8,
    format: &Format,
) -> Result<Values, Error<I2C::Error>> {
    let mut buf = [0u8; MAX_TRANSFER];
    let raw = buf
        .get_mut(..format.size())
        .ok_or(FormatError::TooLarge { max: MAX_TRANSFER })?;
    bus.read(device, register, raw)?;
    Ok(codec::decode(format, raw)?)
}

/// Encodes `values` and writes them at `register`.
///
/// # Errors
///
/// [`Error::Format`] if encoding fails (nothing is sent), [`Error::Bus`] on
/// transport failure.
pub fn write_pack<I2C: I2c, D: DelayNs>(
    bus: &mut RegisterBus<I2C, D>,
    device: u8,
    register: u8,
    format: &Format,
    values: &[codec::Value],
) -> Result<(), Error<I2C::Error>> {
    let bytes = codec::encode(format, values)?;
    bus.write(device, register, &bytes)
}

/// Reads a mapped register using its declared format.
///
/// # Errors
///
/// As [`read_unpack`], plus [`Error::Format`] if the map entry's format is invalid.
pub fn read_register<I2C: I2c, D: DelayNs>(
    bus: &mut RegisterBus<I2C, D>,
    device: u8,
    register: &Register,
) -> Result<Values, Error<I2C::Error>> {
    let format = Format::parse(register.format)?;
    debug!("read {} @ {:#04x}", register.name, register.address);
    read_unpack(bus, device, register.address, &format)
}

/// Writes a mapped register using its declared format.
///
/// # Errors
///
/// As [`write_pack`].
pub fn write_register<I2C: I2c, D: DelayNs>(
    bus: &mut RegisterBus<I2C, D>,
    device: u8,
    register: &Register,
    values: &[codec::Value],
) -> Result<(), Error<I2C::Error>> {
    let format = Format::parse(register.format)?;
    debug!("write {} @ {:#04x}", register.name, register.address);
    write_pack(bus, device, register.address, &format, values)
}

/// Reads one byte at `register` and returns `byte & mask`.
///
/// # Errors
///
/// Propagates [`Error::Bus`].
pub fn read_masked<I2C: I2c, D: DelayNs>(
    bus: &mut RegisterBus<I2C, D>,
    device: u8,
    register: u8,
    mask: u8,
) -> Result<u8, Error<I2C::Error>> {
    let mut byte = [0u8];
    bus.read(device, register, &mut byte)?;
    Ok(byte[0] & mask)
}

/// Replaces the bits of `register` selected by `mask` with those of `value`.
///
/// Bits of `value` outside `mask` are ignored. A mask of `0x00` rewrites the
/// register unchanged; `0xff` overwrites it entirely.
///
/// # Errors
///
/// Propagates [`Error::Bus`] from either the read or the write.
pub fn write_masked<I2C: I2c, D: DelayNs>(
    bus: &mut RegisterBus<I2C, D>,
    device: u8,
    register: u8,
    mask: u8,
    value: u8,
) -> Result<(), Error<I2C::Error>> {
    let mut current = [0u8];
    bus.read(device, register, &mut current)?;
    let updated = merge_masked(current[0], mask, value);
    debug!(
        "masked write dev={:#04x} reg={:#04x} mask={:#010b}: {:#010b} -> {:#010b}",
        device, register, mask, current[0], updated
    );
    bus.write(device, register, &[updated])
}

/// `(current & !mask) | (value & mask)`.
#[inline]
pub const fn merge_masked(current: u8, mask: u8, value: u8) -> u8 {
    (current & !mask) | (value & mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Value;
    use crate::hal::{BusOp, MockBus, MockDelay};
    use crate::registers::romi;

    const DEV: u8 = 0x6b;

    fn bus(mock: &MockBus) -> RegisterBus<MockBus, MockDelay> {
        RegisterBus::new(mock.clone(), mock.delay())
    }

    #[test]
    fn merge_masked_examples() {
        assert_eq!(merge_masked(0b1010_1010, 0b1111_0000, 0b0101_1111), 0b0101_1010);
        assert_eq!(merge_masked(0xab, 0x00, 0xff), 0xab);
        assert_eq!(merge_masked(0xab, 0xff, 0x12), 0x12);
    }

    #[test]
    fn read_masked_applies_mask() {
        let mock = MockBus::new();
        mock.set_register(DEV, 0x10, &[0b0110_0101]);
        let mut bus = bus(&mock);
        assert_eq!(read_masked(&mut bus, DEV, 0x10, 0xf0).unwrap(), 0b0110_0000);
    }

    #[test]
    fn write_masked_reads_fresh_then_writes_once() {
        let mock = MockBus::new();
        mock.set_register(DEV, 0x15, &[0b0000_0011]);
        let mut bus = bus(&mock);

        write_masked(&mut bus, DEV, 0x15, 0b0001_0000, 0xff).unwrap();

        assert_eq!(mock.register(DEV, 0x15, 1), vec![0b0001_0011]);
        let ops = mock.ops();
        assert_eq!(ops[0], BusOp::Write(DEV, vec![0x15]));
        assert_eq!(ops[2], BusOp::Read(DEV, 1));
        assert_eq!(ops[3], BusOp::Write(DEV, vec![0x15, 0b0001_0011]));
    }

    #[test]
    fn write_masked_zero_mask_is_noop() {
        let mock = MockBus::new();
        mock.set_register(DEV, 0x11, &[0x5a]);
        let mut bus = bus(&mock);
        write_masked(&mut bus, DEV, 0x11, 0x00, 0xff).unwrap();
        assert_eq!(mock.register(DEV, 0x11, 1), vec![0x5a]);
    }

    #[test]
    fn write_masked_sees_external_changes() {
        // A stale cached value must never be used as the base.
        let mock = MockBus::new();
        mock.set_register(DEV, 0x16, &[0x00]);
        let mut bus = bus(&mock);
        write_masked(&mut bus, DEV, 0x16, 0x80, 0x80).unwrap();

        mock.set_register(DEV, 0x16, &[0x81]);
        write_masked(&mut bus, DEV, 0x16, 0x80, 0x00).unwrap();
        assert_eq!(mock.register(DEV, 0x16, 1), vec![0x01]);
    }

    #[test]
    fn masked_field_roundtrip() {
        let mock = MockBus::new();
        mock.set_register(DEV, 0x0a, &[0b0000_0110]);
        let mut bus = bus(&mock);
        let field = MaskedField::new(0x0a, 0b0111_1000);

        field.write(&mut bus, DEV, 0b0010_0000).unwrap();
        assert_eq!(field.read(&mut bus, DEV).unwrap(), 0b0010_0000);
        assert_eq!(mock.register(DEV, 0x0a, 1), vec![0b0010_0110]);
    }

    #[test]
    fn read_register_uses_map_format() {
        let mock = MockBus::new();
        mock.set_register(0x14, romi::ENCODERS.address, &[0x0a, 0x00, 0xf6, 0xff]);
        let mut bus = bus(&mock);
        let values = read_register(&mut bus, 0x14, &romi::ENCODERS).unwrap();
        assert_eq!(values.as_slice(), &[Value::I16(10), Value::I16(-10)]);
    }

    #[test]
    fn write_pack_rejects_before_touching_bus() {
        let mock = MockBus::new();
        let mut bus = bus(&mock);
        let fmt = Format::parse("hh").unwrap();
        let err = write_pack(&mut bus, 0x14, 0x06, &fmt, &[Value::I16(1)]).unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::ValueCount { .. })));
        assert!(mock.ops().is_empty());
    }

    #[test]
    fn read_unpack_propagates_bus_error() {
        let mock = MockBus::new();
        mock.fail_next(1);
        let mut bus = bus(&mock);
        let fmt = Format::parse("H").unwrap();
        assert!(read_unpack(&mut bus, 0x14, 0x0a, &fmt).unwrap_err().is_bus());
    }
}
