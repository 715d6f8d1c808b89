//! Error types shared by the bus, codec and device layers.
//!
//! Two classes of failure exist:
//!
//! - [`Error::Bus`]: the I2C transport reported a failure (NACK, arbitration
//!   loss, timeout). Always propagated; the device register pointer is in an
//!   unknown state afterwards, so the next read must re-issue the pointer.
//! - [`Error::Format`]: a declared layout and the data handed to it disagree.
//!   This is a programming error at the call site that produced it.

use core::fmt;

/// Error produced when a transfer format and its data disagree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// Byte count does not equal the format's declared size.
    #[error("expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Size declared by the format.
        expected: usize,
        /// Size actually supplied.
        actual: usize,
    },

    /// Number of values does not equal the number of fields.
    #[error("expected {expected} values, got {actual}")]
    ValueCount {
        /// Fields declared by the format.
        expected: usize,
        /// Values actually supplied.
        actual: usize,
    },

    /// Value at `index` has the wrong type for its field.
    #[error("value {index} does not match its field type")]
    TypeMismatch {
        /// Position of the offending value.
        index: usize,
    },

    /// String value longer than its fixed-length field.
    #[error("string of {actual} bytes does not fit a {capacity}-byte field")]
    StringTooLong {
        /// Declared field length.
        capacity: usize,
        /// Supplied length.
        actual: usize,
    },

    /// A boolean byte held something other than 0 or 1.
    #[error("boolean byte {0:#04x} is not 0 or 1")]
    InvalidBool(u8),

    /// The format string could not be parsed.
    #[error("invalid format string")]
    InvalidFormat,

    /// The layout or payload exceeds the fixed transfer buffers.
    #[error("transfer exceeds {max} bytes")]
    TooLarge {
        /// Maximum supported size.
        max: usize,
    },
}

/// Error returned by every bus-backed operation.
///
/// `E` is the transport error of the underlying
/// [`embedded_hal::i2c::I2c`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum Error<E: fmt::Debug> {
    /// Transport-level failure.
    #[error("bus transaction failed: {0:?}")]
    Bus(E),

    /// Declared format and data disagree.
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl<E: fmt::Debug> Error<E> {
    /// Returns true if this is a transport failure.
    pub fn is_bus(&self) -> bool {
        matches!(self, Error::Bus(_))
    }
}
