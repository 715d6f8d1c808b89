//! Declarative fixed-layout binary codec for device registers.
//!
//! A [`Format`] is an ordered list of typed [`Field`]s with a deterministic
//! byte size. Formats are written with the same single-letter codes the
//! coprocessor documentation uses:
//!
//! | Code | Field | Bytes |
//! |------|-------|-------|
//! | `B`  | unsigned 8-bit  | 1 |
//! | `b`  | signed 8-bit    | 1 |
//! | `H`  | unsigned 16-bit | 2 |
//! | `h`  | signed 16-bit   | 2 |
//! | `?`  | boolean flag    | 1 |
//! | `Ns` | N-byte string   | N |
//!
//! A decimal prefix repeats a numeric code (`6H` is six `H` fields) or sets the
//! length of a string (`14s` is one 14-byte field). A leading `<` is accepted
//! and ignored: every multi-byte field is little-endian.
//!
//! # Example
//!
//! ```rust
//! use romi_drive::codec::{decode, encode, Format, Value};
//!
//! let motors = Format::parse("hh").unwrap();
//! assert_eq!(motors.size(), 4);
//!
//! let bytes = encode(&motors, &[Value::I16(-300), Value::I16(300)]).unwrap();
//! assert_eq!(bytes.as_slice(), &[0xd4, 0xfe, 0x2c, 0x01]);
//!
//! let values = decode(&motors, &bytes).unwrap();
//! assert_eq!(values.as_slice(), &[Value::I16(-300), Value::I16(300)]);
//! ```

use heapless::Vec;

use crate::error::FormatError;

/// Maximum number of fields in one format.
pub const MAX_FIELDS: usize = 16;

/// Maximum size in bytes of one encoded transfer.
///
/// Matches the SMBus block-transfer limit.
pub const MAX_TRANSFER: usize = 32;

/// Encoded bytes of one transfer.
pub type Bytes = Vec<u8, MAX_TRANSFER>;

/// Decoded values of one transfer.
pub type Values = Vec<Value, MAX_FIELDS>;

/// A single typed field of a [`Format`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    /// Unsigned 8-bit integer (`B`).
    U8,
    /// Signed 8-bit integer (`b`).
    I8,
    /// Unsigned 16-bit little-endian integer (`H`).
    U16,
    /// Signed 16-bit little-endian integer (`h`).
    I16,
    /// Boolean flag stored as one byte, 0 or 1 (`?`).
    Bool,
    /// Fixed-length byte string (`Ns`).
    Bytes(usize),
}

impl Field {
    /// Encoded size of this field in bytes.
    #[inline]
    pub const fn size(&self) -> usize {
        match self {
            Field::U8 | Field::I8 | Field::Bool => 1,
            Field::U16 | Field::I16 => 2,
            Field::Bytes(n) => *n,
        }
    }

    fn from_code(code: char) -> Option<Self> {
        match code {
            'B' => Some(Field::U8),
            'b' => Some(Field::I8),
            'H' => Some(Field::U16),
            'h' => Some(Field::I16),
            '?' => Some(Field::Bool),
            _ => None,
        }
    }
}

/// An ordered, fixed-size binary layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Format {
    fields: Vec<Field, MAX_FIELDS>,
    size: usize,
}

impl Format {
    /// Parses a format string such as `"hh"`, `"6H"` or `"?14s"`.
    ///
    /// # Errors
    ///
    /// - [`FormatError::InvalidFormat`] for unknown codes, zero counts,
    ///   dangling counts or an empty layout.
    /// - [`FormatError::TooLarge`] if the layout exceeds [`MAX_FIELDS`] fields
    ///   or [`MAX_TRANSFER`] bytes.
    pub fn parse(layout: &str) -> Result<Self, FormatError> {
        let mut fields: Vec<Field, MAX_FIELDS> = Vec::new();
        let mut count: Option<usize> = None;
        let body = layout.strip_prefix('<').unwrap_or(layout);

        for c in body.chars() {
            if let Some(digit) = c.to_digit(10) {
                let n = count
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|n| n.checked_add(digit as usize))
                    .ok_or(FormatError::InvalidFormat)?;
                count = Some(n);
                continue;
            }
            if c.is_ascii_whitespace() {
                if count.is_some() {
                    return Err(FormatError::InvalidFormat);
                }
                continue;
            }

            let n = count.take().unwrap_or(1);
            if n == 0 {
                return Err(FormatError::InvalidFormat);
            }

            if c == 's' {
                push_field(&mut fields, Field::Bytes(n))?;
            } else {
                let field = Field::from_code(c).ok_or(FormatError::InvalidFormat)?;
                for _ in 0..n {
                    push_field(&mut fields, field)?;
                }
            }
        }

        if count.is_some() {
            return Err(FormatError::InvalidFormat);
        }

        Self::from_fields(&fields)
    }

    /// Builds a format from an explicit field list.
    ///
    /// # Errors
    ///
    /// [`FormatError::InvalidFormat`] for an empty list or a zero-length
    /// string, [`FormatError::TooLarge`] past the transfer limits.
    pub fn from_fields(fields: &[Field]) -> Result<Self, FormatError> {
        if fields.is_empty() || fields.contains(&Field::Bytes(0)) {
            return Err(FormatError::InvalidFormat);
        }
        let fields: Vec<Field, MAX_FIELDS> = Vec::from_slice(fields)
            .map_err(|_| FormatError::TooLarge { max: MAX_FIELDS })?;
        let size = fields
            .iter()
            .try_fold(0usize, |total, field| total.checked_add(field.size()))
            .filter(|size| *size <= MAX_TRANSFER)
            .ok_or(FormatError::TooLarge { max: MAX_TRANSFER })?;
        Ok(Self { fields, size })
    }

    /// The declared fields, in wire order.
    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Total encoded size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of fields (and therefore of values).
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false; empty formats cannot be constructed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn push_field(fields: &mut Vec<Field, MAX_FIELDS>, field: Field) -> Result<(), FormatError> {
    fields
        .push(field)
        .map_err(|_| FormatError::TooLarge { max: MAX_FIELDS })
}

/// A decoded (or to-be-encoded) field value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Unsigned 8-bit value.
    U8(u8),
    /// Signed 8-bit value.
    I8(i8),
    /// Unsigned 16-bit value.
    U16(u16),
    /// Signed 16-bit value.
    I16(i16),
    /// Boolean flag.
    Bool(bool),
    /// Byte string. Decoded strings always carry the full field width, so a
    /// shorter string only survives an encode/decode trip with its padding.
    Bytes(Vec<u8, MAX_TRANSFER>),
}

impl Value {
    /// Builds a byte-string value from ASCII/UTF-8 text.
    ///
    /// # Errors
    ///
    /// [`FormatError::TooLarge`] if the text does not fit a transfer.
    pub fn text(s: &str) -> Result<Self, FormatError> {
        Vec::from_slice(s.as_bytes())
            .map(Value::Bytes)
            .map_err(|_| FormatError::TooLarge { max: MAX_TRANSFER })
    }

    fn matches(&self, field: &Field) -> bool {
        matches!(
            (self, field),
            (Value::U8(_), Field::U8)
                | (Value::I8(_), Field::I8)
                | (Value::U16(_), Field::U16)
                | (Value::I16(_), Field::I16)
                | (Value::Bool(_), Field::Bool)
                | (Value::Bytes(_), Field::Bytes(_))
        )
    }
}

macro_rules! value_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }

            impl TryFrom<&Value> for $ty {
                type Error = ();

                fn try_from(v: &Value) -> Result<Self, ()> {
                    match v {
                        Value::$variant(x) => Ok(*x),
                        _ => Err(()),
                    }
                }
            }
        )*
    };
}

value_conversions! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    bool => Bool,
}

/// Extracts the value at `index` as `T`.
///
/// # Errors
///
/// [`FormatError::TypeMismatch`] if the value is missing or of another type.
pub fn value_at<T>(values: &[Value], index: usize) -> Result<T, FormatError>
where
    T: for<'a> TryFrom<&'a Value, Error = ()>,
{
    values
        .get(index)
        .and_then(|v| T::try_from(v).ok())
        .ok_or(FormatError::TypeMismatch { index })
}

/// Serializes `values` according to `format`.
///
/// Strings shorter than their field are zero-padded, and [`decode`] returns
/// them at full width with that padding. Round-trip equality therefore holds
/// only for strings that fill their field.
///
/// # Errors
///
/// - [`FormatError::ValueCount`] if the value count differs from the field count.
/// - [`FormatError::TypeMismatch`] if a value does not match its field.
/// - [`FormatError::StringTooLong`] if a string exceeds its field.
pub fn encode(format: &Format, values: &[Value]) -> Result<Bytes, FormatError> {
    if values.len() != format.len() {
        return Err(FormatError::ValueCount {
            expected: format.len(),
            actual: values.len(),
        });
    }

    let mut out = Bytes::new();
    for (index, (field, value)) in format.fields().iter().zip(values).enumerate() {
        if !value.matches(field) {
            return Err(FormatError::TypeMismatch { index });
        }
        match value {
            Value::U8(v) => extend(&mut out, &[*v])?,
            Value::I8(v) => extend(&mut out, &v.to_le_bytes())?,
            Value::U16(v) => extend(&mut out, &v.to_le_bytes())?,
            Value::I16(v) => extend(&mut out, &v.to_le_bytes())?,
            Value::Bool(v) => extend(&mut out, &[u8::from(*v)])?,
            Value::Bytes(s) => {
                let capacity = field.size();
                if s.len() > capacity {
                    return Err(FormatError::StringTooLong {
                        capacity,
                        actual: s.len(),
                    });
                }
                extend(&mut out, s)?;
                for _ in s.len()..capacity {
                    extend(&mut out, &[0])?;
                }
            }
        }
    }
    Ok(out)
}

fn extend(out: &mut Bytes, bytes: &[u8]) -> Result<(), FormatError> {
    out.extend_from_slice(bytes)
        .map_err(|_| FormatError::TooLarge { max: MAX_TRANSFER })
}

/// Deserializes `bytes` according to `format`.
///
/// # Errors
///
/// - [`FormatError::LengthMismatch`] unless `bytes.len() == format.size()`.
/// - [`FormatError::InvalidBool`] if a boolean byte is neither 0 nor 1.
pub fn decode(format: &Format, bytes: &[u8]) -> Result<Values, FormatError> {
    if bytes.len() != format.size() {
        return Err(FormatError::LengthMismatch {
            expected: format.size(),
            actual: bytes.len(),
        });
    }

    let mut values = Values::new();
    let mut rest = bytes;
    for field in format.fields() {
        let (chunk, tail) = rest.split_at(field.size());
        rest = tail;
        let value = match field {
            Field::U8 => Value::U8(chunk[0]),
            Field::I8 => Value::I8(i8::from_le_bytes([chunk[0]])),
            Field::U16 => Value::U16(u16::from_le_bytes([chunk[0], chunk[1]])),
            Field::I16 => Value::I16(i16::from_le_bytes([chunk[0], chunk[1]])),
            Field::Bool => match chunk[0] {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                other => return Err(FormatError::InvalidBool(other)),
            },
            Field::Bytes(_) => Value::Bytes(
                Vec::from_slice(chunk).map_err(|_| FormatError::TooLarge { max: MAX_TRANSFER })?,
            ),
        };
        values
            .push(value)
            .map_err(|_| FormatError::TooLarge { max: MAX_FIELDS })?;
    }
    Ok(values)
}
