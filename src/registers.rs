//! Canonical register map for every device on the Romi bus.
//!
//! Addresses and layouts here are part of the wire contract with the
//! coprocessor firmware and the IMU; they are not internal details.
//!
//! Each coprocessor register is described by a [`Register`] that pairs its
//! offset with the transfer format used to read or write it.

/// A register offset together with its transfer layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Register {
    /// Symbolic name, for logs.
    pub name: &'static str,
    /// Offset within the device register file.
    pub address: u8,
    /// Format string understood by [`Format::parse`](crate::codec::Format::parse).
    pub format: &'static str,
    /// Encoded length in bytes.
    pub len: usize,
}

/// Registers of the 32U4 coprocessor's shared I2C buffer.
///
/// The buffer layout is the firmware's packed struct:
///
/// ```text
/// 0x00 yellow, green, red        bool x3
/// 0x03 button A, B, C            bool x3
/// 0x06 left, right motor         i16 x2
/// 0x0a battery millivolts        u16
/// 0x0c analog[6]                 u16 x6
/// 0x18 play flag, notes[14]      bool, char[14]
/// 0x27 left, right encoder       i16 x2
/// ```
pub mod romi {
    use super::Register;

    /// Default 7-bit I2C address of the coprocessor.
    pub const ADDRESS: u8 = 0x14;

    /// Maximum length of a note sequence.
    pub const NOTES_LEN: usize = 14;

    /// Indicator LEDs (yellow, green, red).
    pub const LEDS: Register = Register {
        name: "LEDS",
        address: 0x00,
        format: "???",
        len: 3,
    };

    /// User buttons (A, B, C).
    pub const BUTTONS: Register = Register {
        name: "BUTTONS",
        address: 0x03,
        format: "???",
        len: 3,
    };

    /// Motor power (left, right).
    pub const MOTORS: Register = Register {
        name: "MOTORS",
        address: 0x06,
        format: "hh",
        len: 4,
    };

    /// Battery voltage in millivolts.
    pub const BATTERY: Register = Register {
        name: "BATTERY",
        address: 0x0a,
        format: "H",
        len: 2,
    };

    /// Analog channels A0..A5.
    pub const ANALOG: Register = Register {
        name: "ANALOG",
        address: 0x0c,
        format: "6H",
        len: 12,
    };

    /// Note playback (start flag, 14-byte note string).
    pub const PLAY: Register = Register {
        name: "PLAY",
        address: 0x18,
        format: "?14s",
        len: 15,
    };

    /// Encoder counters (left, right).
    pub const ENCODERS: Register = Register {
        name: "ENCODERS",
        address: 0x27,
        format: "hh",
        len: 4,
    };

    /// Every coprocessor register, in address order.
    pub const ALL: [Register; 7] = [LEDS, BUTTONS, MOTORS, BATTERY, ANALOG, PLAY, ENCODERS];
}

/// Registers and bit fields of the LSM6DS33 inertial sensor.
pub mod lsm6 {
    // Register names follow the datasheet.
    #![allow(missing_docs)]

    use crate::register::MaskedField;

    /// 7-bit address with SA0 high (Romi default).
    pub const ADDRESS: u8 = 0x6b;
    /// 7-bit address with SA0 low.
    pub const ADDRESS_ALT: u8 = 0x6a;

    /// Expected `WHO_AM_I` response.
    pub const WHO_AM_I_ID: u8 = 0x69;

    pub const FUNC_CFG_ACCESS: u8 = 0x01;
    pub const FIFO_CTRL1: u8 = 0x06;
    pub const FIFO_CTRL2: u8 = 0x07;
    pub const FIFO_CTRL3: u8 = 0x08;
    pub const FIFO_CTRL4: u8 = 0x09;
    pub const FIFO_CTRL5: u8 = 0x0a;
    pub const ORIENT_CFG_G: u8 = 0x0b;
    pub const INT1_CTRL: u8 = 0x0d;
    pub const INT2_CTRL: u8 = 0x0e;
    pub const WHO_AM_I: u8 = 0x0f;
    pub const CTRL1_XL: u8 = 0x10;
    pub const CTRL2_G: u8 = 0x11;
    pub const CTRL3_C: u8 = 0x12;
    pub const CTRL4_C: u8 = 0x13;
    pub const CTRL5_C: u8 = 0x14;
    pub const CTRL6_C: u8 = 0x15;
    pub const CTRL7_G: u8 = 0x16;
    pub const CTRL8_XL: u8 = 0x17;
    pub const CTRL9_XL: u8 = 0x18;
    pub const CTRL10_C: u8 = 0x19;
    pub const STATUS_REG: u8 = 0x1e;
    pub const OUT_TEMP_L: u8 = 0x20;
    pub const OUTX_L_G: u8 = 0x22;
    pub const OUTX_L_XL: u8 = 0x28;
    pub const FIFO_STATUS1: u8 = 0x3a;
    pub const FIFO_DATA_OUT_L: u8 = 0x3e;
    pub const TIMESTAMP0_REG: u8 = 0x40;
    pub const STEP_COUNTER_L: u8 = 0x4b;

    /// Output data rate bits, shared layout for `CTRL1_XL` and `CTRL2_G`.
    pub const ODR_MASK: u8 = 0b1111_0000;

    /// Accelerometer output data rate.
    pub const XL_ODR: MaskedField = MaskedField::new(CTRL1_XL, ODR_MASK);
    /// Gyroscope output data rate.
    pub const G_ODR: MaskedField = MaskedField::new(CTRL2_G, ODR_MASK);
    /// Accelerometer high-performance *disable* bit (`XL_HM_MODE`).
    pub const XL_HM_MODE: MaskedField = MaskedField::new(CTRL6_C, 0b0001_0000);
    /// Gyroscope high-performance *disable* bit (`G_HM_MODE`).
    pub const G_HM_MODE: MaskedField = MaskedField::new(CTRL7_G, 0b1000_0000);
    /// FIFO output data rate; the ODR pattern sits one bit lower than in `CTRLx`.
    pub const FIFO_ODR: MaskedField = MaskedField::new(FIFO_CTRL5, ODR_MASK >> 1);
    /// Register address auto-increment on multi-byte access.
    pub const IF_INC: MaskedField = MaskedField::new(CTRL3_C, 0b0000_0100);
    /// FIFO operating mode.
    pub const FIFO_MODE: MaskedField = MaskedField::new(FIFO_CTRL5, 0b0000_0111);

    /// Raw three-axis block (`hhh`), gyro at `OUTX_L_G`, accel at `OUTX_L_XL`.
    pub const AXES_FORMAT: &str = "3h";
    /// Raw gyro + accel block (`hhhhhh` from `OUTX_L_G`).
    pub const IMU_DATA_FORMAT: &str = "6h";
    /// Size of the raw gyro + accel block.
    pub const IMU_DATA_LEN: usize = 12;
}
