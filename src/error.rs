//! Our error types for the LNBoard drivers.

use thiserror::Error;

pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Custom error type for LNBoard communications.
///
/// `E` is the error of the underlying transport: the I2C bus for the chip drivers, the serial
/// link for the gateway and the instrument.
#[derive(Error, Debug)]
pub enum Error<E> {
    #[error("Bus transport error")]
    Transport(E),
    #[error(transparent)]
    InvalidArgument(#[from] ArgumentError),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("No acknowledge received")]
    Nack,
    #[error("Invalid response received")]
    InvalidResponse,
    #[error("Buffer too small")]
    BufferError,
    #[error("Communication timeout")]
    Timeout,
}

/// A value outside of what a device can represent.
///
/// Kept separate from [`Error`] so the pure code conversions don't need to know the bus type.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ArgumentError {
    #[error("Resistance {resistance} Ohm is out of range (0, {max}] Ohm")]
    ResistanceOutOfRange { resistance: f64, max: f64 },
    #[error("Code {code} is out of range [0, {limit})")]
    CodeOutOfRange { code: i64, limit: u32 },
    #[error("Voltage {voltage} V is out of range [0, {fullscale}) V")]
    VoltageOutOfRange { voltage: f64, fullscale: f64 },
    #[error("GPIO bit {bit} is out of range, valid bits are 0..{width}")]
    InvalidPin { bit: u8, width: u8 },
    #[error("External DAC reference voltage has not been configured")]
    ReferenceNotConfigured,
    #[error("Invalid sweep: {0}")]
    InvalidSweep(&'static str),
}

impl<E: embedded_io::Error> embedded_hal::i2c::Error for Error<E> {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
        match self {
            Error::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            _ => ErrorKind::Other,
        }
    }
}
