//! This crate provides drivers for the LNBoard, a low-noise characterization board controlled
//! from a PC over I2C.
//!
//! The board carries:
//! * two MAX5815 4-channel 12-bit DACs, one for the voltage outputs and one as reference of the
//!   current outputs
//! * four MCP466x 8-bit rheostats (5 kOhm and 100 kOhm) for two current sources and two sinks
//! * an MCP466x 50 kOhm rheostat setting the two LDO outputs
//! * an MCP23008 GPIO expander driving the range select pins
//! * a PCA9542A multiplexer splitting the I2C bus in two
//!
//! Chip drivers are generic over [`embedded_hal::i2c::I2c`]. The [`buspirate`] module provides
//! such a bus over a Bus Pirate's serial port, and [`smu`] drives the source-measure unit used
//! to characterize the board.
//!
//! A current output is `Vref / R`. Each current output picks between its 5 kOhm and 100 kOhm
//! rheostat, whichever puts the wiper closer to mid-scale, see [`current_source`].

pub mod board;
pub mod bus;
pub mod buspirate;
pub mod channel;
pub mod current_source;
pub mod error;
pub mod ldo;
pub mod max5815;
pub mod mcp23008;
pub mod mcp466x;
pub mod pca9542a;
pub mod range;
pub mod smu;

#[cfg(test)]
mod fakes;
#[cfg(test)]
mod mock_serial;
