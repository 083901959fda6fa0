//! Driver for the MCP466x family of 7/8-bit dual I2C digital potentiometers / rheostats.
//!
//! Each command starts with a command byte holding the 4-bit memory address, the 2-bit command
//! and the two MSBs of the 10-bit data word.

use embedded_hal::i2c::I2c;
use modular_bitfield::prelude::*;
use strum_macros::EnumIter;

use crate::{
    error::{ArgumentError, Error, Result},
    range::{ResistiveRange, TYPICAL_WIPER_RESISTANCE},
};

/// Fixed part of the 7-bit address, the two LSBs come from the A1/A0 pins.
const ADDRESS_BASE: u8 = 0b0101100;

/// Memory map of the device.
#[derive(Debug, Copy, Clone, PartialEq, EnumIter)]
#[repr(u8)]
pub enum Register {
    /// __R/W__ - Volatile wiper 0.
    VolatileWiper0 = 0x00,
    /// __R/W__ - Volatile wiper 1.
    VolatileWiper1 = 0x01,
    /// __R/W__ - Non-volatile wiper 0, loaded into the volatile wiper at power-on.
    NonVolatileWiper0 = 0x02,
    /// __R/W__ - Non-volatile wiper 1.
    NonVolatileWiper1 = 0x03,
    /// __R/W__ - Terminal control.
    Tcon = 0x04,
    /// __R__ - Status.
    Status = 0x05,
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[repr(u8)]
enum Command {
    Write = 0b00,
    Increment = 0b01,
    Decrement = 0b10,
    Read = 0b11,
}

#[bitfield]
#[derive(Debug, Clone, Copy)]
struct CommandByte {
    data_high: B2,
    command: B2,
    address: B4,
}

impl CommandByte {
    fn build(register: Register, command: Command, data: u16) -> u8 {
        let [byte] = CommandByte::new()
            .with_data_high(((data >> 8) & 0b11) as u8)
            .with_command(command as u8)
            .with_address(register as u8)
            .into_bytes();
        byte
    }
}

/// One of the two potentiometers in the package.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
pub enum Wiper {
    Zero,
    One,
}

impl Wiper {
    fn register(self) -> Register {
        match self {
            Wiper::Zero => Register::VolatileWiper0,
            Wiper::One => Register::VolatileWiper1,
        }
    }
}

/// Available end-to-end resistance options (R_AB).
#[derive(Debug, Copy, Clone, PartialEq, EnumIter)]
pub enum FullScale {
    R5k,
    R10k,
    R50k,
    R100k,
}

impl FullScale {
    pub const fn ohms(self) -> f64 {
        match self {
            FullScale::R5k => 5e3,
            FullScale::R10k => 10e3,
            FullScale::R50k => 50e3,
            FullScale::R100k => 100e3,
        }
    }
}

/// 7-bit (MCP463x/MCP464x) or 8-bit (MCP465x/MCP466x) parts.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Resolution {
    Bits7 = 7,
    Bits8 = 8,
}

/// MCP466x digital rheostat driver.
#[derive(Debug)]
pub struct Mcp466x<I2C> {
    i2c: I2C,
    address: u8,
    range: ResistiveRange,
}

impl<I2C: I2c> Mcp466x<I2C> {
    /// Create a new driver. `addr1` and `addr0` are the levels of the A1/A0 address pins.
    pub fn new(
        i2c: I2C,
        addr1: bool,
        addr0: bool,
        fullscale: FullScale,
        resolution: Resolution,
    ) -> Self {
        let address = ADDRESS_BASE | ((addr1 as u8) << 1) | addr0 as u8;
        log::info!(
            "MCP466x rheostat at {address:#04x}, {} Ohm, {} bit",
            fullscale.ohms(),
            resolution as u8
        );
        Self {
            i2c,
            address,
            range: ResistiveRange::new(
                fullscale.ohms(),
                resolution as u8,
                TYPICAL_WIPER_RESISTANCE,
            ),
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn range(&self) -> &ResistiveRange {
        &self.range
    }

    /// Write the intended code to the volatile wiper register.
    pub fn set_wiper(&mut self, wiper: Wiper, code: u16) -> Result<(), I2C::Error> {
        if code as u32 >= self.range.code_limit() {
            return Err(Error::InvalidArgument(ArgumentError::CodeOutOfRange {
                code: code as i64,
                limit: self.range.code_limit(),
            }));
        }
        let bytes = [
            CommandByte::build(wiper.register(), Command::Write, code),
            (code & 0xff) as u8,
        ];
        log::trace!("MCP466x {:#04x} write {:02x?}", self.address, bytes);
        self.i2c
            .write(self.address, &bytes)
            .map_err(Error::Transport)
    }

    /// Read the volatile wiper register.
    pub fn get_wiper(&mut self, wiper: Wiper) -> Result<u16, I2C::Error> {
        self.read_register(wiper.register())
    }

    /// Read any register of the memory map. Registers are 9 bits wide.
    pub fn read_register(&mut self, register: Register) -> Result<u16, I2C::Error> {
        let mut buff = [0u8; 2];
        self.i2c
            .write_read(
                self.address,
                &[CommandByte::build(register, Command::Read, 0)],
                &mut buff,
            )
            .map_err(Error::Transport)?;
        let value = u16::from_be_bytes(buff) & 0x01ff;
        log::trace!("MCP466x {:#04x} {register:?} = {value:#05x}", self.address);
        Ok(value)
    }

    /// Set the wiper to the code nearest to `resistance`.
    pub fn set_res(&mut self, wiper: Wiper, resistance: f64) -> Result<(), I2C::Error> {
        let code = self.range.res2code(resistance)?;
        self.set_wiper(wiper, code)
    }

    /// Get the actual resistance at the wiper.
    pub fn get_res(&mut self, wiper: Wiper) -> Result<f64, I2C::Error> {
        let code = self.get_wiper(wiper)?;
        Ok(self.range.code2res(code)?)
    }

    /// Increment the wiper by one step.
    ///
    /// Only works on the volatile wipers; the device stops at full scale.
    pub fn inc_wiper(&mut self, wiper: Wiper) -> Result<(), I2C::Error> {
        self.send_command(wiper, Command::Increment)
    }

    /// Decrement the wiper by one step. See [`Self::inc_wiper`].
    pub fn dec_wiper(&mut self, wiper: Wiper) -> Result<(), I2C::Error> {
        self.send_command(wiper, Command::Decrement)
    }

    fn send_command(&mut self, wiper: Wiper, command: Command) -> Result<(), I2C::Error> {
        let byte = CommandByte::build(wiper.register(), command, 0);
        self.i2c
            .write(self.address, &[byte])
            .map_err(Error::Transport)
    }

    /// Destroy the driver, returning the I2C bus.
    pub fn destroy(self) -> I2C {
        self.i2c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock, Transaction};
    use strum::IntoEnumIterator;

    fn rheostat(expectations: &[Transaction]) -> Mcp466x<Mock> {
        Mcp466x::new(
            Mock::new(expectations),
            false,
            true,
            FullScale::R5k,
            Resolution::Bits8,
        )
    }

    #[test]
    fn command_byte_layout() {
        assert_eq!(
            CommandByte::build(Register::VolatileWiper1, Command::Write, 0x100),
            0x11
        );
        assert_eq!(
            CommandByte::build(Register::VolatileWiper0, Command::Read, 0),
            0x0c
        );
        assert_eq!(
            CommandByte::build(Register::Status, Command::Read, 0),
            0x5c
        );
        for register in Register::iter() {
            let byte = CommandByte::build(register, Command::Increment, 0);
            assert_eq!(byte >> 4, register as u8);
            assert_eq!(byte & 0x0f, 0b0100);
        }
    }

    #[test]
    fn address_from_pins() {
        let dev = rheostat(&[]);
        assert_eq!(dev.address(), 0x2d);
        dev.destroy().done();
        let dev = Mcp466x::new(
            Mock::new(&[]),
            true,
            true,
            FullScale::R100k,
            Resolution::Bits8,
        );
        assert_eq!(dev.address(), 0x2f);
        assert_eq!(dev.range().fullscale(), 100e3);
        dev.destroy().done();
    }

    #[test]
    fn set_wiper_writes_two_bytes() {
        let mut dev = rheostat(&[
            Transaction::write(0x2d, vec![0x00, 0x80]),
            Transaction::write(0x2d, vec![0x10, 0xff]),
        ]);
        dev.set_wiper(Wiper::Zero, 0x80).unwrap();
        dev.set_wiper(Wiper::One, 0xff).unwrap();
        dev.destroy().done();
    }

    #[test]
    fn set_wiper_rejects_codes_outside_bit_width() {
        let mut dev = rheostat(&[]);
        assert!(matches!(
            dev.set_wiper(Wiper::Zero, 256),
            Err(Error::InvalidArgument(ArgumentError::CodeOutOfRange {
                code: 256,
                limit: 256
            }))
        ));
        dev.destroy().done();
    }

    #[test]
    fn get_wiper_reads_nine_bits() {
        let mut dev = rheostat(&[
            Transaction::write_read(0x2d, vec![0x1c], vec![0xfe, 0x06]),
        ]);
        // Upper bits are ignored.
        assert_eq!(dev.get_wiper(Wiper::One).unwrap(), 0x006);
        dev.destroy().done();
    }

    #[test]
    fn set_res_rounds_to_nearest_code() {
        // (200 - 75) / 19.53125 = 6.4 -> 6
        let mut dev = rheostat(&[
            Transaction::write(0x2d, vec![0x00, 0x06]),
            Transaction::write_read(0x2d, vec![0x0c], vec![0x00, 0x06]),
        ]);
        dev.set_res(Wiper::Zero, 200.0).unwrap();
        let res = dev.get_res(Wiper::Zero).unwrap();
        assert_eq!(res, 6.0 * 19.53125 + 75.0);
        dev.destroy().done();
    }

    #[test]
    fn set_res_out_of_range_does_not_touch_the_bus() {
        let mut dev = rheostat(&[]);
        assert!(matches!(
            dev.set_res(Wiper::Zero, 0.0),
            Err(Error::InvalidArgument(
                ArgumentError::ResistanceOutOfRange { .. }
            ))
        ));
        dev.destroy().done();
    }

    #[test]
    fn increment_and_decrement() {
        let mut dev = rheostat(&[
            Transaction::write(0x2d, vec![0x04]),
            Transaction::write(0x2d, vec![0x18]),
        ]);
        dev.inc_wiper(Wiper::Zero).unwrap();
        dev.dec_wiper(Wiper::One).unwrap();
        dev.destroy().done();
    }

    #[test]
    fn full_scale_options() {
        let expected = [5e3, 10e3, 50e3, 100e3];
        for (option, ohms) in FullScale::iter().zip(expected) {
            assert_eq!(option.ohms(), ohms);
        }
    }
}
