//! Driver for the MCP23008 8-bit I2C GPIO expander.

use embedded_hal::i2c::I2c;
use strum_macros::EnumIter;

use crate::error::{ArgumentError, Error, Result};

const ADDRESS_BASE: u8 = 0b0100 << 3;

/// Number of GPIO lines on the device.
pub const WIDTH: u8 = 8;

#[derive(Debug, Copy, Clone, PartialEq, EnumIter)]
#[repr(u8)]
pub enum Register {
    /// __R/W__ - I/O direction. `1` = input, `0` = output.
    IoDir = 0x00,
    /// __R/W__ - Input polarity.
    IPol = 0x01,
    /// __R/W__ - Interrupt on change enable.
    GpInten = 0x02,
    /// __R/W__ - Default compare value for interrupt on change.
    DefVal = 0x03,
    /// __R/W__ - Interrupt control.
    IntCon = 0x04,
    /// __R/W__ - Configuration.
    IoCon = 0x05,
    /// __R/W__ - Pull-up resistor enable.
    GpPu = 0x06,
    /// __R__ - Interrupt flags.
    IntF = 0x07,
    /// __R__ - Port value at the time of the interrupt.
    IntCap = 0x08,
    /// __R/W__ - Port value. Writing updates the output latch.
    Gpio = 0x09,
    /// __R/W__ - Output latch.
    OLat = 0x0A,
}

/// MCP23008 GPIO expander driver.
#[derive(Debug)]
pub struct Mcp23008<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Mcp23008<I2C> {
    /// Create a new driver. `a2`, `a1` and `a0` are the levels of the address pins.
    pub fn new(i2c: I2C, a2: bool, a1: bool, a0: bool) -> Self {
        let address = ADDRESS_BASE | ((a2 as u8) << 2) | ((a1 as u8) << 1) | a0 as u8;
        log::info!("MCP23008 GPIO expander at {address:#04x}");
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn read_register(&mut self, register: Register) -> Result<u8, I2C::Error> {
        let mut buff = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register as u8], &mut buff)
            .map_err(Error::Transport)?;
        log::trace!("MCP23008 {:#04x} {register:?} = {:#04x}", self.address, buff[0]);
        Ok(buff[0])
    }

    pub fn write_register(&mut self, register: Register, value: u8) -> Result<(), I2C::Error> {
        log::trace!("MCP23008 {:#04x} {register:?} <- {value:#04x}", self.address);
        self.i2c
            .write(self.address, &[register as u8, value])
            .map_err(Error::Transport)
    }

    /// Set the direction of all pins. A set bit makes the pin an input.
    pub fn set_direction(&mut self, inputs: u8) -> Result<(), I2C::Error> {
        self.write_register(Register::IoDir, inputs)
    }

    pub fn get_direction(&mut self) -> Result<u8, I2C::Error> {
        self.read_register(Register::IoDir)
    }

    /// Read the level of all pins.
    pub fn get_gpio(&mut self) -> Result<u8, I2C::Error> {
        self.read_register(Register::Gpio)
    }

    /// Drive all output pins.
    pub fn set_gpio(&mut self, value: u8) -> Result<(), I2C::Error> {
        self.write_register(Register::Gpio, value)
    }

    pub fn get_gpio_bit(&mut self, bit: u8) -> Result<bool, I2C::Error> {
        check_bit(bit)?;
        Ok(self.get_gpio()? & (1 << bit) != 0)
    }

    /// Drive a single output pin, leaving the others untouched.
    ///
    /// The output latch is read back rather than the port, so pins configured as inputs
    /// don't leak their level into the outputs.
    pub fn set_gpio_bit(&mut self, bit: u8, value: bool) -> Result<(), I2C::Error> {
        check_bit(bit)?;
        let latch = self.read_register(Register::OLat)?;
        let latch = if value {
            latch | (1 << bit)
        } else {
            latch & !(1 << bit)
        };
        self.set_gpio(latch)
    }

    /// Destroy the driver, returning the I2C bus.
    pub fn destroy(self) -> I2C {
        self.i2c
    }
}

fn check_bit(bit: u8) -> core::result::Result<(), ArgumentError> {
    if bit >= WIDTH {
        return Err(ArgumentError::InvalidPin { bit, width: WIDTH });
    }
    Ok(())
}
