//! Single-channel views of the multi-channel chips, and the traits the board logic is written
//! against.
//!
//! A wrapper binds a shared chip and one channel, wiper or bit. The chip is shared through a
//! `RefCell` since several wrappers address the same package.

use core::cell::RefCell;

use embedded_hal::i2c::I2c;

use crate::{
    error::{ArgumentError, Result},
    max5815::{self, Max5815, PowerMode},
    mcp23008::{self, Mcp23008, Register},
    mcp466x::{Mcp466x, Wiper},
    range::ResistiveRange,
};

/// A voltage output.
pub trait Dac {
    type BusError;

    fn set_voltage(&mut self, voltage: f64) -> Result<(), Self::BusError>;
    fn get_voltage(&mut self) -> Result<f64, Self::BusError>;
}

/// A programmable resistance.
pub trait Rheostat {
    type BusError;

    fn range(&self) -> ResistiveRange;
    fn set_res(&mut self, resistance: f64) -> Result<(), Self::BusError>;
    fn get_res(&mut self) -> Result<f64, Self::BusError>;
}

/// A single digital output that can be read back.
pub trait DigitalPin {
    type BusError;

    fn set(&mut self, high: bool) -> Result<(), Self::BusError>;
    fn get(&mut self) -> Result<bool, Self::BusError>;
}

/// One output of a MAX581x DAC.
pub struct DacChannel<'a, I2C> {
    dac: &'a RefCell<Max5815<I2C>>,
    channel: max5815::Channel,
}

impl<'a, I2C: I2c> DacChannel<'a, I2C> {
    pub fn new(dac: &'a RefCell<Max5815<I2C>>, channel: max5815::Channel) -> Self {
        Self { dac, channel }
    }

    pub fn channel(&self) -> max5815::Channel {
        self.channel
    }

    pub fn set_code(&mut self, code: u16) -> Result<(), I2C::Error> {
        self.dac.borrow_mut().set_code(self.channel, code)
    }

    pub fn get_code(&mut self) -> Result<u16, I2C::Error> {
        self.dac.borrow_mut().get_code(self.channel)
    }

    pub fn set_power(&mut self, mode: PowerMode) -> Result<(), I2C::Error> {
        self.dac.borrow_mut().set_power(self.channel, mode)
    }
}

impl<I2C: I2c> Dac for DacChannel<'_, I2C> {
    type BusError = I2C::Error;

    fn set_voltage(&mut self, voltage: f64) -> Result<(), I2C::Error> {
        self.dac.borrow_mut().set_voltage(self.channel, voltage)
    }

    fn get_voltage(&mut self) -> Result<f64, I2C::Error> {
        self.dac.borrow_mut().get_voltage(self.channel)
    }
}

/// One wiper of an MCP466x, used as a rheostat.
pub struct RheostatChannel<'a, I2C> {
    pot: &'a RefCell<Mcp466x<I2C>>,
    wiper: Wiper,
}

impl<'a, I2C: I2c> RheostatChannel<'a, I2C> {
    pub fn new(pot: &'a RefCell<Mcp466x<I2C>>, wiper: Wiper) -> Self {
        Self { pot, wiper }
    }

    pub fn wiper(&self) -> Wiper {
        self.wiper
    }

    pub fn set_code(&mut self, code: u16) -> Result<(), I2C::Error> {
        self.pot.borrow_mut().set_wiper(self.wiper, code)
    }

    pub fn get_code(&mut self) -> Result<u16, I2C::Error> {
        self.pot.borrow_mut().get_wiper(self.wiper)
    }

    pub fn inc(&mut self) -> Result<(), I2C::Error> {
        self.pot.borrow_mut().inc_wiper(self.wiper)
    }

    pub fn dec(&mut self) -> Result<(), I2C::Error> {
        self.pot.borrow_mut().dec_wiper(self.wiper)
    }
}

impl<I2C: I2c> Rheostat for RheostatChannel<'_, I2C> {
    type BusError = I2C::Error;

    fn range(&self) -> ResistiveRange {
        *self.pot.borrow().range()
    }

    fn set_res(&mut self, resistance: f64) -> Result<(), I2C::Error> {
        self.pot.borrow_mut().set_res(self.wiper, resistance)
    }

    fn get_res(&mut self) -> Result<f64, I2C::Error> {
        self.pot.borrow_mut().get_res(self.wiper)
    }
}

/// The upper bits of an MCP23008 port, starting at `offset`.
///
/// Bit 0 of the bank is bit `offset` of the chip. Writes leave the bits below the offset as
/// they are.
pub struct GpioBank<'a, I2C> {
    gpio: &'a RefCell<Mcp23008<I2C>>,
    offset: u8,
}

impl<I2C> Clone for GpioBank<'_, I2C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I2C> Copy for GpioBank<'_, I2C> {}

impl<'a, I2C: I2c> GpioBank<'a, I2C> {
    pub fn new(
        gpio: &'a RefCell<Mcp23008<I2C>>,
        offset: u8,
    ) -> core::result::Result<Self, ArgumentError> {
        if offset >= mcp23008::WIDTH {
            return Err(ArgumentError::InvalidPin {
                bit: offset,
                width: mcp23008::WIDTH,
            });
        }
        Ok(Self { gpio, offset })
    }

    pub fn offset(&self) -> u8 {
        self.offset
    }

    /// Number of pins in the bank.
    pub fn width(&self) -> u8 {
        mcp23008::WIDTH - self.offset
    }

    /// A single pin of the bank.
    pub fn pin(&self, bit: u8) -> core::result::Result<GpioPin<'a, I2C>, ArgumentError> {
        self.check_bit(bit)?;
        Ok(GpioPin { bank: *self, bit })
    }

    /// Set the direction of the bank's pins. A set bit makes the pin an input.
    pub fn set_direction(&mut self, inputs: u8) -> Result<(), I2C::Error> {
        let inputs = self.shift_in(inputs)?;
        let mut gpio = self.gpio.borrow_mut();
        let current = gpio.get_direction()?;
        gpio.set_direction((current & self.lower_mask()) | inputs)
    }

    pub fn get_gpio(&mut self) -> Result<u8, I2C::Error> {
        Ok(self.gpio.borrow_mut().get_gpio()? >> self.offset)
    }

    pub fn set_gpio(&mut self, value: u8) -> Result<(), I2C::Error> {
        let value = self.shift_in(value)?;
        let mut gpio = self.gpio.borrow_mut();
        let latch = gpio.read_register(Register::OLat)?;
        gpio.set_gpio((latch & self.lower_mask()) | value)
    }

    pub fn get_gpio_bit(&mut self, bit: u8) -> Result<bool, I2C::Error> {
        self.check_bit(bit)?;
        self.gpio.borrow_mut().get_gpio_bit(bit + self.offset)
    }

    pub fn set_gpio_bit(&mut self, bit: u8, value: bool) -> Result<(), I2C::Error> {
        self.check_bit(bit)?;
        self.gpio.borrow_mut().set_gpio_bit(bit + self.offset, value)
    }

    fn check_bit(&self, bit: u8) -> core::result::Result<(), ArgumentError> {
        if bit >= self.width() {
            return Err(ArgumentError::InvalidPin {
                bit,
                width: self.width(),
            });
        }
        Ok(())
    }

    fn lower_mask(&self) -> u8 {
        (1 << self.offset) - 1
    }

    /// Move a bank value to its place in the port, rejecting bits that don't fit.
    fn shift_in(&self, value: u8) -> core::result::Result<u8, ArgumentError> {
        let limit = 1u32 << self.width();
        if value as u32 >= limit {
            return Err(ArgumentError::CodeOutOfRange {
                code: value as i64,
                limit,
            });
        }
        Ok(value << self.offset)
    }
}

/// One pin of a [`GpioBank`].
pub struct GpioPin<'a, I2C> {
    bank: GpioBank<'a, I2C>,
    bit: u8,
}

impl<I2C: I2c> GpioPin<'_, I2C> {
    pub fn bit(&self) -> u8 {
        self.bit
    }

    /// Drive the pin low.
    pub fn reset(&mut self) -> Result<(), I2C::Error> {
        self.set(false)
    }
}

impl<I2C: I2c> DigitalPin for GpioPin<'_, I2C> {
    type BusError = I2C::Error;

    fn set(&mut self, high: bool) -> Result<(), I2C::Error> {
        self.bank.set_gpio_bit(self.bit, high)
    }

    fn get(&mut self) -> Result<bool, I2C::Error> {
        self.bank.get_gpio_bit(self.bit)
    }
}
