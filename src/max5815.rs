//! Driver for the MAX5813/MAX5814/MAX5815 4-channel, 8/10/12-bit voltage output DACs.
//!
//! All four DACs share one reference, either external or internal (2.048V, 2.500V or 4.096V).
//! Every command is a command byte followed by two data bytes; codes are left aligned in the
//! 16-bit data word.

use embedded_hal::i2c::I2c;
use strum_macros::EnumIter;

use crate::error::{ArgumentError, Error, Result};

const CMD_CODE: u8 = 0b0000 << 4;
const CMD_LOAD: u8 = 0b0001 << 4;
const CMD_CODE_LOAD: u8 = 0b0011 << 4;
const CMD_POWER: u8 = 0b0100 << 4;
const CMD_SW_CLEAR: u8 = 0b0101_0000;
const CMD_SW_RESET: u8 = 0b0101_0001;
const CMD_REF: u8 = 0b01110 << 3;

/// Level an address pin is strapped to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
pub enum AddrPin {
    Low,
    High,
    /// Not connected.
    Float,
}

/// Package variant, which determines how the address pins map to an I2C address.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Package {
    Tssop { addr1: AddrPin, addr0: AddrPin },
    Wlp { addr0: AddrPin },
}

impl Package {
    /// 7-bit I2C address of the device.
    pub const fn address(self) -> u8 {
        use AddrPin::*;
        match self {
            Package::Tssop { addr1, addr0 } => {
                let low_bits = match (addr1, addr0) {
                    (High, High) => 0b0000,
                    (High, Float) => 0b0010,
                    (High, Low) => 0b0011,
                    (Float, High) => 0b1000,
                    (Float, Float) => 0b1010,
                    (Float, Low) => 0b1011,
                    (Low, High) => 0b1100,
                    (Low, Float) => 0b1110,
                    (Low, Low) => 0b1111,
                };
                (0b001 << 4) | low_bits
            }
            Package::Wlp { addr0 } => {
                let low_bits = match addr0 {
                    High => 0b00,
                    Float => 0b10,
                    Low => 0b11,
                };
                (0b00011 << 2) | low_bits
            }
        }
    }
}

/// MAX5813 (8 bit), MAX5814 (10 bit) or MAX5815 (12 bit).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DacResolution {
    Bits8 = 8,
    Bits10 = 10,
    Bits12 = 12,
}

impl DacResolution {
    pub const fn code_limit(self) -> u32 {
        1 << self as u8
    }

    /// Left shift that aligns a code in the 16-bit data word.
    const fn shift(self) -> u8 {
        16 - self as u8
    }
}

/// One of the four DAC outputs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum Channel {
    A = 0b0000,
    B = 0b0001,
    C = 0b0010,
    D = 0b0011,
}

impl Channel {
    /// Bit of this channel in the power command's DAC selection byte.
    const fn mask(self) -> u8 {
        1 << self as u8
    }
}

/// Reference voltage source.
#[derive(Debug, Copy, Clone, PartialEq, EnumIter)]
#[repr(u8)]
pub enum Reference {
    External = 0b00,
    Internal2V5 = 0b01,
    Internal2V048 = 0b10,
    Internal4V096 = 0b11,
}

impl Reference {
    /// Voltage of the internal references; `None` for the external reference.
    pub const fn volts(self) -> Option<f64> {
        match self {
            Reference::External => None,
            Reference::Internal2V5 => Some(2.5),
            Reference::Internal2V048 => Some(2.048),
            Reference::Internal4V096 => Some(4.096),
        }
    }
}

impl From<u8> for Reference {
    /// Decode the two LSBs of the REF register.
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Reference::External,
            0b01 => Reference::Internal2V5,
            0b10 => Reference::Internal2V048,
            _ => Reference::Internal4V096,
        }
    }
}

/// Output state of a DAC. Anything other than `Normal` powers the channel down.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum PowerMode {
    Normal = 0b00,
    /// Powered down, output pulled to ground through 1 kOhm.
    PullDown1k = 0b01,
    /// Powered down, output pulled to ground through 100 kOhm.
    PullDown100k = 0b10,
    /// Powered down, output high impedance.
    HighImpedance = 0b11,
}

/// MAX581x DAC driver.
#[derive(Debug)]
pub struct Max5815<I2C> {
    i2c: I2C,
    address: u8,
    resolution: DacResolution,
    /// Voltage on the REF pin, only used when the external reference is selected.
    external_reference: Option<f64>,
}

impl<I2C: I2c> Max5815<I2C> {
    pub fn new(i2c: I2C, package: Package, resolution: DacResolution) -> Self {
        let address = package.address();
        log::info!("MAX581x DAC at {address:#04x}, {} bit", resolution as u8);
        Self {
            i2c,
            address,
            resolution,
            external_reference: None,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn resolution(&self) -> DacResolution {
        self.resolution
    }

    /// Tell the driver the voltage applied to the REF pin.
    ///
    /// Needed for voltage conversions when the external reference is selected.
    pub fn set_external_reference_voltage(&mut self, volts: f64) {
        self.external_reference = Some(volts);
    }

    /// Select the reference.
    ///
    /// With `always_on` the reference stays powered while all DACs are powered down. An
    /// internal reference is also available on the REF pin for other circuitry.
    pub fn set_reference(
        &mut self,
        reference: Reference,
        always_on: bool,
    ) -> Result<(), I2C::Error> {
        let command = CMD_REF | ((always_on as u8) << 2) | reference as u8;
        self.write_command(command, 0x0000)
    }

    /// Read the reference selection back from the chip.
    pub fn get_reference(&mut self) -> Result<Reference, I2C::Error> {
        let value = self.read_command(CMD_REF)?;
        Ok(Reference::from(value as u8))
    }

    /// Voltage of the reference currently selected on the chip.
    pub fn reference_voltage(&mut self) -> Result<f64, I2C::Error> {
        let reference = self.get_reference()?;
        let volts = reference
            .volts()
            .or(self.external_reference)
            .ok_or(ArgumentError::ReferenceNotConfigured)?;
        log::trace!("MAX581x {:#04x} reference {reference:?} = {volts} V", self.address);
        Ok(volts)
    }

    /// Convert a voltage into a code, using the reference selected on the chip.
    pub fn voltage2code(&mut self, voltage: f64) -> Result<u16, I2C::Error> {
        let fullscale = self.reference_voltage()?;
        let lsb = fullscale / self.resolution.code_limit() as f64;
        let code = (voltage / lsb).round_ties_even();
        if !(code >= 0.0 && code < self.resolution.code_limit() as f64) {
            return Err(Error::InvalidArgument(ArgumentError::VoltageOutOfRange {
                voltage,
                fullscale,
            }));
        }
        Ok(code as u16)
    }

    /// Convert a code into a voltage, using the reference selected on the chip.
    pub fn code2voltage(&mut self, code: u16) -> Result<f64, I2C::Error> {
        self.check_code(code)?;
        let fullscale = self.reference_voltage()?;
        Ok(code as f64 * fullscale / self.resolution.code_limit() as f64)
    }

    /// Write a code to a channel and load it to the output.
    pub fn set_code(&mut self, channel: Channel, code: u16) -> Result<(), I2C::Error> {
        self.check_code(code)?;
        self.write_command(
            CMD_CODE_LOAD | channel as u8,
            code << self.resolution.shift(),
        )
    }

    /// Write a code to a channel's CODE register without updating the output.
    pub fn write_code(&mut self, channel: Channel, code: u16) -> Result<(), I2C::Error> {
        self.check_code(code)?;
        self.write_command(CMD_CODE | channel as u8, code << self.resolution.shift())
    }

    /// Read the code currently driving a channel's output.
    pub fn get_code(&mut self, channel: Channel) -> Result<u16, I2C::Error> {
        let value = self.read_command(CMD_LOAD | channel as u8)?;
        Ok(value >> self.resolution.shift())
    }

    /// Set the desired output voltage of a channel.
    pub fn set_voltage(&mut self, channel: Channel, voltage: f64) -> Result<(), I2C::Error> {
        let code = self.voltage2code(voltage)?;
        log::debug!("MAX581x {:#04x} {channel:?}: {voltage} V -> {code:#05x}", self.address);
        self.set_code(channel, code)
    }

    /// Read back the output voltage of a channel.
    pub fn get_voltage(&mut self, channel: Channel) -> Result<f64, I2C::Error> {
        let code = self.get_code(channel)?;
        self.code2voltage(code)
    }

    /// Set the power mode of one channel.
    pub fn set_power(&mut self, channel: Channel, mode: PowerMode) -> Result<(), I2C::Error> {
        self.write_power(channel.mask(), mode)
    }

    /// Set the power mode of all four channels.
    pub fn set_power_all(&mut self, mode: PowerMode) -> Result<(), I2C::Error> {
        self.write_power(0b1111, mode)
    }

    /// Reset all CODE, DAC and configuration registers to their defaults.
    pub fn sw_reset(&mut self) -> Result<(), I2C::Error> {
        self.write_command(CMD_SW_RESET, 0x0000)
    }

    /// Return all CODE and DAC registers to zero scale.
    pub fn sw_clear(&mut self) -> Result<(), I2C::Error> {
        self.write_command(CMD_SW_CLEAR, 0x0000)
    }

    /// Destroy the driver, returning the I2C bus.
    pub fn destroy(self) -> I2C {
        self.i2c
    }

    fn write_power(&mut self, mask: u8, mode: PowerMode) -> Result<(), I2C::Error> {
        self.write_command(CMD_POWER | mode as u8, (mask as u16) << 8)
    }

    fn check_code(&self, code: u16) -> core::result::Result<(), ArgumentError> {
        if code as u32 >= self.resolution.code_limit() {
            return Err(ArgumentError::CodeOutOfRange {
                code: code as i64,
                limit: self.resolution.code_limit(),
            });
        }
        Ok(())
    }

    fn write_command(&mut self, command: u8, data: u16) -> Result<(), I2C::Error> {
        let [high, low] = data.to_be_bytes();
        log::trace!("MAX581x {:#04x} write {command:#04x} {data:#06x}", self.address);
        self.i2c
            .write(self.address, &[command, high, low])
            .map_err(Error::Transport)
    }

    fn read_command(&mut self, command: u8) -> Result<u16, I2C::Error> {
        let mut buff = [0u8; 2];
        self.i2c
            .write_read(self.address, &[command], &mut buff)
            .map_err(Error::Transport)?;
        Ok(u16::from_be_bytes(buff))
    }
}
