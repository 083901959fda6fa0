//! Driver for the PCA9542A 2-channel I2C multiplexer.
//!
//! The device has a single control register, written and read without a register address.

use embedded_hal::i2c::I2c;
use modular_bitfield::prelude::*;
use strum_macros::EnumIter;

use crate::error::{Error, Result};

const ADDRESS_BASE: u8 = 0b1110 << 3;

/// Downstream bus of the multiplexer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum SubBus {
    Zero = 0,
    One = 1,
}

/// Control register.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    /// Channel selection, only the LSB is used on the 2-channel part.
    pub select: B2,
    /// A channel is connected when set.
    pub enable: bool,
    #[skip]
    __: B1,
    /// __R__ - Interrupt pending on sub-bus 0.
    pub int0: bool,
    /// __R__ - Interrupt pending on sub-bus 1.
    pub int1: bool,
    #[skip]
    __: B2,
}

impl Control {
    /// Control value connecting `bus`, or disconnecting both sub-buses for `None`.
    pub fn selecting(bus: Option<SubBus>) -> Self {
        match bus {
            Some(bus) => Control::new().with_enable(true).with_select(bus as u8),
            None => Control::new(),
        }
    }

    pub fn selected(&self) -> Option<SubBus> {
        if !self.enable() {
            return None;
        }
        match self.select() & 0b01 {
            0 => Some(SubBus::Zero),
            _ => Some(SubBus::One),
        }
    }

    pub fn to_byte(self) -> u8 {
        let [byte] = self.into_bytes();
        byte
    }
}

/// Pending interrupts of the two sub-buses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Interrupts {
    pub int0: bool,
    pub int1: bool,
}

/// PCA9542A I2C multiplexer driver.
#[derive(Debug)]
pub struct Pca9542a<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Pca9542a<I2C> {
    /// Create a new driver. `a2`, `a1` and `a0` are the levels of the address pins.
    pub fn new(i2c: I2C, a2: bool, a1: bool, a0: bool) -> Self {
        let address = ADDRESS_BASE | ((a2 as u8) << 2) | ((a1 as u8) << 1) | a0 as u8;
        log::info!("PCA9542A multiplexer at {address:#04x}");
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Connect one sub-bus, or disconnect both with `None`.
    pub fn select(&mut self, bus: Option<SubBus>) -> Result<(), I2C::Error> {
        self.write_control(Control::selecting(bus))
            .map_err(Error::Transport)
    }

    /// Sub-bus currently connected, as read from the device.
    pub fn selected(&mut self) -> Result<Option<SubBus>, I2C::Error> {
        Ok(self.read_control()?.selected())
    }

    pub fn interrupts(&mut self) -> Result<Interrupts, I2C::Error> {
        let control = self.read_control()?;
        Ok(Interrupts {
            int0: control.int0(),
            int1: control.int1(),
        })
    }

    pub fn read_control(&mut self) -> Result<Control, I2C::Error> {
        let mut buff = [0u8; 1];
        self.i2c
            .read(self.address, &mut buff)
            .map_err(Error::Transport)?;
        Ok(Control::from_bytes(buff))
    }

    /// Write the control register, returning the raw bus error.
    ///
    /// Used by the bus manager, which forwards bus errors to devices on the sub-buses.
    pub(crate) fn write_control(
        &mut self,
        control: Control,
    ) -> core::result::Result<(), I2C::Error> {
        log::trace!(
            "PCA9542A {:#04x} control <- {:#04x}",
            self.address,
            control.to_byte()
        );
        self.i2c.write(self.address, &[control.to_byte()])
    }

    /// Access to the upstream bus, for transactions to devices behind the multiplexer.
    pub(crate) fn bus(&mut self) -> &mut I2C {
        &mut self.i2c
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

    #[test]
    fn control_bits() {
        assert_eq!(Control::selecting(Some(SubBus::Zero)).to_byte(), 0x04);
        assert_eq!(Control::selecting(Some(SubBus::One)).to_byte(), 0x05);
        assert_eq!(Control::selecting(None).to_byte(), 0x00);
        for bus in SubBus::iter() {
            assert_eq!(Control::selecting(Some(bus)).selected(), Some(bus));
        }
        // Channel bits without enable don't connect anything.
        assert_eq!(Control::from_bytes([0x01]).selected(), None);
    }

    #[test]
    fn select_and_read_back() {
        let mut dev = Pca9542a::new(
            Mock::new(&[
                Transaction::write(0x70, vec![0x05]),
                Transaction::read(0x70, vec![0x05]),
                Transaction::write(0x70, vec![0x00]),
                Transaction::read(0x70, vec![0x00]),
            ]),
            false,
            false,
            false,
        );
        dev.select(Some(SubBus::One)).unwrap();
        assert_eq!(dev.selected().unwrap(), Some(SubBus::One));
        dev.select(None).unwrap();
        assert_eq!(dev.selected().unwrap(), None);
        dev.destroy().done();
    }

    #[test]
    fn interrupt_flags() {
        let mut dev = Pca9542a::new(
            Mock::new(&[Transaction::read(0x73, vec![0b0010_0100])]),
            false,
            true,
            true,
        );
        assert_eq!(dev.address(), 0x73);
        assert_eq!(
            dev.interrupts().unwrap(),
            Interrupts {
                int0: false,
                int1: true
            }
        );
        dev.destroy().done();
    }
}
