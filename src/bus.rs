//! Sharing one I2C bus behind a PCA9542A multiplexer.
//!
//! The multiplexer selection is bus-wide state. [`MuxedBus`] owns the multiplexer together with
//! the last selection it made, and hands out [`SubBusDevice`]s that select their sub-bus before
//! each transaction. Selection and transaction happen under one `RefCell` borrow, so no other
//! device can switch the multiplexer in between.
//!
//! `MuxedBus` is not `Sync`. Sharing a board between threads needs a mutex around the whole
//! bus.

use core::cell::RefCell;

use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};

use crate::pca9542a::{Control, Pca9542a, SubBus};

struct MuxState<I2C> {
    mux: Pca9542a<I2C>,
    /// Last selection written successfully, `None` when unknown or disconnected.
    selected: Option<SubBus>,
}

impl<I2C: I2c> MuxState<I2C> {
    fn select(&mut self, sub_bus: SubBus) -> Result<&mut I2C, I2C::Error> {
        if self.selected != Some(sub_bus) {
            if let Err(e) = self.mux.write_control(Control::selecting(Some(sub_bus))) {
                if self.selected.is_some() {
                    log::warn!("Multiplexer selection lost while switching to {sub_bus:?}");
                }
                self.selected = None;
                return Err(e);
            }
            log::trace!("Multiplexer switched to {sub_bus:?}");
            self.selected = Some(sub_bus);
        }
        Ok(self.mux.bus())
    }
}

/// Owner of the physical bus and the multiplexer state.
pub struct MuxedBus<I2C> {
    inner: RefCell<MuxState<I2C>>,
}

impl<I2C: I2c> MuxedBus<I2C> {
    /// Take ownership of the multiplexer. The first transaction on any sub-bus selects it.
    pub fn new(mux: Pca9542a<I2C>) -> Self {
        Self {
            inner: RefCell::new(MuxState {
                mux,
                selected: None,
            }),
        }
    }

    /// A handle to one of the sub-buses, usable as an I2C bus by any driver.
    pub fn sub_bus(&self, sub_bus: SubBus) -> SubBusDevice<'_, I2C> {
        SubBusDevice {
            inner: &self.inner,
            sub_bus,
        }
    }

    /// The sub-bus the multiplexer was last switched to.
    pub fn selected(&self) -> Option<SubBus> {
        self.inner.borrow().selected
    }

    /// Disconnect both sub-buses.
    pub fn disconnect(&self) -> crate::error::Result<(), I2C::Error> {
        let mut state = self.inner.borrow_mut();
        state.selected = None;
        state.mux.select(None)
    }

    /// Destroy the manager, returning the upstream I2C bus.
    pub fn destroy(self) -> I2C {
        self.inner.into_inner().mux.destroy()
    }
}

/// One sub-bus of a [`MuxedBus`].
pub struct SubBusDevice<'a, I2C> {
    inner: &'a RefCell<MuxState<I2C>>,
    sub_bus: SubBus,
}

impl<I2C> SubBusDevice<'_, I2C> {
    pub fn sub_bus(&self) -> SubBus {
        self.sub_bus
    }
}

impl<I2C: I2c> ErrorType for SubBusDevice<'_, I2C> {
    type Error = I2C::Error;
}

impl<I2C: I2c> I2c for SubBusDevice<'_, I2C> {
    fn read(&mut self, address: SevenBitAddress, read: &mut [u8]) -> Result<(), Self::Error> {
        let mut state = self.inner.borrow_mut();
        state.select(self.sub_bus)?.read(address, read)
    }

    fn write(&mut self, address: SevenBitAddress, write: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.inner.borrow_mut();
        state.select(self.sub_bus)?.write(address, write)
    }

    fn write_read(
        &mut self,
        address: SevenBitAddress,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        let mut state = self.inner.borrow_mut();
        state.select(self.sub_bus)?.write_read(address, write, read)
    }

    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.inner.borrow_mut();
        state.select(self.sub_bus)?.transaction(address, operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock, Transaction};

    fn muxed(expectations: &[Transaction]) -> MuxedBus<Mock> {
        MuxedBus::new(Pca9542a::new(Mock::new(expectations), false, false, false))
    }

    #[test]
    fn selects_once_per_switch() {
        let bus = muxed(&[
            Transaction::write(0x70, vec![0x04]),
            Transaction::write(0x2c, vec![0x00, 0x80]),
            Transaction::write_read(0x20, vec![0x09], vec![0x00]),
            Transaction::write(0x70, vec![0x05]),
            Transaction::write(0x2c, vec![0x10, 0x40]),
            Transaction::write(0x70, vec![0x04]),
            Transaction::read(0x20, vec![0xff]),
        ]);
        let mut zero = bus.sub_bus(SubBus::Zero);
        let mut one = bus.sub_bus(SubBus::One);
        zero.write(0x2c, &[0x00, 0x80]).unwrap();
        let mut buff = [0u8; 1];
        zero.write_read(0x20, &[0x09], &mut buff).unwrap();
        assert_eq!(bus.selected(), Some(SubBus::Zero));
        one.write(0x2c, &[0x10, 0x40]).unwrap();
        assert_eq!(bus.selected(), Some(SubBus::One));
        zero.read(0x20, &mut buff).unwrap();
        assert_eq!(buff, [0xff]);
        bus.destroy().done();
    }

    #[test]
    fn failed_select_forces_reselect() {
        let bus = muxed(&[
            Transaction::write(0x70, vec![0x04]).with_error(ErrorKind::Other),
            Transaction::write(0x70, vec![0x04]),
            Transaction::write(0x2c, vec![0x00, 0x01]),
        ]);
        let mut zero = bus.sub_bus(SubBus::Zero);
        assert_eq!(zero.write(0x2c, &[0x00, 0x01]), Err(ErrorKind::Other));
        assert_eq!(bus.selected(), None);
        zero.write(0x2c, &[0x00, 0x01]).unwrap();
        bus.destroy().done();
    }

    #[test]
    fn device_errors_keep_the_selection() {
        let bus = muxed(&[
            Transaction::write(0x70, vec![0x05]),
            Transaction::write(0x2c, vec![0x00]).with_error(ErrorKind::Other),
            Transaction::write(0x2c, vec![0x00]),
        ]);
        let mut one = bus.sub_bus(SubBus::One);
        assert!(one.write(0x2c, &[0x00]).is_err());
        assert_eq!(bus.selected(), Some(SubBus::One));
        one.write(0x2c, &[0x00]).unwrap();
        bus.destroy().done();
    }

    #[test]
    fn disconnect_clears_the_selection() {
        let bus = muxed(&[
            Transaction::write(0x70, vec![0x05]),
            Transaction::write(0x2c, vec![0x00]),
            Transaction::write(0x70, vec![0x00]),
            Transaction::write(0x70, vec![0x05]),
            Transaction::write(0x2c, vec![0x00]),
        ]);
        let mut one = bus.sub_bus(SubBus::One);
        one.write(0x2c, &[0x00]).unwrap();
        bus.disconnect().unwrap();
        assert_eq!(bus.selected(), None);
        one.write(0x2c, &[0x00]).unwrap();
        bus.destroy().done();
    }

    #[test]
    fn drivers_work_on_a_sub_bus() {
        use crate::mcp23008::Mcp23008;

        let bus = muxed(&[
            Transaction::write(0x70, vec![0x05]),
            Transaction::write(0x21, vec![0x09, 0xaa]),
        ]);
        let mut gpio = Mcp23008::new(bus.sub_bus(SubBus::One), false, false, true);
        gpio.set_gpio(0xaa).unwrap();
        drop(gpio);
        bus.destroy().done();
    }
}
