//! Adjustable LDO whose output is set by a bias current through a rheostat.

use crate::{
    channel::Rheostat,
    error::{Error, Result},
};

/// LDO regulator with `Vout = Ibias * R`.
pub struct Ldo<R> {
    rheostat: R,
    /// Bias current through the rheostat, in Ampere.
    bias_current: f64,
}

impl<R: Rheostat> Ldo<R> {
    pub fn new(rheostat: R, bias_current: f64) -> Self {
        Self {
            rheostat,
            bias_current,
        }
    }

    pub fn bias_current(&self) -> f64 {
        self.bias_current
    }

    /// Highest output voltage the rheostat can produce.
    pub fn max_voltage(&self) -> f64 {
        self.rheostat.range().max_resistance() * self.bias_current
    }

    /// Set the output voltage. The rheostat rounds to the nearest code.
    pub fn set_voltage(&mut self, voltage: f64) -> Result<(), R::BusError> {
        if self.bias_current == 0.0 {
            return Err(Error::DivisionByZero);
        }
        let resistance = voltage / self.bias_current;
        log::debug!("LDO {voltage} V -> {resistance} Ohm");
        self.rheostat.set_res(resistance)
    }

    /// Read back the output voltage from the rheostat setting.
    pub fn get_voltage(&mut self) -> Result<f64, R::BusError> {
        Ok(self.rheostat.get_res()? * self.bias_current)
    }

    /// Destroy the LDO, returning the rheostat.
    pub fn destroy(self) -> R {
        self.rheostat
    }
}
