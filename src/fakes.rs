//! In-memory stand-ins for the channel traits, used to test the board logic without a bus.

use core::convert::Infallible;

use crate::{
    channel::{Dac, DigitalPin, Rheostat},
    error::Result,
    range::ResistiveRange,
};

/// A DAC that remembers the last voltage and counts writes.
#[derive(Debug, Default)]
pub struct FakeDac {
    pub voltage: f64,
    pub writes: Vec<f64>,
}

impl FakeDac {
    pub fn new(voltage: f64) -> Self {
        Self {
            voltage,
            writes: Vec::new(),
        }
    }
}

impl Dac for FakeDac {
    type BusError = Infallible;

    fn set_voltage(&mut self, voltage: f64) -> Result<(), Infallible> {
        self.voltage = voltage;
        self.writes.push(voltage);
        Ok(())
    }

    fn get_voltage(&mut self) -> Result<f64, Infallible> {
        Ok(self.voltage)
    }
}

/// A rheostat that quantizes like the real device and records every code written.
#[derive(Debug)]
pub struct FakeRheostat {
    pub range: ResistiveRange,
    pub code: u16,
    pub writes: Vec<u16>,
}

impl FakeRheostat {
    pub fn new(range: ResistiveRange) -> Self {
        Self {
            range,
            code: range.mid_code(),
            writes: Vec::new(),
        }
    }
}

impl Rheostat for FakeRheostat {
    type BusError = Infallible;

    fn range(&self) -> ResistiveRange {
        self.range
    }

    fn set_res(&mut self, resistance: f64) -> Result<(), Infallible> {
        self.code = self.range.res2code(resistance)?;
        self.writes.push(self.code);
        Ok(())
    }

    fn get_res(&mut self) -> Result<f64, Infallible> {
        Ok(self.range.code2res(self.code)?)
    }
}

#[derive(Debug, Default)]
pub struct FakePin {
    pub level: bool,
    pub writes: Vec<bool>,
}

impl DigitalPin for FakePin {
    type BusError = Infallible;

    fn set(&mut self, high: bool) -> Result<(), Infallible> {
        self.level = high;
        self.writes.push(high);
        Ok(())
    }

    fn get(&mut self) -> Result<bool, Infallible> {
        Ok(self.level)
    }
}
