//! Programmable current source / sink.
//!
//! The output current is `Vref / R`. `Vref` comes from a DAC and `R` from one of two rheostats
//! with overlapping ranges, switched by a digital pin. For a target resistance both ranges can
//! reach, the range whose code lands closer to mid-scale wins, since the rheostats are most
//! linear there.
//!
//! Programming the rheostat and the range pin are two separate bus writes, and a reading taken
//! between them sees a mixed state.

use strum_macros::EnumIter;

use crate::{
    channel::{Dac, DigitalPin, Rheostat},
    error::{ArgumentError, Error, Result},
};

/// Which rheostat sets the current.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
pub enum Range {
    /// The low-resistance (high current) rheostat, range pin low.
    Low,
    /// The high-resistance (low current) rheostat, range pin high.
    High,
}

impl Range {
    /// Level of the range pin selecting this range.
    pub const fn pin_level(self) -> bool {
        matches!(self, Range::High)
    }

    pub const fn from_pin_level(high: bool) -> Self {
        if high { Range::High } else { Range::Low }
    }
}

/// What [`CurrentSource::set_current`] programmed.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CurrentSetting {
    pub range: Range,
    /// Wiper code written to the selected rheostat.
    pub code: u16,
    /// Resistance of that code, in Ohm.
    pub resistance: f64,
    /// Reference voltage the current is derived from.
    pub voltage: f64,
}

impl CurrentSetting {
    /// The current actually produced, after quantization of the resistance.
    pub fn current(&self) -> f64 {
        self.voltage / self.resistance
    }
}

/// A read back of the current source state.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CurrentReading {
    pub current: f64,
    pub voltage: f64,
    pub resistance: f64,
    pub range: Range,
}

/// Current source made of a reference DAC, a low and a high range rheostat and a range pin.
///
/// All four parts must share one bus error type.
pub struct CurrentSource<D, R, P> {
    dac: D,
    low: R,
    high: R,
    range_pin: P,
}

impl<D, R, P, E> CurrentSource<D, R, P>
where
    D: Dac<BusError = E>,
    R: Rheostat<BusError = E>,
    P: DigitalPin<BusError = E>,
{
    pub fn new(dac: D, low: R, high: R, range_pin: P) -> Self {
        Self {
            dac,
            low,
            high,
            range_pin,
        }
    }

    /// Choose the range and code for a target resistance.
    ///
    /// Below the low range fullscale, both ranges are tried and the code nearest to its
    /// mid-scale wins. Equal distances pick the low range. A range that can't encode the
    /// resistance drops out; if neither can, the low range error is returned. At or above
    /// the low range fullscale only the high range is considered.
    pub fn select_range(
        &self,
        resistance: f64,
    ) -> core::result::Result<(Range, u16), ArgumentError> {
        let low = self.low.range();
        let high = self.high.range();
        if !(resistance < low.fullscale()) {
            let code = high.res2code(resistance)?;
            log::debug!("{resistance} Ohm is beyond the low range, high range code {code}");
            return Ok((Range::High, code));
        }
        match (low.res2code(resistance), high.res2code(resistance)) {
            (Ok(low_code), Ok(high_code)) => {
                let low_distance = low.distance_from_mid(low_code);
                let high_distance = high.distance_from_mid(high_code);
                let selected = if high_distance < low_distance {
                    (Range::High, high_code)
                } else {
                    (Range::Low, low_code)
                };
                log::debug!(
                    "{resistance} Ohm: low code {low_code} ({low_distance} from mid), \
                     high code {high_code} ({high_distance} from mid), using {:?}",
                    selected.0
                );
                Ok(selected)
            }
            (Ok(low_code), Err(_)) => Ok((Range::Low, low_code)),
            (Err(_), Ok(high_code)) => Ok((Range::High, high_code)),
            (Err(e), Err(_)) => Err(e),
        }
    }

    /// Set the output current.
    ///
    /// With `voltage` the reference DAC is programmed first, otherwise its present output is
    /// used. Only the magnitude of `current` matters; the polarity is set by the circuit.
    pub fn set_current(&mut self, current: f64, voltage: Option<f64>) -> Result<CurrentSetting, E> {
        if current == 0.0 {
            return Err(Error::DivisionByZero);
        }
        let voltage = match voltage {
            Some(voltage) => {
                self.dac.set_voltage(voltage)?;
                voltage
            }
            None => self.dac.get_voltage()?,
        };
        let resistance = (voltage / current).abs();
        let (range, code) = self.select_range(resistance)?;
        log::debug!("Current {current} A at {voltage} V needs {resistance} Ohm, {range:?} range");

        self.rheostat(range).set_res(resistance)?;
        self.range_pin.set(range.pin_level())?;

        let resistance = self.rheostat(range).range().code2res(code)?;
        Ok(CurrentSetting {
            range,
            code,
            resistance,
            voltage,
        })
    }

    /// Read back the output current.
    pub fn get_current(&mut self) -> Result<f64, E> {
        Ok(self.get_current_detailed()?.current)
    }

    /// Read back the output current with the values it is computed from.
    pub fn get_current_detailed(&mut self) -> Result<CurrentReading, E> {
        let range = Range::from_pin_level(self.range_pin.get()?);
        let resistance = self.rheostat(range).get_res()?;
        let voltage = self.dac.get_voltage()?;
        if resistance == 0.0 {
            return Err(Error::DivisionByZero);
        }
        Ok(CurrentReading {
            current: voltage / resistance,
            voltage,
            resistance,
            range,
        })
    }

    /// The rheostat of a range.
    pub fn rheostat(&mut self, range: Range) -> &mut R {
        match range {
            Range::Low => &mut self.low,
            Range::High => &mut self.high,
        }
    }

    pub fn dac(&mut self) -> &mut D {
        &mut self.dac
    }

    /// Destroy the current source, returning the DAC, low and high rheostats and range pin.
    pub fn destroy(self) -> (D, R, R, P) {
        (self.dac, self.low, self.high, self.range_pin)
    }
}
