//! Conversion between resistance values and potentiometer wiper codes.
//!
//! A digital potentiometer used as a rheostat has a resistance of `code * step + wiper` where
//! `step = fullscale / 2^bits`. All conversions round half to even.

use crate::error::ArgumentError;

/// Typical wiper resistance of the MCP466x family, in Ohm.
pub const TYPICAL_WIPER_RESISTANCE: f64 = 75.0;

/// The resistive range of one potentiometer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResistiveRange {
    /// Nominal end-to-end resistance in Ohm.
    fullscale: f64,
    /// Wiper register width.
    bits: u8,
    /// Resistance of the wiper contact in Ohm.
    wiper_resistance: f64,
}

impl ResistiveRange {
    /// Create a new range.
    ///
    /// `bits` must be between 1 and 15.
    pub const fn new(fullscale: f64, bits: u8, wiper_resistance: f64) -> Self {
        assert!(bits > 0 && bits < 16);
        Self {
            fullscale,
            bits,
            wiper_resistance,
        }
    }

    pub const fn fullscale(&self) -> f64 {
        self.fullscale
    }

    pub const fn bits(&self) -> u8 {
        self.bits
    }

    pub const fn wiper_resistance(&self) -> f64 {
        self.wiper_resistance
    }

    /// Resistance of one LSB.
    pub fn step(&self) -> f64 {
        self.fullscale / self.code_limit() as f64
    }

    /// Number of codes, `2^bits`. Valid codes are strictly below this.
    pub const fn code_limit(&self) -> u32 {
        1 << self.bits
    }

    /// The code in the middle of the range, where the devices are most linear.
    pub const fn mid_code(&self) -> u16 {
        1 << (self.bits - 1)
    }

    /// Largest resistance accepted by [`Self::res2code`].
    ///
    /// This is fullscale, or the resistance of the top code if the wiper resistance pushes it
    /// above fullscale.
    pub fn max_resistance(&self) -> f64 {
        let top = (self.code_limit() - 1) as f64 * self.step() + self.wiper_resistance;
        self.fullscale.max(top)
    }

    /// Calculate the code required for a given resistance.
    ///
    /// Resistances within half a step of fullscale saturate at the top code. Resistances that
    /// would need a negative code (far below the wiper resistance) are rejected.
    pub fn res2code(&self, resistance: f64) -> Result<u16, ArgumentError> {
        let max = self.max_resistance();
        if !(resistance > 0.0 && resistance <= max) {
            return Err(ArgumentError::ResistanceOutOfRange { resistance, max });
        }
        let code = ((resistance - self.wiper_resistance) / self.step()).round_ties_even() as i64;
        if code < 0 {
            return Err(ArgumentError::CodeOutOfRange {
                code,
                limit: self.code_limit(),
            });
        }
        let max_code = self.code_limit() as i64 - 1;
        Ok(code.min(max_code) as u16)
    }

    /// Calculate the resistance corresponding to a given code.
    pub fn code2res(&self, code: u16) -> Result<f64, ArgumentError> {
        if code as u32 >= self.code_limit() {
            return Err(ArgumentError::CodeOutOfRange {
                code: code as i64,
                limit: self.code_limit(),
            });
        }
        Ok(code as f64 * self.step() + self.wiper_resistance)
    }

    /// Distance of `code` from the middle code.
    pub fn distance_from_mid(&self, code: u16) -> u16 {
        code.abs_diff(self.mid_code())
    }
}
