//! Keysight B2900 series source-measure unit, controlled with SCPI.
//!
//! Works over any interface implementing [embedded_io::Read] & [embedded_io::Write]: the raw
//! SCPI socket (port 5025) or a serial link. Commands are newline terminated, and so are the
//! responses to queries.

use core::fmt::Write as _;

use fugit::MicrosDurationU32;
use strum_macros::{EnumIter, IntoStaticStr};

use crate::error::{ArgumentError, Error, Result};

/// Most points the instrument accepts in one sweep.
pub const MAX_SWEEP_POINTS: u16 = 2500;

type Command = heapless::String<96>;

/// Bytes requested from the interface per read.
const READ_CHUNK: usize = 64;

/// Output channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum SmuChannel {
    One = 1,
    Two = 2,
}

/// Quantity sourced by a channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum SourceMode {
    #[strum(serialize = "VOLT")]
    Voltage,
    #[strum(serialize = "CURR")]
    Current,
}

impl SourceMode {
    /// The quantity worth measuring while sourcing this one.
    pub const fn measured(self) -> SourceMode {
        match self {
            SourceMode::Voltage => SourceMode::Current,
            SourceMode::Current => SourceMode::Voltage,
        }
    }
}

/// A linear staircase sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sweep {
    pub mode: SourceMode,
    pub start: f64,
    pub stop: f64,
    /// 1 to [`MAX_SWEEP_POINTS`].
    pub points: u16,
    /// Time between two points.
    pub period: MicrosDurationU32,
}

impl Sweep {
    pub fn validate(&self) -> core::result::Result<(), ArgumentError> {
        if self.points == 0 || self.points > MAX_SWEEP_POINTS {
            return Err(ArgumentError::InvalidSweep("points must be between 1 and 2500"));
        }
        if !self.start.is_finite() || !self.stop.is_finite() {
            return Err(ArgumentError::InvalidSweep("start and stop must be finite"));
        }
        if self.period.ticks() == 0 {
            return Err(ArgumentError::InvalidSweep("period must not be zero"));
        }
        Ok(())
    }
}

/// B2900 SMU.
///
/// `L` is the capacity of the response buffer. A sample takes up to 14 characters, so fetching
/// a full 2500 point sweep needs `L` of 35000 or more.
pub struct Smu<S: embedded_io::Read + embedded_io::Write, const L: usize = 4096> {
    interface: S,
    /// Source mode of the last sweep configured on each channel.
    sweep_modes: [SourceMode; 2],
    /// Bytes received after the end of the last response.
    pending: heapless::Vec<u8, READ_CHUNK>,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> Smu<S, L> {
    pub fn new(interface: S) -> Self {
        Self {
            interface,
            sweep_modes: [SourceMode::Voltage; 2],
            pending: heapless::Vec::new(),
        }
    }

    /// Identification string of the instrument.
    pub fn identify(&mut self) -> Result<heapless::String<L>, S::Error> {
        self.send_str("*IDN?")?;
        let line = self.read_line()?;
        let line = core::str::from_utf8(&line).map_err(|_| Error::InvalidResponse)?;
        let mut idn = heapless::String::new();
        idn.push_str(line.trim()).map_err(|_| Error::BufferError)?;
        Ok(idn)
    }

    /// Reset to the power-on state.
    pub fn reset(&mut self) -> Result<(), S::Error> {
        log::info!("SMU reset");
        self.send_str("*RST")
    }

    /// Integration time of both measurements, in power line cycles.
    pub fn set_nplc(&mut self, channel: SmuChannel, nplc: f64) -> Result<(), S::Error> {
        let ch = channel as u8;
        self.send_fmt(format_args!(":SENS{ch}:CURR:NPLC {nplc}"))?;
        self.send_fmt(format_args!(":SENS{ch}:VOLT:NPLC {nplc}"))
    }

    /// Source a fixed voltage.
    pub fn configure_voltage_source(
        &mut self,
        channel: SmuChannel,
        voltage: f64,
    ) -> Result<(), S::Error> {
        let ch = channel as u8;
        self.send_fmt(format_args!(":SOUR{ch}:FUNC:MODE VOLT"))?;
        self.send_fmt(format_args!(":SOUR{ch}:VOLT:MODE FIX"))?;
        self.send_fmt(format_args!(":SOUR{ch}:VOLT {voltage}"))
    }

    /// Compliance current while sourcing voltage.
    pub fn set_current_limit(&mut self, channel: SmuChannel, current: f64) -> Result<(), S::Error> {
        let ch = channel as u8;
        self.send_fmt(format_args!(":SENS{ch}:CURR:PROT {current}"))
    }

    /// Compliance voltage while sourcing current.
    pub fn set_voltage_limit(&mut self, channel: SmuChannel, voltage: f64) -> Result<(), S::Error> {
        let ch = channel as u8;
        self.send_fmt(format_args!(":SENS{ch}:VOLT:PROT {voltage}"))
    }

    pub fn set_output(&mut self, channel: SmuChannel, on: bool) -> Result<(), S::Error> {
        let ch = channel as u8;
        let state = if on { "ON" } else { "OFF" };
        self.send_fmt(format_args!(":OUTP{ch} {state}"))
    }

    /// Configure a timer triggered sweep. Start it with [`Self::read_array`].
    pub fn configure_sweep(&mut self, channel: SmuChannel, sweep: &Sweep) -> Result<(), S::Error> {
        sweep.validate()?;
        let ch = channel as u8;
        let mode: &'static str = sweep.mode.into();
        let period = sweep.period.to_micros() as f64 / 1e6;
        log::debug!("SMU channel {ch} sweep {sweep:?}");

        self.send_fmt(format_args!(":SOUR{ch}:FUNC:MODE {mode}"))?;
        self.send_fmt(format_args!(":SOUR{ch}:{mode}:MODE SWE"))?;
        self.send_fmt(format_args!(":SOUR{ch}:{mode}:STAR {}", sweep.start))?;
        self.send_fmt(format_args!(":SOUR{ch}:{mode}:STOP {}", sweep.stop))?;
        self.send_fmt(format_args!(":SOUR{ch}:{mode}:POIN {}", sweep.points))?;
        self.send_fmt(format_args!(":TRIG{ch}:SOUR TIM"))?;
        self.send_fmt(format_args!(":TRIG{ch}:TIM {period}"))?;
        self.send_fmt(format_args!(":TRIG{ch}:COUN {}", sweep.points))?;
        self.sweep_modes[channel as usize - 1] = sweep.mode;
        Ok(())
    }

    /// Run the configured sweep and return the measured samples.
    ///
    /// A voltage sweep returns currents and a current sweep returns voltages.
    pub fn read_array<const N: usize>(
        &mut self,
        channel: SmuChannel,
    ) -> Result<heapless::Vec<f64, N>, S::Error> {
        let ch = channel as u8;
        let measured: &'static str = self.sweep_modes[channel as usize - 1].measured().into();
        self.send_fmt(format_args!(":INIT (@{ch})"))?;
        self.send_fmt(format_args!(":FETC:ARR:{measured}? (@{ch})"))?;

        let line = self.read_line()?;
        let line = core::str::from_utf8(&line).map_err(|_| Error::InvalidResponse)?;
        let mut samples = heapless::Vec::new();
        for field in line.trim().split(',') {
            let sample = field.trim().parse().map_err(|_| Error::InvalidResponse)?;
            samples.push(sample).map_err(|_| Error::BufferError)?;
        }
        log::debug!("SMU channel {ch} returned {} samples", samples.len());
        Ok(samples)
    }

    /// Destroy the SMU, returning the interface.
    pub fn destroy(self) -> S {
        self.interface
    }

    fn send_fmt(&mut self, args: core::fmt::Arguments<'_>) -> Result<(), S::Error> {
        let mut command = Command::new();
        command.write_fmt(args).map_err(|_| Error::BufferError)?;
        self.send_str(&command)
    }

    fn send_str(&mut self, command: &str) -> Result<(), S::Error> {
        log::trace!("SMU <- {command}");
        self.interface
            .write_all(command.as_bytes())
            .map_err(Error::Transport)?;
        self.interface.write_all(b"\n").map_err(Error::Transport)?;
        self.interface.flush().map_err(Error::Transport)
    }

    /// Read up to and excluding the next newline.
    ///
    /// Anything received after the newline is kept for the next call.
    fn read_line(&mut self) -> Result<heapless::Vec<u8, L>, S::Error> {
        use embedded_io::Error as _;

        let mut line: heapless::Vec<u8, L> = heapless::Vec::new();
        loop {
            if let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&self.pending[..end])
                    .map_err(|_| Error::BufferError)?;
                self.pending = heapless::Vec::from_slice(&self.pending[end + 1..])
                    .map_err(|_| Error::BufferError)?;
                return Ok(line);
            }
            line.extend_from_slice(&self.pending).map_err(|_| Error::BufferError)?;
            self.pending.clear();

            let mut chunk = [0u8; READ_CHUNK];
            match self.interface.read(&mut chunk) {
                Ok(0) => return Err(Error::Timeout),
                Ok(bytes_read) => {
                    self.pending
                        .extend_from_slice(&chunk[..bytes_read])
                        .map_err(|_| Error::BufferError)?;
                }
                Err(e) if e.kind() == embedded_io::ErrorKind::TimedOut => {
                    return Err(Error::Timeout);
                }
                Err(e) => return Err(Error::Transport(e)),
            }
        }
    }
}
