//! Bus Pirate as a USB to I2C gateway, using its binary I2C mode.
//!
//! Works over any interface implementing [embedded_io::Read] & [embedded_io::Write], normally
//! the Bus Pirate's USB serial port at 115200 baud.
//!
//! Every I2C operation is sent as one "write then read" command, which the Bus Pirate frames
//! with a start and a stop condition. There is no repeated start, so a register read is a write
//! of the register address followed by a separate read.

use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};
use modular_bitfield::prelude::*;
use strum_macros::EnumIter;

use crate::error::{Error, Result};

/// Number of `0x00` bytes to send before giving up on bit-bang mode.
const BBIO_ATTEMPTS: usize = 20;
const BBIO_BANNER: &[u8; 5] = b"BBIO1";
const I2C_BANNER: &[u8; 4] = b"I2C1";
/// Bytes remembered while searching for a banner, the length of the longest banner.
const BANNER_WINDOW: usize = 5;
/// Bytes read per reset attempt before sending the next reset.
const BBIO_SCAN_LIMIT: usize = 32;

const CMD_RESET: u8 = 0x00;
const CMD_I2C_MODE: u8 = 0x02;
const CMD_WRITE_THEN_READ: u8 = 0x08;
const CMD_PERIPHERALS: u8 = 0b0100;
const CMD_SPEED: u8 = 0b0110_0000;

const ACK: u8 = 0x01;
const NACK: u8 = 0x00;

/// I2C clock speed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum Speed {
    Khz5 = 0b00,
    Khz50 = 0b01,
    Khz100 = 0b10,
    Khz400 = 0b11,
}

/// On-board peripherals of the Bus Pirate.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peripherals {
    pub cs: bool,
    pub aux: bool,
    /// Pull-up resistors on SDA/SCL, to the Vpu pin.
    pub pullups: bool,
    /// 3.3V and 5V supplies.
    pub power: bool,
    #[skip(getters)]
    command: B4,
}

/// Bus Pirate in binary I2C mode.
///
/// `L` is the capacity of the frame buffer; the longest write is `L - 5` bytes.
pub struct BusPirate<S: embedded_io::Read + embedded_io::Write, const L: usize = 64> {
    interface: S,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> BusPirate<S, L> {
    /// Wrap an interface already in binary I2C mode. See [`Self::enter_i2c_mode`].
    pub fn new(interface: S) -> Self {
        Self { interface }
    }

    /// Enter bit-bang mode from the user terminal, then binary I2C mode.
    ///
    /// Terminal output still pending on the port is skipped; the banners are searched for in
    /// the received byte stream rather than expected at a fixed position.
    pub fn enter_i2c_mode(&mut self) -> Result<(), S::Error> {
        let mut window = [0u8; BANNER_WINDOW];
        let mut entered = false;
        for attempt in 1..=BBIO_ATTEMPTS {
            self.send(&[CMD_RESET])?;
            if self.scan_for(BBIO_BANNER, &mut window, BBIO_SCAN_LIMIT)? {
                log::debug!("Bus Pirate in bit-bang mode after {attempt} attempts");
                entered = true;
                break;
            }
        }
        if !entered {
            return Err(Error::InvalidResponse);
        }

        // Extra `BBIO1`s answer resets sent while the mode switch was in progress.
        self.send(&[CMD_I2C_MODE])?;
        let mut window = [0u8; BANNER_WINDOW];
        let limit = (BBIO_ATTEMPTS + 1) * BBIO_BANNER.len();
        if !self.scan_for(I2C_BANNER, &mut window, limit)? {
            return Err(Error::InvalidResponse);
        }
        log::info!("Bus Pirate in binary I2C mode");
        Ok(())
    }

    pub fn set_speed(&mut self, speed: Speed) -> Result<(), S::Error> {
        self.command_expect_ack(CMD_SPEED | speed as u8)
    }

    pub fn configure(&mut self, peripherals: Peripherals) -> Result<(), S::Error> {
        let [byte] = peripherals.with_command(CMD_PERIPHERALS).into_bytes();
        self.command_expect_ack(byte)
    }

    /// Write `tx` on the bus, then read `rx.len()` bytes.
    ///
    /// `tx` starts with the address byte, `addr << 1` for a write and `addr << 1 | 1` for a
    /// read. A NACK of any written byte is reported as [`Error::Nack`].
    pub fn write_then_read(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), S::Error> {
        let write_len = u16::try_from(tx.len()).map_err(|_| Error::BufferError)?;
        let read_len = u16::try_from(rx.len()).map_err(|_| Error::BufferError)?;

        let mut frame: heapless::Vec<u8, L> = heapless::Vec::new();
        frame.push(CMD_WRITE_THEN_READ).map_err(|_| Error::BufferError)?;
        frame
            .extend_from_slice(&write_len.to_be_bytes())
            .map_err(|_| Error::BufferError)?;
        frame
            .extend_from_slice(&read_len.to_be_bytes())
            .map_err(|_| Error::BufferError)?;
        frame.extend_from_slice(tx).map_err(|_| Error::BufferError)?;
        log::trace!("Bus Pirate write {tx:02x?}, read {read_len}");
        self.send(&frame)?;

        match self.read_byte()? {
            ACK => {}
            NACK => return Err(Error::Nack),
            _ => return Err(Error::InvalidResponse),
        }
        self.read_exact(rx)
    }

    /// Send one command byte to a device.
    pub fn command(&mut self, address: SevenBitAddress, byte: u8) -> Result<(), S::Error> {
        self.write_then_read(&[address << 1, byte], &mut [])
    }

    /// Destroy the gateway, returning the interface.
    pub fn destroy(self) -> S {
        self.interface
    }

    fn command_expect_ack(&mut self, byte: u8) -> Result<(), S::Error> {
        self.send(&[byte])?;
        match self.read_byte()? {
            ACK => Ok(()),
            _ => Err(Error::InvalidResponse),
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), S::Error> {
        self.interface.write_all(bytes).map_err(Error::Transport)?;
        self.interface.flush().map_err(Error::Transport)
    }

    /// Read bytes until the most recent ones match `banner`.
    ///
    /// `window` keeps the last bytes seen, so a banner split across calls is still found.
    /// Returns `false` on a timeout or after `limit` bytes without a match.
    fn scan_for(
        &mut self,
        banner: &[u8],
        window: &mut [u8; BANNER_WINDOW],
        limit: usize,
    ) -> Result<bool, S::Error> {
        for _ in 0..limit {
            let byte = match self.read_byte() {
                Ok(byte) => byte,
                Err(Error::Timeout) => return Ok(false),
                Err(e) => return Err(e),
            };
            window.copy_within(1.., 0);
            window[BANNER_WINDOW - 1] = byte;
            if window.ends_with(banner) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn read_byte(&mut self) -> Result<u8, S::Error> {
        let mut buff = [0u8; 1];
        self.read_exact(&mut buff)?;
        Ok(buff[0])
    }

    fn read_exact(&mut self, buff: &mut [u8]) -> Result<(), S::Error> {
        use embedded_io::Error as _;

        let mut filled = 0;
        while filled < buff.len() {
            match self.interface.read(&mut buff[filled..]) {
                Ok(0) => return Err(Error::Timeout),
                Ok(bytes_read) => filled += bytes_read,
                Err(e) if e.kind() == embedded_io::ErrorKind::TimedOut => {
                    return Err(Error::Timeout);
                }
                Err(e) => return Err(Error::Transport(e)),
            }
        }
        Ok(())
    }
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> ErrorType for BusPirate<S, L> {
    type Error = Error<S::Error>;
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> I2c for BusPirate<S, L> {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> core::result::Result<(), Self::Error> {
        for operation in operations {
            let mut tx: heapless::Vec<u8, L> = heapless::Vec::new();
            match operation {
                Operation::Write(bytes) => {
                    tx.push(address << 1).map_err(|_| Error::BufferError)?;
                    tx.extend_from_slice(bytes).map_err(|_| Error::BufferError)?;
                    self.write_then_read(&tx, &mut [])?;
                }
                Operation::Read(buff) => {
                    tx.push((address << 1) | 1).map_err(|_| Error::BufferError)?;
                    self.write_then_read(&tx, buff)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_serial::{MockSerial, MockSerialError};

    fn gateway(response: &[u8]) -> BusPirate<MockSerial> {
        let mut serial = MockSerial::new();
        serial.set_read_data(response).unwrap();
        BusPirate::new(serial)
    }

    #[test]
    fn enter_i2c_mode() {
        let mut bp = gateway(b"BBIO1I2C1");
        bp.enter_i2c_mode().unwrap();
        assert_eq!(bp.destroy().written_data(), &[0x00, 0x02]);
    }

    #[test]
    fn enter_i2c_mode_skips_terminal_output() {
        // A prompt that isn't a multiple of the banner length.
        let mut bp = gateway(b"HiZ>\r\nBBIO1I2C1");
        bp.enter_i2c_mode().unwrap();
        assert_eq!(bp.destroy().written_data(), &[0x00, 0x02]);
    }

    #[test]
    fn enter_i2c_mode_keeps_resetting_through_long_output() {
        let mut bp = gateway(b"Bus Pirate v3.b\r\nFirmware v5.10\r\nHiZ>\r\nBBIO1I2C1");
        bp.enter_i2c_mode().unwrap();
        assert_eq!(bp.destroy().written_data(), &[0x00, 0x00, 0x02]);
    }

    #[test]
    fn enter_i2c_mode_skips_repeated_bit_bang_banners() {
        let mut response = b"HiZ>\r\n".to_vec();
        for _ in 0..19 {
            response.extend_from_slice(BBIO_BANNER);
        }
        response.extend_from_slice(I2C_BANNER);

        let mut bp = gateway(&response);
        bp.enter_i2c_mode().unwrap();
        assert_eq!(bp.destroy().written_data(), &[0x00, 0x02]);
    }

    #[test]
    fn enter_i2c_mode_gives_up_after_twenty_attempts() {
        let mut bp: BusPirate<MockSerial> = BusPirate::new(MockSerial::with_response(&[]));
        assert!(matches!(bp.enter_i2c_mode(), Err(Error::InvalidResponse)));
        assert_eq!(bp.destroy().written_data(), &[0x00; BBIO_ATTEMPTS]);
    }

    #[test]
    fn serial_errors_are_passed_through() {
        let mut serial = MockSerial::new();
        serial.set_write_error(true);
        let mut bp: BusPirate<MockSerial> = BusPirate::new(serial);
        assert!(matches!(
            bp.set_speed(Speed::Khz100),
            Err(Error::Transport(MockSerialError::SimulatedError))
        ));
    }

    #[test]
    fn enter_i2c_mode_rejects_wrong_banner() {
        let mut bp: BusPirate<MockSerial> = BusPirate::new(MockSerial::with_response(b"BBIO1SPI1"));
        assert!(matches!(bp.enter_i2c_mode(), Err(Error::InvalidResponse)));
    }

    #[test]
    fn speed_and_peripherals() {
        let mut bp = gateway(&[ACK, ACK]);
        bp.set_speed(Speed::Khz400).unwrap();
        bp.configure(Peripherals::new().with_power(true).with_pullups(true))
            .unwrap();
        assert_eq!(bp.destroy().written_data(), &[0x63, 0x4c]);
    }

    #[test]
    fn write_then_read_frame() {
        let mut bp = gateway(&[ACK, 0xab, 0xcd]);
        let mut rx = [0u8; 2];
        bp.write_then_read(&[0x59], &mut rx).unwrap();
        assert_eq!(rx, [0xab, 0xcd]);
        assert_eq!(
            bp.destroy().written_data(),
            &[0x08, 0x00, 0x01, 0x00, 0x02, 0x59]
        );
    }

    #[test]
    fn nack_is_reported() {
        let mut bp = gateway(&[NACK]);
        assert!(matches!(bp.command(0x2c, 0x0c), Err(Error::Nack)));
        assert_eq!(
            bp.destroy().written_data(),
            &[0x08, 0x00, 0x02, 0x00, 0x00, 0x58, 0x0c]
        );
    }

    #[test]
    fn missing_ack_times_out() {
        let mut bp: BusPirate<MockSerial> = BusPirate::new(MockSerial::with_response(&[]));
        assert!(matches!(bp.set_speed(Speed::Khz100), Err(Error::Timeout)));
    }

    #[test]
    fn write_read_is_two_framed_operations() {
        let mut bp = gateway(&[ACK, ACK, 0x12, 0x34]);
        let mut rx = [0u8; 2];
        bp.write_read(0x1f, &[0x70], &mut rx).unwrap();
        assert_eq!(rx, [0x12, 0x34]);
        assert_eq!(
            bp.destroy().written_data(),
            &[
                0x08, 0x00, 0x02, 0x00, 0x00, 0x3e, 0x70, // write register address
                0x08, 0x00, 0x01, 0x00, 0x02, 0x3f, // read two bytes
            ]
        );
    }

    #[test]
    fn drives_a_chip_driver() {
        use crate::mcp23008::Mcp23008;

        let mut gpio = Mcp23008::new(gateway(&[ACK]), false, false, false);
        gpio.set_gpio(0x40).unwrap();
        assert_eq!(
            gpio.destroy().destroy().written_data(),
            &[0x08, 0x00, 0x03, 0x00, 0x00, 0x40, 0x09, 0x40]
        );
    }

    #[test]
    fn oversized_writes_are_rejected() {
        let mut bp: BusPirate<MockSerial, 8> = BusPirate::new(MockSerial::new());
        assert!(matches!(
            bp.write_then_read(&[0u8; 4], &mut []),
            Err(Error::BufferError)
        ));
        assert!(bp.destroy().written_data().is_empty());
    }
}
