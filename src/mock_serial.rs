//! A scripted serial link for the gateway and instrument tests.
//!
//! Bytes written are captured for inspection. Reads are served from a canned response; once
//! it is used up the port either reports `WouldBlock` or, like a real port with a timeout,
//! `Timeout`.

const CAPACITY: usize = 512;

pub struct MockSerial {
    sent: heapless::Vec<u8, CAPACITY>,
    response: heapless::Vec<u8, CAPACITY>,
    cursor: usize,
    exhausted: MockSerialError,
    fail_writes: bool,
    fail_reads: bool,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSerialError {
    /// Response used up on a port with a read timeout
    #[error("Read timed out")]
    Timeout,
    /// Response used up on a non-blocking port
    #[error("No data available")]
    WouldBlock,
    /// More bytes than the capture buffer holds
    #[error("Mock buffer overflow")]
    BufferOverflow,
    /// Injected with `set_write_error` / `set_read_error`
    #[error("Simulated serial error")]
    SimulatedError,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        use embedded_io::ErrorKind;
        match self {
            MockSerialError::Timeout => ErrorKind::TimedOut,
            MockSerialError::BufferOverflow => ErrorKind::OutOfMemory,
            MockSerialError::WouldBlock | MockSerialError::SimulatedError => ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, MockSerialError> {
        if self.fail_writes {
            return Err(MockSerialError::SimulatedError);
        }
        self.sent
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), MockSerialError> {
        match self.fail_writes {
            true => Err(MockSerialError::SimulatedError),
            false => Ok(()),
        }
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MockSerialError> {
        if self.fail_reads {
            return Err(MockSerialError::SimulatedError);
        }
        let pending = &self.response[self.cursor..];
        if pending.is_empty() {
            return Err(self.exhausted);
        }
        let n = buf.len().min(pending.len());
        buf[..n].copy_from_slice(&pending[..n]);
        self.cursor += n;
        Ok(n)
    }
}

impl MockSerial {
    /// A port with nothing to read, reporting `WouldBlock`.
    pub fn new() -> Self {
        Self {
            sent: heapless::Vec::new(),
            response: heapless::Vec::new(),
            cursor: 0,
            exhausted: MockSerialError::WouldBlock,
            fail_writes: false,
            fail_reads: false,
        }
    }

    /// A port answering with `data`, then timing out.
    pub fn with_response(data: &[u8]) -> Self {
        let mut mock = Self::new();
        mock.exhausted = MockSerialError::Timeout;
        mock.response = heapless::Vec::from_slice(data)
            .unwrap_or_else(|_| panic!("response longer than {CAPACITY} bytes"));
        mock
    }

    /// Replace the canned response.
    pub fn set_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.cursor = 0;
        self.response =
            heapless::Vec::from_slice(data).map_err(|_| MockSerialError::BufferOverflow)?;
        Ok(())
    }

    /// Everything written so far.
    pub fn written_data(&self) -> &[u8] {
        &self.sent
    }

    pub fn set_write_error(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn set_read_error(&mut self, fail: bool) {
        self.fail_reads = fail;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, ErrorKind, Read, Write};

    #[test]
    fn captures_writes() {
        let mut port = MockSerial::new();
        port.write_all(b"*RST\n").unwrap();
        port.write_all(&[0x08, 0x00]).unwrap();
        assert_eq!(port.written_data(), b"*RST\n\x08\x00");

        assert_eq!(port.write(&[0u8; 600]), Err(MockSerialError::BufferOverflow));
        assert_eq!(port.written_data().len(), 7);
    }

    #[test]
    fn serves_the_response_in_chunks() {
        let mut port = MockSerial::new();
        port.set_read_data(b"BBIO1I2C1").unwrap();

        let mut head = [0u8; 5];
        let mut tail = [0u8; 8];
        assert_eq!(port.read(&mut head), Ok(5));
        assert_eq!(port.read(&mut tail), Ok(4));
        assert_eq!(&head, b"BBIO1");
        assert_eq!(&tail[..4], b"I2C1");
        assert_eq!(port.read(&mut tail), Err(MockSerialError::WouldBlock));
    }

    #[test]
    fn scripted_port_times_out() {
        let mut port = MockSerial::with_response(&[0x01]);
        let mut buffer = [0u8; 4];
        assert_eq!(port.read(&mut buffer), Ok(1));
        let err = port.read(&mut buffer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
        assert_eq!(err.to_string(), "Read timed out");
    }

    #[test]
    fn injected_failures() {
        let mut port = MockSerial::new();
        port.set_read_data(b"data").unwrap();
        port.set_write_error(true);
        port.set_read_error(true);
        let mut buffer = [0u8; 4];
        assert_eq!(port.write(b"x"), Err(MockSerialError::SimulatedError));
        assert_eq!(port.flush(), Err(MockSerialError::SimulatedError));
        assert_eq!(port.read(&mut buffer), Err(MockSerialError::SimulatedError));

        port.set_write_error(false);
        port.set_read_error(false);
        assert_eq!(port.write(b"x"), Ok(1));
        assert_eq!(port.read(&mut buffer), Ok(4));
    }
}
