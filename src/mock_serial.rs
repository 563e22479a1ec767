//! We use this mocking module in unit tests to emulate a serial link or a socket.
//!
//! Replies are queued as segments. A read only ever returns bytes from the front segment, and
//! reading past its end (or from an empty queue) times out, the way a real link goes quiet once
//! the instrument has finished talking.

/// Our mock type used to emulate a serial port.
pub struct MockSerial {
    /// Buffer to store data written to the mock serial port
    write_buffer: heapless::Vec<u8, 512>,
    /// Pre-configured reply segments, one per expected instrument answer
    replies: heapless::Deque<heapless::Vec<u8, 64>, 16>,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
}

#[derive(Debug)]
pub enum MockSerialError {
    /// Simulated timeout error
    Timeout,
    /// Simulated buffer overflow
    BufferOverflow,
    /// Generic simulated error for testing
    SimulatedError,
}

impl core::fmt::Display for MockSerialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl core::error::Error for MockSerialError {}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }

        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }

        let Some(segment) = self.replies.front_mut() else {
            return Err(MockSerialError::Timeout);
        };
        if segment.is_empty() {
            self.replies.pop_front();
            return Err(MockSerialError::Timeout);
        }

        let bytes_to_read = core::cmp::min(buf.len(), segment.len());
        buf[..bytes_to_read].copy_from_slice(&segment[..bytes_to_read]);
        let rest: heapless::Vec<u8, 64> =
            heapless::Vec::from_slice(&segment[bytes_to_read..]).unwrap();
        *segment = rest;
        if segment.is_empty() {
            self.replies.pop_front();
        }

        Ok(bytes_to_read)
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            replies: heapless::Deque::new(),
            should_error_on_write: false,
            should_error_on_read: false,
        }
    }

    /// Queue one reply. An empty reply makes the next read time out.
    pub fn push_reply(&mut self, data: &[u8]) {
        let segment = heapless::Vec::from_slice(data).unwrap();
        self.replies.push_back(segment).unwrap();
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// The written data as text, for asserting on ASCII protocols.
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.write_buffer).into_owned()
    }

    /// Clear the write buffer
    pub fn clear_written_data(&mut self) {
        self.write_buffer.clear();
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, Write};

    #[test]
    fn test_write_multiple_times() {
        let mut mock = MockSerial::new();
        mock.write(b"Hello, ").unwrap();
        mock.write(b"World!").unwrap();
        assert_eq!(mock.written_data(), b"Hello, World!");
    }

    #[test]
    fn test_read_stays_within_segment() {
        let mut mock = MockSerial::new();
        mock.push_reply(b"first\n");
        mock.push_reply(b"second\n");

        let mut buffer = [0u8; 32];
        let n = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"first\n");
        let n = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"second\n");
        assert!(matches!(
            mock.read(&mut buffer),
            Err(MockSerialError::Timeout)
        ));
    }

    #[test]
    fn test_read_partial_segment() {
        let mut mock = MockSerial::new();
        mock.push_reply(b"Hello World");

        let mut buffer1 = [0u8; 5];
        let mut buffer2 = [0u8; 8];
        assert_eq!(mock.read(&mut buffer1).unwrap(), 5);
        assert_eq!(mock.read(&mut buffer2).unwrap(), 6);
        assert_eq!(&buffer1, b"Hello");
        assert_eq!(&buffer2[..6], b" World");
    }

    #[test]
    fn test_empty_segment_times_out_once() {
        let mut mock = MockSerial::new();
        mock.push_reply(b"");
        mock.push_reply(b"ok");

        let mut buffer = [0u8; 4];
        assert!(matches!(
            mock.read(&mut buffer),
            Err(MockSerialError::Timeout)
        ));
        assert_eq!(mock.read(&mut buffer).unwrap(), 2);
    }

    #[test]
    fn test_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert!(mock.write(b"test").is_err());
        assert!(mock.flush().is_err());
        assert!(mock.written_data().is_empty());
        mock.set_write_error(false);
        assert!(mock.write(b"test").is_ok());

        mock.push_reply(b"data");
        mock.set_read_error(true);
        let mut buffer = [0u8; 10];
        assert!(matches!(
            mock.read(&mut buffer),
            Err(MockSerialError::SimulatedError)
        ));
        mock.set_read_error(false);
        assert_eq!(mock.read(&mut buffer).unwrap(), 4);
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            MockSerialError::Timeout.kind(),
            embedded_io::ErrorKind::TimedOut
        ));
        assert!(matches!(
            MockSerialError::BufferOverflow.kind(),
            embedded_io::ErrorKind::OutOfMemory
        ));
        assert!(matches!(
            MockSerialError::SimulatedError.kind(),
            embedded_io::ErrorKind::Other
        ));
    }

    #[test]
    fn test_clear_written_data() {
        let mut mock = MockSerial::new();
        mock.write(b"test data").unwrap();
        mock.clear_written_data();
        assert!(mock.written_data().is_empty());
        assert_eq!(mock.written_text(), "");
    }
}
