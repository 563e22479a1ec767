//! Addressed access to a multi-drop GPIB bus through a Prologix (or AR488) compatible
//! USB/serial adapter.
//!
//! Every exchange selects the target address (`++addr`), sends the escaped payload and, for
//! queries, asks the adapter to read back from the instrument (`++read eoi`). Exchanges on one
//! link must never interleave, so all operations take `&mut self`; use [SharedBus] when several
//! devices live on the same adapter.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, warn};

use crate::error::{Error, Result};

/// Highest primary address on a GPIB bus.
pub const MAX_ADDRESS: u8 = 30;

const ESC: u8 = 0x1B;

/// Link settings for the adapter's serial port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    pub baud_rate: u32,
    /// How long a single read may wait for the instrument before the reply counts as absent.
    pub read_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            read_timeout: Duration::from_millis(250),
        }
    }
}

/// How the instrument's answer to a query is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFormat {
    /// ASCII text terminated by LF. CR/LF are stripped.
    Line,
    /// Raw bytes. Reading stops after this many bytes or when the link goes quiet.
    Binary(usize),
}

/// A reply read back from an instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Binary(Vec<u8>),
}

impl Reply {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text),
            Reply::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Reply::Text(text) => text.as_bytes(),
            Reply::Binary(bytes) => bytes,
        }
    }
}

/// Prefix adapter control characters (CR, LF, ESC and `+`) with ESC so they reach the
/// instrument as data.
pub fn escape_payload(payload: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(payload.len());
    for &byte in payload {
        if matches!(byte, b'\r' | b'\n' | ESC | b'+') {
            escaped.push(ESC);
        }
        escaped.push(byte);
    }
    escaped
}

/// One physical adapter link. `L` bounds the size of a single reply.
pub struct AddressedBus<S: embedded_io::Read + embedded_io::Write, const L: usize = 256> {
    interface: S,
    /// Address the adapter currently talks to, if known.
    selected: Option<u8>,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> AddressedBus<S, L> {
    pub fn new(interface: S) -> Self {
        Self {
            interface,
            selected: None,
        }
    }

    /// Put the adapter in controller mode with manual read-back and no added terminators.
    pub fn init(&mut self) -> Result<(), S::Error> {
        debug!("Initialising GPIB adapter");
        for line in ["++mode 1", "++auto 0", "++eoi 1", "++eos 3"] {
            self.send_line(line.as_bytes())?;
        }
        Ok(())
    }

    /// Send a command to a device without expecting a reply.
    pub fn write(&mut self, address: u8, command: &str) -> Result<(), S::Error> {
        self.select(address)?;
        debug!("[{}] write {:?}", address, command);
        self.send_payload(command.as_bytes())
    }

    /// Send a command and read back the reply.
    ///
    /// Returns `Ok(None)` if the instrument did not answer within the link's read timeout.
    pub fn query(
        &mut self,
        address: u8,
        command: &str,
        format: ReplyFormat,
    ) -> Result<Option<Reply>, S::Error> {
        self.select(address)?;
        debug!("[{}] query {:?}", address, command);
        self.send_payload(command.as_bytes())?;
        self.send_line(b"++read eoi")?;

        let raw = self.read_reply(format)?;
        if raw.is_empty() {
            warn!("[{}] no reply to {:?}", address, command);
            return Ok(None);
        }

        let reply = match format {
            ReplyFormat::Line => {
                let text = core::str::from_utf8(&raw).map_err(|_| Error::InvalidResponse)?;
                Reply::Text(text.trim_end_matches(['\r', '\n']).to_owned())
            }
            ReplyFormat::Binary(_) => Reply::Binary(raw.to_vec()),
        };
        debug!("[{}] reply {:?}", address, reply);
        Ok(Some(reply))
    }

    /// Selected device clear. Resets the instrument's interface, not its measurement setup.
    pub fn clear(&mut self, address: u8) -> Result<(), S::Error> {
        self.select(address)?;
        debug!("[{}] device clear", address);
        self.send_line(b"++clr")
    }

    /// Give the link back, e.g. to close the port.
    pub fn into_inner(self) -> S {
        self.interface
    }

    fn select(&mut self, address: u8) -> Result<(), S::Error> {
        if address > MAX_ADDRESS {
            return Err(crate::error::ValidationError::Address(address).into());
        }
        if self.selected == Some(address) {
            return Ok(());
        }
        let line = format!("++addr {}", address);
        self.send_line(line.as_bytes())?;
        self.selected = Some(address);
        Ok(())
    }

    fn send_payload(&mut self, payload: &[u8]) -> Result<(), S::Error> {
        let escaped = escape_payload(payload);
        self.send_line(&escaped)
    }

    fn send_line(&mut self, line: &[u8]) -> Result<(), S::Error> {
        let result = self
            .interface
            .write_all(line)
            .and_then(|_| self.interface.write_all(b"\n"))
            .and_then(|_| self.interface.flush());
        result.map_err(|e| {
            // We can no longer be sure which address the adapter is on.
            self.selected = None;
            Error::Transport(e)
        })
    }

    fn read_reply(&mut self, format: ReplyFormat) -> Result<heapless::Vec<u8, L>, S::Error> {
        let mut buff: heapless::Vec<u8, L> = heapless::Vec::new();
        let mut temp_buf = [0u8; 8];
        loop {
            let wanted = match format {
                // One byte at a time so nothing past the LF is consumed.
                ReplyFormat::Line => 1,
                ReplyFormat::Binary(len) if buff.len() >= len => break,
                ReplyFormat::Binary(len) => core::cmp::min(temp_buf.len(), len - buff.len()),
            };

            match self.interface.read(&mut temp_buf[..wanted]) {
                Ok(0) => break,
                Ok(bytes_read) => {
                    let chunk = &temp_buf[..bytes_read];
                    if buff.extend_from_slice(chunk).is_err() {
                        warn!("Reply longer than {} bytes, discarding it", L);
                        let ended = format == ReplyFormat::Line && chunk.last() == Some(&b'\n');
                        if !ended {
                            self.discard_rest(format, buff.len() + bytes_read);
                        }
                        return Err(Error::BufferError);
                    }
                    if format == ReplyFormat::Line && buff.last() == Some(&b'\n') {
                        break;
                    }
                }
                Err(e) => {
                    use embedded_io::Error as _;
                    if matches!(e.kind(), embedded_io::ErrorKind::TimedOut) {
                        break;
                    }
                    self.selected = None;
                    return Err(Error::Transport(e));
                }
            }
        }
        Ok(buff)
    }

    /// Read and drop what is left of a reply, so the next exchange starts on a fresh one.
    /// `consumed` is the number of reply bytes already read.
    fn discard_rest(&mut self, format: ReplyFormat, mut consumed: usize) {
        let mut byte = [0u8; 1];
        loop {
            if let ReplyFormat::Binary(len) = format {
                if consumed >= len {
                    return;
                }
            }
            match self.interface.read(&mut byte) {
                Ok(0) => return,
                Ok(_) => {
                    consumed += 1;
                    if format == ReplyFormat::Line && byte[0] == b'\n' {
                        return;
                    }
                }
                Err(e) => {
                    use embedded_io::Error as _;
                    if !matches!(e.kind(), embedded_io::ErrorKind::TimedOut) {
                        self.selected = None;
                    }
                    return;
                }
            }
        }
    }
}

/// A bus shared by several devices. Each exchange holds the lock from address selection to
/// the end of the read.
pub struct SharedBus<S: embedded_io::Read + embedded_io::Write, const L: usize = 256>(
    Arc<Mutex<AddressedBus<S, L>>>,
);

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> Clone for SharedBus<S, L> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> SharedBus<S, L> {
    pub fn new(bus: AddressedBus<S, L>) -> Self {
        Self(Arc::new(Mutex::new(bus)))
    }

    /// Lock the bus for one or more exchanges.
    pub fn lock(&self) -> MutexGuard<'_, AddressedBus<S, L>> {
        // Exchanges don't span lock holders, so a poisoned bus is still consistent.
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self, address: u8, command: &str) -> Result<(), S::Error> {
        self.lock().write(address, command)
    }

    pub fn query(
        &self,
        address: u8,
        command: &str,
        format: ReplyFormat,
    ) -> Result<Option<Reply>, S::Error> {
        self.lock().query(address, command, format)
    }

    pub fn clear(&self, address: u8) -> Result<(), S::Error> {
        self.lock().clear(address)
    }
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> From<AddressedBus<S, L>>
    for SharedBus<S, L>
{
    fn from(bus: AddressedBus<S, L>) -> Self {
        Self::new(bus)
    }
}

/// An adapter on a local serial port.
#[cfg(feature = "serial")]
pub type SerialBus = AddressedBus<crate::io::StdIo<Box<dyn serialport::SerialPort>>>;

/// Open an adapter on a local serial port. Call [AddressedBus::init] before first use.
#[cfg(feature = "serial")]
pub fn open_serial(
    path: &str,
    config: &BusConfig,
) -> core::result::Result<SerialBus, serialport::Error> {
    let port = serialport::new(path, config.baud_rate)
        .timeout(config.read_timeout)
        .open()?;
    Ok(AddressedBus::new(crate::io::StdIo(port)))
}

#[cfg(test)]
impl<const L: usize> AddressedBus<crate::mock_serial::MockSerial, L> {
    pub(crate) fn mock(&self) -> &crate::mock_serial::MockSerial {
        &self.interface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_serial::MockSerial;

    fn bus_with(replies: &[&[u8]]) -> AddressedBus<MockSerial> {
        let mut mock = MockSerial::new();
        for reply in replies {
            mock.push_reply(reply);
        }
        AddressedBus::new(mock)
    }

    #[test]
    fn test_escape_payload() {
        assert_eq!(escape_payload(b"FNC VDC"), b"FNC VDC".to_vec());
        assert_eq!(
            escape_payload(b"a+b\r\n\x1b"),
            b"a\x1b+b\x1b\r\x1b\n\x1b\x1b".to_vec()
        );
    }

    #[test]
    fn test_init_sequence() {
        let mut bus = bus_with(&[]);
        bus.init().unwrap();
        assert_eq!(
            bus.interface.written_text(),
            "++mode 1\n++auto 0\n++eoi 1\n++eos 3\n"
        );
    }

    #[test]
    fn test_write_selects_address_once() {
        let mut bus = bus_with(&[]);
        bus.write(22, "FNC VDC").unwrap();
        bus.write(22, "TRG I").unwrap();
        bus.write(23, "F1").unwrap();
        assert_eq!(
            bus.interface.written_text(),
            "++addr 22\nFNC VDC\nTRG I\n++addr 23\nF1\n"
        );
    }

    #[test]
    fn test_write_escapes_payload() {
        let mut bus = bus_with(&[]);
        bus.write(5, "RNG +3").unwrap();
        assert_eq!(bus.interface.written_data(), b"++addr 5\nRNG \x1b+3\n");
    }

    #[test]
    fn test_query_line() {
        let mut bus = bus_with(&[b"VDC   1.2345\r\n"]);
        let reply = bus.query(22, " ", ReplyFormat::Line).unwrap();
        assert_eq!(reply, Some(Reply::Text("VDC   1.2345".to_owned())));
        assert_eq!(bus.interface.written_text(), "++addr 22\n \n++read eoi\n");
    }

    #[test]
    fn test_query_binary() {
        let mut bus = bus_with(&[&[0x21, 0x07, 0x81, 0x00, 0x2A]]);
        let reply = bus.query(22, "B", ReplyFormat::Binary(5)).unwrap();
        assert_eq!(reply, Some(Reply::Binary(vec![0x21, 0x07, 0x81, 0x00, 0x2A])));
    }

    #[test]
    fn test_query_binary_short_reply_is_returned_as_is() {
        let mut bus = bus_with(&[&[0x21, 0x07]]);
        let reply = bus.query(22, "B", ReplyFormat::Binary(5)).unwrap();
        assert_eq!(reply, Some(Reply::Binary(vec![0x21, 0x07])));
    }

    #[test]
    fn test_timeout_is_absent_and_bus_stays_usable() {
        let mut bus = bus_with(&[b"", b"1\n"]);
        assert_eq!(bus.query(22, "S", ReplyFormat::Line).unwrap(), None);
        let reply = bus.query(22, "S", ReplyFormat::Line).unwrap();
        assert_eq!(reply, Some(Reply::Text("1".to_owned())));
    }

    #[test]
    fn test_line_read_leaves_next_reply_alone() {
        let mut bus = bus_with(&[b"1\n0\n"]);
        let first = bus.query(22, "S", ReplyFormat::Line).unwrap();
        let second = bus.query(22, "S", ReplyFormat::Line).unwrap();
        assert_eq!(first, Some(Reply::Text("1".to_owned())));
        assert_eq!(second, Some(Reply::Text("0".to_owned())));
    }

    #[test]
    fn test_read_error_is_reported() {
        let mut bus = bus_with(&[b"1\n"]);
        bus.interface.set_read_error(true);
        let result = bus.query(22, "S", ReplyFormat::Line);
        assert!(matches!(result, Err(Error::Transport(_))));
        // The address has to be re-sent after a fault.
        bus.interface.set_read_error(false);
        bus.interface.clear_written_data();
        bus.query(22, "S", ReplyFormat::Line).unwrap();
        assert!(bus.interface.written_text().starts_with("++addr 22\n"));
    }

    #[test]
    fn test_write_error_is_reported() {
        let mut bus = bus_with(&[]);
        bus.interface.set_write_error(true);
        assert!(matches!(bus.write(22, "FNC VDC"), Err(Error::Transport(_))));
    }

    #[test]
    fn test_invalid_address_never_reaches_the_wire() {
        let mut bus = bus_with(&[]);
        let result = bus.write(31, "FNC VDC");
        assert!(matches!(
            result,
            Err(Error::InvalidArgument(crate::error::ValidationError::Address(31)))
        ));
        assert!(bus.interface.written_data().is_empty());
    }

    #[test]
    fn test_reply_overflow() {
        let mut mock = MockSerial::new();
        mock.push_reply(b"0123456789\n");
        let mut bus: AddressedBus<MockSerial, 4> = AddressedBus::new(mock);
        assert!(matches!(
            bus.query(22, " ", ReplyFormat::Line),
            Err(Error::BufferError)
        ));
    }

    #[test]
    fn test_overflowing_line_is_discarded() {
        let mut mock = MockSerial::new();
        mock.push_reply(b"0123456789\n");
        mock.push_reply(b"1\n");
        let mut bus: AddressedBus<MockSerial, 4> = AddressedBus::new(mock);
        assert!(matches!(
            bus.query(22, " ", ReplyFormat::Line),
            Err(Error::BufferError)
        ));
        let reply = bus.query(22, "S", ReplyFormat::Line).unwrap();
        assert_eq!(reply, Some(Reply::Text("1".to_owned())));
    }

    #[test]
    fn test_overflow_on_line_end_keeps_next_reply() {
        let mut mock = MockSerial::new();
        mock.push_reply(b"0123\n");
        mock.push_reply(b"1\n");
        let mut bus: AddressedBus<MockSerial, 4> = AddressedBus::new(mock);
        assert!(matches!(
            bus.query(22, " ", ReplyFormat::Line),
            Err(Error::BufferError)
        ));
        let reply = bus.query(22, "S", ReplyFormat::Line).unwrap();
        assert_eq!(reply, Some(Reply::Text("1".to_owned())));
    }

    #[test]
    fn test_overflowing_binary_is_discarded() {
        let mut mock = MockSerial::new();
        mock.push_reply(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        mock.push_reply(&[0xAA, 0xBB]);
        let mut bus: AddressedBus<MockSerial, 4> = AddressedBus::new(mock);
        assert!(matches!(
            bus.query(22, "B", ReplyFormat::Binary(10)),
            Err(Error::BufferError)
        ));
        let reply = bus.query(22, "B", ReplyFormat::Binary(2)).unwrap();
        assert_eq!(reply, Some(Reply::Binary(vec![0xAA, 0xBB])));
    }

    #[test]
    fn test_clear() {
        let mut bus = bus_with(&[]);
        bus.clear(9).unwrap();
        assert_eq!(bus.interface.written_text(), "++addr 9\n++clr\n");
    }

    #[test]
    fn test_shared_bus_serialises_devices() {
        let shared = SharedBus::new(bus_with(&[b"1\n"]));
        let other = shared.clone();
        shared.write(22, "FNC VDC").unwrap();
        other.write(23, "F1").unwrap();
        let reply = shared.query(22, "S", ReplyFormat::Line).unwrap();
        assert_eq!(reply, Some(Reply::Text("1".to_owned())));
        assert_eq!(
            shared.lock().interface.written_text(),
            "++addr 22\nFNC VDC\n++addr 23\nF1\n++addr 22\nS\n++read eoi\n"
        );
    }

    #[test]
    fn test_shared_bus_exchanges_do_not_interleave() {
        const PER_THREAD: usize = 8;
        let mut mock = MockSerial::new();
        for _ in 0..2 * PER_THREAD {
            mock.push_reply(b"1\n");
        }
        let shared = SharedBus::new(AddressedBus::<MockSerial>::new(mock));

        std::thread::scope(|scope| {
            for address in [22u8, 23] {
                let bus = shared.clone();
                scope.spawn(move || {
                    let command = format!("Q{}", address);
                    for _ in 0..PER_THREAD {
                        let reply = bus.query(address, &command, ReplyFormat::Line).unwrap();
                        assert_eq!(reply, Some(Reply::Text("1".to_owned())));
                    }
                });
            }
        });

        // Every payload line has to follow the selection of its own device.
        let written = shared.lock().mock().written_text();
        let mut selected = None;
        let mut payloads = 0;
        for line in written.lines() {
            if let Some(address) = line.strip_prefix("++addr ") {
                selected = Some(address.to_owned());
            } else if let Some(address) = line.strip_prefix('Q') {
                assert_eq!(selected.as_deref(), Some(address), "{}", written);
                payloads += 1;
            }
        }
        assert_eq!(payloads, 2 * PER_THREAD);
    }
}
