//! Line based SCPI over TCP, one connection per exchange.
//!
//! The instrument greets every new connection with a banner which is read and discarded before
//! the command goes out. Its answer is read in a single receive of up to [REPLY_BUFFER] bytes.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use embedded_io::{Read, Write};
use log::debug;

use crate::error::{Error, Result};
use crate::io::{IoError, StdIo};
use crate::poll::PollConfig;

/// Upper bound of a single receive.
pub const REPLY_BUFFER: usize = 1024;

/// Error type of the streams a [Connector] opens.
pub type StreamError<C> = <<C as Connector>::Stream as embedded_io::ErrorType>::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScpiConfig {
    /// TCP port. These instruments listen on 5024 rather than the usual 5025.
    pub port: u16,
    /// Applied to connecting, sending and receiving.
    pub timeout: Duration,
    /// Used when waiting for a triggered reading.
    pub poll: PollConfig,
}

impl Default for ScpiConfig {
    fn default() -> Self {
        Self {
            port: 5024,
            timeout: Duration::from_secs(10),
            poll: PollConfig::default(),
        }
    }
}

/// Opens a fresh link to the instrument for every exchange.
pub trait Connector {
    type Stream: embedded_io::Read + embedded_io::Write;

    fn connect(
        &self,
    ) -> core::result::Result<Self::Stream, <Self::Stream as embedded_io::ErrorType>::Error>;

    /// Used in log lines.
    fn peer(&self) -> String;
}

pub struct TcpConnector {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, config: &ScpiConfig) -> Self {
        Self {
            host: host.into(),
            port: config.port,
            timeout: config.timeout,
        }
    }
}

impl Connector for TcpConnector {
    type Stream = StdIo<TcpStream>;

    fn connect(&self) -> core::result::Result<Self::Stream, IoError> {
        let addrs = (self.host.as_str(), self.port).to_socket_addrs().map_err(IoError)?;
        let mut last_err = std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("{} did not resolve", self.host),
        );
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.timeout)).map_err(IoError)?;
                    stream.set_write_timeout(Some(self.timeout)).map_err(IoError)?;
                    return Ok(StdIo(stream));
                }
                Err(e) => last_err = e,
            }
        }
        Err(IoError(last_err))
    }

    fn peer(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub struct ScpiClient<C: Connector> {
    connector: C,
}

impl<C: Connector> ScpiClient<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Send a command. Whatever the instrument answers (usually just its prompt) is discarded.
    pub fn command(&self, command: &str) -> Result<(), StreamError<C>> {
        debug!("{}: command {:?}", self.connector.peer(), command);
        let reply = self.exchange(command)?;
        debug!("{}: >>{:?}", self.connector.peer(), reply);
        Ok(())
    }

    /// Send a query and return its answer without the trailing line ending.
    pub fn query(&self, query: &str) -> Result<String, StreamError<C>> {
        debug!("{}: query {:?}", self.connector.peer(), query);
        let reply = self.exchange(query)?;
        Ok(reply.trim_matches(['\r', '\n']).to_owned())
    }

    fn exchange(&self, line: &str) -> Result<String, StreamError<C>> {
        let mut stream = self.connector.connect().map_err(Error::from_io)?;
        let mut buf = [0u8; REPLY_BUFFER];

        // Greeting banner.
        stream.read(&mut buf).map_err(Error::from_io)?;

        stream
            .write_all(line.as_bytes())
            .and_then(|_| stream.write_all(b"\n"))
            .and_then(|_| stream.flush())
            .map_err(Error::from_io)?;

        let len = stream.read(&mut buf).map_err(Error::from_io)?;
        let reply = core::str::from_utf8(&buf[..len]).map_err(|_| Error::InvalidResponse)?;
        Ok(reply.to_owned())
    }
}

/// Strip the `#<n><length>` header of a definite length block and return the payload.
///
/// `n` is a single digit 1-9 giving the number of length digits. Returns `None` if the header
/// is malformed or the payload is shorter than announced.
pub fn parse_block(reply: &str) -> Option<&str> {
    let rest = reply.strip_prefix('#')?;
    let n = rest.get(..1)?.parse::<usize>().ok().filter(|n| *n > 0)?;
    let len_digits = rest.get(1..1 + n)?;
    if !len_digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let len: usize = len_digits.parse().ok()?;
    rest.get(1 + n..)?.get(..len)
}
