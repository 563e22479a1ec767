//! Our error types for the multimeter transports and codecs.

use core::time::Duration;

use thiserror::Error;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for multimeter communications.
///
/// `I` is the error type of the underlying [embedded_io] link, so a serial port, a TCP socket and
/// the test mocks all report their own faults through [Error::Transport].
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Transport I/O error")]
    Transport(I),
    #[error("Communication timeout")]
    Timeout,
    /// No valid reply arrived from a polled instrument before the deadline.
    #[error("No reading within {0:?}, forgot to start the measurement?")]
    PollTimeout(Duration),
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] ValidationError),
    #[error("Invalid response received")]
    InvalidResponse,
    /// The operation is declared for this model but not supported by this crate.
    #[error("Operation not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("Reply exceeded the receive buffer")]
    BufferError,
}

impl<I: embedded_io::Error> Error<I> {
    /// Map a link error, turning timeouts into [Error::Timeout].
    pub(crate) fn from_io(err: I) -> Self {
        match err.kind() {
            embedded_io::ErrorKind::TimedOut => Error::Timeout,
            _ => Error::Transport(err),
        }
    }
}

/// An argument outside of the instrument's declared domain.
///
/// These are raised before any bus or network exchange is attempted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("bus address {0} is outside 0..=30")]
    Address(u8),
    #[error("digit count {0} is not supported")]
    Digits(u8),
    #[error("range {range} is not valid for {function}")]
    Range {
        function: &'static str,
        range: String,
    },
    #[error("integration time {0} NPLC is not supported")]
    Nplc(String),
}
