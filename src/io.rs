//! Adapters which let [std::io] streams (serial ports, TCP sockets) be used as [embedded_io]
//! links by the transports in this crate.

/// Wraps any [std::io::Read] + [std::io::Write] type.
pub struct StdIo<T>(pub T);

impl<T> StdIo<T> {
    /// Return the wrapped stream.
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// A [std::io::Error] reported through [embedded_io].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct IoError(#[from] pub std::io::Error);

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        use embedded_io::ErrorKind as Kind;
        use std::io::ErrorKind as Std;

        match self.0.kind() {
            // Serial ports and sockets with a read timeout report one or the other.
            Std::TimedOut | Std::WouldBlock => Kind::TimedOut,
            Std::Interrupted => Kind::Interrupted,
            // Link went away.
            Std::ConnectionRefused => Kind::ConnectionRefused,
            Std::ConnectionReset => Kind::ConnectionReset,
            Std::ConnectionAborted => Kind::ConnectionAborted,
            Std::NotConnected => Kind::NotConnected,
            Std::BrokenPipe => Kind::BrokenPipe,
            // Opening the port or socket failed.
            Std::NotFound => Kind::NotFound,
            Std::PermissionDenied => Kind::PermissionDenied,
            Std::AddrInUse => Kind::AddrInUse,
            Std::AddrNotAvailable => Kind::AddrNotAvailable,
            Std::InvalidInput => Kind::InvalidInput,
            Std::InvalidData => Kind::InvalidData,
            _ => Kind::Other,
        }
    }
}

impl<T> embedded_io::ErrorType for StdIo<T> {
    type Error = IoError;
}

impl<T: std::io::Read> embedded_io::Read for StdIo<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl<T: std::io::Write> embedded_io::Write for StdIo<T> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}
