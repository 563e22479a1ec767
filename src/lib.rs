//! This crate provides drivers for bench digital multimeters.
//!
//! Supported instruments:
//! * Philips/Fluke PM2534, on a GPIB bus reached through a Prologix or AR488 compatible
//!   USB/serial adapter ([pm2534::Pm2534]).
//! * Siglent SDM3065X, over Ethernet with SCPI on TCP port 5024 ([sdm3065x::Sdm3065x]).
//!
//! Several GPIB instruments can share one adapter: open it once, wrap it in a
//! [bus::SharedBus] and hand a clone to each device.
//!
//! The adapter's serial port should be configured like so:
//! * Default baud rate: 115200
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//!
//! With the `serial` feature, [bus::open_serial] does this for you.
//!
//! All I/O is blocking and every wait is bounded. The crate logs through the [log] facade and
//! never installs a logger itself.

pub mod bus;
pub mod command;
pub mod eng;
pub mod error;
pub mod io;
pub mod pm2534;
pub mod poll;
pub mod range;
pub mod scpi;
pub mod sdm3065x;
pub mod status;
pub mod types;

#[cfg(test)]
mod mock_serial;
