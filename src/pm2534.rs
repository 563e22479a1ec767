//! Philips/Fluke PM2534 multimeter on a GPIB bus.

use chrono::Utc;
use log::warn;

use crate::{
    bus::{Reply, ReplyFormat, SharedBus},
    command::Command,
    error::{Error, Result, ValidationError},
    poll::{Clock, PollConfig, poll_until},
    status::{STATUS_LEN, StatusRecord, decode_measurement},
    types::{Digits, Function, RangeSetting, Trigger},
};

/// A Philips/Fluke PM2534 multimeter on a GPIB bus behind a Prologix/AR488 adapter.
///
/// Several devices may share one [SharedBus]; each method performs its exchange while holding
/// the bus lock. The device keeps no cached status: [Pm2534::get_status] returns a fresh
/// [StatusRecord] which can be passed to the interpretation helpers.
///
/// For its methods we use the nomenclature that "set" writes a configuration, "get" reads one
/// back and "measure" reads a measured value.
pub struct Pm2534<S: embedded_io::Read + embedded_io::Write, const L: usize = 256> {
    bus: SharedBus<S, L>,
    address: u8,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> Pm2534<S, L> {
    /// Create a device handle. Fails if `address` is not a valid GPIB address.
    pub fn new(bus: SharedBus<S, L>, address: u8) -> core::result::Result<Self, ValidationError> {
        if address > crate::bus::MAX_ADDRESS {
            return Err(ValidationError::Address(address));
        }
        Ok(Self { bus, address })
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// The last measurement, or `None` if the instrument didn't answer or the reply was not a
    /// number.
    pub fn get_measure(&self) -> Result<Option<f64>, S::Error> {
        let Some(reply) = self.query(&Command::new(" "), ReplyFormat::Line)? else {
            return Ok(None);
        };
        let value = reply.as_text().and_then(decode_measurement);
        if value.is_none() {
            warn!("[{}] unreadable measurement {:?}", self.address, reply);
        }
        Ok(value)
    }

    /// Ask for a measurement until one arrives or `config.deadline` passes.
    pub fn poll_measure(
        &self,
        clock: &impl Clock,
        config: &PollConfig,
    ) -> Result<Option<f64>, S::Error> {
        poll_until(clock, config, || self.get_measure())
    }

    /// Read the current device status.
    ///
    /// Returns `None` if the instrument didn't answer or the blob was not [STATUS_LEN] bytes.
    pub fn get_status(&self) -> Result<Option<StatusRecord>, S::Error> {
        let Some(reply) = self.query(&Command::new("B"), ReplyFormat::Binary(STATUS_LEN))? else {
            return Ok(None);
        };
        let status = StatusRecord::decode(reply.as_bytes(), Utc::now());
        if status.is_none() {
            warn!(
                "[{}] status blob of {} bytes",
                self.address,
                reply.as_bytes().len()
            );
        }
        Ok(status)
    }

    /// Position of the front/rear switch: `Some(true)` for the front connectors.
    ///
    /// Also a cheap way to check the device is responding; `None` means it didn't.
    pub fn get_front_rear(&self) -> Result<Option<bool>, S::Error> {
        let reply = self.query(&Command::new("S"), ReplyFormat::Line)?;
        Ok(match reply.as_ref().and_then(Reply::as_text) {
            Some("1") => Some(true),
            Some("0") => Some(false),
            _ => None,
        })
    }

    /// Change the measurement function. The instrument picks a default range for it, so set
    /// the range afterwards.
    pub fn set_function(&self, function: Function) -> Result<(), S::Error> {
        self.write(&function.command())
    }

    /// Change the measurement range while `function` is active.
    ///
    /// A numeric `range` must have been built for the same function (see [StatusRecord::function]
    /// for the one currently active), otherwise it is rejected without touching the bus.
    pub fn set_range(&self, function: Function, range: RangeSetting) -> Result<(), S::Error> {
        let range = range.check_for(function)?;
        self.write(&range.command())
    }

    /// Validate and apply a range given as text (`AUTO` or e.g. `3E3`) for `function`.
    pub fn set_range_for(&self, function: Function, range: &str) -> Result<(), S::Error> {
        let range = RangeSetting::parse(function, range)?;
        self.set_range(function, range)
    }

    /// Change the measurement resolution. Valid values are 1 to 6.
    pub fn set_digits(&self, digits: u8) -> Result<(), S::Error> {
        let digits = Digits::new(digits)?;
        self.write(&digits.command())
    }

    /// Select where measurements are triggered from.
    pub fn set_trigger(&self, trigger: Trigger) -> Result<(), S::Error> {
        self.write(&trigger.command())
    }

    /// Reset the device interface with a selected device clear.
    pub fn reset(&self) -> Result<(), S::Error> {
        self.bus.clear(self.address)
    }

    /// Switch auto-zero on or off.
    pub fn set_auto_zero(&self, _enabled: bool) -> Result<(), S::Error> {
        Err(Error::NotImplemented("set_auto_zero"))
    }

    /// Show text on the display, or resume normal display with `None`.
    pub fn set_display(&self, _text: Option<&str>) -> Result<(), S::Error> {
        Err(Error::NotImplemented("set_display"))
    }

    /// Set the serial poll register mask (bits 0-5).
    pub fn set_srq_mask(&self, _mask: u8) -> Result<(), S::Error> {
        Err(Error::NotImplemented("set_srq_mask"))
    }

    /// Clear the serial poll register.
    pub fn clear_serial_poll_register(&self) -> Result<(), S::Error> {
        Err(Error::NotImplemented("clear_serial_poll_register"))
    }

    /// Read and clear the error register.
    pub fn clear_error_register(&self) -> Result<Vec<u8>, S::Error> {
        Err(Error::NotImplemented("clear_error_register"))
    }

    fn write(&self, command: &Command) -> Result<(), S::Error> {
        self.bus.write(self.address, &command.encode())
    }

    fn query(&self, command: &Command, format: ReplyFormat) -> Result<Option<Reply>, S::Error> {
        self.bus.query(self.address, &command.encode(), format)
    }
}
