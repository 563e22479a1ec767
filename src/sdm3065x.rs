//! Siglent SDM3065X bench multimeter over Ethernet.
//!
//! A measurement is set up with [Sdm3065x::measure] (or one of the `get_*` shortcuts), which
//! arms a bus triggered continuous acquisition and returns the first reading. Afterwards
//! [Sdm3065x::read] fetches the most recent sample without reconfiguring the instrument.

use core::str::FromStr;

use log::{error, info, warn};
use strum_macros::{Display, EnumIter, IntoStaticStr};

use crate::eng::EngNumber;
use crate::error::{Error, Result, ValidationError};
use crate::poll::{Clock, PollConfig, SystemClock, poll_until};
use crate::scpi::{Connector, ScpiClient, ScpiConfig, StreamError, TcpConnector, parse_block};

/// Reply to `R? 1` while no sample is available.
pub const NOT_READY: &str = ">>";

/// Integration time in power line cycles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr, Display)]
pub enum Nplc {
    #[strum(serialize = "100")]
    P100,
    #[default]
    #[strum(serialize = "10")]
    P10,
    #[strum(serialize = "1")]
    P1,
    #[strum(serialize = "0.5")]
    P0_5,
    #[strum(serialize = "0.05")]
    P0_05,
    #[strum(serialize = "0.005")]
    P0_005,
}

impl Nplc {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn cycles(self) -> f64 {
        match self {
            Nplc::P100 => 100.0,
            Nplc::P10 => 10.0,
            Nplc::P1 => 1.0,
            Nplc::P0_5 => 0.5,
            Nplc::P0_05 => 0.05,
            Nplc::P0_005 => 0.005,
        }
    }
}

impl FromStr for Nplc {
    type Err = ValidationError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let cycles: f64 = s.trim().parse().map_err(|_| ValidationError::Nplc(s.to_owned()))?;
        Self::try_from(cycles).map_err(|_| ValidationError::Nplc(s.to_owned()))
    }
}

impl TryFrom<f64> for Nplc {
    type Error = ValidationError;

    fn try_from(cycles: f64) -> core::result::Result<Self, Self::Error> {
        use strum::IntoEnumIterator;
        Self::iter()
            .find(|nplc| nplc.cycles() == cycles)
            .ok_or_else(|| ValidationError::Nplc(cycles.to_string()))
    }
}

/// What the instrument measures. The name is the SCPI function node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr, Display)]
pub enum SenseFunction {
    #[strum(serialize = "Voltage:DC")]
    VoltageDc,
    #[strum(serialize = "Voltage:AC")]
    VoltageAc,
    #[strum(serialize = "Current:DC")]
    CurrentDc,
    #[strum(serialize = "Current:AC")]
    CurrentAc,
}

const VOLTAGE_DC_RANGES: &[&str] = &["200mV", "2V", "20V", "200V", "1000V", "AUTO"];
const VOLTAGE_AC_RANGES: &[&str] = &["200mV", "2V", "20V", "200V", "750V", "AUTO"];
const CURRENT_RANGES: &[&str] = &["200uA", "2mA", "20mA", "200mA", "2A", "10A", "AUTO"];

impl SenseFunction {
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Accepted range arguments, including `AUTO`.
    pub fn ranges(self) -> &'static [&'static str] {
        match self {
            SenseFunction::VoltageDc => VOLTAGE_DC_RANGES,
            SenseFunction::VoltageAc => VOLTAGE_AC_RANGES,
            SenseFunction::CurrentDc | SenseFunction::CurrentAc => CURRENT_RANGES,
        }
    }

    /// AC functions have no integration time setting.
    pub fn has_nplc(self) -> bool {
        matches!(self, SenseFunction::VoltageDc | SenseFunction::CurrentDc)
    }

    fn check_range(self, range: &str) -> core::result::Result<(), ValidationError> {
        if self.ranges().contains(&range) {
            Ok(())
        } else {
            Err(ValidationError::Range {
                function: self.name(),
                range: range.to_owned(),
            })
        }
    }
}

pub struct Sdm3065x<C: Connector> {
    client: ScpiClient<C>,
    poll: PollConfig,
}

impl Sdm3065x<TcpConnector> {
    /// Talk to the instrument at `host`. No connection is made until the first command.
    pub fn connect(host: impl Into<String>, config: &ScpiConfig) -> Self {
        Self::new(TcpConnector::new(host, config), config.poll)
    }
}

impl<C: Connector> Sdm3065x<C> {
    pub fn new(connector: C, poll: PollConfig) -> Self {
        Self {
            client: ScpiClient::new(connector),
            poll,
        }
    }

    pub fn reset(&self) -> Result<(), StreamError<C>> {
        self.client.command("*RST")
    }

    /// Configure `function`, trigger one sample and return it.
    ///
    /// `range` must be one of [SenseFunction::ranges]. `nplc` is ignored for AC functions.
    /// Arguments are checked before anything is sent.
    pub fn measure(
        &self,
        function: SenseFunction,
        range: &str,
        nplc: Nplc,
    ) -> Result<Option<EngNumber>, StreamError<C>> {
        function.check_range(range)?;
        let node = function.name();
        info!("Measuring {} in range {}", node, range);

        // Stop any running acquisition first.
        self.client.command("abort")?;
        self.client.command(&format!("Sense:Function \"{}\"", node))?;
        if function.has_nplc() {
            self.client.command(&format!("Sense:{}:NPLC {}", node, nplc))?;
        }
        self.client.command(&format!("Sense:{}:Range {}", node, range))?;
        let auto = if range == "AUTO" { "ON" } else { "OFF" };
        self.client.command(&format!("Sense:{}:Range:AUTO {}", node, auto))?;

        self.client.command("Trigger:Source Bus")?;
        // Continuous sampling.
        self.client.command("Sample:Count MAX")?;
        // Drain samples left in the buffer.
        self.client.command("R?")?;
        self.client.command("Initiate")?;
        self.client.command("*TRG")?;

        self.read()
    }

    pub fn get_voltage_dc(
        &self,
        range: &str,
        nplc: Nplc,
    ) -> Result<Option<EngNumber>, StreamError<C>> {
        self.measure(SenseFunction::VoltageDc, range, nplc)
    }

    pub fn get_current_dc(
        &self,
        range: &str,
        nplc: Nplc,
    ) -> Result<Option<EngNumber>, StreamError<C>> {
        self.measure(SenseFunction::CurrentDc, range, nplc)
    }

    pub fn get_voltage_ac(&self, range: &str) -> Result<Option<EngNumber>, StreamError<C>> {
        self.measure(SenseFunction::VoltageAc, range, Nplc::default())
    }

    pub fn get_current_ac(&self, range: &str) -> Result<Option<EngNumber>, StreamError<C>> {
        self.measure(SenseFunction::CurrentAc, range, Nplc::default())
    }

    /// The most recent sample of the running acquisition.
    ///
    /// Fails with [Error::PollTimeout] if no sample shows up before the poll deadline, which
    /// usually means no measurement was started. A reply that cannot be decoded gives `Ok(None)`.
    pub fn read(&self) -> Result<Option<EngNumber>, StreamError<C>> {
        self.read_with(&SystemClock)
    }

    /// [Sdm3065x::read] with a caller supplied clock.
    pub fn read_with(&self, clock: &impl Clock) -> Result<Option<EngNumber>, StreamError<C>> {
        let ready = poll_until(clock, &self.poll, || -> Result<Option<String>, StreamError<C>> {
            let reply = self.client.query("R? 1")?;
            Ok((reply != NOT_READY).then_some(reply))
        })?;

        let Some(reply) = ready else {
            error!(
                "No reading within {:?}, forgot to start the measurement?",
                self.poll.deadline
            );
            return Err(Error::PollTimeout(self.poll.deadline));
        };

        let value = parse_block(&reply).and_then(EngNumber::parse);
        if value.is_none() {
            warn!("Malformed reading {:?}", reply);
        }
        Ok(value)
    }
}
