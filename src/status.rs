//! Decoding of PM2534 replies: the 5-byte binary status blob and the ASCII measurement line.

use chrono::{DateTime, Utc};
use modular_bitfield::prelude::*;

use crate::range::{self, RangeEntry};
use crate::types::{Function, Resolution};

/// Length of the status blob returned for the `B` query.
pub const STATUS_LEN: usize = 5;

/// Length of the header preceding the numeral in a measurement reply.
pub const MEASUREMENT_HEADER_LEN: usize = 6;

/// Byte 0: function, range and resolution.
#[bitfield]
#[derive(Debug, Clone, Copy)]
struct FunctionByte {
    digits: B2,
    range: B3,
    function: B3,
}

/// Byte 1: status bits.
#[bitfield]
#[derive(Debug, Clone, Copy)]
struct StatusByte {
    trigger_internal: bool,
    auto_range: bool,
    auto_zero: bool,
    freq_50hz: bool,
    front_ports: bool,
    cal_ram: bool,
    trigger_external: bool,
    #[skip]
    __: B1,
}

/// Byte 2: serial poll (SRQ) mask.
#[bitfield]
#[derive(Debug, Clone, Copy)]
struct SrqByte {
    reading: bool,
    #[skip]
    __: B1,
    syntax_error: bool,
    hardware_error: bool,
    keyboard: bool,
    cal_failed: bool,
    // Always zero.
    #[skip]
    __: B1,
    power_on: bool,
}

/// Byte 3: error register.
#[bitfield]
#[derive(Debug, Clone, Copy)]
struct ErrorByte {
    checksum: bool,
    ram: bool,
    rom: bool,
    ad_slope: bool,
    ad_self_test: bool,
    ad_link: bool,
    #[skip]
    __: B2,
}

/// Device status as read with a single status query.
///
/// A record is never updated in place; read the status again to get a fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    /// Raw function code, see [Function::from_code].
    pub function_code: u8,
    /// Raw 1-based range index, meaning depends on the function.
    pub range_index: u8,
    /// Raw resolution code, see [Resolution::from_code].
    pub digits_code: u8,

    /// Internal trigger enabled. `false` means single trigger.
    pub trigger_internal: bool,
    pub auto_range: bool,
    pub auto_zero: bool,
    /// Set up for 50 Hz mains. `false` means 60 Hz.
    pub freq_50hz: bool,
    /// Front/rear switch selects the front connectors.
    pub front_ports: bool,
    pub cal_ram: bool,
    pub trigger_external: bool,

    /// SRQ on every new reading.
    pub srq_reading: bool,
    pub srq_syntax_error: bool,
    pub srq_hardware_error: bool,
    /// SRQ when the front panel SRQ key is pressed.
    pub srq_keyboard: bool,
    pub srq_cal_failed: bool,
    /// SRQ on power-on or Test/Reset/SDC. Set by rear configuration switch 3.
    pub srq_power_on: bool,

    /// Self-test found an incorrect cal RAM checksum. Re-asserted whenever an affected range is
    /// used afterwards.
    pub err_checksum: bool,
    pub err_ram: bool,
    pub err_rom: bool,
    pub err_ad_slope: bool,
    pub err_ad_self_test: bool,
    /// Communication with the A/D converter failed.
    pub err_ad_link: bool,

    pub dac: u8,
    /// When this status was captured.
    pub fetched: DateTime<Utc>,
}

impl StatusRecord {
    /// Decode a status blob captured at `fetched`. Returns `None` unless the blob is exactly
    /// [STATUS_LEN] bytes long.
    pub fn decode(blob: &[u8], fetched: DateTime<Utc>) -> Option<Self> {
        let blob: [u8; STATUS_LEN] = blob.try_into().ok()?;

        let fr = FunctionByte::from_bytes([blob[0]]);
        let st = StatusByte::from_bytes([blob[1]]);
        let srq = SrqByte::from_bytes([blob[2]]);
        let err = ErrorByte::from_bytes([blob[3]]);

        Some(Self {
            function_code: fr.function(),
            range_index: fr.range(),
            digits_code: fr.digits(),
            trigger_internal: st.trigger_internal(),
            auto_range: st.auto_range(),
            auto_zero: st.auto_zero(),
            freq_50hz: st.freq_50hz(),
            front_ports: st.front_ports(),
            cal_ram: st.cal_ram(),
            trigger_external: st.trigger_external(),
            srq_reading: srq.reading(),
            srq_syntax_error: srq.syntax_error(),
            srq_hardware_error: srq.hardware_error(),
            srq_keyboard: srq.keyboard(),
            srq_cal_failed: srq.cal_failed(),
            srq_power_on: srq.power_on(),
            err_checksum: err.checksum(),
            err_ram: err.ram(),
            err_rom: err.rom(),
            err_ad_slope: err.ad_slope(),
            err_ad_self_test: err.ad_self_test(),
            err_ad_link: err.ad_link(),
            dac: blob[4],
            fetched,
        })
    }

    pub fn function(&self) -> Option<Function> {
        Function::from_code(self.function_code)
    }

    pub fn resolution(&self) -> Option<Resolution> {
        Resolution::from_code(self.digits_code)
    }

    pub fn range(&self) -> Option<RangeEntry> {
        range::entry(self.function()?, self.range_index)
    }

    /// Active range with SI prefix, e.g. `3kΩ`.
    pub fn range_display(&self) -> Option<&'static str> {
        self.range().map(|entry| entry.display)
    }

    /// Full scale of the active range in base units.
    pub fn range_ceiling(&self) -> Option<f64> {
        self.range().map(|entry| entry.ceiling)
    }

    /// Whether any hardware error flag is raised.
    pub fn has_hardware_error(&self) -> bool {
        self.err_checksum
            || self.err_ram
            || self.err_rom
            || self.err_ad_slope
            || self.err_ad_self_test
            || self.err_ad_link
    }
}

/// Parse a measurement reply: a fixed-length header followed by a numeric literal.
pub fn decode_measurement(reply: &str) -> Option<f64> {
    let value: f64 = reply.get(MEASUREMENT_HEADER_LEN..)?.trim().parse().ok()?;
    value.is_finite().then_some(value)
}
