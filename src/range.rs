//! PM2534 measurement range table.
//!
//! Range indices are the 1-based values reported in the status blob. Their meaning depends on
//! the active function; cells which don't exist for a function are `None`.

use crate::types::Function;

/// Relative tolerance used when matching a requested ceiling against the table.
const CEILING_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeEntry {
    /// Full scale with SI prefix, e.g. `300mV`.
    pub display: &'static str,
    /// Full scale in base units.
    pub ceiling: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeValue {
    Display(&'static str),
    Numeric(f64),
}

const fn e(display: &'static str, ceiling: f64) -> Option<RangeEntry> {
    Some(RangeEntry { display, ceiling })
}

const VOLTAGE_DC: [Option<RangeEntry>; 7] = [
    e("30mV", 0.03),
    e("300mV", 0.3),
    e("3V", 3.0),
    e("30V", 30.0),
    e("300V", 300.0),
    None,
    None,
];

const VOLTAGE_AC: [Option<RangeEntry>; 7] = [
    e("300mV", 0.3),
    e("3V", 3.0),
    e("30V", 30.0),
    e("300V", 300.0),
    None,
    None,
    None,
];

const RESISTANCE: [Option<RangeEntry>; 7] = [
    e("30Ω", 30.0),
    e("300Ω", 300.0),
    e("3kΩ", 3_000.0),
    e("30kΩ", 30_000.0),
    e("300kΩ", 300_000.0),
    e("3MΩ", 3_000_000.0),
    e("30MΩ", 30_000_000.0),
];

const CURRENT: [Option<RangeEntry>; 7] = [
    e("300mA", 0.3),
    e("3A", 3.0),
    None,
    None,
    None,
    None,
    None,
];

const NONE: [Option<RangeEntry>; 7] = [None; 7];

fn column(function: Function) -> &'static [Option<RangeEntry>; 7] {
    match function {
        Function::VDC => &VOLTAGE_DC,
        Function::VAC => &VOLTAGE_AC,
        Function::RTW | Function::RFW => &RESISTANCE,
        Function::IDC | Function::IAC => &CURRENT,
        Function::TDC => &NONE,
    }
}

/// Look up a table cell.
pub fn entry(function: Function, index: u8) -> Option<RangeEntry> {
    let slot = usize::from(index).checked_sub(1)?;
    column(function).get(slot).copied().flatten()
}

/// Look up a cell either as its display string or its numeric ceiling.
pub fn lookup(function: Function, index: u8, want_numeric: bool) -> Option<RangeValue> {
    entry(function, index).map(|entry| {
        if want_numeric {
            RangeValue::Numeric(entry.ceiling)
        } else {
            RangeValue::Display(entry.display)
        }
    })
}

/// All defined `(index, entry)` pairs for a function, in increasing order.
pub fn ceilings(function: Function) -> impl Iterator<Item = (u8, RangeEntry)> {
    column(function)
        .iter()
        .zip(1u8..)
        .filter_map(|(entry, index)| entry.map(|entry| (index, entry)))
}

/// Reverse lookup: the range index whose ceiling equals `value`.
pub fn index_for_ceiling(function: Function, value: f64) -> Option<u8> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    ceilings(function)
        .find(|(_, entry)| ((entry.ceiling - value) / entry.ceiling).abs() <= CEILING_TOLERANCE)
        .map(|(index, _)| index)
}
