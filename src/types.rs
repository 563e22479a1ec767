//! This module contains the PM2534 command argument types.

use strum_macros::{Display, EnumIter, FromRepr, IntoStaticStr};

use crate::command::{Command, format_scientific};
use crate::error::ValidationError;
use crate::range;

/// Measurement functions. The discriminant is the function code reported in the status blob,
/// the name is the `FNC` mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, FromRepr, IntoStaticStr, Display)]
#[repr(u8)]
pub enum Function {
    /// DC voltage.
    VDC = 1,
    /// AC voltage.
    VAC = 2,
    /// Two-wire resistance.
    RTW = 3,
    /// Four-wire resistance.
    RFW = 4,
    /// DC current.
    IDC = 5,
    /// AC current.
    IAC = 6,
    /// Temperature.
    TDC = 7,
}

impl Function {
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::from_repr(code)
    }

    pub fn command(self) -> Command {
        Command::with_argument("FNC", self.mnemonic())
    }
}

/// Trigger sources, sent as `TRG <name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr, Display)]
pub enum Trigger {
    /// Internal, free running.
    I,
    /// Bus trigger (GET).
    B,
    /// External trigger input.
    E,
    /// Front panel key.
    K,
}

impl Trigger {
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    pub fn command(self) -> Command {
        Command::with_argument("TRG", self.mnemonic())
    }
}

/// Argument of the `DIG` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Digits(u8);

impl Digits {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 6;

    pub fn new(digits: u8) -> Result<Self, ValidationError> {
        if (Self::MIN..=Self::MAX).contains(&digits) {
            Ok(Self(digits))
        } else {
            Err(ValidationError::Digits(digits))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn command(self) -> Command {
        Command::with_argument("DIG", self.0.to_string())
    }
}

impl TryFrom<u8> for Digits {
    type Error = ValidationError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Display resolution as reported by the status blob's digit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, FromRepr)]
#[repr(u8)]
pub enum Resolution {
    FiveAndHalf = 1,
    FourAndHalf = 2,
    ThreeAndHalf = 3,
}

impl Resolution {
    pub fn from_code(code: u8) -> Option<Self> {
        Self::from_repr(code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::FiveAndHalf => "5½",
            Resolution::FourAndHalf => "4½",
            Resolution::ThreeAndHalf => "3½",
        }
    }
}

/// A numeric range that has been checked against the range table of `function`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ceiling {
    function: Function,
    value: f64,
}

impl Ceiling {
    pub fn function(&self) -> Function {
        self.function
    }

    /// Full scale in base units.
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Argument of the `RNG` command.
///
/// Numeric ranges can only be built through [RangeSetting::ceiling] or [RangeSetting::parse],
/// which check them against the range table of the function they are meant for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeSetting {
    Auto,
    Ceiling(Ceiling),
}

impl RangeSetting {
    pub fn ceiling(function: Function, value: f64) -> Result<Self, ValidationError> {
        match range::index_for_ceiling(function, value) {
            Some(_) => Ok(RangeSetting::Ceiling(Ceiling { function, value })),
            None => Err(ValidationError::Range {
                function: function.mnemonic(),
                range: value.to_string(),
            }),
        }
    }

    /// Accepts `AUTO` or a numeric literal such as `3E0` or `300`.
    pub fn parse(function: Function, text: &str) -> Result<Self, ValidationError> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("AUTO") {
            return Ok(RangeSetting::Auto);
        }
        match text.parse::<f64>() {
            Ok(value) => Self::ceiling(function, value),
            Err(_) => Err(ValidationError::Range {
                function: function.mnemonic(),
                range: text.to_owned(),
            }),
        }
    }

    /// Check that this setting can be used while `function` is active. `AUTO` always can.
    pub fn check_for(self, function: Function) -> Result<Self, ValidationError> {
        match self {
            RangeSetting::Ceiling(ceiling) if ceiling.function != function => {
                Err(ValidationError::Range {
                    function: function.mnemonic(),
                    range: ceiling.value.to_string(),
                })
            }
            _ => Ok(self),
        }
    }

    pub fn command(self) -> Command {
        match self {
            RangeSetting::Auto => Command::with_argument("RNG", "AUTO"),
            RangeSetting::Ceiling(ceiling) => {
                Command::with_argument("RNG", format_scientific(ceiling.value))
            }
        }
    }
}
