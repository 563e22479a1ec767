//! Bus commands: an ASCII mnemonic with an optional argument. The target address is never part
//! of the command; the transport adds it.

use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    mnemonic: &'static str,
    argument: Option<String>,
}

impl Command {
    pub fn new(mnemonic: &'static str) -> Self {
        Self {
            mnemonic,
            argument: None,
        }
    }

    pub fn with_argument(mnemonic: &'static str, argument: impl Into<String>) -> Self {
        Self {
            mnemonic,
            argument: Some(argument.into()),
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        self.mnemonic
    }

    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// Wire form, e.g. `FNC VDC`.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.argument {
            Some(argument) => write!(f, "{} {}", self.mnemonic, argument),
            None => f.write_str(self.mnemonic),
        }
    }
}

/// Format a value with a three digit mantissa fraction and a signed two digit exponent, e.g.
/// `3.000E+00` or `3.000E-02`.
pub fn format_scientific(value: f64) -> String {
    let formatted = format!("{:.3E}", value);
    match formatted.split_once('E') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exponent) => {
                let sign = if exponent < 0 { '-' } else { '+' };
                format!("{}E{}{:02}", mantissa, sign, exponent.abs())
            }
            Err(_) => formatted,
        },
        // NaN and infinities have no exponent.
        None => formatted,
    }
}
