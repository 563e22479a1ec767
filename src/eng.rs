//! Canonical engineering notation for numeric literals returned by instruments.
//!
//! The literal is normalised on its decimal digits, not through a float, so no digits are
//! invented or lost: `+1.36239593E+00` becomes `1.36239593E+0` and `0.200E+0` becomes `200E-3`.

use core::fmt;
use core::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct EngNumber {
    text: String,
    value: f64,
}

impl EngNumber {
    pub fn parse(literal: &str) -> Option<Self> {
        let literal = literal.trim();
        let (negative, unsigned) = match literal.as_bytes().first()? {
            b'-' => (true, &literal[1..]),
            b'+' => (false, &literal[1..]),
            _ => (false, literal),
        };

        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(at) => (&unsigned[..at], parse_exponent(&unsigned[at + 1..])?),
            None => (unsigned, 0),
        };
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }

        // value = digits * 10^exp10
        let digits: String = int_part.chars().chain(frac_part.chars()).collect();
        let exp10 = exponent.checked_sub(i64::try_from(frac_part.len()).ok()?)?;
        let digits = digits.trim_start_matches('0');
        let trimmed = digits.trim_end_matches('0');
        let exp10 = exp10.checked_add(i64::try_from(digits.len() - trimmed.len()).ok()?)?;
        let digits = trimmed;

        let text = if digits.is_empty() {
            "0E+0".to_owned()
        } else {
            let adjusted = exp10.checked_add(i64::try_from(digits.len()).ok()? - 1)?;
            let eng_exponent = adjusted.div_euclid(3) * 3;
            let int_digits = (adjusted - eng_exponent + 1) as usize;

            let mantissa = if digits.len() <= int_digits {
                format!("{}{}", digits, "0".repeat(int_digits - digits.len()))
            } else {
                format!("{}.{}", &digits[..int_digits], &digits[int_digits..])
            };
            let sign = if negative { "-" } else { "" };
            let exp_sign = if eng_exponent < 0 { '-' } else { '+' };
            format!("{}{}E{}{}", sign, mantissa, exp_sign, eng_exponent.abs())
        };

        let value: f64 = text.parse().ok()?;
        value.is_finite().then_some(Self { text, value })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Instrument replies are far shorter than this, so larger exponents never give a finite value.
const MAX_EXPONENT: i64 = 10_000;

fn parse_exponent(text: &str) -> Option<i64> {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse()
        .ok()
        .filter(|exponent| (-MAX_EXPONENT..=MAX_EXPONENT).contains(exponent))
}

impl fmt::Display for EngNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for EngNumber {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(())
    }
}
