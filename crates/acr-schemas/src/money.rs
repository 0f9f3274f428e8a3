//! Fixed-point money type.
//!
//! All monetary amounts (accruals, balances, credits) use a 1e-6 (micros)
//! fixed-point representation stored as `i64`. Floating point never touches
//! a stored or summed amount.
//!
//! `Micros` wraps the raw `i64` so the type system prevents:
//! - Implicit construction from raw `i64` (no `From<i64>` impl).
//! - Mixing `Micros` with unrelated integers (row counts, ids).
//!
//! # Scale
//!
//! 1 currency unit = 1_000_000 Micros.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of micros in one currency unit.
pub const MICROS_SCALE: i64 = 1_000_000;

const FRACTION_DIGITS: usize = 6;

// ---------------------------------------------------------------------------
// Micros newtype
// ---------------------------------------------------------------------------

/// A fixed-point monetary amount at 1e-6 scale.
///
/// Serialized as the raw `i64` (fields carrying it are suffixed `_micros`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Micros(i64);

impl Micros {
    pub const ZERO: Micros = Micros(0);
    pub const MAX: Micros = Micros(i64::MAX);

    /// Construct from a raw `i64` already at 1e-6 scale.
    #[inline]
    pub const fn new(raw: i64) -> Self {
        Micros(raw)
    }

    /// Construct from a whole number of currency units.
    ///
    /// Returns `None` on overflow.
    #[inline]
    pub fn from_units(units: i64) -> Option<Self> {
        units.checked_mul(MICROS_SCALE).map(Micros)
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn checked_add(self, rhs: Micros) -> Option<Micros> {
        self.0.checked_add(rhs.0).map(Micros)
    }

    #[inline]
    pub fn saturating_add(self, rhs: Micros) -> Micros {
        Micros(self.0.saturating_add(rhs.0))
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Parse a decimal string (e.g. `"729.98"`) into micros deterministically.
    ///
    /// Rules:
    /// - Accepts optional leading `+` or `-`.
    /// - Accepts an optional fractional part separated by `.`.
    /// - Rejects more than 6 decimal places (would require rounding).
    /// - Rejects empty strings, non-digit characters, exponents, multiple `.`.
    /// - Does **not** use floating point at any stage.
    pub fn parse_decimal(s: &str) -> Result<Micros, MoneyError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MoneyError::Empty);
        }

        let invalid = || MoneyError::Invalid { raw: s.to_string() };

        let (negative, digits) = if let Some(rest) = s.strip_prefix('-') {
            (true, rest)
        } else if let Some(rest) = s.strip_prefix('+') {
            (false, rest)
        } else {
            (false, s)
        };

        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));

        let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !all_digits(int_part) || !all_digits(frac_part) {
            return Err(invalid());
        }
        if frac_part.len() > FRACTION_DIGITS {
            return Err(MoneyError::TooManyDecimalPlaces { raw: s.to_string() });
        }

        let overflow = || MoneyError::Overflow { raw: s.to_string() };

        let int_val: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse::<i64>().map_err(|_| overflow())?
        };

        let frac_val: i64 = if frac_part.is_empty() {
            0
        } else {
            let padded = format!("{frac_part:0<width$}", width = FRACTION_DIGITS);
            padded.parse::<i64>().map_err(|_| invalid())?
        };

        let micros = int_val
            .checked_mul(MICROS_SCALE)
            .and_then(|v| v.checked_add(frac_val))
            .ok_or_else(overflow)?;

        Ok(Micros(if negative { -micros } else { micros }))
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// Renders as a plain decimal with trailing fractional zeros trimmed:
/// `500`, `729.98`, `-0.5`.
impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        let scale = MICROS_SCALE.unsigned_abs();
        let units = abs / scale;
        let frac = abs % scale;
        let sign = if self.0 < 0 { "-" } else { "" };

        if frac == 0 {
            return write!(f, "{sign}{units}");
        }

        let frac_s = format!("{frac:06}");
        write!(f, "{sign}{units}.{}", frac_s.trim_end_matches('0'))
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    Empty,
    Invalid { raw: String },
    TooManyDecimalPlaces { raw: String },
    Overflow { raw: String },
}

impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoneyError::Empty => write!(f, "empty monetary amount"),
            MoneyError::Invalid { raw } => write!(f, "invalid monetary amount '{raw}'"),
            MoneyError::TooManyDecimalPlaces { raw } => {
                write!(f, "monetary amount '{raw}' has more than 6 decimal places")
            }
            MoneyError::Overflow { raw } => write!(f, "monetary amount '{raw}' overflows i64 micros"),
        }
    }
}

impl std::error::Error for MoneyError {}
