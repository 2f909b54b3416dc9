//! Object-store timestamps.
//!
//! The object store records times as decimal seconds with five fractional
//! digits (10 microsecond resolution), optionally followed by an `_<hex>`
//! offset suffix. Container listings pack three of them into one field:
//! `<t1>[±<hex delta>[±<hex delta>]]`, where each delta is expressed in
//! 10 microsecond units relative to the previous time.

use std::fmt;

use thiserror::Error;

/// Number of raw units per second.
const UNITS_PER_SECOND: i64 = 100_000;

/// Number of raw units per millisecond.
const UNITS_PER_MILLI: i64 = 100;

/// Number of fractional digits carried by the raw representation.
const FRACTION_DIGITS: usize = 5;

/// Errors raised while decoding timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// The value is not a decimal seconds value.
    #[error("Invalid timestamp '{0}'")]
    Invalid(String),

    /// A delta in an encoded triple is not valid hexadecimal.
    #[error("Invalid timestamp delta '{0}'")]
    InvalidDelta(String),
}

/// A point in time with 10 microsecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwiftTimestamp {
    raw: i64,
}

impl SwiftTimestamp {
    /// Build a timestamp from raw 10 microsecond units.
    pub fn from_raw(raw: i64) -> Self {
        Self { raw }
    }

    /// Parse a decimal seconds value such as `1500000000.12345`.
    ///
    /// Any `_<hex>` offset suffix is accepted and ignored; fractional digits
    /// beyond the fifth are rounded.
    pub fn parse(value: &str) -> Result<Self, TimestampError> {
        let invalid = || TimestampError::Invalid(value.to_string());

        let value = value.trim();
        let without_offset = match value.split_once('_') {
            Some((ts, offset)) => {
                if offset.is_empty() || !offset.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(invalid());
                }
                ts
            }
            None => value,
        };

        let (whole, fraction) = match without_offset.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (without_offset, ""),
        };

        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let seconds: i64 = whole.parse().map_err(|_| invalid())?;

        let mut digits: String = fraction.chars().take(FRACTION_DIGITS).collect();
        while digits.len() < FRACTION_DIGITS {
            digits.push('0');
        }
        let mut units: i64 = digits.parse().map_err(|_| invalid())?;
        if let Some(next) = fraction.chars().nth(FRACTION_DIGITS) {
            if next >= '5' {
                units += 1;
            }
        }

        seconds
            .checked_mul(UNITS_PER_SECOND)
            .and_then(|raw| raw.checked_add(units))
            .map(Self::from_raw)
            .ok_or_else(invalid)
    }

    /// Decode an encoded `(created, content, metadata)` triple.
    ///
    /// A missing content delta means the content time equals the creation
    /// time; a missing metadata delta means it equals the content time.
    pub fn decode_triple(encoded: &str) -> Result<(Self, Self, Self), TimestampError> {
        let encoded = encoded.trim();
        let mut parts: Vec<(i64, &str)> = Vec::with_capacity(3);
        let mut start = 0;
        let mut sign = 1;
        for (pos, c) in encoded.char_indices() {
            if c == '+' || c == '-' {
                parts.push((sign, &encoded[start..pos]));
                sign = if c == '+' { 1 } else { -1 };
                start = pos + 1;
            }
        }
        parts.push((sign, &encoded[start..]));

        let created = Self::parse(parts[0].1)?;
        let content = match parts.get(1) {
            Some(&(sign, delta)) => created.offset_by(sign, delta)?,
            None => created,
        };
        let metadata = match parts.get(2) {
            Some(&(sign, delta)) => content.offset_by(sign, delta)?,
            None => content,
        };
        if parts.len() > 3 {
            return Err(TimestampError::Invalid(encoded.to_string()));
        }

        Ok((created, content, metadata))
    }

    fn offset_by(self, sign: i64, delta: &str) -> Result<Self, TimestampError> {
        let units = i64::from_str_radix(delta, 16)
            .map_err(|_| TimestampError::InvalidDelta(delta.to_string()))?;
        self.raw
            .checked_add(sign * units)
            .map(Self::from_raw)
            .ok_or_else(|| TimestampError::InvalidDelta(delta.to_string()))
    }

    /// Raw value in 10 microsecond units.
    pub fn raw(&self) -> i64 {
        self.raw
    }

    /// Milliseconds since the epoch, truncated.
    ///
    /// The index only stores millisecond resolution.
    pub fn as_millis(&self) -> i64 {
        self.raw / UNITS_PER_MILLI
    }
}

impl fmt::Display for SwiftTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:05}",
            self.raw / UNITS_PER_SECOND,
            self.raw % UNITS_PER_SECOND
        )
    }
}
