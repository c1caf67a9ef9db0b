//! Range records: dataset rows and the public result of a lookup.

use crate::card::{BIN_LENGTH, RANGE_DIGITS};
use serde::{Deserialize, Serialize};

/// A dataset row as it appears in the fetched JSON.
///
/// Bounds stay strings here; they are validated by [`RawRangeRecord::parse`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawRangeRecord {
    /// First six digits of the covered card numbers
    pub bin: u32,

    /// Inclusive lower bound, decimal string of up to 19 digits
    pub min_range: String,

    /// Inclusive upper bound, decimal string of up to 19 digits
    pub max_range: String,

    /// Issuing country or region code
    pub alpha_code: String,

    /// Issuer name
    pub bank_name: String,
}

impl RawRangeRecord {
    /// Parses the row into a validated record.
    ///
    /// Returns `None` if a bound is not numeric, exceeds 19 digits, the bounds
    /// are inverted, or either bound does not start with the row's BIN.
    pub fn parse(&self) -> Option<RangeRecord> {
        let min_range = parse_bound(&self.min_range)?;
        let max_range = parse_bound(&self.max_range)?;

        RangeRecord::new(
            self.bin,
            min_range,
            max_range,
            self.alpha_code.trim().to_string(),
            self.bank_name.trim().to_string(),
        )
    }
}

fn parse_bound(bound: &str) -> Option<u64> {
    let trimmed = bound.trim();
    if trimmed.is_empty()
        || trimmed.len() > RANGE_DIGITS
        || !trimmed.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    trimmed.parse().ok()
}

/// Leading six digits of a bound.
fn leading_bin(bound: u64) -> Option<u32> {
    let digits = bound.checked_ilog10()? + 1;
    let shift = digits.checked_sub(BIN_LENGTH as u32)?;
    Some((bound / 10u64.pow(shift)) as u32)
}

/// One validated range of card numbers mapped to an issuer.
///
/// # Invariants
///
/// - `min_range <= max_range`
/// - the leading six digits of both bounds equal `bin`
///
/// Records are immutable once built; the store only ever replaces them wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRecord {
    bin: u32,
    min_range: u64,
    max_range: u64,
    alpha_code: String,
    bank_name: String,
}

impl RangeRecord {
    /// Builds a record, returning `None` if the invariants do not hold.
    pub fn new(
        bin: u32,
        min_range: u64,
        max_range: u64,
        alpha_code: String,
        bank_name: String,
    ) -> Option<Self> {
        if min_range > max_range
            || leading_bin(min_range) != Some(bin)
            || leading_bin(max_range) != Some(bin)
        {
            return None;
        }

        Some(RangeRecord {
            bin,
            min_range,
            max_range,
            alpha_code,
            bank_name,
        })
    }

    pub fn bin(&self) -> u32 {
        self.bin
    }

    pub fn min_range(&self) -> u64 {
        self.min_range
    }

    pub fn max_range(&self) -> u64 {
        self.max_range
    }

    pub fn alpha_code(&self) -> &str {
        &self.alpha_code
    }

    pub fn bank_name(&self) -> &str {
        &self.bank_name
    }

    /// Returns `true` if `value` lies within the inclusive bounds.
    pub fn contains(&self, value: u64) -> bool {
        self.min_range <= value && value <= self.max_range
    }

    /// Copies the public fields out of the record.
    pub fn to_match(&self) -> BankMatch {
        BankMatch {
            bin: self.bin,
            alpha_code: self.alpha_code.clone(),
            bank_name: self.bank_name.clone(),
        }
    }
}

/// Issuer fields returned for a matched card. Range bounds are never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankMatch {
    pub bin: u32,
    pub alpha_code: String,
    pub bank_name: String,
}
