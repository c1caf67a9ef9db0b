//! Card number normalization.
//!
//! Turns a raw, possibly display-masked card number into the 19-digit
//! comparable value used by the range table.

use crate::error::ValidationError;
use std::fmt;
use std::str::FromStr;

/// Number of leading digits that form the BIN.
pub const BIN_LENGTH: usize = 6;

/// Card numbers of this length are extended with zeros into range space.
pub const SHORT_PAN_LENGTH: usize = 16;

/// Width of the range space; dataset bounds are expressed in 19 digits.
pub const RANGE_DIGITS: usize = 19;

/// Placeholder used by masked sources for hidden digits.
pub const MASK_CHAR: char = '*';

/// A card number reduced to its BIN and its value in range space.
///
/// Ephemeral: created per lookup, never stored.
///
/// # Examples
///
/// ```
/// use bin_resolver::card::normalize;
///
/// let card = normalize("4111111234567890").unwrap();
/// assert_eq!(card.bin, 411111);
/// assert_eq!(card.full_value, 4111111234567890000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedCard {
    /// First six digits of the card number.
    pub bin: u32,

    /// Card number after mask substitution and padding.
    pub full_value: u64,
}

impl fmt::Display for NormalizedCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.full_value, width = RANGE_DIGITS)
    }
}

impl FromStr for NormalizedCard {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

/// Normalizes a raw card number.
///
/// The BIN is taken from the raw input, so masking inside the first six
/// characters is rejected. Every `*` is then read as `0`; a 16-character
/// result is padded with three trailing zeros, shorter input is rejected and
/// 17 to 19 characters pass through as-is.
pub fn normalize(raw: &str) -> Result<NormalizedCard, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::EmptyInput);
    }

    let bin = extract_bin(raw)?;

    let mut cleaned = raw.replace(MASK_CHAR, "0");
    let length = cleaned.chars().count();

    if length < SHORT_PAN_LENGTH {
        return Err(ValidationError::TooShort { length });
    }
    if length == SHORT_PAN_LENGTH {
        cleaned.push_str("000");
    }

    // Anything wider than range space cannot fall inside a stored range.
    if cleaned.len() > RANGE_DIGITS || !cleaned.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::NotNumeric);
    }

    let full_value = cleaned
        .parse::<u64>()
        .map_err(|_| ValidationError::NotNumeric)?;

    Ok(NormalizedCard { bin, full_value })
}

/// Reads the BIN from the first six characters of the raw input.
fn extract_bin(raw: &str) -> Result<u32, ValidationError> {
    let prefix = raw.get(..BIN_LENGTH).ok_or(ValidationError::MalformedBin)?;
    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::MalformedBin);
    }
    prefix.parse().map_err(|_| ValidationError::MalformedBin)
}

/// Redacts a card number for output, keeping the BIN and the last four characters.
///
/// Inputs too short to redact meaningfully are fully masked.
pub fn mask_card(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() <= BIN_LENGTH + 4 {
        return MASK_CHAR.to_string().repeat(chars.len());
    }

    let hidden = chars.len() - BIN_LENGTH - 4;
    let mut masked: String = chars[..BIN_LENGTH].iter().collect();
    masked.push_str(&MASK_CHAR.to_string().repeat(hidden));
    masked.extend(&chars[chars.len() - 4..]);
    masked
}
