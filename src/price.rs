//! Fixed-point price codec
//!
//! Prices are carried through the book as `u64` values scaled by 1e9. The
//! integer representation gives exact level bucketing, stable hashing and
//! deterministic ordering; decimals only appear at the parse and format
//! boundaries.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{ReconstructError, Result};

/// Number of fractional digits carried by a scaled price.
pub const PRICE_SCALE: u32 = 9;

const SCALE_FACTOR: u64 = 1_000_000_000;

/// Upper bound accepted from input data (1,000,000.0 scaled).
const MAX_PRICE_SCALED: u64 = 1_000_000 * SCALE_FACTOR;

/// Parse a decimal price string into its scaled representation.
///
/// Rejects negative values and prices beyond the accepted range. The input
/// must be non-empty; callers map an empty field to 0 ("no price") before
/// reaching the codec.
pub fn encode(text: &str) -> Result<u64> {
    let decimal =
        Decimal::from_str(text).map_err(|_| ReconstructError::InvalidPrice(text.to_string()))?;

    if decimal.is_sign_negative() {
        return Err(ReconstructError::InvalidPrice(text.to_string()));
    }

    let scaled = (decimal * Decimal::from(SCALE_FACTOR))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    match scaled.to_u64() {
        Some(value) if value <= MAX_PRICE_SCALED => Ok(value),
        _ => Err(ReconstructError::InvalidPrice(text.to_string())),
    }
}

/// Format a scaled price as a decimal string.
///
/// Trailing zeros are trimmed and the decimal point is omitted when the
/// fractional part is zero. A value of 0 formats as the empty string, the
/// sentinel for "no price" in the output schema.
pub fn format(price: u64) -> String {
    if price == 0 {
        return String::new();
    }

    Decimal::from_i128_with_scale(i128::from(price), PRICE_SCALE)
        .normalize()
        .to_string()
}
