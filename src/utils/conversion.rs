//! Raw-amount to decimal conversion utilities.
//!
//! Functions for moving 256-bit raw token amounts across the human-readable
//! boundary without precision loss. Raw amounts stay `U256` for as long as
//! possible; the decimal conversion constructs `BigDecimal` directly from the
//! integer digits so dividing by `10^decimals` is exact, never rounded.

use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;

// ============================================
// Constants
// ============================================

/// Upper bound of the token decimals domain. Values above this are treated
/// as corrupt metadata and convert to zero on the display path rather than
/// poisoning aggregates.
pub const MAX_TOKEN_DECIMALS: u32 = 255;

// ============================================
// U256 Conversions
// ============================================

/// Convert U256 to BigInt via little-endian bytes (faster than string parsing).
pub fn u256_to_bigint(value: U256) -> BigInt {
    let bytes: [u8; 32] = value.to_le_bytes();
    BigInt::from_bytes_le(num_bigint::Sign::Plus, &bytes)
}

/// Convert a raw token amount to its human-readable decimal value.
///
/// Computes `raw_amount / 10^decimals` exactly by placing the raw digits at
/// the given decimal scale, so no rounding occurs for any amount up to
/// `U256::MAX`.
///
/// # Arguments
/// * `raw_amount` - The raw on-chain amount
/// * `decimals` - The token's decimal places
///
/// # Returns
/// * The human-readable amount, or zero when `decimals` is outside the
///   valid 0-255 range
///
/// # Example
/// ```ignore
/// let raw = U256::from(1_000_000_000_000_000_000u128); // 1e18
/// let human = to_human_amount(raw, 18); // 1.0
/// ```
pub fn to_human_amount(raw_amount: U256, decimals: u32) -> BigDecimal {
    if decimals > MAX_TOKEN_DECIMALS {
        return BigDecimal::from(0);
    }

    BigDecimal::new(u256_to_bigint(raw_amount), decimals as i64)
}

/// USD value of a raw token amount at a given USD price.
///
/// `to_human_amount(raw_amount, decimals) * price_usd`; multiplication of
/// two decimals is exact, so contributions accumulated from this function
/// sum without drift.
pub fn usd_value(raw_amount: U256, decimals: u32, price_usd: &BigDecimal) -> BigDecimal {
    to_human_amount(raw_amount, decimals) * price_usd
}
