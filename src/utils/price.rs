//! Spot price, FDV and price-change math.
//!
//! Pure valuation functions over pool reserves and price observations. Every
//! degenerate input (zero reserves, unknown supply, missing or zero baseline)
//! resolves to an explicit zero-or-null policy; nothing in this module
//! divides by zero, panics or returns infinity.

use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use num_traits::Zero;
use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;

use super::conversion::to_human_amount;

// ============================================
// Stablecoin Allow-List
// ============================================

/// Symbols priced at par by downstream valuation. Matching is
/// case-insensitive; extending the list is a versioned contract change.
const STABLECOIN_SYMBOLS: [&str; 8] = [
    "USDT", "USDC", "DAI", "BUSD", "TUSD", "FRAX", "USDP", "AUSD",
];

static STABLECOIN_SET: Lazy<FxHashSet<&'static str>> =
    Lazy::new(|| STABLECOIN_SYMBOLS.iter().copied().collect());

/// Whether a token symbol is on the stablecoin allow-list.
pub fn is_stablecoin(symbol: &str) -> bool {
    STABLECOIN_SET.contains(symbol.to_ascii_uppercase().as_str())
}

// ============================================
// Spot Price
// ============================================

/// Constant-product spot price of a token in units of its pair counterpart.
///
/// `human(reserve_other) / human(reserve_token)`, both sides adjusted by
/// their own decimals first.
///
/// # Arguments
/// * `reserve_token` - Raw reserve of the token being priced
/// * `reserve_other` - Raw reserve of the counter-asset
/// * `decimals_token` - Decimals of the token being priced
/// * `decimals_other` - Decimals of the counter-asset
///
/// # Returns
/// * The spot price, or zero when either reserve is zero (degenerate pool)
pub fn spot_price_from_reserves(
    reserve_token: U256,
    reserve_other: U256,
    decimals_token: u32,
    decimals_other: u32,
) -> BigDecimal {
    if reserve_token.is_zero() || reserve_other.is_zero() {
        return BigDecimal::from(0);
    }

    let human_token = to_human_amount(reserve_token, decimals_token);
    let human_other = to_human_amount(reserve_other, decimals_other);

    // Corrupt decimals convert to zero upstream; never divide by it.
    if human_token.is_zero() {
        return BigDecimal::from(0);
    }

    human_other / human_token
}

// ============================================
// Derived Valuations
// ============================================

/// Fully diluted valuation: total supply at the current USD price.
///
/// Returns `None` when the total supply is unknown; an FDV of zero would
/// misreport "unknown" as "worthless".
pub fn fdv(total_supply: Option<U256>, decimals: u32, price_usd: &BigDecimal) -> Option<BigDecimal> {
    total_supply.map(|supply| to_human_amount(supply, decimals) * price_usd)
}

/// Percentage change between a current and a previous observation.
///
/// Returns `None` when the baseline is missing or zero: the change is
/// undefined there and must not be reported as 0% or infinity.
pub fn percent_change(current: &BigDecimal, previous: Option<&BigDecimal>) -> Option<BigDecimal> {
    let previous = previous?;
    if previous.is_zero() {
        return None;
    }

    Some((current - previous) / previous * BigDecimal::from(100))
}
