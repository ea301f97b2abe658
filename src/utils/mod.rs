//! Utility functions for the hourglass rollup engine.
//!
//! This module is organized into focused submodules:
//!
//! - [`time_bucket`] - Hour-bucket alignment and rolling-window definitions
//! - [`conversion`] - Raw U256 amounts across the decimal boundary
//! - [`price`] - Spot price, FDV, percent change and the stablecoin list

mod conversion;
mod price;
mod time_bucket;

// ============================================
// Re-exports
// ============================================

// Bucket and window utilities
pub use time_bucket::{floor_to_hour, is_same_hour, Window, HOUR_MILLIS};

// Conversion utilities
pub use conversion::{to_human_amount, u256_to_bigint, usd_value, MAX_TOKEN_DECIMALS};

// Valuation utilities
pub use price::{fdv, is_stablecoin, percent_change, spot_price_from_reserves};
