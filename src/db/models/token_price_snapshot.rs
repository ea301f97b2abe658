use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-horizon percentage price changes.
///
/// A `None` change means the baseline is missing or zero (undefined), which
/// downstream must render as absent, never as 0%.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceChanges {
    pub change_1h: Option<BigDecimal>,
    pub change_24h: Option<BigDecimal>,
    pub change_7d: Option<BigDecimal>,
    pub change_30d: Option<BigDecimal>,
}

/// One price observation for one token.
///
/// Append-only: snapshots are never mutated after creation and are ordered
/// by block number and timestamp for change computation. Recorded at a
/// coarser cadence than trades to bound write volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPriceSnapshot {
    pub token_id: String,
    pub price_usd: BigDecimal,
    pub changes: PriceChanges,
    pub fdv: Option<BigDecimal>,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

impl TokenPriceSnapshot {
    pub fn new(
        token_id: String,
        price_usd: BigDecimal,
        fdv: Option<BigDecimal>,
        block_number: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            token_id,
            price_usd,
            changes: PriceChanges::default(),
            fdv,
            block_number,
            timestamp,
        }
    }

    /// Composite persistence id, unique per (token, observation instant).
    pub fn id(&self) -> String {
        format!("{}:{}", self.token_id, self.timestamp.timestamp_millis())
    }
}
