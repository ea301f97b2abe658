use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::rollup::VolumePeriods;

/// Trading pair state and derived rolling-window volume.
///
/// Primary Key: pair address
/// Query Pattern: "Get current reserves and volume windows for pair X"
///
/// The volume fields are always recomputed from persisted volume snapshots
/// through the rolling-window aggregator, never hand-edited. A pair is never
/// deleted, only deactivated.
#[derive(Debug, Clone, Serialize)]
pub struct Pair {
    // Primary key
    pub id: String,

    // Topology (immutable after creation)
    pub token0: String,
    pub token1: String,

    // Current pool state (updated from reserve sync)
    pub reserve0: U256,
    pub reserve1: U256,
    pub total_supply: U256,

    // Rolling window volume (derived from snapshots)
    pub volume_1h: BigDecimal,
    pub volume_24h: BigDecimal,
    pub volume_7d: BigDecimal,
    pub volume_30d: BigDecimal,
    pub volume_1y: BigDecimal,

    // Lifecycle
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Pair {
    pub fn new(id: String, token0: String, token1: String, created_at: DateTime<Utc>) -> Self {
        Self {
            // Always lowercase addresses for consistent comparisons
            id: id.to_lowercase(),
            token0: token0.to_lowercase(),
            token1: token1.to_lowercase(),
            reserve0: U256::ZERO,
            reserve1: U256::ZERO,
            total_supply: U256::ZERO,
            volume_1h: BigDecimal::from(0),
            volume_24h: BigDecimal::from(0),
            volume_7d: BigDecimal::from(0),
            volume_30d: BigDecimal::from(0),
            volume_1y: BigDecimal::from(0),
            created_at,
            updated_at: created_at,
            is_active: true,
        }
    }

    /// Replace reserve state with the post-event values reported upstream.
    ///
    /// The engine never derives reserves from event amounts; the feed's sync
    /// data is authoritative.
    pub fn sync_reserves(
        &mut self,
        reserve0: U256,
        reserve1: U256,
        total_supply: Option<U256>,
        at: DateTime<Utc>,
    ) {
        self.reserve0 = reserve0;
        self.reserve1 = reserve1;
        if let Some(supply) = total_supply {
            self.total_supply = supply;
        }
        self.updated_at = at;
    }

    /// Overwrite the derived volume fields from a freshly aggregated result.
    pub fn apply_volume_periods(&mut self, periods: &VolumePeriods, at: DateTime<Utc>) {
        self.volume_1h = periods.volume_1h.clone();
        self.volume_24h = periods.volume_24h.clone();
        self.volume_7d = periods.volume_7d.clone();
        self.volume_30d = periods.volume_30d.clone();
        self.volume_1y = periods.volume_1y.clone();
        self.updated_at = at;
    }

    /// Counterpart token of `token` within this pair, if `token` is a member.
    pub fn other_token(&self, token: &str) -> Option<&str> {
        if token == self.token0 {
            Some(&self.token1)
        } else if token == self.token1 {
            Some(&self.token0)
        } else {
            None
        }
    }

    /// Reserve of `token` within this pair, if `token` is a member.
    pub fn reserve_of(&self, token: &str) -> Option<U256> {
        if token == self.token0 {
            Some(self.reserve0)
        } else if token == self.token1 {
            Some(self.reserve1)
        } else {
            None
        }
    }

    pub fn deactivate(&mut self, at: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = at;
    }
}
