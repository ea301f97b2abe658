use std::fmt;
use std::str::FromStr;

use alloy::primitives::U256;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identity of one on-chain event: block number plus log index.
///
/// Ordering follows chain order (block first, then log index), which is also
/// the delivery order guaranteed by the upstream feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId {
    pub block_number: u64,
    pub log_index: u32,
}

impl EventId {
    pub fn new(block_number: u64, log_index: u32) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.block_number, self.log_index)
    }
}

/// Kind of pair activity an event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Swap,
    AddLiquidity,
    RemoveLiquidity,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Swap => "swap",
            EventKind::AddLiquidity => "add_liquidity",
            EventKind::RemoveLiquidity => "remove_liquidity",
        }
    }
}

/// Kind-specific amounts of a pair event.
///
/// Swap legs are directional (in/out); liquidity events carry both pool legs
/// plus the LP amount minted or burned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    Swap {
        token_in: String,
        token_out: String,
        amount_in: U256,
        amount_out: U256,
    },
    AddLiquidity {
        amount_a: U256,
        amount_b: U256,
        liquidity: U256,
    },
    RemoveLiquidity {
        amount_a: U256,
        amount_b: U256,
        liquidity: U256,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Swap { .. } => EventKind::Swap,
            EventPayload::AddLiquidity { .. } => EventKind::AddLiquidity,
            EventPayload::RemoveLiquidity { .. } => EventKind::RemoveLiquidity,
        }
    }
}

/// One typed, validated pair event as the engine applies it.
///
/// Produced from [`WirePairEvent`] by [`PairEvent::from_wire`]; the feed
/// delivers these strictly ordered by `(block_number, log_index)` but may
/// redeliver the same id.
#[derive(Debug, Clone)]
pub struct PairEvent {
    pub id: EventId,
    pub pair_id: String,
    pub timestamp: DateTime<Utc>,
    pub sender: String,
    pub payload: EventPayload,
}

impl PairEvent {
    pub fn block_number(&self) -> u64 {
        self.id.block_number
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Decode a wire event into its typed form.
    ///
    /// Missing or unparseable numeric fields are rejected with an error
    /// naming the field; a rejected event must never be zeroed into the
    /// aggregates.
    pub fn from_wire(wire: WirePairEvent) -> Result<Self> {
        if wire.pair_id.is_empty() {
            bail!("Event at {}-{} has no pair id", wire.block_number, wire.log_index);
        }

        let timestamp = DateTime::from_timestamp_millis(wire.timestamp_ms).with_context(|| {
            format!(
                "Event {}-{} has out-of-range timestamp {}",
                wire.block_number, wire.log_index, wire.timestamp_ms
            )
        })?;

        let payload = match wire.kind {
            EventKind::Swap => EventPayload::Swap {
                token_in: required_token("token_in", wire.token_in.as_deref())?,
                token_out: required_token("token_out", wire.token_out.as_deref())?,
                amount_in: parse_amount("amount_in", wire.amount_in.as_deref())?,
                amount_out: parse_amount("amount_out", wire.amount_out.as_deref())?,
            },
            EventKind::AddLiquidity => EventPayload::AddLiquidity {
                amount_a: parse_amount("amount_a", wire.amount_a.as_deref())?,
                amount_b: parse_amount("amount_b", wire.amount_b.as_deref())?,
                liquidity: parse_amount("liquidity", wire.liquidity.as_deref())?,
            },
            EventKind::RemoveLiquidity => EventPayload::RemoveLiquidity {
                amount_a: parse_amount("amount_a", wire.amount_a.as_deref())?,
                amount_b: parse_amount("amount_b", wire.amount_b.as_deref())?,
                liquidity: parse_amount("liquidity", wire.liquidity.as_deref())?,
            },
        };

        Ok(Self {
            id: EventId::new(wire.block_number, wire.log_index),
            // Always lowercase addresses for consistent comparisons
            pair_id: wire.pair_id.to_lowercase(),
            timestamp,
            sender: wire.sender.to_lowercase(),
            payload,
        })
    }
}

/// Wire form of a pair event as the harness delivers it.
///
/// Amounts are decimal or 0x-prefixed hex strings so arbitrary 256-bit
/// values survive JSON transport; kind-specific fields are optional at this
/// layer and validated during decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirePairEvent {
    pub pair_id: String,
    pub block_number: u64,
    pub log_index: u32,
    pub timestamp_ms: i64,
    pub kind: EventKind,
    #[serde(default)]
    pub sender: String,

    // Swap legs
    #[serde(default)]
    pub token_in: Option<String>,
    #[serde(default)]
    pub token_out: Option<String>,
    #[serde(default)]
    pub amount_in: Option<String>,
    #[serde(default)]
    pub amount_out: Option<String>,

    // Liquidity legs
    #[serde(default)]
    pub amount_a: Option<String>,
    #[serde(default)]
    pub amount_b: Option<String>,
    #[serde(default)]
    pub liquidity: Option<String>,
}

fn required_token(field: &str, value: Option<&str>) -> Result<String> {
    let token = value.with_context(|| format!("Swap event is missing '{}'", field))?;
    if token.is_empty() {
        bail!("Swap event has empty '{}'", field);
    }
    Ok(token.to_lowercase())
}

fn parse_amount(field: &str, value: Option<&str>) -> Result<U256> {
    let raw = value.with_context(|| format!("Event is missing amount field '{}'", field))?;
    U256::from_str(raw).with_context(|| format!("Failed to parse '{}' amount: {}", field, raw))
}
