use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::models::{EventId, EventKind, EventPayload, PairEvent};

/// Immutable audit record of one applied event.
///
/// Write-once: the trail from which aggregates are derived and re-derived;
/// never updated after insert. Kind-specific amount fields are populated
/// from the event payload, the rest stay empty.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    // Identifiers
    pub event_id: EventId,
    pub kind: EventKind,
    pub pair_id: String,
    pub sender: String,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,

    // Swap legs
    pub token_in: Option<String>,
    pub token_out: Option<String>,
    pub amount_in: Option<U256>,
    pub amount_out: Option<U256>,

    // Liquidity legs
    pub amount_a: Option<U256>,
    pub amount_b: Option<U256>,
    pub liquidity: Option<U256>,
}

impl Transaction {
    pub fn from_event(event: &PairEvent) -> Self {
        let mut record = Self {
            event_id: event.id,
            kind: event.kind(),
            pair_id: event.pair_id.clone(),
            sender: event.sender.clone(),
            block_number: event.block_number(),
            timestamp: event.timestamp,
            token_in: None,
            token_out: None,
            amount_in: None,
            amount_out: None,
            amount_a: None,
            amount_b: None,
            liquidity: None,
        };

        match &event.payload {
            EventPayload::Swap {
                token_in,
                token_out,
                amount_in,
                amount_out,
            } => {
                record.token_in = Some(token_in.clone());
                record.token_out = Some(token_out.clone());
                record.amount_in = Some(*amount_in);
                record.amount_out = Some(*amount_out);
            },
            EventPayload::AddLiquidity {
                amount_a,
                amount_b,
                liquidity,
            }
            | EventPayload::RemoveLiquidity {
                amount_a,
                amount_b,
                liquidity,
            } => {
                record.amount_a = Some(*amount_a);
                record.amount_b = Some(*amount_b);
                record.liquidity = Some(*liquidity);
            },
        }

        record
    }

    pub fn id(&self) -> String {
        self.event_id.to_string()
    }
}
