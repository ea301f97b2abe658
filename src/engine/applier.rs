use alloy::primitives::U256;
use anyhow::{bail, Context, Result};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use num_traits::Zero;
use rustc_hash::FxHashMap;

use crate::config::EngineSettings;
use crate::db::models::{
    EventPayload, Pair, PairEvent, PairVolumeSnapshot, SyncCheckpoint, Token, Transaction,
};
use crate::rollup::{VolumePeriods, VolumeSnapshotStore};
use crate::utils::{fdv, spot_price_from_reserves, usd_value};

use super::dedup::AppliedEventLog;

// ============================================================================
// Apply Results
// ============================================================================

/// What applying one event did to the aggregates.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// First delivery; the event's USD value was folded into its bucket.
    Applied { volume_usd: BigDecimal },
    /// Redelivered id, nothing changed.
    Duplicate,
    /// At or below the resumed checkpoint block, already covered by
    /// persisted data from a previous run.
    Stale,
}

/// Records to persist for an applied event.
#[derive(Debug)]
pub(crate) struct ApplyEffects {
    pub transaction: Transaction,
    pub price_drafts: Vec<PriceDraft>,
}

/// A price observation pending change computation against persisted history.
#[derive(Debug)]
pub(crate) struct PriceDraft {
    pub token_id: String,
    pub price_usd: BigDecimal,
    pub fdv: Option<BigDecimal>,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Engine State
// ============================================================================

/// Mutable engine state: registered pairs and tokens, hot volume buckets and
/// the applied-event log. All methods are synchronous; the async facade holds
/// the lock only for the duration of one call.
pub(crate) struct EngineState {
    store: VolumeSnapshotStore,
    pairs: FxHashMap<String, Pair>,
    tokens: FxHashMap<String, Token>,
    applied: AppliedEventLog,
    last_price_snapshot: FxHashMap<String, DateTime<Utc>>,
    price_snapshot_interval: Duration,
    highest_block: u64,
    resume_floor: Option<u64>,
}

impl EngineState {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            store: VolumeSnapshotStore::new(settings.retention_hours),
            pairs: FxHashMap::default(),
            tokens: FxHashMap::default(),
            applied: AppliedEventLog::new(
                settings.dedup_capacity,
                std::time::Duration::from_secs(settings.dedup_ttl_secs),
            ),
            last_price_snapshot: FxHashMap::default(),
            price_snapshot_interval: Duration::seconds(settings.price_snapshot_interval_secs as i64),
            highest_block: 0,
            resume_floor: None,
        }
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    pub fn register_token(&mut self, token: Token) {
        self.tokens.insert(token.address.clone(), token);
    }

    /// Register a pair. Both member tokens must already be registered.
    pub fn register_pair(&mut self, pair: Pair) -> Result<()> {
        if !self.tokens.contains_key(&pair.token0) || !self.tokens.contains_key(&pair.token1) {
            bail!(
                "Pair {} references unregistered tokens {} / {}",
                pair.id,
                pair.token0,
                pair.token1
            );
        }
        self.pairs.insert(pair.id.clone(), pair);
        Ok(())
    }

    pub fn sync_reserves(
        &mut self,
        pair_id: &str,
        reserve0: U256,
        reserve1: U256,
        total_supply: Option<U256>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let pair = self
            .pairs
            .get_mut(pair_id)
            .with_context(|| format!("Cannot sync reserves for unknown pair {}", pair_id))?;
        pair.sync_reserves(reserve0, reserve1, total_supply, at);
        Ok(())
    }

    pub fn deactivate_pair(&mut self, pair_id: &str, at: DateTime<Utc>) -> Result<()> {
        let pair = self
            .pairs
            .get_mut(pair_id)
            .with_context(|| format!("Cannot deactivate unknown pair {}", pair_id))?;
        pair.deactivate(at);
        Ok(())
    }

    /// Adopt a persisted checkpoint. Events at or below it are stale.
    pub fn resume(&mut self, checkpoint: Option<&SyncCheckpoint>) {
        if let Some(checkpoint) = checkpoint {
            self.resume_floor = Some(checkpoint.last_applied_block);
            self.highest_block = checkpoint.last_applied_block;
        }
    }

    // ------------------------------------------------------------------------
    // Event Application
    // ------------------------------------------------------------------------

    /// Apply one event to the hot aggregates.
    ///
    /// Validation failures (unknown pair, unregistered token, swap legs
    /// outside the pair) are errors and leave no trace, so a corrected
    /// redelivery of the same id can still apply. Past validation the event
    /// is marked applied and every mutation happens before returning.
    pub fn apply(
        &mut self,
        event: &PairEvent,
        now: DateTime<Utc>,
    ) -> Result<(ApplyOutcome, Option<ApplyEffects>)> {
        if let Some(floor) = self.resume_floor {
            if event.block_number() <= floor {
                return Ok((ApplyOutcome::Stale, None));
            }
        }

        if self.applied.contains(&event.id) {
            return Ok((ApplyOutcome::Duplicate, None));
        }

        let pair = self
            .pairs
            .get(&event.pair_id)
            .with_context(|| format!("Event {} references unknown pair {}", event.id, event.pair_id))?;

        let volume_usd = self.event_usd_value(pair, event)?;
        let price_drafts = self.draft_price_snapshots(pair, event);

        self.applied.observe(event.id);

        let bucket = self
            .store
            .get_or_create_bucket(&event.pair_id, event.timestamp, now);
        bucket.apply_contribution(&volume_usd);

        for draft in &price_drafts {
            self.last_price_snapshot
                .insert(draft.token_id.clone(), draft.timestamp);
        }

        if event.block_number() > self.highest_block {
            self.highest_block = event.block_number();
        }

        let effects = ApplyEffects {
            transaction: Transaction::from_event(event),
            price_drafts,
        };

        Ok((ApplyOutcome::Applied { volume_usd }, Some(effects)))
    }

    fn event_usd_value(&self, pair: &Pair, event: &PairEvent) -> Result<BigDecimal> {
        match &event.payload {
            EventPayload::Swap {
                token_in,
                token_out,
                amount_in,
                amount_out,
            } => {
                if pair.other_token(token_in).is_none() || pair.other_token(token_out).is_none() {
                    bail!(
                        "Swap {} references tokens outside pair {}",
                        event.id,
                        pair.id
                    );
                }
                let in_token = self.token(token_in)?;
                let out_token = self.token(token_out)?;
                Ok(self.swap_usd_value(pair, (out_token, *amount_out), (in_token, *amount_in)))
            },
            EventPayload::AddLiquidity {
                amount_a, amount_b, ..
            }
            | EventPayload::RemoveLiquidity {
                amount_a, amount_b, ..
            } => {
                // Liquidity moves both legs, so both contribute to volume.
                let token0 = self.token(&pair.token0)?;
                let token1 = self.token(&pair.token1)?;
                let leg_a = self.leg_usd_value(pair, token0, *amount_a);
                let leg_b = self.leg_usd_value(pair, token1, *amount_b);
                Ok(leg_a + leg_b)
            },
        }
    }

    /// Value a swap from its most reliable leg.
    ///
    /// A stable leg counts at par and is immune to reserve skew, so either
    /// stable leg wins over a spot-derived one. With no stable leg we fall
    /// back to a nonzero spot price, preferring the outgoing side. A trade
    /// with no usable leg contributes zero but is still counted.
    fn swap_usd_value(
        &self,
        pair: &Pair,
        out_leg: (&Token, U256),
        in_leg: (&Token, U256),
    ) -> BigDecimal {
        for (token, amount) in [out_leg, in_leg] {
            if token.is_stable() {
                return usd_value(amount, token.decimals as u32, &BigDecimal::from(1));
            }
        }

        for (token, amount) in [out_leg, in_leg] {
            if let Some(price) = self.token_price(pair, token) {
                if !price.is_zero() {
                    return usd_value(amount, token.decimals as u32, &price);
                }
            }
        }

        BigDecimal::from(0)
    }

    fn leg_usd_value(&self, pair: &Pair, token: &Token, amount: U256) -> BigDecimal {
        match self.token_price(pair, token) {
            Some(price) => usd_value(amount, token.decimals as u32, &price),
            None => BigDecimal::from(0),
        }
    }

    /// USD price of a pair member, or `None` when the pair has no stable
    /// side to anchor a valuation against.
    fn token_price(&self, pair: &Pair, token: &Token) -> Option<BigDecimal> {
        if token.is_stable() {
            return Some(BigDecimal::from(1));
        }

        let other_address = pair.other_token(&token.address)?;
        let other = self.tokens.get(other_address)?;
        if !other.is_stable() {
            return None;
        }

        let reserve_token = pair.reserve_of(&token.address)?;
        let reserve_other = pair.reserve_of(&other.address)?;
        Some(spot_price_from_reserves(
            reserve_token,
            reserve_other,
            token.decimals as u32,
            other.decimals as u32,
        ))
    }

    fn token(&self, address: &str) -> Result<&Token> {
        self.tokens
            .get(address)
            .with_context(|| format!("Token {} is not registered", address))
    }

    // ------------------------------------------------------------------------
    // Price Snapshots
    // ------------------------------------------------------------------------

    fn draft_price_snapshots(&self, pair: &Pair, event: &PairEvent) -> Vec<PriceDraft> {
        let mut drafts = Vec::new();

        for address in [&pair.token0, &pair.token1] {
            let token = match self.tokens.get(address) {
                Some(token) => token,
                None => continue,
            };
            let price = match self.token_price(pair, token) {
                Some(price) => price,
                None => continue,
            };
            if !self.price_snapshot_due(address, event.timestamp) {
                continue;
            }

            drafts.push(PriceDraft {
                token_id: address.clone(),
                fdv: fdv(token.total_supply, token.decimals as u32, &price),
                price_usd: price,
                block_number: event.block_number(),
                timestamp: event.timestamp,
            });
        }

        drafts
    }

    /// Event time, not wall time, gates the cadence so replayed history
    /// snapshots at the same instants it originally would have.
    fn price_snapshot_due(&self, token_id: &str, at: DateTime<Utc>) -> bool {
        match self.last_price_snapshot.get(token_id) {
            Some(last) => at.signed_duration_since(*last) >= self.price_snapshot_interval,
            None => true,
        }
    }

    // ------------------------------------------------------------------------
    // Store Access
    // ------------------------------------------------------------------------

    pub fn pair(&self, pair_id: &str) -> Option<&Pair> {
        self.pairs.get(pair_id)
    }

    pub fn pair_ids(&self) -> Vec<String> {
        self.pairs.keys().cloned().collect()
    }

    pub fn apply_pair_volumes(
        &mut self,
        pair_id: &str,
        periods: &VolumePeriods,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let pair = self
            .pairs
            .get_mut(pair_id)
            .with_context(|| format!("Cannot refresh volumes for unknown pair {}", pair_id))?;
        pair.apply_volume_periods(periods, at);
        Ok(())
    }

    pub fn hot_snapshots_for(&self, pair_id: &str) -> Vec<PairVolumeSnapshot> {
        self.store.snapshots_for_pair(pair_id).cloned().collect()
    }

    pub fn drain_dirty(&mut self) -> Vec<PairVolumeSnapshot> {
        self.store.drain_dirty()
    }

    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        self.store.prune(now)
    }

    pub fn hot_len(&self) -> usize {
        self.store.hot_len()
    }

    pub fn highest_block(&self) -> u64 {
        self.highest_block
    }
}
