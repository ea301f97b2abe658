//! Event application pipeline.
//!
//! [`RollupEngine`] is the single entry point: it validates and applies pair
//! events to hot volume buckets, drafts token price snapshots, and hands
//! finished records to a background flusher that persists them with the sync
//! checkpoint trailing the data it covers.

use std::sync::Arc;

use alloy::primitives::U256;
use anyhow::{anyhow, Context, Result};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::db::models::{
    Pair, PairEvent, PairVolumeSnapshot, PriceChanges, Token, TokenPriceSnapshot,
};
use crate::db::SnapshotStorage;
use crate::rollup::{aggregate_volume_periods, VolumePeriods};
use crate::utils::{percent_change, Window};

mod applier;
mod dedup;
mod flusher;

pub use applier::ApplyOutcome;

use applier::EngineState;
use flusher::{FlushMessage, SnapshotFlusher};

// ============================================================================
// Rollup Engine
// ============================================================================

/// Applies the ordered event feed to rollup state and serves window queries.
///
/// All mutable state sits behind one lock held only for synchronous work;
/// storage reads and flush sends happen outside it, so a slow backend never
/// blocks event application. A separate lock serializes everything that
/// enqueues flush messages, so channel order always equals apply and drain
/// order.
pub struct RollupEngine {
    state: Mutex<EngineState>,
    storage: Arc<dyn SnapshotStorage>,
    flush_sender: mpsc::Sender<FlushMessage>,
    flush_lock: Mutex<()>,
}

impl RollupEngine {
    /// Build the engine and spawn its flusher task.
    ///
    /// The returned handle joins the flusher; pass it back to
    /// [`RollupEngine::shutdown`] for an orderly stop.
    pub fn new(
        settings: &Settings,
        storage: Arc<dyn SnapshotStorage>,
        cancellation_token: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (flush_sender, flush_receiver) =
            mpsc::channel(settings.engine.flush_channel_capacity);

        let flusher = SnapshotFlusher::new(
            storage.clone(),
            flush_receiver,
            settings.engine.flush_max_retries,
            settings.engine.flush_backoff_ms,
        );
        let flusher_handle = tokio::spawn(flusher.run(cancellation_token));

        let engine = Self {
            state: Mutex::new(EngineState::new(&settings.engine)),
            storage,
            flush_sender,
            flush_lock: Mutex::new(()),
        };

        (engine, flusher_handle)
    }

    // ------------------------------------------------------------------------
    // Registration and Feed Control
    // ------------------------------------------------------------------------

    pub async fn register_token(&self, token: Token) {
        self.state.lock().await.register_token(token);
    }

    pub async fn register_pair(&self, pair: Pair) -> Result<()> {
        self.state.lock().await.register_pair(pair)
    }

    pub async fn sync_reserves(
        &self,
        pair_id: &str,
        reserve0: U256,
        reserve1: U256,
        total_supply: Option<U256>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.state
            .lock()
            .await
            .sync_reserves(pair_id, reserve0, reserve1, total_supply, at)
    }

    pub async fn deactivate_pair(&self, pair_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.state.lock().await.deactivate_pair(pair_id, at)
    }

    /// Load the persisted checkpoint and adopt it as the stale floor.
    /// Returns the block the feed should resume after (0 on a fresh store).
    pub async fn resume(&self) -> Result<u64> {
        let checkpoint = self
            .storage
            .load_checkpoint()
            .await
            .context("Failed to load sync checkpoint")?;

        let mut state = self.state.lock().await;
        state.resume(checkpoint.as_ref());
        drop(state);

        let block = checkpoint.map(|c| c.last_applied_block).unwrap_or(0);
        if block > 0 {
            info!("[engine] Resuming after checkpoint block {}", block);
        } else {
            info!("[engine] No checkpoint found, starting fresh");
        }
        Ok(block)
    }

    // ------------------------------------------------------------------------
    // Event Application
    // ------------------------------------------------------------------------

    /// Apply one event end to end: fold it into its hour bucket, queue its
    /// transaction record and any due price snapshots for persistence.
    pub async fn apply_event(
        &self,
        event: &PairEvent,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome> {
        // Held through the sends so a concurrent flush cannot slot a
        // checkpoint between this event's state change and its records
        // entering the channel.
        let _flush_guard = self.flush_lock.lock().await;

        let (outcome, effects) = {
            let mut state = self.state.lock().await;
            state.apply(event, now)?
        };

        match outcome {
            ApplyOutcome::Duplicate => {
                debug!("[engine] Dropped duplicate event {}", event.id);
            },
            ApplyOutcome::Stale => {
                debug!("[engine] Dropped stale event {} below checkpoint", event.id);
            },
            ApplyOutcome::Applied { .. } => {},
        }

        let effects = match effects {
            Some(effects) => effects,
            None => return Ok(outcome),
        };

        self.send(FlushMessage::Transactions(vec![effects.transaction]))
            .await?;

        for draft in effects.price_drafts {
            let changes = self
                .price_changes(&draft.token_id, &draft.price_usd, draft.timestamp)
                .await?;
            let mut snapshot = TokenPriceSnapshot::new(
                draft.token_id,
                draft.price_usd,
                draft.fdv,
                draft.block_number,
                draft.timestamp,
            );
            snapshot.changes = changes;
            self.send(FlushMessage::PriceSnapshot(snapshot)).await?;
        }

        Ok(outcome)
    }

    async fn price_changes(
        &self,
        token_id: &str,
        price: &BigDecimal,
        at: DateTime<Utc>,
    ) -> Result<PriceChanges> {
        Ok(PriceChanges {
            change_1h: self.change_over(token_id, price, at, Window::Hour1).await?,
            change_24h: self.change_over(token_id, price, at, Window::Hour24).await?,
            change_7d: self.change_over(token_id, price, at, Window::Day7).await?,
            change_30d: self.change_over(token_id, price, at, Window::Day30).await?,
        })
    }

    /// Percent change against the latest persisted price at or before the
    /// window start. `None` when no baseline exists or it is zero.
    async fn change_over(
        &self,
        token_id: &str,
        price: &BigDecimal,
        at: DateTime<Utc>,
        window: Window,
    ) -> Result<Option<BigDecimal>> {
        let baseline = self
            .storage
            .latest_price_snapshot_at_or_before(token_id, window.start(at))
            .await?;
        Ok(percent_change(
            price,
            baseline.as_ref().map(|s| &s.price_usd),
        ))
    }

    // ------------------------------------------------------------------------
    // Flushing and Pruning
    // ------------------------------------------------------------------------

    /// Queue every dirty bucket for persistence, followed by a checkpoint at
    /// the highest applied block. Returns the number of buckets queued.
    pub async fn flush_dirty(&self) -> Result<usize> {
        // Drain and send atomically; two interleaved flushes could otherwise
        // enqueue a newer batch behind an older one and regress persisted
        // totals.
        let _flush_guard = self.flush_lock.lock().await;

        let (snapshots, highest_block) = {
            let mut state = self.state.lock().await;
            (state.drain_dirty(), state.highest_block())
        };

        let count = snapshots.len();
        if count > 0 {
            self.send(FlushMessage::Snapshots(snapshots)).await?;
            debug!("[engine] Queued {} dirty buckets for flush", count);
        }
        if highest_block > 0 {
            self.send(FlushMessage::Checkpoint(highest_block)).await?;
        }

        Ok(count)
    }

    /// Drop hot buckets past the retention horizon. Unflushed buckets are
    /// always kept regardless of age.
    pub async fn prune(&self, now: DateTime<Utc>) -> usize {
        self.state.lock().await.prune(now)
    }

    pub async fn hot_bucket_count(&self) -> usize {
        self.state.lock().await.hot_len()
    }

    // ------------------------------------------------------------------------
    // Window Queries
    // ------------------------------------------------------------------------

    /// Rolling-window volume totals for one pair at `anchor`.
    ///
    /// Merges persisted snapshots with hot buckets; where both hold the same
    /// bucket the hot copy wins, since it may carry contributions not yet
    /// flushed. An empty result is all zeros.
    pub async fn volume_periods(
        &self,
        pair_id: &str,
        anchor: DateTime<Utc>,
    ) -> Result<VolumePeriods> {
        let hot = {
            let state = self.state.lock().await;
            state.hot_snapshots_for(pair_id)
        };

        let from = Window::Year1.start(anchor);
        let persisted = self
            .storage
            .volume_snapshots_in_range(pair_id, from, anchor)
            .await?;

        let mut by_bucket: FxHashMap<String, PairVolumeSnapshot> = FxHashMap::default();
        for snapshot in persisted {
            by_bucket.insert(snapshot.id(), snapshot);
        }
        for snapshot in hot {
            by_bucket.insert(snapshot.id(), snapshot);
        }

        Ok(aggregate_volume_periods(anchor, by_bucket.values()))
    }

    /// Recompute a pair's volume windows and write them onto the pair record.
    pub async fn refresh_pair_volumes(
        &self,
        pair_id: &str,
        now: DateTime<Utc>,
    ) -> Result<VolumePeriods> {
        let periods = self.volume_periods(pair_id, now).await?;
        self.state
            .lock()
            .await
            .apply_pair_volumes(pair_id, &periods, now)?;
        Ok(periods)
    }

    /// Refresh volume windows for every registered pair.
    pub async fn refresh_all_pair_volumes(&self, now: DateTime<Utc>) -> Result<usize> {
        let pair_ids = {
            let state = self.state.lock().await;
            state.pair_ids()
        };

        let count = pair_ids.len();
        for pair_id in &pair_ids {
            self.refresh_pair_volumes(pair_id, now).await?;
        }
        Ok(count)
    }

    pub async fn pair(&self, pair_id: &str) -> Option<Pair> {
        self.state.lock().await.pair(pair_id).cloned()
    }

    // ------------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------------

    /// Flush everything outstanding, stop the flusher and wait for it.
    pub async fn shutdown(&self, flusher_handle: JoinHandle<()>) -> Result<()> {
        self.flush_dirty().await?;

        if self.flush_sender.send(FlushMessage::Shutdown).await.is_err() {
            warn!("[engine] Flusher already stopped");
        }

        match tokio::time::timeout(std::time::Duration::from_secs(10), flusher_handle).await {
            Ok(result) => result.context("Flusher task panicked")?,
            Err(_) => warn!("[engine] Flusher did not stop within timeout"),
        }

        info!("[engine] Shutdown complete");
        Ok(())
    }

    async fn send(&self, message: FlushMessage) -> Result<()> {
        self.flush_sender
            .send(message)
            .await
            .map_err(|_| anyhow!("Flush channel closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{EventId, EventPayload, SyncCheckpoint};
    use crate::db::MemoryStorage;
    use alloy::primitives::U256;

    const HOUR_MS: i64 = 3_600_000;

    fn ts(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn pow10(exp: u64) -> U256 {
        U256::from(10u64).pow(U256::from(exp))
    }

    fn swap_event(block: u64, log_index: u32, at_ms: i64) -> PairEvent {
        PairEvent {
            id: EventId::new(block, log_index),
            pair_id: "0xpool".to_string(),
            timestamp: ts(at_ms),
            sender: "0xtrader".to_string(),
            payload: EventPayload::Swap {
                token_in: "0xusdc".to_string(),
                token_out: "0xweth".to_string(),
                amount_in: U256::from(3_000u64) * pow10(6),
                amount_out: pow10(18),
            },
        }
    }

    async fn engine_with_pool() -> (RollupEngine, Arc<MemoryStorage>, JoinHandle<()>) {
        let settings = Settings::default();
        let storage = Arc::new(MemoryStorage::new());
        let (engine, handle) =
            RollupEngine::new(&settings, storage.clone(), CancellationToken::new());

        engine
            .register_token(Token::new(
                "0xweth".to_string(),
                "WETH".to_string(),
                "Wrapped Ether".to_string(),
                18,
            ))
            .await;
        engine
            .register_token(Token::new(
                "0xusdc".to_string(),
                "USDC".to_string(),
                "USD Coin".to_string(),
                6,
            ))
            .await;
        engine
            .register_pair(Pair::new(
                "0xpool".to_string(),
                "0xweth".to_string(),
                "0xusdc".to_string(),
                ts(0),
            ))
            .await
            .unwrap();
        engine
            .sync_reserves(
                "0xpool",
                U256::from(1_000u64) * pow10(18),
                U256::from(3_000_000u64) * pow10(6),
                None,
                ts(0),
            )
            .await
            .unwrap();

        (engine, storage, handle)
    }

    #[tokio::test]
    async fn test_apply_flush_shutdown_persists_everything() {
        let (engine, storage, handle) = engine_with_pool().await;

        let outcome = engine
            .apply_event(&swap_event(1_200, 0, 10_000), ts(10_000))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                volume_usd: BigDecimal::from(3_000)
            }
        );

        engine.flush_dirty().await.unwrap();
        engine.shutdown(handle).await.unwrap();

        let bucket = storage.volume_snapshot("0xpool:hourly:0").await.unwrap();
        assert_eq!(bucket.volume_usd(), &BigDecimal::from(3_000));
        assert_eq!(bucket.transaction_count(), 1);

        assert_eq!(storage.transaction_count().await, 1);

        let checkpoint = storage.load_checkpoint().await.unwrap().unwrap();
        assert_eq!(checkpoint.last_applied_block, 1_200);
    }

    #[tokio::test]
    async fn test_duplicate_redelivery_is_idempotent_end_to_end() {
        let (engine, storage, handle) = engine_with_pool().await;
        let event = swap_event(1_200, 0, 10_000);

        engine.apply_event(&event, ts(10_000)).await.unwrap();
        let second = engine.apply_event(&event, ts(11_000)).await.unwrap();
        assert_eq!(second, ApplyOutcome::Duplicate);

        engine.shutdown(handle).await.unwrap();

        let bucket = storage.volume_snapshot("0xpool:hourly:0").await.unwrap();
        assert_eq!(bucket.volume_usd(), &BigDecimal::from(3_000));
        assert_eq!(bucket.transaction_count(), 1);
        assert_eq!(storage.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn test_volume_periods_merge_does_not_double_count() {
        let (engine, storage, handle) = engine_with_pool().await;

        engine
            .apply_event(&swap_event(1_200, 0, 10_000), ts(10_000))
            .await
            .unwrap();
        engine.flush_dirty().await.unwrap();

        // Second hit on the same bucket leaves the hot copy ahead of the
        // persisted one.
        engine
            .apply_event(&swap_event(1_201, 0, 20_000), ts(20_000))
            .await
            .unwrap();

        let periods = engine.volume_periods("0xpool", ts(30_000)).await.unwrap();
        assert_eq!(periods.volume_1h, BigDecimal::from(6_000));
        assert_eq!(periods.volume_24h, BigDecimal::from(6_000));

        engine.shutdown(handle).await.unwrap();
        let bucket = storage.volume_snapshot("0xpool:hourly:0").await.unwrap();
        assert_eq!(bucket.volume_usd(), &BigDecimal::from(6_000));
    }

    #[tokio::test]
    async fn test_concurrent_flushes_never_regress_persisted_state() {
        let (engine, storage, handle) = engine_with_pool().await;
        let engine = Arc::new(engine);

        // Every task applies into the same hour bucket and races a flush
        // against the others.
        let mut tasks = Vec::new();
        for i in 0..8u64 {
            let engine = engine.clone();
            tasks.push(tokio::spawn(async move {
                engine
                    .apply_event(&swap_event(1_000 + i, 0, 10_000), ts(10_000))
                    .await
                    .unwrap();
                engine.flush_dirty().await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        engine.flush_dirty().await.unwrap();
        engine.shutdown(handle).await.unwrap();

        let bucket = storage.volume_snapshot("0xpool:hourly:0").await.unwrap();
        assert_eq!(bucket.volume_usd(), &BigDecimal::from(24_000));
        assert_eq!(bucket.transaction_count(), 8);

        let checkpoint = storage.load_checkpoint().await.unwrap().unwrap();
        assert_eq!(checkpoint.last_applied_block, 1_007);
    }

    #[tokio::test]
    async fn test_price_snapshot_changes_use_persisted_baseline() {
        let (engine, storage, handle) = engine_with_pool().await;
        let now_ms = 10 * HOUR_MS;

        storage
            .upsert_price_snapshot(&TokenPriceSnapshot::new(
                "0xweth".to_string(),
                BigDecimal::from(1_500),
                None,
                1_000,
                ts(now_ms - 2 * HOUR_MS),
            ))
            .await
            .unwrap();

        engine
            .apply_event(&swap_event(1_200, 0, now_ms), ts(now_ms))
            .await
            .unwrap();
        engine.shutdown(handle).await.unwrap();

        let snapshot = storage
            .latest_price_snapshot_at_or_before("0xweth", ts(now_ms))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.price_usd, BigDecimal::from(3_000));
        assert_eq!(snapshot.changes.change_1h, Some(BigDecimal::from(100)));
        assert_eq!(snapshot.changes.change_24h, None);
        assert_eq!(snapshot.changes.change_30d, None);
    }

    #[tokio::test]
    async fn test_resume_marks_old_blocks_stale() {
        let (engine, storage, handle) = engine_with_pool().await;

        storage
            .save_checkpoint(&SyncCheckpoint::new(100))
            .await
            .unwrap();
        let resumed = engine.resume().await.unwrap();
        assert_eq!(resumed, 100);

        let stale = engine
            .apply_event(&swap_event(90, 0, 10_000), ts(10_000))
            .await
            .unwrap();
        assert_eq!(stale, ApplyOutcome::Stale);

        let applied = engine
            .apply_event(&swap_event(150, 0, 10_000), ts(10_000))
            .await
            .unwrap();
        assert!(matches!(applied, ApplyOutcome::Applied { .. }));

        engine.shutdown(handle).await.unwrap();
        let checkpoint = storage.load_checkpoint().await.unwrap().unwrap();
        assert_eq!(checkpoint.last_applied_block, 150);
    }

    #[tokio::test]
    async fn test_refresh_writes_windows_onto_pair_record() {
        let (engine, _storage, handle) = engine_with_pool().await;

        engine
            .apply_event(&swap_event(1_200, 0, 10_000), ts(10_000))
            .await
            .unwrap();

        let refreshed = engine.refresh_all_pair_volumes(ts(60_000)).await.unwrap();
        assert_eq!(refreshed, 1);

        let pair = engine.pair("0xpool").await.unwrap();
        assert_eq!(pair.volume_1h, BigDecimal::from(3_000));
        assert_eq!(pair.volume_24h, BigDecimal::from(3_000));
        assert_eq!(pair.updated_at, ts(60_000));

        engine.shutdown(handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_prune_drops_only_flushed_expired_buckets() {
        let (engine, _storage, handle) = engine_with_pool().await;
        let now_ms = 1_000 * HOUR_MS;

        engine
            .apply_event(&swap_event(1_200, 0, now_ms - 25 * HOUR_MS), ts(now_ms))
            .await
            .unwrap();
        engine
            .apply_event(&swap_event(1_201, 0, now_ms - HOUR_MS), ts(now_ms))
            .await
            .unwrap();

        // Dirty buckets survive pruning whatever their age.
        assert_eq!(engine.prune(ts(now_ms)).await, 0);
        assert_eq!(engine.hot_bucket_count().await, 2);

        engine.flush_dirty().await.unwrap();
        assert_eq!(engine.prune(ts(now_ms)).await, 1);
        assert_eq!(engine.hot_bucket_count().await, 1);

        engine.shutdown(handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_unregistered_pair_is_rejected() {
        let (engine, _storage, handle) = engine_with_pool().await;

        let mut event = swap_event(1_200, 0, 10_000);
        event.pair_id = "0xother".to_string();

        let err = engine.apply_event(&event, ts(10_000)).await.unwrap_err();
        assert!(err.to_string().contains("unknown pair"));

        engine.shutdown(handle).await.unwrap();
    }
}
