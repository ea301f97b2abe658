use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod models;

mod memory;

pub use memory::MemoryStorage;

use models::{
    PairVolumeSnapshot, SyncCheckpoint, TokenPriceSnapshot, Transaction,
};

// ============================================================================
// Storage Port
// ============================================================================

/// Durable store for rollup snapshots, transactions and the sync checkpoint.
///
/// Every write is an idempotent upsert keyed by the record's natural id, so
/// the flusher can safely re-send a batch after a partial failure. Backends
/// must not deduplicate events themselves; that happens upstream in the
/// engine before anything reaches this trait.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Insert or replace a volume snapshot by its bucket identity
    /// (`pairId:interval:bucketStart`).
    async fn upsert_volume_snapshot(&self, snapshot: &PairVolumeSnapshot) -> Result<()>;

    /// Insert or replace a token price snapshot by `tokenId:timestamp`.
    async fn upsert_price_snapshot(&self, snapshot: &TokenPriceSnapshot) -> Result<()>;

    /// Insert or replace a flattened transaction record by event id.
    async fn record_transaction(&self, transaction: &Transaction) -> Result<()>;

    /// Volume snapshots for one pair with `from <= timestamp <= to`,
    /// ordered by bucket start ascending.
    async fn volume_snapshots_in_range(
        &self,
        pair_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PairVolumeSnapshot>>;

    /// Most recent price snapshot for a token with `timestamp <= cutoff`,
    /// used as the baseline for percent-change calculations.
    async fn latest_price_snapshot_at_or_before(
        &self,
        token_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<TokenPriceSnapshot>>;

    /// Last durably persisted checkpoint, `None` on a fresh store.
    async fn load_checkpoint(&self) -> Result<Option<SyncCheckpoint>>;

    /// Persist the checkpoint. Called only after the data rows it covers
    /// have been written.
    async fn save_checkpoint(&self, checkpoint: &SyncCheckpoint) -> Result<()>;
}
