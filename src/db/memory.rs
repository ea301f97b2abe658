use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;

use super::models::{PairVolumeSnapshot, SyncCheckpoint, TokenPriceSnapshot, Transaction};
use super::SnapshotStorage;

/// Map-backed [`SnapshotStorage`] adapter.
///
/// Keeps every record in process memory keyed by its natural id. Used by
/// tests and by deployments that serve rollups purely from the hot store;
/// a database-backed adapter plugs in behind the same trait.
#[derive(Default)]
pub struct MemoryStorage {
    volume_snapshots: RwLock<FxHashMap<String, PairVolumeSnapshot>>,
    price_snapshots: RwLock<FxHashMap<String, TokenPriceSnapshot>>,
    transactions: RwLock<FxHashMap<String, Transaction>>,
    checkpoint: RwLock<Option<SyncCheckpoint>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored volume snapshot by bucket id, if any.
    pub async fn volume_snapshot(&self, id: &str) -> Option<PairVolumeSnapshot> {
        self.volume_snapshots.read().await.get(id).cloned()
    }

    pub async fn volume_snapshot_count(&self) -> usize {
        self.volume_snapshots.read().await.len()
    }

    pub async fn transaction_count(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn price_snapshot_count(&self) -> usize {
        self.price_snapshots.read().await.len()
    }
}

#[async_trait]
impl SnapshotStorage for MemoryStorage {
    async fn upsert_volume_snapshot(&self, snapshot: &PairVolumeSnapshot) -> Result<()> {
        self.volume_snapshots
            .write()
            .await
            .insert(snapshot.id(), snapshot.clone());
        Ok(())
    }

    async fn upsert_price_snapshot(&self, snapshot: &TokenPriceSnapshot) -> Result<()> {
        self.price_snapshots
            .write()
            .await
            .insert(snapshot.id(), snapshot.clone());
        Ok(())
    }

    async fn record_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.transactions
            .write()
            .await
            .insert(transaction.id(), transaction.clone());
        Ok(())
    }

    async fn volume_snapshots_in_range(
        &self,
        pair_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PairVolumeSnapshot>> {
        let mut rows: Vec<PairVolumeSnapshot> = self
            .volume_snapshots
            .read()
            .await
            .values()
            .filter(|s| s.pair_id == pair_id && s.timestamp >= from && s.timestamp <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.timestamp);
        Ok(rows)
    }

    async fn latest_price_snapshot_at_or_before(
        &self,
        token_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<TokenPriceSnapshot>> {
        let latest = self
            .price_snapshots
            .read()
            .await
            .values()
            .filter(|s| s.token_id == token_id && s.timestamp <= cutoff)
            .max_by_key(|s| s.timestamp)
            .cloned();
        Ok(latest)
    }

    async fn load_checkpoint(&self) -> Result<Option<SyncCheckpoint>> {
        Ok(self.checkpoint.read().await.clone())
    }

    async fn save_checkpoint(&self, checkpoint: &SyncCheckpoint) -> Result<()> {
        *self.checkpoint.write().await = Some(checkpoint.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::SnapshotInterval;
    use bigdecimal::BigDecimal;

    fn ts(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn bucket(pair: &str, start_ms: i64, volume: i64) -> PairVolumeSnapshot {
        let mut s = PairVolumeSnapshot::open(
            pair.to_string(),
            SnapshotInterval::Hourly,
            ts(start_ms),
            ts(start_ms),
        );
        s.apply_contribution(&BigDecimal::from(volume));
        s
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_bucket_id() {
        let storage = MemoryStorage::new();

        storage
            .upsert_volume_snapshot(&bucket("0xpair", 3_600_000, 10))
            .await
            .unwrap();
        storage
            .upsert_volume_snapshot(&bucket("0xpair", 3_600_000, 25))
            .await
            .unwrap();

        assert_eq!(storage.volume_snapshot_count().await, 1);
        let stored = storage
            .volume_snapshot("0xpair:hourly:3600000")
            .await
            .unwrap();
        assert_eq!(stored.volume_usd(), &BigDecimal::from(25));
    }

    #[tokio::test]
    async fn test_range_query_is_inclusive_and_ordered() {
        let storage = MemoryStorage::new();
        for (start, volume) in [(0, 1), (3_600_000, 2), (7_200_000, 3), (10_800_000, 4)] {
            storage
                .upsert_volume_snapshot(&bucket("0xpair", start, volume))
                .await
                .unwrap();
        }
        storage
            .upsert_volume_snapshot(&bucket("0xother", 3_600_000, 99))
            .await
            .unwrap();

        let rows = storage
            .volume_snapshots_in_range("0xpair", ts(3_600_000), ts(7_200_000))
            .await
            .unwrap();

        let volumes: Vec<_> = rows.iter().map(|s| s.volume_usd().clone()).collect();
        assert_eq!(volumes, vec![BigDecimal::from(2), BigDecimal::from(3)]);
    }

    #[tokio::test]
    async fn test_latest_price_snapshot_respects_cutoff() {
        use crate::db::models::TokenPriceSnapshot;

        let storage = MemoryStorage::new();
        for millis in [1_000, 2_000, 3_000] {
            let snapshot = TokenPriceSnapshot::new(
                "0xtoken".to_string(),
                BigDecimal::from(millis),
                None,
                1,
                ts(millis),
            );
            storage.upsert_price_snapshot(&snapshot).await.unwrap();
        }

        let hit = storage
            .latest_price_snapshot_at_or_before("0xtoken", ts(2_500))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.price_usd, BigDecimal::from(2_000));

        let exact = storage
            .latest_price_snapshot_at_or_before("0xtoken", ts(2_000))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exact.price_usd, BigDecimal::from(2_000));

        let none = storage
            .latest_price_snapshot_at_or_before("0xtoken", ts(500))
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_checkpoint_roundtrip() {
        let storage = MemoryStorage::new();
        assert!(storage.load_checkpoint().await.unwrap().is_none());

        storage
            .save_checkpoint(&SyncCheckpoint::new(1_234))
            .await
            .unwrap();
        let loaded = storage.load_checkpoint().await.unwrap().unwrap();
        assert_eq!(loaded.last_applied_block, 1_234);
    }
}
