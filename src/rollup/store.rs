use chrono::{DateTime, Duration, Utc};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::db::models::{PairVolumeSnapshot, SnapshotInterval};
use crate::utils::floor_to_hour;

/// Hot-map key of one bucket: pair, interval, bucket start.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub pair_id: String,
    pub interval: SnapshotInterval,
    pub bucket_start_ms: i64,
}

/// In-memory working set of hot volume buckets.
///
/// Owns every snapshot inside the retention horizon; the persistence layer
/// owns the durable history under the same composite ids. The store performs
/// no deduplication of its own - same bucket id accumulates, and exactly-once
/// per event id is the event application layer's job.
pub struct VolumeSnapshotStore {
    hot: FxHashMap<BucketKey, PairVolumeSnapshot>,
    dirty: FxHashSet<BucketKey>,
    retention: Duration,
}

impl VolumeSnapshotStore {
    pub fn new(retention_hours: u32) -> Self {
        Self {
            hot: FxHashMap::default(),
            dirty: FxHashSet::default(),
            retention: Duration::hours(retention_hours as i64),
        }
    }

    /// Existing bucket for the event's hour, or a fresh zero-valued one.
    ///
    /// The bucket is marked for the next flush: handing out a mutable
    /// snapshot presumes a write, and upserts are idempotent so an
    /// occasional untouched flush is harmless.
    pub fn get_or_create_bucket(
        &mut self,
        pair_id: &str,
        event_timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> &mut PairVolumeSnapshot {
        let bucket_start = floor_to_hour(event_timestamp);
        let key = BucketKey {
            pair_id: pair_id.to_string(),
            interval: SnapshotInterval::Hourly,
            bucket_start_ms: bucket_start.timestamp_millis(),
        };

        self.dirty.insert(key.clone());
        self.hot.entry(key).or_insert_with(|| {
            PairVolumeSnapshot::open(
                pair_id.to_string(),
                SnapshotInterval::Hourly,
                bucket_start,
                now,
            )
        })
    }

    /// Drop hot entries whose bucket start has aged past the retention
    /// horizon, returning how many were removed.
    ///
    /// Buckets still awaiting flush are retained regardless of age: until
    /// their write succeeds the hot copy is the only source of truth.
    /// Pruning is a memory bound, never a correctness mechanism - windows
    /// past the horizon read from persisted history.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff_ms = (now - self.retention).timestamp_millis();
        let before = self.hot.len();

        let dirty = &self.dirty;
        self.hot
            .retain(|key, _| key.bucket_start_ms >= cutoff_ms || dirty.contains(key));

        before - self.hot.len()
    }

    /// Take full-row clones of every bucket touched since the last drain.
    pub fn drain_dirty(&mut self) -> Vec<PairVolumeSnapshot> {
        let mut drained = Vec::with_capacity(self.dirty.len());
        for key in self.dirty.drain() {
            if let Some(snapshot) = self.hot.get(&key) {
                drained.push(snapshot.clone());
            }
        }
        drained
    }

    /// Hot snapshots of one pair, unordered.
    pub fn snapshots_for_pair<'a>(
        &'a self,
        pair_id: &'a str,
    ) -> impl Iterator<Item = &'a PairVolumeSnapshot> {
        self.hot
            .values()
            .filter(move |snapshot| snapshot.pair_id == pair_id)
    }

    pub fn hot_len(&self) -> usize {
        self.hot.len()
    }

    pub fn pending_flush(&self) -> usize {
        self.dirty.len()
    }
}
