use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregation interval of a volume snapshot.
///
/// Only hourly buckets are produced today; the interval is part of the
/// snapshot identity so coarser rollups can coexist later without id
/// collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotInterval {
    Hourly,
}

impl SnapshotInterval {
    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotInterval::Hourly => "hourly",
        }
    }
}

/// One pair's running aggregate for one time bucket.
///
/// Identity: `pairId:interval:bucketStartEpochMillis` - deterministic, so
/// the persistence layer can upsert the same row on every flush.
///
/// `volume_usd` and `transaction_count` are private: within a bucket's
/// lifetime they only ever increase, and [`apply_contribution`] is the one
/// code path allowed to move them.
///
/// [`apply_contribution`]: PairVolumeSnapshot::apply_contribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairVolumeSnapshot {
    pub pair_id: String,
    pub interval: SnapshotInterval,

    /// Bucket start (floor-to-hour of the contributing event times).
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,

    volume_usd: BigDecimal,
    transaction_count: u64,
}

impl PairVolumeSnapshot {
    /// Open a zero-valued bucket.
    pub fn open(
        pair_id: String,
        interval: SnapshotInterval,
        bucket_start: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            pair_id,
            interval,
            timestamp: bucket_start,
            created_at,
            volume_usd: BigDecimal::from(0),
            transaction_count: 0,
        }
    }

    /// Composite persistence id.
    pub fn id(&self) -> String {
        format!(
            "{}:{}:{}",
            self.pair_id,
            self.interval.as_str(),
            self.timestamp.timestamp_millis()
        )
    }

    pub fn bucket_start_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Fold one event's USD value into the bucket.
    ///
    /// Contributions are non-negative, so both counters are monotonically
    /// non-decreasing for the bucket's lifetime. Exact decimal addition: the
    /// bucket total is always the precise sum of its contributions.
    pub fn apply_contribution(&mut self, usd_value: &BigDecimal) {
        self.volume_usd += usd_value;
        self.transaction_count += 1;
    }

    pub fn volume_usd(&self) -> &BigDecimal {
        &self.volume_usd
    }

    pub fn transaction_count(&self) -> u64 {
        self.transaction_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ts(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn bucket() -> PairVolumeSnapshot {
        PairVolumeSnapshot::open(
            "0xpair".to_string(),
            SnapshotInterval::Hourly,
            ts(1_710_511_200_000),
            ts(1_710_511_210_000),
        )
    }

    #[test]
    fn test_id_is_pair_interval_bucket_millis() {
        assert_eq!(bucket().id(), "0xpair:hourly:1710511200000");
    }

    #[test]
    fn test_new_bucket_starts_zeroed() {
        let snapshot = bucket();
        assert_eq!(snapshot.volume_usd(), &BigDecimal::from(0));
        assert_eq!(snapshot.transaction_count(), 0);
    }

    #[test]
    fn test_contributions_sum_exactly() {
        let mut snapshot = bucket();

        // Classic float-drift values; decimal accumulation must stay exact.
        snapshot.apply_contribution(&BigDecimal::from_str("0.1").unwrap());
        snapshot.apply_contribution(&BigDecimal::from_str("0.2").unwrap());
        snapshot.apply_contribution(&BigDecimal::from_str("1234567.89").unwrap());

        assert_eq!(
            snapshot.volume_usd(),
            &BigDecimal::from_str("1234568.19").unwrap()
        );
        assert_eq!(snapshot.transaction_count(), 3);
    }

    #[test]
    fn test_zero_contribution_still_counts_transaction() {
        let mut snapshot = bucket();
        snapshot.apply_contribution(&BigDecimal::from(0));

        assert_eq!(snapshot.volume_usd(), &BigDecimal::from(0));
        assert_eq!(snapshot.transaction_count(), 1);
    }
}
