use std::time::Duration;

use moka::sync::Cache;

use crate::db::models::EventId;

/// Bounded log of applied event ids backing exactly-once bucket updates.
///
/// Feeds redeliver events on reconnect, so every event is checked here
/// before it may touch a bucket. Capacity and TTL bound memory; ids older
/// than the TTL are assumed covered by the persisted checkpoint instead.
pub struct AppliedEventLog {
    seen: Cache<EventId, ()>,
}

impl AppliedEventLog {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let seen = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { seen }
    }

    /// Records the id and reports whether it was first seen just now.
    /// Returns `false` for a replayed id.
    pub fn observe(&self, id: EventId) -> bool {
        self.seen.entry(id).or_insert(()).is_fresh()
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.seen.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_is_fresh_replay_is_not() {
        let log = AppliedEventLog::new(1024, Duration::from_secs(60));
        let id = EventId {
            block_number: 100,
            log_index: 3,
        };

        assert!(log.observe(id));
        assert!(!log.observe(id));
        assert!(log.contains(&id));
    }

    #[test]
    fn test_distinct_ids_do_not_collide() {
        let log = AppliedEventLog::new(1024, Duration::from_secs(60));

        assert!(log.observe(EventId {
            block_number: 100,
            log_index: 3,
        }));
        assert!(log.observe(EventId {
            block_number: 100,
            log_index: 4,
        }));
        assert!(log.observe(EventId {
            block_number: 101,
            log_index: 3,
        }));
    }
}
