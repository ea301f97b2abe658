use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rollup ingestion progress checkpoint.
///
/// Tracks the highest block whose derived writes are durably committed.
/// Used to resume ingestion after restarts without missing or duplicating
/// data; the flush pipeline only persists it behind the writes it covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    pub last_applied_block: u64,
    pub updated_at: DateTime<Utc>,
}

impl SyncCheckpoint {
    pub fn new(last_applied_block: u64) -> Self {
        Self {
            last_applied_block,
            updated_at: Utc::now(),
        }
    }
}
