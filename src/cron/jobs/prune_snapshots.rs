//! Job to drop hot hour buckets past the retention horizon.
//!
//! Flushes first so every prunable bucket has been persisted; unflushed
//! buckets survive pruning regardless of age.

use anyhow::Result;
use chrono::Utc;
use log::info;

use crate::engine::RollupEngine;

pub async fn run(engine: &RollupEngine) -> Result<()> {
    info!("Starting prune_snapshots job...");

    let start = std::time::Instant::now();

    let flushed = engine.flush_dirty().await?;
    let pruned = engine.prune(Utc::now()).await;
    let remaining = engine.hot_bucket_count().await;

    info!(
        "Completed prune_snapshots job in {:?} ({} flushed, {} pruned, {} hot buckets remain)",
        start.elapsed(),
        flushed,
        pruned,
        remaining
    );
    Ok(())
}
