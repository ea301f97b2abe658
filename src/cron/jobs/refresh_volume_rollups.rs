//! Job to recompute rolling-window volume totals for every pair.
//!
//! Folds persisted snapshots and hot buckets into the 1h/24h/7d/30d/1y
//! windows and writes the result onto each pair record, so reads never pay
//! for aggregation.

use anyhow::Result;
use chrono::Utc;
use log::info;

use crate::engine::RollupEngine;

pub async fn run(engine: &RollupEngine) -> Result<()> {
    info!("Starting refresh_volume_rollups job...");

    let start = std::time::Instant::now();

    let pairs = engine.refresh_all_pair_volumes(Utc::now()).await?;

    info!(
        "Completed refresh_volume_rollups job in {:?} ({} pairs)",
        start.elapsed(),
        pairs
    );
    Ok(())
}
