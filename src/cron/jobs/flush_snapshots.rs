//! Job to push dirty hour buckets and the trailing checkpoint to storage.

use anyhow::Result;
use log::info;

use crate::engine::RollupEngine;

pub async fn run(engine: &RollupEngine) -> Result<()> {
    let flushed = engine.flush_dirty().await?;
    if flushed > 0 {
        info!("Flushed {} dirty volume buckets", flushed);
    }
    Ok(())
}
