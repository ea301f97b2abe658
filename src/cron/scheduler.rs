//! Cron scheduler for periodic background tasks.
//!
//! Runs jobs like:
//! - Flushing dirty hour buckets and the sync checkpoint to storage
//! - Pruning hot buckets past the retention horizon
//! - Refreshing per-pair rolling-window volume totals

use std::sync::Arc;

use anyhow::Result;
use log::{error, info};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::engine::RollupEngine;

use super::jobs;

/// Cron scheduler that manages periodic background jobs.
pub struct MaintenanceScheduler {
    engine: Arc<RollupEngine>,
    settings: Arc<CronSettings>,
}

/// Configuration for cron job intervals
#[derive(Debug, Clone)]
pub struct CronSettings {
    /// Interval for flushing dirty buckets to storage - default 30 seconds
    pub flush_interval_secs: u64,
    /// Interval for pruning expired hot buckets - default 1 hour
    pub prune_interval_secs: u64,
    /// Interval for refreshing pair volume windows - default 5 minutes
    pub refresh_volumes_interval_secs: u64,
}

impl Default for CronSettings {
    fn default() -> Self {
        Self {
            flush_interval_secs: 30,            // 30 seconds
            prune_interval_secs: 3600,          // 1 hour
            refresh_volumes_interval_secs: 300, // 5 minutes
        }
    }
}

impl MaintenanceScheduler {
    pub fn new(engine: Arc<RollupEngine>, settings: CronSettings) -> Self {
        Self {
            engine,
            settings: Arc::new(settings),
        }
    }

    /// Starts the cron scheduler and runs until cancellation.
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        let mut scheduler = JobScheduler::new().await?;

        // Register all jobs
        self.register_flush_snapshots_job(&scheduler).await?;
        self.register_prune_snapshots_job(&scheduler).await?;
        self.register_refresh_volumes_job(&scheduler).await?;

        // Start the scheduler
        scheduler.start().await?;
        info!("Cron scheduler started with {} jobs", 3);

        // Wait for cancellation
        cancellation_token.cancelled().await;
        info!("Cron scheduler shutting down...");

        scheduler.shutdown().await?;
        Ok(())
    }

    async fn register_flush_snapshots_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let engine = self.engine.clone();
        let interval = self.settings.flush_interval_secs;

        let job = Job::new_repeated_async(
            std::time::Duration::from_secs(interval),
            move |_uuid, _lock| {
                let engine = engine.clone();
                Box::pin(async move {
                    if let Err(e) = jobs::flush_snapshots::run(&engine).await {
                        error!("Failed to flush snapshots: {:#}", e);
                    }
                })
            },
        )?;

        scheduler.add(job).await?;
        info!("Registered flush_snapshots job (every {}s)", interval);
        Ok(())
    }

    async fn register_prune_snapshots_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let engine = self.engine.clone();
        let interval = self.settings.prune_interval_secs;

        let job = Job::new_repeated_async(
            std::time::Duration::from_secs(interval),
            move |_uuid, _lock| {
                let engine = engine.clone();
                Box::pin(async move {
                    if let Err(e) = jobs::prune_snapshots::run(&engine).await {
                        error!("Failed to prune snapshots: {:#}", e);
                    }
                })
            },
        )?;

        scheduler.add(job).await?;
        info!("Registered prune_snapshots job (every {}s)", interval);
        Ok(())
    }

    async fn register_refresh_volumes_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let engine = self.engine.clone();
        let interval = self.settings.refresh_volumes_interval_secs;

        let job = Job::new_repeated_async(
            std::time::Duration::from_secs(interval),
            move |_uuid, _lock| {
                let engine = engine.clone();
                Box::pin(async move {
                    if let Err(e) = jobs::refresh_volume_rollups::run(&engine).await {
                        error!("Failed to refresh volume rollups: {:#}", e);
                    }
                })
            },
        )?;

        scheduler.add(job).await?;
        info!("Registered refresh_volume_rollups job (every {}s)", interval);
        Ok(())
    }
}
