use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::db::models::{PairVolumeSnapshot, SyncCheckpoint, TokenPriceSnapshot, Transaction};
use crate::db::SnapshotStorage;

// ============================================================================
// Flush Messages
// ============================================================================

/// Work items for the background flusher, in the order they must persist.
///
/// A `Checkpoint` is always enqueued after the data it covers; the single
/// channel preserves that ordering end to end.
pub enum FlushMessage {
    Snapshots(Vec<PairVolumeSnapshot>),
    PriceSnapshot(TokenPriceSnapshot),
    Transactions(Vec<Transaction>),
    Checkpoint(u64),
    Shutdown,
}

// ============================================================================
// Snapshot Flusher
// ============================================================================

/// Drains flush messages into durable storage with bounded retries.
///
/// Failed writes back off exponentially; once retries are exhausted the
/// write is dropped with an error log and the loop moves on. Volume buckets
/// tolerate this because later flushes re-upsert cumulative totals under
/// the same bucket id. A persisted checkpoint claims every data row below
/// it is durable, so the first dropped data write marks the flusher
/// degraded and holds all later checkpoints: a restart then resumes from
/// the last clean checkpoint and the feed re-delivers what was lost.
pub struct SnapshotFlusher {
    storage: Arc<dyn SnapshotStorage>,
    receiver: mpsc::Receiver<FlushMessage>,
    max_retries: u32,
    backoff_base_ms: u64,
    degraded: bool,
    last_checkpoint: u64,
}

impl SnapshotFlusher {
    pub fn new(
        storage: Arc<dyn SnapshotStorage>,
        receiver: mpsc::Receiver<FlushMessage>,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Self {
        Self {
            storage,
            receiver,
            max_retries,
            backoff_base_ms,
            degraded: false,
            last_checkpoint: 0,
        }
    }

    pub async fn run(mut self, cancellation_token: CancellationToken) {
        info!("[flusher] Started");

        loop {
            tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => {
                    info!("[flusher] Cancellation requested, draining pending writes");
                    self.receiver.close();
                    while let Some(message) = self.receiver.recv().await {
                        if matches!(message, FlushMessage::Shutdown) {
                            continue;
                        }
                        self.dispatch(message).await;
                    }
                    break;
                },

                message = self.receiver.recv() => {
                    match message {
                        Some(FlushMessage::Shutdown) | None => {
                            info!("[flusher] Shutting down");
                            break;
                        },
                        Some(message) => self.dispatch(message).await,
                    }
                },
            }
        }

        info!("[flusher] Stopped");
    }

    async fn dispatch(&mut self, message: FlushMessage) {
        match message {
            FlushMessage::Snapshots(snapshots) => {
                let count = snapshots.len();
                for snapshot in &snapshots {
                    let committed = self
                        .persist_with_retry("volume snapshot", || {
                            self.storage.upsert_volume_snapshot(snapshot)
                        })
                        .await;
                    if !committed {
                        self.degraded = true;
                    }
                }
                debug!("[flusher] Flushed {} volume snapshots", count);
            },
            FlushMessage::PriceSnapshot(snapshot) => {
                let committed = self
                    .persist_with_retry("price snapshot", || {
                        self.storage.upsert_price_snapshot(&snapshot)
                    })
                    .await;
                if !committed {
                    self.degraded = true;
                }
            },
            FlushMessage::Transactions(transactions) => {
                for transaction in &transactions {
                    let committed = self
                        .persist_with_retry("transaction", || {
                            self.storage.record_transaction(transaction)
                        })
                        .await;
                    if !committed {
                        self.degraded = true;
                    }
                }
            },
            FlushMessage::Checkpoint(block_number) => {
                if self.degraded {
                    warn!(
                        "[flusher] Data writes were dropped, holding checkpoint at {} (skipping {})",
                        self.last_checkpoint, block_number
                    );
                    return;
                }
                // Checkpoints never move backwards.
                if block_number <= self.last_checkpoint {
                    return;
                }
                let checkpoint = SyncCheckpoint::new(block_number);
                let committed = self
                    .persist_with_retry("checkpoint", || self.storage.save_checkpoint(&checkpoint))
                    .await;
                if committed {
                    self.last_checkpoint = block_number;
                }
            },
            FlushMessage::Shutdown => {},
        }
    }

    /// Runs `operation` until it succeeds or retries are exhausted; returns
    /// whether the write committed.
    async fn persist_with_retry<F, Fut>(&self, label: &str, operation: F) -> bool
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(()) => return true,
                Err(err) if attempt < self.max_retries => {
                    attempt += 1;
                    let delay = Duration::from_millis(self.backoff_base_ms * 2_u64.pow(attempt));
                    warn!(
                        "[flusher] {} write failed (attempt {}/{}), retrying in {:?}: {:#}",
                        label, attempt, self.max_retries, delay, err
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(err) => {
                    error!(
                        "[flusher] {} write dropped after {} attempts: {:#}",
                        label, self.max_retries, err
                    );
                    return false;
                },
            }
        }
    }
}
