//! Time-bucketed volume rollups.
//!
//! [`store`] owns the hot in-memory buckets keyed by pair, interval and
//! bucket start; [`windows`] folds those buckets (plus persisted history)
//! into rolling-window totals.

mod store;
mod windows;

pub use store::{BucketKey, VolumeSnapshotStore};
pub use windows::{aggregate_volume_periods, VolumePeriods};
