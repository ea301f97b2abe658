pub mod config;
pub mod cron;
pub mod db;
pub mod engine;
pub mod rollup;
pub mod utils;

pub use config::Settings;
pub use cron::{CronSettings, MaintenanceScheduler};
pub use db::{MemoryStorage, SnapshotStorage};
pub use engine::{ApplyOutcome, RollupEngine};
pub use rollup::{VolumePeriods, VolumeSnapshotStore};
pub use utils::Window;
