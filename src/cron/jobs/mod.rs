pub mod flush_snapshots;
pub mod prune_snapshots;
pub mod refresh_volume_rollups;
