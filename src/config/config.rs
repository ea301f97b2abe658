use config::{Config, ConfigError, File};
use serde::Deserialize;

/// Rollup engine configuration.
///
/// Controls the hot bucket store, event deduplication and the flush
/// pipeline:
/// - Retention: how long flushed hour buckets stay queryable in memory
/// - Dedup: bounded applied-event log (capacity + TTL)
/// - Flush: channel depth and retry/backoff for storage writes
#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,
    #[serde(default = "default_price_snapshot_interval_secs")]
    pub price_snapshot_interval_secs: u64,
    // Applied-event log bounds
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: u64,
    #[serde(default = "default_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,
    // Flush pipeline
    #[serde(default = "default_flush_channel_capacity")]
    pub flush_channel_capacity: usize,
    #[serde(default = "default_flush_max_retries")]
    pub flush_max_retries: u32,
    #[serde(default = "default_flush_backoff_ms")]
    pub flush_backoff_ms: u64,
}

fn default_retention_hours() -> u32 {
    24
}

fn default_price_snapshot_interval_secs() -> u64 {
    3_600 // one snapshot per token per hour
}

fn default_dedup_capacity() -> u64 {
    262_144
}

fn default_dedup_ttl_secs() -> u64 {
    86_400
}

fn default_flush_channel_capacity() -> usize {
    128
}

fn default_flush_max_retries() -> u32 {
    5
}

fn default_flush_backoff_ms() -> u64 {
    100
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            retention_hours: default_retention_hours(),
            price_snapshot_interval_secs: default_price_snapshot_interval_secs(),
            dedup_capacity: default_dedup_capacity(),
            dedup_ttl_secs: default_dedup_ttl_secs(),
            flush_channel_capacity: default_flush_channel_capacity(),
            flush_max_retries: default_flush_max_retries(),
            flush_backoff_ms: default_flush_backoff_ms(),
        }
    }
}

/// Root application configuration.
///
/// Loaded from `config.yaml` at startup. Every field is defaulted, so an
/// absent section falls back to production values.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}
