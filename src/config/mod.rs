mod config;

pub use config::{EngineSettings, Settings};
