mod jobs;
mod scheduler;

pub use scheduler::{CronSettings, MaintenanceScheduler};
