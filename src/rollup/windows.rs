use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::models::PairVolumeSnapshot;
use crate::utils::Window;

/// Read-only multi-window volume totals for one pair.
///
/// Plain numbers with no behavior; the query layer consumes this as-is.
/// Absent volume is a valid zero, never null.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VolumePeriods {
    pub volume_1h: BigDecimal,
    pub volume_24h: BigDecimal,
    pub volume_7d: BigDecimal,
    pub volume_30d: BigDecimal,
    pub volume_1y: BigDecimal,
}

impl VolumePeriods {
    pub fn get(&self, window: Window) -> &BigDecimal {
        match window {
            Window::Hour1 => &self.volume_1h,
            Window::Hour24 => &self.volume_24h,
            Window::Day7 => &self.volume_7d,
            Window::Day30 => &self.volume_30d,
            Window::Year1 => &self.volume_1y,
        }
    }

    fn slot_mut(&mut self, window: Window) -> &mut BigDecimal {
        match window {
            Window::Hour1 => &mut self.volume_1h,
            Window::Hour24 => &mut self.volume_24h,
            Window::Day7 => &mut self.volume_7d,
            Window::Day30 => &mut self.volume_30d,
            Window::Year1 => &mut self.volume_1y,
        }
    }
}

/// Sum bucket volume per rolling window relative to an anchor instant.
///
/// A snapshot counts toward a window when `timestamp >= anchor - window`
/// (inclusive lower bound). The caller supplies the snapshot set covering
/// the pair: hot buckets plus, for windows past the hot horizon, persisted
/// history. Linear in the number of snapshots, no mutation, safe for
/// concurrent readers over a stable set.
pub fn aggregate_volume_periods<'a, I>(anchor: DateTime<Utc>, snapshots: I) -> VolumePeriods
where
    I: IntoIterator<Item = &'a PairVolumeSnapshot>,
{
    let mut periods = VolumePeriods::default();

    for snapshot in snapshots {
        for window in Window::ALL {
            if snapshot.timestamp >= window.start(anchor) {
                *periods.slot_mut(window) += snapshot.volume_usd();
            }
        }
    }

    periods
}
