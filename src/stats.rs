//! Summary statistics over a history snapshot

use serde::{Deserialize, Serialize};

use crate::temperature::Temperature;

/// Statistics for a set of readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Truncating integer average
    pub avg: Temperature,
    pub min: Temperature,
    pub max: Temperature,
    /// Number of readings summarised
    pub count: usize,
}

impl HistoryStats {
    /// Summarise `readings`, skipping sentinels. `None` if nothing is left.
    pub fn from_readings(readings: &[Temperature]) -> Option<Self> {
        let mut sum = 0i64;
        let mut min = i32::MAX;
        let mut max = i32::MIN;
        let mut count = 0usize;

        for v in readings.iter().filter_map(|r| r.value()) {
            sum += i64::from(v);
            min = min.min(v);
            max = max.max(v);
            count += 1;
        }

        if count == 0 {
            return None;
        }

        Some(Self {
            avg: Temperature::from_hundredths((sum / count as i64) as i32),
            min: Temperature::from_hundredths(min),
            max: Temperature::from_hundredths(max),
            count,
        })
    }
}
