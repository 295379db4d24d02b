//! Load profile of aggregated slow queries over the hours of the day

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::parsers::LogEntry;

/// Streaming analyzer for timing and load distribution
pub struct TimingAnalyzer {
    hourly_count: [u64; 24],
    hourly_total_us: [u64; 24],
    total_us: u64,
    max_duration_ms: f64,
    count: u64,
}

impl TimingAnalyzer {
    /// Create a new timing analyzer
    pub fn new() -> Self {
        Self {
            hourly_count: [0; 24],
            hourly_total_us: [0; 24],
            total_us: 0,
            max_duration_ms: 0.0,
            count: 0,
        }
    }

    pub fn record(&mut self, entry: &LogEntry) {
        let hour = entry.timestamp.hour() as usize;
        let micros = (entry.duration_ms * 1000.0).round() as u64;

        self.hourly_count[hour] += 1;
        self.hourly_total_us[hour] = self.hourly_total_us[hour].saturating_add(micros);
        self.total_us = self.total_us.saturating_add(micros);
        self.max_duration_ms = self.max_duration_ms.max(entry.duration_ms);
        self.count += 1;
    }

    /// Snapshot of everything recorded so far
    pub fn profile(&self) -> TimingProfile {
        let hourly: Vec<HourlyLoad> = (0..24)
            .filter(|&hour| self.hourly_count[hour] > 0)
            .map(|hour| HourlyLoad {
                hour: hour as u32,
                count: self.hourly_count[hour],
                total_duration_ms: self.hourly_total_us[hour] as f64 / 1000.0,
            })
            .collect();

        // Heaviest hour by total time; the earlier hour wins ties
        let busiest_hour = hourly
            .iter()
            .fold(None::<&HourlyLoad>, |best, load| match best {
                Some(b) if b.total_duration_ms >= load.total_duration_ms => Some(b),
                _ => Some(load),
            })
            .map(|load| load.hour);

        let total_duration_ms = self.total_us as f64 / 1000.0;
        TimingProfile {
            entries: self.count,
            total_duration_ms,
            average_duration_ms: if self.count == 0 {
                0.0
            } else {
                total_duration_ms / self.count as f64
            },
            max_duration_ms: self.max_duration_ms,
            busiest_hour,
            hourly,
        }
    }
}

impl Default for TimingAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Slow-query load within one hour of the day (UTC)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyLoad {
    pub hour: u32,
    pub count: u64,
    pub total_duration_ms: f64,
}

/// Results of timing analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingProfile {
    pub entries: u64,
    pub total_duration_ms: f64,
    pub average_duration_ms: f64,
    pub max_duration_ms: f64,
    pub busiest_hour: Option<u32>,
    /// Only hours that saw at least one entry, in hour order
    pub hourly: Vec<HourlyLoad>,
}
