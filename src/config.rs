//! Analysis and recommendation settings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{configuration_error, Result, SlowQueryError};
use crate::parsers::LogFormat;

pub const DEFAULT_MIN_DURATION_MS: f64 = 1000.0;
pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_PROGRESS_INTERVAL: usize = 10_000;

/// Which occurrence supplies a query's displayed text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepresentativePolicy {
    /// The longest raw text; the earliest occurrence wins ties
    #[default]
    Longest,
    /// The first occurrence in input order
    FirstSeen,
    /// The occurrence with the highest duration; the earliest wins ties
    Slowest,
}

impl FromStr for RepresentativePolicy {
    type Err = SlowQueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "longest" => Ok(RepresentativePolicy::Longest),
            "first-seen" | "first_seen" | "first" => Ok(RepresentativePolicy::FirstSeen),
            "slowest" => Ok(RepresentativePolicy::Slowest),
            other => Err(configuration_error(
                format!("unknown representative policy '{other}'"),
                "representative",
            )),
        }
    }
}

impl fmt::Display for RepresentativePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepresentativePolicy::Longest => write!(f, "longest"),
            RepresentativePolicy::FirstSeen => write!(f, "first-seen"),
            RepresentativePolicy::Slowest => write!(f, "slowest"),
        }
    }
}

/// Settings for one parsing and ranking run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub format: LogFormat,
    /// Entries faster than this are discarded before aggregation
    pub min_duration_ms: f64,
    pub top_n: usize,
    pub representative: RepresentativePolicy,
    /// Entries between progress notifications
    pub progress_interval: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            min_duration_ms: DEFAULT_MIN_DURATION_MS,
            top_n: DEFAULT_TOP_N,
            representative: RepresentativePolicy::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl AnalysisConfig {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn with_min_duration(mut self, min_duration_ms: f64) -> Self {
        self.min_duration_ms = min_duration_ms;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_representative(mut self, policy: RepresentativePolicy) -> Self {
        self.representative = policy;
        self
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min_duration_ms.is_finite() || self.min_duration_ms < 0.0 {
            return Err(configuration_error(
                format!(
                    "minimum duration must be a non-negative number of milliseconds, got {}",
                    self.min_duration_ms
                ),
                "min_duration_ms",
            ));
        }
        if self.top_n == 0 {
            return Err(configuration_error("top_n must be greater than 0", "top_n"));
        }
        if self.progress_interval == 0 {
            return Err(configuration_error(
                "progress interval must be greater than 0",
                "progress_interval",
            ));
        }
        Ok(())
    }
}

/// Settings for the per-query recommendation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Attempts per query for retryable provider errors
    pub max_attempts: u32,
    /// Provider calls in flight at once
    pub concurrency: usize,
    /// Base delay between attempts, doubled after each failure
    pub retry_backoff_ms: u64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            concurrency: 4,
            retry_backoff_ms: 500,
        }
    }
}

impl RecommendationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(configuration_error(
                "max_attempts must be at least 1",
                "max_attempts",
            ));
        }
        if self.concurrency == 0 {
            return Err(configuration_error(
                "concurrency must be at least 1",
                "concurrency",
            ));
        }
        Ok(())
    }
}
