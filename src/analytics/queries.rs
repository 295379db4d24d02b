//! Grouping of slow-query occurrences and impact ranking

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::RepresentativePolicy;
use crate::parsers::LogEntry;
use crate::sql::{normalize, NormalizedQuery, QueryType};

fn to_micros(duration_ms: f64) -> u64 {
    (duration_ms * 1000.0).round() as u64
}

fn from_micros(micros: u64) -> f64 {
    micros as f64 / 1000.0
}

/// Aggregate statistics for one normalized query.
///
/// Durations are summed as whole microseconds, so the total (and with it
/// the impact score) depends only on the set of occurrences, not on the
/// order they arrived in.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStats {
    pub normalized: NormalizedQuery,
    pub query_type: QueryType,
    pub frequency: u64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub representative_text: String,
    total_duration_us: u64,
    representative_duration_ms: f64,
    first_ordinal: u64,
}

impl QueryStats {
    /// Start the aggregate from its first occurrence
    pub fn from_entry(normalized: NormalizedQuery, entry: LogEntry, ordinal: u64) -> Self {
        Self {
            query_type: QueryType::classify(&entry.raw_text),
            normalized,
            frequency: 1,
            min_duration_ms: entry.duration_ms,
            max_duration_ms: entry.duration_ms,
            first_seen: entry.timestamp,
            last_seen: entry.timestamp,
            total_duration_us: to_micros(entry.duration_ms),
            representative_duration_ms: entry.duration_ms,
            representative_text: entry.raw_text,
            first_ordinal: ordinal,
        }
    }

    /// Fold one more occurrence in
    pub fn add(&mut self, entry: LogEntry, policy: RepresentativePolicy) {
        self.frequency += 1;
        self.total_duration_us = self.total_duration_us.saturating_add(to_micros(entry.duration_ms));
        self.min_duration_ms = self.min_duration_ms.min(entry.duration_ms);
        self.max_duration_ms = self.max_duration_ms.max(entry.duration_ms);
        self.first_seen = self.first_seen.min(entry.timestamp);
        self.last_seen = self.last_seen.max(entry.timestamp);

        let replace = match policy {
            RepresentativePolicy::Longest => {
                entry.raw_text.chars().count() > self.representative_text.chars().count()
            }
            RepresentativePolicy::FirstSeen => false,
            RepresentativePolicy::Slowest => entry.duration_ms > self.representative_duration_ms,
        };
        if replace {
            self.representative_text = entry.raw_text;
            self.representative_duration_ms = entry.duration_ms;
        }
    }

    pub fn total_duration_ms(&self) -> f64 {
        from_micros(self.total_duration_us)
    }

    pub fn avg_duration_ms(&self) -> f64 {
        self.total_duration_ms() / self.frequency as f64
    }

    /// Total time spent in this query: duration x frequency
    pub fn impact_score(&self) -> f64 {
        self.total_duration_ms()
    }

    /// Position of the first occurrence in the input
    pub fn first_ordinal(&self) -> u64 {
        self.first_ordinal
    }

    /// Impact desc, frequency desc, first_seen asc, input order asc
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .total_duration_us
            .cmp(&self.total_duration_us)
            .then_with(|| other.frequency.cmp(&self.frequency))
            .then_with(|| self.first_seen.cmp(&other.first_seen))
            .then_with(|| self.first_ordinal.cmp(&other.first_ordinal))
    }
}

impl Serialize for QueryStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("QueryStats", 11)?;
        state.serialize_field("normalized_query", &self.normalized)?;
        state.serialize_field("query_type", &self.query_type)?;
        state.serialize_field("frequency", &self.frequency)?;
        state.serialize_field("impact_score", &self.impact_score())?;
        state.serialize_field("total_duration_ms", &self.total_duration_ms())?;
        state.serialize_field("avg_duration_ms", &self.avg_duration_ms())?;
        state.serialize_field("min_duration_ms", &self.min_duration_ms)?;
        state.serialize_field("max_duration_ms", &self.max_duration_ms)?;
        state.serialize_field("first_seen", &self.first_seen)?;
        state.serialize_field("last_seen", &self.last_seen)?;
        state.serialize_field("representative_text", &self.representative_text)?;
        state.end()
    }
}

/// A query with its position in the impact ranking (1-based)
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RankedQuery {
    pub rank: usize,
    #[serde(flatten)]
    pub stats: QueryStats,
}

/// Streaming aggregator keyed by normalized query
pub struct QueryAggregator {
    policy: RepresentativePolicy,
    stats: HashMap<NormalizedQuery, QueryStats>,
    next_ordinal: u64,
}

impl QueryAggregator {
    /// Create a new query aggregator
    pub fn new(policy: RepresentativePolicy) -> Self {
        Self {
            policy,
            stats: HashMap::new(),
            next_ordinal: 0,
        }
    }

    /// Fold one decoded entry into its group
    pub fn record(&mut self, entry: LogEntry) {
        let key = normalize(&entry.raw_text);
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;

        match self.stats.get_mut(&key) {
            Some(stats) => stats.add(entry, self.policy),
            None => {
                let stats = QueryStats::from_entry(key.clone(), entry, ordinal);
                self.stats.insert(key, stats);
            }
        }
    }

    /// Number of distinct normalized queries
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Occurrences recorded so far
    pub fn occurrences(&self) -> u64 {
        self.next_ordinal
    }

    pub fn get(&self, key: &NormalizedQuery) -> Option<&QueryStats> {
        self.stats.get(key)
    }

    /// The `top_n` most impactful queries; fewer if fewer exist
    pub fn rank(&self, top_n: usize) -> Vec<RankedQuery> {
        let mut all: Vec<&QueryStats> = self.stats.values().collect();
        all.sort_by(|a, b| a.rank_cmp(b));
        all.into_iter()
            .take(top_n)
            .enumerate()
            .map(|(index, stats)| RankedQuery {
                rank: index + 1,
                stats: stats.clone(),
            })
            .collect()
    }
}

impl Default for QueryAggregator {
    fn default() -> Self {
        Self::new(RepresentativePolicy::default())
    }
}
