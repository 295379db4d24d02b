//! Per-query optimization recommendations
//!
//! Providers implement [`RecommendationProvider`]; the
//! [`RecommendationRunner`] calls one for each ranked query after
//! aggregation. A failing provider never fails the analysis: the query is
//! reported with [`RecommendationStatus::Unavailable`] instead.

pub mod antipatterns;
pub mod runner;

use serde::Serialize;

use crate::analytics::QueryStats;
use crate::error::ProviderError;

pub use antipatterns::{optimization_score, AntiPatternDetector, AntiPatternMatch, AntiPatternType};
pub use runner::RecommendationRunner;

/// Advice produced for one query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub provider: String,
    pub text: String,
}

/// Outcome of asking a provider about one ranked query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendationStatus {
    Available(Recommendation),
    Unavailable { reason: String },
}

impl RecommendationStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, RecommendationStatus::Available(_))
    }
}

/// Source of optimization advice for a ranked query.
///
/// Implementations may block (network calls, subprocesses); the runner
/// invokes them on tokio's blocking pool.
pub trait RecommendationProvider: Send + Sync {
    fn name(&self) -> &str;

    fn recommend(&self, stats: &QueryStats) -> Result<Recommendation, ProviderError>;
}

/// Prompt for LLM-backed providers
pub fn build_prompt(stats: &QueryStats) -> String {
    let mut lines = vec![
        format!("Average Duration: {:.2} ms", stats.avg_duration_ms()),
        format!("Execution Frequency: {} times", stats.frequency),
    ];
    if stats.max_duration_ms > 0.0 {
        lines.push(format!("Max Duration: {:.2} ms", stats.max_duration_ms));
    }
    if stats.impact_score() > 0.0 {
        lines.push(format!("Impact Score: {:.2}", stats.impact_score()));
    }

    format!(
        "You are a PostgreSQL database performance expert.\n\
         \n\
         Analyze this slow-running query:\n\
         \n\
         Query: {}\n\
         \n\
         Statistics:\n\
         {}\n\
         \n\
         Provide:\n\
         1. Most likely root cause of slowness\n\
         2. Specific, actionable optimization recommendation (e.g., add index, rewrite query)\n\
         3. Estimated performance impact (e.g., \"30-50% faster\")\n\
         \n\
         Keep response concise and under 150 words.",
        stats.representative_text,
        lines.join("\n")
    )
}

/// Offline provider backed by [`AntiPatternDetector`]
#[derive(Debug, Default)]
pub struct StaticAdvisor {
    detector: AntiPatternDetector,
}

impl StaticAdvisor {
    pub fn new() -> Self {
        Self {
            detector: AntiPatternDetector::new(),
        }
    }

    /// Plain-text report for a list of matches
    pub fn report(&self, matches: &[AntiPatternMatch]) -> String {
        if matches.is_empty() {
            return "No common anti-patterns detected. Run EXPLAIN (ANALYZE, BUFFERS) on this \
                    query and look for sequential scans on large tables, missing indexes on \
                    filtered or joined columns, and row estimates far from actual counts."
                .to_string();
        }

        let mut out = format!(
            "{} issue(s) found, optimization score {:.2}\n",
            matches.len(),
            optimization_score(matches)
        );
        for (i, m) in matches.iter().enumerate() {
            out.push_str(&format!(
                "\n{}. {} (confidence {:.0}%)\n   Problem: {}\n   Detected: {}\n   Suggestion: {}\n",
                i + 1,
                m.pattern_type,
                m.confidence * 100.0,
                m.problem(),
                m.matched_text.trim(),
                m.suggestion()
            ));
            for line in m.example().lines() {
                out.push_str("   ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

impl RecommendationProvider for StaticAdvisor {
    fn name(&self) -> &str {
        "static"
    }

    fn recommend(&self, stats: &QueryStats) -> Result<Recommendation, ProviderError> {
        let matches = self.detector.detect(&stats.representative_text);
        Ok(Recommendation {
            provider: self.name().to_string(),
            text: self.report(&matches),
        })
    }
}
