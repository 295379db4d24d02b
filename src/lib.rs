//! slow-query-doctor - find the slow queries that cost the most
//!
//! This library parses PostgreSQL slow-query logs (stderr, csvlog and
//! jsonlog), groups statements by normalized text and ranks them by total
//! time spent. Ranked queries can be handed to a recommendation provider.

pub mod analytics;
pub mod config;
pub mod error;
pub mod output;
pub mod parsers;
pub mod pipeline;
pub mod recommend;
pub mod sql;

// Re-export commonly used items
pub use analytics::{QueryAggregator, QueryStats, RankedQuery, TimingAnalyzer, TimingProfile};
pub use config::{AnalysisConfig, RecommendationConfig, RepresentativePolicy};
pub use error::{DecodeError, ProviderError, Result, SlowQueryError};
pub use output::{JsonFormatter, TextFormatter};
pub use parsers::{LogEntry, LogFormat, RawEntry};
pub use pipeline::{AnalysisReport, Analyzer, NoProgress, ParseSummary, ProgressObserver};
pub use recommend::{
    build_prompt, Recommendation, RecommendationProvider, RecommendationRunner,
    RecommendationStatus, StaticAdvisor,
};
pub use sql::{normalize, NormalizedQuery, QueryType};
