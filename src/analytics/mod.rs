//! Aggregation and ranking of decoded slow-query entries

pub mod queries;
pub mod timing;

pub use queries::{QueryAggregator, QueryStats, RankedQuery};
pub use timing::{HourlyLoad, TimingAnalyzer, TimingProfile};
