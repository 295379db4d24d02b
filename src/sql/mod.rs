//! SQL text handling: normalization and classification

pub mod normalize;
pub mod query;

pub use normalize::{normalize, NormalizedQuery};
pub use query::QueryType;
