//! Error types for slow-query-doctor

use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::ParseSummary;

/// Main error type for slow-query-doctor operations
#[derive(Debug, Error)]
pub enum SlowQueryError {
    /// The log file is missing or cannot be read
    #[error("cannot read input {}: {source}", .path.display())]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The declared log format is not supported
    #[error("unrecognized log format '{format}' (expected one of: plain, csv, json)")]
    UnrecognizedFormat { format: String },

    /// A single entry could not be decoded
    #[error(transparent)]
    EntryDecode(#[from] DecodeError),

    /// A full pass found nothing at or above the duration threshold
    #[error(
        "no slow queries found ({} entries seen, {} below threshold, {} failed to decode); \
         check that log_min_duration_statement is enabled, that --format matches the log, \
         or lower --min-duration",
        .summary.total_entries_seen,
        .summary.entries_discarded_below_threshold,
        .summary.decode_failures
    )]
    NoMatchingEntries { summary: ParseSummary },

    /// A recommendation provider failed for one query
    #[error(transparent)]
    RecommendationProvider(#[from] ProviderError),

    /// Invalid configuration value
    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("formatting error: {0}")]
    Formatting(#[from] std::fmt::Error),
}

/// Why one raw entry could not become a [`LogEntry`](crate::LogEntry)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("line {line_number}: no duration marker")]
    MissingDuration { line_number: usize },

    #[error("line {line_number}: invalid duration '{value}'")]
    InvalidDuration { line_number: usize, value: String },

    #[error("line {line_number}: invalid timestamp '{value}'")]
    InvalidTimestamp { line_number: usize, value: String },

    #[error("line {line_number}: no statement text")]
    MissingStatement { line_number: usize },
}

impl DecodeError {
    pub fn line_number(&self) -> usize {
        match self {
            DecodeError::MissingDuration { line_number }
            | DecodeError::InvalidDuration { line_number, .. }
            | DecodeError::InvalidTimestamp { line_number, .. }
            | DecodeError::MissingStatement { line_number } => *line_number,
        }
    }
}

/// Failure reported by a [`RecommendationProvider`](crate::recommend::RecommendationProvider)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("provider rejected credentials: {0}")]
    Authentication(String),

    #[error("provider quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout { .. } | ProviderError::QuotaExceeded(_)
        )
    }
}

/// Result type alias for slow-query-doctor operations
pub type Result<T> = std::result::Result<T, SlowQueryError>;

pub fn configuration_error(message: impl Into<String>, field: &str) -> SlowQueryError {
    SlowQueryError::Configuration {
        message: message.into(),
        field: Some(field.to_string()),
    }
}

pub fn input_unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> SlowQueryError {
    SlowQueryError::InputUnreadable {
        path: path.into(),
        source,
    }
}
