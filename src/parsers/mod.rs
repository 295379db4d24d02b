//! Log format extractors and field decoding
//!
//! Each format module turns a byte stream into [`RawEntry`] blocks and knows
//! how to decode its own blocks into [`LogEntry`] values.

pub mod csv;
pub mod decoder;
pub mod json;
pub mod pending;
pub mod plain;
pub mod text;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use crate::error::{input_unreadable, Result, SlowQueryError};

pub use csv::{CsvExtractor, CsvRecord};
pub use decoder::decode;
pub use json::{JsonExtractor, JsonRecord};
pub use plain::{PlainBlock, PlainExtractor, PrefixLine};

/// Supported slow-query log formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// PostgreSQL stderr output
    #[default]
    Plain,
    /// PostgreSQL csvlog
    Csv,
    /// PostgreSQL jsonlog or one JSON object per record
    Json,
}

impl FromStr for LogFormat {
    type Err = SlowQueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "stderr" => Ok(LogFormat::Plain),
            "csv" | "csvlog" => Ok(LogFormat::Csv),
            "json" | "jsonlog" => Ok(LogFormat::Json),
            _ => Err(SlowQueryError::UnrecognizedFormat {
                format: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Plain => write!(f, "plain"),
            LogFormat::Csv => write!(f, "csv"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// One slow statement occurrence decoded from the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub duration_ms: f64,
    /// Statement text without log metadata; continuation lines joined by `\n`
    pub raw_text: String,
    pub process_id: Option<String>,
    pub line_number: usize,
}

/// An extracted, not yet decoded, log entry
#[derive(Debug, Clone, PartialEq)]
pub enum RawEntry {
    Plain(PlainBlock),
    Csv(CsvRecord),
    Json(JsonRecord),
}

impl RawEntry {
    /// Input line where the entry starts
    pub fn line_number(&self) -> usize {
        match self {
            RawEntry::Plain(block) => block.line_number,
            RawEntry::Csv(record) => record.line_number,
            RawEntry::Json(record) => record.line_number,
        }
    }
}

/// A lazy sequence of raw entries that also counts what it had to skip
pub trait EntryExtractor: Iterator<Item = Result<RawEntry>> {
    /// Lines (or records) associated with no entry
    fn skipped_lines(&self) -> usize;
}

/// Build the extractor for `format` over any buffered reader
pub fn extractor_for<'a, R>(reader: R, format: LogFormat) -> Box<dyn EntryExtractor + 'a>
where
    R: BufRead + 'a,
{
    match format {
        LogFormat::Plain => Box::new(PlainExtractor::new(reader)),
        LogFormat::Csv => Box::new(CsvExtractor::new(reader)),
        LogFormat::Json => Box::new(JsonExtractor::new(reader)),
    }
}

/// Open `path` and extract from the start. Calling it again restarts the
/// sequence from the beginning of the file.
pub fn open_extractor(path: &Path, format: LogFormat) -> Result<Box<dyn EntryExtractor>> {
    let file = File::open(path).map_err(|e| input_unreadable(path, e))?;
    Ok(extractor_for(BufReader::new(file), format))
}
