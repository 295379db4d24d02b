//! JSON log format (PostgreSQL jsonlog and generic slow-log objects)
//!
//! Records are JSON objects, usually one per line. Objects may also be
//! pretty-printed over several lines or wrapped in a top-level array.

use log::debug;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::io::BufRead;

use super::decoder::{
    has_duration_marker, parse_duration_value, split_duration_message, strip_statement_label,
    timestamp_or_error,
};
use super::text::LineReader;
use super::{EntryExtractor, LogEntry, RawEntry};
use crate::error::{DecodeError, Result};
use chrono::DateTime;

const TIMESTAMP_KEYS: [&str; 4] = ["timestamp", "log_time", "time", "ts"];
const DURATION_KEYS: [&str; 2] = ["duration_ms", "duration"];
const STATEMENT_KEYS: [&str; 2] = ["query", "statement"];
const PROCESS_ID_KEYS: [&str; 2] = ["pid", "process_id"];

/// One JSON log object
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRecord {
    pub line_number: usize,
    pub object: Map<String, Value>,
}

impl JsonRecord {
    fn first<'a>(&'a self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .filter_map(|key| self.object.get(*key))
            .find(|value| !value.is_null())
    }

    fn message(&self) -> Option<&str> {
        self.object.get("message").and_then(Value::as_str)
    }

    fn is_entry(&self) -> bool {
        self.first(&DURATION_KEYS).is_some() || self.message().is_some_and(has_duration_marker)
    }
}

/// Tracks object nesting across lines, outside of string literals
#[derive(Default)]
struct ObjectScanner {
    buffer: String,
    start_line: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

/// Streaming extractor for the json format
pub struct JsonExtractor<R> {
    lines: LineReader<R>,
    scanner: ObjectScanner,
    ready: VecDeque<(usize, String)>,
    skipped: usize,
    finished: bool,
}

impl<R: BufRead> JsonExtractor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LineReader::new(reader),
            scanner: ObjectScanner::default(),
            ready: VecDeque::new(),
            skipped: 0,
            finished: false,
        }
    }

    /// Feed one physical line, queueing every object it completes
    fn scan_line(&mut self, line_number: usize, line: &str) {
        let scanner = &mut self.scanner;
        let mut garbage = false;

        if scanner.depth > 0 {
            scanner.buffer.push('\n');
        }

        for c in line.chars() {
            if scanner.depth == 0 {
                match c {
                    '{' => {
                        scanner.depth = 1;
                        scanner.start_line = line_number;
                        scanner.buffer.clear();
                        scanner.buffer.push(c);
                    }
                    '[' | ']' | ',' => {}
                    c if c.is_whitespace() => {}
                    _ => garbage = true,
                }
                continue;
            }

            scanner.buffer.push(c);
            if scanner.in_string {
                if scanner.escaped {
                    scanner.escaped = false;
                } else if c == '\\' {
                    scanner.escaped = true;
                } else if c == '"' {
                    scanner.in_string = false;
                }
                continue;
            }

            match c {
                '"' => scanner.in_string = true,
                '{' => scanner.depth += 1,
                '}' => {
                    scanner.depth -= 1;
                    if scanner.depth == 0 {
                        let text = std::mem::take(&mut scanner.buffer);
                        self.ready.push_back((scanner.start_line, text));
                    }
                }
                _ => {}
            }
        }

        if garbage {
            debug!("Skipping non-JSON content at line {}", line_number);
            self.skipped += 1;
        }
    }

    fn parse_object(&mut self, line_number: usize, text: &str) -> Option<JsonRecord> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(object)) => Some(JsonRecord {
                line_number,
                object,
            }),
            Ok(_) | Err(_) => {
                debug!("Skipping unparsable JSON record at line {}", line_number);
                self.skipped += 1;
                None
            }
        }
    }
}

impl<R: BufRead> Iterator for JsonExtractor<R> {
    type Item = Result<RawEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((line_number, text)) = self.ready.pop_front() {
                if let Some(record) = self.parse_object(line_number, &text) {
                    if record.is_entry() {
                        return Some(Ok(RawEntry::Json(record)));
                    }
                }
                continue;
            }

            if self.finished {
                return None;
            }

            match self.lines.next_line() {
                Ok(Some((line_number, line))) => self.scan_line(line_number, &line),
                Ok(None) => {
                    self.finished = true;
                    if self.scanner.depth > 0 {
                        debug!(
                            "Skipping unterminated JSON record starting at line {}",
                            self.scanner.start_line
                        );
                        self.skipped += 1;
                    }
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

impl<R: BufRead> EntryExtractor for JsonExtractor<R> {
    fn skipped_lines(&self) -> usize {
        self.skipped
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode a JSON record into a [`LogEntry`]
pub fn decode_record(record: &JsonRecord) -> std::result::Result<LogEntry, DecodeError> {
    let line_number = record.line_number;

    let timestamp = match record.first(&TIMESTAMP_KEYS) {
        Some(Value::Number(epoch)) => epoch
            .as_f64()
            .and_then(|secs| DateTime::from_timestamp_millis((secs * 1000.0) as i64))
            .ok_or_else(|| DecodeError::InvalidTimestamp {
                line_number,
                value: epoch.to_string(),
            })?,
        Some(Value::String(text)) => timestamp_or_error(text, line_number)?,
        _ => {
            return Err(DecodeError::InvalidTimestamp {
                line_number,
                value: String::new(),
            })
        }
    };

    let (duration_ms, inline_statement) = match record.first(&DURATION_KEYS) {
        Some(value) => {
            let text = value_as_text(value).unwrap_or_else(|| value.to_string());
            let ms = parse_duration_value(&text, line_number)?;
            let statement = record.message().and_then(strip_statement_label);
            (ms, statement)
        }
        None => {
            let message = split_duration_message(record.message().unwrap_or_default(), line_number)?;
            (message.duration_ms, message.statement)
        }
    };

    let raw_text = record
        .first(&STATEMENT_KEYS)
        .and_then(Value::as_str)
        .filter(|sql| !sql.trim().is_empty())
        .or(inline_statement)
        .map(str::to_string)
        .ok_or(DecodeError::MissingStatement { line_number })?;

    Ok(LogEntry {
        timestamp,
        duration_ms,
        raw_text,
        process_id: record.first(&PROCESS_ID_KEYS).and_then(value_as_text),
        line_number,
    })
}
