//! PostgreSQL csvlog format
//!
//! Records follow RFC 4180 quoting. A quoted field may hold newlines, so one
//! record can span several physical lines.

use log::debug;
use std::io::BufRead;

use super::decoder::{
    has_duration_marker, split_duration_message, strip_statement_label, timestamp_or_error,
};
use super::pending::PendingStatements;
use super::text::LineReader;
use super::{EntryExtractor, LogEntry, RawEntry};
use crate::error::{DecodeError, Result};

const LOG_TIME: usize = 0;
const PROCESS_ID: usize = 3;
const ERROR_SEVERITY: usize = 11;
const MESSAGE: usize = 13;
/// csvlog rows always carry at least the columns up to `message`
const MIN_FIELDS: usize = MESSAGE + 1;

/// One csvlog record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRecord {
    pub line_number: usize,
    pub fields: Vec<String>,
    /// Statement logged by the same process in an earlier record when this
    /// record only carries the duration
    pub paired_statement: Option<String>,
}

impl CsvRecord {
    fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or_default()
    }

    pub fn message(&self) -> &str {
        self.field(MESSAGE)
    }

    pub fn process_id(&self) -> &str {
        self.field(PROCESS_ID)
    }

    /// Statement text of a `LOG` record written without a duration
    fn logged_statement(&self) -> Option<&str> {
        if matches!(self.field(ERROR_SEVERITY), "LOG" | "") {
            strip_statement_label(self.message())
        } else {
            None
        }
    }
}

/// Split one complete record into fields. Returns `None` on stray quotes.
pub fn split_record(text: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = text.chars().peekable();
    let mut in_quotes = false;
    let mut quoted = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            ',' => {
                fields.push(std::mem::take(&mut field));
                quoted = false;
            }
            '"' if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
            }
            '"' => return None,
            _ if quoted => return None,
            _ => field.push(c),
        }
    }

    if in_quotes {
        return None;
    }
    fields.push(field);
    Some(fields)
}

/// Streaming extractor for the csv format
pub struct CsvExtractor<R> {
    lines: LineReader<R>,
    pending_statements: PendingStatements,
    skipped: usize,
}

impl<R: BufRead> CsvExtractor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LineReader::new(reader),
            pending_statements: PendingStatements::new(),
            skipped: 0,
        }
    }

    /// Read physical lines until the quotes of one record balance
    fn next_record(&mut self) -> Result<Option<(usize, usize, String)>> {
        let Some((start, mut text)) = self.lines.next_line()? else {
            return Ok(None);
        };
        let mut physical = 1;
        let mut open_quote = quote_count(&text) % 2 == 1;

        while open_quote {
            match self.lines.next_line()? {
                Some((_, line)) => {
                    open_quote ^= quote_count(&line) % 2 == 1;
                    text.push('\n');
                    text.push_str(&line);
                    physical += 1;
                }
                None => break,
            }
        }

        Ok(Some((start, physical, text)))
    }
}

impl<R: BufRead> Iterator for CsvExtractor<R> {
    type Item = Result<RawEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (line_number, physical, text) = match self.next_record() {
                Ok(Some(record)) => record,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };

            if text.trim().is_empty() {
                continue;
            }

            let fields = match split_record(&text) {
                Some(fields) if fields.len() >= MIN_FIELDS => fields,
                _ => {
                    debug!("Skipping malformed csv record at line {}", line_number);
                    self.skipped += physical;
                    continue;
                }
            };

            let mut record = CsvRecord {
                line_number,
                fields,
                paired_statement: None,
            };
            let process_id = record.process_id().to_string();
            if has_duration_marker(record.message()) {
                record.paired_statement = self.pending_statements.take(&process_id);
                return Some(Ok(RawEntry::Csv(record)));
            }
            match record.logged_statement() {
                Some(statement) => {
                    let statement = statement.to_string();
                    self.pending_statements.remember(process_id, statement);
                }
                None => self.pending_statements.forget(&process_id),
            }
        }
    }
}

fn quote_count(line: &str) -> usize {
    line.bytes().filter(|b| *b == b'"').count()
}

impl<R: BufRead> EntryExtractor for CsvExtractor<R> {
    fn skipped_lines(&self) -> usize {
        self.skipped
    }
}

/// Decode a csvlog record into a [`LogEntry`]
pub fn decode_record(record: &CsvRecord) -> std::result::Result<LogEntry, DecodeError> {
    let line_number = record.line_number;
    let timestamp = timestamp_or_error(record.field(LOG_TIME), line_number)?;
    let message = split_duration_message(record.message(), line_number)?;
    let raw_text = message
        .statement
        .map(str::to_string)
        .or_else(|| record.paired_statement.clone())
        .ok_or(DecodeError::MissingStatement { line_number })?;

    let process_id = record.process_id();
    Ok(LogEntry {
        timestamp,
        duration_ms: message.duration_ms,
        raw_text,
        process_id: (!process_id.is_empty()).then(|| process_id.to_string()),
        line_number,
    })
}
