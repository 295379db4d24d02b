//! PostgreSQL stderr ("plain") log format
//!
//! A slow-query entry starts at a prefix line (`timestamp [zone] [pid] ...`)
//! whose message carries a `duration:` marker. Lines without a prefix that
//! follow it are continuation lines of the same statement.

use log::debug;
use regex::Regex;
use std::io::BufRead;
use std::sync::OnceLock;

use super::decoder::{has_duration_marker, split_duration_message, strip_statement_label, timestamp_or_error};
use super::pending::PendingStatements;
use super::text::LineReader;
use super::{EntryExtractor, LogEntry, RawEntry};
use crate::error::{DecodeError, Result};

fn prefix_regex() -> &'static Regex {
    static PREFIX_RE: OnceLock<Regex> = OnceLock::new();
    PREFIX_RE.get_or_init(|| {
        Regex::new(
            r"^(?P<ts>\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:\s*(?:[A-Za-z]{1,5}|[+-]\d{2}(?::?\d{2})?))?)\s+\[(?P<pid>\d+)(?:-\d+)?\]:?(?P<rest>.*)$",
        )
        .expect("valid log line prefix regex")
    })
}

fn level_regex() -> &'static Regex {
    static LEVEL_RE: OnceLock<Regex> = OnceLock::new();
    LEVEL_RE.get_or_init(|| {
        Regex::new(
            r"\b(?P<level>DEBUG[1-5]?|INFO|NOTICE|WARNING|ERROR|LOG|FATAL|PANIC|DETAIL|HINT|CONTEXT|STATEMENT|QUERY|LOCATION):\s+(?P<message>.*)$",
        )
        .expect("valid severity regex")
    })
}

/// The parsed prefix of one plain log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixLine {
    pub timestamp: String,
    pub process_id: String,
    pub level: Option<String>,
    /// Message text with prefix and severity label removed
    pub message: String,
}

impl PrefixLine {
    /// Parse a line that starts with a log-line prefix, or `None` for
    /// continuation and garbage lines
    pub fn parse(line: &str) -> Option<Self> {
        let captures = prefix_regex().captures(line)?;
        let rest = &captures["rest"];
        let (level, message) = match level_regex().captures(rest) {
            Some(level) => (Some(level["level"].to_string()), level["message"].to_string()),
            None => (None, rest.trim().to_string()),
        };

        Some(Self {
            timestamp: captures["ts"].to_string(),
            process_id: captures["pid"].to_string(),
            level,
            message,
        })
    }

    fn is_duration(&self) -> bool {
        has_duration_marker(&self.message)
    }

    /// `statement:` / `execute <name>:` lines logged without a duration
    fn is_statement(&self) -> bool {
        matches!(self.level.as_deref(), Some("LOG") | None)
            && strip_statement_label(&self.message).is_some()
    }

    /// Secondary lines (`DETAIL:`, `CONTEXT:`, ...) that accompany the
    /// previous record of the same process
    fn is_supplement(&self) -> bool {
        matches!(
            self.level.as_deref(),
            Some("DETAIL" | "HINT" | "CONTEXT" | "STATEMENT" | "QUERY" | "LOCATION")
        )
    }
}

/// One raw plain-format entry: the duration line and its continuation lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainBlock {
    pub line_number: usize,
    pub prefix: PrefixLine,
    pub continuation: Vec<String>,
    /// Statement text logged earlier by the same process when the duration
    /// line itself carries none
    pub paired_statement: Option<String>,
}

enum State {
    Idle,
    Entry(PlainBlock),
    Statement { process_id: String, lines: Vec<String> },
    /// Inside a log record that is not a slow-query entry
    Other,
}

/// Streaming extractor for the plain format
pub struct PlainExtractor<R> {
    lines: LineReader<R>,
    state: State,
    pending_statements: PendingStatements,
    skipped: usize,
    finished: bool,
}

impl<R: BufRead> PlainExtractor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LineReader::new(reader),
            state: State::Idle,
            pending_statements: PendingStatements::new(),
            skipped: 0,
            finished: false,
        }
    }

    /// Move to `next`, returning the entry that the old state completes
    fn transition(&mut self, next: State) -> Option<PlainBlock> {
        match std::mem::replace(&mut self.state, next) {
            State::Entry(mut block) => {
                trim_trailing_blank(&mut block.continuation);
                Some(block)
            }
            State::Statement { process_id, mut lines } => {
                trim_trailing_blank(&mut lines);
                self.pending_statements.remember(process_id, lines.join("\n"));
                None
            }
            State::Idle | State::Other => None,
        }
    }

    fn start_entry(&mut self, line_number: usize, prefix: PrefixLine) -> State {
        let pending = self.pending_statements.take(&prefix.process_id);
        let inline = split_duration_message(&prefix.message, line_number)
            .map(|m| m.statement.is_some())
            .unwrap_or(false);

        State::Entry(PlainBlock {
            line_number,
            paired_statement: if inline { None } else { pending },
            prefix,
            continuation: Vec::new(),
        })
    }

    fn process_line(&mut self, line_number: usize, line: String) -> Option<PlainBlock> {
        let Some(prefix) = PrefixLine::parse(&line) else {
            match &mut self.state {
                State::Entry(block) => block.continuation.push(line),
                State::Statement { lines, .. } => lines.push(line),
                State::Other => {}
                State::Idle if line.trim().is_empty() => {}
                State::Idle => {
                    debug!("Skipping line {} outside any log record", line_number);
                    self.skipped += 1;
                }
            }
            return None;
        };

        // the previous state must be closed before the next one reads the
        // pending statements
        let finished = self.transition(State::Idle);
        let next = if prefix.is_duration() {
            self.start_entry(line_number, prefix)
        } else if prefix.is_statement() {
            let first = strip_statement_label(&prefix.message)
                .unwrap_or_default()
                .to_string();
            State::Statement {
                process_id: prefix.process_id,
                lines: vec![first],
            }
        } else {
            if !prefix.is_supplement() {
                self.pending_statements.forget(&prefix.process_id);
            }
            State::Other
        };
        self.state = next;
        finished
    }
}

impl<R: BufRead> Iterator for PlainExtractor<R> {
    type Item = Result<RawEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.lines.next_line() {
                Ok(Some((line_number, line))) => {
                    if let Some(block) = self.process_line(line_number, line) {
                        return Some(Ok(RawEntry::Plain(block)));
                    }
                }
                Ok(None) => {
                    self.finished = true;
                    return self
                        .transition(State::Idle)
                        .map(|block| Ok(RawEntry::Plain(block)));
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

impl<R: BufRead> EntryExtractor for PlainExtractor<R> {
    fn skipped_lines(&self) -> usize {
        self.skipped
    }
}

fn trim_trailing_blank(lines: &mut Vec<String>) {
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
}

/// Decode a plain block into a [`LogEntry`]
pub fn decode_block(block: &PlainBlock) -> std::result::Result<LogEntry, DecodeError> {
    let line_number = block.line_number;
    let timestamp = timestamp_or_error(&block.prefix.timestamp, line_number)?;
    let message = split_duration_message(&block.prefix.message, line_number)?;

    let mut raw_text = match (message.statement, &block.paired_statement) {
        (Some(inline), _) => inline.to_string(),
        (None, Some(paired)) => paired.clone(),
        (None, None) => String::new(),
    };
    for line in &block.continuation {
        raw_text.push('\n');
        raw_text.push_str(line);
    }

    if raw_text.trim().is_empty() {
        return Err(DecodeError::MissingStatement { line_number });
    }

    Ok(LogEntry {
        timestamp,
        duration_ms: message.duration_ms,
        raw_text,
        process_id: Some(block.prefix.process_id.clone()),
        line_number,
    })
}
