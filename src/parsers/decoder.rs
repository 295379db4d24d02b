//! Field decoding shared by the plain, csv and json formats

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

use super::{csv, json, plain, LogEntry, RawEntry};
use crate::error::DecodeError;

fn timestamp_regex() -> &'static Regex {
    static TIMESTAMP_RE: OnceLock<Regex> = OnceLock::new();
    TIMESTAMP_RE.get_or_init(|| {
        Regex::new(
            r"^(?P<datetime>\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(?:\.\d+)?)\s*(?P<zone>[A-Za-z]{1,5}|[+-]\d{2}(?::?\d{2})?)?$",
        )
        .expect("valid timestamp regex")
    })
}

fn duration_marker_regex() -> &'static Regex {
    static MARKER_RE: OnceLock<Regex> = OnceLock::new();
    MARKER_RE.get_or_init(|| Regex::new(r"^\s*duration:").expect("valid duration marker regex"))
}

fn duration_value_regex() -> &'static Regex {
    static VALUE_RE: OnceLock<Regex> = OnceLock::new();
    VALUE_RE.get_or_init(|| {
        Regex::new(r"^\s*(?P<value>\S+?)\s*ms\b").expect("valid duration value regex")
    })
}

fn statement_regex() -> &'static Regex {
    static STATEMENT_RE: OnceLock<Regex> = OnceLock::new();
    STATEMENT_RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*(?:statement|query|(?:execute|parse|bind)\s+[^:]*)\s*:\s?(?P<sql>.*)$")
            .expect("valid statement regex")
    })
}

/// Decode one raw entry into a [`LogEntry`]
pub fn decode(raw: &RawEntry) -> Result<LogEntry, DecodeError> {
    match raw {
        RawEntry::Plain(block) => plain::decode_block(block),
        RawEntry::Csv(record) => csv::decode_record(record),
        RawEntry::Json(record) => json::decode_record(record),
    }
}

/// Whether a log message starts with a `duration:` marker
pub fn has_duration_marker(message: &str) -> bool {
    duration_marker_regex().is_match(message)
}

/// A log message split around its duration marker
#[derive(Debug, Clone, PartialEq)]
pub struct DurationMessage<'a> {
    pub duration_ms: f64,
    /// Statement text that follows the duration on the same message, if any
    pub statement: Option<&'a str>,
}

/// Split `duration: 12.3 ms  statement: SELECT ...` into its parts
pub fn split_duration_message(
    message: &str,
    line_number: usize,
) -> Result<DurationMessage<'_>, DecodeError> {
    let marker = duration_marker_regex()
        .find(message)
        .ok_or(DecodeError::MissingDuration { line_number })?;
    let after_marker = &message[marker.end()..];

    let captures = duration_value_regex()
        .captures(after_marker)
        .ok_or_else(|| DecodeError::InvalidDuration {
            line_number,
            value: after_marker.trim().chars().take(32).collect(),
        })?;
    let value = &captures["value"];
    let duration_ms = parse_duration_value(value, line_number)?;

    let rest = &after_marker[captures.get(0).map_or(0, |m| m.end())..];
    Ok(DurationMessage {
        duration_ms,
        statement: strip_statement_label(rest),
    })
}

/// Text after a `statement:` / `execute <name>:` style label, if non-empty
pub fn strip_statement_label(message: &str) -> Option<&str> {
    statement_regex()
        .captures(message)
        .and_then(|captures| captures.name("sql"))
        .map(|m| m.as_str())
        .filter(|sql| !sql.trim().is_empty())
}

/// Parse a duration in milliseconds, rejecting negative and non-finite values
pub fn parse_duration_value(value: &str, line_number: usize) -> Result<f64, DecodeError> {
    match value.trim().parse::<f64>() {
        Ok(ms) if ms.is_finite() && ms >= 0.0 => Ok(ms),
        _ => Err(DecodeError::InvalidDuration {
            line_number,
            value: value.to_string(),
        }),
    }
}

/// Parse a log timestamp into UTC.
///
/// Accepts `YYYY-MM-DD HH:MM:SS[.fff] [zone]` and RFC 3339. `UTC`, `GMT`, `Z`
/// and a missing zone mean UTC, numeric offsets are applied, and any other
/// zone abbreviation is read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let captures = timestamp_regex().captures(value)?;
    let datetime = captures["datetime"].replace('T', " ");
    let naive = NaiveDateTime::parse_from_str(&datetime, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    let offset = captures
        .name("zone")
        .and_then(|zone| parse_offset(zone.as_str()))
        .unwrap_or_else(|| Utc.fix());

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn timestamp_or_error(value: &str, line_number: usize) -> Result<DateTime<Utc>, DecodeError> {
    parse_timestamp(value).ok_or_else(|| DecodeError::InvalidTimestamp {
        line_number,
        value: value.to_string(),
    })
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let sign = match zone.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits: String = zone[1..].chars().filter(|c| c.is_ascii_digit()).collect();
    let hours: i32 = digits.get(0..2)?.parse().ok()?;
    let minutes: i32 = match digits.get(2..4) {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
