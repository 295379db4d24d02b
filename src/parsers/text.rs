//! Byte-level line reading shared by all extractors

use std::io::{self, BufRead};

/// Reads physical lines from a byte stream, one at a time.
///
/// Invalid UTF-8 sequences and control characters other than tab are
/// replaced with U+FFFD, and the line terminator (`\n` or `\r\n`) is
/// dropped. Nothing else about the line is altered.
pub struct LineReader<R> {
    reader: R,
    buf: Vec<u8>,
    line_number: usize,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(256),
            line_number: 0,
        }
    }

    /// Number of the last line returned (1-based, 0 before the first read)
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Read the next line, or `None` at end of input
    pub fn next_line(&mut self) -> io::Result<Option<(usize, String)>> {
        self.buf.clear();
        let read = self.reader.read_until(b'\n', &mut self.buf)?;
        if read == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }

        self.line_number += 1;
        Ok(Some((self.line_number, sanitize(&self.buf))))
    }
}

/// Apply the escaping policy to one line of raw bytes
pub fn sanitize(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if !text.chars().any(is_replaced_control) {
        return text.into_owned();
    }
    text.chars()
        .map(|c| if is_replaced_control(c) { char::REPLACEMENT_CHARACTER } else { c })
        .collect()
}

fn is_replaced_control(c: char) -> bool {
    c.is_control() && c != '\t' && c != '\n'
}
