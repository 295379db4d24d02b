//! Query normalization into grouping keys
//!
//! The text is tokenized (no syntax tree is built), literals and bind
//! parameters become `?`, words are case-folded and the tokens are rendered
//! back with canonical spacing. Rendering a token list and tokenizing the
//! result yields the same list, which makes [`normalize`] idempotent.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

const KEYWORDS: &[&str] = &[
    "ALL", "ALTER", "ANALYZE", "AND", "ANY", "ARRAY", "AS", "ASC", "BEGIN", "BETWEEN", "BY",
    "CASE", "CAST", "COMMIT", "CONCURRENTLY", "CONFLICT", "COPY", "CREATE", "CROSS", "CURRENT_DATE",
    "CURRENT_TIMESTAMP", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DO", "DROP", "ELSE", "END",
    "EXCEPT", "EXISTS", "EXPLAIN", "FETCH", "FILTER", "FIRST", "FOR", "FROM", "FULL", "GROUP",
    "HAVING", "ILIKE", "IN", "INDEX", "INNER", "INSERT", "INTERSECT", "INTERVAL", "INTO", "IS",
    "JOIN", "LAST", "LATERAL", "LEFT", "LIKE", "LIMIT", "LOCKED", "NATURAL", "NEXT", "NOT",
    "NOTHING", "NOWAIT", "NULL", "NULLS", "OFFSET", "ON", "ONLY", "OR", "ORDER", "OUTER", "OVER",
    "PARTITION", "RECURSIVE", "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SELECT", "SET",
    "SHARE", "SIMILAR", "SKIP", "SOME", "TABLE", "THEN", "TO", "TRUNCATE", "UNION", "UPDATE",
    "USING", "VACUUM", "VALUES", "VIEW", "WHEN", "WHERE", "WINDOW", "WITH",
];

/// Boolean literals fold to `?` like any other constant
const BOOLEAN_LITERALS: &[&str] = &["TRUE", "FALSE"];

fn keywords() -> &'static HashSet<&'static str> {
    static KEYWORD_SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    KEYWORD_SET.get_or_init(|| KEYWORDS.iter().copied().collect())
}

/// Canonical form of a query, used only as a grouping key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NormalizedQuery(String);

impl NormalizedQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// Known keyword, upper-cased
    Keyword(String),
    /// Unquoted identifier, lower-cased
    Identifier(String),
    /// Double-quoted identifier, verbatim with its quotes
    Quoted(String),
    /// Literal, bind parameter or existing placeholder
    Placeholder,
    /// `::`
    Cast,
    Operator(String),
    /// `, ; ( ) [ ] .`
    Punct(char),
}

impl Token {
    fn is_keyword(&self, word: &str) -> bool {
        matches!(self, Token::Keyword(k) if k == word)
    }
}

/// Normalize raw statement text into its grouping key
pub fn normalize(sql: &str) -> NormalizedQuery {
    let mut tokens = tokenize(sql);
    collapse_in_lists(&mut tokens);
    while matches!(tokens.last(), Some(Token::Punct(';'))) {
        tokens.pop();
    }
    NormalizedQuery(render(&tokens))
}

const OPERATOR_CHARS: &str = "+-*/<>=~!@#%^&|`";
/// An operator containing one of these may end in `+` or `-`
const OPERATOR_SPECIAL: &str = "~!@#%^&|`";

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

pub(crate) fn tokenize(sql: &str) -> Vec<Token> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c.is_whitespace() {
            i += 1;
        } else if c == '-' && next == Some('-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && next == Some('*') {
            i = skip_block_comment(&chars, i);
        } else if c == '\'' {
            i = skip_string(&chars, i, false);
            tokens.push(Token::Placeholder);
        } else if c == '"' {
            let end = skip_quoted_identifier(&chars, i);
            tokens.push(Token::Quoted(chars[i..end].iter().collect()));
            i = end;
        } else if c == '$' {
            i = scan_dollar(&chars, i, &mut tokens);
        } else if c == '?' {
            tokens.push(Token::Placeholder);
            i += 1;
        } else if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) {
            i = skip_number(&chars, i);
            tokens.push(Token::Placeholder);
        } else if is_word_start(c) {
            i = scan_word(&chars, i, &mut tokens);
        } else if c == ':' {
            if next == Some(':') {
                tokens.push(Token::Cast);
                i += 2;
            } else {
                tokens.push(Token::Operator(":".to_string()));
                i += 1;
            }
        } else if ",;()[].".contains(c) {
            tokens.push(Token::Punct(c));
            i += 1;
        } else if OPERATOR_CHARS.contains(c) {
            i = scan_operator(&chars, i, &mut tokens);
        } else {
            tokens.push(Token::Operator(c.to_string()));
            i += 1;
        }
    }

    tokens
}

fn skip_block_comment(chars: &[char], start: usize) -> usize {
    let mut depth = 0;
    let mut i = start;
    while i < chars.len() {
        if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
            depth += 1;
            i += 2;
        } else if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            i += 1;
        }
    }
    i
}

/// `start` points at the opening quote; returns the index after the literal
fn skip_string(chars: &[char], start: usize, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if backslash_escapes => i += 2,
            '\'' if chars.get(i + 1) == Some(&'\'') => i += 2,
            '\'' => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

fn skip_quoted_identifier(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == '"' {
            if chars.get(i + 1) == Some(&'"') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

fn skip_number(chars: &[char], start: usize) -> usize {
    let mut i = start;
    if chars[i] == '0' && matches!(chars.get(i + 1), Some('x') | Some('X')) {
        i += 2;
        while i < chars.len() && chars[i].is_ascii_hexdigit() {
            i += 1;
        }
        return i;
    }

    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
        i += 1;
    }
    if chars.get(i) == Some(&'.') && chars.get(i + 1) != Some(&'.') {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if matches!(chars.get(i), Some('e') | Some('E')) {
        let mut j = i + 1;
        if matches!(chars.get(j), Some('+') | Some('-')) {
            j += 1;
        }
        if chars.get(j).is_some_and(|c| c.is_ascii_digit()) {
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    // trailing identifier characters stay part of the literal (`1abc`)
    while i < chars.len() && is_word_char(chars[i]) {
        i += 1;
    }
    i
}

/// `$1` parameters and `$tag$ ... $tag$` strings
fn scan_dollar(chars: &[char], start: usize, tokens: &mut Vec<Token>) -> usize {
    let mut i = start + 1;
    if chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        tokens.push(Token::Placeholder);
        return i;
    }

    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
        i += 1;
    }
    if chars.get(i) != Some(&'$') {
        tokens.push(Token::Operator("$".to_string()));
        return start + 1;
    }

    let tag: Vec<char> = chars[start..=i].to_vec();
    let mut j = i + 1;
    while j < chars.len() {
        if chars[j..].starts_with(&tag) {
            tokens.push(Token::Placeholder);
            return j + tag.len();
        }
        j += 1;
    }
    tokens.push(Token::Placeholder);
    chars.len()
}

fn scan_word(chars: &[char], start: usize, tokens: &mut Vec<Token>) -> usize {
    let mut i = start;
    while i < chars.len() && is_word_char(chars[i]) {
        i += 1;
    }
    let word: String = chars[start..i].iter().collect();
    let upper = word.to_uppercase();

    // typed string prefixes: E'..', B'..', X'..', N'..'
    if chars.get(i) == Some(&'\'') && matches!(upper.as_str(), "E" | "B" | "X" | "N") {
        let end = skip_string(chars, i, upper == "E");
        tokens.push(Token::Placeholder);
        return end;
    }
    // U&'..' unicode escape strings
    if upper == "U" && chars.get(i) == Some(&'&') && chars.get(i + 1) == Some(&'\'') {
        let end = skip_string(chars, i + 1, false);
        tokens.push(Token::Placeholder);
        return end;
    }

    if BOOLEAN_LITERALS.contains(&upper.as_str()) {
        tokens.push(Token::Placeholder);
    } else if keywords().contains(upper.as_str()) {
        tokens.push(Token::Keyword(upper));
    } else {
        tokens.push(Token::Identifier(fold_identifier(&word)));
    }
    i
}

/// Lower-case an unquoted identifier one character at a time. A character
/// whose lowercase form is several characters, or no longer a word
/// character, is kept as written so the result scans back as one word.
fn fold_identifier(word: &str) -> String {
    word.chars()
        .enumerate()
        .map(|(index, c)| {
            let mut lower = c.to_lowercase();
            match (lower.next(), lower.next()) {
                (Some(l), None) if is_word_char(l) && (index > 0 || is_word_start(l)) => l,
                _ => c,
            }
        })
        .collect()
}

fn scan_operator(chars: &[char], start: usize, tokens: &mut Vec<Token>) -> usize {
    let mut i = start;
    while i < chars.len() && OPERATOR_CHARS.contains(chars[i]) {
        let starts_comment = (chars[i] == '-' && chars.get(i + 1) == Some(&'-'))
            || (chars[i] == '/' && chars.get(i + 1) == Some(&'*'));
        if starts_comment && i > start {
            break;
        }
        i += 1;
    }

    let mut op: String = chars[start..i].iter().collect();
    let mut trailing = Vec::new();
    while op.chars().count() > 1
        && (op.ends_with('+') || op.ends_with('-'))
        && !op.chars().any(|c| OPERATOR_SPECIAL.contains(c))
    {
        if let Some(last) = op.pop() {
            trailing.push(last);
        }
    }

    tokens.push(Token::Operator(op));
    for c in trailing.into_iter().rev() {
        tokens.push(Token::Operator(c.to_string()));
    }
    i
}

/// `IN (?, ?, ?)` becomes `IN (?)`
fn collapse_in_lists(tokens: &mut Vec<Token>) {
    let mut i = 0;
    while i + 2 < tokens.len() {
        if tokens[i].is_keyword("IN") && tokens[i + 1] == Token::Punct('(') {
            let start = i + 2;
            let mut j = start;
            let mut placeholders = 0;
            loop {
                match tokens.get(j) {
                    Some(Token::Placeholder) if (j - start) % 2 == 0 => placeholders += 1,
                    Some(Token::Punct(',')) if (j - start) % 2 == 1 => {}
                    Some(Token::Punct(')')) if (j - start) % 2 == 1 => break,
                    _ => {
                        placeholders = 0;
                        break;
                    }
                }
                j += 1;
            }
            if placeholders > 1 {
                tokens.drain(start + 1..j);
            }
        }
        i += 1;
    }
}

fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;

    for token in tokens {
        if let Some(prev) = prev {
            if needs_space(prev, token) {
                out.push(' ');
            }
        }
        match token {
            Token::Keyword(word) | Token::Identifier(word) | Token::Quoted(word) => out.push_str(word),
            Token::Operator(op) => out.push_str(op),
            Token::Placeholder => out.push('?'),
            Token::Cast => out.push_str("::"),
            Token::Punct(c) => out.push(*c),
        }
        prev = Some(token);
    }

    out
}

fn needs_space(prev: &Token, cur: &Token) -> bool {
    match (prev, cur) {
        (_, Token::Punct(',' | ';' | ')' | ']' | '.')) => false,
        (Token::Punct('(' | '[' | '.'), _) => false,
        (Token::Operator(op), Token::Cast) => op == ":",
        (Token::Cast, _) | (_, Token::Cast) => false,
        (Token::Identifier(_) | Token::Quoted(_) | Token::Punct(')' | ']'), Token::Punct('(' | '[')) => {
            false
        }
        _ => true,
    }
}
