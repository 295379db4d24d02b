use serde::{Deserialize, Serialize};

use super::normalize::{tokenize, Token};

/// Query type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryType {
    /// SELECT queries
    Select,
    /// INSERT queries
    Insert,
    /// UPDATE queries
    Update,
    /// DELETE queries
    Delete,
    /// Data Definition Language (CREATE, DROP, ALTER, etc.)
    DDL,
    /// Other queries (BEGIN, COMMIT, VACUUM, etc.)
    Other,
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryType::Select => write!(f, "SELECT"),
            QueryType::Insert => write!(f, "INSERT"),
            QueryType::Update => write!(f, "UPDATE"),
            QueryType::Delete => write!(f, "DELETE"),
            QueryType::DDL => write!(f, "DDL"),
            QueryType::Other => write!(f, "OTHER"),
        }
    }
}

impl QueryType {
    /// Classify a statement by its leading keyword.
    ///
    /// For `WITH` statements the first top-level DML keyword after the
    /// common table expressions decides.
    pub fn classify(sql: &str) -> QueryType {
        let tokens = tokenize(sql);
        let mut words = tokens.iter().filter_map(|token| match token {
            Token::Keyword(word) | Token::Identifier(word) => Some(word.as_str()),
            _ => None,
        });

        match words.next() {
            Some("WITH") => Self::classify_with(&tokens),
            Some(word) => Self::from_keyword(word),
            None => QueryType::Other,
        }
    }

    fn from_keyword(word: &str) -> QueryType {
        match word {
            "SELECT" | "VALUES" | "TABLE" => QueryType::Select,
            "INSERT" => QueryType::Insert,
            "UPDATE" => QueryType::Update,
            "DELETE" => QueryType::Delete,
            "CREATE" | "DROP" | "ALTER" | "TRUNCATE" => QueryType::DDL,
            _ => QueryType::Other,
        }
    }

    fn classify_with(tokens: &[Token]) -> QueryType {
        let mut depth = 0usize;
        for token in tokens {
            match token {
                Token::Punct('(') => depth += 1,
                Token::Punct(')') => depth = depth.saturating_sub(1),
                Token::Keyword(word) if depth == 0 => match word.as_str() {
                    "SELECT" | "INSERT" | "UPDATE" | "DELETE" => return Self::from_keyword(word),
                    _ => {}
                },
                _ => {}
            }
        }
        QueryType::Other
    }
}
