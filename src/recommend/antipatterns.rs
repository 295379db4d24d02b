//! Static detection of common SQL anti-patterns
//!
//! Works on raw statement text with regular expressions; no schema or query
//! plan is needed.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

const BASE_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiPatternType {
    LeadingWildcardLike,
    FunctionOnColumn,
    LargeInClause,
    NotInWithSubquery,
    NoWhereClauseOnJoin,
}

impl AntiPatternType {
    pub const ALL: [AntiPatternType; 5] = [
        AntiPatternType::LeadingWildcardLike,
        AntiPatternType::FunctionOnColumn,
        AntiPatternType::LargeInClause,
        AntiPatternType::NotInWithSubquery,
        AntiPatternType::NoWhereClauseOnJoin,
    ];

    /// Penalty weight used by [`optimization_score`]
    pub fn severity(&self) -> f64 {
        match self {
            AntiPatternType::NoWhereClauseOnJoin => 0.4,
            AntiPatternType::LeadingWildcardLike => 0.3,
            AntiPatternType::NotInWithSubquery => 0.3,
            AntiPatternType::FunctionOnColumn => 0.2,
            AntiPatternType::LargeInClause => 0.1,
        }
    }

    pub fn problem(&self) -> &'static str {
        match self {
            AntiPatternType::LeadingWildcardLike => "Full table scan; cannot use B-tree index",
            AntiPatternType::FunctionOnColumn => "Function prevents index usage",
            AntiPatternType::LargeInClause => "Can be slow with many values",
            AntiPatternType::NotInWithSubquery => {
                "Returns incorrect results if subquery has NULL values"
            }
            AntiPatternType::NoWhereClauseOnJoin => "Cartesian product risk; hard to optimize",
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            AntiPatternType::LeadingWildcardLike => {
                "Use full-text search (tsvector) or restructure data if possible"
            }
            AntiPatternType::FunctionOnColumn => {
                "Create function-based index or restructure condition"
            }
            AntiPatternType::LargeInClause => "Use JOIN to temporary table or VALUES list instead",
            AntiPatternType::NotInWithSubquery => "Use NOT EXISTS or LEFT JOIN...IS NULL instead",
            AntiPatternType::NoWhereClauseOnJoin => {
                "Use explicit INNER JOIN ON with proper join condition"
            }
        }
    }

    pub fn example(&self) -> &'static str {
        match self {
            AntiPatternType::LeadingWildcardLike => {
                "-- Instead of: WHERE email LIKE '%@example.com'\n\
                 -- Consider: WHERE email LIKE 'user@%' (if pattern allows)\n\
                 -- Or use: WHERE email @@ to_tsquery('example.com')"
            }
            AntiPatternType::FunctionOnColumn => {
                "-- Instead of: WHERE LOWER(email) = 'test@example.com'\n\
                 -- Create index: CREATE INDEX ON users (LOWER(email))\n\
                 -- Or store normalized data"
            }
            AntiPatternType::LargeInClause => {
                "-- Instead of: WHERE id IN (1, 2, 3, ..., 5000)\n\
                 -- Use: JOIN (VALUES (1), (2), (3)) AS t(id) ON table.id = t.id\n\
                 -- Or create temp table with values"
            }
            AntiPatternType::NotInWithSubquery => {
                "-- Instead of: WHERE user_id NOT IN (SELECT id FROM deleted_users)\n\
                 -- Use: WHERE NOT EXISTS (SELECT 1 FROM deleted_users d WHERE d.id = user_id)\n\
                 -- Or: LEFT JOIN deleted_users d ON d.id = user_id WHERE d.id IS NULL"
            }
            AntiPatternType::NoWhereClauseOnJoin => {
                "-- Instead of: SELECT * FROM orders o, customers c\n\
                 -- Use: SELECT * FROM orders o INNER JOIN customers c ON o.customer_id = c.id"
            }
        }
    }

    fn regex(&self) -> &'static Regex {
        static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
        let patterns = PATTERNS.get_or_init(|| {
            AntiPatternType::ALL
                .iter()
                .map(|kind| {
                    RegexBuilder::new(kind.pattern())
                        .case_insensitive(true)
                        .dot_matches_new_line(true)
                        .build()
                        .expect("valid anti-pattern regex")
                })
                .collect()
        });
        &patterns[*self as usize]
    }

    fn pattern(&self) -> &'static str {
        match self {
            AntiPatternType::LeadingWildcardLike => r#"\bWHERE\s+\w+\s+LIKE\s+['"]%[^%'"]"#,
            AntiPatternType::FunctionOnColumn => r"\bWHERE\s+\w+\s*\(\s*\w+\s*\)\s*[=<>!]",
            AntiPatternType::LargeInClause => r"\bIN\s*\(\s*[^)]*,.*?,.*?,.*?,.*?[^)]*\)",
            AntiPatternType::NotInWithSubquery => r"\bNOT\s+IN\s*\(\s*SELECT\b",
            AntiPatternType::NoWhereClauseOnJoin => {
                r"\bFROM\s+\w+(?:\s+(?:AS\s+)?\w+)?\s*,\s*\w+"
            }
        }
    }
}

impl fmt::Display for AntiPatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AntiPatternType::LeadingWildcardLike => "Leading Wildcard Like",
            AntiPatternType::FunctionOnColumn => "Function On Column",
            AntiPatternType::LargeInClause => "Large In Clause",
            AntiPatternType::NotInWithSubquery => "Not In With Subquery",
            AntiPatternType::NoWhereClauseOnJoin => "No Where Clause On Join",
        };
        write!(f, "{}", name)
    }
}

fn where_regex() -> &'static Regex {
    static WHERE_RE: OnceLock<Regex> = OnceLock::new();
    WHERE_RE.get_or_init(|| Regex::new(r"(?i)\bWHERE\b").expect("valid where regex"))
}

/// One detected anti-pattern occurrence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AntiPatternMatch {
    pub pattern_type: AntiPatternType,
    pub matched_text: String,
    pub confidence: f64,
}

impl AntiPatternMatch {
    pub fn problem(&self) -> &'static str {
        self.pattern_type.problem()
    }

    pub fn suggestion(&self) -> &'static str {
        self.pattern_type.suggestion()
    }

    pub fn example(&self) -> &'static str {
        self.pattern_type.example()
    }
}

/// Detects common SQL anti-patterns in statement text
#[derive(Debug, Default)]
pub struct AntiPatternDetector;

impl AntiPatternDetector {
    pub fn new() -> Self {
        Self
    }

    /// All matches, grouped by pattern type in [`AntiPatternType::ALL`] order
    pub fn detect(&self, query: &str) -> Vec<AntiPatternMatch> {
        let mut matches = Vec::new();
        for kind in AntiPatternType::ALL {
            for found in kind.regex().find_iter(query) {
                // a comma join is only flagged when no WHERE clause follows it
                if kind == AntiPatternType::NoWhereClauseOnJoin
                    && where_regex().is_match(&query[found.end()..])
                {
                    continue;
                }
                matches.push(AntiPatternMatch {
                    pattern_type: kind,
                    matched_text: found.as_str().to_string(),
                    confidence: confidence(kind, found.as_str()),
                });
            }
        }
        matches
    }
}

fn confidence(kind: AntiPatternType, matched: &str) -> f64 {
    match kind {
        AntiPatternType::LargeInClause => {
            let commas = matched.matches(',').count();
            if commas > 10 {
                (BASE_CONFIDENCE + commas as f64 / 100.0).min(1.0)
            } else if commas < 5 {
                (BASE_CONFIDENCE - 0.2).max(0.5)
            } else {
                BASE_CONFIDENCE
            }
        }
        AntiPatternType::LeadingWildcardLike => BASE_CONFIDENCE + 0.1,
        _ => BASE_CONFIDENCE,
    }
}

/// 1.0 for a clean query down to 0.0 for many or severe issues
pub fn optimization_score(matches: &[AntiPatternMatch]) -> f64 {
    let penalty: f64 = matches
        .iter()
        .map(|m| m.pattern_type.severity() * m.confidence)
        .sum();
    (1.0 - penalty.min(1.0)).max(0.0)
}
