//! Basic usage example for slow-query-doctor
//!
//! Analyzes a PostgreSQL log given on the command line (or a built-in
//! sample), prints the ranked queries and asks the static advisor about each.
//!
//!     cargo run --example basic_usage -- /var/log/postgresql/postgresql.log

use anyhow::Context;
use slow_query_doctor::{
    AnalysisConfig, Analyzer, LogFormat, RecommendationConfig, RecommendationRunner,
    StaticAdvisor, TextFormatter,
};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

const SAMPLE_LOG: &str = "\
2024-08-15 10:30:15.123 UTC [12345] LOG:  duration: 1045.123 ms  statement: SELECT * FROM users WHERE email LIKE '%@example.com'
2024-08-15 10:30:18.345 UTC [12348] LOG:  statement: UPDATE products SET price = 10 WHERE id = 7
2024-08-15 10:30:18.567 UTC [12348] LOG:  duration: 2012.345 ms
2024-08-15 10:30:19.678 UTC [12349] LOG:  duration: 1156.789 ms  statement: SELECT u.name, p.title
    FROM users u, posts p
2024-08-15 10:30:21.345 UTC [12351] LOG:  duration: 3234.567 ms  statement: DELETE FROM sessions WHERE id NOT IN (SELECT session_id FROM active)
2024-08-15 10:30:22.345 UTC [12345] LOG:  duration: 1500.000 ms  statement: SELECT * FROM users WHERE email LIKE '%@example.org'
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("slow-query-doctor Basic Usage Example");
    println!("=====================================");

    let config = AnalysisConfig::new(LogFormat::Plain).with_top_n(5);
    let analyzer = Analyzer::new(config);

    let report = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            println!("Reading log file: {}", path.display());
            analyzer
                .analyze_file(&path)
                .with_context(|| format!("failed to analyze {}", path.display()))?
        }
        None => {
            println!("No log file given, using the built-in sample");
            analyzer
                .analyze_reader(Cursor::new(SAMPLE_LOG))
                .context("failed to analyze sample log")?
        }
    };

    println!(
        "Parsed {} of {} entries into {} distinct queries",
        report.summary.entries_parsed, report.summary.total_entries_seen, report.distinct_queries
    );

    let runner = RecommendationRunner::new(
        Arc::new(StaticAdvisor::new()),
        RecommendationConfig::default(),
    )?;
    let recommendations = runner.run(&report.queries).await;

    let text = TextFormatter::new().format(&report, Some(&recommendations))?;
    println!("\n{}", text);

    Ok(())
}
