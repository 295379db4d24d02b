//! Unit tests for aggregation, ranking and the analysis pipeline
//!
//! Runs the full extract, decode, filter and rank pass over in-memory logs.

#[path = "../test_data/mod.rs"]
mod test_data;

use chrono::{Duration, TimeZone, Utc};
use slow_query_doctor::{
    normalize, AnalysisConfig, AnalysisReport, Analyzer, LogEntry, LogFormat, ParseSummary,
    ProgressObserver, QueryAggregator, QueryType, RepresentativePolicy, SlowQueryError,
};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn analyze(content: &str, config: AnalysisConfig) -> AnalysisReport {
    Analyzer::new(config)
        .analyze_reader(Cursor::new(content.to_string()))
        .expect("analysis should succeed")
}

fn entry(sql: &str, duration_ms: f64, offset_secs: i64) -> LogEntry {
    LogEntry {
        timestamp: Utc.with_ymd_and_hms(2024, 8, 15, 10, 0, 0).unwrap()
            + Duration::seconds(offset_secs),
        duration_ms,
        raw_text: sql.to_string(),
        process_id: Some("4242".to_string()),
        line_number: offset_secs as usize + 1,
    }
}

fn ranked_texts(report: &AnalysisReport) -> Vec<String> {
    report
        .queries
        .iter()
        .map(|q| q.stats.normalized.to_string())
        .collect()
}

mod pipeline_tests {
    use super::*;

    #[test]
    fn test_plain_log_ranking() {
        let report = analyze(test_data::PLAIN_LOG, AnalysisConfig::new(LogFormat::Plain));

        assert_eq!(report.summary.total_entries_seen, 6);
        assert_eq!(report.summary.entries_parsed, 5);
        assert_eq!(report.summary.entries_discarded_below_threshold, 1);
        assert_eq!(report.summary.decode_failures, 0);
        assert_eq!(report.distinct_queries, 4);

        let types: Vec<QueryType> = report.queries.iter().map(|q| q.stats.query_type).collect();
        assert_eq!(
            types,
            vec![QueryType::Delete, QueryType::Select, QueryType::Update, QueryType::Select]
        );

        let users = &report.queries[1].stats;
        assert_eq!(users.frequency, 2);
        assert_eq!(users.total_duration_ms(), 2545.123);
        assert_eq!(users.representative_text, "select * from users where active = false;");
    }

    #[test]
    fn test_csv_and_json_logs() {
        let csv = analyze(test_data::CSV_LOG, AnalysisConfig::new(LogFormat::Csv));
        assert_eq!(csv.summary.entries_parsed, 3);
        assert_eq!(csv.distinct_queries, 2);
        assert_eq!(csv.queries[0].stats.frequency, 2);
        assert_eq!(csv.queries[0].stats.impact_score(), 2700.0);

        let json = analyze(test_data::JSON_LOG, AnalysisConfig::new(LogFormat::Json));
        assert_eq!(json.summary.entries_parsed, 3);
        assert_eq!(json.distinct_queries, 2);
        assert_eq!(json.queries[0].stats.impact_score(), 2700.0);
        assert_eq!(json.queries[1].stats.query_type, QueryType::Update);
    }

    #[test]
    fn test_threshold_filters_before_aggregation() {
        let report = analyze(
            test_data::THRESHOLD_LOG,
            AnalysisConfig::default().with_min_duration(1000.0),
        );

        assert_eq!(report.summary.entries_parsed, 2);
        assert_eq!(report.summary.entries_discarded_below_threshold, 1);
        assert_eq!(report.queries.len(), 1);
        assert_eq!(report.queries[0].stats.frequency, 2);
        assert_eq!(report.queries[0].stats.min_duration_ms, 1500.0);
    }

    #[test]
    fn test_counter_invariant_holds() {
        let logs = [
            (test_data::PLAIN_LOG, LogFormat::Plain),
            (test_data::CSV_LOG, LogFormat::Csv),
            (test_data::JSON_LOG, LogFormat::Json),
            (test_data::THRESHOLD_LOG, LogFormat::Plain),
        ];
        for (content, format) in logs {
            for min_duration in [0.0, 1000.0, 2000.0] {
                let config = AnalysisConfig::new(format).with_min_duration(min_duration);
                let summary = match Analyzer::new(config).analyze_reader(Cursor::new(content)) {
                    Ok(report) => report.summary,
                    Err(SlowQueryError::NoMatchingEntries { summary }) => summary,
                    Err(e) => panic!("unexpected error {e}"),
                };
                assert!(summary.is_consistent(), "{format} at {min_duration}: {summary:?}");
            }
        }
    }

    #[test]
    fn test_no_duration_markers() {
        let result = Analyzer::new(AnalysisConfig::default())
            .analyze_reader(Cursor::new(test_data::NO_DURATION_LOG));

        match result {
            Err(SlowQueryError::NoMatchingEntries { summary }) => {
                assert_eq!(summary.entries_parsed, 0);
                assert_eq!(summary.total_entries_seen, 0);
            }
            other => panic!("expected NoMatchingEntries, got {other:?}"),
        }
    }

    #[test]
    fn test_top_n_larger_than_distinct() {
        let report = analyze(test_data::THRESHOLD_LOG, AnalysisConfig::default().with_min_duration(0.0));
        assert_eq!(report.queries.len(), 1);

        let log = test_data::generate_large_log(30, 3);
        let report = analyze(&log, AnalysisConfig::default().with_top_n(10));
        assert_eq!(report.distinct_queries, 3);
        assert_eq!(report.queries.len(), 3);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let log = test_data::generate_large_log(500, 17);
        let first = analyze(&log, AnalysisConfig::default().with_top_n(17));
        let second = analyze(&log, AnalysisConfig::default().with_top_n(17));

        assert_eq!(ranked_texts(&first), ranked_texts(&second));
        assert_eq!(first.queries, second.queries);
        assert_eq!(first.summary, second.summary);
    }
}

mod ranking_tests {
    use super::*;

    #[test]
    fn test_impact_beats_input_order() {
        let heavy = "SELECT * FROM orders WHERE customer_id = 1";
        let light = "SELECT * FROM users WHERE id = 1";

        for reversed in [false, true] {
            let mut entries = vec![entry(light, 500.0, 0), entry(heavy, 1200.0, 1)];
            if reversed {
                entries.reverse();
            }
            let mut aggregator = QueryAggregator::default();
            for e in entries {
                aggregator.record(e);
            }
            let ranked = aggregator.rank(10);
            assert_eq!(ranked[0].stats.normalized, normalize(heavy));
            assert_eq!(ranked[0].rank, 1);
            assert_eq!(ranked[1].stats.normalized, normalize(light));
        }
    }

    #[test]
    fn test_frequent_cheap_query_outranks_rare_slow_one() {
        let mut aggregator = QueryAggregator::default();
        aggregator.record(entry("SELECT * FROM reports", 5000.0, 0));
        for i in 0..10 {
            aggregator.record(entry(&format!("SELECT * FROM users WHERE id = {i}"), 600.0, i + 1));
        }
        let ranked = aggregator.rank(2);
        assert_eq!(ranked[0].stats.frequency, 10);
        assert_eq!(ranked[0].stats.impact_score(), 6000.0);
    }

    #[test]
    fn test_equal_impact_tie_break() {
        let mut aggregator = QueryAggregator::default();
        aggregator.record(entry("SELECT 1 FROM b", 1000.0, 5));
        aggregator.record(entry("SELECT 1 FROM a", 1000.0, 2));
        let ranked = aggregator.rank(2);
        // earlier first_seen wins
        assert_eq!(ranked[0].stats.representative_text, "SELECT 1 FROM a");
    }

    #[test]
    fn test_representative_policy_from_config() {
        let log = "\
2024-08-15 10:00:00 UTC [1] LOG:  duration: 1000 ms  statement: SELECT * FROM t WHERE id = 1
2024-08-15 10:00:01 UTC [1] LOG:  duration: 3000 ms  statement: SELECT * FROM t WHERE id = 22
2024-08-15 10:00:02 UTC [1] LOG:  duration: 2000 ms  statement: SELECT * FROM t WHERE id = 333
";
        let text_for = |policy| {
            analyze(log, AnalysisConfig::default().with_representative(policy)).queries[0]
                .stats
                .representative_text
                .clone()
        };
        assert_eq!(text_for(RepresentativePolicy::Longest), "SELECT * FROM t WHERE id = 333");
        assert_eq!(text_for(RepresentativePolicy::FirstSeen), "SELECT * FROM t WHERE id = 1");
        assert_eq!(text_for(RepresentativePolicy::Slowest), "SELECT * FROM t WHERE id = 22");
    }
}

mod cancellation_tests {
    use super::*;

    /// Raises the cancel flag at the first progress notification
    struct CancelOnProgress(Arc<AtomicBool>);

    impl ProgressObserver for CancelOnProgress {
        fn on_progress(&self, _summary: &ParseSummary) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_cancel_before_first_entry() {
        let flag = Arc::new(AtomicBool::new(true));
        let report = Analyzer::new(AnalysisConfig::default())
            .with_cancel_flag(flag)
            .analyze_reader(Cursor::new(test_data::PLAIN_LOG))
            .unwrap();

        assert!(report.summary.interrupted);
        assert_eq!(report.summary, ParseSummary { interrupted: true, ..ParseSummary::default() });
        assert!(report.queries.is_empty());
    }

    #[test]
    fn test_cancel_mid_run_keeps_consumed_prefix() {
        let flag = Arc::new(AtomicBool::new(false));
        let observer = CancelOnProgress(Arc::clone(&flag));
        let log = test_data::generate_large_log(100, 4);

        let report = Analyzer::new(AnalysisConfig::default().with_progress_interval(10))
            .with_observer(&observer)
            .with_cancel_flag(flag)
            .analyze_reader(Cursor::new(log))
            .unwrap();

        assert!(report.summary.interrupted);
        assert_eq!(report.summary.total_entries_seen, 10);
        assert!(report.summary.is_consistent());
        let aggregated: u64 = report.queries.iter().map(|q| q.stats.frequency).sum();
        assert_eq!(aggregated, report.summary.entries_parsed);
        assert_eq!(report.timing.entries, report.summary.entries_parsed);
    }
}
