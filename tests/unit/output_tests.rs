//! Unit tests for text and JSON report formatting

#[path = "../test_data/mod.rs"]
mod test_data;

use slow_query_doctor::{
    AnalysisConfig, AnalysisReport, Analyzer, JsonFormatter, LogFormat, RecommendationProvider,
    RecommendationStatus, StaticAdvisor, TextFormatter,
};
use std::io::Cursor;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn sample_report() -> AnalysisReport {
    Analyzer::new(AnalysisConfig::new(LogFormat::Plain))
        .analyze_reader(Cursor::new(test_data::PLAIN_LOG))
        .unwrap()
}

fn static_recommendations(report: &AnalysisReport) -> Vec<RecommendationStatus> {
    let advisor = StaticAdvisor::new();
    report
        .queries
        .iter()
        .map(|q| match advisor.recommend(&q.stats) {
            Ok(recommendation) => RecommendationStatus::Available(recommendation),
            Err(e) => RecommendationStatus::Unavailable { reason: e.to_string() },
        })
        .collect()
}

mod text_formatter_tests {
    use super::*;

    #[test]
    fn test_summary_and_ranking() {
        let report = sample_report();
        let output = TextFormatter::new().format(&report, None).unwrap();

        assert!(output.contains("Slow Query Report"));
        assert!(output.contains("Entries Seen: 6"));
        assert!(output.contains("Entries Parsed: 5"));
        assert!(output.contains("Below Threshold (1000 ms): 1"));
        assert!(output.contains("Distinct Queries: 4"));
        assert!(output.contains("#1 [DELETE] impact 3234.57 ms, 1 calls"));
        assert!(output.contains("#2 [SELECT] impact 2545.12 ms, 2 calls"));
        assert!(!output.contains("Recommendation"));

        let delete = output.find("DELETE FROM sessions").unwrap();
        let update = output.find("UPDATE products").unwrap();
        assert!(delete < update);
    }

    #[test]
    fn test_multiline_representative_is_kept_whole() {
        let output = TextFormatter::new().format(&sample_report(), None).unwrap();
        assert!(output.contains("   SELECT u.name, p.title\n       FROM users u\n       JOIN posts p ON u.id = p.user_id"));
    }

    #[test]
    fn test_timing_section() {
        let report = sample_report();
        let with_timing = TextFormatter::new().format(&report, None).unwrap();
        assert!(with_timing.contains("Busiest Hour: 10:00 UTC"));

        let without = TextFormatter::new().with_timing(false).format(&report, None).unwrap();
        assert!(!without.contains("Busiest Hour"));
    }

    #[test]
    fn test_recommendations_rendered_per_query() {
        let report = sample_report();
        let mut statuses = static_recommendations(&report);
        statuses[1] = RecommendationStatus::Unavailable {
            reason: "provider timed out after 30s".to_string(),
        };

        let output = TextFormatter::new().format(&report, Some(&statuses)).unwrap();
        assert_eq!(output.matches("Recommendation (static):").count(), 3);
        assert!(output.contains("Recommendation unavailable: provider timed out after 30s"));
    }

    #[test]
    fn test_interrupted_empty_report() {
        let report = Analyzer::new(AnalysisConfig::default())
            .with_cancel_flag(Arc::new(AtomicBool::new(true)))
            .analyze_reader(Cursor::new(test_data::PLAIN_LOG))
            .unwrap();
        let output = TextFormatter::new().format(&report, None).unwrap();
        assert!(output.contains("Interrupted"));
        assert!(output.contains("No queries to rank."));
    }
}

mod json_formatter_tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_json_structure() {
        let report = sample_report();
        let output = JsonFormatter::new().format(&report, None).unwrap();
        let json: Value = serde_json::from_str(&output).unwrap();

        assert_eq!(json["summary"]["total_entries_seen"], 6);
        assert_eq!(json["summary"]["entries_parsed"], 5);
        assert_eq!(json["summary"]["interrupted"], false);
        assert_eq!(json["distinct_queries"], 4);
        assert_eq!(json["config"]["format"], "plain");
        assert_eq!(json["config"]["representative"], "longest");
        assert!(json.get("metadata").is_none());

        let queries = json["queries"].as_array().unwrap();
        assert_eq!(queries.len(), 4);
        assert_eq!(queries[0]["rank"], 1);
        assert_eq!(queries[0]["query_type"], "Delete");
        assert_eq!(queries[0]["impact_score"], 3234.567);
        assert_eq!(
            queries[0]["normalized_query"],
            "DELETE FROM sessions WHERE expires_at < now()"
        );
        assert_eq!(queries[1]["frequency"], 2);
        assert!(queries[0].get("recommendation").is_none());
    }

    #[test]
    fn test_json_with_metadata_and_recommendations() {
        let report = sample_report();
        let statuses = static_recommendations(&report);
        let output = JsonFormatter::new()
            .with_pretty(false)
            .with_metadata("0.1.0", "postgresql.log")
            .format(&report, Some(&statuses))
            .unwrap();
        assert!(!output.contains('\n'));

        let json: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["metadata"]["tool"], "slow-query-doctor");
        assert_eq!(json["metadata"]["version"], "0.1.0");
        assert_eq!(json["metadata"]["source"], "postgresql.log");

        for query in json["queries"].as_array().unwrap() {
            assert_eq!(query["recommendation"]["status"], "available");
            assert_eq!(query["recommendation"]["provider"], "static");
        }
    }

    #[test]
    fn test_json_timing_profile() {
        let json = JsonFormatter::new().to_value(&sample_report(), None).unwrap();
        assert_eq!(json["timing"]["entries"], 5);
        assert_eq!(json["timing"]["busiest_hour"], 10);
        assert_eq!(json["timing"]["hourly"].as_array().unwrap().len(), 1);
    }
}
