//! Human-readable text output formatter for analysis reports

use std::fmt::Write;

use crate::pipeline::AnalysisReport;
use crate::recommend::RecommendationStatus;
use crate::Result;

/// Text formatter for analysis reports
pub struct TextFormatter {
    show_timing: bool,
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new() -> Self {
        Self { show_timing: true }
    }

    pub fn with_timing(mut self, show_timing: bool) -> Self {
        self.show_timing = show_timing;
        self
    }

    /// Format the report, with one recommendation block per query when
    /// `recommendations` is given
    pub fn format(
        &self,
        report: &AnalysisReport,
        recommendations: Option<&[RecommendationStatus]>,
    ) -> Result<String> {
        let mut output = String::new();
        let summary = &report.summary;

        writeln!(output, "Slow Query Report")?;
        writeln!(output, "=================")?;
        writeln!(output, "Entries Seen: {}", summary.total_entries_seen)?;
        writeln!(output, "Entries Parsed: {}", summary.entries_parsed)?;
        writeln!(
            output,
            "Below Threshold ({} ms): {}",
            report.config.min_duration_ms, summary.entries_discarded_below_threshold
        )?;
        writeln!(output, "Decode Failures: {}", summary.decode_failures)?;
        writeln!(output, "Skipped Lines: {}", summary.skipped_lines)?;
        writeln!(output, "Distinct Queries: {}", report.distinct_queries)?;
        if summary.interrupted {
            writeln!(output, "Interrupted: results cover only the part of the log read")?;
        }

        if self.show_timing && report.timing.entries > 0 {
            let timing = &report.timing;
            writeln!(output, "\nTiming")?;
            writeln!(output, "------")?;
            writeln!(output, "Total Duration: {:.2} ms", timing.total_duration_ms)?;
            writeln!(output, "Average Duration: {:.2} ms", timing.average_duration_ms)?;
            writeln!(output, "Max Duration: {:.2} ms", timing.max_duration_ms)?;
            if let Some(hour) = timing.busiest_hour {
                writeln!(output, "Busiest Hour: {:02}:00 UTC", hour)?;
            }
        }

        if report.queries.is_empty() {
            writeln!(output, "\nNo queries to rank.")?;
            return Ok(output);
        }

        writeln!(output, "\nTop {} Queries by Impact", report.queries.len())?;
        writeln!(output, "------------------------")?;
        for (index, ranked) in report.queries.iter().enumerate() {
            let stats = &ranked.stats;
            writeln!(
                output,
                "\n#{} [{}] impact {:.2} ms, {} calls, avg {:.2} ms, min {:.2} ms, max {:.2} ms",
                ranked.rank,
                stats.query_type,
                stats.impact_score(),
                stats.frequency,
                stats.avg_duration_ms(),
                stats.min_duration_ms,
                stats.max_duration_ms
            )?;
            writeln!(
                output,
                "   seen {} .. {}",
                stats.first_seen.format("%Y-%m-%d %H:%M:%S"),
                stats.last_seen.format("%Y-%m-%d %H:%M:%S")
            )?;
            for line in stats.representative_text.lines() {
                writeln!(output, "   {}", line)?;
            }

            match recommendations.and_then(|statuses| statuses.get(index)) {
                Some(RecommendationStatus::Available(recommendation)) => {
                    writeln!(output, "   Recommendation ({}):", recommendation.provider)?;
                    for line in recommendation.text.lines() {
                        writeln!(output, "     {}", line)?;
                    }
                }
                Some(RecommendationStatus::Unavailable { reason }) => {
                    writeln!(output, "   Recommendation unavailable: {}", reason)?;
                }
                None => {}
            }
        }

        Ok(output)
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new()
    }
}
