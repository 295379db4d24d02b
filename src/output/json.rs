//! JSON output formatter for analysis reports

use serde_json::{json, Value};

use crate::pipeline::AnalysisReport;
use crate::recommend::RecommendationStatus;
use crate::Result;

/// JSON formatter for analysis reports
pub struct JsonFormatter {
    pretty: bool,
    tool_version: Option<String>,
    source: Option<String>,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self {
            pretty: true,
            tool_version: None,
            source: None,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Add a `metadata` object naming the tool version and analyzed file
    pub fn with_metadata(mut self, tool_version: &str, source: &str) -> Self {
        self.tool_version = Some(tool_version.to_string());
        self.source = Some(source.to_string());
        self
    }

    /// Build the JSON document. `recommendations`, when given, is aligned
    /// with `report.queries`.
    pub fn to_value(
        &self,
        report: &AnalysisReport,
        recommendations: Option<&[RecommendationStatus]>,
    ) -> Result<Value> {
        let mut queries = Vec::with_capacity(report.queries.len());
        for (index, ranked) in report.queries.iter().enumerate() {
            let mut value = serde_json::to_value(ranked)?;
            if let (Some(statuses), Value::Object(map)) = (recommendations, &mut value) {
                if let Some(status) = statuses.get(index) {
                    map.insert("recommendation".to_string(), serde_json::to_value(status)?);
                }
            }
            queries.push(value);
        }

        let mut document = json!({
            "summary": report.summary,
            "config": report.config,
            "distinct_queries": report.distinct_queries,
            "timing": report.timing,
            "queries": queries,
        });

        if let (Some(version), Value::Object(map)) = (&self.tool_version, &mut document) {
            map.insert(
                "metadata".to_string(),
                json!({
                    "tool": "slow-query-doctor",
                    "version": version,
                    "source": self.source,
                }),
            );
        }

        Ok(document)
    }

    pub fn format(
        &self,
        report: &AnalysisReport,
        recommendations: Option<&[RecommendationStatus]>,
    ) -> Result<String> {
        let value = self.to_value(report, recommendations)?;
        let output = if self.pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(output)
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}
