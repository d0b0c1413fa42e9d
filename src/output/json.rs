//! JSON Report Sink
//!
//! The canonical machine-readable encoding of a run. Field order follows
//! struct declaration order and is stable across runs; consumers must
//! ignore unknown fields.

use serde::Serialize;

use crate::audit::{PageResult, RunSummary};
use crate::error::Result;

/// Top-level JSON document
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub tool: String,
    pub summary: &'a RunSummary,
    pub results: &'a [PageResult],
}

/// Render the canonical JSON report.
pub fn format_json(summary: &RunSummary, results: &[PageResult]) -> Result<String> {
    let report = JsonReport {
        tool: format!("siteaudit v{}", env!("CARGO_PKG_VERSION")),
        summary,
        results,
    };
    serde_json::to_string_pretty(&report).map_err(|e| crate::error::AuditError::OutputError {
        reason: format!("JSON serialization failed: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::ResultFactory;

    #[test]
    fn test_format_json_contains_summary_and_pages() {
        let results = vec![ResultFactory::crashed("https://example.com/", 10, "boom")];
        let summary = RunSummary::from_results(&results, 10, 0.0);
        let json = format_json(&summary, &results).unwrap();

        assert!(json.contains("\"tool\""));
        assert!(json.contains("siteaudit"));
        assert!(json.contains("https://example.com/"));
        assert!(json.contains("\"status\": \"crashed\""));
    }

    #[test]
    fn test_json_is_parseable() {
        let results = vec![ResultFactory::crashed("https://example.com/", 10, "boom")];
        let summary = RunSummary::from_results(&results, 10, 0.0);
        let json = format_json(&summary, &results).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["tested"], 1);
        assert_eq!(value["results"][0]["accessibility"]["score"], 0);
    }
}
