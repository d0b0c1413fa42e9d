//! Report sinks
//!
//! Render the strict result structure into the requested formats. JSON is
//! the canonical machine-readable encoding; HTML, Markdown and CSV are
//! renderings of the same data. The CLI table is for terminals only and
//! never written to disk.

mod cli;
mod csv;
mod html;
mod json;
mod markdown;

use std::path::{Path, PathBuf};

pub use cli::print_summary_table;
pub use csv::format_csv;
pub use html::format_html;
pub use json::format_json;
pub use markdown::format_markdown;

use crate::audit::{PageResult, RunSummary};
use crate::cli::ReportFormat;
use crate::error::{AuditError, Result};

/// Write one report file per requested format into the output directory.
/// Returns the paths written.
pub fn write_reports(
    output_dir: &Path,
    formats: &[ReportFormat],
    summary: &RunSummary,
    results: &[PageResult],
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir).map_err(|e| AuditError::FileError {
        path: output_dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut written = Vec::with_capacity(formats.len());
    for format in formats {
        let content = match format {
            ReportFormat::Json => format_json(summary, results)?,
            ReportFormat::Html => format_html(summary, results),
            ReportFormat::Markdown => format_markdown(summary, results),
            ReportFormat::Csv => format_csv(results),
        };
        let path = output_dir.join(format!("audit-report.{}", format.extension()));
        std::fs::write(&path, content).map_err(|e| AuditError::FileError {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::ResultFactory;

    #[test]
    fn test_write_reports_creates_one_file_per_format() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![ResultFactory::crashed("https://example.com/", 10, "x")];
        let summary = RunSummary::from_results(&results, 10, 0.0);

        let written = write_reports(
            dir.path(),
            &[ReportFormat::Json, ReportFormat::Csv, ReportFormat::Markdown],
            &summary,
            &results,
        )
        .unwrap();

        assert_eq!(written.len(), 3);
        for path in &written {
            assert!(path.exists());
            assert!(std::fs::metadata(path).unwrap().len() > 0);
        }
    }
}
