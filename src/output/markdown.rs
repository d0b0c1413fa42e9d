//! Markdown Report Sink

use crate::audit::{PageResult, PageStatus, RunSummary};

/// Render the run as a Markdown document.
pub fn format_markdown(summary: &RunSummary, results: &[PageResult]) -> String {
    let mut out = String::new();

    out.push_str("# Site Audit Report\n\n");
    out.push_str("## Summary\n\n");
    out.push_str(&format!("- **Pages tested:** {}\n", summary.tested));
    out.push_str(&format!(
        "- **Passed / Failed / Crashed / Skipped:** {} / {} / {} / {}\n",
        summary.passed, summary.failed, summary.crashed, summary.skipped
    ));
    out.push_str(&format!(
        "- **Average score:** {:.1} (Grade {})\n",
        summary.average_score, summary.overall_grade
    ));
    out.push_str(&format!(
        "- **Accessibility issues:** {} errors, {} warnings\n",
        summary.total_errors, summary.total_warnings
    ));
    out.push_str(&format!(
        "- **Duration:** {} ms ({:.1} pages/min)\n\n",
        summary.duration_ms, summary.pages_per_minute
    ));

    out.push_str("## Pages\n\n");
    out.push_str("| URL | Status | Score | A11y | Perf | SEO | Weight | Mobile |\n");
    out.push_str("|-----|--------|-------|------|------|-----|--------|--------|\n");
    for result in results {
        out.push_str(&format!(
            "| {} | {} | {} ({}) | {} | {} | {} | {} | {} |\n",
            result.url,
            result.status,
            result.overall_score,
            result.overall_grade,
            result.accessibility.score,
            result.performance.score,
            result.seo.score,
            result.content_weight.score,
            result.mobile.overall_score,
        ));
    }
    out.push('\n');

    for result in results {
        if result.accessibility.errors.is_empty() && result.status != PageStatus::Skipped {
            continue;
        }
        out.push_str(&format!("### {}\n\n", result.url));
        if let Some(redirect) = &result.redirect {
            out.push_str(&format!(
                "Redirected ({:?}) to {} — status chain {:?}\n\n",
                redirect.classification, redirect.final_url, redirect.status_chain
            ));
        }
        for issue in &result.accessibility.errors {
            out.push_str(&format!(
                "- **{}**: {}{}\n",
                issue.rule_code,
                issue.message,
                issue
                    .selector
                    .as_deref()
                    .map(|s| format!(" (`{}`)", s))
                    .unwrap_or_default()
            ));
        }
        out.push('\n');
    }

    out.push_str("---\n\n");
    out.push_str(&format!(
        "*Generated by siteaudit v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::ResultFactory;

    #[test]
    fn test_markdown_contains_summary_and_table() {
        let results = vec![ResultFactory::crashed("https://example.com/", 10, "boom")];
        let summary = RunSummary::from_results(&results, 10, 0.0);
        let md = format_markdown(&summary, &results);

        assert!(md.contains("# Site Audit Report"));
        assert!(md.contains("| https://example.com/ | crashed |"));
        assert!(md.contains("**Pages tested:** 1"));
    }
}
