//! HTML Report Sink
//!
//! Renders a self-contained HTML page: run summary up top, one card per
//! audited URL below.

use crate::audit::{Grade, PageResult, PageStatus, RunSummary};

/// Render the run as a standalone HTML document.
pub fn format_html(summary: &RunSummary, results: &[PageResult]) -> String {
    let report = HtmlReport { summary, results };
    report.render()
}

struct HtmlReport<'a> {
    summary: &'a RunSummary,
    results: &'a [PageResult],
}

impl<'a> HtmlReport<'a> {
    fn render(&self) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Site Audit Report</title>
    {styles}
</head>
<body>
    <div class="container">
        {header}
        {summary}
        {pages}
        {footer}
    </div>
</body>
</html>"#,
            styles = self.render_styles(),
            header = self.render_header(),
            summary = self.render_summary(),
            pages = self.render_pages(),
            footer = self.render_footer(),
        )
    }

    fn render_styles(&self) -> &'static str {
        r#"<style>
:root {
    --color-pass: #16a34a;
    --color-fail: #dc2626;
    --color-crash: #7c2d12;
    --color-skip: #64748b;
    --color-bg: #f8fafc;
    --color-card: #ffffff;
    --color-border: #e2e8f0;
    --color-text: #1e293b;
}
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: system-ui, sans-serif; background: var(--color-bg); color: var(--color-text); }
.container { max-width: 1100px; margin: 0 auto; padding: 2rem 1rem; }
h1 { margin-bottom: 0.25rem; }
.meta { color: var(--color-skip); margin-bottom: 1.5rem; }
.cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(140px, 1fr)); gap: 1rem; margin-bottom: 2rem; }
.card { background: var(--color-card); border: 1px solid var(--color-border); border-radius: 8px; padding: 1rem; text-align: center; }
.card .value { font-size: 1.6rem; font-weight: 700; }
.page { background: var(--color-card); border: 1px solid var(--color-border); border-radius: 8px; padding: 1rem; margin-bottom: 1rem; }
.page h3 { word-break: break-all; margin-bottom: 0.5rem; }
.badge { display: inline-block; padding: 0.1rem 0.6rem; border-radius: 999px; color: #fff; font-size: 0.85rem; }
.badge.passed { background: var(--color-pass); }
.badge.failed { background: var(--color-fail); }
.badge.crashed { background: var(--color-crash); }
.badge.skipped { background: var(--color-skip); }
.scores span { margin-right: 1rem; }
ul.issues { margin: 0.5rem 0 0 1.2rem; }
footer { margin-top: 2rem; color: var(--color-skip); font-size: 0.9rem; }
</style>"#
    }

    fn render_header(&self) -> String {
        format!(
            r#"<h1>Site Audit Report</h1>
<p class="meta">{} pages tested &middot; finished {}</p>"#,
            self.summary.tested,
            self.summary.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }

    fn render_summary(&self) -> String {
        let s = self.summary;
        let card = |label: &str, value: String| {
            format!(
                r#"<div class="card"><div class="value">{}</div><div>{}</div></div>"#,
                value, label
            )
        };
        format!(
            r#"<div class="cards">{}{}{}{}{}{}</div>"#,
            card("Average score", format!("{:.0} ({})", s.average_score, s.overall_grade)),
            card("Passed", s.passed.to_string()),
            card("Failed", s.failed.to_string()),
            card("Crashed", s.crashed.to_string()),
            card("Skipped", s.skipped.to_string()),
            card("Errors", s.total_errors.to_string()),
        )
    }

    fn render_pages(&self) -> String {
        self.results.iter().map(|r| self.render_page(r)).collect()
    }

    fn render_page(&self, result: &PageResult) -> String {
        let status_class = match result.status {
            PageStatus::Passed => "passed",
            PageStatus::Failed => "failed",
            PageStatus::Crashed => "crashed",
            PageStatus::Skipped => "skipped",
        };

        let redirect = result
            .redirect
            .as_ref()
            .map(|r| {
                format!(
                    r#"<p class="meta">Redirects to {} (chain {:?})</p>"#,
                    escape(&r.final_url),
                    r.status_chain
                )
            })
            .unwrap_or_default();

        let issues = if result.accessibility.errors.is_empty() {
            String::new()
        } else {
            let items: String = result
                .accessibility
                .errors
                .iter()
                .map(|issue| {
                    format!(
                        "<li><strong>{}</strong> {}</li>",
                        escape(&issue.rule_code),
                        escape(&issue.message)
                    )
                })
                .collect();
            format!(r#"<ul class="issues">{}</ul>"#, items)
        };

        format!(
            r#"<div class="page">
<h3>{url} <span class="badge {status_class}">{status}</span></h3>
{redirect}
<p class="scores">
<span>Overall: {overall} ({grade})</span>
<span>A11y: {a11y}</span>
<span>Performance: {perf}</span>
<span>SEO: {seo}</span>
<span>Weight: {weight}</span>
<span>Mobile: {mobile}</span>
</p>
{issues}
</div>"#,
            url = escape(&result.url),
            status_class = status_class,
            status = result.status,
            redirect = redirect,
            overall = result.overall_score,
            grade = result.overall_grade,
            a11y = self.score_with_grade(result.accessibility.score),
            perf = self.score_with_grade(result.performance.score),
            seo = self.score_with_grade(result.seo.score),
            weight = self.score_with_grade(result.content_weight.score),
            mobile = self.score_with_grade(result.mobile.overall_score),
            issues = issues,
        )
    }

    fn score_with_grade(&self, score: u32) -> String {
        format!("{} ({})", score, Grade::from_score(score))
    }

    fn render_footer(&self) -> String {
        format!(
            "<footer>Generated by siteaudit v{} in {} ms</footer>",
            env!("CARGO_PKG_VERSION"),
            self.summary.duration_ms
        )
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::ResultFactory;

    #[test]
    fn test_html_structure() {
        let results = vec![ResultFactory::crashed("https://example.com/", 10, "x")];
        let summary = RunSummary::from_results(&results, 10, 0.0);
        let html = format_html(&summary, &results);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Site Audit Report"));
        assert!(html.contains("badge crashed"));
        assert!(html.contains("https://example.com/"));
    }

    #[test]
    fn test_html_escapes_url() {
        let results = vec![ResultFactory::crashed(
            "https://example.com/?a=<script>",
            10,
            "x",
        )];
        let summary = RunSummary::from_results(&results, 10, 0.0);
        let html = format_html(&summary, &results);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("?a=<script>"));
    }
}
