//! Output Format Tests
//!
//! Tests for the JSON, HTML, Markdown and CSV report sinks over the
//! strict result structure.

use siteaudit::audit::{PageResult, ResultFactory, RunSummary};
use siteaudit::cli::ReportFormat;
use siteaudit::output::{format_csv, format_html, format_json, format_markdown, write_reports};
use siteaudit::redirect::{RedirectClassification, RedirectDecision};

fn sample_results() -> Vec<PageResult> {
    vec![
        ResultFactory::crashed("https://example.com/broken", 1500, "navigation timed out"),
        ResultFactory::skipped(
            "http://example.com/old",
            300,
            RedirectDecision {
                original_url: "http://example.com/old".to_string(),
                final_url: "https://example.com/new".to_string(),
                classification: RedirectClassification::HttpRedirect,
                status_chain: vec![301, 200],
                follow: false,
            },
        ),
    ]
}

#[test]
fn test_json_report_generation() {
    let results = sample_results();
    let summary = RunSummary::from_results(&results, 1800, 96.0);
    let json = format_json(&summary, &results).expect("JSON generation failed");

    let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
    assert!(parsed["tool"].as_str().unwrap().starts_with("siteaudit"));
    assert_eq!(parsed["summary"]["tested"], 2);
    assert_eq!(parsed["summary"]["crashed"], 1);
    assert_eq!(parsed["summary"]["skipped"], 1);
    assert_eq!(parsed["results"][0]["url"], "https://example.com/broken");
    assert_eq!(
        parsed["results"][1]["redirect"]["classification"],
        "http-redirect"
    );
}

#[test]
fn test_json_field_order_is_stable() {
    let results = sample_results();
    let summary = RunSummary::from_results(&results, 1800, 96.0);
    let first = format_json(&summary, &results).unwrap();
    let second = format_json(&summary, &results).unwrap();
    assert_eq!(first, second);

    // Struct declaration order: url before status before sections.
    let url_pos = first.find("\"url\"").unwrap();
    let status_pos = first.find("\"status\"").unwrap();
    let accessibility_pos = first.find("\"accessibility\"").unwrap();
    assert!(url_pos < status_pos);
    assert!(status_pos < accessibility_pos);
}

#[test]
fn test_html_report_generation() {
    let results = sample_results();
    let summary = RunSummary::from_results(&results, 1800, 96.0);
    let html = format_html(&summary, &results);

    assert!(html.contains("<!DOCTYPE html>"));
    assert!(html.contains("</html>"));
    assert!(html.contains("https://example.com/broken"));
    assert!(html.contains("badge crashed"));
    assert!(html.contains("badge skipped"));
    assert!(html.contains("https://example.com/new"));
}

#[test]
fn test_html_escaping() {
    let results = vec![ResultFactory::crashed(
        "https://example.com/?q=<script>alert('x')</script>",
        10,
        "<img src=x onerror=alert(1)>",
    )];
    let summary = RunSummary::from_results(&results, 10, 0.0);
    let html = format_html(&summary, &results);

    assert!(html.contains("&lt;script&gt;"));
    assert!(!html.contains("<script>alert"));
}

#[test]
fn test_markdown_report_generation() {
    let results = sample_results();
    let summary = RunSummary::from_results(&results, 1800, 96.0);
    let markdown = format_markdown(&summary, &results);

    assert!(markdown.contains("# Site Audit Report"));
    assert!(markdown.contains("**Pages tested:** 2"));
    assert!(markdown.contains("| https://example.com/broken | crashed |"));
    assert!(markdown.contains("Redirected"));
}

#[test]
fn test_csv_report_generation() {
    let results = sample_results();
    let csv = format_csv(&results);
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("url,status,"));
    assert!(lines[1].contains(",crashed,"));
    assert!(lines[2].contains(",skipped,"));
}

#[test]
fn test_write_reports_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    let results = sample_results();
    let summary = RunSummary::from_results(&results, 1800, 96.0);

    let written = write_reports(
        dir.path(),
        &[
            ReportFormat::Json,
            ReportFormat::Html,
            ReportFormat::Markdown,
            ReportFormat::Csv,
        ],
        &summary,
        &results,
    )
    .unwrap();

    assert_eq!(written.len(), 4);
    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert!(names.contains(&"audit-report.json".to_string()));
    assert!(names.contains(&"audit-report.html".to_string()));
    assert!(names.contains(&"audit-report.md".to_string()));
    assert!(names.contains(&"audit-report.csv".to_string()));
}
