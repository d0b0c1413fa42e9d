//! CLI validation and redirect policy tests

use clap::Parser;

use siteaudit::cli::{Args, ReportFormat, Standard};
use siteaudit::redirect::is_trivial_change;

fn parse(argv: &[&str]) -> Args {
    Args::parse_from(std::iter::once("siteaudit").chain(argv.iter().copied()))
}

#[test]
fn test_sitemap_url_must_be_http() {
    assert!(parse(&["https://example.com/sitemap.xml"]).validate().is_ok());
    assert!(parse(&["file:///tmp/sitemap.xml"]).validate().is_err());
    assert!(parse(&["example.com/sitemap.xml"]).validate().is_err());
}

#[test]
fn test_standard_parsing() {
    let args = parse(&["https://example.com/sitemap.xml", "-s", "section508"]);
    assert_eq!(args.standard, Standard::Section508);

    let args = parse(&["https://example.com/sitemap.xml", "--standard", "wcag2aaa"]);
    assert_eq!(args.standard, Standard::Wcag2Aaa);
}

#[test]
fn test_format_aliases() {
    let args = parse(&["https://example.com/sitemap.xml", "-f", "md"]);
    assert_eq!(args.formats, vec![ReportFormat::Markdown]);
}

#[test]
fn test_budget_override_validation() {
    assert!(parse(&["https://example.com/sitemap.xml", "--cls", "0.2"])
        .validate()
        .is_ok());
    assert!(parse(&["https://example.com/sitemap.xml", "--cls", "7.0"])
        .validate()
        .is_err());
    assert!(parse(&["https://example.com/sitemap.xml", "--lcp", "0"])
        .validate()
        .is_err());
}

#[test]
fn test_timeout_floor() {
    assert!(parse(&["https://example.com/sitemap.xml", "-t", "500"])
        .validate()
        .is_err());
    assert!(parse(&["https://example.com/sitemap.xml", "-t", "1000"])
        .validate()
        .is_ok());
}

// The one trivial-normalization rule: trailing slash and http→https are
// ignored; everything else is a real redirect.

#[test]
fn test_trivial_redirect_normalization() {
    assert!(is_trivial_change(
        "http://example.com/pricing",
        "https://example.com/pricing/"
    ));
    assert!(is_trivial_change(
        "https://example.com",
        "https://example.com/"
    ));
}

#[test]
fn test_non_trivial_redirects() {
    assert!(!is_trivial_change(
        "http://example.com",
        "https://example.com/landing"
    ));
    assert!(!is_trivial_change(
        "https://example.com/a",
        "https://example.com/b"
    ));
    assert!(!is_trivial_change(
        "https://example.com/a",
        "https://m.example.com/a"
    ));
}
