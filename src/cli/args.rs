//! CLI argument parsing using clap
//!
//! Defines all command-line arguments and their validation.

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::wcag::WcagLevel;

/// siteaudit - Site-wide web quality auditor
///
/// Drives a headless Chrome across every URL in a sitemap and audits
/// accessibility, performance, SEO, mobile-friendliness and content weight.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "siteaudit",
    version,
    about = "Audit a whole site from its sitemap: accessibility, performance, SEO, mobile, content weight",
    long_about = "siteaudit discovers every URL in a sitemap (including sitemap indexes),\n\
                  drives a pool of headless Chrome instances across them, and writes\n\
                  structured reports per format.\n\n\
                  Redirected pages are skipped by default so the audit only measures\n\
                  pages that actually serve content at their sitemap URL."
)]
pub struct Args {
    /// Sitemap URL to discover pages from
    ///
    /// Example: https://example.com/sitemap.xml
    #[arg(value_name = "SITEMAP_URL")]
    pub sitemap: String,

    /// Maximum number of pages to audit (0 = all discovered)
    #[arg(short = 'm', long, default_value = "0", value_name = "NUM")]
    pub max_pages: usize,

    /// Number of concurrent workers (0 = auto: min(CPU cores, 4); 2 in CI)
    #[arg(short = 'c', long, default_value = "0", value_name = "NUM")]
    pub concurrency: usize,

    /// Per-page navigation and analysis deadline in milliseconds
    #[arg(short = 't', long, default_value = "30000", value_name = "MS")]
    pub timeout_ms: u64,

    /// Accessibility standard to audit against
    #[arg(short = 's', long, default_value = "wcag2aa", value_enum)]
    pub standard: Standard,

    /// Directory to write one report file per format into
    #[arg(short = 'o', long, default_value = "reports", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Report formats to produce
    #[arg(
        short = 'f',
        long,
        value_enum,
        value_delimiter = ',',
        default_value = "json,html"
    )]
    pub formats: Vec<ReportFormat>,

    /// Follow non-trivial redirects instead of skipping the page
    #[arg(long)]
    pub follow_redirects: bool,

    /// Enable the optional analyzers (security headers, structured data)
    /// and extend the per-page deadline to 90 seconds
    #[arg(long)]
    pub comprehensive: bool,

    /// Disable the Core Web Vitals analyzer
    #[arg(long)]
    pub no_performance: bool,

    /// Disable the SEO analyzer
    #[arg(long)]
    pub no_seo: bool,

    /// Disable the content weight analyzer
    #[arg(long)]
    pub no_content_weight: bool,

    /// Disable the mobile-friendliness analyzer
    #[arg(long)]
    pub no_mobile: bool,

    /// Performance budget template
    #[arg(long, default_value = "default", value_enum)]
    pub budget: BudgetTemplate,

    /// Override the LCP budget in milliseconds
    #[arg(long, value_name = "MS")]
    pub lcp: Option<f64>,

    /// Override the CLS budget
    #[arg(long, value_name = "SCORE")]
    pub cls: Option<f64>,

    /// Override the FCP budget in milliseconds
    #[arg(long, value_name = "MS")]
    pub fcp: Option<f64>,

    /// Override the TTFB budget in milliseconds
    #[arg(long, value_name = "MS")]
    pub ttfb: Option<f64>,

    /// Custom Chrome/Chromium binary path
    ///
    /// Overrides auto-detection. Can also be set via CHROME_PATH env var.
    #[arg(long, value_name = "PATH", env = "CHROME_PATH")]
    pub chrome_path: Option<String>,

    /// Disable sandbox mode (required for Docker/root)
    ///
    /// WARNING: Reduces security. Only use in containerized environments.
    #[arg(long)]
    pub no_sandbox: bool,

    /// Disable the adaptive backpressure controller (always disabled in CI)
    #[arg(long)]
    pub no_backpressure: bool,

    /// Run a cheap pre-filter pass that drops redirecting URLs before
    /// the full analyzer pass
    #[arg(long)]
    pub prefilter: bool,

    /// Retries per page for transient failures (network, timeout, crash)
    #[arg(long, default_value = "2", value_name = "NUM")]
    pub max_retries: u32,

    /// TOML config file supplying defaults under the CLI flags
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Exit with code 3 if the finished run violates result invariants
    #[arg(long)]
    pub strict: bool,

    /// Verbose output (show progress and debug info)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Quiet mode (only show errors)
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

/// Accessibility standards the engine can audit against
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Standard {
    /// WCAG 2.1 Level A
    #[value(name = "wcag2a")]
    Wcag2A,
    /// WCAG 2.1 Level AA (default)
    #[value(name = "wcag2aa")]
    Wcag2Aa,
    /// WCAG 2.1 Level AAA
    #[value(name = "wcag2aaa")]
    Wcag2Aaa,
    /// Section 508 (audited as the WCAG 2.x AA rule set)
    #[value(name = "section508")]
    Section508,
}

impl Standard {
    /// The WCAG conformance level this standard audits at.
    pub fn wcag_level(&self) -> WcagLevel {
        match self {
            Standard::Wcag2A => WcagLevel::A,
            Standard::Wcag2Aa | Standard::Section508 => WcagLevel::AA,
            Standard::Wcag2Aaa => WcagLevel::AAA,
        }
    }
}

impl std::fmt::Display for Standard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Standard::Wcag2A => write!(f, "WCAG2A"),
            Standard::Wcag2Aa => write!(f, "WCAG2AA"),
            Standard::Wcag2Aaa => write!(f, "WCAG2AAA"),
            Standard::Section508 => write!(f, "Section508"),
        }
    }
}

/// Report output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Canonical machine-readable JSON
    #[value(name = "json")]
    Json,
    /// HTML report
    #[value(name = "html")]
    Html,
    /// Markdown report
    #[value(name = "markdown", alias = "md")]
    Markdown,
    /// CSV per-page summary
    #[value(name = "csv")]
    Csv,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Html => "html",
            ReportFormat::Markdown => "md",
            ReportFormat::Csv => "csv",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Json => write!(f, "json"),
            ReportFormat::Html => write!(f, "html"),
            ReportFormat::Markdown => write!(f, "markdown"),
            ReportFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Performance budget templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTemplate {
    /// Balanced budgets for a typical site
    #[value(name = "default")]
    Default,
    /// Stricter budgets for conversion-critical storefronts
    #[value(name = "ecommerce")]
    Ecommerce,
    /// Relaxed budgets for content-heavy corporate sites
    #[value(name = "corporate")]
    Corporate,
    /// Budgets tuned for article pages
    #[value(name = "blog")]
    Blog,
}

impl Args {
    /// Validate arguments; returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        let parsed = url::Url::parse(&self.sitemap)
            .map_err(|e| format!("Invalid sitemap URL '{}': {}", self.sitemap, e))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(format!(
                "Sitemap URL must be http(s), got '{}'",
                parsed.scheme()
            ));
        }

        if self.concurrency > 16 {
            return Err("Concurrency cannot exceed 16".to_string());
        }

        if self.timeout_ms < 1_000 {
            return Err("Timeout must be at least 1000 ms".to_string());
        }

        if self.formats.is_empty() {
            return Err("At least one report format is required".to_string());
        }

        if let Some(cls) = self.cls {
            if !(0.0..=5.0).contains(&cls) {
                return Err("CLS budget must be between 0 and 5".to_string());
            }
        }
        for (name, value) in [("lcp", self.lcp), ("fcp", self.fcp), ("ttfb", self.ttfb)] {
            if let Some(ms) = value {
                if ms <= 0.0 {
                    return Err(format!("{} budget must be positive", name));
                }
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use --verbose and --quiet together".to_string());
        }

        Ok(())
    }

    /// Effective worker count: explicit flag, else min(CPU, 4), capped to 2 in CI.
    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency > 0 {
            return self.concurrency;
        }
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let auto = cpus.min(4);
        if std::env::var_os("CI").is_some() {
            auto.min(2)
        } else {
            auto
        }
    }

    /// Whether the backpressure controller should run at all.
    pub fn backpressure_enabled(&self) -> bool {
        !self.no_backpressure && std::env::var_os("CI").is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("siteaudit").chain(argv.iter().copied()))
    }

    #[test]
    fn test_minimal_args() {
        let args = parse(&["https://example.com/sitemap.xml"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.standard, Standard::Wcag2Aa);
        assert_eq!(args.timeout_ms, 30_000);
        assert_eq!(args.max_retries, 2);
        assert!(!args.follow_redirects);
        assert_eq!(args.formats, vec![ReportFormat::Json, ReportFormat::Html]);
    }

    #[test]
    fn test_invalid_sitemap_url() {
        let args = parse(&["not-a-url"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let args = parse(&["ftp://example.com/sitemap.xml"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_formats_parsing() {
        let args = parse(&[
            "https://example.com/sitemap.xml",
            "--formats",
            "json,markdown,csv",
        ]);
        assert_eq!(
            args.formats,
            vec![
                ReportFormat::Json,
                ReportFormat::Markdown,
                ReportFormat::Csv
            ]
        );
    }

    #[test]
    fn test_standard_levels() {
        assert_eq!(Standard::Wcag2A.wcag_level(), WcagLevel::A);
        assert_eq!(Standard::Section508.wcag_level(), WcagLevel::AA);
        assert_eq!(Standard::Wcag2Aaa.wcag_level(), WcagLevel::AAA);
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        let args = parse(&["https://example.com/sitemap.xml", "-v", "-q"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_concurrency_cap() {
        let args = parse(&["https://example.com/sitemap.xml", "-c", "32"]);
        assert!(args.validate().is_err());
    }
}
