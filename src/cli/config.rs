//! Optional TOML config file
//!
//! Supplies defaults that sit under the CLI flags: a flag explicitly set on
//! the command line always wins; config values only replace built-in
//! defaults.

use std::path::Path;

use serde::Deserialize;

use super::args::{Args, BudgetTemplate, ReportFormat, Standard};
use crate::error::{AuditError, Result};

/// Config file schema.
///
/// ```toml
/// concurrency = 4
/// timeout-ms = 45000
/// formats = ["json", "csv"]
/// standard = "WCAG2AAA"
///
/// [budget]
/// template = "ecommerce"
/// lcp = 2200
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub max_pages: Option<usize>,
    pub concurrency: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub standard: Option<Standard>,
    pub output_dir: Option<std::path::PathBuf>,
    pub formats: Option<Vec<ReportFormat>>,
    pub max_retries: Option<u32>,
    pub chrome_path: Option<String>,
    #[serde(default)]
    pub budget: BudgetConfig,
}

/// Budget section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BudgetConfig {
    pub template: Option<BudgetTemplate>,
    pub lcp: Option<f64>,
    pub cls: Option<f64>,
    pub fcp: Option<f64>,
    pub ttfb: Option<f64>,
}

impl FileConfig {
    /// Load and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AuditError::FileError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content)
            .map_err(|e| AuditError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Fill config values into args wherever the user left the built-in
    /// default in place.
    pub fn apply(&self, args: &mut Args) {
        if args.max_pages == 0 {
            if let Some(v) = self.max_pages {
                args.max_pages = v;
            }
        }
        if args.concurrency == 0 {
            if let Some(v) = self.concurrency {
                args.concurrency = v;
            }
        }
        if args.timeout_ms == 30_000 {
            if let Some(v) = self.timeout_ms {
                args.timeout_ms = v;
            }
        }
        if args.standard == Standard::Wcag2Aa {
            if let Some(v) = self.standard {
                args.standard = v;
            }
        }
        if args.output_dir == std::path::Path::new("reports") {
            if let Some(ref v) = self.output_dir {
                args.output_dir = v.clone();
            }
        }
        if args.formats == [ReportFormat::Json, ReportFormat::Html] {
            if let Some(ref v) = self.formats {
                args.formats = v.clone();
            }
        }
        if args.max_retries == 2 {
            if let Some(v) = self.max_retries {
                args.max_retries = v;
            }
        }
        if args.chrome_path.is_none() {
            args.chrome_path = self.chrome_path.clone();
        }
        if args.budget == BudgetTemplate::Default {
            if let Some(v) = self.budget.template {
                args.budget = v;
            }
        }
        args.lcp = args.lcp.or(self.budget.lcp);
        args.cls = args.cls.or(self.budget.cls);
        args.fcp = args.fcp.or(self.budget.fcp);
        args.ttfb = args.ttfb.or(self.budget.ttfb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            concurrency = 6
            timeout-ms = 45000
            formats = ["json", "csv"]
            standard = "WCAG2AAA"

            [budget]
            template = "ecommerce"
            lcp = 2200.0
        "#;
        let config: FileConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.concurrency, Some(6));
        assert_eq!(config.timeout_ms, Some(45_000));
        assert_eq!(config.standard, Some(Standard::Wcag2Aaa));
        assert_eq!(config.budget.template, Some(BudgetTemplate::Ecommerce));
        assert_eq!(config.budget.lcp, Some(2200.0));
    }

    #[test]
    fn test_cli_flag_wins_over_config() {
        let mut args =
            Args::parse_from(["siteaudit", "https://example.com/sitemap.xml", "-c", "2"]);
        let config = FileConfig {
            concurrency: Some(8),
            ..Default::default()
        };
        config.apply(&mut args);
        assert_eq!(args.concurrency, 2);
    }

    #[test]
    fn test_config_fills_default() {
        let mut args = Args::parse_from(["siteaudit", "https://example.com/sitemap.xml"]);
        let config = FileConfig {
            concurrency: Some(8),
            budget: BudgetConfig {
                lcp: Some(2000.0),
                ..Default::default()
            },
            ..Default::default()
        };
        config.apply(&mut args);
        assert_eq!(args.concurrency, 8);
        assert_eq!(args.lcp, Some(2000.0));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = "bogus = 1";
        assert!(toml::from_str::<FileConfig>(toml).is_err());
    }
}
