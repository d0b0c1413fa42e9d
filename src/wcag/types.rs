//! WCAG Types - issues, impacts, conformance levels, rule metadata

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// WCAG conformance levels a rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WcagLevel {
    /// Level A - Minimum conformance
    A,
    /// Level AA - Recommended conformance
    AA,
    /// Level AAA - Maximum conformance
    AAA,
}

impl std::fmt::Display for WcagLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WcagLevel::A => write!(f, "A"),
            WcagLevel::AA => write!(f, "AA"),
            WcagLevel::AAA => write!(f, "AAA"),
        }
    }
}

/// The conformance level a page actually achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConformanceLevel {
    #[serde(rename = "none")]
    None,
    A,
    AA,
    AAA,
}

impl std::fmt::Display for ConformanceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConformanceLevel::None => write!(f, "none"),
            ConformanceLevel::A => write!(f, "A"),
            ConformanceLevel::AA => write!(f, "AA"),
            ConformanceLevel::AAA => write!(f, "AAA"),
        }
    }
}

/// Issue severity classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Error,
    Warning,
    Notice,
}

/// How strongly an issue affects users
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Minor,
    Moderate,
    Serious,
    Critical,
}

/// A single accessibility finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// The WCAG rule that produced the issue (e.g., "1.1.1")
    pub rule_code: String,
    /// Human-readable description of the problem
    pub message: String,
    /// Error, warning, or notice
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    /// Locator for the offending element
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Short snippet of what the element exposes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_snippet: Option<String>,
    /// User impact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<Impact>,
    /// Suggested fix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Link to documentation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_url: Option<String>,
}

impl Issue {
    pub fn new(
        rule_code: impl Into<String>,
        issue_type: IssueType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_code: rule_code.into(),
            message: message.into(),
            issue_type,
            selector: None,
            context_snippet: None,
            impact: None,
            help: None,
            help_url: None,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_context(mut self, snippet: impl Into<String>) -> Self {
        self.context_snippet = Some(snippet.into());
        self
    }

    pub fn with_impact(mut self, impact: Impact) -> Self {
        self.impact = Some(impact);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_help_url(mut self, url: impl Into<String>) -> Self {
        self.help_url = Some(url.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.issue_type == IssueType::Error
    }
}

/// Metadata for a WCAG rule
#[derive(Debug, Clone)]
pub struct RuleMetadata {
    /// WCAG success criterion (e.g., "1.1.1")
    pub code: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// WCAG conformance level
    pub level: WcagLevel,
    /// Default impact for violations
    pub impact: Impact,
    /// URL to WCAG documentation
    pub help_url: &'static str,
}

/// Collapse duplicate issues, keeping the first occurrence of each
/// `(rule_code, selector, context_snippet)` triple in order.
///
/// Multiple underlying runners may report the same finding; reports must
/// show it once.
pub fn dedupe_issues(issues: Vec<Issue>) -> Vec<Issue> {
    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(issues.len());
    for issue in issues {
        let key = (
            issue.rule_code.clone(),
            issue.selector.clone(),
            issue.context_snippet.clone(),
        );
        if seen.insert(key) {
            result.push(issue);
        }
    }
    result
}
