//! Page analyzers
//!
//! Each analyzer extracts one concern from a loaded page behind the same
//! contract: it gets the page handle and URL, runs under its own deadline,
//! and returns either its section of the page result or an
//! [`AnalyzerError`]. Analyzers are fully independent; none reads another's
//! output, and a failure never propagates past its own section.

pub mod accessibility;
pub mod content_weight;
pub mod mobile;
pub mod security;
pub mod seo;
pub mod structured_data;
pub mod vitals;

use serde::{Deserialize, Serialize};

pub use vitals::PerformanceBudgets;

use crate::wcag::WcagLevel;

/// The closed set of analyzers.
///
/// Declaration order is the deterministic execution order within a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    Accessibility,
    Performance,
    Seo,
    ContentWeight,
    Mobile,
    SecurityHeaders,
    StructuredData,
}

impl AnalyzerKind {
    /// All analyzers in execution order.
    pub fn all() -> [AnalyzerKind; 7] {
        [
            AnalyzerKind::Accessibility,
            AnalyzerKind::Performance,
            AnalyzerKind::Seo,
            AnalyzerKind::ContentWeight,
            AnalyzerKind::Mobile,
            AnalyzerKind::SecurityHeaders,
            AnalyzerKind::StructuredData,
        ]
    }
}

impl std::fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyzerKind::Accessibility => write!(f, "accessibility"),
            AnalyzerKind::Performance => write!(f, "performance"),
            AnalyzerKind::Seo => write!(f, "seo"),
            AnalyzerKind::ContentWeight => write!(f, "content_weight"),
            AnalyzerKind::Mobile => write!(f, "mobile"),
            AnalyzerKind::SecurityHeaders => write!(f, "security_headers"),
            AnalyzerKind::StructuredData => write!(f, "structured_data"),
        }
    }
}

/// An analyzer failure. Recorded in the page result as a synthesized
/// section; never fails the page.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{analyzer} analyzer failed: {reason}")]
pub struct AnalyzerError {
    pub analyzer: AnalyzerKind,
    pub reason: String,
    pub timed_out: bool,
}

impl AnalyzerError {
    pub fn new(analyzer: AnalyzerKind, reason: impl Into<String>) -> Self {
        Self {
            analyzer,
            reason: reason.into(),
            timed_out: false,
        }
    }

    pub fn timeout(analyzer: AnalyzerKind, timeout_ms: u64) -> Self {
        Self {
            analyzer,
            reason: format!("timed out after {} ms", timeout_ms),
            timed_out: true,
        }
    }
}

/// Shared, read-only inputs every analyzer receives.
#[derive(Debug, Clone)]
pub struct AnalyzerContext {
    /// Conformance level the accessibility engine audits at
    pub wcag_level: WcagLevel,
    /// Budgets the performance score is checked against
    pub budgets: PerformanceBudgets,
}

impl Default for AnalyzerContext {
    fn default() -> Self {
        Self {
            wcag_level: WcagLevel::AA,
            budgets: PerformanceBudgets::default(),
        }
    }
}
