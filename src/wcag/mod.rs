//! WCAG rule engine
//!
//! Checks the accessibility tree of a loaded page against WCAG 2.1 rules
//! and produces reportable issues.

pub mod engine;
pub mod rules;
pub mod types;

pub use engine::{check_all, EngineResults};
pub use types::{
    dedupe_issues, ConformanceLevel, Impact, Issue, IssueType, RuleMetadata, WcagLevel,
};
