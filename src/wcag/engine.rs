//! WCAG Rule Engine - runs the rule set for a conformance level
//!
//! Rules run in a fixed order so that issue output is deterministic;
//! duplicates across rules are collapsed before the results leave the
//! engine.

use tracing::debug;

use super::rules;
use super::types::{dedupe_issues, ConformanceLevel, Issue, WcagLevel};
use crate::accessibility::AxTree;

/// Results of one engine run
#[derive(Debug, Clone)]
pub struct EngineResults {
    /// Deduplicated issues in first-occurrence order
    pub issues: Vec<Issue>,
    /// Conformance level the page achieved, bounded by the audited level
    pub achieved: ConformanceLevel,
    /// Total nodes in the inspected tree
    pub nodes_checked: usize,
}

/// Run all rules up to the requested conformance level.
pub fn check_all(tree: &AxTree, level: WcagLevel) -> EngineResults {
    let mut issues = Vec::new();
    let mut a_errors = 0usize;
    let mut aa_errors = 0usize;
    let mut aaa_errors = 0usize;

    let mut run = |rule_issues: Vec<Issue>, rule_level: WcagLevel| {
        let errors = rule_issues.iter().filter(|i| i.is_error()).count();
        match rule_level {
            WcagLevel::A => a_errors += errors,
            WcagLevel::AA => aa_errors += errors,
            WcagLevel::AAA => aaa_errors += errors,
        }
        issues.extend(rule_issues);
    };

    // Level A
    run(rules::check_text_alternatives(tree), WcagLevel::A);
    run(rules::check_control_labels(tree), WcagLevel::A);
    run(rules::check_page_title(tree), WcagLevel::A);
    run(rules::check_link_purpose(tree), WcagLevel::A);
    run(rules::check_bypass_blocks(tree), WcagLevel::A);
    run(rules::check_language(tree), WcagLevel::A);

    // Level AA
    if level >= WcagLevel::AA {
        run(rules::check_headings(tree), WcagLevel::AA);
    }

    // Level AAA
    if level >= WcagLevel::AAA {
        run(rules::check_section_headings(tree), WcagLevel::AAA);
    }

    let issues = dedupe_issues(issues);
    let achieved = achieved_level(level, a_errors, aa_errors, aaa_errors);

    debug!(
        "WCAG check at level {}: {} issues, achieved {}",
        level,
        issues.len(),
        achieved
    );

    EngineResults {
        issues,
        achieved,
        nodes_checked: tree.len(),
    }
}

/// The achieved level is the highest audited level with no errors at or
/// below it.
fn achieved_level(
    audited: WcagLevel,
    a_errors: usize,
    aa_errors: usize,
    aaa_errors: usize,
) -> ConformanceLevel {
    if a_errors > 0 {
        return ConformanceLevel::None;
    }
    if audited == WcagLevel::A {
        return ConformanceLevel::A;
    }
    if aa_errors > 0 {
        return ConformanceLevel::A;
    }
    if audited == WcagLevel::AA {
        return ConformanceLevel::AA;
    }
    if aaa_errors > 0 {
        return ConformanceLevel::AA;
    }
    ConformanceLevel::AAA
}
