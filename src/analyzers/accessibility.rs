//! Accessibility analyzer
//!
//! Runs the WCAG rule engine against the page's accessibility tree. When
//! the engine cannot run (tree extraction failure, dead CDP connection) a
//! DOM-level fallback pass produces a degraded but scored section.

use chromiumoxide::Page;
use tracing::{debug, warn};

use super::{AnalyzerContext, AnalyzerError, AnalyzerKind};
use crate::accessibility::extract_ax_tree;
use crate::audit::result::AccessibilitySection;
use crate::wcag::{self, ConformanceLevel, Impact, Issue, IssueType};

pub async fn analyze(
    page: &Page,
    url: &str,
    ctx: &AnalyzerContext,
) -> Result<AccessibilitySection, AnalyzerError> {
    match run_engine(page, ctx).await {
        Ok(section) => Ok(section),
        Err(engine_err) => {
            warn!(
                "WCAG engine failed for {} ({}), using DOM fallback",
                url, engine_err
            );
            fallback(page).await.map_err(|fallback_err| {
                AnalyzerError::new(
                    AnalyzerKind::Accessibility,
                    format!("engine: {}; fallback: {}", engine_err, fallback_err),
                )
            })
        }
    }
}

async fn run_engine(
    page: &Page,
    ctx: &AnalyzerContext,
) -> crate::error::Result<AccessibilitySection> {
    let tree = extract_ax_tree(page).await?;
    if tree.is_empty() {
        return Err(crate::error::AuditError::CdpError(
            "accessibility tree is empty".to_string(),
        ));
    }

    let results = wcag::check_all(&tree, ctx.wcag_level);
    let score = score_issues(&results.issues);
    debug!(
        "Accessibility: {} issues, score {}, conformance {}",
        results.issues.len(),
        score,
        results.achieved
    );

    Ok(AccessibilitySection::from_issues(
        score,
        results.achieved,
        results.issues,
    ))
}

/// Score from engine issues: flat deductions per error and warning, plus
/// heavier penalties for the rules that block users outright.
fn score_issues(issues: &[Issue]) -> u32 {
    let errors = issues.iter().filter(|i| i.is_error()).count();
    let warnings = issues
        .iter()
        .filter(|i| i.issue_type == IssueType::Warning)
        .count();

    let mut score = 100.0_f32;
    score -= errors as f32 * 2.5;
    score -= warnings as f32 * 1.0;

    let has_rule = |code: &str| issues.iter().any(|i| i.rule_code == code);
    if has_rule("1.1.1") {
        score -= 3.0;
    }
    if has_rule("4.1.2") {
        score -= 5.0;
    }
    if has_rule("2.4.6") {
        score -= 20.0;
    }
    if has_rule("3.1.1") {
        score -= 10.0;
    }

    score.clamp(0.0, 100.0).round() as u32
}

/// DOM-level fallback: counts the page's worst offenders with one
/// JavaScript pass and applies the degraded scoring formula.
async fn fallback(page: &Page) -> crate::error::Result<AccessibilitySection> {
    let js = r#"
    (() => {
        const imgs = Array.from(document.querySelectorAll('img'));
        const buttons = Array.from(document.querySelectorAll('button, [role="button"]'));
        const unlabeled = buttons.filter(b =>
            !(b.textContent || '').trim() &&
            !b.getAttribute('aria-label') &&
            !b.getAttribute('aria-labelledby') &&
            !b.getAttribute('title')).length;
        return JSON.stringify({
            imagesWithoutAlt: imgs.filter(i => !i.hasAttribute('alt')).length,
            unlabeledButtons: unlabeled,
            headings: document.querySelectorAll('h1,h2,h3,h4,h5,h6').length,
            hasTitle: !!document.title && document.title.trim().length > 0,
            hasLang: !!document.documentElement.getAttribute('lang'),
        });
    })()
    "#;

    let result = page
        .evaluate(js)
        .await
        .map_err(|e| crate::error::AuditError::CdpError(e.to_string()))?;
    let json_str = result.value().and_then(|v| v.as_str()).unwrap_or("{}");
    let parsed: serde_json::Value = serde_json::from_str(json_str)?;

    let images_without_alt = parsed["imagesWithoutAlt"].as_u64().unwrap_or(0) as u32;
    let unlabeled_buttons = parsed["unlabeledButtons"].as_u64().unwrap_or(0) as u32;
    let headings = parsed["headings"].as_u64().unwrap_or(0) as u32;
    let has_title = parsed["hasTitle"].as_bool().unwrap_or(false);
    let has_lang = parsed["hasLang"].as_bool().unwrap_or(false);

    let mut issues = Vec::new();
    if !has_title {
        issues.push(
            Issue::new("2.4.2", IssueType::Error, "Page has no title")
                .with_selector("document".to_string())
                .with_impact(Impact::Serious),
        );
    }
    if !has_lang {
        issues.push(
            Issue::new("3.1.1", IssueType::Warning, "Document language not declared")
                .with_selector("html".to_string())
                .with_impact(Impact::Moderate),
        );
    }
    if images_without_alt > 0 {
        issues.push(
            Issue::new(
                "1.1.1",
                IssueType::Error,
                format!("{} images without alt attribute", images_without_alt),
            )
            .with_selector("img".to_string())
            .with_impact(Impact::Serious),
        );
    }
    if unlabeled_buttons > 0 {
        issues.push(
            Issue::new(
                "4.1.2",
                IssueType::Error,
                format!("{} buttons without accessible name", unlabeled_buttons),
            )
            .with_selector("button".to_string())
            .with_impact(Impact::Critical),
        );
    }
    if headings == 0 {
        issues.push(
            Issue::new("2.4.6", IssueType::Error, "Page has no headings")
                .with_selector("document".to_string())
                .with_impact(Impact::Serious),
        );
    }

    let score = fallback_score(
        if has_title { 0 } else { 1 },
        if has_lang { 0 } else { 1 },
        images_without_alt,
        unlabeled_buttons,
        headings == 0,
    );

    Ok(AccessibilitySection::from_issues(
        score,
        ConformanceLevel::None,
        issues,
    ))
}

/// Degraded scoring: 100, minus 15 per error, 5 per warning, 3 per image
/// without alt, 5 per unlabeled button, 20 when the page has no headings.
fn fallback_score(
    errors: u32,
    warnings: u32,
    images_without_alt: u32,
    unlabeled_buttons: u32,
    no_headings: bool,
) -> u32 {
    let mut score = 100i64;
    score -= errors as i64 * 15;
    score -= warnings as i64 * 5;
    score -= images_without_alt as i64 * 3;
    score -= unlabeled_buttons as i64 * 5;
    if no_headings {
        score -= 20;
    }
    score.clamp(0, 100) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(rule: &str) -> Issue {
        Issue::new(rule, IssueType::Error, "e")
    }

    fn warning(rule: &str) -> Issue {
        Issue::new(rule, IssueType::Warning, "w")
    }

    #[test]
    fn test_score_clean_page() {
        assert_eq!(score_issues(&[]), 100);
    }

    #[test]
    fn test_score_with_alt_errors() {
        // 2 errors x 2.5 + rule penalty 3 = 8 off
        let issues = vec![error("1.1.1"), error("1.1.1")];
        assert_eq!(score_issues(&issues), 92);
    }

    #[test]
    fn test_score_missing_headings_penalty() {
        // 1 error x 2.5 + 20 = 22.5 off, rounded
        let issues = vec![error("2.4.6")];
        assert_eq!(score_issues(&issues), 78);
    }

    #[test]
    fn test_score_warnings_only() {
        let issues = vec![warning("2.4.4"), warning("2.4.1")];
        assert_eq!(score_issues(&issues), 98);
    }

    #[test]
    fn test_score_floor() {
        let issues: Vec<Issue> = (0..100).map(|_| error("4.1.2")).collect();
        assert_eq!(score_issues(&issues), 0);
    }

    #[test]
    fn test_fallback_score_formula() {
        // 100 - 15 - 5 - 3*2 - 5*1 - 20 = 49
        assert_eq!(fallback_score(1, 1, 2, 1, true), 49);
        assert_eq!(fallback_score(0, 0, 0, 0, false), 100);
        assert_eq!(fallback_score(10, 10, 10, 10, true), 0);
    }
}
