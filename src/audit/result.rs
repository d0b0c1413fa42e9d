//! Strict page result shape and the factory that enforces it
//!
//! Every audited URL produces exactly one `PageResult` whose analyzer
//! sections are always populated: analyzers that failed (or were disabled)
//! get a synthesized, schema-complete failure section. Reports consume
//! this shape and nothing else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzers::AnalyzerError;
use crate::redirect::RedirectDecision;
use crate::wcag::{ConformanceLevel, Issue, IssueType};

/// Terminal status of one audited URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    /// Analyzed, no accessibility errors
    Passed,
    /// Analyzed, at least one accessibility error
    Failed,
    /// Navigation or analysis never completed
    Crashed,
    /// Redirected away; not analyzed
    Skipped,
}

impl std::fmt::Display for PageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageStatus::Passed => write!(f, "passed"),
            PageStatus::Failed => write!(f, "failed"),
            PageStatus::Crashed => write!(f, "crashed"),
            PageStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Letter grade derived deterministically from a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// The one grade derivation: A≥90, B≥75, C≥60, D≥50, else F.
    pub fn from_score(score: u32) -> Self {
        match score {
            90..=u32::MAX => Grade::A,
            75..=89 => Grade::B,
            60..=74 => Grade::C,
            50..=59 => Grade::D,
            _ => Grade::F,
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grade::A => write!(f, "A"),
            Grade::B => write!(f, "B"),
            Grade::C => write!(f, "C"),
            Grade::D => write!(f, "D"),
            Grade::F => write!(f, "F"),
        }
    }
}

/// Accessibility section of a page result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessibilitySection {
    pub score: u32,
    pub wcag_level: ConformanceLevel,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    pub notices: Vec<Issue>,
}

impl AccessibilitySection {
    /// Partition deduplicated issues into the three slots, preserving order.
    pub fn from_issues(score: u32, wcag_level: ConformanceLevel, issues: Vec<Issue>) -> Self {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut notices = Vec::new();
        for issue in issues {
            match issue.issue_type {
                IssueType::Error => errors.push(issue),
                IssueType::Warning => warnings.push(issue),
                IssueType::Notice => notices.push(issue),
            }
        }
        Self {
            score,
            wcag_level,
            errors,
            warnings,
            notices,
        }
    }

    pub fn failure(reason: &str) -> Self {
        Self {
            score: 0,
            wcag_level: ConformanceLevel::None,
            errors: vec![Issue::new("analyzer", IssueType::Error, reason)],
            warnings: Vec::new(),
            notices: Vec::new(),
        }
    }
}

/// Core Web Vitals metrics, all non-negative
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreWebVitals {
    pub lcp_ms: f64,
    pub fcp_ms: f64,
    pub cls: f64,
    pub ttfb_ms: f64,
    pub dom_content_loaded_ms: f64,
    pub load_complete_ms: f64,
    pub first_paint_ms: f64,
}

/// Performance section of a page result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSection {
    pub score: u32,
    pub grade: Grade,
    pub core_web_vitals: CoreWebVitals,
    pub issues: Vec<String>,
}

impl PerformanceSection {
    pub fn failure(reason: &str) -> Self {
        Self {
            score: 0,
            grade: Grade::F,
            core_web_vitals: CoreWebVitals::default(),
            issues: vec![reason.to_string()],
        }
    }
}

/// Extracted SEO metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeoMeta {
    pub title: Option<String>,
    pub title_length: usize,
    pub description: Option<String>,
    pub description_length: usize,
    pub keywords: Vec<String>,
    pub h1_count: u32,
    pub h2_count: u32,
    pub h3_count: u32,
    pub image_count: u32,
    pub images_missing_alt: u32,
    pub images_empty_alt: u32,
}

/// SEO section of a page result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeoSection {
    pub score: u32,
    pub grade: Grade,
    pub meta: SeoMeta,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

impl SeoSection {
    pub fn failure(reason: &str) -> Self {
        Self {
            score: 0,
            grade: Grade::F,
            meta: SeoMeta::default(),
            issues: vec![reason.to_string()],
            recommendations: Vec::new(),
        }
    }
}

/// Size and count for one resource category
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResourceStat {
    pub size: u64,
    pub files: u32,
}

/// Transferred bytes by resource category
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceBreakdown {
    pub total_size: u64,
    pub html: ResourceStat,
    pub css: ResourceStat,
    pub javascript: ResourceStat,
    pub images: ResourceStat,
    pub other: ResourceStat,
}

/// Content weight section of a page result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentWeightSection {
    pub score: u32,
    pub grade: Grade,
    pub resources: ResourceBreakdown,
    pub optimizations: Vec<String>,
    pub compression_ratio: f64,
    pub text_ratio: f64,
}

impl ContentWeightSection {
    pub fn failure(reason: &str) -> Self {
        Self {
            score: 0,
            grade: Grade::F,
            resources: ResourceBreakdown::default(),
            optimizations: vec![reason.to_string()],
            compression_ratio: 0.0,
            text_ratio: 0.0,
        }
    }
}

/// Mobile recommendation categories (fixed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobileCategory {
    Viewport,
    TouchTargets,
    Typography,
    Content,
    Images,
}

/// Recommendation priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// One mobile-friendliness recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobileRecommendation {
    pub category: MobileCategory,
    pub priority: Priority,
    pub issue: String,
    pub recommendation: String,
    pub impact: String,
}

/// Mobile section of a page result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobileSection {
    pub overall_score: u32,
    pub grade: Grade,
    pub recommendations: Vec<MobileRecommendation>,
}

impl MobileSection {
    pub fn failure(reason: &str) -> Self {
        Self {
            overall_score: 0,
            grade: Grade::F,
            recommendations: vec![MobileRecommendation {
                category: MobileCategory::Content,
                priority: Priority::Critical,
                issue: reason.to_string(),
                recommendation: "Re-run the audit".to_string(),
                impact: "Mobile data unavailable".to_string(),
            }],
        }
    }
}

/// Security headers section (comprehensive mode)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySection {
    pub score: u32,
    pub grade: Grade,
    pub headers_present: Vec<String>,
    pub issues: Vec<String>,
}

impl SecuritySection {
    pub fn failure(reason: &str) -> Self {
        Self {
            score: 0,
            grade: Grade::F,
            headers_present: Vec::new(),
            issues: vec![reason.to_string()],
        }
    }
}

/// Structured data section (comprehensive mode)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredDataSection {
    pub json_ld_count: u32,
    pub microdata_count: u32,
    pub types: Vec<String>,
}

/// The strict, reportable record for one URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    pub url: String,
    pub title: String,
    pub status: PageStatus,
    pub duration_ms: u64,
    pub tested_at: DateTime<Utc>,
    pub overall_score: u32,
    pub overall_grade: Grade,
    pub accessibility: AccessibilitySection,
    pub performance: PerformanceSection,
    pub seo: SeoSection,
    pub content_weight: ContentWeightSection,
    pub mobile: MobileSection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SecuritySection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<StructuredDataSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<RedirectDecision>,
}

impl PageResult {
    pub fn error_count(&self) -> usize {
        self.accessibility.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.accessibility.warnings.len()
    }

    /// Check the invariants the engine guarantees on every result.
    pub fn validate(&self) -> Result<(), String> {
        for (name, score, grade) in [
            ("accessibility", self.accessibility.score, None),
            ("performance", self.performance.score, Some(self.performance.grade)),
            ("seo", self.seo.score, Some(self.seo.grade)),
            (
                "content_weight",
                self.content_weight.score,
                Some(self.content_weight.grade),
            ),
            ("mobile", self.mobile.overall_score, Some(self.mobile.grade)),
            ("overall", self.overall_score, Some(self.overall_grade)),
        ] {
            if score > 100 {
                return Err(format!("{} score {} out of range", name, score));
            }
            if let Some(grade) = grade {
                if grade != Grade::from_score(score) {
                    return Err(format!(
                        "{} grade {} does not derive from score {}",
                        name, grade, score
                    ));
                }
            }
        }

        let v = &self.performance.core_web_vitals;
        for (name, value) in [
            ("lcp_ms", v.lcp_ms),
            ("fcp_ms", v.fcp_ms),
            ("cls", v.cls),
            ("ttfb_ms", v.ttfb_ms),
            ("dom_content_loaded_ms", v.dom_content_loaded_ms),
            ("load_complete_ms", v.load_complete_ms),
            ("first_paint_ms", v.first_paint_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("core web vital {} is {}", name, value));
            }
        }

        if self.status == PageStatus::Failed && self.accessibility.errors.is_empty() {
            return Err("status is failed but no accessibility errors present".to_string());
        }
        if self.status == PageStatus::Skipped && self.redirect.is_none() {
            return Err("status is skipped but no redirect metadata attached".to_string());
        }

        Ok(())
    }
}

/// Per-analyzer outcomes handed over by the orchestrator.
///
/// `None` means the analyzer was not enabled for this run.
#[derive(Debug, Default)]
pub struct PageAnalyses {
    pub title: String,
    pub accessibility: Option<Result<AccessibilitySection, AnalyzerError>>,
    pub performance: Option<Result<PerformanceSection, AnalyzerError>>,
    pub seo: Option<Result<SeoSection, AnalyzerError>>,
    pub content_weight: Option<Result<ContentWeightSection, AnalyzerError>>,
    pub mobile: Option<Result<MobileSection, AnalyzerError>>,
    pub security: Option<Result<SecuritySection, AnalyzerError>>,
    pub structured_data: Option<Result<StructuredDataSection, AnalyzerError>>,
}

/// Builds validated `PageResult`s out of raw analysis outcomes.
pub struct ResultFactory;

impl ResultFactory {
    /// Normalize a completed analysis into the strict shape.
    pub fn from_analyses(
        url: &str,
        duration_ms: u64,
        analyses: PageAnalyses,
        redirect: Option<RedirectDecision>,
    ) -> PageResult {
        let mut enabled_scores: Vec<u32> = Vec::new();

        let accessibility = match analyses.accessibility {
            Some(Ok(section)) => {
                enabled_scores.push(section.score);
                section
            }
            Some(Err(e)) => AccessibilitySection::failure(&e.to_string()),
            None => AccessibilitySection::failure("accessibility analyzer disabled"),
        };
        let performance = match analyses.performance {
            Some(Ok(section)) => {
                enabled_scores.push(section.score);
                section
            }
            Some(Err(e)) => PerformanceSection::failure(&e.to_string()),
            None => PerformanceSection::failure("performance analyzer disabled"),
        };
        let seo = match analyses.seo {
            Some(Ok(section)) => {
                enabled_scores.push(section.score);
                section
            }
            Some(Err(e)) => SeoSection::failure(&e.to_string()),
            None => SeoSection::failure("seo analyzer disabled"),
        };
        let content_weight = match analyses.content_weight {
            Some(Ok(section)) => {
                enabled_scores.push(section.score);
                section
            }
            Some(Err(e)) => ContentWeightSection::failure(&e.to_string()),
            None => ContentWeightSection::failure("content weight analyzer disabled"),
        };
        let mobile = match analyses.mobile {
            Some(Ok(section)) => {
                enabled_scores.push(section.overall_score);
                section
            }
            Some(Err(e)) => MobileSection::failure(&e.to_string()),
            None => MobileSection::failure("mobile analyzer disabled"),
        };
        let security = analyses.security.map(|outcome| match outcome {
            Ok(section) => section,
            Err(e) => SecuritySection::failure(&e.to_string()),
        });
        let structured_data = analyses.structured_data.map(|outcome| match outcome {
            Ok(section) => section,
            Err(_) => StructuredDataSection::default(),
        });

        let status = if accessibility.errors.iter().any(|i| i.is_error()) {
            PageStatus::Failed
        } else {
            PageStatus::Passed
        };

        let overall_score = if enabled_scores.is_empty() {
            0
        } else {
            enabled_scores.iter().sum::<u32>() / enabled_scores.len() as u32
        };

        PageResult {
            url: url.to_string(),
            title: analyses.title,
            status,
            duration_ms,
            tested_at: Utc::now(),
            overall_score,
            overall_grade: Grade::from_score(overall_score),
            accessibility,
            performance,
            seo,
            content_weight,
            mobile,
            security,
            structured_data,
            redirect,
        }
    }

    /// A result for a URL that was skipped by the redirect policy. No
    /// analyzer ran; every section is a synthesized failure slot and the
    /// redirect metadata travels in its own field.
    pub fn skipped(url: &str, duration_ms: u64, redirect: RedirectDecision) -> PageResult {
        let reason = "page skipped before analysis (redirect)";
        PageResult {
            url: url.to_string(),
            title: String::new(),
            status: PageStatus::Skipped,
            duration_ms,
            tested_at: Utc::now(),
            overall_score: 0,
            overall_grade: Grade::F,
            accessibility: AccessibilitySection {
                errors: Vec::new(),
                ..AccessibilitySection::failure(reason)
            },
            performance: PerformanceSection::failure(reason),
            seo: SeoSection::failure(reason),
            content_weight: ContentWeightSection::failure(reason),
            mobile: MobileSection::failure(reason),
            security: None,
            structured_data: None,
            redirect: Some(redirect),
        }
    }

    /// A marker result for a pre-filter probe that found no redirect. The
    /// pipeline discards these after deciding which URLs go on to the full
    /// analyzer pass.
    pub fn probe_passed(url: &str, duration_ms: u64) -> PageResult {
        let reason = "pre-filter probe (no analyzers run)";
        PageResult {
            url: url.to_string(),
            title: String::new(),
            status: PageStatus::Passed,
            duration_ms,
            tested_at: Utc::now(),
            overall_score: 0,
            overall_grade: Grade::F,
            accessibility: AccessibilitySection {
                errors: Vec::new(),
                ..AccessibilitySection::failure(reason)
            },
            performance: PerformanceSection::failure(reason),
            seo: SeoSection::failure(reason),
            content_weight: ContentWeightSection::failure(reason),
            mobile: MobileSection::failure(reason),
            security: None,
            structured_data: None,
            redirect: None,
        }
    }

    /// A result for a URL whose navigation or analysis never completed.
    pub fn crashed(url: &str, duration_ms: u64, reason: &str) -> PageResult {
        PageResult {
            url: url.to_string(),
            title: String::new(),
            status: PageStatus::Crashed,
            duration_ms,
            tested_at: Utc::now(),
            overall_score: 0,
            overall_grade: Grade::F,
            accessibility: AccessibilitySection::failure(reason),
            performance: PerformanceSection::failure(reason),
            seo: SeoSection::failure(reason),
            content_weight: ContentWeightSection::failure(reason),
            mobile: MobileSection::failure(reason),
            security: None,
            structured_data: None,
            redirect: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redirect::RedirectClassification;

    #[test]
    fn test_grade_derivation() {
        assert_eq!(Grade::from_score(100), Grade::A);
        assert_eq!(Grade::from_score(90), Grade::A);
        assert_eq!(Grade::from_score(89), Grade::B);
        assert_eq!(Grade::from_score(75), Grade::B);
        assert_eq!(Grade::from_score(74), Grade::C);
        assert_eq!(Grade::from_score(60), Grade::C);
        assert_eq!(Grade::from_score(59), Grade::D);
        assert_eq!(Grade::from_score(50), Grade::D);
        assert_eq!(Grade::from_score(49), Grade::F);
        assert_eq!(Grade::from_score(0), Grade::F);
    }

    #[test]
    fn test_crashed_result_is_shape_complete_and_valid() {
        let result = ResultFactory::crashed("https://example.com/", 1200, "navigation timed out");
        assert_eq!(result.status, PageStatus::Crashed);
        assert_eq!(result.accessibility.score, 0);
        assert_eq!(result.performance.grade, Grade::F);
        assert!(!result.accessibility.errors.is_empty());
        assert!(result.validate().is_ok());
    }

    #[test]
    fn test_skipped_result_carries_redirect_metadata() {
        let redirect = RedirectDecision {
            original_url: "http://example.com".to_string(),
            final_url: "https://example.com/landing".to_string(),
            classification: RedirectClassification::HttpRedirect,
            status_chain: vec![301, 200],
            follow: false,
        };
        let result = ResultFactory::skipped("http://example.com", 300, redirect);
        assert_eq!(result.status, PageStatus::Skipped);
        let redirect = result.redirect.as_ref().unwrap();
        assert_eq!(redirect.status_chain, vec![301, 200]);
        // Redirects are metadata, not accessibility errors.
        assert!(result.accessibility.errors.is_empty());
        assert!(result.validate().is_ok());
    }

    #[test]
    fn test_failed_status_from_accessibility_errors() {
        let analyses = PageAnalyses {
            title: "T".to_string(),
            accessibility: Some(Ok(AccessibilitySection::from_issues(
                70,
                ConformanceLevel::None,
                vec![Issue::new("1.1.1", IssueType::Error, "missing alt")],
            ))),
            ..Default::default()
        };
        let result = ResultFactory::from_analyses("https://example.com/", 100, analyses, None);
        assert_eq!(result.status, PageStatus::Failed);
        assert!(result.validate().is_ok());
    }

    #[test]
    fn test_disabled_analyzers_still_populate_sections() {
        let analyses = PageAnalyses {
            title: "T".to_string(),
            accessibility: Some(Ok(AccessibilitySection::from_issues(
                100,
                ConformanceLevel::AA,
                vec![],
            ))),
            ..Default::default()
        };
        let result = ResultFactory::from_analyses("https://example.com/", 100, analyses, None);
        assert_eq!(result.status, PageStatus::Passed);
        assert_eq!(result.performance.score, 0);
        assert_eq!(result.seo.grade, Grade::F);
        assert_eq!(result.overall_score, 100);
        assert!(result.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_mismatched_grade() {
        let mut result = ResultFactory::crashed("https://example.com/", 1, "x");
        result.performance.score = 95;
        assert!(result.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let result = ResultFactory::crashed("https://example.com/", 5, "boom");
        let json = serde_json::to_string(&result).unwrap();
        let back: PageResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.url, result.url);
        assert_eq!(back.status, result.status);
        assert_eq!(back.accessibility.errors.len(), result.accessibility.errors.len());
    }
}
