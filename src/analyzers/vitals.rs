//! Core Web Vitals analyzer
//!
//! Collects LCP, FCP, CLS, TTFB and navigation timings with a layered
//! strategy: CDP performance metrics first, then a PerformanceObserver
//! pass, then plain Navigation Timing. The first strategy whose metrics
//! clear the quality gate wins; missing metrics are derived afterwards
//! (LCP ≈ 1.2·FCP). The score checks each metric against the selected
//! budget, weighted FCP 35%, LCP 25%, CLS 25%, TTFB 15%.

use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::performance::GetMetricsParams;
use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AnalyzerContext, AnalyzerError, AnalyzerKind};
use crate::audit::result::{CoreWebVitals, Grade, PerformanceSection};
use crate::cli::BudgetTemplate;
use crate::error::AuditError;

/// Quality a collection strategy must reach to be accepted.
const QUALITY_THRESHOLD: f64 = 0.4;

/// Bounded wait per collection strategy.
const STRATEGY_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-metric budgets the performance score is checked against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceBudgets {
    pub lcp_ms: f64,
    pub fcp_ms: f64,
    pub cls: f64,
    pub ttfb_ms: f64,
}

impl Default for PerformanceBudgets {
    fn default() -> Self {
        Self::from_template(BudgetTemplate::Default)
    }
}

impl PerformanceBudgets {
    pub fn from_template(template: BudgetTemplate) -> Self {
        match template {
            BudgetTemplate::Default => Self {
                lcp_ms: 2500.0,
                fcp_ms: 1800.0,
                cls: 0.1,
                ttfb_ms: 800.0,
            },
            BudgetTemplate::Ecommerce => Self {
                lcp_ms: 2000.0,
                fcp_ms: 1500.0,
                cls: 0.05,
                ttfb_ms: 600.0,
            },
            BudgetTemplate::Corporate => Self {
                lcp_ms: 3000.0,
                fcp_ms: 2000.0,
                cls: 0.1,
                ttfb_ms: 1000.0,
            },
            BudgetTemplate::Blog => Self {
                lcp_ms: 2800.0,
                fcp_ms: 2000.0,
                cls: 0.15,
                ttfb_ms: 900.0,
            },
        }
    }

    /// Apply per-metric CLI overrides on top of the template.
    pub fn with_overrides(
        mut self,
        lcp: Option<f64>,
        cls: Option<f64>,
        fcp: Option<f64>,
        ttfb: Option<f64>,
    ) -> Self {
        if let Some(v) = lcp {
            self.lcp_ms = v;
        }
        if let Some(v) = cls {
            self.cls = v;
        }
        if let Some(v) = fcp {
            self.fcp_ms = v;
        }
        if let Some(v) = ttfb {
            self.ttfb_ms = v;
        }
        self
    }
}

/// Raw metrics out of one collection strategy. `cls` is optional because
/// zero is a legitimate collected value, distinct from "not collected".
#[derive(Debug, Clone, Default, PartialEq)]
struct RawVitals {
    lcp_ms: f64,
    fcp_ms: f64,
    cls: Option<f64>,
    ttfb_ms: f64,
    dom_content_loaded_ms: f64,
    load_complete_ms: f64,
    first_paint_ms: f64,
}

pub async fn analyze(
    page: &Page,
    url: &str,
    ctx: &AnalyzerContext,
) -> Result<PerformanceSection, AnalyzerError> {
    let raw = collect(page)
        .await
        .map_err(|e| AnalyzerError::new(AnalyzerKind::Performance, e.to_string()))?;

    let vitals = derive(raw);
    let (score, issues) = score_against_budgets(&vitals, &ctx.budgets);
    debug!(
        "Vitals for {}: lcp={:.0} fcp={:.0} cls={:.3} ttfb={:.0} score={}",
        url, vitals.lcp_ms, vitals.fcp_ms, vitals.cls, vitals.ttfb_ms, score
    );

    Ok(PerformanceSection {
        score,
        grade: Grade::from_score(score),
        core_web_vitals: vitals,
        issues,
    })
}

/// Run the strategies in fixed order; first acceptable quality wins. When
/// nothing clears the gate the best-scoring collection is used anyway so
/// derivations still get a chance.
async fn collect(page: &Page) -> crate::error::Result<RawVitals> {
    let mut best: Option<(f64, RawVitals)> = None;

    for (name, strategy) in [
        ("cdp-metrics", Strategy::CdpMetrics),
        ("performance-observer", Strategy::PerformanceObserver),
        ("navigation-timing", Strategy::NavigationTiming),
    ] {
        let raw = match tokio::time::timeout(STRATEGY_TIMEOUT, run_strategy(page, strategy)).await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!("Vitals strategy {} failed: {}", name, e);
                continue;
            }
            Err(_) => {
                warn!("Vitals strategy {} timed out", name);
                continue;
            }
        };

        let quality = metrics_quality(&raw);
        debug!("Vitals strategy {}: quality {:.2}", name, quality);
        if quality >= QUALITY_THRESHOLD {
            return Ok(raw);
        }
        if best.as_ref().map(|(q, _)| quality > *q).unwrap_or(true) {
            best = Some((quality, raw));
        }
    }

    best.map(|(_, raw)| raw).ok_or_else(|| {
        AuditError::CdpError("all web vitals collection strategies failed".to_string())
    })
}

#[derive(Clone, Copy)]
enum Strategy {
    CdpMetrics,
    PerformanceObserver,
    NavigationTiming,
}

async fn run_strategy(page: &Page, strategy: Strategy) -> crate::error::Result<RawVitals> {
    match strategy {
        Strategy::CdpMetrics => collect_cdp_metrics(page).await,
        Strategy::PerformanceObserver => collect_observer(page).await,
        Strategy::NavigationTiming => collect_navigation_timing(page).await,
    }
}

/// Strategy 1: the browser's own performance metrics over CDP.
async fn collect_cdp_metrics(page: &Page) -> crate::error::Result<RawVitals> {
    let response = page
        .execute(GetMetricsParams::default())
        .await
        .map_err(|e| AuditError::CdpError(format!("Performance.getMetrics failed: {}", e)))?;

    let mut raw = RawVitals::default();
    let mut navigation_start = 0.0;
    for metric in &response.metrics {
        match metric.name.as_str() {
            "NavigationStart" => navigation_start = metric.value,
            "FirstContentfulPaint" => raw.fcp_ms = metric.value,
            "LargestContentfulPaint" => raw.lcp_ms = metric.value,
            "FirstMeaningfulPaint" => raw.first_paint_ms = metric.value,
            "DomContentLoaded" => raw.dom_content_loaded_ms = metric.value,
            _ => {}
        }
    }

    // CDP reports absolute timestamps in seconds; rebase to ms after
    // navigation start.
    if navigation_start > 0.0 {
        for value in [
            &mut raw.fcp_ms,
            &mut raw.lcp_ms,
            &mut raw.first_paint_ms,
            &mut raw.dom_content_loaded_ms,
        ] {
            if *value > 0.0 {
                *value = (*value - navigation_start) * 1000.0;
            }
        }
    }

    Ok(raw)
}

/// Strategy 2: PerformanceObserver-backed entries inside the page.
async fn collect_observer(page: &Page) -> crate::error::Result<RawVitals> {
    let js = r#"
    (() => {
        const result = {};

        const nav = performance.getEntriesByType('navigation')[0];
        if (nav) {
            result.ttfb = nav.responseStart - nav.requestStart;
            result.loadComplete = nav.loadEventEnd - nav.startTime;
            result.domContentLoaded = nav.domContentLoadedEventEnd - nav.startTime;
        }

        for (const paint of performance.getEntriesByType('paint')) {
            if (paint.name === 'first-contentful-paint') result.fcp = paint.startTime;
            if (paint.name === 'first-paint') result.firstPaint = paint.startTime;
        }

        const lcpEntries = performance.getEntriesByType('largest-contentful-paint');
        if (lcpEntries.length > 0) {
            result.lcp = lcpEntries[lcpEntries.length - 1].startTime;
        }

        let cls = 0;
        let sawShiftEntries = false;
        for (const entry of performance.getEntriesByType('layout-shift')) {
            sawShiftEntries = true;
            if (!entry.hadRecentInput) cls += entry.value;
        }
        if (sawShiftEntries || 'LayoutShift' in window) result.cls = cls;

        return JSON.stringify(result);
    })()
    "#;

    let parsed = evaluate_json(page, js).await?;
    Ok(RawVitals {
        lcp_ms: parsed["lcp"].as_f64().unwrap_or(0.0),
        fcp_ms: parsed["fcp"].as_f64().unwrap_or(0.0),
        cls: parsed["cls"].as_f64(),
        ttfb_ms: parsed["ttfb"].as_f64().unwrap_or(0.0),
        dom_content_loaded_ms: parsed["domContentLoaded"].as_f64().unwrap_or(0.0),
        load_complete_ms: parsed["loadComplete"].as_f64().unwrap_or(0.0),
        first_paint_ms: parsed["firstPaint"].as_f64().unwrap_or(0.0),
    })
}

/// Strategy 3: plain Navigation Timing, always available.
async fn collect_navigation_timing(page: &Page) -> crate::error::Result<RawVitals> {
    let js = r#"
    (() => {
        const nav = performance.getEntriesByType('navigation')[0];
        if (!nav) return "{}";
        return JSON.stringify({
            ttfb: nav.responseStart - nav.requestStart,
            domContentLoaded: nav.domContentLoadedEventEnd - nav.startTime,
            loadComplete: nav.loadEventEnd - nav.startTime,
            responseEnd: nav.responseEnd - nav.startTime,
        });
    })()
    "#;

    let parsed = evaluate_json(page, js).await?;
    // Navigation timing has no paint data; responseEnd stands in as a
    // floor for first paint so derivations have something to work with.
    let response_end = parsed["responseEnd"].as_f64().unwrap_or(0.0);
    Ok(RawVitals {
        lcp_ms: 0.0,
        fcp_ms: response_end,
        cls: None,
        ttfb_ms: parsed["ttfb"].as_f64().unwrap_or(0.0),
        dom_content_loaded_ms: parsed["domContentLoaded"].as_f64().unwrap_or(0.0),
        load_complete_ms: parsed["loadComplete"].as_f64().unwrap_or(0.0),
        first_paint_ms: 0.0,
    })
}

async fn evaluate_json(page: &Page, js: &str) -> crate::error::Result<serde_json::Value> {
    let result = page
        .evaluate(js)
        .await
        .map_err(|e| AuditError::CdpError(e.to_string()))?;
    let json_str = result.value().and_then(|v| v.as_str()).unwrap_or("{}");
    Ok(serde_json::from_str(json_str).unwrap_or_else(|e| {
        warn!("Failed to parse vitals JSON: {}", e);
        serde_json::Value::Object(serde_json::Map::new())
    }))
}

/// Weighted presence-and-plausibility checklist in [0, 1].
fn metrics_quality(raw: &RawVitals) -> f64 {
    let mut quality = 0.0;
    if raw.fcp_ms > 0.0 && raw.fcp_ms < 30_000.0 {
        quality += 0.3;
    }
    if raw.lcp_ms > 0.0 && raw.lcp_ms < 30_000.0 {
        quality += 0.25;
    }
    if raw.ttfb_ms > 0.0 && raw.ttfb_ms < 30_000.0 {
        quality += 0.25;
    }
    if let Some(cls) = raw.cls {
        if (0.0..5.0).contains(&cls) {
            quality += 0.2;
        }
    }
    quality
}

/// Fill gaps the collectors left, then clamp everything non-negative.
fn derive(raw: RawVitals) -> CoreWebVitals {
    let mut lcp_ms = raw.lcp_ms;
    if lcp_ms <= 0.0 && raw.fcp_ms > 0.0 {
        lcp_ms = raw.fcp_ms * 1.2;
    }
    let mut first_paint_ms = raw.first_paint_ms;
    if first_paint_ms <= 0.0 && raw.fcp_ms > 0.0 {
        first_paint_ms = raw.fcp_ms;
    }

    CoreWebVitals {
        lcp_ms: lcp_ms.max(0.0),
        fcp_ms: raw.fcp_ms.max(0.0),
        cls: raw.cls.unwrap_or(0.0).max(0.0),
        ttfb_ms: raw.ttfb_ms.max(0.0),
        dom_content_loaded_ms: raw.dom_content_loaded_ms.max(0.0),
        load_complete_ms: raw.load_complete_ms.max(0.0),
        first_paint_ms: first_paint_ms.max(0.0),
    }
}

/// Budget check per metric: full weight at or under budget, linear falloff
/// to zero at twice the budget.
fn budget_points(value: f64, budget: f64, weight: f64) -> f64 {
    if value <= budget {
        weight
    } else if value >= budget * 2.0 {
        0.0
    } else {
        weight * (1.0 - (value - budget) / budget)
    }
}

fn score_against_budgets(
    vitals: &CoreWebVitals,
    budgets: &PerformanceBudgets,
) -> (u32, Vec<String>) {
    let fcp = budget_points(vitals.fcp_ms, budgets.fcp_ms, 35.0);
    let lcp = budget_points(vitals.lcp_ms, budgets.lcp_ms, 25.0);
    let cls = budget_points(vitals.cls, budgets.cls, 25.0);
    let ttfb = budget_points(vitals.ttfb_ms, budgets.ttfb_ms, 15.0);

    let mut issues = Vec::new();
    if vitals.fcp_ms > budgets.fcp_ms {
        issues.push(format!(
            "FCP {:.0} ms exceeds budget {:.0} ms",
            vitals.fcp_ms, budgets.fcp_ms
        ));
    }
    if vitals.lcp_ms > budgets.lcp_ms {
        issues.push(format!(
            "LCP {:.0} ms exceeds budget {:.0} ms",
            vitals.lcp_ms, budgets.lcp_ms
        ));
    }
    if vitals.cls > budgets.cls {
        issues.push(format!(
            "CLS {:.3} exceeds budget {:.3}",
            vitals.cls, budgets.cls
        ));
    }
    if vitals.ttfb_ms > budgets.ttfb_ms {
        issues.push(format!(
            "TTFB {:.0} ms exceeds budget {:.0} ms",
            vitals.ttfb_ms, budgets.ttfb_ms
        ));
    }

    let score = (fcp + lcp + cls + ttfb).round().clamp(0.0, 100.0) as u32;
    (score, issues)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_templates_differ() {
        let default = PerformanceBudgets::from_template(BudgetTemplate::Default);
        let shop = PerformanceBudgets::from_template(BudgetTemplate::Ecommerce);
        assert!(shop.lcp_ms < default.lcp_ms);
        assert!(shop.cls < default.cls);
    }

    #[test]
    fn test_budget_overrides() {
        let budgets = PerformanceBudgets::default().with_overrides(
            Some(2000.0),
            None,
            Some(1500.0),
            None,
        );
        assert_eq!(budgets.lcp_ms, 2000.0);
        assert_eq!(budgets.fcp_ms, 1500.0);
        assert_eq!(budgets.ttfb_ms, 800.0);
    }

    #[test]
    fn test_quality_rejects_all_zero_collection() {
        let raw = RawVitals::default();
        assert!(metrics_quality(&raw) < QUALITY_THRESHOLD);
    }

    #[test]
    fn test_quality_accepts_partial_collection() {
        // FCP and TTFB present is already enough to accept.
        let raw = RawVitals {
            fcp_ms: 1800.0,
            ttfb_ms: 400.0,
            cls: Some(0.0),
            ..Default::default()
        };
        assert!(metrics_quality(&raw) >= QUALITY_THRESHOLD);
    }

    #[test]
    fn test_quality_penalizes_implausible_values() {
        let raw = RawVitals {
            fcp_ms: 45_000.0,
            lcp_ms: 60_000.0,
            ttfb_ms: 400.0,
            cls: Some(9.0),
            ..Default::default()
        };
        assert!(metrics_quality(&raw) < QUALITY_THRESHOLD);
    }

    #[test]
    fn test_lcp_derived_from_fcp() {
        let raw = RawVitals {
            fcp_ms: 1800.0,
            ttfb_ms: 400.0,
            cls: Some(0.0),
            ..Default::default()
        };
        let vitals = derive(raw);
        assert!((vitals.lcp_ms - 2160.0).abs() < f64::EPSILON);
        assert_eq!(vitals.first_paint_ms, 1800.0);
    }

    #[test]
    fn test_fallback_collection_scores_well_within_budget() {
        // The observer yields FCP=1800, TTFB=400, CLS=0; LCP derives to
        // 2160 which is inside the default budget.
        let vitals = derive(RawVitals {
            fcp_ms: 1800.0,
            ttfb_ms: 400.0,
            cls: Some(0.0),
            ..Default::default()
        });
        let (score, issues) = score_against_budgets(&vitals, &PerformanceBudgets::default());
        assert!(score >= 80, "score {} should be at least 80", score);
        let grade = Grade::from_score(score);
        assert!(matches!(grade, Grade::A | Grade::B));
        assert!(issues.is_empty());
    }

    #[test]
    fn test_score_degrades_past_budget() {
        let vitals = CoreWebVitals {
            lcp_ms: 6000.0,
            fcp_ms: 4000.0,
            cls: 0.4,
            ttfb_ms: 2000.0,
            ..Default::default()
        };
        let (score, issues) = score_against_budgets(&vitals, &PerformanceBudgets::default());
        assert_eq!(score, 0);
        assert_eq!(issues.len(), 4);
    }

    #[test]
    fn test_budget_points_linear_falloff() {
        assert_eq!(budget_points(1000.0, 1000.0, 25.0), 25.0);
        assert_eq!(budget_points(2000.0, 1000.0, 25.0), 0.0);
        let half = budget_points(1500.0, 1000.0, 25.0);
        assert!((half - 12.5).abs() < 0.001);
    }
}
