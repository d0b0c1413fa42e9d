//! Mobile-friendliness analyzer
//!
//! Inspects viewport configuration, touch target sizing, font sizes, and
//! responsive layout hints, producing categorized recommendations.

use chromiumoxide::Page;
use tracing::{debug, warn};

use super::{AnalyzerContext, AnalyzerError, AnalyzerKind};
use crate::audit::result::{Grade, MobileCategory, MobileRecommendation, MobileSection, Priority};
use crate::error::AuditError;

pub async fn analyze(
    page: &Page,
    url: &str,
    _ctx: &AnalyzerContext,
) -> Result<MobileSection, AnalyzerError> {
    extract(page, url)
        .await
        .map_err(|e| AnalyzerError::new(AnalyzerKind::Mobile, e.to_string()))
}

async fn extract(page: &Page, url: &str) -> crate::error::Result<MobileSection> {
    let js = r#"
    (() => {
        const result = { viewport: {}, touch: {}, fonts: {}, content: {} };

        const viewport = document.querySelector('meta[name="viewport"]');
        if (viewport) {
            const content = viewport.getAttribute('content') || '';
            result.viewport.present = true;
            result.viewport.deviceWidth = content.includes('width=device-width');
            result.viewport.initialScale = content.includes('initial-scale=1');
            result.viewport.scalable = !content.includes('user-scalable=no') &&
                                       !content.includes('user-scalable=0');
        } else {
            result.viewport.present = false;
        }

        const interactive = document.querySelectorAll(
            'a, button, input, select, textarea, [onclick], [role="button"]');
        let small = 0;
        interactive.forEach(el => {
            const rect = el.getBoundingClientRect();
            if (rect.width > 0 && rect.height > 0 && (rect.width < 44 || rect.height < 44)) {
                small++;
            }
        });
        result.touch.total = interactive.length;
        result.touch.small = small;

        let smallest = 100;
        let legible = 0, measured = 0;
        document.querySelectorAll('p, span, a, li, td, th, h1, h2, h3, h4, h5, h6')
            .forEach(el => {
                const size = parseFloat(window.getComputedStyle(el).fontSize);
                if (size > 0) {
                    measured++;
                    if (size >= 12) legible++;
                    if (size < smallest) smallest = size;
                }
            });
        result.fonts.smallest = measured > 0 ? smallest : 16;
        result.fonts.legibleRatio = measured > 0 ? legible / measured : 1;

        result.content.horizontalScroll =
            document.documentElement.scrollWidth > window.innerWidth;

        const images = Array.from(document.querySelectorAll('img'));
        const responsive = images.filter(img =>
            img.srcset || img.sizes ||
            window.getComputedStyle(img).maxWidth === '100%').length;
        result.content.totalImages = images.length;
        result.content.responsiveImages = responsive;

        return JSON.stringify(result);
    })()
    "#;

    let result = page
        .evaluate(js)
        .await
        .map_err(|e| AuditError::CdpError(format!("Mobile analysis failed: {}", e)))?;
    let json_str = result.value().and_then(|v| v.as_str()).unwrap_or("{}");
    let parsed: serde_json::Value = serde_json::from_str(json_str).unwrap_or_else(|e| {
        warn!("Failed to parse mobile analysis JSON: {}", e);
        serde_json::Value::Object(serde_json::Map::new())
    });

    let mut recommendations = Vec::new();

    let vp = &parsed["viewport"];
    if !vp["present"].as_bool().unwrap_or(false) {
        recommendations.push(MobileRecommendation {
            category: MobileCategory::Viewport,
            priority: Priority::Critical,
            issue: "Missing viewport meta tag".to_string(),
            recommendation: "Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">"
                .to_string(),
            impact: "Page renders at desktop width on phones".to_string(),
        });
    } else {
        if !vp["deviceWidth"].as_bool().unwrap_or(false)
            || !vp["initialScale"].as_bool().unwrap_or(false)
        {
            recommendations.push(MobileRecommendation {
                category: MobileCategory::Viewport,
                priority: Priority::High,
                issue: "Viewport is not properly configured".to_string(),
                recommendation: "Use width=device-width with initial-scale=1".to_string(),
                impact: "Page may not scale correctly on all devices".to_string(),
            });
        }
        if !vp["scalable"].as_bool().unwrap_or(true) {
            recommendations.push(MobileRecommendation {
                category: MobileCategory::Viewport,
                priority: Priority::Critical,
                issue: "Page disables zooming (user-scalable=no)".to_string(),
                recommendation: "Allow pinch zoom".to_string(),
                impact: "Users with low vision cannot magnify content".to_string(),
            });
        }
    }

    let touch = &parsed["touch"];
    let small_targets = touch["small"].as_u64().unwrap_or(0);
    let total_targets = touch["total"].as_u64().unwrap_or(0);
    if small_targets > 0 {
        let priority = if small_targets * 4 > total_targets.max(1) {
            Priority::High
        } else {
            Priority::Medium
        };
        recommendations.push(MobileRecommendation {
            category: MobileCategory::TouchTargets,
            priority,
            issue: format!(
                "{} of {} touch targets are smaller than 44x44 px",
                small_targets, total_targets
            ),
            recommendation: "Enlarge tap areas or add padding".to_string(),
            impact: "Links and buttons are hard to tap accurately".to_string(),
        });
    }

    let fonts = &parsed["fonts"];
    let smallest = fonts["smallest"].as_f64().unwrap_or(16.0);
    let legible_ratio = fonts["legibleRatio"].as_f64().unwrap_or(1.0);
    if smallest < 12.0 {
        recommendations.push(MobileRecommendation {
            category: MobileCategory::Typography,
            priority: if legible_ratio < 0.8 {
                Priority::High
            } else {
                Priority::Low
            },
            issue: format!("Smallest font size is {:.0}px", smallest),
            recommendation: "Keep body text at 12px or larger".to_string(),
            impact: "Small text is unreadable without zooming".to_string(),
        });
    }

    let content = &parsed["content"];
    if content["horizontalScroll"].as_bool().unwrap_or(false) {
        recommendations.push(MobileRecommendation {
            category: MobileCategory::Content,
            priority: Priority::High,
            issue: "Content overflows the viewport horizontally".to_string(),
            recommendation: "Constrain content width; use max-width: 100%".to_string(),
            impact: "Users must scroll sideways to read".to_string(),
        });
    }

    let total_images = content["totalImages"].as_u64().unwrap_or(0);
    let responsive_images = content["responsiveImages"].as_u64().unwrap_or(0);
    if total_images >= 3 && responsive_images * 2 < total_images {
        recommendations.push(MobileRecommendation {
            category: MobileCategory::Images,
            priority: Priority::Medium,
            issue: format!(
                "Only {} of {} images are responsive",
                responsive_images, total_images
            ),
            recommendation: "Use srcset/sizes or max-width: 100% on images".to_string(),
            impact: "Oversized images waste bandwidth on mobile".to_string(),
        });
    }

    let overall_score = score_recommendations(&recommendations);
    debug!(
        "Mobile for {}: score {} ({} recommendations)",
        url,
        overall_score,
        recommendations.len()
    );

    Ok(MobileSection {
        overall_score,
        grade: Grade::from_score(overall_score),
        recommendations,
    })
}

fn score_recommendations(recommendations: &[MobileRecommendation]) -> u32 {
    let mut score = 100u32;
    for rec in recommendations {
        score = score.saturating_sub(match rec.priority {
            Priority::Critical => 25,
            Priority::High => 15,
            Priority::Medium => 10,
            Priority::Low => 5,
        });
    }
    score
}
