//! SEO analyzer
//!
//! Extracts meta tags, heading counts, image alt coverage, and
//! canonical/robots signals in one JavaScript pass, then scores them.

use chromiumoxide::Page;
use tracing::{debug, warn};

use super::{AnalyzerContext, AnalyzerError, AnalyzerKind};
use crate::audit::result::{Grade, SeoMeta, SeoSection};
use crate::error::AuditError;

pub async fn analyze(
    page: &Page,
    url: &str,
    _ctx: &AnalyzerContext,
) -> Result<SeoSection, AnalyzerError> {
    extract(page, url)
        .await
        .map_err(|e| AnalyzerError::new(AnalyzerKind::Seo, e.to_string()))
}

async fn extract(page: &Page, url: &str) -> crate::error::Result<SeoSection> {
    let js = r#"
    (() => {
        const meta = name => {
            const el = document.querySelector(`meta[name="${name}" i]`);
            return el ? el.getAttribute('content') : null;
        };
        const imgs = Array.from(document.querySelectorAll('img'));
        const canonical = document.querySelector('link[rel="canonical"]');
        return JSON.stringify({
            title: document.title || null,
            description: meta('description'),
            keywords: meta('keywords'),
            robots: meta('robots'),
            canonical: canonical ? canonical.getAttribute('href') : null,
            h1: document.querySelectorAll('h1').length,
            h2: document.querySelectorAll('h2').length,
            h3: document.querySelectorAll('h3').length,
            images: imgs.length,
            imagesMissingAlt: imgs.filter(i => !i.hasAttribute('alt')).length,
            imagesEmptyAlt: imgs.filter(i =>
                i.hasAttribute('alt') && i.getAttribute('alt').trim() === '').length,
        });
    })()
    "#;

    let result = page
        .evaluate(js)
        .await
        .map_err(|e| AuditError::CdpError(format!("SEO extraction failed: {}", e)))?;
    let json_str = result.value().and_then(|v| v.as_str()).unwrap_or("{}");
    let parsed: serde_json::Value = serde_json::from_str(json_str).unwrap_or_else(|e| {
        warn!("Failed to parse SEO JSON: {}", e);
        serde_json::Value::Object(serde_json::Map::new())
    });

    let title = parsed["title"].as_str().map(String::from);
    let description = parsed["description"].as_str().map(String::from);
    let keywords: Vec<String> = parsed["keywords"]
        .as_str()
        .map(|k| {
            k.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let meta = SeoMeta {
        title_length: title.as_deref().map(|t| t.chars().count()).unwrap_or(0),
        description_length: description
            .as_deref()
            .map(|d| d.chars().count())
            .unwrap_or(0),
        title,
        description,
        keywords,
        h1_count: parsed["h1"].as_u64().unwrap_or(0) as u32,
        h2_count: parsed["h2"].as_u64().unwrap_or(0) as u32,
        h3_count: parsed["h3"].as_u64().unwrap_or(0) as u32,
        image_count: parsed["images"].as_u64().unwrap_or(0) as u32,
        images_missing_alt: parsed["imagesMissingAlt"].as_u64().unwrap_or(0) as u32,
        images_empty_alt: parsed["imagesEmptyAlt"].as_u64().unwrap_or(0) as u32,
    };

    let canonical = parsed["canonical"].as_str().map(String::from);
    let robots = parsed["robots"].as_str().map(String::from);

    let (score, issues, recommendations) = score_seo(&meta, canonical.as_deref(), robots.as_deref(), url);
    debug!("SEO for {}: score {} ({} issues)", url, score, issues.len());

    Ok(SeoSection {
        score,
        grade: Grade::from_score(score),
        meta,
        issues,
        recommendations,
    })
}

fn score_seo(
    meta: &SeoMeta,
    canonical: Option<&str>,
    robots: Option<&str>,
    url: &str,
) -> (u32, Vec<String>, Vec<String>) {
    let mut score = 100u32;
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    match meta.title_length {
        0 => {
            score = score.saturating_sub(15);
            issues.push("Missing page title".to_string());
            recommendations.push("Add a <title> of 30-60 characters".to_string());
        }
        1..=29 => {
            score = score.saturating_sub(5);
            issues.push(format!(
                "Title is too short ({} chars, recommended 30-60)",
                meta.title_length
            ));
        }
        30..=60 => {}
        _ => {
            score = score.saturating_sub(5);
            issues.push(format!(
                "Title is too long ({} chars, recommended 30-60)",
                meta.title_length
            ));
        }
    }

    match meta.description_length {
        0 => {
            score = score.saturating_sub(10);
            issues.push("Missing meta description".to_string());
            recommendations.push("Add a meta description of 120-160 characters".to_string());
        }
        1..=119 => {
            score = score.saturating_sub(3);
            issues.push(format!(
                "Description is too short ({} chars, recommended 120-160)",
                meta.description_length
            ));
        }
        120..=160 => {}
        _ => {
            score = score.saturating_sub(3);
            issues.push(format!(
                "Description is too long ({} chars, recommended 120-160)",
                meta.description_length
            ));
        }
    }

    if meta.h1_count == 0 {
        score = score.saturating_sub(15);
        issues.push("Page has no h1".to_string());
        recommendations.push("Add exactly one h1 describing the page".to_string());
    } else if meta.h1_count > 1 {
        score = score.saturating_sub(5);
        issues.push(format!("Page has {} h1 elements", meta.h1_count));
    }

    let alt_problems = meta.images_missing_alt + meta.images_empty_alt;
    if alt_problems > 0 {
        let penalty = (alt_problems * 2).min(20);
        score = score.saturating_sub(penalty);
        issues.push(format!(
            "{} of {} images lack useful alt text",
            alt_problems, meta.image_count
        ));
        recommendations.push("Describe meaningful images in their alt attribute".to_string());
    }

    if canonical.is_none() {
        score = score.saturating_sub(5);
        recommendations.push("Add a canonical link element".to_string());
    }

    if let Some(robots) = robots {
        if robots.to_lowercase().contains("noindex") {
            score = score.saturating_sub(10);
            issues.push("Page is marked noindex".to_string());
        }
    }

    if !url.starts_with("https://") {
        score = score.saturating_sub(10);
        issues.push("Page is not served over HTTPS".to_string());
    }

    (score.min(100), issues, recommendations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_meta() -> SeoMeta {
        SeoMeta {
            title: Some("A perfectly sized page title for testing".to_string()),
            title_length: 40,
            description: Some("x".repeat(140)),
            description_length: 140,
            keywords: vec![],
            h1_count: 1,
            h2_count: 3,
            h3_count: 5,
            image_count: 4,
            images_missing_alt: 0,
            images_empty_alt: 0,
        }
    }

    #[test]
    fn test_clean_page_scores_high() {
        let (score, issues, _) = score_seo(
            &good_meta(),
            Some("https://example.com/page"),
            None,
            "https://example.com/page",
        );
        assert_eq!(score, 100);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_missing_title_and_h1_penalized() {
        let meta = SeoMeta {
            title: None,
            title_length: 0,
            h1_count: 0,
            ..good_meta()
        };
        let (score, issues, recommendations) =
            score_seo(&meta, Some("c"), None, "https://example.com/");
        assert_eq!(score, 70);
        assert_eq!(issues.len(), 2);
        assert!(!recommendations.is_empty());
    }

    #[test]
    fn test_alt_penalty_is_capped() {
        let meta = SeoMeta {
            image_count: 50,
            images_missing_alt: 40,
            ..good_meta()
        };
        let (score, _, _) = score_seo(&meta, Some("c"), None, "https://example.com/");
        assert_eq!(score, 80);
    }

    #[test]
    fn test_noindex_flagged() {
        let (score, issues, _) = score_seo(
            &good_meta(),
            Some("c"),
            Some("noindex, nofollow"),
            "https://example.com/",
        );
        assert_eq!(score, 90);
        assert!(issues.iter().any(|i| i.contains("noindex")));
    }

    #[test]
    fn test_http_penalized() {
        let (score, issues, _) = score_seo(&good_meta(), Some("c"), None, "http://example.com/");
        assert_eq!(score, 90);
        assert!(issues.iter().any(|i| i.contains("HTTPS")));
    }
}
