//! Content weight analyzer
//!
//! Sums transferred bytes by resource category from the page's resource
//! timing entries, estimates the compression ratio and the text-to-code
//! ratio, and suggests optimizations.

use chromiumoxide::Page;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{AnalyzerContext, AnalyzerError, AnalyzerKind};
use crate::audit::result::{ContentWeightSection, Grade, ResourceBreakdown, ResourceStat};
use crate::error::AuditError;

pub async fn analyze(
    page: &Page,
    url: &str,
    _ctx: &AnalyzerContext,
) -> Result<ContentWeightSection, AnalyzerError> {
    extract(page, url)
        .await
        .map_err(|e| AnalyzerError::new(AnalyzerKind::ContentWeight, e.to_string()))
}

#[derive(Debug, Deserialize)]
struct ResourceEntry {
    name: String,
    #[serde(rename = "type")]
    initiator_type: String,
    #[serde(rename = "transferSize")]
    transfer_size: u64,
    #[serde(rename = "decodedSize")]
    decoded_size: u64,
}

async fn extract(page: &Page, url: &str) -> crate::error::Result<ContentWeightSection> {
    let js = r#"
    (() => {
        const resources = performance.getEntriesByType('resource').map(r => ({
            name: r.name,
            type: r.initiatorType,
            transferSize: r.transferSize || 0,
            decodedSize: r.decodedBodySize || 0,
        }));
        const nav = performance.getEntriesByType('navigation')[0];
        const docTransfer = nav ? (nav.transferSize || 0) : 0;
        const docDecoded = nav ? (nav.decodedBodySize || 0) : 0;
        const markup = document.documentElement.outerHTML.length;
        const text = (document.body ? document.body.innerText : '').length;
        return JSON.stringify({ resources, docTransfer, docDecoded, markup, text });
    })()
    "#;

    let result = page
        .evaluate(js)
        .await
        .map_err(|e| AuditError::CdpError(format!("Resource analysis failed: {}", e)))?;
    let json_str = result.value().and_then(|v| v.as_str()).unwrap_or("{}");
    let parsed: serde_json::Value = serde_json::from_str(json_str).unwrap_or_else(|e| {
        warn!("Failed to parse resource entries JSON: {}", e);
        serde_json::Value::Object(serde_json::Map::new())
    });

    let resources: Vec<ResourceEntry> =
        serde_json::from_value(parsed["resources"].clone()).unwrap_or_default();

    let mut breakdown = ResourceBreakdown::default();
    let mut decoded_total: u64 = 0;
    let mut transfer_total: u64 = 0;

    // The document itself counts as HTML.
    let doc_transfer = parsed["docTransfer"].as_u64().unwrap_or(0);
    let doc_decoded = parsed["docDecoded"].as_u64().unwrap_or(0);
    add(&mut breakdown.html, doc_transfer);
    decoded_total += doc_decoded;
    transfer_total += doc_transfer;

    for entry in &resources {
        let stat = match categorize(&entry.name, &entry.initiator_type) {
            Category::Html => &mut breakdown.html,
            Category::Css => &mut breakdown.css,
            Category::JavaScript => &mut breakdown.javascript,
            Category::Image => &mut breakdown.images,
            Category::Other => &mut breakdown.other,
        };
        add(stat, entry.transfer_size);
        decoded_total += entry.decoded_size;
        transfer_total += entry.transfer_size;
    }

    breakdown.total_size = transfer_total;

    let compression_ratio = if decoded_total == 0 {
        1.0
    } else {
        transfer_total as f64 / decoded_total as f64
    };

    let markup = parsed["markup"].as_u64().unwrap_or(0);
    let text = parsed["text"].as_u64().unwrap_or(0);
    let text_ratio = if markup == 0 {
        0.0
    } else {
        text as f64 / markup as f64
    };

    let (score, optimizations) =
        score_weight(&breakdown, compression_ratio, text_ratio, resources.len() as u32);
    debug!(
        "Content weight for {}: {} transferred, score {}",
        url,
        format_bytes(transfer_total),
        score
    );

    Ok(ContentWeightSection {
        score,
        grade: Grade::from_score(score),
        resources: breakdown,
        optimizations,
        compression_ratio,
        text_ratio,
    })
}

fn add(stat: &mut ResourceStat, transfer: u64) {
    stat.files += 1;
    stat.size += transfer;
}

enum Category {
    Html,
    Css,
    JavaScript,
    Image,
    Other,
}

fn categorize(url: &str, initiator_type: &str) -> Category {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();

    if path.ends_with(".css") || initiator_type == "css" {
        Category::Css
    } else if path.ends_with(".js") || path.ends_with(".mjs") || initiator_type == "script" {
        Category::JavaScript
    } else if path.ends_with(".html") || path.ends_with(".htm") {
        Category::Html
    } else if path.ends_with(".png")
        || path.ends_with(".jpg")
        || path.ends_with(".jpeg")
        || path.ends_with(".gif")
        || path.ends_with(".webp")
        || path.ends_with(".avif")
        || path.ends_with(".svg")
        || path.ends_with(".ico")
        || initiator_type == "img"
    {
        Category::Image
    } else {
        Category::Other
    }
}

fn score_weight(
    breakdown: &ResourceBreakdown,
    compression_ratio: f64,
    text_ratio: f64,
    request_count: u32,
) -> (u32, Vec<String>) {
    let mut score = 100u32;
    let mut optimizations = Vec::new();
    let total = breakdown.total_size;

    if total > 5_000_000 {
        score = score.saturating_sub(30);
        optimizations.push(format!(
            "Page transfers {} (over 5 MB); lazy-load and split resources",
            format_bytes(total)
        ));
    } else if total > 3_000_000 {
        score = score.saturating_sub(15);
        optimizations.push(format!(
            "Page transfers {}; consider optimizing resources",
            format_bytes(total)
        ));
    } else if total > 1_500_000 {
        score = score.saturating_sub(5);
    }

    if breakdown.javascript.size > 1_000_000 {
        score = score.saturating_sub(10);
        optimizations.push(format!(
            "JavaScript weighs {}; code-split and tree-shake bundles",
            format_bytes(breakdown.javascript.size)
        ));
    }

    if breakdown.images.size > 2_000_000 {
        score = score.saturating_sub(10);
        optimizations.push(format!(
            "Images weigh {}; serve WebP/AVIF and responsive sizes",
            format_bytes(breakdown.images.size)
        ));
    }

    if breakdown.css.size > 500_000 {
        score = score.saturating_sub(5);
        optimizations.push(format!(
            "CSS weighs {}; remove unused styles",
            format_bytes(breakdown.css.size)
        ));
    }

    if compression_ratio > 0.9 && total > 100_000 {
        score = score.saturating_sub(10);
        optimizations.push("Enable gzip/brotli compression for text resources".to_string());
    }

    if text_ratio < 0.05 && breakdown.html.size > 50_000 {
        score = score.saturating_sub(5);
        optimizations.push("Markup greatly outweighs visible text; trim boilerplate".to_string());
    }

    if request_count > 75 {
        score = score.saturating_sub(5);
        optimizations.push(format!(
            "{} requests; bundle small assets to reduce round trips",
            request_count
        ));
    }

    (score.min(100), optimizations)
}

/// Format bytes as a human-readable string
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_000_000 {
        format!("{:.1} MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1} KB", bytes as f64 / 1_000.0)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1500), "1.5 KB");
        assert_eq!(format_bytes(1_500_000), "1.5 MB");
    }

    #[test]
    fn test_categorize_by_extension_and_initiator() {
        assert!(matches!(categorize("style.css", "link"), Category::Css));
        assert!(matches!(categorize("app.js?v=2", "script"), Category::JavaScript));
        assert!(matches!(categorize("photo.jpg", "img"), Category::Image));
        assert!(matches!(
            categorize("https://cdn.example.com/font.woff2", "css"),
            Category::Css
        ));
        assert!(matches!(categorize("data.bin", "fetch"), Category::Other));
    }

    #[test]
    fn test_light_page_scores_perfect() {
        let breakdown = ResourceBreakdown {
            total_size: 300_000,
            html: ResourceStat { size: 50_000, files: 1 },
            css: ResourceStat { size: 50_000, files: 2 },
            javascript: ResourceStat { size: 100_000, files: 3 },
            images: ResourceStat { size: 100_000, files: 5 },
            other: ResourceStat::default(),
        };
        let (score, optimizations) = score_weight(&breakdown, 0.3, 0.2, 11);
        assert_eq!(score, 100);
        assert!(optimizations.is_empty());
    }

    #[test]
    fn test_heavy_page_penalized() {
        let breakdown = ResourceBreakdown {
            total_size: 6_000_000,
            javascript: ResourceStat { size: 2_000_000, files: 10 },
            images: ResourceStat { size: 3_000_000, files: 30 },
            ..Default::default()
        };
        let (score, optimizations) = score_weight(&breakdown, 0.95, 0.02, 120);
        assert!(score < 50);
        assert!(optimizations.len() >= 4);
    }
}
