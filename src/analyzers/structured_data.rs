//! Structured data analyzer (comprehensive mode)
//!
//! Counts JSON-LD blocks and microdata scopes and collects the schema
//! types they declare.

use chromiumoxide::Page;
use tracing::{debug, warn};

use super::{AnalyzerContext, AnalyzerError, AnalyzerKind};
use crate::audit::result::StructuredDataSection;
use crate::error::AuditError;

pub async fn analyze(
    page: &Page,
    url: &str,
    _ctx: &AnalyzerContext,
) -> Result<StructuredDataSection, AnalyzerError> {
    extract(page, url)
        .await
        .map_err(|e| AnalyzerError::new(AnalyzerKind::StructuredData, e.to_string()))
}

async fn extract(page: &Page, url: &str) -> crate::error::Result<StructuredDataSection> {
    let js = r#"
    (() => {
        const scripts = Array.from(
            document.querySelectorAll('script[type="application/ld+json"]'));
        const types = [];
        const collect = node => {
            if (Array.isArray(node)) { node.forEach(collect); return; }
            if (node && typeof node === 'object') {
                if (node['@type']) {
                    Array.isArray(node['@type'])
                        ? types.push(...node['@type'])
                        : types.push(node['@type']);
                }
                if (node['@graph']) collect(node['@graph']);
            }
        };
        for (const script of scripts) {
            try { collect(JSON.parse(script.textContent)); } catch (e) {}
        }
        const micro = document.querySelectorAll('[itemscope]');
        micro.forEach(el => {
            const itemtype = el.getAttribute('itemtype');
            if (itemtype) types.push(itemtype.split('/').pop());
        });
        return JSON.stringify({
            jsonLd: scripts.length,
            microdata: micro.length,
            types: Array.from(new Set(types)),
        });
    })()
    "#;

    let result = page
        .evaluate(js)
        .await
        .map_err(|e| AuditError::CdpError(format!("Structured data extraction failed: {}", e)))?;
    let json_str = result.value().and_then(|v| v.as_str()).unwrap_or("{}");
    let parsed: serde_json::Value = serde_json::from_str(json_str).unwrap_or_else(|e| {
        warn!("Failed to parse structured data JSON: {}", e);
        serde_json::Value::Object(serde_json::Map::new())
    });

    let section = StructuredDataSection {
        json_ld_count: parsed["jsonLd"].as_u64().unwrap_or(0) as u32,
        microdata_count: parsed["microdata"].as_u64().unwrap_or(0) as u32,
        types: parsed["types"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default(),
    };

    debug!(
        "Structured data for {}: {} JSON-LD, {} microdata",
        url, section.json_ld_count, section.microdata_count
    );

    Ok(section)
}
