//! Sitemap discovery
//!
//! Fetches a sitemap URL and extracts page URLs, recursing through
//! sitemap index files.

use tracing::{debug, info, warn};

use crate::error::{AuditError, Result};

/// Outcome of sitemap discovery
#[derive(Debug, Clone)]
pub struct DiscoveredUrls {
    /// The sitemap the URLs came from
    pub sitemap_url: String,
    /// Page URLs in sitemap order
    pub urls: Vec<String>,
}

/// Fetch a sitemap and collect every page URL it lists. Sitemap indexes
/// are followed one level at a time; a broken nested sitemap is logged
/// and skipped.
pub async fn discover(sitemap_url: &str) -> Result<DiscoveredUrls> {
    info!("Fetching sitemap from: {}", sitemap_url);

    let content = fetch(sitemap_url).await?;

    let urls = if content.contains("<sitemapindex") {
        info!("Detected sitemap index, expanding nested sitemaps...");
        let mut all_urls = Vec::new();
        for nested in extract_tagged_locs(&content, "sitemap") {
            debug!("Processing nested sitemap: {}", nested);
            match fetch(&nested).await {
                Ok(nested_content) => {
                    all_urls.extend(extract_tagged_locs(&nested_content, "url"))
                }
                Err(e) => warn!("Failed to fetch nested sitemap {}: {}", nested, e),
            }
        }
        all_urls
    } else {
        extract_tagged_locs(&content, "url")
    };

    info!("Found {} URLs in sitemap", urls.len());
    Ok(DiscoveredUrls {
        sitemap_url: sitemap_url.to_string(),
        urls,
    })
}

async fn fetch(url: &str) -> Result<String> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| AuditError::SitemapParseFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(AuditError::SitemapParseFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    response
        .text()
        .await
        .map_err(|e| AuditError::SitemapParseFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })
}

/// Extract `<loc>` values that sit inside the given tag (`url` for page
/// sets, `sitemap` for index files). Entries may share a line.
fn extract_tagged_locs(content: &str, tag: &str) -> Vec<String> {
    let close = format!("</{}>", tag);
    let mut urls = Vec::new();
    let mut cursor = 0;

    while let Some(open_at) = find_open_tag(&content[cursor..], tag) {
        let block_start = cursor + open_at;
        let block_end = content[block_start..]
            .find(&close)
            .map(|i| block_start + i)
            .unwrap_or(content.len());
        if let Some(url) = extract_loc_value(&content[block_start..block_end]) {
            urls.push(url);
        }
        if block_end >= content.len() {
            break;
        }
        cursor = block_end + close.len();
    }

    urls
}

/// Find `<tag>` or `<tag attr...>`, rejecting longer names such as
/// `<urlset` when looking for `<url`.
fn find_open_tag(haystack: &str, tag: &str) -> Option<usize> {
    let needle = format!("<{}", tag);
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(&needle) {
        let abs = from + pos;
        match haystack.as_bytes().get(abs + needle.len()) {
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') => {
                return Some(abs)
            }
            _ => from = abs + needle.len(),
        }
    }
    None
}

fn extract_loc_value(block: &str) -> Option<String> {
    let start = block.find("<loc>")? + 5;
    let end = block[start..].find("</loc>")? + start;
    let value = block[start..end].trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_loc_value() {
        assert_eq!(
            extract_loc_value("  <loc>https://example.com/page</loc>  "),
            Some("https://example.com/page".to_string())
        );
        assert_eq!(extract_loc_value("<loc></loc>"), None);
        assert_eq!(extract_loc_value("no loc here"), None);
    }

    #[test]
    fn test_extract_page_urls() {
        let sitemap = r#"<?xml version="1.0"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://example.com/page1</loc>
  </url>
  <url>
    <loc>https://example.com/page2</loc>
  </url>
</urlset>"#;

        let urls = extract_tagged_locs(sitemap, "url");
        assert_eq!(
            urls,
            vec![
                "https://example.com/page1".to_string(),
                "https://example.com/page2".to_string()
            ]
        );
    }

    #[test]
    fn test_extract_sitemap_index_urls() {
        let index = r#"<?xml version="1.0"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap>
    <loc>https://example.com/sitemap1.xml</loc>
  </sitemap>
  <sitemap>
    <loc>https://example.com/sitemap2.xml</loc>
  </sitemap>
</sitemapindex>"#;

        let urls = extract_tagged_locs(index, "sitemap");
        assert_eq!(urls.len(), 2);
    }

    #[test]
    fn test_single_line_entries() {
        let sitemap = "<urlset><url><loc>https://example.com/a</loc></url><url><loc>https://example.com/b</loc></url></urlset>";
        // Entries collapsed onto one line still parse.
        let urls = extract_tagged_locs(sitemap, "url");
        assert_eq!(urls.len(), 2);
    }
}
