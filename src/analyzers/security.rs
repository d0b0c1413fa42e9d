//! Security headers analyzer (comprehensive mode)
//!
//! Issues a HEAD request to the audited URL and grades the response's
//! security headers. Runs off the browser entirely.

use tracing::debug;

use super::{AnalyzerContext, AnalyzerError, AnalyzerKind};
use crate::audit::result::{Grade, SecuritySection};

const EXPECTED_HEADERS: &[(&str, u32)] = &[
    ("content-security-policy", 20),
    ("strict-transport-security", 20),
    ("x-content-type-options", 15),
    ("x-frame-options", 15),
    ("referrer-policy", 10),
    ("permissions-policy", 10),
];

pub async fn analyze(
    url: &str,
    _ctx: &AnalyzerContext,
) -> Result<SecuritySection, AnalyzerError> {
    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| AnalyzerError::new(AnalyzerKind::SecurityHeaders, e.to_string()))?;

    let response = client
        .head(url)
        .send()
        .await
        .map_err(|e| AnalyzerError::new(AnalyzerKind::SecurityHeaders, e.to_string()))?;

    let headers = response.headers();
    let https = url.starts_with("https://");

    let mut score = 100u32;
    let mut headers_present = Vec::new();
    let mut issues = Vec::new();

    if !https {
        score = score.saturating_sub(30);
        issues.push("Site is not served over HTTPS".to_string());
    }

    for (name, penalty) in EXPECTED_HEADERS {
        if headers.contains_key(*name) {
            headers_present.push(name.to_string());
        } else {
            // HSTS only makes sense over HTTPS.
            if *name == "strict-transport-security" && !https {
                continue;
            }
            score = score.saturating_sub(*penalty);
            issues.push(format!("Missing {} header", name));
        }
    }

    debug!(
        "Security headers for {}: {} present, score {}",
        url,
        headers_present.len(),
        score
    );

    Ok(SecuritySection {
        score,
        grade: Grade::from_score(score),
        headers_present,
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_header_weights_sum_to_ninety() {
        let total: u32 = EXPECTED_HEADERS.iter().map(|(_, w)| w).sum();
        assert_eq!(total, 90);
    }
}
