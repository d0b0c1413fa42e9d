//! CSV Report Sink
//!
//! One row per page with the scores reports most often get imported for.

use crate::audit::PageResult;

const HEADER: &str = "url,status,duration_ms,overall_score,overall_grade,accessibility_score,wcag_level,errors,warnings,performance_score,lcp_ms,fcp_ms,cls,ttfb_ms,seo_score,content_weight_score,total_bytes,mobile_score\n";

/// Render the per-page CSV.
pub fn format_csv(results: &[PageResult]) -> String {
    let mut out = String::with_capacity(HEADER.len() + results.len() * 128);
    out.push_str(HEADER);

    for result in results {
        let vitals = &result.performance.core_web_vitals;
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{:.0},{:.0},{:.3},{:.0},{},{},{},{}\n",
            escape(&result.url),
            result.status,
            result.duration_ms,
            result.overall_score,
            result.overall_grade,
            result.accessibility.score,
            result.accessibility.wcag_level,
            result.accessibility.errors.len(),
            result.accessibility.warnings.len(),
            result.performance.score,
            vitals.lcp_ms,
            vitals.fcp_ms,
            vitals.cls,
            vitals.ttfb_ms,
            result.seo.score,
            result.content_weight.score,
            result.content_weight.resources.total_size,
            result.mobile.overall_score,
        ));
    }

    out
}

/// Quote a field when it contains CSV metacharacters.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::ResultFactory;

    #[test]
    fn test_csv_header_and_rows() {
        let results = vec![
            ResultFactory::crashed("https://example.com/a", 10, "x"),
            ResultFactory::crashed("https://example.com/b", 20, "y"),
        ];
        let csv = format_csv(&results);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("url,status,duration_ms"));
        assert!(lines[1].starts_with("https://example.com/a,crashed,10"));
    }

    #[test]
    fn test_escape_comma_field() {
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
