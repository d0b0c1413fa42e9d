//! Analysis Orchestrator - runs the analyzer set against one page
//!
//! Analyzers execute in deterministic order with bounded concurrency
//! inside the page, each under its own sub-timeout, all under a combined
//! deadline. An analyzer failure never cancels its siblings unless
//! fail-fast is requested.

use std::future::Future;
use std::time::Duration;

use chromiumoxide::Page;
use futures::StreamExt;
use tracing::{debug, warn};

use super::result::PageAnalyses;
use crate::analyzers::{
    self, AnalyzerContext, AnalyzerError, AnalyzerKind,
};
use crate::error::{AuditError, Result};

/// How many analyzers may run concurrently against one page handle.
const IN_PAGE_CONCURRENCY: usize = 2;

/// Orchestrator configuration for one page run
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Analyzers to run; executed in [`AnalyzerKind`] order
    pub enabled: Vec<AnalyzerKind>,
    /// Combined deadline for the whole analysis
    pub total_timeout: Duration,
    /// Per-analyzer sub-timeout
    pub analyzer_timeout: Duration,
    /// Abort remaining analyzers on the first error
    pub fail_fast: bool,
    /// Shared analyzer inputs
    pub context: AnalyzerContext,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            enabled: vec![
                AnalyzerKind::Accessibility,
                AnalyzerKind::Performance,
                AnalyzerKind::Seo,
                AnalyzerKind::ContentWeight,
                AnalyzerKind::Mobile,
            ],
            total_timeout: Duration::from_secs(30),
            analyzer_timeout: Duration::from_secs(10),
            fail_fast: false,
            context: AnalyzerContext::default(),
        }
    }
}

/// Run the configured analyzers for one loaded page.
///
/// Returns `Err` only when the orchestrator itself failed (combined
/// deadline exceeded, page handle unusable); individual analyzer failures
/// land in their slots.
pub async fn run(page: &Page, url: &str, options: &OrchestratorOptions) -> Result<PageAnalyses> {
    let mut enabled = options.enabled.clone();
    enabled.sort();
    enabled.dedup();

    tokio::time::timeout(options.total_timeout, run_inner(page, url, &enabled, options))
        .await
        .map_err(|_| AuditError::OperationTimeout {
            operation: format!("analysis of {}", url),
            timeout_ms: options.total_timeout.as_millis() as u64,
        })
}

async fn run_inner(
    page: &Page,
    url: &str,
    enabled: &[AnalyzerKind],
    options: &OrchestratorOptions,
) -> PageAnalyses {
    let mut analyses = PageAnalyses {
        title: page
            .get_title()
            .await
            .ok()
            .flatten()
            .unwrap_or_default(),
        ..Default::default()
    };

    let sub_timeout = options.analyzer_timeout;
    let ctx = &options.context;

    let mut stream = futures::stream::iter(enabled.iter().copied())
        .map(|kind| run_one(kind, page, url, ctx, sub_timeout))
        .buffered(IN_PAGE_CONCURRENCY);

    let mut aborted = false;
    let mut completed: Vec<AnalyzerKind> = Vec::with_capacity(enabled.len());

    while let Some(slot) = stream.next().await {
        let (kind, failed) = slot.describe();
        completed.push(kind);
        if failed {
            warn!("Analyzer {} failed for {}", kind, url);
        }
        store(&mut analyses, slot);
        if failed && options.fail_fast {
            aborted = true;
            break;
        }
    }
    drop(stream);

    if aborted {
        for kind in enabled {
            if !completed.contains(kind) {
                store(
                    &mut analyses,
                    Slot::error(
                        *kind,
                        AnalyzerError::new(*kind, "aborted after earlier analyzer failure"),
                    ),
                );
            }
        }
    }

    debug!("Analysis complete for {} ({} analyzers)", url, enabled.len());
    analyses
}

/// One analyzer's outcome, tagged for slot placement.
enum Slot {
    Accessibility(std::result::Result<crate::audit::result::AccessibilitySection, AnalyzerError>),
    Performance(std::result::Result<crate::audit::result::PerformanceSection, AnalyzerError>),
    Seo(std::result::Result<crate::audit::result::SeoSection, AnalyzerError>),
    ContentWeight(std::result::Result<crate::audit::result::ContentWeightSection, AnalyzerError>),
    Mobile(std::result::Result<crate::audit::result::MobileSection, AnalyzerError>),
    Security(std::result::Result<crate::audit::result::SecuritySection, AnalyzerError>),
    StructuredData(
        std::result::Result<crate::audit::result::StructuredDataSection, AnalyzerError>,
    ),
}

impl Slot {
    fn error(kind: AnalyzerKind, err: AnalyzerError) -> Self {
        match kind {
            AnalyzerKind::Accessibility => Slot::Accessibility(Err(err)),
            AnalyzerKind::Performance => Slot::Performance(Err(err)),
            AnalyzerKind::Seo => Slot::Seo(Err(err)),
            AnalyzerKind::ContentWeight => Slot::ContentWeight(Err(err)),
            AnalyzerKind::Mobile => Slot::Mobile(Err(err)),
            AnalyzerKind::SecurityHeaders => Slot::Security(Err(err)),
            AnalyzerKind::StructuredData => Slot::StructuredData(Err(err)),
        }
    }

    fn describe(&self) -> (AnalyzerKind, bool) {
        match self {
            Slot::Accessibility(r) => (AnalyzerKind::Accessibility, r.is_err()),
            Slot::Performance(r) => (AnalyzerKind::Performance, r.is_err()),
            Slot::Seo(r) => (AnalyzerKind::Seo, r.is_err()),
            Slot::ContentWeight(r) => (AnalyzerKind::ContentWeight, r.is_err()),
            Slot::Mobile(r) => (AnalyzerKind::Mobile, r.is_err()),
            Slot::Security(r) => (AnalyzerKind::SecurityHeaders, r.is_err()),
            Slot::StructuredData(r) => (AnalyzerKind::StructuredData, r.is_err()),
        }
    }
}

fn store(analyses: &mut PageAnalyses, slot: Slot) {
    match slot {
        Slot::Accessibility(r) => analyses.accessibility = Some(r),
        Slot::Performance(r) => analyses.performance = Some(r),
        Slot::Seo(r) => analyses.seo = Some(r),
        Slot::ContentWeight(r) => analyses.content_weight = Some(r),
        Slot::Mobile(r) => analyses.mobile = Some(r),
        Slot::Security(r) => analyses.security = Some(r),
        Slot::StructuredData(r) => analyses.structured_data = Some(r),
    }
}

async fn run_one(
    kind: AnalyzerKind,
    page: &Page,
    url: &str,
    ctx: &AnalyzerContext,
    sub_timeout: Duration,
) -> Slot {
    match kind {
        AnalyzerKind::Accessibility => Slot::Accessibility(
            with_timeout(kind, sub_timeout, analyzers::accessibility::analyze(page, url, ctx))
                .await,
        ),
        AnalyzerKind::Performance => Slot::Performance(
            with_timeout(kind, sub_timeout, analyzers::vitals::analyze(page, url, ctx)).await,
        ),
        AnalyzerKind::Seo => Slot::Seo(
            with_timeout(kind, sub_timeout, analyzers::seo::analyze(page, url, ctx)).await,
        ),
        AnalyzerKind::ContentWeight => Slot::ContentWeight(
            with_timeout(
                kind,
                sub_timeout,
                analyzers::content_weight::analyze(page, url, ctx),
            )
            .await,
        ),
        AnalyzerKind::Mobile => Slot::Mobile(
            with_timeout(kind, sub_timeout, analyzers::mobile::analyze(page, url, ctx)).await,
        ),
        AnalyzerKind::SecurityHeaders => Slot::Security(
            with_timeout(kind, sub_timeout, analyzers::security::analyze(url, ctx)).await,
        ),
        AnalyzerKind::StructuredData => Slot::StructuredData(
            with_timeout(
                kind,
                sub_timeout,
                analyzers::structured_data::analyze(page, url, ctx),
            )
            .await,
        ),
    }
}

async fn with_timeout<T, F>(
    kind: AnalyzerKind,
    duration: Duration,
    future: F,
) -> std::result::Result<T, AnalyzerError>
where
    F: Future<Output = std::result::Result<T, AnalyzerError>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(AnalyzerError::timeout(kind, duration.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_exclude_optional_analyzers() {
        let options = OrchestratorOptions::default();
        assert!(!options.enabled.contains(&AnalyzerKind::SecurityHeaders));
        assert!(!options.enabled.contains(&AnalyzerKind::StructuredData));
        assert_eq!(options.total_timeout, Duration::from_secs(30));
        assert!(!options.fail_fast);
    }

    #[tokio::test]
    async fn test_with_timeout_converts_elapsed() {
        let result: std::result::Result<(), AnalyzerError> = with_timeout(
            AnalyzerKind::Seo,
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;
        let err = result.unwrap_err();
        assert!(err.timed_out);
        assert_eq!(err.analyzer, AnalyzerKind::Seo);
    }
}
