//! Audit Pipeline - top-level driver
//!
//! sitemap discovery → URL list → optional pre-filter pass → full queue
//! processing → summary aggregation. Report sinks receive the finished
//! `(summary, results)` pair from the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tracing::{info, warn};

use super::orchestrator::{self, OrchestratorOptions};
use super::result::{PageResult, PageStatus, ResultFactory};
use super::sitemap;
use super::summary::RunSummary;
use crate::analyzers::{AnalyzerContext, AnalyzerKind, PerformanceBudgets};
use crate::backpressure::{BackpressureConfig, BackpressureController};
use crate::browser::{BrowserOptions, BrowserPool, PoolConfig};
use crate::cli::Args;
use crate::error::{ErrorKind, Result};
use crate::queue::{
    AuditQueue, PriorityTable, QueueConfig, QueueEvent, UrlProcessor,
};
use crate::redirect::{RedirectDecision, RedirectDetector};

/// Post-load window in which client-side redirects are still attributed
/// to the navigation.
const CLIENT_REDIRECT_WINDOW: Duration = Duration::from_millis(500);

/// Pipeline configuration for one run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub sitemap_url: String,
    pub max_pages: usize,
    pub concurrency: usize,
    pub navigation_timeout: Duration,
    pub skip_redirects: bool,
    pub prefilter: bool,
    pub max_retries: u32,
    pub browser_options: BrowserOptions,
    pub backpressure: BackpressureConfig,
    pub orchestrator: OrchestratorOptions,
}

impl From<&Args> for PipelineOptions {
    fn from(args: &Args) -> Self {
        let mut enabled = vec![AnalyzerKind::Accessibility];
        if !args.no_performance {
            enabled.push(AnalyzerKind::Performance);
        }
        if !args.no_seo {
            enabled.push(AnalyzerKind::Seo);
        }
        if !args.no_content_weight {
            enabled.push(AnalyzerKind::ContentWeight);
        }
        if !args.no_mobile {
            enabled.push(AnalyzerKind::Mobile);
        }
        if args.comprehensive {
            enabled.push(AnalyzerKind::SecurityHeaders);
            enabled.push(AnalyzerKind::StructuredData);
        }

        let budgets = PerformanceBudgets::from_template(args.budget).with_overrides(
            args.lcp, args.cls, args.fcp, args.ttfb,
        );

        let mut orchestrator = OrchestratorOptions {
            enabled,
            context: AnalyzerContext {
                wcag_level: args.standard.wcag_level(),
                budgets,
            },
            ..Default::default()
        };
        if args.comprehensive {
            orchestrator.total_timeout = Duration::from_secs(90);
            orchestrator.analyzer_timeout = Duration::from_secs(20);
        }

        Self {
            sitemap_url: args.sitemap.clone(),
            max_pages: args.max_pages,
            concurrency: args.effective_concurrency(),
            navigation_timeout: Duration::from_millis(args.timeout_ms),
            skip_redirects: !args.follow_redirects,
            prefilter: args.prefilter,
            max_retries: args.max_retries,
            browser_options: BrowserOptions {
                chrome_path: args.chrome_path.clone(),
                no_sandbox: args.no_sandbox,
                ..Default::default()
            },
            backpressure: if args.backpressure_enabled() {
                BackpressureConfig::default()
            } else {
                BackpressureConfig::disabled()
            },
            orchestrator,
        }
    }
}

/// Completed run handed to the report sinks
#[derive(Debug)]
pub struct AuditOutcome {
    pub summary: RunSummary,
    pub results: Vec<PageResult>,
    /// URLs the sitemap listed (before max-pages capping)
    pub discovered: usize,
}

/// Queue event hook for progress reporting.
pub type ProgressHook = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

/// Run a complete audit.
pub async fn run(options: PipelineOptions, progress: Option<ProgressHook>) -> Result<AuditOutcome> {
    let discovered = sitemap::discover(&options.sitemap_url).await?;
    let discovered_count = discovered.urls.len();

    let mut urls = discovered.urls;
    if options.max_pages > 0 && urls.len() > options.max_pages {
        info!("Capping {} discovered URLs to {}", urls.len(), options.max_pages);
        urls.truncate(options.max_pages);
    }

    if urls.is_empty() {
        info!("Sitemap contained no URLs; nothing to audit");
        return Ok(AuditOutcome {
            summary: RunSummary::from_results(&[], 0, 0.0),
            results: Vec::new(),
            discovered: 0,
        });
    }

    let run_start = Instant::now();
    let table = PriorityTable;

    let controller = Arc::new(BackpressureController::new(options.backpressure.clone()));
    let sampler = controller.spawn_sampler();

    // User abort (Ctrl-C): stop dispatching, let in-flight pages finish,
    // report the partial summary.
    let cancelled = Arc::new(AtomicBool::new(false));
    let cancel_task = {
        let flag = Arc::clone(&cancelled);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Cancellation requested; draining in-flight pages");
                flag.store(true, Ordering::SeqCst);
            }
        })
    };

    let contexts_per_browser = 4;
    let pool = Arc::new(BrowserPool::new(PoolConfig {
        max_browsers: options.concurrency.div_ceil(contexts_per_browser).max(1),
        max_contexts_per_browser: contexts_per_browser,
        max_concurrent: options.concurrency,
        browser_options: options.browser_options.clone(),
        acquire_timeout_secs: 60,
    })?);

    let mut results: Vec<PageResult> = Vec::new();

    // Pre-filter: cheap navigations that weed out redirecting URLs before
    // the expensive analyzer pass.
    let full_pass_urls = if options.prefilter {
        let probe_timeout = options.navigation_timeout.min(Duration::from_secs(10));
        let processor = Arc::new(PageProcessor {
            pool: Arc::clone(&pool),
            orchestrator: options.orchestrator.clone(),
            navigation_timeout: probe_timeout,
            skip_redirects: options.skip_redirects,
            probe_only: true,
        });

        let mut queue = AuditQueue::new(QueueConfig {
            max_concurrent: options.concurrency,
            max_retries: 0,
            ..Default::default()
        })
        .with_backpressure(Arc::clone(&controller))
        .with_cancellation(Arc::clone(&cancelled));
        queue.enqueue(&urls, &table);

        info!("Pre-filter pass over {} URLs", urls.len());
        let probe = queue.process(processor).await;

        let mut surviving = Vec::new();
        for result in probe.results {
            match result.status {
                PageStatus::Skipped => results.push(result),
                // Probe crashes are not terminal; the full pass retries
                // the URL with the real deadline.
                _ => surviving.push(result.url),
            }
        }
        info!(
            "Pre-filter dropped {} redirecting URLs, {} remain",
            results.len(),
            surviving.len()
        );
        surviving
    } else {
        urls
    };

    if !full_pass_urls.is_empty() {
        let processor = Arc::new(PageProcessor {
            pool: Arc::clone(&pool),
            orchestrator: options.orchestrator.clone(),
            navigation_timeout: options.navigation_timeout,
            skip_redirects: options.skip_redirects,
            probe_only: false,
        });

        let mut queue = AuditQueue::new(QueueConfig {
            max_concurrent: options.concurrency,
            max_retries: options.max_retries,
            ..Default::default()
        })
        .with_backpressure(Arc::clone(&controller))
        .with_cancellation(Arc::clone(&cancelled));
        if let Some(hook) = progress {
            queue.subscribe(move |event| hook(event));
        }
        queue.enqueue(&full_pass_urls, &table);

        let full = queue.process(processor).await;
        results.extend(full.results);
    }

    if let Some(task) = sampler {
        task.abort();
    }
    cancel_task.abort();
    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.close(Duration::from_secs(30)).await?,
        Err(_) => warn!("Browser pool still referenced at shutdown; skipping drain"),
    }

    let duration_ms = run_start.elapsed().as_millis() as u64;
    let summary = RunSummary::from_results(&results, duration_ms, controller.peak_rss_mb());

    info!(
        "Audit finished: {} tested ({} passed, {} failed, {} crashed, {} skipped) in {} ms",
        summary.tested,
        summary.passed,
        summary.failed,
        summary.crashed,
        summary.skipped,
        duration_ms
    );

    Ok(AuditOutcome {
        summary,
        results,
        discovered: discovered_count,
    })
}

/// Per-item execution: lease → redirect detection → navigate → analyze →
/// normalize. Shared by the pre-filter (probe_only) and full passes.
struct PageProcessor {
    pool: Arc<BrowserPool>,
    orchestrator: OrchestratorOptions,
    navigation_timeout: Duration,
    skip_redirects: bool,
    probe_only: bool,
}

impl PageProcessor {
    async fn audit_one(&self, url: &str) -> Result<PageResult> {
        let started = Instant::now();
        let lease = self.pool.acquire().await?;

        let detector = match RedirectDetector::attach(lease.page(), url).await {
            Ok(detector) => Some(detector),
            Err(e) => {
                warn!("Redirect detector could not attach for {}: {}", url, e);
                None
            }
        };

        if let Err(e) = lease.navigate(url, self.navigation_timeout).await {
            let browser_fault = e.kind() == ErrorKind::Browser;
            lease.release(!browser_fault).await;
            return Err(e);
        }

        // Give zero-delay client redirects a chance to fire before
        // classifying.
        tokio::time::sleep(CLIENT_REDIRECT_WINDOW).await;

        let decision = match &detector {
            Some(detector) => detector.evaluate(lease.page(), self.skip_redirects).await,
            None => RedirectDecision::no_redirect(url),
        };
        drop(detector);

        let duration_ms = started.elapsed().as_millis() as u64;
        if !decision.follow {
            lease.release(true).await;
            return Ok(ResultFactory::skipped(url, duration_ms, decision));
        }

        if self.probe_only {
            lease.release(true).await;
            return Ok(ResultFactory::probe_passed(url, duration_ms));
        }

        let analyses = match orchestrator::run(lease.page(), url, &self.orchestrator).await {
            Ok(analyses) => analyses,
            Err(e) => {
                // An orchestrator-level failure can leave the page wedged.
                lease.release(false).await;
                return Err(e);
            }
        };

        lease.release(true).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        let redirect = decision.is_redirect().then_some(decision);
        let result = ResultFactory::from_analyses(url, duration_ms, analyses, redirect);
        result
            .validate()
            .map_err(|reason| crate::error::AuditError::ValidationFailed {
                url: url.to_string(),
                reason,
            })?;
        Ok(result)
    }
}

impl UrlProcessor for PageProcessor {
    fn process<'a>(&'a self, url: &'a str, _attempt: u32) -> BoxFuture<'a, Result<PageResult>> {
        Box::pin(self.audit_one(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("siteaudit").chain(argv.iter().copied()))
    }

    #[test]
    fn test_options_from_default_args() {
        let options = PipelineOptions::from(&args(&["https://example.com/sitemap.xml"]));
        assert!(options.skip_redirects);
        assert_eq!(options.max_retries, 2);
        assert_eq!(options.navigation_timeout, Duration::from_secs(30));
        assert!(options
            .orchestrator
            .enabled
            .contains(&AnalyzerKind::Accessibility));
        assert!(!options
            .orchestrator
            .enabled
            .contains(&AnalyzerKind::SecurityHeaders));
    }

    #[test]
    fn test_analyzer_toggles() {
        let options = PipelineOptions::from(&args(&[
            "https://example.com/sitemap.xml",
            "--no-seo",
            "--no-mobile",
        ]));
        let enabled = &options.orchestrator.enabled;
        assert!(!enabled.contains(&AnalyzerKind::Seo));
        assert!(!enabled.contains(&AnalyzerKind::Mobile));
        assert!(enabled.contains(&AnalyzerKind::Performance));
    }

    #[test]
    fn test_comprehensive_enables_optional_analyzers() {
        let options = PipelineOptions::from(&args(&[
            "https://example.com/sitemap.xml",
            "--comprehensive",
        ]));
        assert!(options
            .orchestrator
            .enabled
            .contains(&AnalyzerKind::SecurityHeaders));
        assert_eq!(options.orchestrator.total_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_budget_overrides_reach_context() {
        let options = PipelineOptions::from(&args(&[
            "https://example.com/sitemap.xml",
            "--budget",
            "ecommerce",
            "--lcp",
            "1234",
        ]));
        assert_eq!(options.orchestrator.context.budgets.lcp_ms, 1234.0);
        assert_eq!(options.orchestrator.context.budgets.fcp_ms, 1500.0);
    }
}
