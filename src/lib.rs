//! siteaudit - Site-wide web quality auditor
//!
//! Drives a pool of headless Chrome instances across every URL discovered
//! in a site's sitemap and audits each page for accessibility (WCAG 2.1),
//! Core Web Vitals, SEO, content weight and mobile-friendliness, producing
//! strict, schema-complete results for the report sinks.
//!
//! ## Quick Start
//!
//! ```no_run
//! use siteaudit::audit::{self, PipelineOptions};
//! use siteaudit::cli::Args;
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = Args::parse_from(["siteaudit", "https://example.com/sitemap.xml"]);
//!     let outcome = audit::run(PipelineOptions::from(&args), None).await?;
//!
//!     println!("{} pages tested, average score {:.0}",
//!         outcome.summary.tested, outcome.summary.average_score);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`browser`]: Chrome detection, launch, and the lease-based pool
//! - [`redirect`]: redirect classification and the skip policy
//! - [`accessibility`]: accessibility tree extraction
//! - [`wcag`]: WCAG rule engine
//! - [`analyzers`]: the per-page analyzer set
//! - [`audit`]: orchestrator, result factory, pipeline, summary
//! - [`queue`]: URL queue and worker pool
//! - [`backpressure`]: adaptive dispatch pacing
//! - [`output`]: report sinks (JSON, HTML, Markdown, CSV)
//! - [`cli`]: command-line surface
//! - [`error`]: error taxonomy

pub mod accessibility;
pub mod analyzers;
pub mod audit;
pub mod backpressure;
pub mod browser;
pub mod cli;
pub mod error;
pub mod output;
pub mod queue;
pub mod redirect;
pub mod wcag;

// Re-export commonly used types
pub use analyzers::{AnalyzerContext, AnalyzerError, AnalyzerKind, PerformanceBudgets};
pub use audit::{
    AuditOutcome, Grade, PageResult, PageStatus, PipelineOptions, ResultFactory, RunSummary,
};
pub use backpressure::{BackpressureConfig, BackpressureController};
pub use browser::{BrowserLease, BrowserManager, BrowserOptions, BrowserPool, PoolConfig};
pub use cli::{Args, ReportFormat, Standard};
pub use error::{AuditError, ErrorKind, Result};
pub use queue::{AuditQueue, PriorityTable, QueueConfig, QueueEvent, WorkItem, WorkStatus};
pub use redirect::{RedirectClassification, RedirectDecision, RedirectDetector};
pub use wcag::{ConformanceLevel, Issue, IssueType, WcagLevel};
