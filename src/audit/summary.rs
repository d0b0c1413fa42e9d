//! Run summary aggregation
//!
//! Folds per-page results into the aggregate the report sinks consume.
//! The status counts always sum to the number of tested pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::{Grade, PageResult, PageStatus};

/// Aggregate outcome of one audit run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Pages that reached a terminal state
    pub tested: usize,
    pub passed: usize,
    pub failed: usize,
    pub crashed: usize,
    pub skipped: usize,
    /// Accessibility error total across all pages
    pub total_errors: usize,
    /// Accessibility warning total across all pages
    pub total_warnings: usize,
    /// Mean overall score of analyzed (passed/failed) pages
    pub average_score: f64,
    /// Grade derived from the average score
    pub overall_grade: Grade,
    pub duration_ms: u64,
    pub pages_per_minute: f64,
    pub peak_memory_mb: f64,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Aggregate page results. Counts are derived, never accumulated
    /// separately, so they cannot drift from the per-page data.
    pub fn from_results(results: &[PageResult], duration_ms: u64, peak_memory_mb: f64) -> Self {
        let count = |status: PageStatus| results.iter().filter(|r| r.status == status).count();
        let passed = count(PageStatus::Passed);
        let failed = count(PageStatus::Failed);
        let crashed = count(PageStatus::Crashed);
        let skipped = count(PageStatus::Skipped);

        let analyzed: Vec<&PageResult> = results
            .iter()
            .filter(|r| matches!(r.status, PageStatus::Passed | PageStatus::Failed))
            .collect();
        let average_score = if analyzed.is_empty() {
            0.0
        } else {
            analyzed.iter().map(|r| r.overall_score as f64).sum::<f64>() / analyzed.len() as f64
        };

        let pages_per_minute = if duration_ms > 0 {
            results.len() as f64 * 60_000.0 / duration_ms as f64
        } else {
            0.0
        };

        Self {
            tested: results.len(),
            passed,
            failed,
            crashed,
            skipped,
            total_errors: results.iter().map(|r| r.error_count()).sum(),
            total_warnings: results.iter().map(|r| r.warning_count()).sum(),
            average_score,
            overall_grade: Grade::from_score(average_score.round() as u32),
            duration_ms,
            pages_per_minute,
            peak_memory_mb,
            finished_at: Utc::now(),
        }
    }

    /// The count invariant every summary must satisfy.
    pub fn counts_consistent(&self) -> bool {
        self.passed + self.failed + self.crashed + self.skipped == self.tested
    }
}
