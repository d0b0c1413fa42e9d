//! CLI Table Output
//!
//! Human-readable terminal summary with a colored per-page table.

use colored::Colorize;
use prettytable::{format, row, Table};

use crate::audit::{PageResult, PageStatus, RunSummary};

/// Print the run summary and per-page table to the terminal.
pub fn print_summary_table(summary: &RunSummary, results: &[PageResult]) {
    println!();
    println!("{}", "═".repeat(70).cyan());
    println!("{}", "Site Audit Results".cyan().bold());
    println!("{}", "═".repeat(70).cyan());
    println!();

    println!(
        "  {} {} tested: {} passed, {} failed, {} crashed, {} skipped",
        "Pages:".bold(),
        summary.tested,
        summary.passed.to_string().green(),
        summary.failed.to_string().red(),
        summary.crashed.to_string().red(),
        summary.skipped.to_string().yellow(),
    );
    println!(
        "  {} {:.1} (Grade {})",
        "Average score:".bold(),
        summary.average_score,
        summary.overall_grade
    );
    println!(
        "  {} {} errors, {} warnings",
        "Accessibility:".bold(),
        summary.total_errors,
        summary.total_warnings
    );
    println!(
        "  {} {} ms ({:.1} pages/min, peak {:.0} MB)",
        "Duration:".bold(),
        summary.duration_ms,
        summary.pages_per_minute,
        summary.peak_memory_mb
    );
    println!();

    if results.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(row![b => "URL", "Status", "Score", "A11y", "Perf", "SEO", "Mobile"]);

    for result in results {
        let status = match result.status {
            PageStatus::Passed => "passed".green().to_string(),
            PageStatus::Failed => "failed".red().to_string(),
            PageStatus::Crashed => "crashed".red().bold().to_string(),
            PageStatus::Skipped => "skipped".yellow().to_string(),
        };
        table.add_row(row![
            truncate(&result.url, 48),
            status,
            format!("{} ({})", result.overall_score, result.overall_grade),
            result.accessibility.score,
            result.performance.score,
            result.seo.score,
            result.mobile.overall_score,
        ]);
    }

    table.printstd();
    println!();
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max.saturating_sub(3)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        let long = "a".repeat(60);
        let truncated = truncate(&long, 48);
        assert_eq!(truncated.len(), 48);
        assert!(truncated.ends_with("..."));
    }
}
