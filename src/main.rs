//! siteaudit CLI entry point

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use siteaudit::audit::{self, AuditOutcome, PipelineOptions};
use siteaudit::cli::{Args, FileConfig};
use siteaudit::error::{AuditError, Result};
use siteaudit::output::{print_summary_table, write_reports};
use siteaudit::queue::QueueEvent;

/// Exit codes: 0 success, 1 configuration error, 2 no pages could be
/// tested, 3 strict-mode invariant violation.
const EXIT_CONFIG: u8 = 1;
const EXIT_NO_PAGES: u8 = 2;
const EXIT_INVARIANT: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let mut args = Args::parse();

    if let Some(path) = args.config.clone() {
        match FileConfig::load(&path) {
            Ok(config) => config.apply(&mut args),
            Err(e) => {
                eprintln!("{} {}", "Error:".red().bold(), e);
                return ExitCode::from(EXIT_CONFIG);
            }
        }
    }

    if let Err(reason) = args.validate() {
        eprintln!("{} {}", "Error:".red().bold(), reason);
        return ExitCode::from(EXIT_CONFIG);
    }

    setup_logging(&args);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("{} {}", "Error:".red().bold(), e);
            let code = match e {
                AuditError::ConfigError(_) | AuditError::InvalidUrl { .. } => EXIT_CONFIG,
                _ => EXIT_NO_PAGES,
            };
            ExitCode::from(code)
        }
    }
}

fn setup_logging(args: &Args) {
    let default_level = if args.quiet {
        "error"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("siteaudit={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

async fn run(args: Args) -> Result<ExitCode> {
    if !args.quiet {
        print_banner();
        println!(
            "{} {} ({}, {} workers)",
            "Auditing:".cyan().bold(),
            args.sitemap,
            args.standard,
            args.effective_concurrency()
        );
        println!();
    }

    let options = PipelineOptions::from(&args);

    // Progress bar driven by queue events; length set on first snapshot.
    let progress_bar = if args.quiet {
        None
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .expect("Invalid progress template")
                .progress_chars("#>-"),
        );
        Some(pb)
    };

    let hook = progress_bar.clone().map(|pb| {
        Arc::new(move |event: &QueueEvent| match event {
            QueueEvent::Started { url, .. } => {
                pb.set_message(truncate(url, 50));
            }
            QueueEvent::Progress(snapshot) => {
                pb.set_length(snapshot.total as u64);
                pb.set_position(snapshot.completed as u64);
            }
            _ => {}
        }) as Arc<dyn Fn(&QueueEvent) + Send + Sync>
    });

    let outcome = audit::run(options, hook).await?;

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    // Empty sitemap is a successful no-op; discovered URLs with nothing
    // tested means the engine never got off the ground.
    if outcome.discovered > 0 && outcome.summary.tested == 0 {
        eprintln!(
            "{} no pages could be tested ({} URLs discovered)",
            "Error:".red().bold(),
            outcome.discovered
        );
        return Ok(ExitCode::from(EXIT_NO_PAGES));
    }

    if !args.quiet {
        print_summary_table(&outcome.summary, &outcome.results);
    }

    let written = write_reports(
        &args.output_dir,
        &args.formats,
        &outcome.summary,
        &outcome.results,
    )?;
    for path in &written {
        info!("Report written: {}", path.display());
        if !args.quiet {
            println!("{} {}", "Report:".green().bold(), path.display());
        }
    }

    if args.strict {
        if let Err(violation) = check_invariants(&outcome) {
            eprintln!(
                "{} result invariants violated: {}",
                "Error:".red().bold(),
                violation
            );
            return Ok(ExitCode::from(EXIT_INVARIANT));
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Strict-mode verification of the finished run.
fn check_invariants(outcome: &AuditOutcome) -> std::result::Result<(), String> {
    if !outcome.summary.counts_consistent() {
        return Err("summary status counts do not sum to tested".to_string());
    }
    for result in &outcome.results {
        result
            .validate()
            .map_err(|reason| format!("{}: {}", result.url, reason))?;
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max.saturating_sub(3)])
    }
}

fn print_banner() {
    println!();
    println!(
        "{}",
        r#"
      _ _                         _ _ _
  ___(_) |_ ___  __ _ _   _  __| (_) |_
 / __| | __/ _ \/ _` | | | |/ _` | | __|
 \__ \ | ||  __/ (_| | |_| | (_| | | |_
 |___/_|\__\___|\__,_|\__,_|\__,_|_|\__|
"#
        .cyan()
    );
    println!(
        "  {} v{} - Site-wide web quality auditor",
        "siteaudit".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();
}
