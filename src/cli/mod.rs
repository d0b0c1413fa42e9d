//! CLI module for siteaudit
//!
//! Command-line interface using clap for argument parsing, plus the
//! optional TOML config file that feeds defaults under the flags.

mod args;
mod config;

pub use args::{Args, BudgetTemplate, ReportFormat, Standard};
pub use config::FileConfig;
