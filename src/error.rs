//! Error types for siteaudit
//!
//! Centralized error handling using thiserror for derive macros
//! and anyhow for error context propagation at the binary edge.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the siteaudit engine
#[derive(Debug, Error)]
pub enum AuditError {
    /// Chrome/Chromium browser not found on the system
    #[error("no Chrome or Chromium binary could be located on this system; install one through your package manager, or point siteaudit at an existing binary with --chrome-path or the CHROME_PATH environment variable")]
    ChromeNotFound,

    /// Chrome binary exists but is not executable
    #[error("the browser binary at '{path}' exists but this user cannot execute it")]
    ChromeNotExecutable { path: PathBuf },

    /// Browser failed to launch
    #[error("the headless browser would not start: {reason}")]
    BrowserLaunchFailed { reason: String },

    /// Browser process or CDP connection died
    #[error("Browser crashed or connection lost: {reason}")]
    BrowserCrashed { reason: String },

    /// The page context backing a lease is gone
    #[error("Browser context lost: {reason}")]
    ContextLost { reason: String },

    /// Navigation to URL failed at the network level
    #[error("navigation to '{url}' did not complete: {reason}")]
    NavigationFailed { url: String, reason: String },

    /// Page load deadline exceeded
    #[error("Page load timeout for '{url}' after {timeout_ms} ms")]
    PageLoadTimeout { url: String, timeout_ms: u64 },

    /// In-page evaluation or analyzer deadline exceeded
    #[error("Operation '{operation}' timed out after {timeout_ms} ms")]
    OperationTimeout { operation: String, timeout_ms: u64 },

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Sitemap fetch or parse failed
    #[error("Failed to parse sitemap from '{url}': {reason}")]
    SitemapParseFailed { url: String, reason: String },

    /// File read/write error
    #[error("File operation failed for '{path}': {reason}")]
    FileError { path: PathBuf, reason: String },

    /// Configuration error (CLI flags, config file)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Result normalization produced an invalid shape
    #[error("Result validation failed for '{url}': {reason}")]
    ValidationFailed { url: String, reason: String },

    /// CDP (Chrome DevTools Protocol) error
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Host resources exhausted (pool cannot grow, backpressure critical)
    #[error("Resource exhausted: {reason}")]
    ResourceExhausted { reason: String },

    /// Browser pool timeout
    #[error("Browser pool timeout: no lease available after {timeout_secs} seconds")]
    PoolTimeout { timeout_secs: u64 },

    /// Browser pool closed
    #[error("Browser pool has been closed")]
    PoolClosed,

    /// Report generation failed
    #[error("Failed to generate report: {reason}")]
    ReportGenerationFailed { reason: String },

    /// Output formatting/writing failed
    #[error("Output error: {reason}")]
    OutputError { reason: String },

    /// Generic IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Anything that fits nowhere else
    #[error("Unexpected error: {0}")]
    Unknown(String),
}

/// Coarse failure categories used by the retry policy and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Browser,
    Parsing,
    Validation,
    Resource,
    Timeout,
    Permission,
    Configuration,
    Unknown,
}

impl AuditError {
    /// Map this error onto the coarse taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuditError::NavigationFailed { .. } | AuditError::HttpError(_) => ErrorKind::Network,
            AuditError::ChromeNotFound
            | AuditError::ChromeNotExecutable { .. }
            | AuditError::BrowserLaunchFailed { .. }
            | AuditError::BrowserCrashed { .. }
            | AuditError::ContextLost { .. }
            | AuditError::CdpError(_)
            | AuditError::PoolClosed => ErrorKind::Browser,
            AuditError::SitemapParseFailed { .. }
            | AuditError::JsonError(_)
            | AuditError::UrlParseError(_)
            | AuditError::InvalidUrl { .. } => ErrorKind::Parsing,
            AuditError::ValidationFailed { .. } => ErrorKind::Validation,
            AuditError::ResourceExhausted { .. } | AuditError::PoolTimeout { .. } => {
                ErrorKind::Resource
            }
            AuditError::PageLoadTimeout { .. } | AuditError::OperationTimeout { .. } => {
                ErrorKind::Timeout
            }
            AuditError::IoError(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                ErrorKind::Permission
            }
            AuditError::ConfigError(_) => ErrorKind::Configuration,
            AuditError::FileError { .. } | AuditError::IoError(_) => ErrorKind::Unknown,
            AuditError::ReportGenerationFailed { .. } | AuditError::OutputError { .. } => {
                ErrorKind::Unknown
            }
            AuditError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Whether a worker may retry the item after this error.
    ///
    /// Only network failures, deadline overruns and browser crashes are
    /// transient; parse and validation failures are terminal for the item.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::Browser
        ) && !matches!(
            self,
            AuditError::ChromeNotFound
                | AuditError::ChromeNotExecutable { .. }
                | AuditError::BrowserLaunchFailed { .. }
                | AuditError::PoolClosed
        )
    }
}

/// Result type alias for AuditError
pub type Result<T> = std::result::Result<T, AuditError>;

impl From<chromiumoxide::error::CdpError> for AuditError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AuditError::CdpError(err.to_string())
    }
}
