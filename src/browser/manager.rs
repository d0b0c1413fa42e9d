//! Browser Manager - lifecycle of one Chrome instance
//!
//! Launches Chrome in headless mode with optimized flags, polls its CDP
//! event handler, creates pages, and answers heartbeat probes for the pool.

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::detection::{locate_chrome, ChromeBinary};
use crate::error::{AuditError, Result};

/// Browser configuration options
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Manual Chrome path override
    pub chrome_path: Option<String>,
    /// Run in headless mode (default: true)
    pub headless: bool,
    /// Disable GPU acceleration (default: true for headless)
    pub disable_gpu: bool,
    /// Disable sandbox (required for Docker/root)
    pub no_sandbox: bool,
    /// Window size for consistent viewport
    pub window_size: (u32, u32),
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            disable_gpu: true,
            no_sandbox: false, // Only enable when needed (Docker/root)
            window_size: (1920, 1080),
        }
    }
}

/// One launched Chrome instance
pub struct BrowserManager {
    browser: Browser,
    chrome: ChromeBinary,
    handler_task: JoinHandle<()>,
}

impl BrowserManager {
    /// Launch a browser with the given options
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let chrome = locate_chrome(options.chrome_path.as_deref())?;
        debug!(
            "Using Chrome from {} at {:?} (version {:?})",
            chrome.origin,
            chrome.path,
            chrome.version()
        );

        let args = Self::build_launch_args(options);
        let config = BrowserConfig::builder()
            .chrome_executable(&chrome.path)
            .args(args)
            .viewport(None)
            .build()
            .map_err(|e| AuditError::BrowserLaunchFailed { reason: e })?;

        let (browser, mut handler) =
            Browser::launch(config)
                .await
                .map_err(|e| AuditError::BrowserLaunchFailed {
                    reason: e.to_string(),
                })?;

        // The handler stream must be polled for the CDP connection to make
        // progress; it ends when the browser process dies.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
            debug!("Browser handler stream ended");
        });

        info!("Browser launched");

        Ok(Self {
            browser,
            chrome,
            handler_task,
        })
    }

    /// Build Chrome launch arguments based on options
    fn build_launch_args(options: &BrowserOptions) -> Vec<String> {
        let mut args = vec![
            if options.headless {
                "--headless".to_string()
            } else {
                "--no-headless".to_string()
            },
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-extensions".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-sync".to_string(),
            "--disable-translate".to_string(),
            "--disable-features=TranslateUI".to_string(),
            "--metrics-recording-only".to_string(),
            "--mute-audio".to_string(),
            "--disable-infobars".to_string(),
            "--disable-popup-blocking".to_string(),
            format!(
                "--window-size={},{}",
                options.window_size.0, options.window_size.1
            ),
        ];

        if options.disable_gpu {
            args.push("--disable-gpu".to_string());
            args.push("--disable-software-rasterizer".to_string());
        }

        if options.no_sandbox {
            args.push("--no-sandbox".to_string());
            args.push("--disable-setuid-sandbox".to_string());
            args.push("--disable-dev-shm-usage".to_string());
        }

        args
    }

    /// Create a fresh page (isolated navigation context)
    pub async fn new_page(&self) -> Result<Page> {
        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| AuditError::ContextLost {
                reason: format!("failed to create page: {}", e),
            })
    }

    /// Probe whether the CDP connection is still alive.
    pub async fn heartbeat(&self) -> bool {
        match tokio::time::timeout(Duration::from_secs(5), self.browser.version()).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!("Browser heartbeat failed: {}", e);
                false
            }
            Err(_) => {
                warn!("Browser heartbeat timed out");
                false
            }
        }
    }

    /// Chrome binary path
    pub fn chrome_path(&self) -> &PathBuf {
        &self.chrome.path
    }

    /// Chrome version, asked of the binary on demand
    pub fn chrome_version(&self) -> Option<String> {
        self.chrome.version()
    }

    /// Close the browser and stop the handler task.
    pub async fn close(mut self) -> Result<()> {
        debug!("Closing browser...");

        if let Ok(pages) = self.browser.pages().await {
            for page in pages {
                if let Err(e) = page.close().await {
                    debug!("Failed to close page: {}", e);
                }
            }
        }

        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        self.handler_task.abort();

        debug!("Browser closed");
        Ok(())
    }
}

impl std::fmt::Debug for BrowserManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserManager")
            .field("chrome", &self.chrome)
            .finish()
    }
}
