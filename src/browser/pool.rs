//! Browser Pool - bounded browsers handing out exclusive page leases
//!
//! The pool owns up to `max_browsers` Chrome instances. Workers acquire a
//! lease holding one freshly created page; a lease is never shared across
//! URLs and its page is destroyed on release. An unhealthy release also
//! tears down the owning browser, which is replaced lazily on the next
//! acquire.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chromiumoxide::Page;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::manager::{BrowserManager, BrowserOptions};
use crate::error::{AuditError, Result};

/// Configuration for the browser pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of browser instances
    pub max_browsers: usize,
    /// Maximum pages open per browser instance
    pub max_contexts_per_browser: usize,
    /// Maximum leases outstanding at once
    pub max_concurrent: usize,
    /// Browser options for all instances
    pub browser_options: BrowserOptions,
    /// Timeout for acquiring a lease from the pool
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_browsers: 2,
            max_contexts_per_browser: 4,
            max_concurrent: 4,
            browser_options: BrowserOptions::default(),
            acquire_timeout_secs: 60,
        }
    }
}

impl PoolConfig {
    /// Validate that the lease bound is actually reachable.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 || self.max_browsers == 0 {
            return Err(AuditError::ConfigError(
                "pool bounds must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent > self.max_browsers * self.max_contexts_per_browser {
            return Err(AuditError::ConfigError(format!(
                "max_concurrent {} exceeds pool capacity {}x{}",
                self.max_concurrent, self.max_browsers, self.max_contexts_per_browser
            )));
        }
        Ok(())
    }
}

struct BrowserSlot {
    id: u64,
    manager: BrowserManager,
    active_contexts: usize,
}

struct PoolInner {
    config: PoolConfig,
    semaphore: Arc<Semaphore>,
    slots: Mutex<Vec<BrowserSlot>>,
    next_browser_id: AtomicU64,
    closed: AtomicBool,
}

impl PoolInner {
    /// Destroy a lease's page and release its slot.
    ///
    /// A blank-page navigation is attempted first with a short timeout so
    /// in-flight work can settle; the page is closed regardless of the
    /// outcome. `healthy=false` also tears down the owning browser.
    async fn release_page(&self, browser_id: u64, page: Page, healthy: bool) {
        let settle_timed_out =
            match tokio::time::timeout(Duration::from_secs(5), page.goto("about:blank")).await {
                Ok(Ok(_)) => false,
                Ok(Err(e)) => {
                    debug!("Page settle navigation failed: {}", e);
                    false
                }
                Err(_) => {
                    warn!("Page settle timed out after 5 seconds");
                    true
                }
            };
        if let Err(e) = page.close().await {
            debug!("Failed to close page: {}", e);
        }

        let mut slots = self.slots.lock().await;
        if let Some(pos) = slots.iter().position(|s| s.id == browser_id) {
            slots[pos].active_contexts = slots[pos].active_contexts.saturating_sub(1);
            if !healthy || settle_timed_out {
                let slot = slots.remove(pos);
                drop(slots);
                warn!("Tearing down unhealthy browser #{}", browser_id);
                let _ = slot.manager.close().await;
            }
        }
    }
}

/// A lease on one exclusive page within a pooled browser.
///
/// Must be released via [`BrowserLease::release`]; dropping it unreleased
/// still destroys the page on a background task.
pub struct BrowserLease {
    page: Option<Page>,
    browser_id: u64,
    acquired_at: Instant,
    healthy: bool,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<PoolInner>,
}

impl BrowserLease {
    /// The leased page.
    pub fn page(&self) -> &Page {
        self.page.as_ref().expect("lease already released")
    }

    /// When the lease was acquired.
    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    /// Flag the underlying browser as broken; it is torn down on release.
    pub fn mark_unhealthy(&mut self) {
        self.healthy = false;
    }

    /// Navigate the leased page with a deadline and wait for load.
    pub async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        let page = self.page();
        tokio::time::timeout(timeout, async {
            page.goto(url)
                .await
                .map_err(|e| AuditError::NavigationFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            page.wait_for_navigation()
                .await
                .map_err(|e| AuditError::NavigationFailed {
                    url: url.to_string(),
                    reason: format!("navigation wait failed: {}", e),
                })?;
            Ok::<(), AuditError>(())
        })
        .await
        .map_err(|_| AuditError::PageLoadTimeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })??;

        debug!("Navigated to {}", url);
        Ok(())
    }

    /// Release the lease, destroying its page. `healthy=false` (or a prior
    /// [`mark_unhealthy`](Self::mark_unhealthy)) also replaces the browser.
    pub async fn release(mut self, healthy: bool) {
        let healthy = healthy && self.healthy;
        if let Some(page) = self.page.take() {
            self.pool.release_page(self.browser_id, page, healthy).await;
        }
        drop(self.permit.take());
    }
}

impl Drop for BrowserLease {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            let pool = Arc::clone(&self.pool);
            let browser_id = self.browser_id;
            let healthy = self.healthy;
            let permit = self.permit.take();
            tokio::spawn(async move {
                pool.release_page(browser_id, page, healthy).await;
                drop(permit);
            });
        }
    }
}

/// Browser Pool - manages bounded browsers for concurrent page leases
pub struct BrowserPool {
    inner: Arc<PoolInner>,
}

impl BrowserPool {
    /// Create a new pool. Browsers are launched lazily on first acquire.
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Creating browser pool: {} browsers x {} contexts, {} concurrent leases",
            config.max_browsers, config.max_contexts_per_browser, config.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                semaphore,
                slots: Mutex::new(Vec::new()),
                next_browser_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Acquire a lease, blocking until one is available or the acquire
    /// timeout elapses.
    pub async fn acquire(&self) -> Result<BrowserLease> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(AuditError::PoolClosed);
        }

        let timeout = Duration::from_secs(self.inner.config.acquire_timeout_secs);
        let permit = tokio::time::timeout(
            timeout,
            Arc::clone(&self.inner.semaphore).acquire_owned(),
        )
        .await
        .map_err(|_| AuditError::PoolTimeout {
            timeout_secs: self.inner.config.acquire_timeout_secs,
        })?
        .map_err(|_| AuditError::PoolClosed)?;

        let mut slots = self.inner.slots.lock().await;

        // Drop browsers whose CDP connection died since the last acquire.
        let mut idx = 0;
        while idx < slots.len() {
            if slots[idx].active_contexts == 0 && !slots[idx].manager.heartbeat().await {
                let slot = slots.remove(idx);
                warn!("Replacing dead browser #{}", slot.id);
                let _ = slot.manager.close().await;
            } else {
                idx += 1;
            }
        }

        // Prefer an existing browser with context capacity.
        let max_contexts = self.inner.config.max_contexts_per_browser;
        let slot_idx = slots.iter().position(|s| s.active_contexts < max_contexts);
        let slot_idx = match slot_idx {
            Some(i) => i,
            None => {
                if slots.len() >= self.inner.config.max_browsers {
                    // Unreachable while the semaphore bound holds; surfaced
                    // rather than waited on so misconfiguration is loud.
                    return Err(AuditError::ResourceExhausted {
                        reason: "no browser has context capacity".to_string(),
                    });
                }
                let manager = BrowserManager::launch(&self.inner.config.browser_options).await?;
                let id = self.inner.next_browser_id.fetch_add(1, Ordering::SeqCst);
                debug!("Launched browser #{} ({}/{})", id, slots.len() + 1, self.inner.config.max_browsers);
                slots.push(BrowserSlot {
                    id,
                    manager,
                    active_contexts: 0,
                });
                slots.len() - 1
            }
        };

        // Context creation failure: retry once, then replace the browser
        // and surface the error.
        let page = match slots[slot_idx].manager.new_page().await {
            Ok(page) => page,
            Err(first) => {
                debug!("Context creation failed, retrying once: {}", first);
                match slots[slot_idx].manager.new_page().await {
                    Ok(page) => page,
                    Err(second) => {
                        let slot = slots.remove(slot_idx);
                        let _ = slot.manager.close().await;
                        return Err(second);
                    }
                }
            }
        };

        slots[slot_idx].active_contexts += 1;
        let browser_id = slots[slot_idx].id;
        drop(slots);

        Ok(BrowserLease {
            page: Some(page),
            browser_id,
            acquired_at: Instant::now(),
            healthy: true,
            permit: Some(permit),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Current pool statistics.
    pub async fn stats(&self) -> PoolStats {
        let slots = self.inner.slots.lock().await;
        PoolStats {
            browsers: slots.len(),
            max_browsers: self.inner.config.max_browsers,
            active_leases: self.inner.config.max_concurrent
                - self.inner.semaphore.available_permits(),
            max_concurrent: self.inner.config.max_concurrent,
        }
    }

    /// Close the pool: wait for outstanding leases up to `drain`, then
    /// force-close every browser.
    pub async fn close(self, drain: Duration) -> Result<()> {
        info!("Closing browser pool...");
        self.inner.closed.store(true, Ordering::SeqCst);

        // Draining means re-collecting every permit.
        let all = self.inner.config.max_concurrent as u32;
        match tokio::time::timeout(drain, self.inner.semaphore.acquire_many(all)).await {
            Ok(Ok(permits)) => drop(permits),
            Ok(Err(_)) => {}
            Err(_) => warn!("Pool drain timed out; force-closing browsers"),
        }

        let mut slots = self.inner.slots.lock().await;
        for slot in slots.drain(..) {
            if let Err(e) = slot.manager.close().await {
                warn!("Failed to close browser #{}: {}", slot.id, e);
            }
        }

        info!("Browser pool closed");
        Ok(())
    }
}

/// Pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Live browser instances
    pub browsers: usize,
    /// Maximum browser instances
    pub max_browsers: usize,
    /// Leases currently outstanding
    pub active_leases: usize,
    /// Maximum concurrent leases
    pub max_concurrent: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool: {}/{} browsers, {}/{} leases",
            self.browsers, self.max_browsers, self.active_leases, self.max_concurrent
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_default() {
        let config = PoolConfig::default();
        assert_eq!(config.max_browsers, 2);
        assert_eq!(config.max_concurrent, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_config_rejects_unreachable_bound() {
        let config = PoolConfig {
            max_browsers: 1,
            max_contexts_per_browser: 2,
            max_concurrent: 4,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pool_config_rejects_zero() {
        let config = PoolConfig {
            max_concurrent: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pool_stats_display() {
        let stats = PoolStats {
            browsers: 1,
            max_browsers: 2,
            active_leases: 3,
            max_concurrent: 4,
        };
        let display = format!("{}", stats);
        assert!(display.contains("1/2 browsers"));
        assert!(display.contains("3/4 leases"));
    }
}
