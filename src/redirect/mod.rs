//! Redirect detection and skip policy
//!
//! Observes the navigation of a page (HTTP status chain via CDP network
//! events, meta refresh tags, late client-side URL changes) and decides
//! whether an audited URL should be skipped because it no longer serves
//! content at its sitemap address.
//!
//! Detector failures never fail an audit: any internal error degrades to a
//! "no redirect" decision with a warning.

use std::sync::{Arc, Mutex};

use chromiumoxide::cdp::browser_protocol::network::{
    self, EventRequestWillBeSent, EventResponseReceived, ResourceType,
};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::error::Result;

/// How a page redirected away from its original URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectClassification {
    /// No redirect observed
    None,
    /// One or more HTTP 3xx responses
    HttpRedirect,
    /// `<meta http-equiv="refresh">` with zero delay
    MetaRefresh,
    /// URL changed client-side shortly after load
    ClientScript,
}

/// The outcome of redirect evaluation for one navigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectDecision {
    /// URL the worker was asked to audit
    pub original_url: String,
    /// URL the page ended up on
    pub final_url: String,
    /// What kind of redirect was observed
    pub classification: RedirectClassification,
    /// HTTP status chain for document responses, in order
    pub status_chain: Vec<u16>,
    /// Whether the worker should proceed with analysis
    pub follow: bool,
}

impl RedirectDecision {
    /// A decision that lets the audit proceed untouched.
    pub fn no_redirect(url: &str) -> Self {
        Self {
            original_url: url.to_string(),
            final_url: url.to_string(),
            classification: RedirectClassification::None,
            status_chain: Vec::new(),
            follow: true,
        }
    }

    pub fn is_redirect(&self) -> bool {
        self.classification != RedirectClassification::None
    }
}

/// Compare two URLs ignoring trivial differences.
///
/// The one trivial-normalization rule: lowercase host, `http` mapped to
/// `https`, default port dropped, and a single trailing slash trimmed from
/// the path. Everything else (host, path, query changes) is non-trivial.
pub fn is_trivial_change(original: &str, final_url: &str) -> bool {
    match (normalize(original), normalize(final_url)) {
        (Some(a), Some(b)) => a == b,
        _ => original == final_url,
    }
}

fn normalize(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    if url.scheme() == "http" {
        let _ = url.set_scheme("https");
    }
    let _ = url.set_port(None);
    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }
    Some(url.to_string())
}

/// Observes a page's navigation for redirects.
///
/// Attach before navigating; evaluate after the load settles.
pub struct RedirectDetector {
    original_url: String,
    status_chain: Arc<Mutex<Vec<u16>>>,
    listener_tasks: Vec<JoinHandle<()>>,
}

impl RedirectDetector {
    /// Subscribe to the page's network events. Must run before `goto`.
    pub async fn attach(page: &Page, url: &str) -> Result<Self> {
        page.execute(network::EnableParams::default()).await?;

        let status_chain = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = Vec::with_capacity(2);

        // 3xx hops surface as requestWillBeSent events carrying the
        // redirecting response.
        let mut redirects = page.event_listener::<EventRequestWillBeSent>().await?;
        let chain = Arc::clone(&status_chain);
        tasks.push(tokio::spawn(async move {
            while let Some(event) = redirects.next().await {
                if event.r#type != Some(ResourceType::Document) {
                    continue;
                }
                if let Some(ref response) = event.redirect_response {
                    chain.lock().unwrap().push(response.status as u16);
                }
            }
        }));

        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let chain = Arc::clone(&status_chain);
        tasks.push(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if event.r#type == ResourceType::Document {
                    chain.lock().unwrap().push(event.response.status as u16);
                }
            }
        }));

        Ok(Self {
            original_url: url.to_string(),
            status_chain,
            listener_tasks: tasks,
        })
    }

    /// Classify what happened to the navigation and apply the skip policy.
    ///
    /// `skip_redirects=false` keeps classification and metadata but always
    /// chooses follow.
    pub async fn evaluate(&self, page: &Page, skip_redirects: bool) -> RedirectDecision {
        let status_chain: Vec<u16> = self.status_chain.lock().unwrap().clone();

        let final_url = match page.url().await {
            Ok(Some(url)) => url,
            Ok(None) => self.original_url.clone(),
            Err(e) => {
                warn!("Redirect detector could not read final URL: {}", e);
                self.original_url.clone()
            }
        };

        let had_http_redirect = status_chain.iter().any(|s| (300..400).contains(s));
        let meta_refresh_target = self.meta_refresh_target(page).await;
        let url_changed = final_url != self.original_url;
        let trivial = is_trivial_change(&self.original_url, &final_url);

        let (classification, effective_final) = if had_http_redirect {
            (RedirectClassification::HttpRedirect, final_url.clone())
        } else if let Some(target) = meta_refresh_target {
            (RedirectClassification::MetaRefresh, target)
        } else if url_changed {
            (RedirectClassification::ClientScript, final_url.clone())
        } else {
            (RedirectClassification::None, final_url.clone())
        };

        let non_trivial = match classification {
            RedirectClassification::None => false,
            RedirectClassification::MetaRefresh => {
                !is_trivial_change(&self.original_url, &effective_final)
            }
            _ => !trivial,
        };

        let follow = !skip_redirects || !non_trivial;

        debug!(
            "Redirect decision for {}: {:?} -> {} (chain {:?}, follow={})",
            self.original_url, classification, effective_final, status_chain, follow
        );

        RedirectDecision {
            original_url: self.original_url.clone(),
            final_url: effective_final,
            classification,
            status_chain,
            follow,
        }
    }

    /// Target of a zero-delay meta refresh, resolved against the page URL.
    async fn meta_refresh_target(&self, page: &Page) -> Option<String> {
        let js = r#"
        (() => {
            const meta = document.querySelector('meta[http-equiv="refresh" i]');
            return meta ? meta.getAttribute('content') : null;
        })()
        "#;

        let content = match page.evaluate(js).await {
            Ok(result) => result.value()?.as_str()?.to_string(),
            Err(e) => {
                warn!("Meta refresh probe failed: {}", e);
                return None;
            }
        };

        parse_meta_refresh(&content).and_then(|(delay, target)| {
            if delay > 0 {
                return None;
            }
            let base = Url::parse(&self.original_url).ok()?;
            Some(base.join(&target).ok()?.to_string())
        })
    }

    /// Stop listening. Safe to call multiple times.
    pub fn detach(&mut self) {
        for task in self.listener_tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for RedirectDetector {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Parse a meta refresh content attribute like `0; url=/landing`.
fn parse_meta_refresh(content: &str) -> Option<(u32, String)> {
    let mut parts = content.splitn(2, ';');
    let delay: u32 = parts.next()?.trim().parse().ok()?;
    let rest = parts.next()?.trim();
    let target = rest
        .strip_prefix("url=")
        .or_else(|| rest.strip_prefix("URL="))
        .or_else(|| rest.strip_prefix("Url="))?
        .trim()
        .trim_matches('\'')
        .trim_matches('"');
    if target.is_empty() {
        return None;
    }
    Some((delay, target.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trivial() {
        assert!(is_trivial_change(
            "https://example.com/about",
            "https://example.com/about/"
        ));
        assert!(is_trivial_change(
            "https://example.com/about/",
            "https://example.com/about"
        ));
    }

    #[test]
    fn test_http_to_https_is_trivial() {
        assert!(is_trivial_change(
            "http://example.com/page",
            "https://example.com/page"
        ));
    }

    #[test]
    fn test_host_change_is_not_trivial() {
        assert!(!is_trivial_change(
            "https://example.com/",
            "https://www.example.com/"
        ));
    }

    #[test]
    fn test_path_change_is_not_trivial() {
        assert!(!is_trivial_change(
            "http://example.com",
            "https://example.com/landing"
        ));
    }

    #[test]
    fn test_query_change_is_not_trivial() {
        assert!(!is_trivial_change(
            "https://example.com/page",
            "https://example.com/page?ref=redirect"
        ));
    }

    #[test]
    fn test_parse_meta_refresh() {
        assert_eq!(
            parse_meta_refresh("0; url=/landing"),
            Some((0, "/landing".to_string()))
        );
        assert_eq!(
            parse_meta_refresh("5; URL=https://example.com/"),
            Some((5, "https://example.com/".to_string()))
        );
        assert_eq!(parse_meta_refresh("garbage"), None);
        assert_eq!(parse_meta_refresh("0"), None);
    }

    #[test]
    fn test_no_redirect_decision() {
        let decision = RedirectDecision::no_redirect("https://example.com/");
        assert!(decision.follow);
        assert!(!decision.is_redirect());
        assert!(decision.status_chain.is_empty());
    }
}
