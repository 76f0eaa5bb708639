//! Explicit page interface and page registry.
//!
//! The page exposes only the operations the grounding pipeline needs, by
//! composition over the CDP client. Pages are tracked in a registry keyed by
//! their stable target id, with explicit removal on close.

use grounder_core::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cdp::CdpClient;
use crate::snapshot::{self, TreeResult};

/// A connected page, identified by its CDP target id.
pub struct Page {
    cdp: Arc<CdpClient>,
    target_id: String,
    dom_settle_timeout_ms: u64,
}

/// One entry from the browser's `/json/list` endpoint.
#[derive(Debug, Clone)]
pub struct PageTarget {
    pub target_id: String,
    pub ws_url: String,
    pub url: String,
    pub title: String,
}

/// List open page targets from a browser's HTTP debugging endpoint.
pub async fn discover_pages(http_endpoint: &str) -> Result<Vec<PageTarget>> {
    let url = format!("{}/json/list", http_endpoint.trim_end_matches('/'));
    let resp = reqwest::get(&url).await?;
    let items: Vec<Value> = resp.json().await?;

    Ok(items
        .iter()
        .filter(|item| item.get("type").and_then(|v| v.as_str()) == Some("page"))
        .filter_map(|item| {
            Some(PageTarget {
                target_id: item.get("id")?.as_str()?.to_string(),
                ws_url: item.get("webSocketDebuggerUrl")?.as_str()?.to_string(),
                url: item
                    .get("url")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                title: item
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect())
}

impl Page {
    /// Connect to a page target and enable the domains the pipeline uses.
    pub async fn connect(target: &PageTarget, dom_settle_timeout_ms: u64) -> Result<Self> {
        let cdp = CdpClient::connect(&target.ws_url).await?;
        cdp.enable_domain("Page").await?;
        cdp.enable_domain("Runtime").await?;
        cdp.enable_domain("DOM").await?;
        Ok(Self {
            cdp: Arc::new(cdp),
            target_id: target.target_id.clone(),
            dom_settle_timeout_ms,
        })
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn cdp(&self) -> &CdpClient {
        &self.cdp
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        self.cdp.navigate(url).await?;
        self.wait_for_settled_dom().await;
        Ok(())
    }

    /// Evaluate JavaScript and return the serialized result value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self.cdp.evaluate_js(expression).await?;
        if let Some(exception) = result.get("exceptionDetails") {
            return Err(Error::Cdp(format!("evaluate threw: {}", exception)));
        }
        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Send a raw CDP command on this page's connection.
    pub async fn send_cdp(&self, method: &str, params: Value) -> Result<Value> {
        self.cdp.send_command(method, params).await
    }

    /// Capture a simplified accessibility snapshot of this page.
    pub async fn snapshot(&self) -> Result<TreeResult> {
        snapshot::capture(&self.cdp).await
    }

    /// Wait for the DOM to stop changing before snapshotting or acting.
    ///
    /// Polls document readiness, then requires two consecutive identical
    /// element counts. A timeout is logged and tolerated, a page that never
    /// settles is still worth a best-effort snapshot.
    pub async fn wait_for_settled_dom(&self) {
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(self.dom_settle_timeout_ms);

        loop {
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    timeout_ms = self.dom_settle_timeout_ms,
                    "DOM settle wait timed out, continuing anyway"
                );
                return;
            }
            match self.evaluate("document.readyState").await {
                Ok(Value::String(state)) if state == "complete" => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("readyState poll failed: {}", e);
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let mut last_count: Option<u64> = None;
        while tokio::time::Instant::now() < deadline {
            let count = self
                .evaluate("document.querySelectorAll('*').length")
                .await
                .ok()
                .and_then(|v| v.as_u64());
            match (count, last_count) {
                (Some(now), Some(prev)) if now == prev => return,
                (now, _) => last_count = now,
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        warn!(
            timeout_ms = self.dom_settle_timeout_ms,
            "DOM settle wait timed out, continuing anyway"
        );
    }

    /// Take a screenshot, returned as base64-encoded PNG.
    pub async fn screenshot(&self, full_page: bool) -> Result<String> {
        self.cdp.capture_screenshot(full_page).await
    }
}

/// Registry of live pages keyed by stable target id.
///
/// Entries are removed explicitly when the browser reports the target
/// closed; nothing here keeps a dead page alive implicitly.
#[derive(Default)]
pub struct PageRegistry {
    pages: HashMap<String, Arc<Page>>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page: Arc<Page>) {
        self.pages.insert(page.target_id().to_string(), page);
    }

    pub fn get(&self, target_id: &str) -> Option<Arc<Page>> {
        self.pages.get(target_id).cloned()
    }

    /// Remove a page on close notification. Returns the removed entry.
    pub fn remove(&mut self, target_id: &str) -> Option<Arc<Page>> {
        self.pages.remove(target_id)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Constructing a Page needs a live browser; exercise the registry's
    // miss/removal semantics directly.
    #[test]
    fn test_registry_miss_and_removal() {
        let mut registry = PageRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("t1").is_none());
        assert!(registry.remove("t1").is_none());
        assert_eq!(registry.len(), 0);
    }
}
