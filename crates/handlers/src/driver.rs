//! The page driver seam between handlers and the browser.
//!
//! Handlers only see this trait; the CDP-backed implementation lives here,
//! tests substitute stubs.

use async_trait::async_trait;
use grounder_core::{Error, ObserveResult, Result};
use grounder_browser::{resolve_node_xpath, Page, TreeResult};
use std::sync::Arc;
use tracing::debug;

use crate::overlay;

/// The operations handlers need from a live page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn wait_for_settled_dom(&self);
    async fn snapshot(&self) -> Result<TreeResult>;
    /// Resolve a backend DOM node id to an absolute xpath, `None` when the
    /// node is no longer live.
    async fn resolve_xpath(&self, backend_node_id: i64) -> Result<Option<String>>;
    /// Execute one action against a locator. `selector` carries the
    /// `xpath=` prefix.
    async fn perform(&self, selector: &str, method: &str, arguments: &[String]) -> Result<()>;
    async fn draw_overlay(&self, results: &[ObserveResult]) -> Result<()>;
}

/// CDP-backed driver over a connected [`Page`].
pub struct CdpDriver {
    page: Arc<Page>,
}

impl CdpDriver {
    pub fn new(page: Arc<Page>) -> Self {
        Self { page }
    }

    fn locate_js(xpath: &str) -> Result<String> {
        Ok(format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            serde_json::to_string(xpath)?
        ))
    }

    async fn click(&self, xpath: &str) -> Result<()> {
        let js = format!(
            "(() => {{ const el = {}; if (!el) return false; el.scrollIntoView({{block: 'center'}}); el.click(); return true; }})()",
            Self::locate_js(xpath)?
        );
        self.require_element(&js, xpath).await
    }

    async fn fill(&self, xpath: &str, text: &str) -> Result<()> {
        // Focus and clear in-page, then type through the Input domain so
        // framework listeners see real text input.
        let js = format!(
            "(() => {{ const el = {}; if (!el) return false; el.scrollIntoView({{block: 'center'}}); el.focus(); if ('value' in el) el.value = ''; return true; }})()",
            Self::locate_js(xpath)?
        );
        self.require_element(&js, xpath).await?;
        self.page.cdp().insert_text(text).await?;
        let notify = format!(
            "(() => {{ const el = {}; if (!el) return false; el.dispatchEvent(new Event('input', {{bubbles: true}})); el.dispatchEvent(new Event('change', {{bubbles: true}})); return true; }})()",
            Self::locate_js(xpath)?
        );
        self.page.evaluate(&notify).await?;
        Ok(())
    }

    async fn press(&self, xpath: &str, key: &str) -> Result<()> {
        let js = format!(
            "(() => {{ const el = {}; if (!el) return false; el.focus(); return true; }})()",
            Self::locate_js(xpath)?
        );
        self.require_element(&js, xpath).await?;
        let code = key_code(key);
        self.page.cdp().dispatch_key_event("keyDown", key, &code, 0).await?;
        self.page.cdp().dispatch_key_event("keyUp", key, &code, 0).await?;
        Ok(())
    }

    async fn scroll_to(&self, xpath: &str, percentage: &str) -> Result<()> {
        let fraction: f64 = percentage.trim().trim_end_matches('%').parse().map_err(|_| {
            Error::Other(format!("invalid scroll percentage '{}'", percentage))
        })?;
        let fraction = (fraction / 100.0).clamp(0.0, 1.0);
        let js = format!(
            "(() => {{ const el = {}; const target = el && el !== document.documentElement ? el : window; \
             const height = target === window ? document.body.scrollHeight - window.innerHeight : target.scrollHeight - target.clientHeight; \
             target.scrollTo({{ top: height * {}, behavior: 'smooth' }}); return true; }})()",
            Self::locate_js(xpath)?,
            fraction
        );
        self.page.evaluate(&js).await?;
        Ok(())
    }

    async fn scroll_chunk(&self, forward: bool) -> Result<()> {
        let sign = if forward { "" } else { "-" };
        let js = format!(
            "window.scrollBy({{ top: {}window.innerHeight, behavior: 'smooth' }})",
            sign
        );
        self.page.evaluate(&js).await?;
        Ok(())
    }

    async fn scroll_into_view(&self, xpath: &str) -> Result<()> {
        let js = format!(
            "(() => {{ const el = {}; if (!el) return false; el.scrollIntoView({{block: 'center'}}); return true; }})()",
            Self::locate_js(xpath)?
        );
        self.require_element(&js, xpath).await
    }

    async fn require_element(&self, js: &str, xpath: &str) -> Result<()> {
        match self.page.evaluate(js).await? {
            serde_json::Value::Bool(true) => Ok(()),
            _ => Err(Error::Other(format!("element not found for xpath {}", xpath))),
        }
    }
}

/// Map a key name to a CDP `code` value.
fn key_code(key: &str) -> String {
    match key {
        "Enter" => "Enter".to_string(),
        "Tab" => "Tab".to_string(),
        "Escape" => "Escape".to_string(),
        "Backspace" => "Backspace".to_string(),
        "Delete" => "Delete".to_string(),
        "ArrowUp" | "ArrowDown" | "ArrowLeft" | "ArrowRight" => key.to_string(),
        " " | "Space" => "Space".to_string(),
        k if k.len() == 1 && k.chars().all(|c| c.is_ascii_alphabetic()) => {
            format!("Key{}", k.to_uppercase())
        }
        k if k.len() == 1 && k.chars().all(|c| c.is_ascii_digit()) => format!("Digit{}", k),
        other => other.to_string(),
    }
}

fn strip_xpath_prefix(selector: &str) -> &str {
    selector.strip_prefix("xpath=").unwrap_or(selector)
}

#[async_trait]
impl PageDriver for CdpDriver {
    async fn wait_for_settled_dom(&self) {
        self.page.wait_for_settled_dom().await;
    }

    async fn snapshot(&self) -> Result<TreeResult> {
        self.page.snapshot().await
    }

    async fn resolve_xpath(&self, backend_node_id: i64) -> Result<Option<String>> {
        resolve_node_xpath(self.page.cdp(), backend_node_id).await
    }

    async fn perform(&self, selector: &str, method: &str, arguments: &[String]) -> Result<()> {
        let xpath = strip_xpath_prefix(selector);
        debug!(xpath = %xpath, method = %method, "executing action");
        let first_arg = arguments.first().map(|s| s.as_str()).unwrap_or("");
        match method {
            "click" => self.click(xpath).await,
            "fill" | "type" => self.fill(xpath, first_arg).await,
            "press" => self.press(xpath, first_arg).await,
            "scrollTo" | "scroll" => self.scroll_to(xpath, first_arg).await,
            "scrollIntoView" => self.scroll_into_view(xpath).await,
            "nextChunk" => self.scroll_chunk(true).await,
            "prevChunk" => self.scroll_chunk(false).await,
            other => Err(Error::Other(format!("unsupported action method '{}'", other))),
        }
    }

    async fn draw_overlay(&self, results: &[ObserveResult]) -> Result<()> {
        overlay::draw(&self.page, results).await
    }
}
