//! Debug overlay drawn over resolved observe results.

use grounder_core::{ObserveResult, Result};
use grounder_browser::Page;
use tracing::warn;

/// Draw numbered outline boxes over each result's element. The boxes remove
/// themselves after a few seconds. Failures are logged and ignored, the
/// overlay is diagnostic only.
pub async fn draw(page: &Page, results: &[ObserveResult]) -> Result<()> {
    let xpaths: Vec<&str> = results
        .iter()
        .map(|r| r.selector.strip_prefix("xpath=").unwrap_or(&r.selector))
        .collect();
    let xpaths_json = serde_json::to_string(&xpaths)?;

    let js = format!(
        r#"(() => {{
  const xpaths = {};
  xpaths.forEach((xpath, i) => {{
    const el = document.evaluate(xpath, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
    if (!el) return;
    const rect = el.getBoundingClientRect();
    const box = document.createElement('div');
    box.style.cssText = 'position:fixed;border:2px solid red;z-index:2147483647;pointer-events:none;' +
      'left:' + rect.left + 'px;top:' + rect.top + 'px;width:' + rect.width + 'px;height:' + rect.height + 'px;';
    const label = document.createElement('span');
    label.textContent = String(i + 1);
    label.style.cssText = 'position:absolute;top:-18px;left:0;background:red;color:white;font:12px monospace;padding:0 4px;';
    box.appendChild(label);
    document.body.appendChild(box);
    setTimeout(() => box.remove(), 5000);
  }});
  return true;
}})()"#,
        xpaths_json
    );

    if let Err(e) = page.evaluate(&js).await {
        warn!("failed to draw observe overlay: {}", e);
    }
    Ok(())
}
