//! Backend node id to absolute-xpath resolution.
//!
//! Accessibility node ids are not replayable selector syntax, so grounded
//! candidates are resolved through `DOM.resolveNode` into a live object and
//! the object's ancestry is walked in-page to synthesize an absolute xpath.

use grounder_core::Result;
use tracing::warn;

use crate::cdp::CdpClient;

/// Walks `parentElement` links, counting preceding same-tag siblings, to
/// produce paths like `/html/body/div[2]/input`.
const GET_NODE_PATH_JS: &str = r##"
function() {
  function getNodePath(el) {
    if (!el || (el.nodeType !== Node.ELEMENT_NODE && el.nodeType !== Node.TEXT_NODE)) {
      return "";
    }
    const parts = [];
    let current = el;
    while (current && (current.nodeType === Node.ELEMENT_NODE || current.nodeType === Node.TEXT_NODE)) {
      let index = 0;
      let hasSameTypeSiblings = false;
      const siblings = current.parentElement
        ? Array.from(current.parentElement.childNodes)
        : [];
      for (let i = 0; i < siblings.length; i++) {
        const sibling = siblings[i];
        if (sibling.nodeType === current.nodeType && sibling.nodeName === current.nodeName) {
          index = index + 1;
          hasSameTypeSiblings = true;
          if (sibling.isSameNode(current)) {
            break;
          }
        }
      }
      if (current.nodeName !== "#document") {
        const tagName = current.nodeName.toLowerCase();
        const pathIndex = hasSameTypeSiblings ? `[${index}]` : "";
        parts.unshift(`${tagName}${pathIndex}`);
      }
      current = current.parentElement || current.parentNode;
    }
    return parts.length ? `/${parts.join("/")}` : "";
  }
  return getNodePath(this);
}
"##;

/// Resolve a backend DOM node id into an absolute xpath.
///
/// Returns `Ok(None)` when the node is detached or yields an empty path; a
/// missing element is a per-candidate condition, never a hard failure.
pub async fn resolve_node_xpath(cdp: &CdpClient, backend_node_id: i64) -> Result<Option<String>> {
    let object_id = match cdp.resolve_backend_node(backend_node_id).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            warn!(backend_node_id, "node resolution returned no object");
            return Ok(None);
        }
        Err(e) => {
            warn!(backend_node_id, "node resolution failed: {}", e);
            return Ok(None);
        }
    };

    let result = match cdp.call_function_on(&object_id, GET_NODE_PATH_JS).await {
        Ok(r) => r,
        Err(e) => {
            warn!(backend_node_id, "xpath recovery failed: {}", e);
            return Ok(None);
        }
    };

    let xpath = result
        .get("result")
        .and_then(|r| r.get("value"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if xpath.is_empty() {
        warn!(backend_node_id, "xpath recovery produced an empty path");
        return Ok(None);
    }
    Ok(Some(xpath.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_path_source_keeps_document_guard() {
        // The walker must skip the synthetic document node by its literal
        // "#document" name, and the source must be a bare function
        // declaration for Runtime.callFunctionOn.
        assert!(GET_NODE_PATH_JS.contains(r##""#document""##));
        assert!(GET_NODE_PATH_JS.trim_start().starts_with("function()"));
    }
}
