//! Accessibility tree snapshot and simplification.
//!
//! Converts Chrome's flat accessibility node list into a compact indented
//! text outline with per-snapshot integer node ids, plus side tables mapping
//! ids to URLs and listing discovered iframes.

use grounder_core::{Error, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::cdp::CdpClient;

/// A decoded accessibility node, before simplification.
#[derive(Debug, Clone, Default)]
pub struct AXNode {
    pub node_id: String,
    pub role: String,
    pub name: String,
    pub value: String,
    pub description: String,
    pub backend_node_id: Option<i64>,
    pub child_ids: Vec<String>,
    pub ignored: bool,
    /// Extracted from the node's "url" property when present.
    pub url: Option<String>,
}

/// A retained node after noise reduction, ready for rendering.
#[derive(Debug, Clone, Default)]
pub struct SimplifiedNode {
    pub role: String,
    pub name: String,
    pub backend_node_id: Option<i64>,
    pub url: Option<String>,
    pub children: Vec<SimplifiedNode>,
}

/// An iframe discovered in the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct IframeNode {
    /// Id assigned to the iframe's outline line.
    pub node_id: u32,
    pub backend_node_id: Option<i64>,
}

/// The product of one snapshot call. Never cached across navigations.
#[derive(Debug, Clone, Default)]
pub struct TreeResult {
    /// Indented outline of `id role "name"` lines.
    pub simplified: String,
    /// Side table for nodes whose accessible value is a URL.
    pub id_to_url: HashMap<u32, String>,
    pub iframes: Vec<IframeNode>,
    /// Assigned id -> backend DOM node id, for locator resolution.
    pub backend_ids: HashMap<u32, i64>,
}

/// Roles that carry no semantic signal on their own.
const STRUCTURAL_ROLES: &[&str] = &["generic", "none", "presentation", "InlineTextBox"];

fn is_structural(role: &str) -> bool {
    STRUCTURAL_ROLES.iter().any(|r| r.eq_ignore_ascii_case(role))
}

/// Parse the CDP `Accessibility.getFullAXTree` response into decoded nodes.
pub fn parse_ax_nodes(cdp_response: &Value) -> Vec<AXNode> {
    let nodes = match cdp_response.get("nodes").and_then(|v| v.as_array()) {
        Some(arr) => arr,
        None => return Vec::new(),
    };

    nodes
        .iter()
        .map(|node| {
            let mut url = None;
            if let Some(props) = node.get("properties").and_then(|v| v.as_array()) {
                for prop in props {
                    if prop.get("name").and_then(|v| v.as_str()) == Some("url") {
                        url = prop
                            .get("value")
                            .and_then(|v| v.get("value"))
                            .and_then(|v| v.as_str())
                            .map(|s| s.to_string());
                    }
                }
            }

            AXNode {
                node_id: node
                    .get("nodeId")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                role: get_ax_value(node, "role"),
                name: get_ax_value(node, "name"),
                value: get_ax_value(node, "value"),
                description: get_ax_value(node, "description"),
                backend_node_id: node.get("backendDOMNodeId").and_then(|v| v.as_i64()),
                child_ids: node
                    .get("childIds")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| v.as_str())
                            .map(|s| s.to_string())
                            .collect()
                    })
                    .unwrap_or_default(),
                ignored: node.get("ignored").and_then(|v| v.as_bool()).unwrap_or(false),
                url,
            }
        })
        .collect()
}

fn get_ax_value(node: &Value, field: &str) -> String {
    // CDP wraps role/name/value/description as {type: "...", value: "..."}
    node.get(field)
        .and_then(|v| {
            v.get("value")
                .and_then(|val| val.as_str())
                .or_else(|| v.as_str())
        })
        .unwrap_or("")
        .to_string()
}

/// Build the simplified hierarchical tree from decoded flat nodes.
///
/// Noise reduction: ignored nodes and empty structural wrappers are dropped
/// with their children hoisted in place; single-child structural wrappers
/// collapse into the child; `StaticText` children that merely repeat the
/// parent's name are removed.
pub fn simplify(nodes: &[AXNode], scrollable: &HashSet<i64>) -> Option<SimplifiedNode> {
    if nodes.is_empty() {
        return None;
    }
    let node_map: HashMap<&str, &AXNode> =
        nodes.iter().map(|n| (n.node_id.as_str(), n)).collect();
    let mut retained = build_simplified(&nodes[0], &node_map, scrollable);
    let mut root = match retained.len() {
        0 => return None,
        1 => retained.remove(0),
        // Root itself was dropped; keep its children under a synthetic root
        _ => SimplifiedNode {
            role: "RootWebArea".to_string(),
            children: retained,
            ..Default::default()
        },
    };
    remove_redundant_static_text(&mut root);
    Some(root)
}

/// Returns zero or more retained nodes for one source node. A dropped
/// wrapper yields its retained children in place, preserving order.
fn build_simplified(
    node: &AXNode,
    node_map: &HashMap<&str, &AXNode>,
    scrollable: &HashSet<i64>,
) -> Vec<SimplifiedNode> {
    let mut children = Vec::new();
    for child_id in &node.child_ids {
        if let Some(child) = node_map.get(child_id.as_str()) {
            children.extend(build_simplified(child, node_map, scrollable));
        }
    }

    let name = node.name.trim().to_string();
    let has_name = !name.is_empty();

    // A URL may live in the node's value rather than a property
    let url = node
        .url
        .clone()
        .or_else(|| looks_like_url(&node.value).then(|| node.value.clone()));

    let keep = !node.ignored && (has_name || !children.is_empty() || !is_structural(&node.role));
    if !keep {
        return children;
    }

    if is_structural(&node.role) && !has_name {
        // Collapse single-child wrappers; drop empty ones
        if children.len() == 1 {
            return children;
        }
        if children.is_empty() {
            return Vec::new();
        }
    }

    let mut role = node.role.clone();
    if node
        .backend_node_id
        .map_or(false, |id| scrollable.contains(&id))
    {
        role = if role.is_empty() || is_structural(&role) {
            "scrollable".to_string()
        } else {
            format!("scrollable, {}", role)
        };
    }

    vec![SimplifiedNode {
        role,
        name,
        backend_node_id: node.backend_node_id,
        url,
        children,
    }]
}

fn looks_like_url(s: &str) -> bool {
    if !(s.starts_with("http://") || s.starts_with("https://")) {
        return false;
    }
    url::Url::parse(s).is_ok()
}

/// Remove `StaticText` children whose combined text just repeats the parent
/// name, comparing with collapsed whitespace.
fn remove_redundant_static_text(node: &mut SimplifiedNode) {
    let all_static = !node.children.is_empty()
        && node.children.iter().all(|c| c.role == "StaticText");
    if all_static {
        let combined: String = node
            .children
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if normalize_ws(&combined) == normalize_ws(&node.name) {
            node.children.clear();
        }
    }
    for child in node.children.iter_mut() {
        remove_redundant_static_text(child);
    }
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Walks the simplified tree, assigning outline ids and accumulating the
/// rendered text and side tables.
struct Renderer {
    next_id: u32,
    out: String,
    id_to_url: HashMap<u32, String>,
    iframes: Vec<IframeNode>,
    backend_ids: HashMap<u32, i64>,
}

impl Renderer {
    fn new(start_id: u32) -> Self {
        Self {
            next_id: start_id,
            out: String::new(),
            id_to_url: HashMap::new(),
            iframes: Vec::new(),
            backend_ids: HashMap::new(),
        }
    }

    fn render(&mut self, node: &SimplifiedNode, depth: usize) {
        let id = self.next_id;
        self.next_id += 1;

        let indent = "  ".repeat(depth);
        if node.name.is_empty() {
            self.out.push_str(&format!("{}{} {}\n", indent, id, node.role));
        } else {
            self.out
                .push_str(&format!("{}{} {} \"{}\"\n", indent, id, node.role, node.name));
        }

        // URLs go to the side table, never inline
        if let Some(url) = &node.url {
            self.id_to_url.insert(id, url.clone());
        }
        if let Some(backend_id) = node.backend_node_id {
            self.backend_ids.insert(id, backend_id);
        }
        if node.role.eq_ignore_ascii_case("iframe") {
            self.iframes.push(IframeNode {
                node_id: id,
                backend_node_id: node.backend_node_id,
            });
        }

        for child in &node.children {
            self.render(child, depth + 1);
        }
    }
}

/// Build a [`TreeResult`] from a raw CDP accessibility response.
///
/// Pure over the response value; the async capture path wraps this.
pub fn build_snapshot(cdp_response: &Value, scrollable: &HashSet<i64>) -> Result<TreeResult> {
    let nodes = parse_ax_nodes(cdp_response);
    if nodes.is_empty() {
        return Err(Error::SnapshotUnavailable(
            "accessibility tree response contained no nodes".to_string(),
        ));
    }
    let root = simplify(&nodes, scrollable).ok_or_else(|| {
        Error::SnapshotUnavailable("no retained nodes after simplification".to_string())
    })?;

    let mut renderer = Renderer::new(1);
    renderer.render(&root, 0);
    Ok(TreeResult {
        simplified: renderer.out.trim_end().to_string(),
        id_to_url: renderer.id_to_url,
        iframes: renderer.iframes,
        backend_ids: renderer.backend_ids,
    })
}

/// JS probe returning xpaths of scrollable containers, largest first.
const SCROLLABLE_XPATHS_JS: &str = r#"
(() => {
  const out = [];
  const els = document.querySelectorAll('*');
  for (const el of els) {
    const style = window.getComputedStyle(el);
    const scrollable = el.scrollHeight > el.clientHeight &&
      (style.overflowY === 'auto' || style.overflowY === 'scroll');
    if (!scrollable) continue;
    let path = '';
    let cur = el;
    while (cur && cur.nodeType === Node.ELEMENT_NODE) {
      let idx = 1;
      let sib = cur.previousElementSibling;
      while (sib) {
        if (sib.tagName === cur.tagName) idx++;
        sib = sib.previousElementSibling;
      }
      path = '/' + cur.tagName.toLowerCase() + '[' + idx + ']' + path;
      cur = cur.parentElement;
    }
    out.push(path);
  }
  return out;
})()
"#;

/// Find backend node ids of scrollable containers on the current page.
pub async fn find_scrollable_backend_ids(cdp: &CdpClient) -> Result<HashSet<i64>> {
    let mut ids = HashSet::new();
    let result = cdp.evaluate_js(SCROLLABLE_XPATHS_JS).await?;
    let xpaths: Vec<String> = result
        .get("result")
        .and_then(|r| r.get("value"))
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();

    for xpath in xpaths {
        let expr = format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            serde_json::to_string(&xpath)?
        );
        let object_id = match cdp.evaluate_to_object(&expr).await {
            Ok(Some(id)) => id,
            Ok(None) => continue,
            Err(e) => {
                warn!(xpath = %xpath, "failed to resolve scrollable element: {}", e);
                continue;
            }
        };
        if let Ok(desc) = cdp.describe_node(&object_id).await {
            if let Some(backend_id) = desc
                .get("node")
                .and_then(|n| n.get("backendNodeId"))
                .and_then(|v| v.as_i64())
            {
                ids.insert(backend_id);
            }
        }
    }
    Ok(ids)
}

/// Capture a full snapshot of the page, including iframe sub-trees.
///
/// Child-frame trees are stitched in as children of their owning iframe
/// node; frames that fail to produce a tree are skipped with a warning.
pub async fn capture(cdp: &CdpClient) -> Result<TreeResult> {
    cdp.enable_domain("Accessibility").await.map_err(|e| {
        Error::SnapshotUnavailable(format!("could not enable accessibility domain: {}", e))
    })?;

    let result = async {
        let scrollable = find_scrollable_backend_ids(cdp).await.unwrap_or_default();

        let response = cdp
            .get_full_ax_tree(None)
            .await
            .map_err(|e| Error::SnapshotUnavailable(e.to_string()))?;
        let nodes = parse_ax_nodes(&response);
        if nodes.is_empty() {
            return Err(Error::SnapshotUnavailable(
                "accessibility tree response contained no nodes".to_string(),
            ));
        }
        let mut root = simplify(&nodes, &scrollable).ok_or_else(|| {
            Error::SnapshotUnavailable("no retained nodes after simplification".to_string())
        })?;

        // Stitch child-frame sub-trees under their owning iframe nodes
        for (frame_id, owner_backend_id) in child_frames(cdp).await {
            let sub_response = match cdp.get_full_ax_tree(Some(&frame_id)).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(frame_id = %frame_id, "skipping frame without accessibility tree: {}", e);
                    continue;
                }
            };
            let sub_nodes = parse_ax_nodes(&sub_response);
            if let Some(sub_root) = simplify(&sub_nodes, &scrollable) {
                attach_to_iframe(&mut root, owner_backend_id, sub_root);
            }
        }

        let mut renderer = Renderer::new(1);
        renderer.render(&root, 0);
        Ok(TreeResult {
            simplified: renderer.out.trim_end().to_string(),
            id_to_url: renderer.id_to_url,
            iframes: renderer.iframes,
            backend_ids: renderer.backend_ids,
        })
    }
    .await;

    cdp.disable_domain("Accessibility").await;
    result
}

/// List (frameId, owner backendNodeId) for every non-main frame.
async fn child_frames(cdp: &CdpClient) -> Vec<(String, i64)> {
    let tree = match cdp.get_frame_tree().await {
        Ok(t) => t,
        Err(_) => return Vec::new(),
    };
    let mut frames = Vec::new();
    collect_child_frames(tree.get("frameTree"), true, &mut frames);

    let mut out = Vec::new();
    for frame_id in frames {
        match cdp.get_frame_owner(&frame_id).await {
            Ok(Some(backend_id)) => out.push((frame_id, backend_id)),
            _ => {}
        }
    }
    out
}

fn collect_child_frames(tree: Option<&Value>, is_root: bool, out: &mut Vec<String>) {
    let Some(tree) = tree else { return };
    if !is_root {
        if let Some(id) = tree
            .get("frame")
            .and_then(|f| f.get("id"))
            .and_then(|v| v.as_str())
        {
            out.push(id.to_string());
        }
    }
    if let Some(children) = tree.get("childFrames").and_then(|v| v.as_array()) {
        for child in children {
            collect_child_frames(Some(child), false, out);
        }
    }
}

fn attach_to_iframe(node: &mut SimplifiedNode, backend_id: i64, sub_root: SimplifiedNode) {
    if node.role.eq_ignore_ascii_case("iframe") && node.backend_node_id == Some(backend_id) {
        node.children.push(sub_root);
        return;
    }
    for child in node.children.iter_mut() {
        attach_to_iframe(child, backend_id, sub_root.clone());
    }
}
