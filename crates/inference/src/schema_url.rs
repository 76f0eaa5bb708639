//! Schema URL projection.
//!
//! Raw URLs are long, repetitive, and easily mis-copied by a model. Before
//! grounding, URL-typed string fields in the extraction schema are rewritten
//! to integer placeholders; after grounding, the placeholders are swapped
//! back for real URLs via the snapshot's id-to-URL table.

use serde_json::{json, Value};
use std::collections::HashMap;

/// A path to one URL-typed field in a schema. Array items appear as `"*"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPath {
    pub segments: Vec<String>,
}

fn is_url_string(schema: &Value) -> bool {
    schema.get("type").and_then(|v| v.as_str()) == Some("string")
        && matches!(
            schema.get("format").and_then(|v| v.as_str()),
            Some("url") | Some("uri")
        )
}

/// Rewrite every URL-typed string field to an integer placeholder type.
///
/// Returns the rewritten schema and the list of rewritten field paths, in
/// schema order.
pub fn project_url_fields(schema: &Value) -> (Value, Vec<UrlPath>) {
    let mut paths = Vec::new();
    let mut projected = schema.clone();
    project_inner(&mut projected, &mut Vec::new(), &mut paths);
    (projected, paths)
}

fn project_inner(schema: &mut Value, prefix: &mut Vec<String>, paths: &mut Vec<UrlPath>) {
    if is_url_string(schema) {
        *schema = json!({ "type": "integer" });
        paths.push(UrlPath {
            segments: prefix.clone(),
        });
        return;
    }

    match schema.get("type").and_then(|v| v.as_str()) {
        Some("object") => {
            if let Some(props) = schema.get_mut("properties").and_then(|v| v.as_object_mut()) {
                for (key, prop) in props.iter_mut() {
                    prefix.push(key.clone());
                    project_inner(prop, prefix, paths);
                    prefix.pop();
                }
            }
        }
        Some("array") => {
            if let Some(items) = schema.get_mut("items") {
                prefix.push("*".to_string());
                project_inner(items, prefix, paths);
                prefix.pop();
            }
        }
        _ => {}
    }
}

/// Substitute placeholder integers back with real URLs along the recorded
/// paths. Paths absent from the result and ids absent from the mapping are
/// left untouched.
pub fn inject_urls(result: &mut Value, paths: &[UrlPath], id_to_url: &HashMap<u32, String>) {
    for path in paths {
        inject_at_path(result, &path.segments, id_to_url);
    }
}

fn inject_at_path(value: &mut Value, segments: &[String], id_to_url: &HashMap<u32, String>) {
    let Some((head, rest)) = segments.split_first() else {
        if let Some(id) = value.as_u64() {
            if let Some(url) = id_to_url.get(&(id as u32)) {
                *value = Value::String(url.clone());
            }
        }
        return;
    };

    if head == "*" {
        if let Some(items) = value.as_array_mut() {
            for item in items {
                inject_at_path(item, rest, id_to_url);
            }
        }
    } else if let Some(field) = value.get_mut(head) {
        inject_at_path(field, rest, id_to_url);
    }
}
