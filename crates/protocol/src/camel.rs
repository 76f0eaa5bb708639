//! Wire-key conversion for raw payloads.
//!
//! Typed options serialize with camelCase renames; raw `Value` payloads go
//! through this before hitting the wire.

use serde_json::Value;

pub fn snake_to_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for (i, c) in s.chars().enumerate() {
        if c == '_' && i > 0 {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Recursively convert object keys to camelCase, including inside arrays.
pub fn to_camel_case_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (snake_to_camel(k), to_camel_case_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(to_camel_case_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snake_to_camel() {
        assert_eq!(snake_to_camel("model_name"), "modelName");
        assert_eq!(snake_to_camel("dom_settle_timeout_ms"), "domSettleTimeoutMs");
        assert_eq!(snake_to_camel("url"), "url");
        assert_eq!(snake_to_camel("_private"), "_private");
    }

    #[test]
    fn test_nested_keys_converted() {
        let input = json!({
            "model_name": "gpt-4o-mini",
            "create_params": {
                "browser_settings": { "block_ads": true }
            },
            "items": [ { "element_id": 1 } ],
        });
        let out = to_camel_case_keys(&input);
        assert_eq!(out["modelName"], json!("gpt-4o-mini"));
        assert_eq!(
            out["createParams"]["browserSettings"]["blockAds"],
            json!(true)
        );
        assert_eq!(out["items"][0]["elementId"], json!(1));
    }
}
