//! Structural validation of extracted data against the caller's schema.
//!
//! Covers the JSON Schema subset extraction schemas actually use: type
//! checks, object properties and required fields, and array items. A
//! mismatch is reported as a message, the caller decides whether to log or
//! raise.

use serde_json::Value;

/// Validate `value` against `schema`. Returns the first mismatch found.
pub fn validate_against_schema(value: &Value, schema: &Value) -> Result<(), String> {
    validate_inner(value, schema, "$")
}

fn validate_inner(value: &Value, schema: &Value, path: &str) -> Result<(), String> {
    let Some(expected) = schema.get("type").and_then(|v| v.as_str()) else {
        return Ok(());
    };

    let matches = match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    };
    if !matches {
        return Err(format!(
            "{}: expected {}, got {}",
            path,
            expected,
            type_name(value)
        ));
    }

    match expected {
        "object" => {
            if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
                for req in required.iter().filter_map(|v| v.as_str()) {
                    if value.get(req).is_none() {
                        return Err(format!("{}: missing required field '{}'", path, req));
                    }
                }
            }
            if let Some(props) = schema.get("properties").and_then(|v| v.as_object()) {
                for (key, prop_schema) in props {
                    if let Some(field) = value.get(key) {
                        validate_inner(field, prop_schema, &format!("{}.{}", path, key))?;
                    }
                }
            }
        }
        "array" => {
            if let Some(items) = schema.get("items") {
                for (i, item) in value.as_array().into_iter().flatten().enumerate() {
                    validate_inner(item, items, &format!("{}[{}]", path, i))?;
                }
            }
        }
        _ => {}
    }

    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_object_passes() {
        let schema = json!({
            "type": "object",
            "properties": { "extraction": { "type": "string" } },
            "required": ["extraction"],
        });
        assert!(validate_against_schema(&json!({ "extraction": "hi" }), &schema).is_ok());
    }

    #[test]
    fn test_missing_required_field_reported() {
        let schema = json!({
            "type": "object",
            "properties": { "extraction": { "type": "string" } },
            "required": ["extraction"],
        });
        let err = validate_against_schema(&json!({}), &schema).unwrap_err();
        assert!(err.contains("extraction"));
    }

    #[test]
    fn test_wrong_item_type_reported_with_path() {
        let schema = json!({
            "type": "array",
            "items": { "type": "integer" },
        });
        let err = validate_against_schema(&json!([1, "two"]), &schema).unwrap_err();
        assert!(err.contains("$[1]"));
        assert!(err.contains("expected integer"));
    }

    #[test]
    fn test_derived_schema_round_trip() {
        #[derive(schemars::JsonSchema)]
        #[allow(dead_code)]
        struct Article {
            title: String,
            word_count: u32,
        }
        let schema = serde_json::to_value(schemars::schema_for!(Article)).unwrap();
        assert!(validate_against_schema(
            &json!({ "title": "hello", "word_count": 120 }),
            &schema
        )
        .is_ok());
        assert!(validate_against_schema(&json!({ "title": "hello" }), &schema).is_err());
    }

    #[test]
    fn test_extra_fields_tolerated() {
        let schema = json!({
            "type": "object",
            "properties": { "title": { "type": "string" } },
        });
        assert!(
            validate_against_schema(&json!({ "title": "x", "extra": 1 }), &schema).is_ok()
        );
    }
}
