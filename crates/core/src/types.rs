use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Options for an act command driven by a natural-language instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActOptions {
    pub action: String,
    /// `%name%` placeholders in grounded arguments are substituted from here
    /// just before execution, so secrets never reach the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<HashMap<String, String>>,
    /// Overall bound on the act flow, grounding included. Unset means no
    /// bound beyond the underlying transport timeouts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ActOptions {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            variables: None,
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActResult {
    pub success: bool,
    pub message: String,
    /// The action description that was actually executed.
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObserveOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    /// Attach a suggested action method and arguments to each result. When
    /// false, results carry locators and descriptions only.
    #[serde(default = "default_return_action")]
    pub return_action: bool,
    /// Draw a debug overlay over resolved elements.
    #[serde(default)]
    pub draw_overlay: bool,
    /// Set when observe runs on behalf of act.
    #[serde(default, skip_serializing)]
    pub from_act: bool,
}

fn default_return_action() -> bool {
    true
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            instruction: None,
            return_action: default_return_action(),
            draw_overlay: false,
            from_act: false,
        }
    }
}

/// A grounded, locator-bearing element returned to callers.
///
/// `selector` is always present and `xpath=`-prefixed; candidates that could
/// not be resolved are dropped before results reach a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObserveResult {
    pub selector: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_node_id: Option<i64>,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractOptions {
    pub instruction: String,
    /// JSON Schema describing the expected output shape.
    #[serde(default = "default_extract_schema")]
    pub schema_definition: Value,
}

impl ExtractOptions {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            schema_definition: default_extract_schema(),
        }
    }

    pub fn with_schema(instruction: impl Into<String>, schema: Value) -> Self {
        Self {
            instruction: instruction.into(),
            schema_definition: schema,
        }
    }
}

pub fn default_extract_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "extraction": { "type": "string" }
        },
        "required": ["extraction"]
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResult {
    pub data: Value,
    /// Recorded when the extracted data failed schema validation. The raw
    /// data above is kept as-is, never coerced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

/// One candidate element as named by the grounding model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundedElement {
    pub element_id: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub arguments: Vec<String>,
}
