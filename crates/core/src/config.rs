use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Configuration for a remote automation session.
///
/// Fully constructed up front: every optional field is defaulted here, never
/// filled in lazily at call time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Base URL of the session server, without a trailing slash.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Automation provider API key.
    #[serde(default)]
    pub api_key: String,
    /// Automation provider project id.
    #[serde(default)]
    pub project_id: String,
    /// API key forwarded to the model backend.
    #[serde(default)]
    pub model_api_key: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Upper bound for DOM settle waits, in milliseconds.
    #[serde(default = "default_dom_settle_timeout_ms")]
    pub dom_settle_timeout_ms: u64,
    #[serde(default = "default_verbose")]
    pub verbose: u8,
    /// Resume an existing remote session instead of creating one.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Raw session creation parameters sent to the provider.
    #[serde(default = "default_session_create_params")]
    pub session_create_params: Value,
}

fn default_api_url() -> String {
    "https://api.grounder.dev".to_string()
}

fn default_model_name() -> String {
    "gpt-4o-mini".to_string()
}

fn default_dom_settle_timeout_ms() -> u64 {
    30_000
}

fn default_verbose() -> u8 {
    1
}

fn default_session_create_params() -> Value {
    json!({
        "browserSettings": {
            "blockAds": true,
            "viewport": { "width": 1024, "height": 768 },
        }
    })
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            project_id: String::new(),
            model_api_key: String::new(),
            model_name: default_model_name(),
            dom_settle_timeout_ms: default_dom_settle_timeout_ms(),
            verbose: default_verbose(),
            session_id: None,
            session_create_params: default_session_create_params(),
        }
    }
}

impl SessionConfig {
    /// Build a config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("GROUNDER_API_URL") {
            cfg.api_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = std::env::var("GROUNDER_API_KEY") {
            cfg.api_key = v;
        }
        if let Ok(v) = std::env::var("GROUNDER_PROJECT_ID") {
            cfg.project_id = v;
        }
        if let Ok(v) = std::env::var("GROUNDER_MODEL_API_KEY") {
            cfg.model_api_key = v;
        }
        if let Ok(v) = std::env::var("GROUNDER_MODEL_NAME") {
            cfg.model_name = v;
        }
        cfg
    }

    /// Check that every credential required for session creation is present.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(Error::Config("api_key is required".to_string()));
        }
        if self.project_id.is_empty() {
            return Err(Error::Config("project_id is required".to_string()));
        }
        if self.model_api_key.is_empty() {
            return Err(Error::Config("model_api_key is required".to_string()));
        }
        Ok(())
    }
}

/// Configuration for the grounding model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingConfig {
    #[serde(default = "default_grounding_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model_name")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_grounding_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            api_base: default_grounding_api_base(),
            api_key: String::new(),
            model: default_model_name(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_missing_credentials() {
        let cfg = SessionConfig::default();
        assert!(cfg.validate().is_err());

        let cfg = SessionConfig {
            api_key: "bb-key".to_string(),
            project_id: "proj".to_string(),
            model_api_key: "sk-model".to_string(),
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_defaults_constructed_up_front() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.dom_settle_timeout_ms, 30_000);
        assert_eq!(
            cfg.session_create_params["browserSettings"]["blockAds"],
            serde_json::json!(true)
        );
    }

    #[test]
    fn test_session_config_camel_case_wire_keys() {
        let cfg = SessionConfig::default();
        let v = serde_json::to_value(&cfg).unwrap();
        assert!(v.get("modelName").is_some());
        assert!(v.get("domSettleTimeoutMs").is_some());
        assert!(v.get("model_name").is_none());
    }
}
