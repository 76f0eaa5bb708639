//! The grounding client contract and its HTTP implementation.

use async_trait::async_trait;
use grounder_core::{Error, GroundedElement, GroundingConfig, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::prompts;

/// Candidate elements produced by one grounding call, with usage counters.
#[derive(Debug, Clone, Default)]
pub struct Grounding {
    pub elements: Vec<GroundedElement>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub inference_time_ms: u64,
}

/// A schema-shaped extraction produced by one grounding call.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub data: Value,
    pub completed: bool,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub inference_time_ms: u64,
}

/// One call to an external instruction-following model.
///
/// Empty or ill-formed model output is a legitimate answer ("no relevant
/// elements") and surfaces as an empty result, never as an error.
#[async_trait]
pub trait GroundingClient: Send + Sync {
    /// Ground an instruction against tree text, returning candidate elements.
    async fn ground_elements(
        &self,
        instruction: &str,
        tree_text: &str,
        user_provided_instructions: Option<&str>,
    ) -> Result<Grounding>;

    /// Ground an extraction instruction against tree text and a target schema.
    async fn ground_extraction(
        &self,
        instruction: &str,
        tree_text: &str,
        schema: &Value,
        user_provided_instructions: Option<&str>,
    ) -> Result<Extraction>;
}

/// Grounding over an OpenAI-style chat completions endpoint.
pub struct HttpGroundingClient {
    client: Client,
    config: GroundingConfig,
}

impl HttpGroundingClient {
    pub fn new(config: GroundingConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client: {}, using default", e);
                Client::new()
            });
        Self { client, config }
    }

    async fn chat(&self, system: &str, user: &str) -> Result<(Value, u64, u64)> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let request = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "response_format": { "type": "json_object" },
            "temperature": self.config.temperature,
        });

        debug!(url = %url, model = %self.config.model, "Calling grounding model");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("Request failed: {}", e)))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            error!(status = %status, body = %raw_body, "Grounding model API error");
            return Err(Error::Provider(format!("API error {}: {}", status, raw_body)));
        }

        let parsed: ChatResponse = serde_json::from_str(&raw_body)
            .map_err(|e| Error::Provider(format!("Failed to parse response: {}", e)))?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        let body = serde_json::from_str::<Value>(&content).unwrap_or_else(|e| {
            warn!("Grounding model returned non-JSON content: {}", e);
            Value::Null
        });

        let (prompt_tokens, completion_tokens) = parsed
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));
        Ok((body, prompt_tokens, completion_tokens))
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<UsageBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageBody {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[async_trait]
impl GroundingClient for HttpGroundingClient {
    async fn ground_elements(
        &self,
        instruction: &str,
        tree_text: &str,
        user_provided_instructions: Option<&str>,
    ) -> Result<Grounding> {
        let system = prompts::build_observe_system_prompt(user_provided_instructions);
        let user = prompts::build_observe_user_message(instruction, tree_text);

        let start = Instant::now();
        let (body, prompt_tokens, completion_tokens) = self.chat(&system, &user).await?;
        let inference_time_ms = start.elapsed().as_millis() as u64;

        let elements = body
            .get("elements")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|e| serde_json::from_value(e.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Grounding {
            elements,
            prompt_tokens,
            completion_tokens,
            inference_time_ms,
        })
    }

    async fn ground_extraction(
        &self,
        instruction: &str,
        tree_text: &str,
        schema: &Value,
        user_provided_instructions: Option<&str>,
    ) -> Result<Extraction> {
        let system = prompts::build_extract_system_prompt(user_provided_instructions);
        let user = format!(
            "{}\nReturn a JSON object matching this schema: {}",
            prompts::build_extract_user_prompt(instruction, tree_text),
            schema
        );

        let start = Instant::now();
        let (body, prompt_tokens, completion_tokens) = self.chat(&system, &user).await?;
        let inference_time_ms = start.elapsed().as_millis() as u64;

        let completed = !body.is_null();
        Ok(Extraction {
            data: body,
            completed,
            prompt_tokens,
            completion_tokens,
            inference_time_ms,
        })
    }
}
