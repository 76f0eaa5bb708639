//! Session protocol client.
//!
//! Owns the command/response channel to the remote execution context. One
//! command may be in flight per session; the state machine enforces it.

use base64::Engine;
use futures::StreamExt;
use grounder_core::{
    ActOptions, ActResult, Error, ExtractOptions, ExtractResult, ObserveOptions, ObserveResult,
    Result, SessionConfig,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::camel::to_camel_case_keys;
use crate::frames::{FrameCollector, LineBuffer};

pub use crate::frames::LogSink;

/// `Uninitialized → SessionCreated/Idle → (Busy ⇄ Idle)* → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Idle,
    Busy,
    Closed,
}

pub struct SessionClient {
    http: reqwest::Client,
    config: SessionConfig,
    session_id: Option<String>,
    state: SessionState,
    on_log: Option<LogSink>,
}

impl SessionClient {
    /// The log sink receives remote log frames; there is no ambient logger
    /// to swap.
    pub fn new(config: SessionConfig, on_log: Option<LogSink>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            session_id: None,
            state: SessionState::Uninitialized,
            on_log,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Create the remote session. Credential validation happens before any
    /// network call.
    pub async fn init(&mut self) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(Error::Protocol(format!(
                "init called in state {:?}",
                self.state
            )));
        }
        self.config.validate()?;

        let mut payload = json!({
            "modelName": self.config.model_name,
            "verbose": self.config.verbose,
            "domSettleTimeoutMs": self.config.dom_settle_timeout_ms,
            "browserbaseSessionCreateParams": self.config.session_create_params,
        });
        if let Some(session_id) = &self.config.session_id {
            payload["browserbaseSessionID"] = json!(session_id);
        }

        let url = format!("{}/sessions/start", self.config.api_url.trim_end_matches('/'));
        let response = self
            .request(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Protocol(format!("session creation failed: {}", e)))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Protocol(format!("malformed session response: {}", e)))?;
        if !status.is_success() || body.get("success") != Some(&json!(true)) {
            return Err(Error::Protocol(format!(
                "session creation rejected ({}): {}",
                status, body
            )));
        }

        let session_id = body
            .get("data")
            .and_then(|d| d.get("sessionId"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Protocol("session response missing sessionId".to_string()))?
            .to_string();
        debug!(session_id = %session_id, "session created");
        self.session_id = Some(session_id);
        self.state = SessionState::Idle;
        Ok(())
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .post(url)
            .header("x-bb-api-key", &self.config.api_key)
            .header("x-bb-project-id", &self.config.project_id)
            .header("x-model-api-key", &self.config.model_api_key)
            .header("x-sent-at", chrono::Utc::now().to_rfc3339())
            .header("x-language", "rust")
            .header("x-sdk-version", env!("CARGO_PKG_VERSION"))
            .header("Content-Type", "application/json")
    }

    /// Execute one remote command, consuming streamed frames until the
    /// terminal frame arrives.
    pub async fn execute(&mut self, method: &str, payload: Value) -> Result<Value> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Uninitialized => {
                return Err(Error::Protocol("session not initialized".to_string()))
            }
            SessionState::Busy => {
                return Err(Error::Protocol(
                    "a command is already in flight on this session".to_string(),
                ))
            }
            SessionState::Closed => {
                return Err(Error::Protocol("session is closed".to_string()))
            }
        }

        self.state = SessionState::Busy;
        let result = self.execute_inner(method, payload).await;
        if self.state == SessionState::Busy {
            self.state = SessionState::Idle;
        }
        result
    }

    async fn execute_inner(&mut self, method: &str, payload: Value) -> Result<Value> {
        let session_id = self
            .session_id
            .clone()
            .ok_or_else(|| Error::Protocol("no session id".to_string()))?;
        let url = format!(
            "{}/sessions/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            session_id,
            method
        );
        let body = to_camel_case_keys(&payload);
        debug!(method = %method, "executing remote command");

        let response = self
            .request(&url)
            .header("x-stream-response", "true")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Protocol(format!("command request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Protocol(format!(
                "command '{}' rejected ({}): {}",
                method, status, text
            )));
        }

        let mut collector = FrameCollector::new(self.on_log.clone());
        let mut buffer = LineBuffer::new();
        let mut stream = response.bytes_stream();
        'outer: while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| Error::Protocol(format!("stream read failed: {}", e)))?;
            for line in buffer.push(&chunk) {
                collector.feed(&line)?;
                if collector.is_finished() {
                    break 'outer;
                }
            }
        }
        if !collector.is_finished() {
            if let Some(rest) = buffer.finish() {
                collector.feed(&rest)?;
            }
        }
        collector.finish()
    }

    pub async fn navigate(&mut self, url: &str) -> Result<Value> {
        self.execute("navigate", json!({ "url": url })).await
    }

    pub async fn act(&mut self, options: &ActOptions) -> Result<ActResult> {
        let result = self.execute("act", serde_json::to_value(options)?).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn observe(&mut self, options: &ObserveOptions) -> Result<Vec<ObserveResult>> {
        let result = self
            .execute("observe", serde_json::to_value(options)?)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn extract(&mut self, options: Option<&ExtractOptions>) -> Result<ExtractResult> {
        let payload = match options {
            Some(options) => serde_json::to_value(options)?,
            None => json!({}),
        };
        let result = self.execute("extract", payload).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Take a screenshot of the remote page, decoded from base64.
    pub async fn screenshot(&mut self) -> Result<Vec<u8>> {
        let result = self.execute("screenshot", json!({})).await?;
        let encoded = result
            .as_str()
            .or_else(|| result.get("data").and_then(|v| v.as_str()))
            .ok_or_else(|| Error::Protocol("screenshot result carried no data".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::Protocol(format!("screenshot data not base64: {}", e)))
    }

    /// Run a multi-step agent task remotely.
    pub async fn agent_execute(&mut self, payload: Value) -> Result<Value> {
        self.execute("agentExecute", payload).await
    }

    /// Tear the session down. Safe to call repeatedly; the remote end
    /// notification is best-effort.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        if self.state == SessionState::Idle && self.session_id.is_some() {
            if let Err(e) = self.execute("end", json!({})).await {
                warn!("failed to end remote session: {}", e);
            }
        }
        self.state = SessionState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> SessionConfig {
        SessionConfig {
            api_key: "bb-key".to_string(),
            project_id: "proj".to_string(),
            model_api_key: "sk-model".to_string(),
            // An address nothing listens on, for paths that fail before I/O
            api_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_init_missing_credentials_fails_before_network() {
        let mut client = SessionClient::new(SessionConfig::default(), None);
        let err = client.init().await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(client.state(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_execute_before_init_is_protocol_error() {
        let mut client = SessionClient::new(valid_config(), None);
        let err = client.execute("navigate", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_execute_while_busy_is_protocol_error() {
        let mut client = SessionClient::new(valid_config(), None);
        client.session_id = Some("s1".to_string());
        client.state = SessionState::Busy;
        let err = client.execute("navigate", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(msg) if msg.contains("in flight")));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut client = SessionClient::new(valid_config(), None);
        // Never initialized; close must still settle into Closed
        client.close().await.unwrap();
        assert_eq!(client.state(), SessionState::Closed);
        client.close().await.unwrap();
        assert_eq!(client.state(), SessionState::Closed);

        let err = client.execute("navigate", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(msg) if msg.contains("closed")));
    }
}
