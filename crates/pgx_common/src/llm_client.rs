//! Explanation generation client.
//!
//! The generator is an external text-generation service. Callers go through
//! [`explain`], which bounds the call with a timeout and turns every failure
//! into a fixed fallback text, so nothing here ever fails a request.

use crate::prompts;
use crate::types::ClinicalContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Substring identifying a fallback (failed) explanation
pub const FAILURE_MARKER: &str = "temporarily unavailable";

/// Returned in place of a generated explanation on timeout or error
pub const FALLBACK_EXPLANATION: &str =
    "AI explanation temporarily unavailable. Please consult the clinical recommendation provided.";

pub const DEFAULT_TIMEOUT_SECS: u64 = 8;

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Upper bound for one generation call
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// LLM errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    #[error("LLM is disabled in configuration")]
    Disabled,

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("LLM returned empty response")]
    EmptyResponse,
}

/// Text generator producing a prose explanation for one clinical context
#[async_trait]
pub trait ExplanationClient: Send + Sync {
    async fn generate(&self, ctx: &ClinicalContext) -> Result<String, LlmError>;
}

/// Generated explanation as returned to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub summary: String,
}

impl Explanation {
    pub fn fallback() -> Self {
        Self {
            summary: FALLBACK_EXPLANATION.to_string(),
        }
    }

    /// True when this is (or contains) the fallback text
    pub fn is_failure(&self) -> bool {
        self.summary.contains(FAILURE_MARKER)
    }
}

/// Generate an explanation, racing the call against `timeout`.
///
/// Errors and timeouts become [`Explanation::fallback`]; there is no retry.
pub async fn explain(
    client: &dyn ExplanationClient,
    ctx: &ClinicalContext,
    timeout: Duration,
) -> Explanation {
    match tokio::time::timeout(timeout, client.generate(ctx)).await {
        Ok(Ok(text)) => Explanation { summary: text },
        Ok(Err(e)) => {
            warn!("Explanation generation failed for {}: {}", ctx.drug, e);
            Explanation::fallback()
        }
        Err(_) => {
            warn!(
                "Explanation generation timed out after {}ms for {}",
                timeout.as_millis(),
                ctx.drug
            );
            Explanation::fallback()
        }
    }
}

/// Real client speaking Ollama or OpenAI-compatible HTTP
pub struct HttpExplanationClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl HttpExplanationClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LlmError::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Check if endpoint is Ollama-style
    fn is_ollama_endpoint(&self) -> bool {
        self.config.endpoint.contains("11434") || self.config.endpoint.contains("ollama")
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.config.timeout_secs)
        } else {
            LlmError::HttpError(format!("Request failed: {}", e))
        }
    }

    async fn call_ollama(&self, ctx: &ClinicalContext) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));

        let request_body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompts::build_prompt(ctx),
            "stream": false,
        });

        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(LlmError::HttpError(format!(
                "HTTP {} from Ollama",
                response.status()
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let text = response_json
            .get("response")
            .and_then(|v| v.as_str())
            .ok_or(LlmError::EmptyResponse)?;

        non_empty(text)
    }

    async fn call_openai_compatible(&self, ctx: &ClinicalContext) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );

        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": prompts::system_prompt(ctx.mode)},
                {"role": "user", "content": prompts::user_prompt(ctx)},
            ],
        });

        let mut request = self.client.post(&url).json(&request_body);

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(LlmError::HttpError(format!(
                "HTTP {} from OpenAI-compatible API",
                response.status()
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let text = response_json
            .get("choices")
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("message"))
            .and_then(|v| v.get("content"))
            .and_then(|v| v.as_str())
            .ok_or(LlmError::EmptyResponse)?;

        non_empty(text)
    }
}

#[async_trait]
impl ExplanationClient for HttpExplanationClient {
    async fn generate(&self, ctx: &ClinicalContext) -> Result<String, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }

        debug!(
            "Requesting {} explanation for {} from {}",
            ctx.mode, ctx.drug, self.config.endpoint
        );

        if self.is_ollama_endpoint() {
            self.call_ollama(ctx).await
        } else {
            self.call_openai_compatible(ctx).await
        }
    }
}

fn non_empty(text: &str) -> Result<String, LlmError> {
    let text = text.trim();
    if text.is_empty() {
        Err(LlmError::EmptyResponse)
    } else {
        Ok(text.to_string())
    }
}

/// Scripted client for tests
pub struct FakeExplanationClient {
    responses: Mutex<Vec<Result<String, LlmError>>>,
    call_count: Mutex<usize>,
    delay: Option<Duration>,
}

impl FakeExplanationClient {
    /// Responses are handed out in order; the last one repeats
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
            delay: None,
        }
    }

    pub fn always_ok(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn always_error(error: LlmError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Sleep before answering, to exercise timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.lock().map(|c| *c).unwrap_or(0)
    }

    fn next_response(&self) -> Result<String, LlmError> {
        if let Ok(mut count) = self.call_count.lock() {
            *count += 1;
        }

        let Ok(mut responses) = self.responses.lock() else {
            return Err(LlmError::EmptyResponse);
        };
        match responses.len() {
            0 => Err(LlmError::EmptyResponse),
            1 => responses[0].clone(),
            _ => responses.remove(0),
        }
    }
}

#[async_trait]
impl ExplanationClient for FakeExplanationClient {
    async fn generate(&self, _ctx: &ClinicalContext) -> Result<String, LlmError> {
        let response = self.next_response();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        response
    }
}
