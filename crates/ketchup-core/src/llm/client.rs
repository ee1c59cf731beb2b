//! HTTP client for an OpenAI-compatible chat-completions endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{ChatModel, Completion, CompletionRequest};
use super::retry::RetryPolicy;
use super::types::{ChatMessage, ToolCall};
use crate::config::ModelConfig;

/// Maximum characters of an error response body kept in [`ModelError::Status`].
const ERROR_BODY_LIMIT: usize = 500;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures talking to the model endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("model endpoint unreachable after {attempts} attempt(s): {source}")]
    Unreachable {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("model request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("model request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("model endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("model response contained no choices")]
    NoChoices,
}

impl ModelError {
    fn from_send(err: reqwest::Error, attempts: u32) -> Self {
        if err.is_connect() {
            Self::Unreachable {
                attempts,
                source: err,
            }
        } else if err.is_timeout() {
            Self::Timeout(err)
        } else {
            Self::Request(err)
        }
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    /// llama.cpp-style servers read the generation cap from here.
    #[serde(skip_serializing_if = "Option::is_none")]
    n_predict: Option<u32>,
}

impl<'a> ChatRequestBody<'a> {
    fn new(model: &'a str, request: &CompletionRequest<'a>) -> Self {
        let tools = request.tools.filter(|t| !t.is_empty());
        let max_tokens = request.max_tokens.filter(|n| *n > 0);
        Self {
            model,
            messages: request.messages,
            tools,
            tool_choice: tools.map(|_| "auto"),
            temperature: request.temperature,
            max_tokens,
            n_predict: max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Value,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

/// Message content as text. Some servers return a list of typed parts.
fn content_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| match p {
                Value::String(s) => Some(s.as_str()),
                Value::Object(o) => o.get("text").and_then(Value::as_str),
                _ => None,
            })
            .collect(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Pooled client for one model endpoint.
///
/// Construct once at startup and share; clones reuse the same connection
/// pool. Dropping the last clone closes idle connections.
#[derive(Debug, Clone)]
pub struct ModelClient {
    http: reqwest::Client,
    config: ModelConfig,
    retry: RetryPolicy,
}

impl ModelClient {
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.max_idle_connections)
            .pool_idle_timeout(config.pool_idle_timeout)
            .build()
            .map_err(ModelError::Client)?;
        tracing::debug!(
            base_url = %config.base_url,
            model = %config.model,
            "model client initialized"
        );
        Ok(Self {
            http,
            config,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the transient-failure retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Probe `GET {base_url}/models` with the liveness timeout.
    ///
    /// Not retried: a liveness check should answer quickly either way.
    pub async fn ping(&self) -> Result<(), ModelError> {
        let mut req = self
            .http
            .get(self.config.models_url())
            .timeout(self.config.liveness_timeout);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await.map_err(|e| ModelError::from_send(e, 1))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_LIMIT),
            });
        }
        Ok(())
    }

    async fn send_with_retry(&self, body: &ChatRequestBody<'_>) -> Result<reqwest::Response, ModelError> {
        let url = self.config.chat_completions_url();
        let mut attempt = 1;
        loop {
            let mut req = self
                .http
                .post(&url)
                .timeout(self.config.generation_timeout)
                .json(body);
            if let Some(key) = &self.config.api_key {
                req = req.bearer_auth(key);
            }

            match req.send().await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_connect() && self.retry.allows_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "model endpoint connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(ModelError::from_send(e, attempt)),
            }
        }
    }

    async fn read_completion(resp: reqwest::Response) -> Result<Completion, ModelError> {
        let status = resp.status();
        let text = resp.text().await.map_err(ModelError::Request)?;
        if !status.is_success() {
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: truncate(&text, ERROR_BODY_LIMIT),
            });
        }

        let parsed: ChatResponseBody =
            serde_json::from_str(&text).map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        let choice = parsed.choices.into_iter().next().ok_or(ModelError::NoChoices)?;

        let mut tool_calls = choice.message.tool_calls.unwrap_or_default();
        for (idx, call) in tool_calls.iter_mut().enumerate() {
            if call.id.is_empty() {
                call.id = format!("call_{idx}");
            }
        }

        Ok(Completion {
            content: content_text(&choice.message.content),
            tool_calls,
        })
    }
}

#[async_trait]
impl ChatModel for ModelClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, ModelError> {
        let body = ChatRequestBody::new(&self.config.model, &request);
        let resp = self.send_with_retry(&body).await?;
        Self::read_completion(resp).await
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
