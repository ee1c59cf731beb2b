//! The `ChatModel` trait -- the seam between the planner and a model backend.
//!
//! [`super::ModelClient`] implements it over HTTP. Tests drive the planner
//! with scripted implementations.

use async_trait::async_trait;
use serde_json::Value;

use super::client::ModelError;
use super::types::{ChatMessage, ToolCall};

/// One chat-completion request.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub messages: &'a [ChatMessage],
    /// Tool schemas. When present the request asks for `tool_choice = "auto"`.
    pub tools: Option<&'a [Value]>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl<'a> CompletionRequest<'a> {
    /// A plain (tool-less) request.
    pub fn new(messages: &'a [ChatMessage], temperature: f32, max_tokens: u32) -> Self {
        Self {
            messages,
            tools: None,
            temperature,
            max_tokens: Some(max_tokens),
        }
    }

    pub fn with_tools(mut self, tools: &'a [Value]) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// The first choice of a completion response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A chat-completion backend.
///
/// Object-safe so the planner can hold `Arc<dyn ChatModel>`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Issue one completion. Transient connection failures are retried by
    /// the implementation; any returned error is final.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, ModelError>;
}

// Compile-time assertion: ChatModel must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn ChatModel) {}
};
