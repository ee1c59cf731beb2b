//! Structured tool outcomes. Tools never fail; they report.

use serde::Serialize;
use serde_json::{Map, Value};

/// Error descriptor returned to the model in place of a payload.
///
/// Serializes as `{"error": ..., "details"?: ..., <context fields>}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(flatten)]
    pub context: Map<String, Value>,
}

impl ToolError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            context: Map::new(),
        }
    }

    pub fn with_details(mut self, details: impl Into<Value>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attach an extra top-level field, e.g. the origin of a failed route.
    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_owned(), value.into());
        self
    }
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolResult {
    Success(Value),
    Failure(ToolError),
}

impl ToolResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Failure(ToolError::new(message))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failure(e) => Some(&e.error),
            Self::Success(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Success(v) => v.clone(),
            Self::Failure(e) => serde_json::to_value(e).unwrap_or_else(|_| {
                serde_json::json!({"error": e.error})
            }),
        }
    }

    /// JSON text for a tool-role message.
    pub fn to_content(&self) -> String {
        self.to_json().to_string()
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        Self::Failure(err)
    }
}
