//! Chat-completion model access.

pub mod client;
pub mod model;
pub mod retry;
pub mod types;

pub use client::{ModelClient, ModelError};
pub use model::{ChatModel, Completion, CompletionRequest};
pub use retry::RetryPolicy;
pub use types::{ChatMessage, ToolCall};
