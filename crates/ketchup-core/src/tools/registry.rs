//! Tool registry -- a named collection of callable capabilities.
//!
//! The tool loop looks tools up by the name the model asked for. Schemas are
//! advertised in registration order.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::result::ToolResult;

/// A capability the model may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Function name advertised to the model.
    fn name(&self) -> &str;

    /// OpenAI function-tool schema: `{"type": "function", "function": {...}}`.
    fn definition(&self) -> Value;

    /// Execute with already-decoded arguments. Never fails; errors are
    /// reported as [`ToolResult::Failure`].
    async fn call(&self, args: &Map<String, Value>) -> ToolResult;
}

// Compile-time assertion: Tool must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Tool) {}
};

/// A collection of registered [`Tool`] implementations, keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under [`Tool::name`].
    ///
    /// A tool with the same name is replaced in place and returned.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Option<Box<dyn Tool>> {
        let name = tool.name().to_string();
        let old = self.tools.insert(name.clone(), Box::new(tool));
        if old.is_none() {
            self.order.push(name);
        }
        old
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|b| b.as_ref())
    }

    /// Names of all registered tools, in registration order.
    pub fn list(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Schemas of all registered tools, in registration order.
    pub fn definitions(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run the named tool. Unknown names produce an error result.
    pub async fn execute(&self, name: &str, args: &Map<String, Value>) -> ToolResult {
        tracing::info!(tool = name, "invoking tool");
        let result = match self.get(name) {
            Some(tool) => tool.call(args).await,
            None => ToolResult::error(format!("Unknown tool: {name}")),
        };
        if let Some(error) = result.error_message() {
            tracing::warn!(tool = name, error, "tool returned error");
        }
        result
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}
