//! Tool Suite (§4.4): Document Search, Web Search, Web Page Fetcher,
//! File Reader, and Calculator — the capability surfaces agent units
//! dispatch into during a research round.
//!
//! Every tool has a name, a JSON-shaped input schema, and an async
//! `execute` method; all accept an optional [`ProgressHandle`] for
//! feedback emission. Tool errors never propagate to the mission — the
//! registry's [`ToolRegistry::execute`] is the only place that turns a
//! missing/misconfigured tool into a [`crate::error::ToolError`]; a
//! tool's own runtime failures (a 403, a network error) are returned as
//! part of its successful JSON output so the calling agent can reason
//! about them.

pub mod calculator;
pub mod document_search;
pub mod file_reader;
pub mod web_fetch;
pub mod web_search;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, ToolError};
use crate::progress::ProgressHandle;

pub use calculator::CalculatorTool;
pub use document_search::DocumentSearchTool;
pub use file_reader::FileReaderTool;
pub use web_fetch::WebPageFetcherTool;
pub use web_search::{BraveSearchProvider, SearchProvider, WebSearchTool};

/// A JSON-schema tool definition, as handed to an LLM provider's
/// function-calling API.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Tool name, used to route calls back through [`ToolRegistry`].
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON Schema for the tool's input object.
    pub input_schema: Value,
}

/// A capability an agent unit can dispatch into during execution.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, unique within a [`ToolRegistry`].
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema describing valid `input` values for [`Tool::execute`].
    fn input_schema(&self) -> Value;

    /// Runs the tool against `input`, optionally emitting progress
    /// feedback.
    ///
    /// # Errors
    ///
    /// Returns an error only for conditions the calling agent cannot
    /// reason about from the output shape (e.g. malformed `input`).
    /// Remote/runtime failures specific to a tool (an unreachable URL, a
    /// rate-limited search provider) are encoded in the returned value
    /// instead, per this tool's own contract.
    async fn execute(&self, input: Value, progress: Option<&ProgressHandle>) -> Result<Value>;

    /// Returns this tool's [`ToolDefinition`].
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// A dispatch table of registered tools, keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(std::convert::AsRef::as_ref)
    }

    /// Returns the JSON-schema definitions of every registered tool, for
    /// handing to an LLM provider's function-calling API.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Restricts the definitions returned to `names` (mirrors
    /// `MissionMetadata::tool_selection`; an empty `names` returns all
    /// definitions, matching "empty means all registered tools are
    /// available").
    #[must_use]
    pub fn definitions_for(&self, names: &[String]) -> Vec<ToolDefinition> {
        if names.is_empty() {
            return self.definitions();
        }
        names
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.definition())
            .collect()
    }

    /// Executes a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] if `name` is not registered,
    /// or whatever error the tool itself returns.
    pub async fn execute(
        &self,
        name: &str,
        input: Value,
        progress: Option<&ProgressHandle>,
    ) -> Result<Value> {
        let tool = self.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;
        tool.execute(input, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "echoes its input"
        }

        fn input_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }

        async fn execute(&self, input: Value, _progress: Option<&ProgressHandle>) -> Result<Value> {
            Ok(input)
        }
    }

    #[tokio::test]
    async fn test_registry_executes_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let result = registry
            .execute("echo", serde_json::json!({"x": 1}), None)
            .await
            .unwrap();
        assert_eq!(result["x"], 1);
    }

    #[tokio::test]
    async fn test_registry_unknown_tool_errors() {
        let registry = ToolRegistry::new();
        let result = registry.execute("missing", serde_json::json!({}), None).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_definitions_for_empty_selection_returns_all() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert_eq!(registry.definitions_for(&[]).len(), 1);
    }

    #[test]
    fn test_definitions_for_filters_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert_eq!(registry.definitions_for(&["missing".to_string()]).len(), 0);
        assert_eq!(registry.definitions_for(&["echo".to_string()]).len(), 1);
    }
}
