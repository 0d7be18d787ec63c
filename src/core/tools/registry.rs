//! Tool registry and invocation types.
//!
//! Tools are registered by name. The realtime session advertises every
//! registered tool through [`ToolRegistry::definitions`]; a completed
//! function call is turned into a [`ToolInvocation`] and routed back through
//! [`ToolRegistry::dispatch`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::calc_sum::CalcSum;

/// Errors raised while dispatching a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for tool operations.
pub type ToolOutcome<T> = Result<T, ToolError>;

/// Tool schema as advertised in `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub call_id: String,
    pub item_id: String,
    pub arguments: HashMap<String, String>,
}

impl ToolInvocation {
    /// Build an invocation from the JSON argument string sent by the model.
    ///
    /// String values are kept verbatim; any other JSON value is kept as its
    /// JSON text so handlers can validate it themselves.
    pub fn from_json_arguments(
        name: impl Into<String>,
        call_id: impl Into<String>,
        item_id: impl Into<String>,
        raw_arguments: &str,
    ) -> ToolOutcome<Self> {
        let parsed: serde_json::Value = serde_json::from_str(raw_arguments)
            .map_err(|e| ToolError::InvalidArgument(format!("arguments are not JSON: {e}")))?;

        let serde_json::Value::Object(object) = parsed else {
            return Err(ToolError::InvalidArgument(
                "arguments must be a JSON object".to_string(),
            ));
        };

        let arguments = object
            .into_iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect();

        Ok(Self {
            name: name.into(),
            call_id: call_id.into(),
            item_id: item_id.into(),
            arguments,
        })
    }

    /// Look up a required argument.
    pub fn argument(&self, key: &str) -> ToolOutcome<&str> {
        self.arguments
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ToolError::InvalidArgument(format!("missing argument '{key}'")))
    }
}

/// Output of a successful tool call, ready to be fed back to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub item_id: String,
    pub call_id: String,
    pub output: String,
    /// Instructions attached to the continue directive that follows the output
    pub follow_up: Option<String>,
}

/// A callable tool.
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    fn call(&self, invocation: &ToolInvocation) -> ToolOutcome<String>;

    /// Instructions for the response generated after the output is delivered.
    fn follow_up_instructions(&self) -> Option<&str> {
        None
    }
}

/// Name-keyed set of tool handlers.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in tools.
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CalcSum));
        registry
    }

    /// Register a handler under its definition name, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = handler.definition().name;
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::warn!("Replaced tool handler: {}", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Schemas of every registered tool, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<_> = self.handlers.values().map(|h| h.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Run the handler registered for `invocation.name`.
    pub fn dispatch(&self, invocation: &ToolInvocation) -> ToolOutcome<ToolResult> {
        let handler = self
            .handlers
            .get(&invocation.name)
            .ok_or_else(|| ToolError::UnknownTool(invocation.name.clone()))?;

        let output = handler.call(invocation)?;

        Ok(ToolResult {
            item_id: invocation.item_id.clone(),
            call_id: invocation.call_id.clone(),
            output,
            follow_up: handler.follow_up_instructions().map(str::to_string),
        })
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}
