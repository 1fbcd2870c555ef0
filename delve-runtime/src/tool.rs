//! The tool seam: anything an agent can call by name.

use crate::action::FINAL_ANSWER;
use crate::error::{Error, Result};
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A capability exposed to the model.
///
/// Errors whose kind passes `ErrorKind::is_recoverable_in_step` (`ToolFailed`,
/// `ToolNotFound`, `InvalidArgument`, `DelegationFailed`, `FileNotFound`,
/// `PermissionDenied`, `NetworkFailed`, `ParseFailed`) are shown to the model
/// and the loop continues. Any other kind (notably `ToolCrashed`) ends the run.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable name the model calls the tool by
    fn name(&self) -> &str;

    /// When and how to use the tool
    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;

    async fn invoke(&self, args: Value) -> Result<String>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description()).with_parameters(self.parameters())
    }
}

/// Definition of the built-in terminal tool every agent gets
pub fn final_answer_definition() -> ToolDefinition {
    ToolDefinition::new(FINAL_ANSWER, "Provides a final answer to the given problem.")
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "answer": { "type": "string", "description": "The final answer to the problem" }
            },
            "required": ["answer"]
        }))
}

/// Ordered set of tools with unique names
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique and must not shadow `final_answer`.
    pub fn add(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if name == FINAL_ANSWER {
            return Err(Error::hierarchy_invalid("'final_answer' is reserved")
                .with_operation("tool_set::add"));
        }
        if self.by_name.contains_key(&name) {
            return Err(Error::hierarchy_invalid(format!("duplicate tool name '{}'", name))
                .with_operation("tool_set::add")
                .with_context("tool", name));
        }
        self.by_name.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Result<Self> {
        self.add(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    /// Definitions sent to the model, `final_answer` last
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.iter().map(|t| t.definition()).collect();
        defs.push(final_answer_definition());
        defs
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Fetch a required string argument
pub fn required_str<'a>(args: &'a Value, key: &str, tool: &str) -> Result<&'a str> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| {
        Error::invalid_argument(format!("'{}' requires a string argument \"{}\"", tool, key))
            .with_context("tool", tool.to_string())
    })
}

/// Fetch an optional string argument
pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}
