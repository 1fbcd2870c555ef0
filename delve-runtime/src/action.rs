//! Turning model output into exactly one action per step.
//!
//! Native tool calls are preferred. Models that answer in plain text may
//! instead emit a `{"name": ..., "arguments": ...}` object, optionally inside a
//! markdown fence. Anything else is `Unparseable` and costs the agent a step.

use crate::provider::CompletionResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Name of the built-in terminal tool
pub const FINAL_ANSWER: &str = "final_answer";

/// The single thing an agent does in a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Invoke a registered tool
    ToolCall { name: String, args: Value },
    /// Hand a natural-language request to a managed sub-agent
    Delegate { name: String, request: String },
    /// Finish the run with this payload
    FinalAnswer { payload: String },
    /// The model output matched none of the shapes above
    Unparseable { raw: String, reason: String },
}

impl Action {
    pub fn is_final(&self) -> bool {
        matches!(self, Action::FinalAnswer { .. })
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self, Action::Unparseable { .. })
    }

    /// Tool or delegate name, if any
    pub fn target(&self) -> Option<&str> {
        match self {
            Action::ToolCall { name, .. } | Action::Delegate { name, .. } => Some(name),
            Action::FinalAnswer { .. } => Some(FINAL_ANSWER),
            Action::Unparseable { .. } => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::ToolCall { name, args } => write!(f, "{}({})", name, args),
            Action::Delegate { name, request } => write!(f, "{}(task={:?})", name, request),
            Action::FinalAnswer { payload } => write!(f, "{}({:?})", FINAL_ANSWER, payload),
            Action::Unparseable { reason, .. } => write!(f, "<unparseable: {}>", reason),
        }
    }
}

/// Classifies model responses into [`Action`]s.
///
/// Knows which callable names are delegates so that calls to them become
/// `Delegate` rather than `ToolCall`.
#[derive(Debug, Clone, Default)]
pub struct ActionParser {
    delegates: HashSet<String>,
}

impl ActionParser {
    pub fn new<I, S>(delegates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            delegates: delegates.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_delegate(&self, name: &str) -> bool {
        self.delegates.contains(name)
    }

    /// Parse a full completion response
    pub fn parse(&self, response: &CompletionResponse) -> Action {
        if let Some(call) = response.tool_calls.first() {
            if response.tool_calls.len() > 1 {
                tracing::debug!(
                    count = response.tool_calls.len(),
                    "model returned several tool calls, keeping the first"
                );
            }
            let args = match parse_arguments(&call.arguments) {
                Ok(args) => args,
                Err(reason) => {
                    return Action::Unparseable {
                        raw: format!("{}({})", call.name, call.arguments),
                        reason,
                    }
                }
            };
            return self.classify(&call.name, args, &call.arguments);
        }

        match response.content.as_deref() {
            Some(content) => self.parse_text(content),
            None => Action::Unparseable {
                raw: String::new(),
                reason: "model returned neither content nor a tool call".into(),
            },
        }
    }

    /// Parse a plain-text reply carrying a JSON action
    pub fn parse_text(&self, content: &str) -> Action {
        if content.trim().is_empty() {
            return Action::Unparseable {
                raw: content.to_string(),
                reason: "empty model output".into(),
            };
        }

        let json_str = extract_json(content);
        let value: Value = match serde_json::from_str(json_str) {
            Ok(value) => value,
            Err(e) => {
                return Action::Unparseable {
                    raw: content.to_string(),
                    reason: format!("no JSON action in model output: {}", e),
                }
            }
        };

        let Some(name) = value
            .get("name")
            .or_else(|| value.get("tool"))
            .and_then(Value::as_str)
        else {
            return Action::Unparseable {
                raw: content.to_string(),
                reason: "JSON action has no \"name\" field".into(),
            };
        };

        let args = match value.get("arguments").or_else(|| value.get("args")) {
            Some(Value::String(s)) => parse_arguments(s).unwrap_or_else(|_| Value::String(s.clone())),
            Some(other) => other.clone(),
            None => Value::Object(Default::default()),
        };

        self.classify(name, args, content)
    }

    fn classify(&self, name: &str, args: Value, raw: &str) -> Action {
        if name == FINAL_ANSWER {
            return match string_arg(&args, &["answer"]) {
                Some(payload) => Action::FinalAnswer { payload },
                None => Action::Unparseable {
                    raw: raw.to_string(),
                    reason: "final_answer called without an \"answer\" argument".into(),
                },
            };
        }

        if self.is_delegate(name) {
            return match string_arg(&args, &["task", "request"]) {
                Some(request) => Action::Delegate {
                    name: name.to_string(),
                    request,
                },
                None => Action::Unparseable {
                    raw: raw.to_string(),
                    reason: format!("call to '{}' needs a \"task\" argument", name),
                },
            };
        }

        Action::ToolCall {
            name: name.to_string(),
            args,
        }
    }
}

fn parse_arguments(arguments: &str) -> Result<Value, String> {
    if arguments.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(arguments).map_err(|e| format!("tool arguments are not valid JSON: {}", e))
}

/// First of `keys` present as a string, or the whole value if it is itself a string.
/// Non-string answers are rendered as compact JSON.
fn string_arg(args: &Value, keys: &[&str]) -> Option<String> {
    if let Value::String(s) = args {
        return Some(s.clone());
    }
    keys.iter().find_map(|key| match args.get(*key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    })
}

/// Strip markdown fences around a JSON payload
fn extract_json(content: &str) -> &str {
    if content.contains("```json") {
        content
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(|s| s.trim())
            .unwrap_or(content)
    } else if content.contains("```") {
        content
            .split("```")
            .nth(1)
            .map(|s| s.trim())
            .unwrap_or(content)
    } else {
        content.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser() -> ActionParser {
        ActionParser::new(["search_agent"])
    }

    #[test]
    fn test_native_tool_call() {
        let response = CompletionResponse::tool_call("visit_page", json!({"url": "https://example.org"}));
        let action = parser().parse(&response);
        assert_eq!(
            action,
            Action::ToolCall {
                name: "visit_page".into(),
                args: json!({"url": "https://example.org"})
            }
        );
    }

    #[test]
    fn test_final_answer() {
        let response = CompletionResponse::tool_call(FINAL_ANSWER, json!({"answer": "42"}));
        assert_eq!(parser().parse(&response), Action::FinalAnswer { payload: "42".into() });

        let response = CompletionResponse::tool_call(FINAL_ANSWER, json!({"answer": 42}));
        assert_eq!(parser().parse(&response), Action::FinalAnswer { payload: "42".into() });
    }

    #[test]
    fn test_delegate() {
        let response = CompletionResponse::tool_call(
            "search_agent",
            json!({"task": "Find me the population of Canberra in 2021"}),
        );
        let action = parser().parse(&response);
        assert!(matches!(action, Action::Delegate { ref name, .. } if name == "search_agent"));
        assert_eq!(action.target(), Some("search_agent"));
    }

    #[test]
    fn test_delegate_without_task_is_unparseable() {
        let response = CompletionResponse::tool_call("search_agent", json!({"query": "canberra"}));
        assert!(parser().parse(&response).is_unparseable());
    }

    #[test]
    fn test_invalid_arguments() {
        let mut response = CompletionResponse::tool_call("visit_page", json!({}));
        response.tool_calls[0].arguments = "{not json".into();
        let action = parser().parse(&response);
        assert!(matches!(action, Action::Unparseable { ref reason, .. } if reason.contains("not valid JSON")));
    }

    #[test]
    fn test_text_action_in_fence() {
        let content = "Thought: I know this.\n```json\n{\"name\": \"final_answer\", \"arguments\": {\"answer\": \"Canberra\"}}\n```";
        assert_eq!(
            parser().parse(&CompletionResponse::text(content)),
            Action::FinalAnswer { payload: "Canberra".into() }
        );
    }

    #[test]
    fn test_text_without_action() {
        let action = parser().parse(&CompletionResponse::text("I think the answer is probably 7."));
        assert!(action.is_unparseable());

        let action = parser().parse(&CompletionResponse::text("   "));
        assert!(matches!(action, Action::Unparseable { ref reason, .. } if reason == "empty model output"));
    }

    #[test]
    fn test_text_json_without_name() {
        let action = parser().parse_text("{\"arguments\": {}}");
        assert!(matches!(action, Action::Unparseable { ref reason, .. } if reason.contains("name")));
    }
}
