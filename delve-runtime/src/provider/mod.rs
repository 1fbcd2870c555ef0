//! # LLM Provider Interface
//!
//! A trait-based abstraction for communicating with LLM backends.
//!
//! ## Design
//! - `LlmProvider` trait defines the core interface (object safe, shared as
//!   `Arc<dyn LlmProvider>` by every agent in a hierarchy)
//! - `OpenAIProvider` talks to any OpenAI-compatible endpoint
//! - `ScriptedProvider` replays canned responses for deterministic runs
//! - Tool/function calling support
//! - Usage tracking

pub mod openai;
pub mod scripted;

pub use openai::OpenAIProvider;
pub use scripted::{ScriptedProvider, ScriptedReply};

use crate::error::{Error, ErrorKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Core Types
// ============================================================================

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Text content, or an empty string
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role_str = match self.role {
            Role::System => "SYSTEM",
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
            Role::Tool => "TOOL",
        };
        writeln!(f, "[{}]", role_str)?;
        if let Some(content) = &self.content {
            writeln!(f, "{}", content)?;
        }
        if let Some(tool_calls) = &self.tool_calls {
            for tc in tool_calls {
                writeln!(f, "  tool_call: {}({})", tc.name, tc.arguments)?;
            }
        }
        if let Some(id) = &self.tool_call_id {
            writeln!(f, "  tool_call_id: {}", id)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool/function that the model can call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Request parameters for a completion
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub tool_choice: Option<ToolChoice>,
    pub stop: Option<Vec<String>>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Function { name: String },
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub id: String,
    pub model: String,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl CompletionResponse {
    /// A plain-text response, as produced by stubs and non-tool models
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            model: String::new(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        }
    }

    /// A response carrying a single native tool call
    pub fn tool_call(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: String::new(),
            model: String::new(),
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_0".into(),
                name: name.into(),
                arguments: arguments.to_string(),
            }],
            finish_reason: FinishReason::ToolCalls,
            usage: Usage::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Unknown,
}

/// Token usage information
#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Error type for provider operations
#[derive(Debug)]
pub enum ProviderError {
    /// Network/connection error
    Network(String),
    /// API returned an error
    Api { status: u16, message: String },
    /// Failed to parse response
    Parse(String),
    /// Rate limited
    RateLimited { retry_after: Option<u64> },
    /// Invalid request
    InvalidRequest(String),
    /// Model not found
    ModelNotFound(String),
    /// Authentication failed
    AuthenticationFailed,
    /// Other error
    Other(String),
}

impl ProviderError {
    /// Lift into the crate error, keeping the provider message verbatim.
    pub fn into_error(self, operation: &'static str) -> Error {
        let message = self.to_string();
        let error = match &self {
            Self::Network(_) => Error::new(ErrorKind::NetworkFailed, message).temporary(),
            Self::RateLimited { retry_after } => {
                let err = Error::new(ErrorKind::RateLimited, message);
                match retry_after {
                    Some(secs) => err.with_context("retry_after", secs.to_string()),
                    None => err,
                }
            }
            Self::Api { status, .. } => {
                Error::new(ErrorKind::InferenceFailed, message)
                    .with_context("status", status.to_string())
            }
            Self::ModelNotFound(model) => {
                let model = model.clone();
                Error::new(ErrorKind::ProviderUnavailable, message).with_context("model", model)
            }
            Self::AuthenticationFailed => {
                Error::new(ErrorKind::ConfigInvalid, message).permanent()
            }
            Self::InvalidRequest(_) => Error::new(ErrorKind::InvalidArgument, message),
            Self::Parse(_) | Self::Other(_) => Error::new(ErrorKind::InferenceFailed, message),
        };
        error.with_operation(operation)
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(e) => write!(f, "Network error: {}", e),
            Self::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            Self::Parse(e) => write!(f, "Parse error: {}", e),
            Self::RateLimited { retry_after } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after {
                    write!(f, " (retry after {}s)", secs)?;
                }
                Ok(())
            }
            Self::InvalidRequest(e) => write!(f, "Invalid request: {}", e),
            Self::ModelNotFound(m) => write!(f, "Model not found: {}", m),
            Self::AuthenticationFailed => write!(f, "Authentication failed"),
            Self::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ProviderError {}

/// The main LLM provider trait
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "openai", "scripted")
    fn name(&self) -> &str;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Send a completion request and get a full response
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Simple prompt -> response helper
    async fn prompt(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)]);
        let response = self.complete(request).await?;
        response.content.ok_or_else(|| ProviderError::Other("No content in response".into()))
    }

    /// Chat with message history
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, ProviderError> {
        let request = CompletionRequest::new(messages);
        let response = self.complete(request).await?;
        response.content.ok_or_else(|| ProviderError::Other("No content in response".into()))
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Configuration for creating providers
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub headers: HashMap<String, String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    OpenAI,
    OpenRouter,
    Local,
}

impl ProviderConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::OpenAI,
            api_key: Some(api_key.into()),
            base_url: Some("https://api.openai.com/v1".into()),
            default_model: Some("gpt-4o".into()),
            headers: HashMap::new(),
            timeout_secs: Some(120),
        }
    }

    /// OpenRouter speaks the OpenAI wire format under its own base URL
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::OpenRouter,
            api_key: Some(api_key.into()),
            base_url: Some("https://openrouter.ai/api/v1".into()),
            default_model: Some("gpt-3.5-turbo-1106".into()),
            headers: HashMap::new(),
            timeout_secs: Some(300),
        }
    }

    pub fn local(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::Local,
            api_key: None,
            base_url: Some(base_url.into()),
            default_model: Some(model.into()),
            headers: HashMap::new(),
            timeout_secs: Some(300),
        }
    }

    /// Preset for an OpenAI-compatible base URL. Hosts other than OpenRouter
    /// and OpenAI are treated as local servers.
    pub fn for_base_url(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into();
        let config = if base_url.contains("openrouter.ai") {
            Self::openrouter(api_key.unwrap_or_default())
        } else if base_url.contains("api.openai.com") {
            Self::openai(api_key.unwrap_or_default())
        } else {
            Self {
                api_key,
                ..Self::local(base_url.clone(), "gpt-3.5-turbo-1106")
            }
        };
        config.with_base_url(base_url)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

// ============================================================================
// Usage Tracking
// ============================================================================

/// Tracks token usage across multiple calls
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    pub total_calls: usize,
    pub total_prompt_tokens: usize,
    pub total_completion_tokens: usize,
    pub by_model: HashMap<String, Usage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, model: &str, usage: &Usage) {
        self.total_calls += 1;
        self.total_prompt_tokens += usage.prompt_tokens;
        self.total_completion_tokens += usage.completion_tokens;

        let entry = self.by_model.entry(model.to_string()).or_default();
        entry.prompt_tokens += usage.prompt_tokens;
        entry.completion_tokens += usage.completion_tokens;
        entry.total_tokens += usage.total_tokens;
    }

    pub fn total_tokens(&self) -> usize {
        self.total_prompt_tokens + self.total_completion_tokens
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_constructors() {
        let sys = ChatMessage::system("You are helpful");
        assert_eq!(sys.role, Role::System);
        assert_eq!(sys.content.as_deref(), Some("You are helpful"));

        let user = ChatMessage::user("42");
        assert_eq!(user.role, Role::User);
        assert!(user.tool_call_id.is_none());
        assert_eq!(user.text(), "42");
    }

    #[test]
    fn test_tool_definition() {
        let tool = ToolDefinition::new("visit_page", "Fetch a web page")
            .with_parameters(serde_json::json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "Address to fetch" }
                },
                "required": ["url"]
            }));

        assert_eq!(tool.name, "visit_page");
        assert!(tool.parameters["properties"]["url"].is_object());
    }

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new(vec![ChatMessage::user("Hello")])
            .with_model("gpt-4o")
            .with_temperature(0.0)
            .with_tool_choice(ToolChoice::Required);

        assert_eq!(request.model, Some("gpt-4o".into()));
        assert_eq!(request.temperature, Some(0.0));
        assert!(matches!(request.tool_choice, Some(ToolChoice::Required)));
    }

    #[test]
    fn test_provider_config() {
        let config = ProviderConfig::openrouter("sk-or-test").with_model("o1");
        assert_eq!(config.provider_type, ProviderType::OpenRouter);
        assert_eq!(config.base_url.as_deref(), Some("https://openrouter.ai/api/v1"));
        assert_eq!(config.default_model.as_deref(), Some("o1"));

        let config = ProviderConfig::openai("sk-test").with_base_url("http://localhost:8000/v1");
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8000/v1"));
    }

    #[test]
    fn test_provider_config_for_base_url() {
        let config = ProviderConfig::for_base_url("https://openrouter.ai/api/v1", Some("sk-or".into()))
            .with_timeout(45);
        assert_eq!(config.provider_type, ProviderType::OpenRouter);
        assert_eq!(config.api_key.as_deref(), Some("sk-or"));
        assert_eq!(config.timeout_secs, Some(45));

        let config = ProviderConfig::for_base_url("https://api.openai.com/v1", None);
        assert_eq!(config.provider_type, ProviderType::OpenAI);

        let config = ProviderConfig::for_base_url("http://localhost:11434/v1", None).with_model("qwen");
        assert_eq!(config.provider_type, ProviderType::Local);
        assert!(config.api_key.is_none());
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(config.default_model.as_deref(), Some("qwen"));
    }

    #[test]
    fn test_provider_error_into_error() {
        let err = ProviderError::RateLimited { retry_after: Some(7) }.into_error("agent::step");
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert!(err.is_retryable());
        assert_eq!(err.operation(), "agent::step");

        let err = ProviderError::Api { status: 500, message: "boom".into() }.into_error("x");
        assert_eq!(err.kind(), ErrorKind::InferenceFailed);
        assert!(err.message().contains("boom"));
    }

    #[test]
    fn test_usage_tracker() {
        let mut tracker = UsageTracker::new();

        tracker.track("gpt-4o", &Usage {
            prompt_tokens: 100,
            completion_tokens: 50,
            total_tokens: 150,
        });

        tracker.track("gpt-4o", &Usage {
            prompt_tokens: 200,
            completion_tokens: 100,
            total_tokens: 300,
        });

        assert_eq!(tracker.total_calls, 2);
        assert_eq!(tracker.total_prompt_tokens, 300);
        assert_eq!(tracker.total_completion_tokens, 150);
        assert_eq!(tracker.total_tokens(), 450);
    }
}
