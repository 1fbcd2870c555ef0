//! # Delve Runtime
//!
//! Building blocks for step-bounded research agents.
//!
//! ## Core Concepts
//! - **Task**: the question, plus the instruction wrapper the manager sees
//! - **Action**: the one thing a model asks for in a step, parsed from its output
//! - **Memory**: append-only steps of one agent, renderable as messages or transcript
//! - **Tool**: named capabilities the model may call (`web_search`, `visit_page`, `inspect_file_as_text`)
//! - **Provider**: trait-based LLM communication (OpenAI-compatible, scripted)

pub mod action;
pub mod error;
pub mod memory;
pub mod prompts;
pub mod provider;
pub mod task;
pub mod tool;
pub mod tools;

pub use action::{Action, ActionParser, FINAL_ANSWER};
pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use memory::{ActionStep, AgentMemory, StepError, StepErrorKind, TranscriptEntry};
pub use provider::{
    LlmProvider, ProviderConfig, ProviderType, ProviderError,
    ChatMessage, Role, CompletionRequest, CompletionResponse,
    ToolDefinition, ToolCall, ToolChoice,
    FinishReason, Usage, UsageTracker,
    OpenAIProvider, ScriptedProvider, ScriptedReply,
};
pub use task::Task;
pub use tool::{Tool, ToolSet};
pub use tools::{TextInspector, VisitPage, WebSearch};
