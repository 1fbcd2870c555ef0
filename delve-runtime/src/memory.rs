//! # Agent Memory
//!
//! Ordered, append-only record of every step one agent takes. Memory renders
//! itself two ways: as a chat message list (fed back to the model on the next
//! step, or to the reformulator in summary mode) and as serializable
//! transcript entries for the results sink.

use crate::action::Action;
use crate::provider::{ChatMessage, Usage, UsageTracker};
use crate::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What went wrong in a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    /// Model output did not parse into an action
    ParsingError,
    /// A tool or delegate failed; the loop went on
    ToolError,
    /// A fault that ended the run
    Fault,
}

impl StepErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepErrorKind::ParsingError => "ParsingError",
            StepErrorKind::ToolError => "ToolError",
            StepErrorKind::Fault => "Fault",
        }
    }
}

impl fmt::Display for StepErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error marker attached to a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    pub kind: StepErrorKind,
    pub message: String,
}

impl StepError {
    pub fn parsing(message: impl Into<String>) -> Self {
        Self { kind: StepErrorKind::ParsingError, message: message.into() }
    }

    pub fn tool(message: impl Into<String>) -> Self {
        Self { kind: StepErrorKind::ToolError, message: message.into() }
    }

    pub fn fault(message: impl Into<String>) -> Self {
        Self { kind: StepErrorKind::Fault, message: message.into() }
    }
}

/// One iteration of the agent loop
#[derive(Debug, Clone)]
pub struct ActionStep {
    /// 1-based, contiguous within one memory
    pub index: usize,
    /// Conversation sent to the model for this step
    pub model_input: Vec<ChatMessage>,
    /// Raw model text (or a rendering of its tool call)
    pub model_output: Option<String>,
    pub action: Option<Action>,
    pub observation: Option<String>,
    pub error: Option<StepError>,
    /// Re-planning message injected before the model call, if any
    pub planning_note: Option<String>,
    pub usage: Usage,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ActionStep {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            model_input: Vec::new(),
            model_output: None,
            action: None,
            observation: None,
            error: None,
            planning_note: None,
            usage: Usage::default(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    pub fn has_parsing_error(&self) -> bool {
        matches!(&self.error, Some(e) if e.kind == StepErrorKind::ParsingError)
    }

    /// One line describing what this step did
    pub fn summary_line(&self) -> String {
        let what = match &self.action {
            Some(Action::ToolCall { name, .. }) => format!("called {}", name),
            Some(Action::Delegate { name, .. }) => format!("delegated to {}", name),
            Some(Action::FinalAnswer { .. }) => "gave the final answer".to_string(),
            Some(Action::Unparseable { .. }) | None => "produced no usable action".to_string(),
        };
        match &self.error {
            Some(err) => format!("Step {}: {} ({}: {})", self.index, what, err.kind, first_line(&err.message)),
            None => format!("Step {}: {}", self.index, what),
        }
    }
}

/// Serializable view of a step, written to the results sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub step: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planning_note: Option<String>,
    pub model_input_messages: usize,
    pub model_output: Option<String>,
    pub action: Option<Action>,
    pub observation: Option<String>,
    pub error: Option<StepError>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl TranscriptEntry {
    pub fn has_parsing_error(&self) -> bool {
        matches!(&self.error, Some(e) if e.kind == StepErrorKind::ParsingError)
    }
}

impl From<&ActionStep> for TranscriptEntry {
    fn from(step: &ActionStep) -> Self {
        Self {
            step: step.index,
            planning_note: step.planning_note.clone(),
            model_input_messages: step.model_input.len(),
            model_output: step.model_output.clone(),
            action: step.action.clone(),
            observation: step.observation.clone(),
            error: step.error.clone(),
            start_time: step.started_at,
            end_time: step.ended_at,
        }
    }
}

/// Everything one agent did for one task
#[derive(Debug, Clone)]
pub struct AgentMemory {
    system_prompt: String,
    task: Task,
    steps: Vec<ActionStep>,
    usage: UsageTracker,
}

impl AgentMemory {
    pub fn new(system_prompt: impl Into<String>, task: Task) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            task,
            steps: Vec::new(),
            usage: UsageTracker::new(),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn steps(&self) -> &[ActionStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&ActionStep> {
        self.steps.last()
    }

    /// Index the next step will carry
    pub fn next_index(&self) -> usize {
        self.steps.len() + 1
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Append a finished step. Indices must stay contiguous.
    pub fn push(&mut self, mut step: ActionStep, model: &str) {
        debug_assert_eq!(step.index, self.next_index(), "step indices must be contiguous");
        step.index = self.next_index();
        if step.ended_at.is_none() {
            step.finish();
        }
        self.usage.track(model, &step.usage);
        self.steps.push(step);
    }

    pub fn has_parsing_error(&self) -> bool {
        self.steps.iter().any(ActionStep::has_parsing_error)
    }

    /// Conversation so far.
    ///
    /// In summary mode the system prompt and planning notes are left out,
    /// which is what the reformulator wants.
    pub fn to_messages(&self, summary_mode: bool) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.steps.len() * 2 + 2);
        if !summary_mode {
            messages.push(ChatMessage::system(self.system_prompt.clone()));
        }
        messages.push(ChatMessage::user(format!("New task:\n{}", self.task.augmented())));

        for step in &self.steps {
            if !summary_mode {
                if let Some(note) = &step.planning_note {
                    messages.push(ChatMessage::user(note.clone()));
                }
            }

            match (&step.action, &step.model_output) {
                (Some(action), _) if !action.is_unparseable() => {
                    messages.push(ChatMessage::assistant(format!("Calling tools:\n{}", action)));
                }
                (_, Some(output)) => messages.push(ChatMessage::assistant(output.clone())),
                _ => {}
            }

            if let Some(observation) = &step.observation {
                messages.push(ChatMessage::user(format!("Observation:\n{}", observation)));
            }

            if let Some(err) = &step.error {
                messages.push(ChatMessage::user(format!(
                    "Error:\n{}\nNow let's retry: take care not to repeat previous errors! \
                     If you have retried several times, try a completely different approach.",
                    err.message
                )));
            }
        }

        messages
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.steps.iter().map(TranscriptEntry::from).collect()
    }

    /// One line per step, used when a sub-agent reports back
    pub fn work_summary(&self) -> String {
        self.steps
            .iter()
            .map(ActionStep::summary_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Truncate on a char boundary, marking the cut
pub fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((byte_idx, _)) => format!(
            "{}\n..._This content has been truncated to stay below {} characters_...",
            &s[..byte_idx],
            max_chars
        ),
    }
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}
