//! # The step loop
//!
//! One agent, one task, one bounded loop:
//! 1. Maybe inject a planning note (every `planning_interval` steps, and first)
//! 2. Ask the model for the next action given memory so far
//! 3. Parse exactly one action out of the reply
//! 4. Run it: tool call, delegation to a managed agent, or final answer
//! 5. Record the step and decide whether to go on
//!
//! The loop ends on `final_answer`, on the step budget, or on a fault it cannot
//! contain. Whatever happens, the caller gets the memory back.

use crate::config::AgentSettings;
use crate::managed::ManagedAgent;
use delve_error::{Error, Result};
use delve_runtime::memory::truncate;
use delve_runtime::prompts;
use delve_runtime::{
    Action, ActionParser, ActionStep, AgentMemory, ChatMessage, CompletionRequest, CompletionResponse,
    LlmProvider, StepError, Task, Tool, ToolChoice, ToolDefinition, ToolSet,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::Instrument;

/// Synthetic output of a run that used its whole step budget
pub const STEP_LIMIT_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

/// How a loop ended
#[derive(Debug)]
pub enum Termination {
    /// `final_answer` was called with this payload
    FinalAnswer(String),
    /// `max_steps` steps ran without a final answer
    StepLimitExceeded,
    /// A model call failed or a tool hit a fatal fault
    Fault(Error),
}

/// What a finished loop hands back: its ending and everything it did
#[derive(Debug)]
pub struct AgentRun {
    pub agent: String,
    pub termination: Termination,
    pub memory: AgentMemory,
}

impl AgentRun {
    /// Terminal output: the final answer, the step-limit message, or nothing on a fault
    pub fn raw_output(&self) -> Option<&str> {
        match &self.termination {
            Termination::FinalAnswer(payload) => Some(payload),
            Termination::StepLimitExceeded => Some(STEP_LIMIT_MESSAGE),
            Termination::Fault(_) => None,
        }
    }

    pub fn fault(&self) -> Option<&Error> {
        match &self.termination {
            Termination::Fault(err) => Some(err),
            _ => None,
        }
    }
}

/// A named, bounded executor.
///
/// Cloning an agent yields a fresh one with the same tools and budget; no
/// state is carried between runs since memory lives inside [`Agent::run`].
#[derive(Clone)]
pub struct Agent {
    name: String,
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
    temperature: Option<f32>,
    settings: AgentSettings,
    tools: ToolSet,
    delegates: Vec<String>,
    parser: ActionParser,
    max_observation_chars: usize,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("provider", &self.provider.name())
            .field("settings", &self.settings)
            .field("tools", &self.tools)
            .field("delegates", &self.delegates)
            .finish()
    }
}

/// Builder for [`Agent`]
pub struct AgentBuilder {
    name: String,
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
    temperature: Option<f32>,
    settings: AgentSettings,
    tools: Vec<Arc<dyn Tool>>,
    delegates: Vec<ManagedAgent>,
    max_observation_chars: usize,
}

impl AgentBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Expose a managed sub-agent as a callable team member
    pub fn delegate(mut self, managed: ManagedAgent) -> Self {
        self.delegates.push(managed);
        self
    }

    pub fn max_observation_chars(mut self, max: usize) -> Self {
        self.max_observation_chars = max;
        self
    }

    pub fn build(self) -> Result<Agent> {
        if self.name.trim().is_empty() {
            return Err(Error::hierarchy_invalid("agent name must not be empty"));
        }
        if self.settings.max_steps == 0 {
            return Err(Error::hierarchy_invalid(format!(
                "agent '{}' needs max_steps > 0",
                self.name
            )));
        }
        if self.settings.planning_interval == Some(0) {
            return Err(Error::hierarchy_invalid(format!(
                "agent '{}' needs planning_interval > 0 (or none)",
                self.name
            )));
        }

        let mut tools = ToolSet::new();
        for tool in self.tools {
            tools.add(tool).map_err(|e| e.with_context("agent", self.name.clone()))?;
        }

        let mut delegates = Vec::with_capacity(self.delegates.len());
        for managed in self.delegates {
            if managed.name() == self.name {
                return Err(Error::hierarchy_invalid(format!(
                    "agent '{}' cannot manage itself",
                    self.name
                )));
            }
            delegates.push(managed.name().to_string());
            tools
                .add(Arc::new(managed))
                .map_err(|e| e.with_context("agent", self.name.clone()))?;
        }

        Ok(Agent {
            parser: ActionParser::new(delegates.iter().cloned()),
            name: self.name,
            provider: self.provider,
            model: self.model,
            temperature: self.temperature,
            settings: self.settings,
            tools,
            delegates,
            max_observation_chars: self.max_observation_chars,
        })
    }
}

impl Agent {
    pub fn builder(name: impl Into<String>, provider: Arc<dyn LlmProvider>) -> AgentBuilder {
        AgentBuilder {
            name: name.into(),
            provider,
            model: None,
            temperature: None,
            settings: AgentSettings::manager(),
            tools: Vec::new(),
            delegates: Vec::new(),
            max_observation_chars: 20_000,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Names of managed sub-agents, in registration order
    pub fn delegates(&self) -> &[String] {
        &self.delegates
    }

    fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or_else(|| self.provider.default_model())
    }

    fn system_prompt(&self) -> String {
        let (team, tools): (Vec<ToolDefinition>, Vec<ToolDefinition>) = self
            .tools
            .iter()
            .map(|t| t.definition())
            .partition(|def| self.parser.is_delegate(&def.name));
        prompts::system_prompt(&tools, &team)
    }

    /// Run the loop to completion. Consumes the agent.
    pub async fn run(self, task: Task) -> AgentRun {
        let span = tracing::info_span!("agent", name = %self.name);
        self.run_loop(task).instrument(span).await
    }

    async fn run_loop(self, task: Task) -> AgentRun {
        let mut memory = AgentMemory::new(self.system_prompt(), task);
        let definitions = self.tools.definitions();
        let max_steps = self.settings.max_steps;
        let verbosity = self.settings.verbosity;

        if verbosity >= 1 {
            tracing::info!(
                max_steps,
                tools = ?self.tools.names(),
                "starting run"
            );
        }

        loop {
            let completed = memory.len();
            if completed >= max_steps {
                tracing::warn!(max_steps, "step limit reached without a final answer");
                return self.finish(Termination::StepLimitExceeded, memory);
            }

            let mut step = ActionStep::new(memory.next_index());
            let mut messages = memory.to_messages(false);

            if let Some(interval) = self.settings.planning_interval {
                if completed % interval == 0 {
                    let note = prompts::planning_note(completed, max_steps);
                    messages.push(ChatMessage::user(note.clone()));
                    step.planning_note = Some(note);
                    if verbosity >= 2 {
                        tracing::info!(step = step.index, "planning checkpoint");
                    }
                }
            }

            step.model_input = messages.clone();

            let mut request = CompletionRequest::new(messages)
                .with_tools(definitions.clone())
                .with_tool_choice(ToolChoice::Required);
            if let Some(model) = &self.model {
                request = request.with_model(model.clone());
            }
            if let Some(temperature) = self.temperature {
                request = request.with_temperature(temperature);
            }

            let response = match self.provider.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    let err = e
                        .into_error("agent::step")
                        .with_context("agent", self.name.clone())
                        .with_context("step", step.index.to_string());
                    tracing::error!(step = step.index, error = %err, "model call failed");
                    step.error = Some(StepError::fault(err.to_string()));
                    memory.push(step, self.model_name());
                    return self.finish(Termination::Fault(err), memory);
                }
            };

            step.usage = response.usage.clone();
            step.model_output = render_output(&response);
            if verbosity >= 2 {
                if let Some(output) = &step.model_output {
                    tracing::info!(step = step.index, output = %truncate(output, 2_000), "model output");
                }
            }

            let action = self.parser.parse(&response);
            step.action = Some(action.clone());
            if verbosity >= 1 {
                tracing::info!(step = step.index, action = %action, "action");
            }

            let (name, args) = match action {
                Action::FinalAnswer { payload } => {
                    memory.push(step, self.model_name());
                    return self.finish(Termination::FinalAnswer(payload), memory);
                }
                Action::Unparseable { reason, .. } => {
                    tracing::warn!(step = step.index, %reason, "could not parse model output");
                    step.error = Some(StepError::parsing(reason));
                    memory.push(step, self.model_name());
                    continue;
                }
                Action::ToolCall { name, args } => (name, args),
                Action::Delegate { name, request } => (name, json!({ "task": request })),
            };

            match self.invoke(&name, args).await {
                Ok(observation) => {
                    let observation = truncate(&observation, self.max_observation_chars);
                    if verbosity >= 2 {
                        tracing::info!(
                            step = step.index,
                            observation = %truncate(&observation, 2_000),
                            "observation"
                        );
                    }
                    step.observation = Some(observation);
                }
                Err(err) if !err.is_fatal() => {
                    tracing::warn!(step = step.index, tool = %name, error = %err, "tool error");
                    step.error = Some(StepError::tool(format!(
                        "Error executing tool '{}': {}",
                        name,
                        err.message()
                    )));
                }
                Err(err) => {
                    let err = err
                        .with_operation("agent::invoke_tool")
                        .with_context("agent", self.name.clone())
                        .with_context("step", step.index.to_string());
                    tracing::error!(step = step.index, tool = %name, error = %err, "fatal tool fault");
                    step.error = Some(StepError::fault(err.to_string()));
                    memory.push(step, self.model_name());
                    return self.finish(Termination::Fault(err), memory);
                }
            }

            memory.push(step, self.model_name());
        }
    }

    /// Invoke a tool on its own task so a panic inside it becomes a fault
    /// instead of tearing down the caller.
    async fn invoke(&self, name: &str, args: Value) -> Result<String> {
        let Some(tool) = self.tools.get(name).cloned() else {
            return Err(Error::tool_not_found(name).with_context(
                "available",
                self.tools.names().join(", "),
            ));
        };

        match tokio::spawn(async move { tool.invoke(args).await }).await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                Err(Error::tool_crashed(name, format!("tool '{}' panicked", name)))
            }
            Err(join_err) => Err(Error::tool_crashed(name, join_err.to_string())),
        }
    }

    fn finish(&self, termination: Termination, memory: AgentMemory) -> AgentRun {
        if self.settings.verbosity >= 1 {
            let usage = memory.usage();
            let outcome = match &termination {
                Termination::FinalAnswer(_) => "final_answer",
                Termination::StepLimitExceeded => "step_limit",
                Termination::Fault(_) => "fault",
            };
            tracing::info!(
                steps = memory.len(),
                calls = usage.total_calls,
                tokens = usage.total_tokens(),
                outcome,
                "run finished"
            );
        }
        AgentRun {
            agent: self.name.clone(),
            termination,
            memory,
        }
    }
}

/// Text recorded as the step's model output
fn render_output(response: &CompletionResponse) -> Option<String> {
    let text = response.content.as_deref().filter(|c| !c.trim().is_empty());
    let calls: Vec<String> = response
        .tool_calls
        .iter()
        .map(|tc| format!("{}({})", tc.name, tc.arguments))
        .collect();

    match (text, calls.is_empty()) {
        (Some(text), true) => Some(text.to_string()),
        (Some(text), false) => Some(format!("{}\nCalling tools:\n{}", text, calls.join("\n"))),
        (None, false) => Some(format!("Calling tools:\n{}", calls.join("\n"))),
        (None, true) => None,
    }
}
