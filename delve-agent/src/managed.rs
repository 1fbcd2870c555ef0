//! Sub-agents exposed to their manager as tools.
//!
//! Calling a managed agent looks exactly like calling a tool: the manager
//! passes a full-sentence `task` and gets back one string. Each call runs a
//! fresh copy of the sub-agent with its whole step budget. Only the final
//! answer (and, optionally, a one-line-per-step work summary) crosses back;
//! the sub-agent's memory never does.

use crate::agent::{Agent, Termination, STEP_LIMIT_MESSAGE};
use async_trait::async_trait;
use delve_error::{Error, Result};
use delve_runtime::prompts;
use delve_runtime::tool::required_str;
use delve_runtime::{Task, Tool};
use serde_json::{json, Value};

pub struct ManagedAgent {
    name: String,
    description: String,
    template: Agent,
    prompt_suffix: Option<String>,
    provide_run_summary: bool,
}

impl ManagedAgent {
    /// Wrap `agent` under its own name
    pub fn new(agent: Agent, description: impl Into<String>) -> Self {
        Self {
            name: agent.name().to_string(),
            description: description.into(),
            template: agent,
            prompt_suffix: None,
            provide_run_summary: false,
        }
    }

    /// Extra instructions appended to the managed-agent prompt
    pub fn with_prompt_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.prompt_suffix = Some(suffix.into());
        self
    }

    /// Append a short account of the sub-agent's steps to its answer
    pub fn provide_run_summary(mut self, enabled: bool) -> Self {
        self.provide_run_summary = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agent(&self) -> &Agent {
        &self.template
    }
}

#[async_trait]
impl Tool for ManagedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "Long detailed description of the task."
                }
            },
            "required": ["task"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String> {
        let request = required_str(&args, "task", &self.name)?;
        let prompt = prompts::managed_task(&self.name, request, self.prompt_suffix.as_deref());

        tracing::info!(agent = %self.name, "delegating");
        let run = self.template.clone().run(Task::verbatim(prompt)).await;

        let summary = if self.provide_run_summary {
            Some(run.memory.work_summary())
        } else {
            None
        };

        match run.termination {
            Termination::FinalAnswer(answer) => Ok(prompts::managed_report(
                &self.name,
                &answer,
                summary.as_deref(),
            )),
            Termination::StepLimitExceeded => Ok(prompts::managed_report(
                &self.name,
                STEP_LIMIT_MESSAGE,
                summary.as_deref(),
            )),
            Termination::Fault(err) => Err(Error::delegation_failed(
                &self.name,
                format!("managed agent '{}' failed: {}", self.name, err.message()),
            )
            .with_operation("managed_agent::invoke")
            .set_source(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentSettings;
    use delve_error::ErrorKind;
    use delve_runtime::{CompletionResponse, ProviderError, ScriptedProvider, FINAL_ANSWER};
    use std::sync::Arc;

    fn sub_agent(provider: Arc<ScriptedProvider>, max_steps: usize) -> Agent {
        Agent::builder("search_agent", provider)
            .settings(AgentSettings {
                max_steps,
                planning_interval: None,
                verbosity: 0,
            })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_returns_final_answer_report() {
        let provider = Arc::new(ScriptedProvider::new([CompletionResponse::tool_call(
            FINAL_ANSWER,
            json!({"answer": "### 1. Task outcome (short version):\nParis"}),
        )]));
        let managed = ManagedAgent::new(sub_agent(provider.clone(), 3), "searches");

        let out = managed
            .invoke(json!({"task": "Find me the capital of France"}))
            .await
            .unwrap();
        assert!(out.starts_with("Here is the final answer from your managed agent 'search_agent':"));
        assert!(out.contains("Paris"));
        assert!(!out.contains("how 'search_agent' worked"));

        let request = &provider.requests()[0];
        let task_message = request.messages[1].text();
        assert!(task_message.contains("You are a helpful agent named 'search_agent'."));
        assert!(task_message.contains("Find me the capital of France"));
        assert!(!task_message.contains("You have one question to answer"));
    }

    #[tokio::test]
    async fn test_run_summary_and_fresh_budget() {
        let provider = Arc::new(ScriptedProvider::new([
            CompletionResponse::text("thinking"),
            CompletionResponse::tool_call(FINAL_ANSWER, json!({"answer": "first"})),
            CompletionResponse::text("again"),
            CompletionResponse::tool_call(FINAL_ANSWER, json!({"answer": "second"})),
        ]));
        let managed = ManagedAgent::new(sub_agent(provider, 2), "searches")
            .with_prompt_suffix("Use .txt files.")
            .provide_run_summary(true);

        let first = managed.invoke(json!({"task": "one"})).await.unwrap();
        assert!(first.contains("first"));
        assert!(first.contains("Step 1: produced no usable action"));
        assert!(first.contains("Step 2: gave the final answer"));

        // each delegation gets the full two-step budget again
        let second = managed.invoke(json!({"task": "two"})).await.unwrap();
        assert!(second.contains("second"));
    }

    #[tokio::test]
    async fn test_step_limit_reported_as_text() {
        let provider = Arc::new(ScriptedProvider::repeating(CompletionResponse::text("no idea")));
        let managed = ManagedAgent::new(sub_agent(provider, 2), "searches");

        let out = managed.invoke(json!({"task": "x"})).await.unwrap();
        assert!(out.contains(STEP_LIMIT_MESSAGE));
    }

    #[tokio::test]
    async fn test_sub_agent_fault_is_recoverable_error() {
        let provider = Arc::new(ScriptedProvider::new([ProviderError::Network("reset".into())]));
        let managed = ManagedAgent::new(sub_agent(provider, 2), "searches");

        let err = managed.invoke(json!({"task": "x"})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DelegationFailed);
        assert!(!err.is_fatal());
        assert!(err.message().contains("reset"));
    }

    #[test]
    fn test_definition_requires_task() {
        let provider = Arc::new(ScriptedProvider::new([CompletionResponse::tool_call(
            FINAL_ANSWER,
            json!({"answer": "done"}),
        )]));
        let managed = ManagedAgent::new(sub_agent(provider, 1), "searches the web");

        let definition = managed.definition();
        assert_eq!(definition.name, "search_agent");
        assert_eq!(definition.description, "searches the web");
        assert_eq!(definition.parameters["required"], json!(["task"]));

        let out = tokio_test::block_on(managed.invoke(json!({"task": "anything"}))).unwrap();
        assert!(out.contains("done"));
    }

    #[tokio::test]
    async fn test_missing_task_argument() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<CompletionResponse>::new()));
        let managed = ManagedAgent::new(sub_agent(provider, 2), "searches");

        let err = managed.invoke(json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
