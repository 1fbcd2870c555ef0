//! Answering one question end to end.
//!
//! Build the hierarchy, run the manager, reformulate, classify. Whatever
//! fails along the way is folded into the returned [`RunResult`]; nothing
//! escapes as an error.

use crate::agent::{Agent, Termination, STEP_LIMIT_MESSAGE};
use crate::classifier::classify;
use crate::config::RunnerConfig;
use crate::hierarchy::build_hierarchy;
use crate::record::{self, RunRecord, RunResult};
use crate::reformulator::Reformulator;
use delve_error::{Error, Result};
use delve_runtime::{LlmProvider, OpenAIProvider, ProviderConfig, Task};
use std::sync::Arc;

pub struct Runner {
    config: RunnerConfig,
    provider: Arc<dyn LlmProvider>,
}

impl Runner {
    pub fn new(config: RunnerConfig, provider: Arc<dyn LlmProvider>) -> Self {
        Self { config, provider }
    }

    /// Runner talking to the OpenAI-compatible endpoint named in `config`
    pub fn from_config(config: RunnerConfig) -> Result<Self> {
        config.validate()?;

        let model = &config.model;
        let provider = OpenAIProvider::new(
            ProviderConfig::for_base_url(&model.api_base, model.api_key.clone())
                .with_model(model.model_id.clone())
                .with_timeout(model.timeout_secs),
        )
        .map_err(|e| e.into_error("runner::from_config"))?;

        Ok(Self::new(config, Arc::new(provider)))
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Name recorded for every run: the model id
    pub fn agent_name(&self) -> &str {
        &self.config.model.model_id
    }

    /// Answer `question`. Never fails; faults land in the result.
    pub async fn answer(&self, question: &str) -> RunResult {
        self.answer_task(&Task::new(question)).await
    }

    /// Answer and build the record for the results sink
    pub async fn answer_record(&self, question: &str) -> (RunResult, RunRecord) {
        let task = Task::new(question);
        let result = self.answer_task(&task).await;
        let record = RunRecord::new(self.agent_name(), &task, &result);
        (result, record)
    }

    async fn answer_task(&self, task: &Task) -> RunResult {
        let manager = match build_hierarchy(&self.config, self.provider.clone()) {
            Ok(manager) => manager,
            Err(err) => {
                let err = err.with_operation("runner::answer");
                tracing::error!(error = %err, "failed to build agent hierarchy");
                return failed(err, record::now());
            }
        };

        self.run_manager(manager, task).await
    }

    /// Run an already built manager on `task` and fold the outcome into a result.
    pub async fn run_manager(&self, manager: Agent, task: &Task) -> RunResult {
        let start_time = record::now();
        let run = manager.run(task.clone()).await;
        let transcript = run.memory.transcript();

        let (raw_output, answer, fault) = match &run.termination {
            Termination::FinalAnswer(payload) => {
                let reformulator =
                    Reformulator::new(self.provider.clone()).with_model(self.config.model.model_id.clone());
                match reformulator.reformulate(task, &run.memory).await {
                    Ok(answer) => (Some(payload.clone()), Some(answer), None),
                    Err(err) => {
                        tracing::error!(error = %err, "reformulation failed");
                        (Some(payload.clone()), None, Some(err.to_string()))
                    }
                }
            }
            Termination::StepLimitExceeded => (
                Some(STEP_LIMIT_MESSAGE.to_string()),
                Some(STEP_LIMIT_MESSAGE.to_string()),
                None,
            ),
            Termination::Fault(err) => (None, None, Some(err.to_string())),
        };

        let status = classify(raw_output.as_deref(), &transcript, fault.as_deref());
        tracing::info!(status = %status, steps = transcript.len(), "question answered");

        RunResult {
            raw_output,
            answer,
            transcript,
            status,
            error_detail: fault,
            start_time,
            end_time: record::now(),
        }
    }
}

/// Result of a run that raised before the manager took a step
fn failed(err: Error, start_time: String) -> RunResult {
    let detail = err.to_string();
    let status = classify(None, &[], Some(&detail));
    RunResult {
        raw_output: None,
        answer: None,
        transcript: Vec::new(),
        status,
        error_detail: Some(detail),
        start_time,
        end_time: record::now(),
    }
}
