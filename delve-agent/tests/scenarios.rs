//! End-to-end runs against a scripted model.

use async_trait::async_trait;
use delve_agent::{
    Agent, AgentSettings, Outcome, ResultSink, RunRecord, Runner, RunnerConfig, StatusFlag,
    STEP_LIMIT_MESSAGE,
};
use delve_error::{Error, Result};
use delve_runtime::{
    Action, CompletionResponse, ProviderError, ScriptedProvider, ScriptedReply, StepErrorKind, Task,
    TextInspector, Tool, FINAL_ANSWER,
};
use serde_json::{json, Value};
use std::sync::Arc;

const REFORMULATED: &str = "### 1. Task outcome (short version):\n42\n\n\
### 2. Task outcome (extremely detailed version):\nThe manager answered directly.\n\n\
### 3. Additional context (if relevant):\nNone.";

fn final_answer(payload: &str) -> CompletionResponse {
    CompletionResponse::tool_call(FINAL_ANSWER, json!({ "answer": payload }))
}

fn runner(provider: Arc<ScriptedProvider>, configure: impl FnOnce(&mut RunnerConfig)) -> Runner {
    let mut config = RunnerConfig::default();
    config.manager.verbosity = 0;
    config.search_agent.verbosity = 0;
    configure(&mut config);
    Runner::new(config, provider)
}

fn assert_contiguous(result: &delve_agent::RunResult) {
    assert!(!result.transcript.is_empty());
    for (i, entry) in result.transcript.iter().enumerate() {
        assert_eq!(entry.step, i + 1);
    }
}

#[tokio::test]
async fn final_answer_on_first_step() {
    let provider = Arc::new(ScriptedProvider::new([
        final_answer("42"),
        CompletionResponse::text(REFORMULATED),
    ]));
    let result = runner(provider.clone(), |_| {}).answer("What is 6 x 7?").await;

    assert_eq!(result.status.outcome, Outcome::Success);
    assert_eq!(result.status.flags(), vec![StatusFlag::Success]);
    assert_eq!(result.transcript.len(), 1);
    assert_eq!(result.raw_output.as_deref(), Some("42"));
    assert_eq!(result.answer.as_deref(), Some(REFORMULATED));
    assert!(result.error_detail.is_none());

    // the reformulator saw exactly the one step
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    let steps_seen = requests[1]
        .messages
        .iter()
        .filter(|m| m.text().starts_with("Calling tools:"))
        .count();
    assert_eq!(steps_seen, 1);
}

#[tokio::test]
async fn always_unparseable_hits_step_limit() {
    let provider = Arc::new(ScriptedProvider::repeating(CompletionResponse::text(
        "I am not sure what to do.",
    )));
    let result = runner(provider.clone(), |c| c.manager.max_steps = 3)
        .answer("Unanswerable?")
        .await;

    assert_eq!(result.status.outcome, Outcome::StepLimitExceeded);
    assert!(result.status.parsing_error);
    assert_eq!(
        result.status.flags(),
        vec![StatusFlag::ParsingError, StatusFlag::StepLimitExceeded]
    );
    assert_eq!(result.answer.as_deref(), Some(STEP_LIMIT_MESSAGE));
    assert_eq!(result.transcript.len(), 3);
    assert!(result
        .transcript
        .iter()
        .all(|e| e.error.as_ref().map(|err| err.kind) == Some(StepErrorKind::ParsingError)));
    assert_contiguous(&result);

    // no reformulation after a step-limit stop
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn success_despite_earlier_parsing_error() {
    let provider = Arc::new(ScriptedProvider::new([
        CompletionResponse::text("let me think"),
        final_answer("42"),
        CompletionResponse::text(REFORMULATED),
    ]));
    let result = runner(provider, |_| {}).answer("What is 6 x 7?").await;

    assert_eq!(result.status.outcome, Outcome::Success);
    assert!(result.status.parsing_error);
    assert_eq!(result.transcript.len(), 2);
    assert_contiguous(&result);
}

#[tokio::test]
async fn delegation_returns_one_entry_and_hides_sub_memory() {
    let provider = Arc::new(ScriptedProvider::new([
        CompletionResponse::tool_call(
            "search_agent",
            json!({"task": "Find me the capital of France, with a source."}),
        ),
        CompletionResponse::text("sub-agent thinking out loud"),
        final_answer("### 1. Task outcome (short version):\nParis"),
        final_answer("Paris"),
        CompletionResponse::text("1. Task outcome: Paris\n2. Task outcome detailed: via search\n3. Additional context: none"),
    ]));
    let result = runner(provider.clone(), |_| {})
        .answer("What is the capital of France?")
        .await;

    assert_eq!(result.status.outcome, Outcome::Success);
    assert!(!result.status.parsing_error);
    assert_eq!(result.transcript.len(), 2);

    let delegation = &result.transcript[0];
    assert!(matches!(delegation.action, Some(Action::Delegate { ref name, .. }) if name == "search_agent"));
    let observation = delegation.observation.as_deref().unwrap();
    assert!(observation.starts_with("Here is the final answer from your managed agent 'search_agent':"));
    assert!(observation.contains("Paris"));
    assert!(observation.contains("Step 2: gave the final answer"));

    for entry in &result.transcript {
        let output = entry.model_output.as_deref().unwrap_or("");
        assert!(!output.contains("sub-agent thinking out loud"));
    }
    assert_eq!(provider.remaining(), 0);
}

#[tokio::test]
async fn model_failure_is_raised_exception() {
    let provider = Arc::new(ScriptedProvider::new([ProviderError::Api {
        status: 503,
        message: "model overloaded".into(),
    }]));
    let result = runner(provider, |_| {}).answer("q").await;

    assert_eq!(result.status.outcome, Outcome::RaisedException);
    assert!(result.error_detail.as_deref().unwrap().contains("model overloaded"));
    assert_eq!(result.transcript.len(), 1);
    assert!(result.answer.is_none());
}

#[tokio::test]
async fn reformulation_failure_is_raised_exception() {
    let provider = Arc::new(ScriptedProvider::new([
        final_answer("42").into(),
        ScriptedReply::Fail(ProviderError::Network(
            "connection reset".into(),
        )),
    ]));
    let result = runner(provider, |_| {}).answer("q").await;

    assert_eq!(result.status.outcome, Outcome::RaisedException);
    assert_eq!(result.raw_output.as_deref(), Some("42"));
    assert!(result.error_detail.as_deref().unwrap().contains("connection reset"));
}

struct Shredder;

#[async_trait]
impl Tool for Shredder {
    fn name(&self) -> &str {
        "shredder"
    }

    fn description(&self) -> &str {
        "Always crashes"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn invoke(&self, _args: Value) -> Result<String> {
        Err(Error::tool_crashed("shredder", "disk controller on fire"))
    }
}

#[tokio::test]
async fn fatal_tool_fault_is_raised_exception() {
    let provider = Arc::new(ScriptedProvider::new([
        CompletionResponse::text("warming up"),
        CompletionResponse::tool_call("shredder", json!({})),
        final_answer("never reached"),
    ]));
    let runner = runner(provider.clone(), |_| {});
    let manager = Agent::builder("manager", provider.clone())
        .settings(AgentSettings { max_steps: 5, planning_interval: None, verbosity: 0 })
        .tool(Arc::new(Shredder))
        .build()
        .unwrap();

    let result = runner.run_manager(manager, &Task::new("q")).await;

    assert_eq!(result.status.outcome, Outcome::RaisedException);
    assert!(result.status.parsing_error);
    assert!(result.error_detail.as_deref().unwrap().contains("disk controller on fire"));
    assert_eq!(result.transcript.len(), 2);
    assert_eq!(
        result.transcript[1].error.as_ref().unwrap().kind,
        StepErrorKind::Fault
    );
    assert_eq!(provider.remaining(), 1);
}

#[tokio::test]
async fn reformulation_is_deterministic() {
    let reply = "Sure.\n**1. Task outcome (short version):** 42\n2. Task outcome (extremely detailed version): math\n3. Additional context: none";

    let mut answers = Vec::new();
    for _ in 0..2 {
        let provider = Arc::new(ScriptedProvider::new([
            final_answer("42"),
            CompletionResponse::text(reply),
        ]));
        let result = runner(provider, |_| {}).answer("What is 6 x 7?").await;
        answers.push(result.answer.unwrap());
    }

    assert_eq!(answers[0], answers[1]);
    assert_eq!(delve_agent::short_answer(&answers[0]), "Sure.\n42");
}

#[tokio::test]
async fn records_reach_the_sink() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("answers.jsonl");

    let provider = Arc::new(ScriptedProvider::new([
        final_answer("42"),
        CompletionResponse::text(REFORMULATED),
    ]));
    let runner = runner(provider, |_| {});
    let sink = ResultSink::open(&path).await.unwrap();

    let (_, record) = runner.answer_record("What is 6 x 7?").await;
    sink.append(record).await.unwrap();
    assert_eq!(sink.close().await.unwrap(), 1);

    let line = std::fs::read_to_string(&path).unwrap();
    let record: RunRecord = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(record.agent_name, "gpt-3.5-turbo-1106");
    assert_eq!(record.question, "What is 6 x 7?");
    assert!(record.augmented_question.starts_with("You have one question to answer."));
    assert_eq!(record.prediction.as_deref(), Some(REFORMULATED));
    assert_eq!(record.intermediate_steps.len(), 1);
    assert!(!record.parsing_error);
    assert!(!record.iteration_limit_exceeded);
    assert!(record.agent_error.is_none());
}

#[tokio::test]
async fn zero_planning_interval_is_raised_exception() {
    let provider = Arc::new(ScriptedProvider::repeating(final_answer("42")));
    let result = runner(provider.clone(), |c| c.manager.planning_interval = Some(0))
        .answer("q")
        .await;

    assert_eq!(result.status.outcome, Outcome::RaisedException);
    assert!(result.error_detail.as_deref().unwrap().contains("planning_interval"));
    assert!(result.transcript.is_empty());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn unreadable_file_is_a_step_error_not_a_fault() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::new([
        CompletionResponse::tool_call(
            "inspect_file_as_text",
            json!({"file_path": dir.path().to_str().unwrap()}),
        ),
        final_answer("42"),
        CompletionResponse::text(REFORMULATED),
    ]));
    let runner = runner(provider.clone(), |_| {});
    let manager = Agent::builder("manager", provider.clone())
        .settings(AgentSettings { max_steps: 5, planning_interval: None, verbosity: 0 })
        .tool(Arc::new(TextInspector::new(provider.clone(), 1_000)))
        .build()
        .unwrap();

    let result = runner.run_manager(manager, &Task::new("q")).await;

    assert_eq!(result.status.outcome, Outcome::Success);
    assert_eq!(result.transcript.len(), 2);
    let error = result.transcript[0].error.as_ref().unwrap();
    assert_eq!(error.kind, StepErrorKind::ToolError);
    assert!(error.message.contains("cannot read"));
    assert_eq!(result.raw_output.as_deref(), Some("42"));
    assert_eq!(provider.remaining(), 0);
}

#[tokio::test]
async fn forwarded_step_limit_sets_iteration_flag() {
    let forwarded = format!("search_agent said: {}", STEP_LIMIT_MESSAGE);
    let provider = Arc::new(ScriptedProvider::new([
        final_answer(&forwarded),
        CompletionResponse::text(REFORMULATED),
    ]));
    let (result, record) = runner(provider, |_| {}).answer_record("q").await;

    assert_eq!(result.status.outcome, Outcome::StepLimitExceeded);
    assert!(record.iteration_limit_exceeded);
    assert!(record.agent_error.is_none());
}
