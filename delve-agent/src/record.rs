//! Run results and the records written to the results sink.

use delve_runtime::{Task, TranscriptEntry};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp layout used in results and records
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in [`TIME_FORMAT`]
pub fn now() -> String {
    chrono::Local::now().format(TIME_FORMAT).to_string()
}

/// Terminal outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    StepLimitExceeded,
    RaisedException,
}

/// One label of the status taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusFlag {
    Success,
    ParsingError,
    StepLimitExceeded,
    RaisedException,
}

impl fmt::Display for StatusFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusFlag::Success => "Success",
            StatusFlag::ParsingError => "ParsingError",
            StatusFlag::StepLimitExceeded => "StepLimitExceeded",
            StatusFlag::RaisedException => "RaisedException",
        };
        write!(f, "{}", s)
    }
}

/// Outcome plus the parsing-error flag, which can hold alongside any outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    pub outcome: Outcome,
    pub parsing_error: bool,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Every flag that holds, parsing error first
    pub fn flags(&self) -> Vec<StatusFlag> {
        let mut flags = Vec::with_capacity(2);
        if self.parsing_error {
            flags.push(StatusFlag::ParsingError);
        }
        flags.push(match self.outcome {
            Outcome::Success => StatusFlag::Success,
            Outcome::StepLimitExceeded => StatusFlag::StepLimitExceeded,
            Outcome::RaisedException => StatusFlag::RaisedException,
        });
        flags
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags: Vec<String> = self.flags().iter().map(ToString::to_string).collect();
        write!(f, "{}", flags.join("+"))
    }
}

/// Everything the caller learns about one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// What the manager's loop produced before reformulation
    pub raw_output: Option<String>,
    /// The structured answer, or the step-limit message
    pub answer: Option<String>,
    /// The manager's steps only; sub-agent memory never appears here
    pub transcript: Vec<TranscriptEntry>,
    pub status: RunStatus,
    /// The fault, verbatim, when the run raised
    pub error_detail: Option<String>,
    pub start_time: String,
    pub end_time: String,
}

/// One JSON line in the results file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub agent_name: String,
    pub question: String,
    pub augmented_question: String,
    pub prediction: Option<String>,
    pub intermediate_steps: Vec<TranscriptEntry>,
    pub parsing_error: bool,
    pub iteration_limit_exceeded: bool,
    pub agent_error: Option<String>,
    pub start_time: String,
    pub end_time: String,
}

impl RunRecord {
    pub fn new(agent_name: impl Into<String>, task: &Task, result: &RunResult) -> Self {
        Self {
            agent_name: agent_name.into(),
            question: task.question().to_string(),
            augmented_question: task.augmented().to_string(),
            prediction: result.answer.clone(),
            intermediate_steps: result.transcript.clone(),
            parsing_error: result.status.parsing_error,
            iteration_limit_exceeded: result.status.outcome == Outcome::StepLimitExceeded,
            agent_error: result.error_detail.clone(),
            start_time: result.start_time.clone(),
            end_time: result.end_time.clone(),
        }
    }
}
