//! Deriving a run's status from how it ended.

use crate::agent::STEP_LIMIT_MESSAGE;
use crate::record::{Outcome, RunStatus};
use delve_runtime::TranscriptEntry;

/// Label a run.
///
/// A fault wins over everything, then the step-limit message anywhere in the
/// output (a manager may forward a sub-agent's stop), then success.
/// `parsing_error` is set whenever any step carries a parsing-error marker,
/// whatever the outcome.
pub fn classify(raw_output: Option<&str>, transcript: &[TranscriptEntry], fault: Option<&str>) -> RunStatus {
    let parsing_error = transcript.iter().any(TranscriptEntry::has_parsing_error);

    let outcome = if fault.is_some() {
        Outcome::RaisedException
    } else if raw_output.is_some_and(|output| output.contains(STEP_LIMIT_MESSAGE)) {
        Outcome::StepLimitExceeded
    } else {
        Outcome::Success
    };

    RunStatus { outcome, parsing_error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_runtime::{ActionStep, AgentMemory, StepError, Task};

    fn transcript(parsing_errors: &[bool]) -> Vec<TranscriptEntry> {
        let mut memory = AgentMemory::new("sys", Task::new("q"));
        for (i, &bad) in parsing_errors.iter().enumerate() {
            let mut step = ActionStep::new(i + 1);
            if bad {
                step.error = Some(StepError::parsing("no JSON"));
            }
            memory.push(step, "m");
        }
        memory.transcript()
    }

    #[test]
    fn test_success_despite_parsing_errors() {
        let status = classify(Some("42"), &transcript(&[true, false]), None);
        assert_eq!(status.outcome, Outcome::Success);
        assert!(status.parsing_error);
    }

    #[test]
    fn test_step_limit() {
        let status = classify(Some(STEP_LIMIT_MESSAGE), &transcript(&[true, true, true]), None);
        assert_eq!(status.outcome, Outcome::StepLimitExceeded);
        assert!(status.parsing_error);
    }

    #[test]
    fn test_forwarded_step_limit() {
        let output = format!("search_agent said: {}", STEP_LIMIT_MESSAGE);
        let status = classify(Some(&output), &transcript(&[false]), None);
        assert_eq!(status.outcome, Outcome::StepLimitExceeded);
        assert!(!status.parsing_error);
    }

    #[test]
    fn test_fault_wins() {
        let status = classify(None, &transcript(&[false]), Some("ToolCrashed => boom"));
        assert_eq!(status.outcome, Outcome::RaisedException);
        assert!(!status.parsing_error);
    }

    #[test]
    fn test_clean_success() {
        let status = classify(Some("Canberra"), &transcript(&[false]), None);
        assert_eq!(status, RunStatus { outcome: Outcome::Success, parsing_error: false });
    }
}
