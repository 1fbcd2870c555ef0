//! Second model pass turning a finished transcript into a structured answer.
//!
//! The model reads the original task and the manager's memory (summary mode,
//! all turns replayed as user messages) and answers under three headings.
//! Its reply is then normalised into the canonical layout, so the same model
//! text always yields the same bytes.

use delve_error::{Error, Result};
use delve_runtime::prompts::{self, SECTION_HEADINGS};
use delve_runtime::{AgentMemory, ChatMessage, CompletionRequest, LlmProvider, Task};
use std::sync::Arc;

pub struct Reformulator {
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
}

impl Reformulator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider, model: None }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Messages sent to the model for `task` and `memory`
    pub fn messages(task: &Task, memory: &AgentMemory) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(prompts::reformulation_system(task.augmented()))];

        for message in memory.to_messages(true) {
            let text = message.text();
            if text.trim().is_empty() {
                continue;
            }
            messages.push(ChatMessage::user(text.to_string()));
        }

        messages.push(ChatMessage::user(prompts::reformulation_request(task.augmented())));
        messages
    }

    /// One model call, no retries. A failure here fails the whole run.
    pub async fn reformulate(&self, task: &Task, memory: &AgentMemory) -> Result<String> {
        let mut request = CompletionRequest::new(Self::messages(task, memory)).with_temperature(0.0);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| e.into_error("reformulator::reformulate"))?;

        let reply = response
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                Error::inference_failed("reformulation model returned no text")
                    .with_operation("reformulator::reformulate")
            })?;

        Ok(normalize_sections(&reply))
    }
}

/// Rewrite a reply into the canonical three-section layout.
///
/// Headings are recognised loosely (`1.`, `2.`, `3.` after optional `#`/`*`
/// markup) and must appear in order. Text before the first heading belongs to
/// section 1. A reply without headings becomes section 1 in full.
pub fn normalize_sections(reply: &str) -> String {
    let mut sections: [Vec<&str>; 3] = Default::default();
    let mut current = 0usize;
    let mut expected = 1usize;

    for line in reply.lines() {
        match heading_number(line) {
            Some(n) if n == expected => {
                current = n - 1;
                expected = n + 1;
                if let Some(inline) = inline_content(line) {
                    sections[current].push(inline);
                }
            }
            _ => sections[current].push(line),
        }
    }

    let bodies: Vec<String> = sections
        .iter()
        .map(|lines| lines.join("\n").trim().to_string())
        .collect();

    format!(
        "{}\n{}\n\n{}\n{}\n\n{}\n{}",
        SECTION_HEADINGS[0], bodies[0], SECTION_HEADINGS[1], bodies[1], SECTION_HEADINGS[2], bodies[2]
    )
}

/// Short answer: the body of section 1 of a normalised answer
pub fn short_answer(normalized: &str) -> &str {
    normalized
        .strip_prefix(SECTION_HEADINGS[0])
        .and_then(|rest| rest.split(SECTION_HEADINGS[1]).next())
        .map(str::trim)
        .unwrap_or_else(|| normalized.trim())
}

fn heading_number(line: &str) -> Option<usize> {
    let trimmed = line.trim().trim_start_matches(&['#', '*', ' '][..]);
    let mut chars = trimmed.chars();
    let digit = chars.next()?.to_digit(10)? as usize;
    if !(1..=3).contains(&digit) || chars.next()? != '.' {
        return None;
    }
    let rest = chars.as_str().to_lowercase();
    let looks_like_heading = rest.contains("outcome")
        || rest.contains("answer")
        || rest.contains("context");
    looks_like_heading.then_some(digit)
}

fn inline_content(line: &str) -> Option<&str> {
    let (_, after) = line.split_once(':')?;
    let after = after.trim().trim_start_matches('*').trim();
    (!after.is_empty()).then_some(after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_error::ErrorKind;
    use delve_runtime::{ActionStep, CompletionResponse, ProviderError, Role, ScriptedProvider};

    const CANONICAL: &str = "### 1. Task outcome (short version):\n42\n\n\
### 2. Task outcome (extremely detailed version):\nSix times seven.\n\n\
### 3. Additional context (if relevant):\nNone.";

    #[test]
    fn test_canonical_is_fixed_point() {
        assert_eq!(normalize_sections(CANONICAL), CANONICAL);
    }

    #[test]
    fn test_loose_headings() {
        let reply = "Here you go.\n**1. Task outcome (short version):** 42\n\n## 2. Task outcome (extremely detailed version)\nSix times seven.\n3. Additional context: None.";
        let out = normalize_sections(reply);
        assert_eq!(
            out,
            "### 1. Task outcome (short version):\nHere you go.\n42\n\n\
### 2. Task outcome (extremely detailed version):\nSix times seven.\n\n\
### 3. Additional context (if relevant):\nNone."
        );
        assert_eq!(short_answer(&out), "Here you go.\n42");
    }

    #[test]
    fn test_no_headings() {
        let out = normalize_sections("Just 42.");
        assert!(out.starts_with("### 1. Task outcome (short version):\nJust 42.\n\n"));
        assert_eq!(short_answer(&out), "Just 42.");
    }

    #[test]
    fn test_numbered_lists_inside_sections_are_kept() {
        let reply = "1. Task outcome: 7\n2. Detailed answer:\n1. first point\n2. second point\n3. Additional context: none";
        let out = normalize_sections(reply);
        assert!(out.contains("### 2. Task outcome (extremely detailed version):\n1. first point\n2. second point"));
    }

    fn memory() -> AgentMemory {
        let mut memory = AgentMemory::new("system text", Task::new("What is 6 x 7?"));
        let mut step = ActionStep::new(1);
        step.model_input = vec![ChatMessage::user("huge payload")];
        step.action = Some(delve_runtime::Action::FinalAnswer { payload: "42".into() });
        memory.push(step, "m");
        memory
    }

    #[test]
    fn test_messages_are_user_turns_without_model_input() {
        let task = Task::new("What is 6 x 7?");
        let messages = Reformulator::messages(&task, &memory());

        assert_eq!(messages[0].role, Role::System);
        assert!(messages[1..].iter().all(|m| m.role == Role::User));
        assert!(!messages.iter().any(|m| m.text().contains("huge payload")));
        assert!(!messages.iter().any(|m| m.text().contains("system text")));
        assert!(messages.last().unwrap().text().contains(SECTION_HEADINGS[2]));
    }

    #[tokio::test]
    async fn test_deterministic_output() {
        let reply = "1. Task outcome: 42\n2. Task outcome detailed: because\n3. Additional context: none";
        let provider = Arc::new(ScriptedProvider::repeating(CompletionResponse::text(reply)));
        let reformulator = Reformulator::new(provider.clone());
        let task = Task::new("What is 6 x 7?");
        let memory = memory();

        let a = reformulator.reformulate(&task, &memory).await.unwrap();
        let b = reformulator.reformulate(&task, &memory).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(provider.requests()[0].messages, provider.requests()[1].messages);
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::new([ProviderError::AuthenticationFailed]));
        let err = Reformulator::new(provider)
            .reformulate(&Task::new("q"), &memory())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert_eq!(err.operation(), "reformulator::reformulate");
    }
}
