//! The question a run is asked to answer.

use serde::{Deserialize, Serialize};

/// Fixed preamble wrapped around every question before the manager sees it
pub const AUGMENTED_PREAMBLE: &str = "You have one question to answer. It is paramount that you provide a correct answer.
Give it all you can: I know for a fact that you have access to all the relevant tools to solve it and find the correct answer (the answer does exist). Failure or 'I cannot answer' or 'None found' will not be tolerated, success will be rewarded.
Run verification steps if that's needed, you must make sure you find the correct answer!
Here is the task:
";

/// An immutable research question plus its augmented instruction wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    question: String,
    augmented: String,
}

impl Task {
    pub fn new(question: impl Into<String>) -> Self {
        let question = question.into();
        let augmented = format!("{}{}", AUGMENTED_PREAMBLE, question);
        Self { question, augmented }
    }

    /// A task whose prompt is used as given, without the preamble.
    ///
    /// Sub-agents receive their manager's request this way.
    pub fn verbatim(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        Self {
            question: prompt.clone(),
            augmented: prompt,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn augmented(&self) -> &str {
        &self.augmented
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_augmented_wraps_question() {
        let task = Task::new("What is the capital of Australia?");
        assert_eq!(task.question(), "What is the capital of Australia?");
        assert!(task.augmented().starts_with("You have one question to answer."));
        assert!(task.augmented().ends_with("Here is the task:\nWhat is the capital of Australia?"));
    }

    #[test]
    fn test_verbatim() {
        let task = Task::verbatim("Find me the 2019 census figure");
        assert_eq!(task.question(), task.augmented());
    }
}
