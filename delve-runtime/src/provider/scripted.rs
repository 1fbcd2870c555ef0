//! A provider that replays canned responses.
//!
//! Used by tests and dry runs: every `complete` call pops the next reply from
//! the script, so a whole hierarchy (manager, sub-agents, reformulator) runs
//! deterministically against one shared instance.

use super::*;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted reply
#[derive(Debug)]
pub enum ScriptedReply {
    Respond(CompletionResponse),
    Fail(ProviderError),
}

impl From<CompletionResponse> for ScriptedReply {
    fn from(response: CompletionResponse) -> Self {
        ScriptedReply::Respond(response)
    }
}

impl From<ProviderError> for ScriptedReply {
    fn from(error: ProviderError) -> Self {
        ScriptedReply::Fail(error)
    }
}

/// Replays replies in order, then falls back to `repeat` if set
pub struct ScriptedProvider {
    model: String,
    script: Mutex<VecDeque<ScriptedReply>>,
    repeat: Option<CompletionResponse>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new<I, R>(replies: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ScriptedReply>,
    {
        Self {
            model: "scripted".into(),
            script: Mutex::new(replies.into_iter().map(Into::into).collect()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same response
    pub fn repeating(response: CompletionResponse) -> Self {
        Self {
            model: "scripted".into(),
            script: Mutex::new(VecDeque::new()),
            repeat: Some(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Once the script is exhausted, keep answering with `response`
    pub fn then_repeat(mut self, response: CompletionResponse) -> Self {
        self.repeat = Some(response);
        self
    }

    /// Number of `complete` calls served so far
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Snapshot of every request received, in order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Replies not consumed yet
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let next = self
            .script
            .lock()
            .map_err(|_| ProviderError::Other("script lock poisoned".into()))?
            .pop_front();

        match next {
            Some(ScriptedReply::Respond(mut response)) => {
                if response.model.is_empty() {
                    response.model = self.model.clone();
                }
                Ok(response)
            }
            Some(ScriptedReply::Fail(error)) => Err(error),
            None => match &self.repeat {
                Some(response) => Ok(response.clone()),
                None => Err(ProviderError::Other("scripted provider exhausted".into())),
            },
        }
    }
}
