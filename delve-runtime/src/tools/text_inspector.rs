//! Reads a local text document, optionally asking the model about it.

use crate::error::{Error, ErrorKind, Result};
use crate::memory::truncate;
use crate::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::tool::{optional_str, required_str, Tool};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

pub const NAME: &str = "inspect_file_as_text";

pub struct TextInspector {
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
    text_limit: usize,
}

impl TextInspector {
    pub fn new(provider: Arc<dyn LlmProvider>, text_limit: usize) -> Self {
        Self {
            provider,
            model: None,
            text_limit,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    async fn read(&self, path: &str) -> Result<String> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            let err = Error::from(e)
                .with_operation("text_inspector::read")
                .with_context("path", path.to_string());
            // the path is model-chosen: a bad one must not end the run
            if err.kind().is_recoverable_in_step() {
                err
            } else {
                Error::tool_failed(NAME, format!("cannot read '{}': {}", path, err.message()))
                    .with_operation("text_inspector::read")
                    .set_source(err)
            }
        })?;

        String::from_utf8(bytes).map_err(|_| {
            Error::tool_failed(NAME, format!("'{}' is not a UTF-8 text document", path))
        })
    }
}

#[async_trait]
impl Tool for TextInspector {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "You cannot load files yourself: instead call this tool to read a file as plain text \
         and ask questions about it. This tool handles text documents such as .txt, .md, .csv, \
         .json or .html files. Pass a question to get an answer about the content instead of \
         the raw text."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The path to the file you want to read as text."
                },
                "question": {
                    "type": "string",
                    "description": "[Optional]: Your question, as a natural language sentence. Provide as much context as possible. Do not pass this parameter if you just want to directly return the content of the file."
                }
            },
            "required": ["file_path"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String> {
        let file_path = required_str(&args, "file_path", NAME)?;
        let content = self.read(file_path).await?;
        let content = truncate(&content, self.text_limit);

        let Some(question) = optional_str(&args, "question") else {
            return Ok(format!("Document content: {}", content));
        };

        let title = Path::new(file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.to_string());

        let messages = vec![
            ChatMessage::system(format!(
                "You will have to write a short caption for this file, then answer this question: {}",
                question
            )),
            ChatMessage::user(format!("Here is the complete file:\n### {}\n\n{}", title, content)),
            ChatMessage::user(format!(
                "Now answer the question below. Use these three headings: '1. Short answer', \
                 '2. Extremely detailed answer', '3. Additional Context on the document and question asked'.\n{}",
                question
            )),
        ];

        let mut request = CompletionRequest::new(messages);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        let response = self.provider.complete(request).await.map_err(|e| {
            Error::new(ErrorKind::ToolFailed, e.to_string())
                .with_operation("text_inspector::ask")
                .with_context("tool", NAME)
        })?;

        response
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::tool_failed(NAME, "model returned an empty answer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CompletionResponse, ScriptedProvider};
    use std::io::Write;

    #[tokio::test]
    async fn test_returns_truncated_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", "a".repeat(50)).unwrap();

        let provider = Arc::new(ScriptedProvider::new(Vec::<CompletionResponse>::new()));
        let tool = TextInspector::new(provider.clone(), 10);

        let out = tool
            .invoke(json!({"file_path": file.path().to_str().unwrap()}))
            .await
            .unwrap();
        assert!(out.starts_with("Document content: aaaaaaaaaa\n"));
        assert!(out.contains("truncated"));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_question_goes_to_model() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "The bridge opened in 1932.").unwrap();

        let provider = Arc::new(ScriptedProvider::new([CompletionResponse::text("1. Short answer: 1932")]));
        let tool = TextInspector::new(provider.clone(), 1000);

        let out = tool
            .invoke(json!({
                "file_path": file.path().to_str().unwrap(),
                "question": "When did the bridge open?"
            }))
            .await
            .unwrap();
        assert_eq!(out, "1. Short answer: 1932");

        let request = &provider.requests()[0];
        assert!(request.messages[1].text().contains("The bridge opened in 1932."));
    }

    #[tokio::test]
    async fn test_missing_file_is_recoverable() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<CompletionResponse>::new()));
        let tool = TextInspector::new(provider, 100);

        let err = tool
            .invoke(json!({"file_path": "/definitely/not/here.txt"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_directory_path_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(Vec::<CompletionResponse>::new()));
        let tool = TextInspector::new(provider, 100);

        let err = tool
            .invoke(json!({"file_path": dir.path().to_str().unwrap()}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolFailed);
        assert!(err.message().starts_with("cannot read"));
        assert!(!err.is_fatal());
    }
}
