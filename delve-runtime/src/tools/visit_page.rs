//! Fetches a web page over HTTP GET and returns its body as text.

use crate::error::{Error, ErrorKind, Result};
use crate::memory::truncate;
use crate::tool::{required_str, Tool};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

pub const NAME: &str = "visit_page";

pub struct VisitPage {
    client: Client,
    text_limit: usize,
}

impl VisitPage {
    pub fn new(text_limit: usize, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("delve/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                Error::new(ErrorKind::ConfigInvalid, "failed to create HTTP client")
                    .with_operation("visit_page::new")
                    .set_source(e)
            })?;

        Ok(Self { client, text_limit })
    }
}

fn validate_url(url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!("'{}' is not an http(s) address", url))
            .with_context("tool", NAME))
    }
}

#[async_trait]
impl Tool for VisitPage {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Visit a webpage at a given URL and return its text content."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The relative or absolute url of the webpage to visit."
                }
            },
            "required": ["url"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String> {
        let url = required_str(&args, "url", NAME)?;
        validate_url(url)?;

        let response = self.client.get(url).send().await.map_err(|e| {
            Error::new(ErrorKind::NetworkFailed, e.to_string())
                .with_operation("visit_page::get")
                .with_context("url", url.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::tool_failed(NAME, format!("HTTP {} for {}", status.as_u16(), url))
                .with_context("url", url.to_string()));
        }

        let body = response.text().await.map_err(|e| {
            Error::tool_failed(NAME, format!("failed to read body: {}", e))
                .with_context("url", url.to_string())
        })?;

        Ok(format!("Address: {}\nViewport:\n{}", url, truncate(&body, self.text_limit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_urls() {
        assert!(validate_url("https://example.org").is_ok());
        assert!(validate_url("http://example.org/a?b=c").is_ok());

        let err = validate_url("file:///etc/passwd").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_missing_url_argument() {
        let tool = VisitPage::new(100, 5).unwrap();
        let err = tool.invoke(json!({"address": "x"})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(tool.definition().name, NAME);
    }
}
