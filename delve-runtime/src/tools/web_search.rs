//! Web search through a SerpAPI-compatible endpoint.
//!
//! The endpoint is opaque: one GET with the query, the key and the engine,
//! answered by JSON with an `organic_results` list.

use crate::error::{Error, ErrorKind, Result};
use crate::tool::{required_str, Tool};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const NAME: &str = "web_search";

pub const DEFAULT_ENDPOINT: &str = "https://serpapi.com/search.json";

pub struct WebSearch {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    engine: String,
    num_results: usize,
}

/// Search API response. Only the parts we render.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

impl WebSearch {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("delve/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                Error::new(ErrorKind::ConfigInvalid, "failed to create HTTP client")
                    .with_operation("web_search::new")
                    .set_source(e)
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            engine: "google".to_string(),
            num_results: 10,
        })
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn with_num_results(mut self, num_results: usize) -> Self {
        self.num_results = num_results;
        self
    }

    fn query_params(&self, api_key: &str, query: &str, filter_year: Option<i64>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", query.to_string()),
            ("api_key", api_key.to_string()),
            ("engine", self.engine.clone()),
            ("num", self.num_results.to_string()),
        ];
        if let Some(year) = filter_year {
            params.push(("tbs", format!("cdr:1,cd_min:01/01/{year},cd_max:12/31/{year}")));
        }
        params
    }
}

/// `filter_year` may come as a number or as a string of digits
fn filter_year(args: &Value) -> Result<Option<i64>> {
    match args.get("filter_year") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| Error::invalid_argument("filter_year must be a year").with_context("tool", NAME)),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| {
            Error::invalid_argument(format!("filter_year must be a year, got '{}'", s)).with_context("tool", NAME)
        }),
        Some(other) => Err(Error::invalid_argument(format!("filter_year must be a year, got {}", other))
            .with_context("tool", NAME)),
    }
}

fn render(query: &str, filter_year: Option<i64>, response: SearchResponse) -> Result<String> {
    if let Some(error) = response.error {
        if response.organic_results.is_empty() {
            return Err(Error::tool_failed(NAME, format!("search API error: {}", error)));
        }
    }

    let year_note = filter_year.map(|y| format!(" with filter year={}", y)).unwrap_or_default();
    if response.organic_results.is_empty() {
        return Err(Error::tool_failed(
            NAME,
            format!(
                "No results found for '{}'{}. Try with a more general query, or remove the year filter.",
                query, year_note
            ),
        ));
    }

    let entries: Vec<String> = response
        .organic_results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let mut line = format!("{}. [{}]({})", i + 1, r.title, r.link);
            if let Some(date) = &r.date {
                line.push_str(&format!("\nDate published: {}", date));
            }
            if let Some(source) = &r.source {
                line.push_str(&format!("\nSource: {}", source));
            }
            if let Some(snippet) = &r.snippet {
                line.push_str(&format!("\n{}", snippet));
            }
            line
        })
        .collect();

    Ok(format!(
        "A search for '{}'{} found {} results:\n\n## Web Results\n{}",
        query,
        year_note,
        entries.len(),
        entries.join("\n\n")
    ))
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Perform a web search query (think a google search) and return the search results."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The web search query to perform."
                },
                "filter_year": {
                    "type": "integer",
                    "description": "[Optional]: restrict results to a certain year."
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String> {
        let query = required_str(&args, "query", NAME)?;
        let filter_year = filter_year(&args)?;
        let Some(api_key) = &self.api_key else {
            return Err(Error::tool_failed(
                NAME,
                "web search is not configured (no search API key); use visit_page on known addresses instead",
            ));
        };

        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query_params(api_key, query, filter_year))
            .send()
            .await
            .map_err(|e| {
                Error::new(ErrorKind::NetworkFailed, e.to_string())
                    .with_operation("web_search::get")
                    .with_context("query", query.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::tool_failed(NAME, format!("search API returned HTTP {}", status.as_u16()))
                .with_context("query", query.to_string()));
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            Error::tool_failed(NAME, format!("unreadable search response: {}", e))
                .with_context("query", query.to_string())
        })?;

        render(query, filter_year, body)
    }
}
