//! Runner configuration, optionally loaded from a TOML file.
//!
//! Built once at process start and passed by reference. Nothing below the
//! runner reads the environment.

use delve_error::{Error, Result};
use delve_runtime::tools::web_search::DEFAULT_ENDPOINT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Model endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Model id sent with every request; also recorded as `agent_name`
    pub model_id: String,

    /// Base URL of an OpenAI-compatible API
    pub api_base: String,

    /// Bearer token. Never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Per-request timeout
    pub timeout_secs: u64,

    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: "gpt-3.5-turbo-1106".to_string(),
            api_base: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            timeout_secs: 300,
            temperature: None,
        }
    }
}

/// Web search endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// SerpAPI-compatible search URL
    pub api_base: String,

    /// Search API key. Never written back out. Without one `web_search`
    /// answers every call with a recoverable error.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub engine: String,

    pub num_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            engine: "google".to_string(),
            num_results: 10,
        }
    }
}

/// Loop bounds for one agent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSettings {
    pub max_steps: usize,

    /// Inject a planning note every this many steps (and before the first)
    #[serde(default)]
    pub planning_interval: Option<usize>,

    /// 0: warnings only, 1: step summaries, 2: model output and observations
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,
}

fn default_verbosity() -> u8 {
    1
}

impl AgentSettings {
    pub fn manager() -> Self {
        Self {
            max_steps: 12,
            planning_interval: Some(4),
            verbosity: 2,
        }
    }

    pub fn search_agent() -> Self {
        Self {
            max_steps: 20,
            planning_interval: Some(4),
            verbosity: 2,
        }
    }

    fn validate(&self, which: &'static str) -> Result<()> {
        if self.max_steps == 0 {
            return Err(Error::config_invalid(format!("{}.max_steps must be > 0", which)));
        }
        if self.planning_interval == Some(0) {
            return Err(Error::config_invalid(format!(
                "{}.planning_interval must be > 0 (omit it to disable planning)",
                which
            )));
        }
        if self.verbosity > 2 {
            return Err(Error::config_invalid(format!("{}.verbosity must be 0, 1 or 2", which)));
        }
        Ok(())
    }
}

/// Everything a run needs to know, in one place
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    pub model: ModelConfig,

    pub search: SearchConfig,

    pub manager: AgentSettings,

    pub search_agent: AgentSettings,

    /// Characters kept from a document or web page
    pub text_limit: usize,

    /// Characters kept from any single observation in memory
    pub max_observation_chars: usize,

    /// Timeout for `visit_page` fetches and search requests
    pub page_timeout_secs: u64,

    /// Questions answered in parallel in batch mode
    pub concurrency: usize,

    /// JSONL file records are appended to
    pub output_path: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            search: SearchConfig::default(),
            manager: AgentSettings::manager(),
            search_agent: AgentSettings::search_agent(),
            text_limit: 100_000,
            max_observation_chars: 20_000,
            page_timeout_secs: 30,
            concurrency: 4,
            output_path: PathBuf::from("output/answers.jsonl"),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.model_id.trim().is_empty() {
            return Err(Error::config_invalid("model.model_id must not be empty"));
        }
        if !(self.model.api_base.starts_with("http://") || self.model.api_base.starts_with("https://")) {
            return Err(Error::config_invalid(format!(
                "model.api_base must be an http(s) URL, got '{}'",
                self.model.api_base
            )));
        }
        if self.model.timeout_secs == 0 {
            return Err(Error::config_invalid("model.timeout_secs must be > 0"));
        }
        if !(self.search.api_base.starts_with("http://") || self.search.api_base.starts_with("https://")) {
            return Err(Error::config_invalid(format!(
                "search.api_base must be an http(s) URL, got '{}'",
                self.search.api_base
            )));
        }
        if self.search.num_results == 0 {
            return Err(Error::config_invalid("search.num_results must be > 0"));
        }
        self.manager.validate("manager")?;
        self.search_agent.validate("search_agent")?;
        if self.text_limit == 0 {
            return Err(Error::config_invalid("text_limit must be > 0"));
        }
        if self.max_observation_chars == 0 {
            return Err(Error::config_invalid("max_observation_chars must be > 0"));
        }
        if self.concurrency == 0 {
            return Err(Error::config_invalid("concurrency must be > 0"));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(Error::config_invalid("output_path must not be empty"));
        }
        Ok(())
    }
}

/// Load and validate config from a TOML file.
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    let contents = fs::read_to_string(path).map_err(|e| {
        Error::from(e)
            .with_operation("config::load")
            .with_context("path", path.display().to_string())
    })?;
    let cfg: RunnerConfig = toml::from_str(&contents).map_err(|e| {
        Error::config_invalid(format!("parse {}", path.display()))
            .with_operation("config::load")
            .set_source(e)
    })?;
    cfg.validate()?;
    Ok(cfg)
}
