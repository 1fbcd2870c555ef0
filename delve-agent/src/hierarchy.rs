//! Wiring the default manager / search-agent hierarchy.
//!
//! Pure construction: nothing here calls a model or a tool.

use crate::agent::Agent;
use crate::config::RunnerConfig;
use crate::managed::ManagedAgent;
use delve_error::Result;
use delve_runtime::prompts::{SEARCH_AGENT_DESCRIPTION, SEARCH_AGENT_SUFFIX};
use delve_runtime::{LlmProvider, TextInspector, Tool, VisitPage, WebSearch};
use std::sync::Arc;

pub const MANAGER_NAME: &str = "manager";
pub const SEARCH_AGENT_NAME: &str = "search_agent";

/// Build the manager agent, with the search agent as its only team member.
///
/// Manager tools: `inspect_file_as_text`. Search agent tools: `web_search`,
/// `visit_page`, `inspect_file_as_text`. Step budgets and planning come from `config`.
pub fn build_hierarchy(config: &RunnerConfig, provider: Arc<dyn LlmProvider>) -> Result<Agent> {
    let model = &config.model;

    let inspector: Arc<dyn Tool> = Arc::new(
        TextInspector::new(provider.clone(), config.text_limit).with_model(model.model_id.clone()),
    );
    let visit_page: Arc<dyn Tool> = Arc::new(VisitPage::new(config.text_limit, config.page_timeout_secs)?);
    let search = &config.search;
    let web_search: Arc<dyn Tool> = Arc::new(
        WebSearch::new(search.api_base.clone(), search.api_key.clone(), config.page_timeout_secs)?
            .with_engine(search.engine.clone())
            .with_num_results(search.num_results),
    );

    let search_agent = Agent::builder(SEARCH_AGENT_NAME, provider.clone())
        .model(model.model_id.clone())
        .temperature(model.temperature)
        .settings(config.search_agent)
        .max_observation_chars(config.max_observation_chars)
        .tool(web_search)
        .tool(visit_page)
        .tool(inspector.clone())
        .build()?;

    let managed = ManagedAgent::new(search_agent, SEARCH_AGENT_DESCRIPTION)
        .with_prompt_suffix(SEARCH_AGENT_SUFFIX)
        .provide_run_summary(true);

    let manager = Agent::builder(MANAGER_NAME, provider)
        .model(model.model_id.clone())
        .temperature(model.temperature)
        .settings(config.manager)
        .max_observation_chars(config.max_observation_chars)
        .tool(inspector)
        .delegate(managed)
        .build()?;

    tracing::debug!(
        manager_steps = config.manager.max_steps,
        search_steps = config.search_agent.max_steps,
        "hierarchy built"
    );

    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_runtime::{CompletionResponse, ScriptedProvider, FINAL_ANSWER};
    use serde_json::json;

    #[test]
    fn test_default_hierarchy_shape() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<CompletionResponse>::new()));
        let config = RunnerConfig::default();
        let manager = build_hierarchy(&config, provider.clone()).unwrap();

        assert_eq!(manager.name(), MANAGER_NAME);
        assert_eq!(manager.settings().max_steps, 12);
        assert_eq!(manager.settings().planning_interval, Some(4));
        assert_eq!(manager.delegates(), &[SEARCH_AGENT_NAME.to_string()]);
        assert_eq!(manager.tools().names(), vec!["inspect_file_as_text", SEARCH_AGENT_NAME]);

        // construction alone never calls the model
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_budgets_follow_config() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<CompletionResponse>::new()));
        let mut config = RunnerConfig::default();
        config.manager.max_steps = 3;
        config.search_agent.max_steps = 7;

        let manager = build_hierarchy(&config, provider).unwrap();
        assert_eq!(manager.settings().max_steps, 3);

        let description = manager.tools().get(SEARCH_AGENT_NAME).unwrap().description().to_string();
        assert!(description.contains("real sentence, not a google search"));
    }

    #[tokio::test]
    async fn test_search_agent_can_search() {
        let provider = Arc::new(ScriptedProvider::new([
            CompletionResponse::tool_call(SEARCH_AGENT_NAME, json!({"task": "Find the tower's height."})),
            CompletionResponse::tool_call(FINAL_ANSWER, json!({"answer": "330 m"})),
            CompletionResponse::tool_call(FINAL_ANSWER, json!({"answer": "330 m"})),
        ]));
        let manager = build_hierarchy(&RunnerConfig::default(), provider.clone()).unwrap();
        manager.run(delve_runtime::Task::new("How tall is the Eiffel Tower?")).await;

        let requests = provider.requests();
        let offered: Vec<String> = requests[1]
            .tools
            .as_ref()
            .unwrap()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(offered, vec!["web_search", "visit_page", "inspect_file_as_text", FINAL_ANSWER]);
    }
}
