//! # Delve Agent
//!
//! Hierarchical research agents on top of `delve-runtime`:
//! 1. The caller submits a question
//! 2. A manager agent is built, with a search agent as its team member
//! 3. The manager loops: plan, act (tool or delegation), observe
//! 4. Sub-agents run their own bounded loops and report back one string
//! 5. The transcript is reformulated into a three-section answer
//! 6. The run is classified and a record is appended to the results file
//!
//! The manager decides, the tools fetch, the reformulator writes it up.

pub mod agent;
pub mod classifier;
pub mod config;
pub mod hierarchy;
pub mod managed;
pub mod record;
pub mod reformulator;
pub mod runner;
pub mod sink;

pub use agent::{Agent, AgentBuilder, AgentRun, Termination, STEP_LIMIT_MESSAGE};
pub use classifier::classify;
pub use config::{load_config, AgentSettings, ModelConfig, RunnerConfig, SearchConfig};
pub use hierarchy::{build_hierarchy, MANAGER_NAME, SEARCH_AGENT_NAME};
pub use managed::ManagedAgent;
pub use record::{Outcome, RunRecord, RunResult, RunStatus, StatusFlag};
pub use reformulator::{normalize_sections, short_answer, Reformulator};
pub use runner::Runner;
pub use sink::{ResultSink, SinkHandle};
