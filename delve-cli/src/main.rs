//! # Delve CLI
//!
//! Answer research questions with a manager agent and its search agent.
//!
//! Usage:
//!   delve --question <text>
//!   delve --questions-file <file>
//!
//! Examples:
//!   delve --question "Which year was the Eiffel Tower completed?"
//!   delve --questions-file questions.txt --concurrency 8 --output output/run.jsonl
//!   delve -q "..." --model-id openai/gpt-4o --api-base https://openrouter.ai/api/v1

mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use delve_agent::{load_config, ResultSink, RunResult, Runner, RunnerConfig};
use delve_runtime::memory::truncate;
use futures_util::stream::{self, StreamExt};
use std::path::{Path, PathBuf};

const API_KEY_VARS: [&str; 2] = ["DELVE_API_KEY", "OPENAI_API_KEY"];
const SEARCH_KEY_VAR: &str = "SERPAPI_API_KEY";

#[derive(Parser)]
#[command(name = "delve")]
#[command(author, version, about = "Delve - hierarchical research agents")]
struct Cli {
    /// Question to answer
    #[arg(short = 'q', long, conflicts_with = "questions_file", required_unless_present = "questions_file")]
    question: Option<String>,

    /// File with one question per line
    #[arg(short = 'f', long)]
    questions_file: Option<PathBuf>,

    /// Model identifier sent to the API
    #[arg(long)]
    model_id: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long)]
    api_base: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSONL file the run records are appended to
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Questions answered in parallel (batch mode)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Show info logs and the execution trace
    #[arg(short, long)]
    verbose: bool,

    /// Only print the answer
    #[arg(long)]
    quiet: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = resolve_config(&cli)?;
    let output_path = config.output_path.clone();
    let concurrency = config.concurrency;
    let runner = Runner::from_config(config)?;

    let sink = ResultSink::open(&output_path)
        .await
        .with_context(|| format!("failed to open results file {}", output_path.display()))?;

    match (&cli.question, &cli.questions_file) {
        (Some(question), _) => {
            let (result, record) = runner.answer_record(question).await;
            print_result(&result, cli.verbose, cli.quiet);
            sink.append(record).await?;
        }
        (None, Some(file)) => {
            let questions = read_questions(file)?;
            run_batch(&runner, &sink, questions, concurrency, cli.quiet).await?;
        }
        (None, None) => bail!("either --question or --questions-file is required"),
    }

    let written = sink.close().await?;
    if !cli.quiet {
        eprintln!("{} record(s) appended to {}", written, output_path.display());
    }
    Ok(())
}

/// Defaults, then the config file, then flags and the environment.
fn resolve_config(cli: &Cli) -> Result<RunnerConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RunnerConfig::default(),
    };

    if let Some(model_id) = &cli.model_id {
        config.model.model_id = model_id.clone();
    }
    if let Some(api_base) = &cli.api_base {
        config.model.api_base = api_base.clone();
    }
    if let Some(output) = &cli.output {
        config.output_path = output.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if config.model.api_key.is_none() {
        config.model.api_key = API_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty());
    }
    if config.search.api_key.is_none() {
        config.search.api_key = std::env::var(SEARCH_KEY_VAR).ok().filter(|key| !key.is_empty());
        if config.search.api_key.is_none() {
            tracing::warn!("{} is not set; web_search will be unavailable", SEARCH_KEY_VAR);
        }
    }

    config.validate()?;
    Ok(config)
}

fn read_questions(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let questions: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    if questions.is_empty() {
        bail!("{} contains no questions", path.display());
    }
    Ok(questions)
}

async fn run_batch(
    runner: &Runner,
    sink: &ResultSink,
    questions: Vec<String>,
    concurrency: usize,
    quiet: bool,
) -> Result<()> {
    let total = questions.len();
    let handle = sink.handle();

    let mut answered = stream::iter(questions)
        .map(|question| async move {
            let (result, record) = runner.answer_record(&question).await;
            (question, result, record)
        })
        .buffer_unordered(concurrency);

    let mut done = 0;
    let mut succeeded = 0;
    while let Some((question, result, record)) = answered.next().await {
        done += 1;
        if result.status.is_success() {
            succeeded += 1;
        }
        handle.append(record).await?;

        if !quiet {
            println!("[{}/{}] {} {}", done, total, result.status, truncate(&question, 80));
        }
    }

    if !quiet {
        println!("\n{} of {} question(s) answered successfully", succeeded, total);
    }
    Ok(())
}

fn print_result(result: &RunResult, verbose: bool, quiet: bool) {
    if !quiet {
        println!("\n--- FINAL ANSWER ({}) ---\n", result.status);
    }

    match (&result.answer, &result.error_detail) {
        (Some(answer), _) => println!("{}", answer),
        (None, Some(detail)) => eprintln!("Error: {}", detail),
        (None, None) => eprintln!("Error: no answer produced"),
    }

    if verbose && !quiet {
        if let Some(raw) = &result.raw_output {
            println!("\nRaw Output:\n{}", raw);
        }

        println!("\n--- Execution Trace ({} steps) ---", result.transcript.len());
        for entry in &result.transcript {
            let action = entry
                .action
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "(none)".to_string());
            println!("  {}. {}", entry.step, truncate(&action, 100));
            if let Some(error) = &entry.error {
                println!("     {}: {}", error.kind, truncate(&error.message, 100));
            } else if let Some(observation) = &entry.observation {
                println!("     -> {}", truncate(observation, 100));
            }
        }
    }
}
