//! # Prompt Text
//!
//! Every string the runtime shows a model: the agent system prompt, the
//! planning checkpoint, the managed-agent wrapper and the reformulation
//! frame. Kept in one place so wording changes never touch loop logic.

use crate::provider::ToolDefinition;

/// Headings of the three-section structured answer
pub const SECTION_HEADINGS: [&str; 3] = [
    "### 1. Task outcome (short version):",
    "### 2. Task outcome (extremely detailed version):",
    "### 3. Additional context (if relevant):",
];

/// Prompt wrapped around a manager's request before a sub-agent runs it.
/// `{name}` and `{task}` are substituted.
pub const MANAGED_AGENT_PROMPT: &str = "You are a helpful agent named '{name}'.
You have been submitted this task by your manager.
---
Task:
{task}
---
You're helping your manager solve a wider task: so make sure to not provide a one-line answer, but give as much information as possible to give them a clear understanding of the answer.

Your final_answer WILL HAVE to contain these parts:
### 1. Task outcome (short version):
### 2. Task outcome (extremely detailed version):
### 3. Additional context (if relevant):

Put all these in your final_answer tool, everything that you do not pass as an argument to final_answer will be lost.
And even if your task resolution is not successful, please return as much context as possible, so that your manager can act upon this feedback.
";

/// Extra instructions appended for the web search sub-agent
pub const SEARCH_AGENT_SUFFIX: &str = "You can navigate to .txt online files.
If a non-html page is in another format, especially .pdf, use tool 'inspect_file_as_text' to inspect it.
Additionally, if after some searching you find out that you need more information to answer the question, you can use `final_answer` with your request for clarification as argument to request for more information.";

/// Description under which the search sub-agent is offered to its manager
pub const SEARCH_AGENT_DESCRIPTION: &str = "A team member that will search the internet to answer your question.
Ask him for all your questions that require browsing the web.
Provide him as much context as possible, in particular if you need to search on a specific timeframe!
And don't hesitate to provide him with a complex search task, like finding a difference between two webpages.
Your request must be a real sentence, not a google search! Like \"Find me this information (...)\" rather than a few keywords.";

/// System prompt for an agent with the given callables.
///
/// `delegates` are listed separately as team members so the model knows to
/// hand them full-sentence tasks.
pub fn system_prompt(tools: &[ToolDefinition], delegates: &[ToolDefinition]) -> String {
    let mut out = String::new();

    out.push_str(
        "You are an expert assistant who can solve any task using tool calls. \
         You will be given a task to solve as best you can.\n\
         To do so, you have been given access to some tools.\n\n\
         Each step, call exactly one tool. The result of the call is returned to you as an \
         \"Observation\". You can then use it in the next step.\n\
         To provide the final answer to the task, call the `final_answer` tool. \
         It is the only way to complete the task, otherwise you will be stuck in a loop.\n\n\
         If your model cannot emit native tool calls, reply with a single JSON object instead:\n\
         ```json\n{\"name\": \"<tool name>\", \"arguments\": {...}}\n```\n\n",
    );

    out.push_str("## Tools\n\n");
    for tool in tools {
        push_definition(&mut out, tool);
    }

    if !delegates.is_empty() {
        out.push_str("## Team members\n\n");
        out.push_str(
            "You can also give tasks to team members. Calling a team member works the same as \
             calling a tool: the only argument is 'task', a long string explaining your task. \
             Be very verbose.\n\n",
        );
        for member in delegates {
            push_definition(&mut out, member);
        }
    }

    out.push_str(
        "## Rules\n\n\
         1. Always call a tool; never answer in plain prose.\n\
         2. Use the right arguments for the tools. Pass values, not variable names.\n\
         3. Call a tool only when needed; do not redo a call with the exact same arguments.\n\
         4. Never give up: if one approach fails, try a different one.\n",
    );

    out
}

fn push_definition(out: &mut String, def: &ToolDefinition) {
    out.push_str(&format!("- **{}**: {}\n", def.name, def.description.trim()));
    if let Some(props) = def.parameters.get("properties").and_then(|p| p.as_object()) {
        if !props.is_empty() {
            let params: Vec<String> = props
                .iter()
                .map(|(key, schema)| {
                    let ty = schema.get("type").and_then(|t| t.as_str()).unwrap_or("any");
                    format!("{} ({})", key, ty)
                })
                .collect();
            out.push_str(&format!("  - Params: {}\n", params.join(", ")));
        }
    }
    out.push('\n');
}

/// Re-planning message injected before the model call of a planning step
pub fn planning_note(completed: usize, max_steps: usize) -> String {
    let remaining = max_steps.saturating_sub(completed);
    if completed == 0 {
        format!(
            "Before acting, write down the facts given in the task, the facts you still need \
             to look up, and a short step-by-step plan to reach the final answer. \
             You have {} steps in total.",
            max_steps
        )
    } else {
        format!(
            "Planning checkpoint: you have used {} of {} steps and {} remain. \
             Update your list of facts found and facts still missing, then revise your plan. \
             If the remaining budget is tight, prioritise giving a final answer.",
            completed, max_steps, remaining
        )
    }
}

/// The managed-agent prompt for `name` with an optional suffix
pub fn managed_task(name: &str, task: &str, suffix: Option<&str>) -> String {
    let mut prompt = MANAGED_AGENT_PROMPT
        .replace("{name}", name)
        .replace("{task}", task);
    if let Some(suffix) = suffix {
        prompt.push_str(suffix);
    }
    prompt
}

/// What the manager sees after a delegation returns
pub fn managed_report(name: &str, answer: &str, work_summary: Option<&str>) -> String {
    let mut report = format!(
        "Here is the final answer from your managed agent '{}':\n{}",
        name, answer
    );
    if let Some(summary) = work_summary.filter(|s| !s.is_empty()) {
        report.push_str(&format!(
            "\n\nFor more detail, here is how '{}' worked on the task:\n{}",
            name, summary
        ));
    }
    report
}

/// System message opening the reformulation pass
pub fn reformulation_system(original_task: &str) -> String {
    format!(
        "Earlier you were asked the following:\n\n{}\n\n\
         Your team then worked diligently to address that request. \
         Read below a transcript of that conversation:",
        original_task
    )
}

/// User message closing the reformulation pass
pub fn reformulation_request(original_task: &str) -> String {
    format!(
        "Read the above conversation and output the final answer to the question. \
         The question is repeated here for convenience:\n\n{}\n\n\
         Structure your reply with exactly these three headings, in this order:\n{}\n{}\n{}\n\n\
         Under the first heading give the answer as briefly as possible: a number, as few words \
         as possible, or a comma separated list. Under the second heading explain in detail how \
         the answer was established. Under the third heading add anything else the reader should \
         know, including doubts. If the transcript does not establish an answer, still give your \
         best guess under the first heading and explain why under the others.",
        original_task, SECTION_HEADINGS[0], SECTION_HEADINGS[1], SECTION_HEADINGS[2]
    )
}
