//! Reading one model step.
//!
//! A step either finishes (`Final Answer:`) or names one tool with
//! `Action:` and `Action Input:`. Anything else is a [`StepError`], which
//! the loop feeds back to the model as an observation.

use cloudpilot_core::ToolRegistry;
use regex_lite::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const FINAL_ANSWER: &str = "Final Answer:";

static ACTION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:(.*?)\n?\s*Action\s*\d*\s*Input\s*\d*\s*:(.*)").ok()
});

static ACTION_ONLY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Action\s*\d*\s*:").ok());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Finish(String),
    Act { tool: String, input: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("'{0}' is not a valid tool")]
    UnknownTool(String),

    #[error("Parsing LLM output produced both a final answer and a parse-able action")]
    Ambiguous,

    #[error("Invalid Format: Missing 'Action:' after 'Thought:'")]
    MissingAction,

    #[error("Invalid Format: Missing 'Action Input:' after 'Action:'")]
    MissingActionInput,
}

const WRAPPERS: &[char] = &['"', '\'', '`', '[', ']'];

fn clean_tool(raw: &str) -> String {
    raw.trim()
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(WRAPPERS)
        .trim()
        .to_string()
}

/// Drop anything the model invented after the input, then unwrap quoting.
fn clean_input(raw: &str) -> String {
    let raw = raw.split("Observation:").next().unwrap_or_default();
    raw.trim()
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .trim_matches(WRAPPERS)
        .trim()
        .to_string()
}

pub fn parse_step(text: &str, registry: &ToolRegistry) -> Result<Decision, StepError> {
    let final_at = text.find(FINAL_ANSWER);
    let action = ACTION.as_ref().and_then(|re| re.captures(text));

    match (action, final_at) {
        (Some(_), Some(_)) => Err(StepError::Ambiguous),
        (None, Some(at)) => Ok(Decision::Finish(
            text[at + FINAL_ANSWER.len()..].trim().to_string(),
        )),
        (Some(caps), None) => {
            let tool = clean_tool(&caps[1]);
            if !registry.contains(&tool) {
                return Err(StepError::UnknownTool(tool));
            }
            Ok(Decision::Act {
                tool,
                input: clean_input(&caps[2]),
            })
        }
        (None, None) => {
            let has_action = ACTION_ONLY.as_ref().is_some_and(|re| re.is_match(text));
            if has_action {
                Err(StepError::MissingActionInput)
            } else {
                Err(StepError::MissingAction)
            }
        }
    }
}
