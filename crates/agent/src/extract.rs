//! Argument extraction for direct mode.
//!
//! Each extractor pulls one tool input out of the operator's free text.
//! `None` means the argument is absent; the caller decides whether that is
//! an error.

use regex_lite::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($re).ok());
    };
}

regex!(PIPELINE, r"(?i)\bpipeline\s+([A-Za-z0-9_-]+)");
regex!(ECS_PAIR, r"([A-Za-z0-9_-]+/[A-Za-z0-9_-]+)");
regex!(ECS_SERVICE, r"(?i)\bservice\s+([A-Za-z0-9_-]+)");
regex!(CLUSTER, r"(?i)\bcluster\s+([A-Za-z0-9_-]+)");
regex!(PARAM_PATH, r"(/[A-Za-z0-9_./-]*)");
regex!(PARAM_NAMED, r"(?i)\bparameter\s+([A-Za-z0-9_./-]+)");

fn first_group(re: &LazyLock<Option<Regex>>, text: &str) -> Option<String> {
    re.as_ref()?
        .captures(text)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

/// `pipeline <name>`.
pub fn pipeline_name(text: &str) -> Option<String> {
    first_group(&PIPELINE, text)
}

/// `cluster/service`, else `service <name>`.
pub fn ecs_target(text: &str) -> Option<String> {
    first_group(&ECS_PAIR, text).or_else(|| first_group(&ECS_SERVICE, text))
}

/// `cluster <name>`.
pub fn cluster_name(text: &str) -> Option<String> {
    first_group(&CLUSTER, text)
}

/// A `/path/like/name`, else `parameter <name>`.
pub fn parameter_name(text: &str) -> Option<String> {
    first_group(&PARAM_PATH, text)
        .filter(|p| p.len() > 1)
        .or_else(|| first_group(&PARAM_NAMED, text))
}

/// A `/path` prefix; the root when none is given.
pub fn parameter_path(text: &str) -> String {
    first_group(&PARAM_PATH, text).unwrap_or_else(|| "/".into())
}

/// The whole `|`-delimited run, each field trimmed: the word before the
/// first `|`, everything between the first and last `|`, and the word after
/// the last. Extra fields are kept so the write's own format check sees
/// them.
pub fn put_spec(text: &str) -> Option<String> {
    let first = text.find('|')?;
    let last = text.rfind('|')?;

    let mut fields = vec![text[..first].split_whitespace().last().unwrap_or_default()];
    if last > first {
        fields.extend(text[first + 1..last].split('|').map(str::trim));
    }
    fields.push(text[last + 1..].split_whitespace().next().unwrap_or_default());
    Some(fields.join("|"))
}

const INSTANCE_STATES: [&str; 6] = [
    "running",
    "stopped",
    "pending",
    "stopping",
    "terminated",
    "shutting-down",
];

/// An EC2 state word, if the text names one.
pub fn instance_state(text: &str) -> Option<&'static str> {
    let q = text.to_lowercase();
    INSTANCE_STATES.into_iter().find(|s| q.contains(s))
}
