//! Intent resolution: free text to exactly one [`Action`].
//!
//! Tier 1 is an ordered list of keyword co-occurrence rules; the first
//! match wins and no model is involved. Queries no rule covers go to
//! tier 2: retrieve documentation context, ask the model once for a JSON
//! verdict, and accept only the read-only actions the model may pick.

use chrono::Utc;
use cloudpilot_core::{
    Action, CompletionRequest, DomainEvent, EventBus, Provider, Retriever,
};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

/// How a resolution was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Rule,
    Model,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Rule => "rule",
            Tier::Model => "model",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub action: Action,
    pub tier: Tier,
}

/// Actions the model tier is allowed to produce.
const MODEL_ACTIONS: [Action; 2] = [Action::ListStorage, Action::DescribeCompute];

// ── Tier 1 ──

struct Rule {
    all_of: &'static [&'static [&'static str]],
    action: Action,
}

/// Short terms that occur inside unrelated words ("install", "address",
/// "asset", "output") and so only match as whole words.
const WHOLE_WORDS: [&str; 4] = ["all", "add", "set", "put"];

fn has_term(q: &str, term: &str) -> bool {
    if WHOLE_WORDS.contains(&term) {
        q.split(|c: char| !c.is_ascii_alphanumeric()).any(|w| w == term)
    } else {
        q.contains(term)
    }
}

impl Rule {
    /// Every group must have at least one term present.
    fn matches(&self, q: &str) -> bool {
        self.all_of
            .iter()
            .all(|group| group.iter().any(|term| has_term(q, term)))
    }
}

const RULES: &[Rule] = &[
    Rule {
        all_of: &[&["s3"], &["list", "bucket"]],
        action: Action::ListStorage,
    },
    Rule {
        all_of: &[&["ec2"], &["describe", "list", "instance"]],
        action: Action::DescribeCompute,
    },
    Rule {
        all_of: &[&["pipelines"], &["list", "all", "available"]],
        action: Action::ListPipelines,
    },
    Rule {
        all_of: &[&["pipeline"]],
        action: Action::PipelineStatus,
    },
    Rule {
        all_of: &[&["ecs"]],
        action: Action::EcsStatus,
    },
    Rule {
        all_of: &[&["eks", "cluster"], &["list", "all"]],
        action: Action::ListClusters,
    },
    Rule {
        all_of: &[&["eks", "cluster"]],
        action: Action::DescribeCluster,
    },
    Rule {
        all_of: &[&["parameter", "ssm", "env var"], &["put", "set", "update", "add"]],
        action: Action::PutParameter,
    },
    Rule {
        all_of: &[&["parameters", "ssm"], &["list"]],
        action: Action::ListParameters,
    },
    Rule {
        all_of: &[&["parameter", "ssm"]],
        action: Action::GetParameter,
    },
    Rule {
        all_of: &[&["runbook", "docs", "documentation"]],
        action: Action::SearchDocs,
    },
];

/// Tier 1 only. `None` when no rule covers the query.
pub fn classify_by_rules(query: &str) -> Option<Action> {
    let q = query.to_lowercase();
    RULES.iter().find(|r| r.matches(&q)).map(|r| r.action)
}

// ── Tier 2 ──

static LITERAL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(list-storage|describe-compute|list-s3|describe-ec2)").ok()
});

/// Read the model's verdict: strict JSON first, then a literal search.
/// Anything outside the allowed set is [`Action::Unknown`].
pub fn parse_model_choice(raw: &str) -> Action {
    let candidate = match serde_json::from_str::<serde_json::Value>(raw.trim()) {
        Ok(serde_json::Value::Object(obj)) => obj
            .get("command")
            .or_else(|| obj.get("action"))
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => LITERAL
            .as_ref()
            .and_then(|re| re.find(raw))
            .map(|m| m.as_str().to_lowercase()),
    };

    candidate
        .and_then(|c| c.trim().parse::<Action>().ok())
        .filter(|a| MODEL_ACTIONS.contains(a))
        .unwrap_or(Action::Unknown)
}

fn classification_prompt(query: &str, context: &[String]) -> String {
    let docs = if context.is_empty() {
        "(none)".to_string()
    } else {
        context.join("\n\n")
    };
    format!(
        "You are an AWS automation agent.\n\n\
         Based on the documentation below, decide the AWS command.\n\n\
         Documentation:\n{docs}\n\n\
         User request:\n\"{query}\"\n\n\
         Return ONLY JSON in this format:\n\
         {{ \"command\": \"list-storage\" | \"describe-compute\" }}\n\n\
         No explanation.\n"
    )
}

pub struct IntentResolver {
    provider: Arc<dyn Provider>,
    retriever: Arc<dyn Retriever>,
    events: Arc<EventBus>,
    context_k: usize,
}

impl IntentResolver {
    pub fn new(
        provider: Arc<dyn Provider>,
        retriever: Arc<dyn Retriever>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            retriever,
            events,
            context_k: 5,
        }
    }

    /// Documentation chunks retrieved as tier-2 context.
    pub fn with_context_k(mut self, k: usize) -> Self {
        self.context_k = k;
        self
    }

    pub async fn resolve(&self, query: &str) -> Resolution {
        let resolution = match classify_by_rules(query) {
            Some(action) => Resolution {
                action,
                tier: Tier::Rule,
            },
            None => Resolution {
                action: self.ask_model(query).await,
                tier: Tier::Model,
            },
        };

        info!(action = %resolution.action.as_str(), tier = resolution.tier.as_str(), "Intent resolved");
        self.events.publish(DomainEvent::IntentResolved {
            action: resolution.action,
            tier: resolution.tier.as_str().into(),
            timestamp: Utc::now(),
        });
        resolution
    }

    async fn ask_model(&self, query: &str) -> Action {
        let context = match self.retriever.search(query, self.context_k).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "Context retrieval failed; classifying without documentation");
                Vec::new()
            }
        };

        let request = CompletionRequest::new(classification_prompt(query, &context));
        match self.provider.complete(request).await {
            Ok(completion) => {
                debug!(raw = %completion.text, "Model classification");
                parse_model_choice(&completion.text)
            }
            Err(e) => {
                warn!(error = %e, "Model classification failed");
                Action::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{DownRetriever, FailingProvider, SequentialMockProvider, StaticRetriever};

    fn resolver(provider: Arc<dyn Provider>) -> IntentResolver {
        IntentResolver::new(
            provider,
            Arc::new(StaticRetriever(vec!["S3 stores objects.".into()])),
            Arc::new(EventBus::default()),
        )
    }

    #[test]
    fn rules_in_order() {
        let cases = [
            ("List my S3 buckets", Action::ListStorage),
            ("describe ec2 instances", Action::DescribeCompute),
            ("list all pipelines", Action::ListPipelines),
            ("status of pipeline payments-prod", Action::PipelineStatus),
            ("how is ecs service payments doing", Action::EcsStatus),
            ("list eks clusters", Action::ListClusters),
            ("describe cluster payments", Action::DescribeCluster),
            ("set parameter /staging/x to 5", Action::PutParameter),
            ("update env var DB_HOST", Action::PutParameter),
            ("list ssm parameters under /prod", Action::ListParameters),
            ("get parameter /prod/db", Action::GetParameter),
            ("find the runbook for failover", Action::SearchDocs),
        ];
        for (query, expected) in cases {
            assert_eq!(classify_by_rules(query), Some(expected), "{query}");
        }
    }

    #[test]
    fn earlier_rule_wins() {
        // "pipeline" alone would be pipeline-status, but "pipelines" + "list" comes first.
        assert_eq!(classify_by_rules("list pipelines"), Some(Action::ListPipelines));
        // "parameters" + "list" vs "ssm": list-parameters precedes get-parameter.
        assert_eq!(classify_by_rules("ssm list"), Some(Action::ListParameters));
        assert_eq!(classify_by_rules("what's the weather"), None);
    }

    #[test]
    fn short_verbs_match_whole_words_only() {
        assert_eq!(
            classify_by_rules("describe cluster for install"),
            Some(Action::DescribeCluster)
        );
        assert_eq!(
            classify_by_rules("get ssm parameter /app/output_dir"),
            Some(Action::GetParameter)
        );
        assert_eq!(
            classify_by_rules("show ssm parameter asset_bucket"),
            Some(Action::GetParameter)
        );
        assert_eq!(classify_by_rules("list all eks clusters"), Some(Action::ListClusters));
        assert_eq!(classify_by_rules("put ssm value"), Some(Action::PutParameter));
    }

    #[test]
    fn model_choice_parsing() {
        assert_eq!(parse_model_choice(r#"{"command": "list-storage"}"#), Action::ListStorage);
        assert_eq!(parse_model_choice(r#"{"action": "describe-ec2"}"#), Action::DescribeCompute);
        assert_eq!(
            parse_model_choice("Sure! I'd pick DESCRIBE-COMPUTE here."),
            Action::DescribeCompute
        );
        assert_eq!(parse_model_choice(r#"{"command": "put-parameter"}"#), Action::Unknown);
        assert_eq!(parse_model_choice(r#"{"command": "rm -rf"}"#), Action::Unknown);
        assert_eq!(parse_model_choice("no idea"), Action::Unknown);
    }

    #[tokio::test]
    async fn rule_match_skips_model() {
        let provider = Arc::new(SequentialMockProvider::single_text("{}"));
        let resolution = resolver(provider.clone()).resolve("list s3 buckets").await;
        assert_eq!(resolution.action, Action::ListStorage);
        assert_eq!(resolution.tier, Tier::Rule);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn unmatched_query_asks_model_once() {
        let provider = Arc::new(SequentialMockProvider::single_text(r#"{"command": "describe-compute"}"#));
        let resolution = resolver(provider.clone()).resolve("what machines are up?").await;
        assert_eq!(resolution.action, Action::DescribeCompute);
        assert_eq!(resolution.tier, Tier::Model);
        assert_eq!(provider.call_count(), 1);

        let prompt = &provider.requests()[0].prompt;
        assert!(prompt.contains("S3 stores objects."));
        assert!(prompt.contains("\"what machines are up?\""));
    }

    #[tokio::test]
    async fn model_outside_allow_list_is_unknown() {
        let provider = Arc::new(SequentialMockProvider::single_text(r#"{"command": "list-pipelines"}"#));
        let resolution = resolver(provider).resolve("whatever").await;
        assert_eq!(resolution.action, Action::Unknown);
    }

    #[tokio::test]
    async fn provider_failure_is_unknown() {
        let provider = Arc::new(FailingProvider::new());
        let resolution = resolver(provider.clone()).resolve("whatever").await;
        assert_eq!(resolution.action, Action::Unknown);
        assert_eq!(*provider.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn retrieval_failure_still_classifies() {
        let provider = Arc::new(SequentialMockProvider::single_text(r#"{"command": "list-storage"}"#));
        let resolver = IntentResolver::new(
            provider.clone(),
            Arc::new(DownRetriever),
            Arc::new(EventBus::default()),
        );
        assert_eq!(resolver.resolve("storage?").await.action, Action::ListStorage);
        assert!(provider.requests()[0].prompt.contains("Documentation:\n(none)"));
    }

    #[tokio::test]
    async fn publishes_intent_event() {
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let resolver = IntentResolver::new(
            Arc::new(SequentialMockProvider::single_text("{}")),
            Arc::new(StaticRetriever(vec![])),
            events,
        );
        resolver.resolve("list s3").await;

        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::IntentResolved { action, tier, .. } => {
                assert_eq!(*action, Action::ListStorage);
                assert_eq!(tier, "rule");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
