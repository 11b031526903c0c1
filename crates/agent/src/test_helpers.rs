//! Shared test helpers for agent tests.

use async_trait::async_trait;
use cloudpilot_core::{
    Completion, CompletionRequest, Identity, IdentityResolver, IdentitySource, Provider,
    ProviderError, RetrievalError, Retriever, Tool, ToolError, ToolInput, ToolOutput,
    ToolRegistry,
};
use std::sync::{Arc, Mutex};

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue; once
/// the script is exhausted the last response repeats. Every prompt is
/// recorded.
pub struct SequentialMockProvider {
    responses: Vec<String>,
    prompts: Mutex<Vec<CompletionRequest>>,
}

impl SequentialMockProvider {
    pub fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn single_text(text: &str) -> Self {
        Self::new([text])
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let mut prompts = self.prompts.lock().unwrap();
        let index = prompts.len().min(self.responses.len().saturating_sub(1));
        prompts.push(request);
        let text = self
            .responses
            .get(index)
            .cloned()
            .unwrap_or_default();
        Ok(Completion::new(text, "mock-model"))
    }
}

/// Always fails, counting attempts.
pub struct FailingProvider {
    pub calls: Mutex<usize>,
}

impl FailingProvider {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<Completion, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        Err(ProviderError::Timeout("Provider 'failing' timed out after 120s".into()))
    }
}

/// Returns fixed chunks for every query.
pub struct StaticRetriever(pub Vec<String>);

#[async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, _query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        Ok(self.0.iter().take(k).cloned().collect())
    }
}

pub struct DownRetriever;

#[async_trait]
impl Retriever for DownRetriever {
    fn name(&self) -> &str {
        "down"
    }

    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<String>, RetrievalError> {
        Err(RetrievalError::Unavailable("connection refused".into()))
    }
}

/// Ambient for the default account; any other account falls back, as if
/// role assumption were always denied. Records every resolution.
pub struct FallbackResolver {
    pub resolved: Mutex<Vec<(String, Option<String>)>>,
}

impl FallbackResolver {
    pub fn new() -> Self {
        Self {
            resolved: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl IdentityResolver for FallbackResolver {
    async fn resolve(&self, service: &str, account_id: Option<&str>, region: Option<&str>) -> Identity {
        self.resolved
            .lock()
            .unwrap()
            .push((service.to_string(), account_id.map(String::from)));
        let mut identity = Identity::ambient(service, region.unwrap_or("eu-west-2"), None);
        if let Some(account) = account_id.filter(|a| !a.is_empty() && *a != "default") {
            identity.source = IdentitySource::Fallback {
                account_id: account.to_string(),
                reason: "AccessDenied".into(),
            };
        }
        identity
    }
}

/// A tool that answers with a fixed line naming its input. `hold` is
/// settled before invocation; `panic` panics.
pub struct StubTool {
    pub name: &'static str,
    pub service: &'static str,
    pub scoped: bool,
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "Stub tool for tests."
    }
    fn input(&self) -> ToolInput {
        ToolInput::text("anything")
    }
    fn service(&self) -> &str {
        self.service
    }
    fn failure_context(&self) -> &str {
        "running stub"
    }
    fn scoped(&self) -> bool {
        self.scoped
    }
    fn preflight(&self, input: &str) -> Option<Result<ToolOutput, ToolError>> {
        (input == "hold").then(|| Ok(ToolOutput::ApprovalRequired(format!("{} held", self.name))))
    }
    async fn invoke(&self, input: &str, identity: &Identity) -> Result<ToolOutput, ToolError> {
        match input {
            "fail" => return Err(ToolError::InvalidInput("stub rejected input".into())),
            "panic" => panic!("{} blew up", self.name),
            _ => {}
        }
        Ok(format!("{} ran with '{input}' as {:?}", self.name, identity.source).into())
    }
}

/// Registry with one stub per catalog tool name.
pub fn stub_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for action in cloudpilot_core::Action::DISPATCHABLE {
        if let Some(name) = action.tool_name() {
            registry.register(Arc::new(StubTool {
                name,
                service: "stub",
                scoped: name != "rag_search",
            }));
        }
    }
    Arc::new(registry)
}
