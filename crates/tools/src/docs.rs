//! Internal documentation search over the retrieval index.

use async_trait::async_trait;
use cloudpilot_core::{Identity, Retriever, Tool, ToolError, ToolInput, ToolOutput};
use std::sync::Arc;
use tracing::debug;

const SEPARATOR: &str = "\n\n---\n\n";

pub struct RagSearchTool {
    retriever: Arc<dyn Retriever>,
    top_k: usize,
}

impl RagSearchTool {
    pub fn new(retriever: Arc<dyn Retriever>, top_k: usize) -> Self {
        Self {
            retriever,
            top_k: top_k.max(1),
        }
    }
}

#[async_trait]
impl Tool for RagSearchTool {
    fn name(&self) -> &str {
        "rag_search"
    }

    fn description(&self) -> &str {
        "Search internal DevOps documentation, runbooks, service catalog, deployment guides, \
         and architecture docs. Use this when asked about internal processes, service ownership, \
         deployment conventions, team contacts, or anything not available via AWS APIs."
    }

    fn input(&self) -> ToolInput {
        ToolInput::text("who owns the payments service")
    }

    /// Local index; runs under no cloud identity.
    fn service(&self) -> &str {
        "docs"
    }

    fn failure_context(&self) -> &str {
        "searching documentation"
    }

    fn scoped(&self) -> bool {
        false
    }

    async fn invoke(&self, input: &str, _identity: &Identity) -> Result<ToolOutput, ToolError> {
        let query = input.trim();
        let chunks = self.retriever.search(query, self.top_k).await?;
        debug!(backend = self.retriever.name(), hits = chunks.len(), "Documentation search");

        if chunks.is_empty() {
            return Ok("No relevant documentation found in internal knowledge base.".into());
        }
        Ok(chunks.join(SEPARATOR).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EmptyRetriever, identity};
    use cloudpilot_core::{FailureKind, RetrievalError, ToolCall, ToolRegistry};
    use std::sync::Mutex;

    struct FixedRetriever {
        chunks: Vec<String>,
        asked_k: Mutex<Option<usize>>,
    }

    #[async_trait]
    impl Retriever for FixedRetriever {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn search(&self, _query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
            *self.asked_k.lock().unwrap() = Some(k);
            Ok(self.chunks.iter().take(k).cloned().collect())
        }
    }

    struct DownRetriever;

    #[async_trait]
    impl Retriever for DownRetriever {
        fn name(&self) -> &str {
            "down"
        }
        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<String>, RetrievalError> {
            Err(RetrievalError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn joins_top_k_chunks() {
        let retriever = Arc::new(FixedRetriever {
            chunks: (1..=6).map(|i| format!("chunk {i}")).collect(),
            asked_k: Mutex::new(None),
        });
        let out = RagSearchTool::new(retriever.clone(), 4)
            .invoke("payments owner", &identity("docs"))
            .await
            .unwrap();

        assert_eq!(
            out,
            ToolOutput::Summary(
                "chunk 1\n\n---\n\nchunk 2\n\n---\n\nchunk 3\n\n---\n\nchunk 4".into()
            )
        );
        assert_eq!(*retriever.asked_k.lock().unwrap(), Some(4));
    }

    #[tokio::test]
    async fn empty_index() {
        let out = RagSearchTool::new(Arc::new(EmptyRetriever), 4)
            .invoke("anything", &identity("docs"))
            .await
            .unwrap();
        assert_eq!(
            out,
            ToolOutput::Summary("No relevant documentation found in internal knowledge base.".into())
        );
    }

    #[tokio::test]
    async fn backend_outage_is_upstream_failure() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(RagSearchTool::new(Arc::new(DownRetriever), 4)));
        let outcome = registry
            .invoke(&ToolCall::new("rag_search", "runbook"), &identity("docs"))
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Upstream));
        assert!(outcome.render().starts_with("Error searching documentation: "));
    }
}
