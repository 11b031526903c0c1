//! No-op retriever: disables documentation search entirely.

use async_trait::async_trait;
use cloudpilot_core::Retriever;
use cloudpilot_core::error::RetrievalError;

/// A retriever that never finds anything.
pub struct NoopRetriever;

#[async_trait]
impl Retriever for NoopRetriever {
    fn name(&self) -> &str {
        "none"
    }

    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<String>, RetrievalError> {
        Ok(Vec::new())
    }
}
