//! Retriever trait: similarity search over internal documentation.

use async_trait::async_trait;

use crate::error::RetrievalError;

/// Returns the `k` most relevant text chunks for a query, best first.
/// An empty list is a valid answer.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// The backend name (e.g., "chroma", "none").
    fn name(&self) -> &str;

    async fn search(&self, query: &str, k: usize) -> std::result::Result<Vec<String>, RetrievalError>;
}
