//! In-memory retriever: keyword relevance over a fixed document set.
//!
//! Useful for tests and for running without a vector store.

use async_trait::async_trait;
use cloudpilot_core::Retriever;
use cloudpilot_core::error::RetrievalError;

pub struct InMemoryRetriever {
    documents: Vec<String>,
}

impl InMemoryRetriever {
    pub fn new<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            documents: documents.into_iter().map(Into::into).collect(),
        }
    }

    fn score(document: &str, terms: &[String]) -> f32 {
        let lower = document.to_lowercase();
        let hits: usize = terms.iter().map(|t| lower.matches(t.as_str()).count()).sum();
        hits as f32 / (document.len() as f32 / 100.0).max(1.0)
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .filter(|t| t.len() > 2)
            .map(String::from)
            .collect();

        let mut scored: Vec<(f32, &String)> = self
            .documents
            .iter()
            .map(|d| (Self::score(d, &terms), d))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        // Stable sort keeps insertion order for equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(k).map(|(_, d)| d.clone()).collect())
    }
}
