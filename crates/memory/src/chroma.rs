//! Chroma retriever: similarity search against a Chroma collection.
//!
//! Uses the v1 REST API. Query embeddings come from the completion
//! provider so that documents and queries share one embedding model.

use async_trait::async_trait;
use cloudpilot_core::error::RetrievalError;
use cloudpilot_core::{Provider, Retriever};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

pub struct ChromaRetriever {
    base_url: String,
    collection: String,
    embedder: Arc<dyn Provider>,
    client: reqwest::Client,
    collection_id: OnceCell<String>,
}

impl ChromaRetriever {
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        embedder: Arc<dyn Provider>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            embedder,
            client,
            collection_id: OnceCell::new(),
        }
    }

    /// Look up the collection id once; failures are retried on the next call.
    async fn collection_id(&self) -> Result<&str, RetrievalError> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let url = format!("{}/api/v1/collections/{}", self.base_url, self.collection);
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

                let status = response.status().as_u16();
                // Chroma reports a missing collection as 404 or 500 depending on version.
                if status == 404 || status == 500 {
                    return Err(RetrievalError::CollectionNotFound(self.collection.clone()));
                }
                if status != 200 {
                    let body = response.text().await.unwrap_or_default();
                    return Err(RetrievalError::QueryFailed(format!("HTTP {status}: {body}")));
                }

                let collection: CollectionResponse = response
                    .json()
                    .await
                    .map_err(|e| RetrievalError::QueryFailed(e.to_string()))?;
                Ok(collection.id)
            })
            .await?;
        Ok(id.as_str())
    }
}

#[async_trait]
impl Retriever for ChromaRetriever {
    fn name(&self) -> &str {
        "chroma"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        let embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::EmbeddingFailed("no embedding returned".into()))?;

        let collection_id = self.collection_id().await?;
        let url = format!("{}/api/v1/collections/{collection_id}/query", self.base_url);
        debug!(collection = %self.collection, k, "Querying Chroma");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "query_embeddings": [embedding],
                "n_results": k,
                "include": ["documents"],
            }))
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::QueryFailed(format!("HTTP {status}: {body}")));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::QueryFailed(e.to_string()))?;
        Ok(parsed.into_documents(k))
    }
}

// --- API types ---

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    /// One list per query embedding; entries may be null.
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
}

impl QueryResponse {
    fn into_documents(self, k: usize) -> Vec<String> {
        self.documents
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .take(k)
            .collect()
    }
}
