//! Retrieval adapters and conversation memory for CloudPilot.

pub mod chroma;
pub mod in_memory;
pub mod noop;
pub mod session;

pub use chroma::ChromaRetriever;
pub use in_memory::InMemoryRetriever;
pub use noop::NoopRetriever;
pub use session::{SessionMemory, Turn};

use cloudpilot_config::RetrievalConfig;
use cloudpilot_core::{Provider, Retriever};
use std::sync::Arc;

/// Build the configured retriever. `embedder` computes query embeddings.
pub fn build_from_config(
    config: &RetrievalConfig,
    embedder: Arc<dyn Provider>,
) -> Arc<dyn Retriever> {
    match config.backend.as_str() {
        "chroma" => {
            tracing::info!(
                url = %config.base_url(),
                collection = %config.collection,
                "Retrieval backend: chroma"
            );
            Arc::new(ChromaRetriever::new(
                config.base_url(),
                &config.collection,
                embedder,
            ))
        }
        _ => {
            tracing::info!("Retrieval disabled");
            Arc::new(NoopRetriever)
        }
    }
}
