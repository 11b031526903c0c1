//! Provider trait: the abstraction over text-completion backends.
//!
//! A Provider takes a prompt and returns raw text. Intent classification
//! and the ReAct loop both drive the model through this single call; no
//! streaming contract is required.
//!
//! Implementations: Ollama, OpenAI-compatible endpoints, and a timeout wrapper.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// A completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The full prompt text
    pub prompt: String,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            stop: Vec::new(),
            max_tokens: None,
        }
    }

    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop.push(stop.into());
        self
    }
}

/// A completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub text: String,

    /// Which model actually responded
    pub model: String,
}

impl Completion {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
        }
    }
}

/// The core Provider trait.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "ollama", "openai").
    fn name(&self) -> &str;

    /// Send a prompt and get the complete generated text.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<Completion, ProviderError>;

    /// Generate embeddings for the given texts.
    ///
    /// Default implementation returns an error indicating embeddings aren't supported.
    async fn embed(&self, _inputs: &[String]) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        Err(ProviderError::NotConfigured(format!(
            "Provider '{}' does not support embeddings",
            self.name()
        )))
    }

    /// Whether the provider is reachable.
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
