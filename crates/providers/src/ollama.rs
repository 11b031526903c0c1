//! Ollama provider: native `/api/generate` and `/api/embed` endpoints.
//!
//! Raw prompt completion is what the ReAct loop needs: the scratchpad is
//! one growing prompt, and stop sequences keep the model from inventing
//! its own observations.

use async_trait::async_trait;
use cloudpilot_core::error::ProviderError;
use cloudpilot_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error_for_status;

pub struct OllamaProvider {
    base_url: String,
    model: String,
    embedding_model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            embedding_model: model.clone(),
            model,
            temperature: 0.0,
            client,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    fn generate_body(&self, request: &CompletionRequest) -> GenerateRequest<'_> {
        GenerateRequest {
            model: &self.model,
            prompt: request.prompt.clone(),
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                stop: request.stop.clone(),
                num_predict: request.max_tokens,
            },
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<Completion, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(model = %self.model, prompt_len = request.prompt.len(), "Sending generate request");

        let response = self
            .client
            .post(&url)
            .json(&self.generate_body(&request))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, body, &self.model));
        }

        let parsed: GenerateResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        Ok(Completion::new(
            parsed.response,
            parsed.model.unwrap_or_else(|| self.model.clone()),
        ))
    }

    async fn embed(&self, inputs: &[String]) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        let url = format!("{}/api/embed", self.base_url);
        debug!(model = %self.embedding_model, count = inputs.len(), "Sending embedding request");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "model": self.embedding_model,
                "input": inputs,
            }))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, body, &self.embedding_model));
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse embedding response: {e}"),
        })?;
        Ok(parsed.embeddings)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

// --- API types ---

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: Option<String>,
    response: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}
