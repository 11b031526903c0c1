//! Completion provider implementations for CloudPilot.
//!
//! All providers implement the `cloudpilot_core::Provider` trait.
//! [`build_from_config`] picks the backend named in configuration and
//! wraps it in a [`TimeoutProvider`].

pub mod ollama;
pub mod openai_compat;
pub mod timeout;

pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use timeout::TimeoutProvider;

use cloudpilot_config::LlmConfig;
use cloudpilot_core::{Provider, ProviderError};
use std::sync::Arc;
use std::time::Duration;

/// Build the configured completion provider.
pub fn build_from_config(config: &LlmConfig) -> Arc<dyn Provider> {
    let inner: Arc<dyn Provider> = match config.provider.as_str() {
        "openai" => Arc::new(
            OpenAiCompatProvider::new(
                "openai",
                &config.base_url,
                config.api_key.clone().unwrap_or_default(),
                &config.model,
            )
            .with_temperature(config.temperature)
            .with_embedding_model(config.embedding_model()),
        ),
        _ => Arc::new(
            OllamaProvider::new(&config.base_url, &config.model)
                .with_temperature(config.temperature)
                .with_embedding_model(config.embedding_model()),
        ),
    };

    tracing::info!(
        provider = %inner.name(),
        model = %config.model,
        base_url = %config.base_url,
        "Completion provider configured"
    );

    Arc::new(TimeoutProvider::new(
        inner,
        Duration::from_secs(config.timeout_secs),
    ))
}

/// Map a non-200 response to a provider error.
pub(crate) fn error_for_status(status: u16, body: String, model: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        404 => ProviderError::ModelNotFound(model.to_string()),
        429 => ProviderError::RateLimited {
            retry_after_secs: 5,
        },
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}
