//! Error types for the CloudPilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for CloudPilot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Completion errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Cloud control-plane errors ---
    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Retrieval backend unavailable: {0}")]
    Unavailable(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
}

/// A typed failure from a cloud control-plane call.
#[derive(Debug, Clone, Error)]
pub enum CloudError {
    #[error("{service}: access denied: {message}")]
    AccessDenied { service: String, message: String },

    #[error("{service}: {code}: {message}")]
    NotFound {
        service: String,
        code: String,
        message: String,
    },

    #[error("{service}: request throttled")]
    Throttled { service: String },

    #[error("{service}: no response after {after_secs}s")]
    Timeout { service: String, after_secs: u64 },

    #[error("{service}: {code}: {message}")]
    Service {
        service: String,
        code: String,
        message: String,
    },

    #[error("{service}: transport failure: {message}")]
    Transport { service: String, message: String },

    #[error("{service}: unexpected response: {message}")]
    MalformedResponse { service: String, message: String },

    #[error("Unsupported operation: {service}.{operation}")]
    Unsupported { service: String, operation: String },
}

impl CloudError {
    /// The service that produced this error.
    pub fn service(&self) -> &str {
        match self {
            Self::AccessDenied { service, .. }
            | Self::NotFound { service, .. }
            | Self::Throttled { service }
            | Self::Timeout { service, .. }
            | Self::Service { service, .. }
            | Self::Transport { service, .. }
            | Self::MalformedResponse { service, .. }
            | Self::Unsupported { service, .. } => service,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{0}")]
    InvalidInput(String),

    /// The resource the tool was asked about does not exist.
    /// The message is already phrased for the operator.
    #[error("{0}")]
    ResourceNotFound(String),

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn cloud_error_reports_service() {
        let err = CloudError::AccessDenied {
            service: "ssm".into(),
            message: "not authorized to perform ssm:GetParameter".into(),
        };
        assert_eq!(err.service(), "ssm");
        assert!(err.to_string().contains("ssm:GetParameter"));
    }

    #[test]
    fn tool_error_wraps_cloud_error_transparently() {
        let err: ToolError = CloudError::Throttled {
            service: "ecs".into(),
        }
        .into();
        assert_eq!(err.to_string(), "ecs: request throttled");
    }
}
