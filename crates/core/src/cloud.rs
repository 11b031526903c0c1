//! Cloud control-plane capability.
//!
//! The cloud provider is treated as an opaque capability keyed by service
//! name: "invoke operation X with parameters P under identity I". Results
//! come back as JSON in the provider's documented response shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CloudError;
use crate::identity::Identity;

/// A single control-plane operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudRequest {
    /// Service name (e.g., "codepipeline", "ssm", "s3")
    pub service: String,

    /// Operation name in the provider's casing (e.g., "GetPipelineState")
    pub operation: String,

    /// Request parameters
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl CloudRequest {
    pub fn new(service: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            params: serde_json::Map::new(),
        }
    }

    /// Add a parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Look up a string parameter.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }
}

/// The core CloudApi trait.
///
/// Implementations: the SigV4 HTTP client in `cloudpilot-aws`, and
/// in-memory fakes in tests.
#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn call(
        &self,
        identity: &Identity,
        request: CloudRequest,
    ) -> std::result::Result<serde_json::Value, CloudError>;
}
