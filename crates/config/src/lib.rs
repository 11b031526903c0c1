//! Configuration loading, validation, and management for CloudPilot.
//!
//! Loads configuration from `$CLOUDPILOT_CONFIG`, `./cloudpilot.toml` or
//! `~/.cloudpilot/config.toml` (first that exists), then applies
//! environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cloud control-plane settings
    #[serde(default)]
    pub aws: AwsConfig,

    /// Cross-account role assumption
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Completion backend
    #[serde(default)]
    pub llm: LlmConfig,

    /// Documentation retrieval backend
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Orchestration loop bounds
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP front door
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

fn default_true() -> bool {
    true
}

// ── aws ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,

    /// Send every call to this endpoint instead of the public one (LocalStack).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,

    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

fn default_region() -> String {
    "eu-west-2".into()
}
fn default_call_timeout() -> u64 {
    20
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
            call_timeout_secs: default_call_timeout(),
        }
    }
}

// ── credentials ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_partition")]
    pub partition: String,

    /// Role assumed in each target account
    #[serde(default = "default_role_name")]
    pub role_name: String,

    #[serde(default = "default_session_name")]
    pub session_name: String,

    /// When role assumption fails, run against the default account instead
    /// of failing the tool call.
    #[serde(default = "default_true")]
    pub fallback_to_default: bool,
}

fn default_partition() -> String {
    "aws".into()
}
fn default_role_name() -> String {
    "CloudAgentAccessRole".into()
}
fn default_session_name() -> String {
    "CloudAgentSession".into()
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            partition: default_partition(),
            role_name: default_role_name(),
            session_name: default_session_name(),
            fallback_to_default: true,
        }
    }
}

// ── llm ──

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai" (any OpenAI-compatible endpoint)
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    #[serde(default = "default_llm_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Model used for retrieval embeddings; defaults to `model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_llm_provider() -> String {
    "ollama".into()
}
fn default_llm_url() -> String {
    "http://llm:11434".into()
}
fn default_model() -> String {
    "mistral".into()
}
fn default_llm_timeout() -> u64 {
    120
}

impl LlmConfig {
    pub fn embedding_model(&self) -> &str {
        self.embedding_model.as_deref().unwrap_or(&self.model)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: default_llm_url(),
            model: default_model(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout(),
            embedding_model: None,
            api_key: None,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("embedding_model", &self.embedding_model)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

// ── retrieval ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// "chroma" or "none"
    #[serde(default = "default_retrieval_backend")]
    pub backend: String,

    #[serde(default = "default_chroma_host")]
    pub host: String,

    #[serde(default = "default_chroma_port")]
    pub port: u16,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Chunks returned by the documentation tool
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Chunks used as context for model-based intent resolution
    #[serde(default = "default_intent_top_k")]
    pub intent_top_k: usize,
}

fn default_retrieval_backend() -> String {
    "chroma".into()
}
fn default_chroma_host() -> String {
    "chroma".into()
}
fn default_chroma_port() -> u16 {
    8000
}
fn default_collection() -> String {
    "aws_docs".into()
}
fn default_top_k() -> usize {
    4
}
fn default_intent_top_k() -> usize {
    5
}

impl RetrievalConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: default_retrieval_backend(),
            host: default_chroma_host(),
            port: default_chroma_port(),
            collection: default_collection(),
            top_k: default_top_k(),
            intent_top_k: default_intent_top_k(),
        }
    }
}

// ── agent ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Turns kept per session
    #[serde(default = "default_memory_window")]
    pub memory_window: usize,

    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_max_iterations() -> usize {
    25
}
fn default_memory_window() -> usize {
    10
}
fn default_max_sessions() -> usize {
    1024
}
fn default_tool_timeout() -> u64 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            memory_window: default_memory_window(),
            max_sessions: default_max_sessions(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

// ── gateway ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the first existing candidate path, then
    /// apply process environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::candidate_paths()
            .into_iter()
            .find(|p| p.exists())
            .unwrap_or_else(|| Self::config_dir().join("config.toml"));

        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Paths searched by [`AppConfig::load`], in priority order.
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(explicit) = std::env::var("CLOUDPILOT_CONFIG") {
            paths.push(PathBuf::from(explicit));
        }
        paths.push(PathBuf::from("cloudpilot.toml"));
        paths.push(Self::config_dir().join("config.toml"));
        paths
    }

    pub fn config_dir() -> PathBuf {
        dirs_home().join(".cloudpilot")
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(region) = non_empty("AWS_REGION") {
            self.aws.region = region;
        }
        if let Some(endpoint) = non_empty("AWS_ENDPOINT_URL") {
            self.aws.endpoint_url = Some(endpoint);
        }
        if let Some(url) = non_empty("OLLAMA_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = non_empty("OLLAMA_MODEL") {
            self.llm.model = model;
        }
        if let Some(key) = non_empty("CLOUDPILOT_LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(host) = non_empty("CHROMA_HOST") {
            self.retrieval.host = host;
        }
        if let Some(port) = non_empty("CHROMA_PORT") {
            match port.trim().parse() {
                Ok(port) => self.retrieval.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring non-numeric CHROMA_PORT"),
            }
        }
        if let Some(role) = non_empty("CLOUDPILOT_ROLE_NAME") {
            self.credentials.role_name = role;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let bounds = [
            ("agent.max_iterations", self.agent.max_iterations as u64),
            ("agent.memory_window", self.agent.memory_window as u64),
            ("agent.max_sessions", self.agent.max_sessions as u64),
            ("agent.tool_timeout_secs", self.agent.tool_timeout_secs),
            ("llm.timeout_secs", self.llm.timeout_secs),
            ("aws.call_timeout_secs", self.aws.call_timeout_secs),
            ("retrieval.top_k", self.retrieval.top_k as u64),
            ("retrieval.intent_top_k", self.retrieval.intent_top_k as u64),
            ("gateway.body_limit_bytes", self.gateway.body_limit_bytes as u64),
        ];
        if let Some((name, _)) = bounds.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
        }

        if self.credentials.role_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "credentials.role_name must not be empty".into(),
            ));
        }

        if !matches!(self.llm.provider.as_str(), "ollama" | "openai") {
            return Err(ConfigError::ValidationError(format!(
                "llm.provider must be 'ollama' or 'openai', got '{}'",
                self.llm.provider
            )));
        }

        if !matches!(self.retrieval.backend.as_str(), "chroma" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.backend must be 'chroma' or 'none', got '{}'",
                self.retrieval.backend
            )));
        }

        Ok(())
    }

    /// Render the configuration as TOML (for `cloudpilot config`).
    /// The API key is never included.
    pub fn to_redacted_toml(&self) -> String {
        let mut copy = self.clone();
        if copy.llm.api_key.is_some() {
            copy.llm.api_key = Some("[REDACTED]".into());
        }
        toml::to_string_pretty(&copy).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
