//! Cloud identity: the credentials and region a tool call executes under.
//!
//! An [`Identity`] is resolved per invocation from the request's optional
//! account id and is owned by exactly that invocation. It is intentionally
//! not `Clone`: temporary credentials must never be cached or shared
//! between requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CloudError;

/// An access key pair, optionally with a session token from role assumption.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Long-lived credentials without a session token.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expires_at: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn is_temporary(&self) -> bool {
        self.session_token.is_some()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// How an identity came to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentitySource {
    /// The process's own credentials; no account scoping was requested.
    Ambient,
    /// Temporary credentials from a cross-account role.
    AssumedRole { role_arn: String },
    /// Role assumption for `account_id` failed and the ambient identity is
    /// used instead. The call proceeds against the default account.
    Fallback { account_id: String, reason: String },
    /// Role assumption failed and fallback is disabled: no credentials.
    Unscoped { account_id: String, reason: String },
}

/// Resolved credentials plus region for a single tool invocation.
#[derive(Debug)]
pub struct Identity {
    pub service: String,
    pub region: String,
    pub credentials: Option<Credentials>,
    pub source: IdentitySource,
}

impl Identity {
    /// The process identity for a service.
    pub fn ambient(
        service: impl Into<String>,
        region: impl Into<String>,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            service: service.into(),
            region: region.into(),
            credentials,
            source: IdentitySource::Ambient,
        }
    }

    /// True when a scoped identity was requested but the ambient one (or
    /// none at all) is in use.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self.source,
            IdentitySource::Fallback { .. } | IdentitySource::Unscoped { .. }
        )
    }

    /// The role ARN when this identity is an assumed role.
    pub fn role_arn(&self) -> Option<&str> {
        match &self.source {
            IdentitySource::AssumedRole { role_arn } => Some(role_arn),
            _ => None,
        }
    }
}

/// The role-assumption capability (STS `AssumeRole` or equivalent).
#[async_trait]
pub trait RoleAssumer: Send + Sync {
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        region: &str,
    ) -> std::result::Result<Credentials, CloudError>;
}

/// Resolves the identity a call to `service` should run as.
///
/// Resolution never fails: degraded outcomes are reported through
/// [`IdentitySource`] so the request can continue.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(
        &self,
        service: &str,
        account_id: Option<&str>,
        region: Option<&str>,
    ) -> Identity;
}
