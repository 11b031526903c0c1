//! Credential broker: decides which cloud identity a tool call runs as.
//!
//! Every call resolves afresh. Temporary credentials are handed to exactly
//! one invocation and never cached.

use async_trait::async_trait;
use cloudpilot_config::{AppConfig, CredentialsConfig};
use cloudpilot_core::{Credentials, Identity, IdentityResolver, IdentitySource, RoleAssumer};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::audit::{AuditEvent, AuditLogger, AuditOutcome};

const ACTOR: &str = "credential_broker";

/// Resolves per-request identities via role assumption, falling back to the
/// ambient identity when assumption is impossible.
pub struct CredentialBroker {
    assumer: Arc<dyn RoleAssumer>,
    ambient: Option<Credentials>,
    default_region: String,
    settings: CredentialsConfig,
    audit: Arc<AuditLogger>,
}

impl CredentialBroker {
    pub fn new(
        assumer: Arc<dyn RoleAssumer>,
        ambient: Option<Credentials>,
        default_region: impl Into<String>,
    ) -> Self {
        Self {
            assumer,
            ambient,
            default_region: default_region.into(),
            settings: CredentialsConfig::default(),
            audit: Arc::new(AuditLogger::new()),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        assumer: Arc<dyn RoleAssumer>,
        ambient: Option<Credentials>,
    ) -> Self {
        Self::new(assumer, ambient, config.aws.region.clone())
            .with_settings(config.credentials.clone())
    }

    pub fn with_settings(mut self, settings: CredentialsConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    /// `arn:{partition}:iam::{account}:role/{role}`
    pub fn role_arn(&self, account_id: &str) -> String {
        format!(
            "arn:{}:iam::{}:role/{}",
            self.settings.partition, account_id, self.settings.role_name
        )
    }

    async fn assume(&self, account_id: &str, region: &str) -> Result<(String, Credentials), String> {
        if !is_account_id(account_id) {
            return Err(format!(
                "malformed account id '{account_id}': expected 12 digits"
            ));
        }
        let role_arn = self.role_arn(account_id);
        self.assumer
            .assume_role(&role_arn, &self.settings.session_name, region)
            .await
            .map(|creds| (role_arn, creds))
            .map_err(|e| e.to_string())
    }

    fn degrade(&self, service: &str, region: String, account_id: &str, reason: String) -> Identity {
        warn!(
            account_id,
            service,
            reason = %reason,
            fallback = self.settings.fallback_to_default,
            "Failed to assume role for account {account_id}, using default account fallback"
        );

        let event = AuditEvent::CredentialFallback {
            account_id: account_id.into(),
            service: service.into(),
        };

        if self.settings.fallback_to_default {
            self.audit
                .log(event, ACTOR, service, AuditOutcome::Degraded, Some(reason.clone()));
            Identity {
                service: service.into(),
                region,
                credentials: self.ambient.clone(),
                source: IdentitySource::Fallback {
                    account_id: account_id.into(),
                    reason,
                },
            }
        } else {
            self.audit
                .log(event, ACTOR, service, AuditOutcome::Denied, Some(reason.clone()));
            Identity {
                service: service.into(),
                region,
                credentials: None,
                source: IdentitySource::Unscoped {
                    account_id: account_id.into(),
                    reason,
                },
            }
        }
    }
}

#[async_trait]
impl IdentityResolver for CredentialBroker {
    async fn resolve(&self, service: &str, account_id: Option<&str>, region: Option<&str>) -> Identity {
        let region = region
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.default_region)
            .to_string();

        let account_id = match account_id.map(str::trim) {
            None | Some("") | Some("default") => {
                return Identity::ambient(service, region, self.ambient.clone());
            }
            Some(id) => id,
        };

        match self.assume(account_id, &region).await {
            Ok((role_arn, credentials)) => {
                debug!(account_id, service, role_arn = %role_arn, "Assumed role");
                self.audit.log(
                    AuditEvent::RoleAssumed {
                        account_id: account_id.into(),
                        role_arn: role_arn.clone(),
                    },
                    ACTOR,
                    service,
                    AuditOutcome::Success,
                    None,
                );
                Identity {
                    service: service.into(),
                    region,
                    credentials: Some(credentials),
                    source: IdentitySource::AssumedRole { role_arn },
                }
            }
            Err(reason) => self.degrade(service, region, account_id, reason),
        }
    }
}

fn is_account_id(id: &str) -> bool {
    id.len() == 12 && id.bytes().all(|b| b.is_ascii_digit())
}
