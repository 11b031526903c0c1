//! STS role assumption.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudpilot_core::{CloudError, Credentials, Identity, RoleAssumer};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::client::AwsClient;
use crate::xml::Element;

/// Assumes roles with the process's ambient credentials.
pub struct StsRoleAssumer {
    client: Arc<AwsClient>,
    ambient: Option<Credentials>,
    duration_secs: u32,
}

impl StsRoleAssumer {
    pub fn new(client: Arc<AwsClient>, ambient: Option<Credentials>) -> Self {
        Self {
            client,
            ambient,
            duration_secs: 900,
        }
    }

    /// Session lifetime requested from STS (900 s minimum).
    pub fn with_duration_secs(mut self, secs: u32) -> Self {
        self.duration_secs = secs.max(900);
        self
    }
}

#[async_trait]
impl RoleAssumer for StsRoleAssumer {
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        region: &str,
    ) -> Result<Credentials, CloudError> {
        debug!(role_arn, session_name, region, "Assuming role");
        let identity = Identity::ambient("sts", region, self.ambient.clone());

        let mut params = Map::new();
        params.insert("RoleArn".into(), Value::from(role_arn));
        params.insert("RoleSessionName".into(), Value::from(session_name));
        params.insert("DurationSeconds".into(), Value::from(self.duration_secs));

        let root = self
            .client
            .query(&identity, "sts", "2011-06-15", "AssumeRole", &params)
            .await?;
        credentials_from_response(&root)
    }
}

fn credentials_from_response(root: &Element) -> Result<Credentials, CloudError> {
    let malformed = |what: &str| CloudError::MalformedResponse {
        service: "sts".into(),
        message: format!("AssumeRole response missing {what}"),
    };

    let creds = root.find("Credentials").ok_or_else(|| malformed("Credentials"))?;
    let access_key = creds
        .text_of("AccessKeyId")
        .ok_or_else(|| malformed("AccessKeyId"))?;
    let secret = creds
        .text_of("SecretAccessKey")
        .ok_or_else(|| malformed("SecretAccessKey"))?;
    let token = creds
        .text_of("SessionToken")
        .ok_or_else(|| malformed("SessionToken"))?;

    let mut credentials = Credentials::new(access_key, secret).with_session_token(token);
    credentials.expires_at = creds
        .text_of("Expiration")
        .and_then(|e| DateTime::parse_from_rfc3339(e).ok())
        .map(|e| e.with_timezone(&Utc));
    Ok(credentials)
}
