//! Ambient credentials from the standard AWS environment variables.

use cloudpilot_core::Credentials;

/// Read `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and the optional
/// `AWS_SESSION_TOKEN` through `lookup`. Both keys must be non-empty.
pub fn ambient_credentials(lookup: impl Fn(&str) -> Option<String>) -> Option<Credentials> {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let access_key = get("AWS_ACCESS_KEY_ID")?;
    let secret = get("AWS_SECRET_ACCESS_KEY")?;
    let credentials = Credentials::new(access_key, secret);
    Some(match get("AWS_SESSION_TOKEN") {
        Some(token) => credentials.with_session_token(token),
        None => credentials,
    })
}

/// [`ambient_credentials`] against the process environment.
pub fn from_env() -> Option<Credentials> {
    let credentials = ambient_credentials(|key| std::env::var(key).ok());
    if credentials.is_none() {
        tracing::warn!("No AWS credentials in the environment; cloud calls will be denied");
    }
    credentials
}
