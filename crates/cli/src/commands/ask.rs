//! `cloudpilot ask`: run one command and print the answer.

use cloudpilot_agent::{CommandRequest, Mode};
use std::path::Path;

use crate::bootstrap;

pub async fn run(
    config_path: Option<&Path>,
    text: String,
    account: Option<String>,
    session: Option<String>,
    direct: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = bootstrap::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let runtime = bootstrap::build(config);

    let mut request = CommandRequest::new(text).with_mode(if direct { Mode::Direct } else { Mode::Agent });
    request.account_id = account;
    request.session_id = session;

    let response = runtime.engine.execute(request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", response.response);
    if response.degraded_identity {
        eprintln!();
        eprintln!("⚠️  Ran under the default account: the target role could not be assumed.");
    }
    if let Some(action) = response.action {
        eprintln!("   action: {action}");
    }
    if let Some(session) = response.session_id {
        eprintln!("   session: {session} ({} steps)", response.iterations);
    }

    Ok(())
}
