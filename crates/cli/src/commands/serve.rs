//! `cloudpilot serve`: start the HTTP gateway.

use std::path::Path;

use crate::bootstrap;

pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = bootstrap::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("☁️  CloudPilot Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {} ({})", config.llm.model, config.llm.provider);
    println!("   Region:    {}", config.aws.region);

    let runtime = bootstrap::build(config);
    cloudpilot_gateway::start(&runtime.config.gateway, runtime.engine).await?;

    Ok(())
}
