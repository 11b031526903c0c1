//! `cloudpilot tools`: list the tool catalog.

use std::path::Path;

use crate::bootstrap;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = bootstrap::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let runtime = bootstrap::build(config);

    let definitions = runtime.engine.registry().definitions();
    println!("🔧 {} tools", definitions.len());
    println!();
    for tool in definitions {
        println!("  {} [{}]", tool.name, tool.service);
        println!("      {}", tool.description);
        println!("      input: {}", tool.input.format_hint());
    }

    Ok(())
}
